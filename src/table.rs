use crate::error::{PipelineError, Result};
use chrono::{DateTime, NaiveDateTime};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, JsonValue};
use indexmap::IndexMap;
use serde_json::json;
use std::fmt;

/// Format used when timestamps are flattened for the map layer.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Coordinate reference system, identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Crs(u32);

impl Crs {
    pub const WGS84: Crs = Crs(4326);
    pub const WEB_MERCATOR: Crs = Crs(3857);
    /// NAD83 / Pennsylvania South (ftUS)
    pub const PA_SOUTH: Crs = Crs(2272);
    /// NAD83 / UTM zone 18N
    pub const UTM_18N: Crs = Crs(26918);

    pub fn from_epsg(code: u32) -> Option<Crs> {
        match code {
            4326 => Some(Self::WGS84),
            3857 | 900913 => Some(Self::WEB_MERCATOR),
            2272 => Some(Self::PA_SOUTH),
            26918 => Some(Self::UTM_18N),
            _ => None,
        }
    }

    /// Parse the `name` of a legacy GeoJSON `crs` member.
    pub fn from_name(name: &str) -> Option<Crs> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("urn:ogc:def:crs:OGC:1.3:CRS84") || name.eq_ignore_ascii_case("CRS84") {
            return Some(Self::WGS84);
        }
        let code = if name.to_ascii_lowercase().starts_with("urn:ogc:def:crs:epsg:") {
            name.rsplit(':').next()?
        } else if name.get(..5).is_some_and(|prefix| prefix.eq_ignore_ascii_case("EPSG:")) {
            &name[5..]
        } else {
            return None;
        };
        code.parse().ok().and_then(Self::from_epsg)
    }

    pub fn is_geographic(&self) -> bool {
        *self == Self::WGS84
    }

    pub fn urn(&self) -> String {
        if self.is_geographic() {
            "urn:ogc:def:crs:OGC:1.3:CRS84".to_string()
        } else {
            format!("urn:ogc:def:crs:EPSG::{}", self.0)
        }
    }

    pub fn proj_string(&self) -> &'static str {
        match self.0 {
            3857 => "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +wktext +no_defs",
            2272 => "+proj=lcc +lat_1=40.96666666666667 +lat_2=39.93333333333333 +lat_0=39.33333333333334 +lon_0=-77.75 +x_0=600000 +y_0=0 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +to_meter=0.3048006096012192 +no_defs",
            26918 => "+proj=utm +zone=18 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs",
            _ => "+proj=longlat +datum=WGS84 +no_defs",
        }
    }

    fn from_member(member: &JsonValue) -> Option<Crs> {
        let properties = member.get("properties")?;
        if let Some(name) = properties.get("name").and_then(JsonValue::as_str) {
            return Self::from_name(name);
        }
        properties
            .get("code")
            .and_then(JsonValue::as_u64)
            .and_then(|code| u32::try_from(code).ok())
            .and_then(Self::from_epsg)
    }

    fn to_member(self) -> JsonValue {
        json!({ "type": "name", "properties": { "name": self.urn() } })
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// A scalar attribute value attached to a row.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
    /// Nested arrays and objects are carried through untouched.
    Json(JsonValue),
}

impl AttrValue {
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map(Self::Float).unwrap_or(Self::Null),
            },
            JsonValue::String(s) => match parse_timestamp(&s) {
                Some(ts) => Self::Timestamp(ts),
                None => Self::Text(s),
            },
            other => Self::Json(other),
        }
    }

    /// Timestamps become plain strings; the map layer cannot carry them natively.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(i) => JsonValue::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Self::Text(s) => JsonValue::String(s.clone()),
            Self::Timestamp(ts) => JsonValue::String(ts.format(TIMESTAMP_FORMAT).to_string()),
            Self::Json(v) => v.clone(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT))
        .ok()
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub geometry: Option<Geometry>,
    pub attributes: IndexMap<String, AttrValue>,
}

impl Row {
    pub fn new(geometry: Option<Geometry>) -> Self {
        Self { geometry, attributes: IndexMap::new() }
    }

    pub fn with(mut self, name: &str, value: AttrValue) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    fn from_feature(feature: Feature) -> Self {
        let attributes = feature
            .properties
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, AttrValue::from_json(v)))
            .collect();
        Self { geometry: feature.geometry, attributes }
    }

    fn to_feature(&self) -> Feature {
        let properties: JsonObject = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        Feature {
            bbox: None,
            geometry: self.geometry.clone(),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// Ordered rows of geometry plus attributes, sharing one CRS.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeoTable {
    pub crs: Option<Crs>,
    pub rows: Vec<Row>,
}

impl GeoTable {
    pub fn new(crs: Option<Crs>, rows: Vec<Row>) -> Self {
        Self { crs, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Parse a GeoJSON payload. Collections without a `crs` member are WGS84.
    pub fn from_geojson_bytes(url: &str, bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes).map_err(|e| PipelineError::parse(url, e))?;
        let geojson: GeoJson = text.parse().map_err(|e: geojson::Error| PipelineError::parse(url, e))?;
        Self::from_geojson(url, geojson)
    }

    pub fn from_geojson(url: &str, geojson: GeoJson) -> Result<Self> {
        let (members, rows) = match geojson {
            GeoJson::FeatureCollection(fc) => {
                (fc.foreign_members, fc.features.into_iter().map(Row::from_feature).collect())
            }
            GeoJson::Feature(mut f) => (f.foreign_members.take(), vec![Row::from_feature(f)]),
            GeoJson::Geometry(g) => (None, vec![Row::new(Some(g))]),
        };
        let crs = match members.as_ref().and_then(|m| m.get("crs")) {
            Some(member) => Crs::from_member(member)
                .ok_or_else(|| PipelineError::parse(url, format!("unsupported crs {}", member)))?,
            None => Crs::WGS84,
        };
        Ok(Self::new(Some(crs), rows))
    }

    /// Wire form: a FeatureCollection with stringified timestamps and a `crs`
    /// member when the CRS is known.
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let foreign_members = self.crs.map(|crs| {
            let mut members = JsonObject::new();
            members.insert("crs".to_string(), crs.to_member());
            members
        });
        FeatureCollection {
            bbox: None,
            features: self.rows.iter().map(Row::to_feature).collect(),
            foreign_members,
        }
    }

    pub fn to_json_value(&self) -> JsonValue {
        JsonValue::Object(JsonObject::from(&self.to_feature_collection()))
    }

    /// Numeric values of `column`, one per row.
    pub fn numeric_column(&self, column: &str) -> Result<Vec<f64>> {
        self.rows
            .iter()
            .enumerate()
            .map(|(row, r)| match r.get(column) {
                None | Some(AttrValue::Null) => Err(PipelineError::MissingAttribute { column: column.to_string(), row }),
                Some(value) => value
                    .as_f64()
                    .ok_or_else(|| PipelineError::InvalidAttribute { column: column.to_string(), row }),
            })
            .collect()
    }

    /// Copy of the table with `name` set on every row from `values`.
    pub fn with_attribute<I>(&self, name: &str, values: I) -> GeoTable
    where
        I: IntoIterator<Item = AttrValue>,
    {
        let rows = self
            .rows
            .iter()
            .zip(values)
            .map(|(row, value)| row.clone().with(name, value))
            .collect();
        GeoTable::new(self.crs, rows)
    }
}
