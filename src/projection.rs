use crate::error::{PipelineError, Result};
use crate::table::{Crs, GeoTable, Row};
use geojson::{Geometry, Value};
use proj4rs::Proj;
use tracing::debug;

/// Reproject `table` into the CRS of `reference`.
pub fn match_crs(reference: &GeoTable, table: &GeoTable) -> Result<GeoTable> {
    let target = reference
        .crs
        .ok_or_else(|| PipelineError::Projection("reference table has no crs".into()))?;
    to_crs(table, target)
}

pub fn to_crs(table: &GeoTable, target: Crs) -> Result<GeoTable> {
    let source = table
        .crs
        .ok_or_else(|| PipelineError::Projection("table has no crs".into()))?;
    if source == target {
        return Ok(table.clone());
    }

    debug!("reprojecting {} rows from {} to {}", table.len(), source, target);
    let transformer = Transformer::new(source, target)?;
    let rows = table
        .rows
        .iter()
        .map(|row| {
            let geometry = row.geometry.as_ref().map(|g| transformer.geometry(g)).transpose()?;
            Ok(Row { geometry, attributes: row.attributes.clone() })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(GeoTable::new(Some(target), rows))
}

struct Transformer {
    source: Crs,
    target: Crs,
    from: Proj,
    to: Proj,
}

impl Transformer {
    fn new(source: Crs, target: Crs) -> Result<Self> {
        let from = Proj::from_proj_string(source.proj_string())
            .map_err(|e| PipelineError::Projection(format!("failed to create {} projection: {:?}", source, e)))?;
        let to = Proj::from_proj_string(target.proj_string())
            .map_err(|e| PipelineError::Projection(format!("failed to create {} projection: {:?}", target, e)))?;
        Ok(Self { source, target, from, to })
    }

    fn position(&self, position: &[f64]) -> Result<Vec<f64>> {
        let [x, y, rest @ ..] = position else {
            return Err(PipelineError::Projection(format!("position {:?} has fewer than two coordinates", position)));
        };

        // proj4rs works in radians for geographic systems
        let mut point = if self.source.is_geographic() {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (*x, *y, 0.0)
        };
        proj4rs::transform::transform(&self.from, &self.to, &mut point).map_err(|e| {
            PipelineError::Projection(format!("failed to transform {:?} from {} to {}: {:?}", position, self.source, self.target, e))
        })?;
        if self.target.is_geographic() {
            point.0 = point.0.to_degrees();
            point.1 = point.1.to_degrees();
        }

        let mut out = Vec::with_capacity(position.len());
        out.push(point.0);
        out.push(point.1);
        out.extend_from_slice(rest);
        Ok(out)
    }

    fn positions(&self, positions: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        positions.iter().map(|p| self.position(p)).collect()
    }

    fn rings(&self, rings: &[Vec<Vec<f64>>]) -> Result<Vec<Vec<Vec<f64>>>> {
        rings.iter().map(|r| self.positions(r)).collect()
    }

    fn geometry(&self, geometry: &Geometry) -> Result<Geometry> {
        let value = match &geometry.value {
            Value::Point(p) => Value::Point(self.position(p)?),
            Value::MultiPoint(ps) => Value::MultiPoint(self.positions(ps)?),
            Value::LineString(ps) => Value::LineString(self.positions(ps)?),
            Value::MultiLineString(lines) => Value::MultiLineString(self.rings(lines)?),
            Value::Polygon(rings) => Value::Polygon(self.rings(rings)?),
            Value::MultiPolygon(polygons) => Value::MultiPolygon(
                polygons.iter().map(|rings| self.rings(rings)).collect::<Result<_>>()?,
            ),
            Value::GeometryCollection(geometries) => Value::GeometryCollection(
                geometries.iter().map(|g| self.geometry(g)).collect::<Result<_>>()?,
            ),
        };
        // a stale bbox would be in the old units, so it is dropped
        Ok(Geometry::new(value))
    }
}
