use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::choropleth::COLOR_COLUMN;
use crate::colormap::LinearColormap;
use crate::error::{PipelineError, Result};
use crate::fetch::{GeoSource, HttpClient};
use crate::models::{LayerStyle, MarkerRecord, Tooltip};
use crate::projection;
use crate::table::{Crs, GeoTable};

/// Philadelphia City Hall.
pub const PHILADELPHIA: [f64; 2] = [39.9526, -75.1652];
pub const DEFAULT_ZOOM: u8 = 13;

const POPUP_IMAGE_SIZE: u32 = 120;
const MARKER_ICON_SIZE: [u32; 2] = [28, 30];

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TileLayer {
    pub url_template: String,
    pub attribution: String,
    pub name: String,
    pub overlay: bool,
}

impl TileLayer {
    pub fn mapbox_satellite(api_key: &str) -> Self {
        Self {
            url_template: format!("https://api.mapbox.com/v4/mapbox.satellite/{{z}}/{{x}}/{{y}}@2x.png?access_token={}", api_key),
            attribution: "Mapbox".to_string(),
            name: "Mapbox Satellite View".to_string(),
            overlay: false,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BaseMap {
    pub center: [f64; 2],
    pub zoom: u8,
    pub control_scale: bool,
    pub tiles: Vec<TileLayer>,
}

impl BaseMap {
    pub fn philadelphia(api_key: &str) -> Self {
        Self {
            center: PHILADELPHIA,
            zoom: DEFAULT_ZOOM,
            control_scale: true,
            tiles: vec![TileLayer::mapbox_satellite(api_key)],
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct GeoJsonOverlay {
    pub name: String,
    pub data: JsonValue,
    pub style: LayerStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<Tooltip>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Popup {
    pub html: String,
    pub width: u32,
    pub height: u32,
    pub max_width: u32,
}

#[derive(Serialize, Debug, Clone)]
pub struct Icon {
    pub url: String,
    pub size: [u32; 2],
}

#[derive(Serialize, Debug, Clone)]
pub struct MapMarker {
    pub location: [f64; 2],
    pub popup: Popup,
    pub icon: Icon,
}

/// Markers toggled together when `name` is set.
#[derive(Serialize, Debug, Clone)]
pub struct MarkerGroup {
    pub name: Option<String>,
    pub markers: Vec<MapMarker>,
}

#[derive(Serialize, Debug, Clone)]
pub struct ColorBar {
    pub caption: String,
    pub vmin: f64,
    pub vmax: f64,
    pub stops: Vec<(f64, String)>,
}

#[derive(Serialize, Debug, Clone)]
pub struct LayerControl {
    pub collapsed: bool,
}

/// Everything the page script needs to build the Leaflet map.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MapDocument {
    pub base: BaseMap,
    pub overlays: Vec<GeoJsonOverlay>,
    pub marker_groups: Vec<MarkerGroup>,
    pub color_bar: Option<ColorBar>,
    pub layer_control: Option<LayerControl>,
}

impl MapDocument {
    pub fn new(base: BaseMap) -> Self {
        Self {
            base,
            overlays: Vec::new(),
            marker_groups: Vec::new(),
            color_bar: None,
            layer_control: None,
        }
    }

    /// Adds `table` as a GeoJSON overlay. Leaflet only speaks WGS84, so the
    /// table is reprojected on the way in.
    pub fn add_geojson(&mut self, name: &str, table: &GeoTable, style: LayerStyle, tooltip: Option<Tooltip>) -> Result<&mut Self> {
        let table = projection::to_crs(table, Crs::WGS84)?;
        debug!("adding overlay {} with {} features", name, table.len());
        self.overlays.push(GeoJsonOverlay {
            name: name.to_string(),
            data: table.to_json_value(),
            style,
            tooltip,
        });
        Ok(self)
    }

    pub fn add_neighborhoods(&mut self, neighborhoods: &GeoTable) -> Result<&mut Self> {
        let style = LayerStyle {
            weight: Some(1),
            fill_opacity: Some(0.5),
            color_property: Some(COLOR_COLUMN.to_string()),
            ..Default::default()
        };
        let tooltip = Tooltip::new(&[("listname", "Neighborhood:"), ("Join_Count", "Building Count:")]);
        self.add_geojson("Philadelphia Neighborhoods", neighborhoods, style, Some(tooltip))
    }

    pub fn add_steam_loop(&mut self, steam_loop: &GeoTable) -> Result<&mut Self> {
        let style = LayerStyle {
            fill_color: Some("#C0C0C0".to_string()),
            color: Some("#4A90E2".to_string()),
            weight: Some(5),
            fill_opacity: Some(0.5),
            color_property: None,
        };
        self.add_geojson("Philadelphia Steam Loop", steam_loop, style, None)
    }

    pub fn add_buildings(&mut self, buildings: &GeoTable) -> Result<&mut Self> {
        let style = LayerStyle {
            fill_color: Some("#008000".to_string()),
            color: Some("transparent".to_string()),
            weight: Some(1),
            fill_opacity: Some(0.0),
            color_property: None,
        };
        self.add_geojson("Building Footprints (1000 m from steam loop)", buildings, style, None)
    }

    pub fn add_markers(&mut self, group: MarkerGroup) -> &mut Self {
        self.marker_groups.push(group);
        self
    }

    pub fn add_color_bar(&mut self, colormap: &LinearColormap, caption: &str) -> &mut Self {
        self.color_bar = Some(ColorBar {
            caption: caption.to_string(),
            vmin: colormap.vmin(),
            vmax: colormap.vmax(),
            stops: colormap.stops(),
        });
        self
    }

    pub fn add_layer_control(&mut self, collapsed: bool) -> &mut Self {
        self.layer_control = Some(LayerControl { collapsed });
        self
    }

    /// JSON safe to drop into an inline `<script>`.
    pub fn to_json(&self) -> Result<String> {
        let json = serde_json::to_string(self).map_err(|e| PipelineError::Template(format!("failed to encode map: {}", e)))?;
        Ok(json.replace("</", "<\\/"))
    }
}

/// Popup body with the image inlined as a data URI.
pub fn popup_html(name: &str, image: &[u8]) -> String {
    let mime = image::guess_format(image).map(|f| f.to_mime_type()).unwrap_or("image/png");
    format!(
        r#"<p>{}</p><br><img src="data:{};base64,{}" width="{}" height="{}">"#,
        tera::escape_html(name),
        mime,
        STANDARD.encode(image),
        POPUP_IMAGE_SIZE,
        POPUP_IMAGE_SIZE
    )
}

/// Fetches each marker's photo and wraps it in a popup.
pub async fn marker_group<C: HttpClient>(
    source: &GeoSource<C>,
    records: &[MarkerRecord],
    icon_url: &str,
    name: Option<&str>,
) -> Result<MarkerGroup> {
    let mut markers = Vec::with_capacity(records.len());
    for record in records {
        let image = source.image(&record.image_url).await?;
        markers.push(MapMarker {
            location: [record.latitude, record.longitude],
            popup: Popup {
                html: popup_html(&record.name, &image),
                width: POPUP_IMAGE_SIZE + 20,
                height: POPUP_IMAGE_SIZE + 50,
                max_width: POPUP_IMAGE_SIZE + 20,
            },
            icon: Icon { url: icon_url.to_string(), size: MARKER_ICON_SIZE },
        });
    }
    Ok(MarkerGroup { name: name.map(str::to_string), markers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::mock::StaticClient;
    use crate::table::{AttrValue, Row};
    use chrono::NaiveDate;
    use geojson::{Geometry, Value};

    const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn mercator_building() -> GeoTable {
        let stamp = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap().and_hms_opt(12, 0, 0).unwrap();
        let row = Row::new(Some(Geometry::new(Value::Point(vec![-8367374.0, 4858894.0]))))
            .with("captured", AttrValue::Timestamp(stamp));
        GeoTable::new(Some(Crs::WEB_MERCATOR), vec![row])
    }

    #[test]
    fn test_base_map() {
        let base = BaseMap::philadelphia("pk.secret");
        assert_eq!(base.center, [39.9526, -75.1652]);
        assert_eq!(base.zoom, 13);
        assert_eq!(
            base.tiles[0].url_template,
            "https://api.mapbox.com/v4/mapbox.satellite/{z}/{x}/{y}@2x.png?access_token=pk.secret"
        );
        assert!(!base.tiles[0].overlay);
    }

    #[test]
    fn test_layers_chain_and_are_wgs84() {
        let mut map = MapDocument::new(BaseMap::philadelphia("pk"));
        map.add_buildings(&mercator_building())
            .unwrap()
            .add_steam_loop(&GeoTable::new(Some(Crs::WGS84), vec![]))
            .unwrap()
            .add_layer_control(true);

        assert_eq!(map.overlays.len(), 2);
        assert!(map.layer_control.as_ref().unwrap().collapsed);

        let buildings = &map.overlays[0];
        assert_eq!(buildings.style.fill_opacity, Some(0.0));
        assert_eq!(buildings.data["crs"]["properties"]["name"], "urn:ogc:def:crs:OGC:1.3:CRS84");
        assert_eq!(buildings.data["features"][0]["properties"]["captured"], "2021-06-01 12:00:00");
        let lon = buildings.data["features"][0]["geometry"]["coordinates"][0].as_f64().unwrap();
        assert!((lon + 75.165).abs() < 0.01, "lon {}", lon);
    }

    #[test]
    fn test_neighborhood_style_reads_row_color() {
        let row = Row::new(None)
            .with("listname", AttrValue::Text("Fairmount".into()))
            .with("Join_Count", AttrValue::Int(0))
            .with(COLOR_COLUMN, AttrValue::Text("#000000".into()));
        let mut map = MapDocument::new(BaseMap::philadelphia("pk"));
        map.add_neighborhoods(&GeoTable::new(Some(Crs::WGS84), vec![row])).unwrap();

        let json: JsonValue = serde_json::from_str(&map.to_json().unwrap()).unwrap();
        let overlay = &json["overlays"][0];
        assert_eq!(overlay["style"]["colorProperty"], "color");
        assert_eq!(overlay["style"]["fillOpacity"], 0.5);
        assert!(overlay["style"].get("fillColor").is_none());
        assert_eq!(overlay["tooltip"]["aliases"][1], "Building Count:");
        assert_eq!(overlay["data"]["features"][0]["properties"]["color"], "#000000");
    }

    #[test]
    fn test_layer_without_crs_fails() {
        let mut map = MapDocument::new(BaseMap::philadelphia("pk"));
        let result = map.add_steam_loop(&GeoTable::new(None, vec![]));
        assert!(matches!(result, Err(PipelineError::Projection(_))));
    }

    #[test]
    fn test_script_safe_json() {
        let mut map = MapDocument::new(BaseMap::philadelphia("pk"));
        let row = Row::new(None).with("note", AttrValue::Text("</script><script>alert(1)".into()));
        map.add_steam_loop(&GeoTable::new(Some(Crs::WGS84), vec![row])).unwrap();
        let json = map.to_json().unwrap();
        assert!(!json.contains("</script>"));
        assert!(json.contains(r"<\/script>"));
    }

    #[test]
    fn test_popup_html() {
        let html = popup_html("Edison <Plant>", PNG_SIGNATURE);
        assert!(html.starts_with("<p>Edison &lt;Plant&gt;</p><br><img src=\"data:image/png;base64,"));
        assert!(html.contains(&STANDARD.encode(PNG_SIGNATURE)));
        assert!(html.ends_with(r#"width="120" height="120">"#));

        let jpeg = popup_html("Grays Ferry", &[0xff, 0xd8, 0xff, 0xe0, 0, 0x10]);
        assert!(jpeg.contains("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn test_marker_group() {
        let images = [("https://img.example.com/a.png", "A"), ("https://img.example.com/b.png", "B")];
        let client = images
            .iter()
            .fold(StaticClient::default(), |client, (url, _)| client.with(url, PNG_SIGNATURE));
        let source = GeoSource::new(client);
        let records: Vec<MarkerRecord> = images
            .iter()
            .enumerate()
            .map(|(i, (url, name))| MarkerRecord {
                latitude: 39.9 + i as f64,
                longitude: -75.1,
                name: name.to_string(),
                image_url: url.to_string(),
            })
            .collect();

        let group = marker_group(&source, &records, "https://img.example.com/pin.png", Some("Cogeneration Plants"))
            .await
            .unwrap();
        assert_eq!(group.name.as_deref(), Some("Cogeneration Plants"));
        assert_eq!(group.markers.len(), 2);
        assert_eq!(group.markers[1].location, [40.9, -75.1]);
        assert_eq!(group.markers[0].icon.size, [28, 30]);
        assert_eq!((group.markers[0].popup.width, group.markers[0].popup.height), (140, 170));
        assert_eq!(source.client().calls(), 2);
    }

    #[tokio::test]
    async fn test_marker_image_failure_aborts() {
        let source = GeoSource::new(StaticClient::default());
        let records = vec![MarkerRecord {
            latitude: 39.9,
            longitude: -75.1,
            name: "Edison Plant".into(),
            image_url: "https://img.example.com/missing.jpg".into(),
        }];
        let result = marker_group(&source, &records, "https://img.example.com/pin.png", None).await;
        assert!(matches!(result, Err(PipelineError::Fetch { .. })));
    }
}
