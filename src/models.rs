use serde::Serialize;

use crate::config::ImageConfig;

/// A fixed point of interest shown with a photo popup.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MarkerRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
    pub image_url: String,
}

/// The two Vicinity Energy cogeneration plants feeding the loop.
pub fn cogeneration_plants(images: &ImageConfig) -> Vec<MarkerRecord> {
    vec![
        // 2600 Christian St
        MarkerRecord {
            latitude: 39.9423456,
            longitude: -75.1884788,
            name: "Grays Ferry Vicinity Energy cogeneration plant".to_string(),
            image_url: images.grays_ferry.to_string(),
        },
        // 908 Sansom St
        MarkerRecord {
            latitude: 39.949610,
            longitude: -75.157476,
            name: "Edison Plant".to_string(),
            image_url: images.edison_plant.to_string(),
        },
    ]
}

/// Leaflet path options. `color_property` pulls the stroke color from each
/// feature's properties instead of `color`.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LayerStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_property: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Tooltip {
    pub fields: Vec<String>,
    pub aliases: Vec<String>,
    pub localize: bool,
}

impl Tooltip {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            fields: pairs.iter().map(|(f, _)| f.to_string()).collect(),
            aliases: pairs.iter().map(|(_, a)| a.to_string()).collect(),
            localize: true,
        }
    }
}
