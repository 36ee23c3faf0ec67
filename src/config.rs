use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use url::Url;

use crate::fetch::DEFAULT_USER_AGENT;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3001";
const DEFAULT_TEMPLATE_DIR: &str = "data/templates";
const DEFAULT_MARKER_ICON: &str = "http://icons.iconarchive.com/icons/paomedia/small-n-flat/1024/map-marker-icon.png";

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub listen_addr: Option<String>,
    pub thread_count: Option<usize>,
    pub user_agent: Option<String>,
    pub template_dir: Option<PathBuf>,
    pub mapbox: MapboxConfig,
    pub sources: SourceConfig,
    pub images: ImageConfig,
}

#[derive(Deserialize, Clone, Debug)]
pub struct MapboxConfig {
    pub api_key: String,
}

/// GeoJSON layers fetched on every render.
#[derive(Deserialize, Clone, Debug)]
pub struct SourceConfig {
    pub steam_loop: Url,
    pub buildings: Url,
    pub neighborhoods: Url,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ImageConfig {
    pub cogeneration: Url,
    pub edison_plant: Url,
    pub grays_ferry: Url,
    pub marker_icon: Option<Url>,
}

impl ImageConfig {
    pub fn marker_icon(&self) -> &str {
        self.marker_icon.as_ref().map(Url::as_str).unwrap_or(DEFAULT_MARKER_ICON)
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let path = if std::path::Path::new("steamloop.toml").exists() {
            "steamloop.toml"
        } else if std::path::Path::new("steamloop.example.toml").exists() {
            "steamloop.example.toml"
        } else {
            return Err(anyhow::anyhow!("Configuration file not found. Please create steamloop.toml or provide steamloop.example.toml."));
        };

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn listen_addr(&self) -> &str {
        self.listen_addr.as_deref().unwrap_or(DEFAULT_LISTEN_ADDR)
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }

    pub fn template_dir(&self) -> PathBuf {
        self.template_dir.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE_DIR))
    }
}
