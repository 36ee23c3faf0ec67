use serde::Serialize;
use tracing::info;

use crate::choropleth;
use crate::compose::{self, BaseMap, MapDocument};
use crate::config::Config;
use crate::error::Result;
use crate::fetch::{GeoSource, HttpClient};
use crate::models::cogeneration_plants;
use crate::projection;
use crate::stats::{self, BuildingStats, NeighborhoodStats};
use crate::template_engine::TemplateEngine;

pub const DASHBOARD_TEMPLATE: &str = "dashboard.html";
pub const JOIN_COUNT: &str = "Join_Count";
pub const NEIGHBORHOOD_NAME: &str = "listname";
const MARKER_GROUP: &str = "Cogeneration Plants";

pub struct Dashboard<C> {
    source: GeoSource<C>,
    config: Config,
    templates: TemplateEngine,
}

/// One render's worth of map and statistics.
#[derive(Serialize, Debug, Clone)]
pub struct DashboardView {
    pub map: MapDocument,
    pub neighborhoods: NeighborhoodStats,
    pub buildings: BuildingStats,
}

impl<C: HttpClient> Dashboard<C> {
    pub fn new(source: GeoSource<C>, config: Config, templates: TemplateEngine) -> Self {
        Self { source, config, templates }
    }

    pub async fn build(&self) -> Result<DashboardView> {
        let sources = &self.config.sources;
        let (steam_loop, buildings, neighborhoods) = tokio::try_join!(
            self.source.table(sources.steam_loop.as_str()),
            self.source.table(sources.buildings.as_str()),
            self.source.table(sources.neighborhoods.as_str()),
        )?;

        let neighborhoods = projection::match_crs(&steam_loop, &neighborhoods)?;
        let choropleth = choropleth::colorize(&neighborhoods, JOIN_COUNT)?;
        let neighborhood_stats =
            stats::neighborhood_stats(&choropleth.table, JOIN_COUNT, NEIGHBORHOOD_NAME, &choropleth.colormap)?;
        let building_stats = BuildingStats::from_table(&buildings);

        let images = &self.config.images;
        let markers = compose::marker_group(
            &self.source,
            &cogeneration_plants(images),
            images.marker_icon(),
            Some(MARKER_GROUP),
        )
        .await?;

        let mut map = MapDocument::new(BaseMap::philadelphia(&self.config.mapbox.api_key));
        map.add_neighborhoods(&choropleth.table)?
            .add_color_bar(&choropleth.colormap, "Buildings within 1000 m of the steam loop")
            .add_steam_loop(&steam_loop)?
            .add_buildings(&buildings)?
            .add_markers(markers)
            .add_layer_control(true);

        info!(
            "built dashboard: {} buildings, {} of {} neighborhoods nearby",
            building_stats.total, neighborhood_stats.intersecting, neighborhood_stats.total
        );
        Ok(DashboardView { map, neighborhoods: neighborhood_stats, buildings: building_stats })
    }

    pub async fn render(&self) -> Result<String> {
        let view = self.build().await?;
        let mut context = tera::Context::new();
        context.insert("map_json", &view.map.to_json()?);
        context.insert("neighborhoods", &view.neighborhoods);
        context.insert("buildings", &view.buildings);
        context.insert("cogeneration_image", self.config.images.cogeneration.as_str());
        self.templates.render(DASHBOARD_TEMPLATE, &context)
    }
}
