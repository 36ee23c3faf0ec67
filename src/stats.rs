use serde::Serialize;

use crate::choropleth::color_for;
use crate::colormap::LinearColormap;
use crate::error::{PipelineError, Result};
use crate::table::GeoTable;

/// Buildings were selected within this distance of the loop upstream.
pub const STUDY_RADIUS_METERS: u32 = 1000;
pub const METERS_PER_MILE: f64 = 1609.34;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct BuildingStats {
    pub total: usize,
    pub radius_meters: u32,
    pub radius_miles: f64,
    /// `radius_miles` to two decimals, for display.
    pub radius_miles_text: String,
}

impl BuildingStats {
    pub fn from_table(buildings: &GeoTable) -> Self {
        let radius_miles = f64::from(STUDY_RADIUS_METERS) / METERS_PER_MILE;
        Self {
            total: buildings.len(),
            radius_meters: STUDY_RADIUS_METERS,
            radius_miles,
            radius_miles_text: format!("{:.2}", radius_miles),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RankedNeighborhood {
    pub name: String,
    pub count: i64,
    pub color: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NeighborhoodStats {
    /// Neighborhoods with at least one nearby building.
    pub intersecting: usize,
    pub total: usize,
    /// Intersecting neighborhoods, most buildings first.
    pub ranked: Vec<RankedNeighborhood>,
}

pub fn neighborhood_stats(
    neighborhoods: &GeoTable,
    count_column: &str,
    name_column: &str,
    colormap: &LinearColormap,
) -> Result<NeighborhoodStats> {
    let counts = neighborhoods.numeric_column(count_column)?;

    let mut ranked = Vec::new();
    for (row, (r, &count)) in neighborhoods.rows.iter().zip(&counts).enumerate() {
        if count <= 0.0 {
            continue;
        }
        let name = r
            .get(name_column)
            .filter(|v| !v.is_null())
            .ok_or_else(|| PipelineError::MissingAttribute { column: name_column.to_string(), row })?;
        ranked.push((count, RankedNeighborhood {
            name: name.to_string(),
            count: count.round() as i64,
            color: color_for(colormap, count),
        }));
    }
    // stable, so ties keep table order
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

    Ok(NeighborhoodStats {
        intersecting: ranked.len(),
        total: neighborhoods.len(),
        ranked: ranked.into_iter().map(|(_, n)| n).collect(),
    })
}
