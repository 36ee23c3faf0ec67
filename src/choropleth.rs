use crate::colormap::LinearColormap;
use crate::error::Result;
use crate::table::{AttrValue, GeoTable};

pub const COLOR_COLUMN: &str = "color";

/// Color for rows with nothing to count, kept apart from the bottom of the scale.
pub const SENTINEL_COLOR: &str = "#000000";

pub struct Choropleth {
    pub table: GeoTable,
    pub colormap: LinearColormap,
}

/// Colors each row by `column` on an OrRd scale over `[0, max]`.
///
/// Returns a new table carrying a `color` attribute; rows whose value is not
/// positive get [`SENTINEL_COLOR`].
pub fn colorize(table: &GeoTable, column: &str) -> Result<Choropleth> {
    let values = table.numeric_column(column)?;
    let max = values.iter().copied().fold(0.0, f64::max);
    let colormap = LinearColormap::orrd_07().scale(0.0, max);
    let colors = values
        .iter()
        .map(|&value| AttrValue::Text(color_for(&colormap, value)))
        .collect::<Vec<_>>();
    Ok(Choropleth { table: table.with_attribute(COLOR_COLUMN, colors), colormap })
}

pub fn color_for(colormap: &LinearColormap, value: f64) -> String {
    if value > 0.0 {
        colormap.color(value)
    } else {
        SENTINEL_COLOR.to_string()
    }
}
