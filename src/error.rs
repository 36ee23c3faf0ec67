use thiserror::Error;

/// Everything that can abort a dashboard render.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("failed to parse geojson from {url}: {reason}")]
    Parse { url: String, reason: String },
    #[error("projection error: {0}")]
    Projection(String),
    #[error("attribute {column} missing on row {row}")]
    MissingAttribute { column: String, row: usize },
    #[error("attribute {column} on row {row} is not numeric")]
    InvalidAttribute { column: String, row: usize },
    #[error("template error: {0}")]
    Template(String),
}

impl PipelineError {
    pub fn fetch(url: &str, reason: impl ToString) -> Self {
        Self::Fetch { url: url.to_string(), reason: reason.to_string() }
    }

    pub fn parse(url: &str, reason: impl ToString) -> Self {
        Self::Parse { url: url.to_string(), reason: reason.to_string() }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
