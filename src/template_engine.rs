use anyhow::Result;
use std::path::{Path, PathBuf};
use tera::Tera;
use tracing::info;

use crate::error::PipelineError;

pub struct TemplateEngine {
    tera: Tera,
    base_path: PathBuf,
}

impl TemplateEngine {
    pub fn new(base_path: &Path) -> Result<Self> {
        if !base_path.exists() {
            return Err(anyhow::anyhow!("template directory {} not found", base_path.display()));
        }

        let pattern = format!("{}/**/*.html", base_path.to_string_lossy());
        let tera = Tera::new(&pattern)?;
        info!("loaded {} templates from {}", tera.get_template_names().count(), base_path.display());

        Ok(Self {
            tera,
            base_path: base_path.to_path_buf(),
        })
    }

    pub fn render(&self, template_name: &str, context: &tera::Context) -> Result<String, PipelineError> {
        self.tera.render(template_name, context).map_err(|e| {
            let loaded = self.tera.get_template_names().collect::<Vec<_>>();
            // tera keeps the useful part of the message in the source chain
            let cause = std::error::Error::source(&e).map(|s| format!(": {}", s)).unwrap_or_default();
            PipelineError::Template(format!(
                "{}{}. Requested: '{}' from {}. Loaded: {:?}",
                e,
                cause,
                template_name,
                self.base_path.display(),
                loaded
            ))
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn templates() -> TemplateEngine {
        TemplateEngine::new(&Path::new(env!("CARGO_MANIFEST_DIR")).join("data/templates")).unwrap()
    }

    #[test]
    fn test_loads_dashboard_template() {
        let engine = templates();
        assert!(engine.tera.get_template_names().any(|name| name == "dashboard.html"));
    }

    #[test]
    fn test_missing_template_is_template_error() {
        let err = templates().render("nope.html", &tera::Context::new()).unwrap_err();
        assert!(matches!(err, PipelineError::Template(ref msg) if msg.contains("nope.html")));
    }

    #[test]
    fn test_missing_directory() {
        assert!(TemplateEngine::new(Path::new("/definitely/not/here")).is_err());
    }
}
