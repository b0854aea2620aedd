//! Model catalog
//!
//! The catalog is a JSON list of model records describing where each model
//! publishes its files. A default catalog covering the ICON family is embedded
//! in the binary; a custom file can replace it through the configuration or the
//! `--catalog` flag. All URL and destination patterns are compiled while the
//! catalog loads, so a bad template is reported before any job is built.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use crate::app::models::{LevelType, ModelSpec};
use crate::app::template::Template;
use crate::constants::files::DEFAULT_DEST_PATTERN;
use crate::errors::{CatalogError, CatalogResult, RequestError, RequestResult};

/// Catalog embedded at build time
const BUILTIN_CATALOG: &str = include_str!("models.json");

/// One record as stored in the catalog file
#[derive(Debug, Deserialize)]
struct ModelRecord {
    model: String,
    #[serde(default)]
    description: Option<String>,
    scope: String,
    grids: Vec<String>,
    #[serde(alias = "openDataDeliveryOffsetMinutes")]
    publication_delay_minutes: u32,
    #[serde(alias = "intervalHours")]
    run_interval_hours: u32,
    #[serde(default, alias = "minlevel")]
    min_level: u32,
    #[serde(default, alias = "maxlevel")]
    max_level: u32,
    pattern: BTreeMap<String, Template>,
    #[serde(default, alias = "destpattern")]
    dest_pattern: Option<Template>,
}

impl ModelRecord {
    fn into_spec(self, default_dest: &Template) -> CatalogResult<ModelSpec> {
        let invalid = |reason: String| CatalogError::InvalidModel {
            model: self.model.clone(),
            reason,
        };

        if self.grids.is_empty() {
            return Err(invalid("at least one grid is required".to_string()));
        }
        if self.run_interval_hours == 0 {
            return Err(invalid("run_interval_hours must be at least 1".to_string()));
        }
        if self.min_level > self.max_level {
            return Err(invalid(format!(
                "min_level {} is above max_level {}",
                self.min_level, self.max_level
            )));
        }
        if self.pattern.is_empty() {
            return Err(invalid("no URL patterns given".to_string()));
        }

        let mut url_patterns = HashMap::with_capacity(self.pattern.len());
        for (key, template) in &self.pattern {
            let level_type = LevelType::from_str(key)
                .map_err(|_| invalid(format!("unknown level type '{}'", key)))?;
            url_patterns.insert(level_type, template.clone());
        }

        Ok(ModelSpec {
            id: self.model.clone(),
            url_patterns,
            grids: self.grids.clone(),
            scope: self.scope.clone(),
            publication_delay_minutes: self.publication_delay_minutes,
            run_interval_hours: self.run_interval_hours,
            min_level: self.min_level,
            max_level: self.max_level,
            dest_pattern: self
                .dest_pattern
                .clone()
                .unwrap_or_else(|| default_dest.clone()),
            description: self.description.clone(),
        })
    }
}

/// Immutable set of model specs, shared by reference
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<Arc<ModelSpec>>,
}

impl ModelCatalog {
    /// Catalog embedded in the binary
    pub fn builtin() -> CatalogResult<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Parse a catalog from JSON text
    pub fn from_json(json: &str) -> CatalogResult<Self> {
        let records: Vec<ModelRecord> = serde_json::from_str(json)?;
        let default_dest = Template::parse(DEFAULT_DEST_PATTERN).map_err(|e| {
            CatalogError::InvalidModel {
                model: "*".to_string(),
                reason: e.to_string(),
            }
        })?;

        let mut seen = HashSet::new();
        let mut models = Vec::with_capacity(records.len());
        for record in records {
            if !seen.insert(record.model.to_lowercase()) {
                return Err(CatalogError::DuplicateModel {
                    model: record.model,
                });
            }
            models.push(Arc::new(record.into_spec(&default_dest)?));
        }

        debug!("Loaded model catalog with {} models", models.len());
        Ok(Self { models })
    }

    /// Load a catalog file
    pub async fn load(path: &Path) -> CatalogResult<Self> {
        if !path.exists() {
            return Err(CatalogError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CatalogError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let catalog = Self::from_json(&content)?;
        info!("Using model catalog from {}", path.display());
        Ok(catalog)
    }

    /// Load `path` when given, otherwise the embedded catalog
    pub async fn load_or_builtin(path: Option<&Path>) -> CatalogResult<Self> {
        match path {
            Some(path) => Self::load(path).await,
            None => Self::builtin(),
        }
    }

    /// Look up a model, ignoring case
    pub fn get(&self, model: &str) -> Option<Arc<ModelSpec>> {
        self.models
            .iter()
            .find(|spec| spec.id.eq_ignore_ascii_case(model))
            .cloned()
    }

    /// Look up a model named in a request
    pub fn require(&self, model: &str) -> RequestResult<Arc<ModelSpec>> {
        self.get(model).ok_or_else(|| RequestError::UnknownModel {
            model: model.to_string(),
        })
    }

    /// All models in catalog order
    pub fn models(&self) -> impl Iterator<Item = &Arc<ModelSpec>> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Test embedded catalog
    ///
    /// Verifies every built-in record compiles and the ICON family is present
    #[test]
    fn test_builtin_catalog() {
        let catalog = ModelCatalog::builtin().unwrap();
        assert!(!catalog.is_empty());

        for id in ["icon", "icon-eu", "icon-d2", "icon-eu-eps", "icon-d2-eps"] {
            assert!(catalog.get(id).is_some(), "missing {}", id);
        }

        let d2 = catalog.get("ICON-D2").unwrap();
        assert_eq!(d2.scope, "germany");
        assert_eq!(d2.default_grid(), Some("regular-lat-lon"));
        assert_eq!(d2.run_interval_hours, 3);
        assert_eq!(d2.level_types().len(), 4);
        assert_eq!(d2.dest_pattern.as_str(), DEFAULT_DEST_PATTERN);

        let eps = catalog.get("icon-eu-eps").unwrap();
        assert_eq!(eps.level_types(), vec![LevelType::SingleLevel]);
    }

    #[test]
    fn test_unknown_model() {
        let catalog = ModelCatalog::builtin().unwrap();
        assert!(matches!(
            catalog.require("cosmo-d2"),
            Err(RequestError::UnknownModel { .. })
        ));
    }

    #[test]
    fn test_legacy_keys_accepted() {
        let json = r#"[{
            "model": "test",
            "scope": "x",
            "grids": ["g"],
            "openDataDeliveryOffsetMinutes": 90,
            "intervalHours": 6,
            "minlevel": 1,
            "maxlevel": 2,
            "pattern": {"model-level": "http://h/{model}_{level}"},
            "destpattern": "{model}/{param}"
        }]"#;
        let catalog = ModelCatalog::from_json(json).unwrap();
        let spec = catalog.get("test").unwrap();
        assert_eq!(spec.publication_delay_minutes, 90);
        assert_eq!(spec.run_interval_hours, 6);
        assert_eq!(spec.max_level, 2);
        assert_eq!(spec.dest_pattern.as_str(), "{model}/{param}");
    }

    #[test]
    fn test_invalid_records() {
        let bad_template = r#"[{"model": "a", "scope": "s", "grids": ["g"],
            "publication_delay_minutes": 0, "run_interval_hours": 1,
            "pattern": {"single-level": "{unknown}"}}]"#;
        assert!(matches!(
            ModelCatalog::from_json(bad_template),
            Err(CatalogError::JsonParse(_))
        ));

        let bad_level_type = r#"[{"model": "a", "scope": "s", "grids": ["g"],
            "publication_delay_minutes": 0, "run_interval_hours": 1,
            "pattern": {"surface": "{model}"}}]"#;
        assert!(matches!(
            ModelCatalog::from_json(bad_level_type),
            Err(CatalogError::InvalidModel { .. })
        ));

        let no_grids = r#"[{"model": "a", "scope": "s", "grids": [],
            "publication_delay_minutes": 0, "run_interval_hours": 1,
            "pattern": {"single-level": "{model}"}}]"#;
        assert!(matches!(
            ModelCatalog::from_json(no_grids),
            Err(CatalogError::InvalidModel { .. })
        ));

        let duplicate = r#"[
            {"model": "a", "scope": "s", "grids": ["g"], "publication_delay_minutes": 0,
             "run_interval_hours": 1, "pattern": {"single-level": "{model}"}},
            {"model": "A", "scope": "s", "grids": ["g"], "publication_delay_minutes": 0,
             "run_interval_hours": 1, "pattern": {"single-level": "{model}"}}
        ]"#;
        assert!(matches!(
            ModelCatalog::from_json(duplicate),
            Err(CatalogError::DuplicateModel { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"model": "custom", "scope": "s", "grids": ["g"],
                "publication_delay_minutes": 30, "run_interval_hours": 1,
                "pattern": {{"single-level": "http://localhost/{{param}}"}}}}]"#
        )
        .unwrap();

        let catalog = ModelCatalog::load_or_builtin(Some(file.path()))
            .await
            .unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("custom").is_some());

        let missing = ModelCatalog::load(Path::new("/nonexistent/models.json")).await;
        assert!(matches!(missing, Err(CatalogError::NotFound { .. })));
    }
}
