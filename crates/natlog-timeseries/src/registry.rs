//! Natlog Series Registry
//!
//! Owns series metadata: datatype, default reduction and interpolation,
//! unit, description, and free-form metadata. Name and type are fixed at
//! creation; the descriptive fields may be updated in place.
//!
//! A registry opened on a path persists every change to a JSON file, written
//! to a temporary file and renamed over the old one.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::datatype::Datatype;
use crate::interpolation::Interpolation;
use crate::reduction::Reduction;
use natlog_common::{NatlogError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// =============================================================================
// Series Configuration
// =============================================================================

/// Configuration of one series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub datatype: String,
    pub reduction: String,
    pub interpolation: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: String,
}

impl SeriesConfig {
    pub fn new(
        name: impl Into<String>,
        datatype: impl Into<String>,
        reduction: impl Into<String>,
        interpolation: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            datatype: datatype.into(),
            reduction: reduction.into(),
            interpolation: interpolation.into(),
            unit: String::new(),
            description: String::new(),
            metadata: String::new(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = metadata.into();
        self
    }

    /// Parsed datatype of the series.
    pub fn parsed_datatype(&self) -> Result<Datatype> {
        Datatype::parse(&self.datatype)
    }
}

/// Fields of a series that may change after creation.
///
/// `None` leaves a field untouched; `Some(String::new())` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub unit: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<String>,
}

impl ConfigUpdate {
    fn apply(self, config: &mut SeriesConfig) {
        if let Some(unit) = self.unit {
            config.unit = unit;
        }
        if let Some(description) = self.description {
            config.description = description;
        }
        if let Some(metadata) = self.metadata {
            config.metadata = metadata;
        }
    }
}

// =============================================================================
// Series Registry
// =============================================================================

/// Registry of all series configurations.
pub struct SeriesRegistry {
    series: RwLock<HashMap<String, SeriesConfig>>,
    path: Option<PathBuf>,
}

impl SeriesRegistry {
    /// A registry that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
            path: None,
        }
    }

    /// Open a registry persisted at `path`, loading it if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut series = HashMap::new();

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let configs: Vec<SeriesConfig> = serde_json::from_str(&content)?;
            for config in configs {
                series.insert(config.name.clone(), config);
            }
        }

        tracing::info!("Loaded {} series from {}", series.len(), path.display());

        Ok(Self {
            series: RwLock::new(series),
            path: Some(path),
        })
    }

    /// Create a series. Fails if the type or a strategy name is invalid, or
    /// the name is taken.
    pub fn create(&self, config: SeriesConfig) -> Result<()> {
        config.parsed_datatype()?;
        config.reduction.parse::<Reduction>()?;
        config.interpolation.parse::<Interpolation>()?;

        let mut series = self.series.write();
        if series.contains_key(&config.name) {
            return Err(NatlogError::SeriesCreation(config.name));
        }

        self.persist(series.values().chain(std::iter::once(&config)))?;

        tracing::info!("Created series {} ({})", config.name, config.datatype);
        series.insert(config.name.clone(), config);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<SeriesConfig> {
        self.series.read().get(name).cloned()
    }

    /// Overwrite the supplied descriptive fields of a series.
    pub fn update(&self, name: &str, update: ConfigUpdate) -> Result<SeriesConfig> {
        let mut series = self.series.write();
        let mut updated = series
            .get(name)
            .cloned()
            .ok_or_else(|| NatlogError::SeriesNotFound(name.to_string()))?;
        update.apply(&mut updated);

        self.persist(
            series
                .values()
                .filter(|c| c.name != name)
                .chain(std::iter::once(&updated)),
        )?;

        series.insert(name.to_string(), updated.clone());
        Ok(updated)
    }

    /// Names of all series, in no particular order.
    pub fn list(&self) -> Vec<String> {
        self.series.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.series.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.read().is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn persist<'a>(&self, configs: impl Iterator<Item = &'a SeriesConfig>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut configs: Vec<&SeriesConfig> = configs.collect();
        configs.sort_by(|a, b| a.name.cmp(&b.name));
        let content = serde_json::to_string_pretty(&configs)?;

        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, path)?;
        Ok(())
    }
}

impl Default for SeriesRegistry {
    fn default() -> Self {
        Self::in_memory()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str) -> SeriesConfig {
        SeriesConfig::new(name, "int32", "sum", "zero")
            .with_unit("C")
            .with_description("temperature")
    }

    #[test]
    fn test_create_and_get() {
        let registry = SeriesRegistry::in_memory();
        registry.create(config("foo")).expect("create");

        let stored = registry.get("foo").expect("series exists");
        assert_eq!(stored, config("foo"));
        assert!(registry.get("bar").is_none());
        assert_eq!(registry.list(), vec!["foo".to_string()]);
    }

    #[test]
    fn test_create_duplicate() {
        let registry = SeriesRegistry::in_memory();
        registry.create(config("foo")).expect("create");

        let err = registry.create(config("foo")).expect_err("duplicate");
        assert!(matches!(err, NatlogError::SeriesCreation(name) if name == "foo"));
    }

    #[test]
    fn test_create_invalid() {
        let registry = SeriesRegistry::in_memory();

        let err = registry
            .create(SeriesConfig::new("foo", "int33", "sum", "zero"))
            .expect_err("bad type");
        assert!(matches!(err, NatlogError::Type(_)));

        let err = registry
            .create(SeriesConfig::new("foo", "int32", "median", "zero"))
            .expect_err("bad reduction");
        assert!(matches!(err, NatlogError::Selector(_)));

        let err = registry
            .create(SeriesConfig::new("foo", "int32", "sum", "cubic"))
            .expect_err("bad interpolation");
        assert!(matches!(&err, NatlogError::Selector(msg) if msg.contains("cubic")));

        assert!(registry.is_empty());
    }

    #[test]
    fn test_update_fields() {
        let registry = SeriesRegistry::in_memory();
        registry.create(config("foo")).expect("create");

        let updated = registry
            .update(
                "foo",
                ConfigUpdate {
                    unit: Some(String::new()),
                    metadata: Some("{\"rack\": 4}".to_string()),
                    ..Default::default()
                },
            )
            .expect("update");

        assert_eq!(updated.unit, "");
        assert_eq!(updated.description, "temperature");
        assert_eq!(updated.metadata, "{\"rack\": 4}");
        assert_eq!(registry.get("foo"), Some(updated));
    }

    #[test]
    fn test_update_missing() {
        let registry = SeriesRegistry::in_memory();
        let err = registry
            .update("nope", ConfigUpdate::default())
            .expect_err("missing series");
        assert!(matches!(err, NatlogError::SeriesNotFound(_)));
    }

    #[test]
    fn test_persistence() {
        let temp_dir = tempfile::tempdir().expect("failed to create temp directory");
        let path = temp_dir.path().join("series.json");

        {
            let registry = SeriesRegistry::open(&path).expect("open");
            registry.create(config("a")).expect("create a");
            registry.create(config("b")).expect("create b");
            registry
                .update(
                    "b",
                    ConfigUpdate {
                        description: Some("updated".to_string()),
                        ..Default::default()
                    },
                )
                .expect("update");
        }

        let registry = SeriesRegistry::open(&path).expect("reopen");
        let mut names = registry.list();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(registry.get("b").expect("b").description, "updated");
        assert!(!temp_dir.path().join("series.json.tmp").exists());
    }

    #[test]
    fn test_config_serde_uses_type_key() {
        let json = serde_json::to_value(config("foo")).expect("serialize");
        assert_eq!(json["type"], "int32");
        assert_eq!(json["reduction"], "sum");
    }
}
