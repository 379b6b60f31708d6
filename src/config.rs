use crate::schema::Schema;
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Storage settings read from a TOML file.
///
/// ```toml
/// db_path = "unigrande.db"
/// busy_timeout_ms = 5000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageSettings {
    /// Path to the SQLite database file, or `:memory:`
    pub db_path: String,
    #[serde(default)]
    pub busy_timeout_ms: Option<u64>,
}

impl StorageSettings {
    pub fn in_memory() -> Self {
        Self {
            db_path: ":memory:".to_string(),
            busy_timeout_ms: None,
        }
    }

    pub fn from_toml_str(source: &str) -> anyhow::Result<Self> {
        toml::from_str(source).context("invalid storage settings")
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read storage settings from {}", path.display()))?;
        Self::from_toml_str(&source).with_context(|| format!("in {}", path.display()))
    }

    pub fn busy_timeout(&self) -> Option<Duration> {
        self.busy_timeout_ms.map(Duration::from_millis)
    }
}

/// Records service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RecordsConfig {
    pub settings: StorageSettings,
    /// Schema definition for the database
    pub schema: Schema,
}

impl RecordsConfig {
    /// Create a new config with path and schema
    pub fn new(db_path: impl Into<String>, schema: Schema) -> Self {
        Self {
            settings: StorageSettings {
                db_path: db_path.into(),
                busy_timeout_ms: None,
            },
            schema,
        }
    }

    pub fn from_settings(settings: StorageSettings, schema: Schema) -> Self {
        Self { settings, schema }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_settings() {
        let settings = StorageSettings::from_toml_str(r#"db_path = "records.db""#).unwrap();
        assert_eq!(settings.db_path, "records.db");
        assert_eq!(settings.busy_timeout(), None);
    }

    #[test]
    fn parses_busy_timeout() {
        let settings =
            StorageSettings::from_toml_str("db_path = \":memory:\"\nbusy_timeout_ms = 250").unwrap();
        assert_eq!(settings, StorageSettings {
            busy_timeout_ms: Some(250),
            ..StorageSettings::in_memory()
        });
        assert_eq!(settings.busy_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn rejects_missing_path() {
        assert!(StorageSettings::from_toml_str("busy_timeout_ms = 10").is_err());
    }
}
