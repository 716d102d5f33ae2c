// ⚙️ Configuration - TOML file + environment overrides
//
// Resolution order:
// 1. Explicit path (CLI flag)
// 2. INDICATOR_HUB_CONFIG environment variable
// 3. ./indicator-hub.toml if present
// 4. Compiled defaults
// INDICATOR_HUB_DB then overrides the database path whatever the source.

use crate::error::{IndicatorError, Result};
use crate::geography::GeoLevel;
use crate::resolver::DEFAULT_HEADER_SEARCH_DEPTH;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "INDICATOR_HUB_CONFIG";
pub const DATABASE_ENV: &str = "INDICATOR_HUB_DB";
pub const DEFAULT_CONFIG_FILE: &str = "indicator-hub.toml";

/// Source attached to spreadsheet imports
///
/// A `[source]` table replaces the IBGE default wholesale: url and
/// description left out of it stay empty.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            name: "IBGE Censo 2022".to_string(),
            url: Some(
                "https://www.ibge.gov.br/estatisticas/sociais/populacao/22827-censo-demografico-2022.html"
                    .to_string(),
            ),
            description: Some("Tabelas do Censo 2022".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    /// Header rows tried by the column resolver, starting at the candidate
    pub header_search_depth: usize,
    pub default_year: i32,
    pub default_level: GeoLevel,
    pub server_addr: String,
    pub source: SourceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: PathBuf::from("indicator_hub.db"),
            header_search_depth: DEFAULT_HEADER_SEARCH_DEPTH,
            default_year: 2022,
            default_level: GeoLevel::State,
            server_addr: "0.0.0.0:3000".to_string(),
            source: SourceConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).map_err(|e| IndicatorError::Config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            IndicatorError::Config(format!("failed to read config file '{}': {}", path.display(), e))
        })?;
        AppConfig::from_toml_str(&content)
    }

    /// Resolve and load configuration (see module header for the order)
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);

        let mut config = match (explicit, env_path) {
            (Some(path), _) => AppConfig::from_file(path)?,
            (None, Some(path)) => AppConfig::from_file(&path)?,
            (None, None) if local.exists() => AppConfig::from_file(&local)?,
            (None, None) => AppConfig::default(),
        };

        if let Ok(db) = std::env::var(DATABASE_ENV) {
            config.database_path = PathBuf::from(db);
        }

        tracing::debug!(?config, "configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.header_search_depth == 0 {
            return Err(IndicatorError::Config(
                "header_search_depth must be at least 1".to_string(),
            ));
        }
        if self.source.name.trim().is_empty() {
            return Err(IndicatorError::Config("source.name must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.header_search_depth, 4);
        assert_eq!(config.default_year, 2022);
        assert_eq!(config.default_level, GeoLevel::State);
        assert_eq!(config.source.name, "IBGE Censo 2022");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            database_path = "/tmp/hub.db"
            header_search_depth = 6

            [source]
            name = "IBGE PNAD"
            "#,
        )
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/hub.db"));
        assert_eq!(config.header_search_depth, 6);
        assert_eq!(config.default_year, 2022);
        assert_eq!(config.source.name, "IBGE PNAD");
        assert_eq!(config.source.url, None);
    }

    #[test]
    fn test_level_parses_from_tag() {
        let config = AppConfig::from_toml_str("default_level = \"mun\"").unwrap();
        assert_eq!(config.default_level, GeoLevel::Municipality);
    }

    #[test]
    fn test_zero_depth_rejected() {
        let err = AppConfig::from_toml_str("header_search_depth = 0").unwrap_err();
        assert!(matches!(err, IndicatorError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub.toml");
        std::fs::write(&path, "default_year = 2010\n").unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.default_year, 2010);

        assert!(AppConfig::from_file(&dir.path().join("missing.toml")).is_err());
    }
}
