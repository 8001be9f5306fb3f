//! Configuration loaded from TOML
//!
//! ```toml
//! [compiler]
//! dialect = "sqlite"
//! create_schemas = false
//!
//! [snowflake]
//! epoch_millis = 1704067200000
//! worker_id = 7
//! ```
//!
//! Every key is optional.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::SnowflakeConfig;
use crate::sql::CompilerConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub compiler: CompilerConfig,
    pub snowflake: SnowflakeConfig,
}

impl Config {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::DEFAULT_EPOCH;
    use crate::sql::SqlDialect;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.compiler.dialect, SqlDialect::Postgres);
        assert!(config.compiler.create_schemas);
        assert_eq!(config.snowflake.epoch_millis, DEFAULT_EPOCH);
        assert_eq!(config.snowflake.worker_id, None);
    }

    #[test]
    fn test_partial_config() {
        let config = Config::from_toml_str(
            r#"
            [compiler]
            dialect = "sqlite"

            [snowflake]
            worker_id = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.compiler.dialect, SqlDialect::Sqlite);
        assert!(config.compiler.create_schemas);
        assert_eq!(config.snowflake.worker_id, Some(7));
    }

    #[test]
    fn test_invalid_config() {
        let err = Config::from_toml_str("[compiler]\ndialect = \"oracle\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
