//! Load configuration from JSON text, a file, or the environment.

use crate::config::Config;
use crate::error::ConfigError;
use std::path::Path;

pub const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Everything a process needs to build its managers.
#[derive(Clone, Debug)]
pub struct EnvConfig {
    pub config: Config,
    pub database_url: String,
    pub max_connections: u32,
}

impl Config {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let value = serde_json::from_str(s).map_err(|e| ConfigError::Load(e.to_string()))?;
        Config::from_value(value)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        Config::from_json_str(&text)
    }

    /// Reads `.env` (if present), then `MSHOP_CONFIG` (path of a JSON file, optional),
    /// `DATABASE_URL` (default in-memory SQLite) and `DATABASE_MAX_CONNECTIONS`.
    pub fn from_env() -> Result<EnvConfig, ConfigError> {
        let _ = dotenvy::dotenv();
        let config = match std::env::var("MSHOP_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Config::from_file(path.trim())?,
            _ => Config::new(),
        };
        let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.into());
        let max_connections = match std::env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(v) => v
                .trim()
                .parse()
                .map_err(|_| ConfigError::Load(format!("DATABASE_MAX_CONNECTIONS: not a number: {}", v)))?,
            Err(_) => DEFAULT_MAX_CONNECTIONS,
        };
        Ok(EnvConfig {
            config,
            database_url,
            max_connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_text() {
        let config = Config::from_json_str(r#"{"mshop": {"common": {"manager": {"slice": 20}}}}"#).unwrap();
        assert_eq!(config.get_or("mshop/common/manager/slice", 0u64), 20);
        assert!(matches!(Config::from_json_str("{"), Err(ConfigError::Load(_))));
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let err = Config::from_file("/nonexistent/mshop.json").unwrap_err();
        assert!(matches!(err, ConfigError::Load(m) if m.contains("/nonexistent/mshop.json")));
    }
}
