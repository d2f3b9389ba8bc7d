//! Credential loading: environment variable first, then the user's TOML
//! config file.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

const BEARER_TOKEN_ENV: &str = "RIPPLE_BEARER_TOKEN";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub twitter: TwitterConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwitterConfig {
    pub bearer_token: String,
}

impl Config {
    /// `RIPPLE_BEARER_TOKEN` wins; otherwise read
    /// `<config dir>/ripple/config.toml`.
    pub fn load() -> Result<Self> {
        if let Ok(bearer_token) = env::var(BEARER_TOKEN_ENV) {
            return Ok(Self {
                twitter: TwitterConfig { bearer_token },
            });
        }
        Self::load_from(&Self::default_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("could not read config file: {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("could not locate a config directory")?;
        Ok(dir.join("ripple").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[twitter]\nbearer_token = \"abc123\"\n").unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.twitter.bearer_token, "abc123");
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = Config::load_from(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(err.to_string().contains("could not read"));
    }

    #[test]
    fn test_load_from_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[twitter").unwrap();
        assert!(Config::load_from(file.path()).is_err());
    }
}
