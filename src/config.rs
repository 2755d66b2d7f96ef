//! TOML configuration parsing and validation.
//!
//! Every section is optional. A missing file is not an error for the CLI:
//! [`load_or_default`] falls back to [`Config::default`], which keeps the
//! database under `./data/codx.sqlite`.
//!
//! ```toml
//! [db]
//! path = "./data/codx.sqlite"
//!
//! [search]
//! limit = 50
//! prefix_match = true
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/codx.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Default number of results returned by `search` and `list`.
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Append `*` to terms of two or more characters.
    #[serde(default = "default_prefix_match")]
    pub prefix_match: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            prefix_match: default_prefix_match(),
        }
    }
}

fn default_limit() -> i64 {
    50
}

fn default_prefix_match() -> bool {
    true
}

impl Config {
    /// Configuration pointing at an explicit database file, defaults elsewhere.
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig { path: path.into() },
            search: SearchConfig::default(),
        }
    }
}

/// Parse and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise return the built-in defaults.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.db.path.as_os_str().is_empty() {
        anyhow::bail!("db.path must not be empty");
    }

    if config.search.limit < 1 {
        anyhow::bail!("search.limit must be >= 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        validate(&config).unwrap();
        assert_eq!(config.db.path, PathBuf::from("./data/codx.sqlite"));
        assert_eq!(config.search.limit, 50);
        assert!(config.search.prefix_match);
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
            [db]
            path = "/tmp/snips.sqlite"

            [search]
            prefix_match = false
            "#,
        )
        .unwrap();
        assert_eq!(config.db.path, PathBuf::from("/tmp/snips.sqlite"));
        assert_eq!(config.search.limit, 50);
        assert!(!config.search.prefix_match);
    }

    #[test]
    fn test_rejects_zero_limit() {
        let config: Config = toml::from_str("[search]\nlimit = 0\n").unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("search.limit"));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = load_or_default(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.search.limit, 50);
    }

    #[test]
    fn test_load_config_reports_parse_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("codx.toml");
        std::fs::write(&path, "[db\npath = 1").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
