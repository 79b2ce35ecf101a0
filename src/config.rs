//! Tracker configuration.
//!
//! Defaults, then an optional TOML file, then environment variables (a `.env`
//! file is honoured). Secrets such as `OPENAI_API_KEY` are read from the
//! environment only, by the vision client.

use crate::ledger::DEFAULT_UNIT_SIZE;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "BET_TRACKER_CONFIG";
pub const OPENAI_CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,

    #[serde(default = "default_unit_size")]
    pub default_unit_size: f64,

    /// HTTP API port for `serve`
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub vision: VisionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

fn default_database_path() -> String {
    "./bet_tracker.db".to_string()
}

fn default_unit_size() -> f64 {
    DEFAULT_UNIT_SIZE
}

fn default_port() -> u16 {
    8080
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_tokens() -> u32 {
    300
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_endpoint() -> String {
    OPENAI_CHAT_COMPLETIONS_URL.to_string()
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            default_unit_size: default_unit_size(),
            port: default_port(),
            vision: VisionConfig::default(),
        }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            endpoint: default_endpoint(),
        }
    }
}

impl TrackerConfig {
    /// Resolve configuration for this process.
    ///
    /// `path` wins over `BET_TRACKER_CONFIG`; with neither, built-in defaults
    /// are the base. Environment variables are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));

        let mut config = match path {
            Some(p) => Self::from_toml_file(&p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing config file {}", path.display()))
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("DATABASE_PATH") {
            self.database_path = v;
        }
        if let Some(v) = var("DEFAULT_UNIT_SIZE").and_then(|v| v.trim().parse::<f64>().ok()) {
            self.default_unit_size = v;
        }
        if let Some(v) = var("PORT").and_then(|v| v.trim().parse::<u16>().ok()) {
            self.port = v;
        }
        if let Some(v) = var("VISION_MODEL") {
            self.vision.model = v;
        }
        if let Some(v) = var("VISION_MAX_TOKENS").and_then(|v| v.trim().parse::<u32>().ok()) {
            self.vision.max_tokens = v;
        }
        if let Some(v) = var("VISION_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|&v| v > 0)
        {
            self.vision.timeout_secs = v;
        }
        if let Some(v) = var("VISION_ENDPOINT") {
            self.vision.endpoint = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.database_path, "./bet_tracker.db");
        assert_eq!(config.default_unit_size, 5.0);
        assert_eq!(config.vision.max_tokens, 300);
        assert_eq!(config.vision.endpoint, OPENAI_CHAT_COMPLETIONS_URL);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "database_path = \"/tmp/ledger.db\"\n\n[vision]\nmodel = \"gpt-4o-mini\""
        )
        .unwrap();

        let config = TrackerConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.database_path, "/tmp/ledger.db");
        assert_eq!(config.vision.model, "gpt-4o-mini");
        assert_eq!(config.vision.max_tokens, 300);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_env_overrides_and_ignores_garbage() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_PATH", "/data/bets.db"),
            ("DEFAULT_UNIT_SIZE", "10"),
            ("PORT", "not-a-port"),
            ("VISION_TIMEOUT_SECS", "0"),
            ("VISION_MODEL", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = TrackerConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database_path, "/data/bets.db");
        assert_eq!(config.default_unit_size, 10.0);
        assert_eq!(config.port, 8080);
        assert_eq!(config.vision.timeout_secs, 60);
        assert_eq!(config.vision.model, "gpt-4o");
    }
}
