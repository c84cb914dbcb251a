use crate::error::{Error, Result};
use directories::ProjectDirs;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_API_URL: &str = "DOCLENS_API_URL";
pub const ENV_CACHE_DIR: &str = "DOCLENS_CACHE_DIR";
pub const ENV_LOG: &str = "DOCLENS_LOG";

/// Client configuration, read from `config.toml` in the platform config directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// Server root, without the API prefix.
    pub api_url: String,
    /// Prefix under which the document endpoints are mounted.
    pub api_prefix: String,
    /// Upper bound for every single request, in seconds.
    pub timeout_secs: u64,
    /// Chunks retrieved per document when answering a question.
    pub top_k_per_doc: u32,
    /// Where the blob cache lives. `~` is expanded.
    pub cache_dir: Option<String>,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            api_prefix: "/api/v1".to_string(),
            // Uploads run OCR and embedding before answering.
            timeout_secs: 120,
            top_k_per_doc: 3,
            cache_dir: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "doclens")
    }

    pub fn default_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from `path` (or the default location), then apply environment overrides.
    /// A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        let mut config = match path {
            Some(ref p) if p.exists() => {
                let raw = std::fs::read_to_string(p)?;
                Self::from_toml(&raw)?
            }
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_url = url;
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR) {
            self.cache_dir = Some(dir);
        }
        if let Some(level) = lookup(ENV_LOG) {
            self.log_level = level;
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolved cache directory.
    pub fn cache_path(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(PathBuf::from(shellexpand::tilde(dir).to_string())),
            None => Self::project_dirs()
                .map(|dirs| dirs.data_dir().to_path_buf())
                .ok_or_else(|| Error::Config("no home directory to place the cache in".into())),
        }
    }

    pub fn json_schema() -> Result<String> {
        let schema = schemars::schema_for!(Config);
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}
