use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShelfError};

/// Root application configuration, loaded from `~/.config/shelfmark/config.toml`.
///
/// Secrets never live in this file. Each credential is read from the
/// environment variable named by the matching `*_env` key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    pub fetch: FetchConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub max_results: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    pub accept_language: String,
    pub timeout_secs: u64,
    /// Only this many bytes of a page body are read.
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Airtable,
    Firestore,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = ShelfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "airtable" => Ok(Self::Airtable),
            "firestore" => Ok(Self::Firestore),
            "memory" => Ok(Self::Memory),
            other => Err(ShelfError::ConfigError(format!(
                "unknown storage backend `{other}` (expected airtable, firestore or memory)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub timeout_secs: u64,
    pub airtable: AirtableConfig,
    pub firestore: FirestoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AirtableConfig {
    pub api_url: String,
    pub base_id: String,
    pub table: String,
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FirestoreConfig {
    pub api_url: String,
    pub project_id: String,
    pub database: String,
    pub collection: String,
    pub access_token_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served for every path that is not an API route.
    pub static_dir: String,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.googleapis.com/books/v1/volumes".to_string(),
            api_key_env: "GOOGLE_BOOKS_API_KEY".to_string(),
            max_results: 5,
            timeout_secs: 10,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                         AppleWebKit/537.36 (KHTML, like Gecko) \
                         Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "en-GB,en;q=0.9".to_string(),
            timeout_secs: 12,
            max_body_bytes: 80_000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            timeout_secs: 10,
            airtable: AirtableConfig::default(),
            firestore: FirestoreConfig::default(),
        }
    }
}

impl Default for AirtableConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.airtable.com/v0".to_string(),
            base_id: String::new(),
            table: "Books".to_string(),
            api_key_env: "AIRTABLE_API_KEY".to_string(),
        }
    }
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            api_url: "https://firestore.googleapis.com/v1".to_string(),
            project_id: String::new(),
            database: "(default)".to_string(),
            collection: "books".to_string(),
            access_token_env: "FIRESTORE_ACCESS_TOKEN".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            static_dir: ".".to_string(),
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/shelfmark/config.toml`
    pub fn config_path() -> PathBuf {
        // Allow override via env var
        if let Ok(path) = std::env::var("SHELFMARK_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("shelfmark")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        Self::load_from(&path)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    /// Applies `SHELFMARK_STORAGE` and `PORT` on top of the file values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(backend) = lookup("SHELFMARK_STORAGE") {
            self.storage.backend = backend.parse()?;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ShelfError::ConfigError(format!("PORT is not a valid port: {port}")))?;
        }
        Ok(())
    }
}

impl CatalogConfig {
    /// The catalog API key, if the configured env var is set.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl StorageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
