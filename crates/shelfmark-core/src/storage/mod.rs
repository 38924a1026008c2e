//! Storage port for book records and its adapters.
//!
//! The collection is treated as an append-only bag: records are queried by a
//! single field and inserted, never updated or deleted.

pub mod airtable;
pub mod firestore;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{Result, ShelfError};
use crate::models::BookRecord;

pub use airtable::{AirtableSettings, AirtableStore};
pub use firestore::{FirestoreSettings, FirestoreStore};
pub use memory::MemoryStore;

/// Fields a store can be filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreField {
    ExternalCatalogId,
    Isbn,
    Title,
}

/// A record as it comes back from a store: its id plus the raw fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub fields: Value,
}

#[async_trait]
pub trait BookStore: Send + Sync {
    /// Short backend name used in logs and errors.
    fn backend(&self) -> &str;

    async fn query_by_field(
        &self,
        field: StoreField,
        value: &str,
        limit: usize,
    ) -> Result<Vec<StoredRecord>>;

    /// Writes a new record and returns the id the store assigned to it.
    async fn insert(&self, record: &BookRecord) -> Result<String>;
}

/// Opens the configured store, resolving credentials from the environment.
///
/// Fails before any network access when a credential or required setting is
/// missing.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn BookStore>> {
    open_store_with(config, |name| std::env::var(name).ok())
}

pub fn open_store_with(
    config: &StorageConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Arc<dyn BookStore>> {
    let secret = |env_var: &str, purpose: &str| -> Result<String> {
        lookup(env_var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ShelfError::MissingCredential {
                env_var: env_var.to_string(),
                purpose: purpose.to_string(),
            })
    };

    match config.backend {
        StorageBackend::Airtable => {
            let airtable = &config.airtable;
            require("storage.airtable.base_id", &airtable.base_id)?;
            require("storage.airtable.table", &airtable.table)?;
            let api_key = secret(&airtable.api_key_env, "Airtable personal access token")?;
            let store = AirtableStore::new(AirtableSettings {
                api_url: airtable.api_url.clone(),
                base_id: airtable.base_id.clone(),
                table: airtable.table.clone(),
                api_key,
                timeout: config.timeout(),
            })?;
            Ok(Arc::new(store))
        }
        StorageBackend::Firestore => {
            let firestore = &config.firestore;
            require("storage.firestore.project_id", &firestore.project_id)?;
            require("storage.firestore.collection", &firestore.collection)?;
            let access_token = secret(&firestore.access_token_env, "Firestore OAuth access token")?;
            let store = FirestoreStore::new(FirestoreSettings {
                api_url: firestore.api_url.clone(),
                project_id: firestore.project_id.clone(),
                database: firestore.database.clone(),
                collection: firestore.collection.clone(),
                access_token,
                timeout: config.timeout(),
            })?;
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::default())),
    }
}

fn require(key: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ShelfError::ConfigError(format!(
            "`{key}` is not set in the config file"
        )));
    }
    Ok(())
}

pub(crate) fn http_client(timeout: std::time::Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("shelfmark/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ShelfError::Http)
}

/// Turns a non-2xx response into a store error carrying status and body.
pub(crate) async fn check_status(
    backend: &str,
    resp: reqwest::Response,
) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(ShelfError::store(backend, format!("HTTP {status}: {body}")))
}
