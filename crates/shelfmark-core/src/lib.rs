//! shelfmark core: book records, configuration and the storage port.

pub mod config;
pub mod error;
pub mod models;
pub mod storage;

pub use config::{AppConfig, StorageBackend};
pub use error::{ExitCode, Result, ShelfError};
pub use models::*;

pub use storage::{BookStore, MemoryStore, StoreField, StoredRecord, open_store};
