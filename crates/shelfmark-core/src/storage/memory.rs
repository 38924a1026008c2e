use std::sync::Mutex;

use async_trait::async_trait;

use super::{BookStore, StoreField, StoredRecord};
use crate::error::Result;
use crate::models::BookRecord;

/// In-process store. Nothing survives the process; used for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<(String, BookRecord)>>,
}

impl MemoryStore {
    pub fn with_records(records: impl IntoIterator<Item = BookRecord>) -> Self {
        let store = Self::default();
        {
            let mut rows = store.rows();
            for record in records {
                let id = format!("mem{}", rows.len() + 1);
                rows.push((id, record));
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> Vec<BookRecord> {
        self.rows().iter().map(|(_, r)| r.clone()).collect()
    }

    fn rows(&self) -> std::sync::MutexGuard<'_, Vec<(String, BookRecord)>> {
        // A poisoned lock only means another test thread panicked mid-push.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn field_value(record: &BookRecord, field: StoreField) -> &str {
    match field {
        StoreField::ExternalCatalogId => &record.external_catalog_id,
        StoreField::Isbn => &record.isbn,
        StoreField::Title => &record.title,
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn query_by_field(
        &self,
        field: StoreField,
        value: &str,
        limit: usize,
    ) -> Result<Vec<StoredRecord>> {
        let rows = self.rows();
        let mut out = Vec::new();
        for (id, record) in rows.iter() {
            if out.len() >= limit.max(1) {
                break;
            }
            if field_value(record, field) == value {
                out.push(StoredRecord {
                    id: id.clone(),
                    fields: serde_json::to_value(record)?,
                });
            }
        }
        Ok(out)
    }

    async fn insert(&self, record: &BookRecord) -> Result<String> {
        let mut rows = self.rows();
        let id = format!("mem{}", rows.len() + 1);
        rows.push((id.clone(), record.clone()));
        Ok(id)
    }
}
