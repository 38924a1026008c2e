use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{BookStore, StoreField, StoredRecord, check_status, http_client};
use crate::error::{Result, ShelfError};
use crate::models::BookRecord;

const BACKEND: &str = "airtable";

/// Connection settings for an Airtable table, credentials already resolved.
#[derive(Debug, Clone)]
pub struct AirtableSettings {
    pub api_url: String,
    pub base_id: String,
    pub table: String,
    pub api_key: String,
    pub timeout: Duration,
}

/// Stores records as rows of an Airtable table.
pub struct AirtableStore {
    client: reqwest::Client,
    settings: AirtableSettings,
}

#[derive(Debug, Deserialize)]
struct RecordList {
    #[serde(default)]
    records: Vec<AirtableRecord>,
}

#[derive(Debug, Deserialize)]
struct AirtableRecord {
    id: String,
    #[serde(default)]
    fields: Value,
}

impl AirtableStore {
    pub fn new(settings: AirtableSettings) -> Result<Self> {
        Ok(Self {
            client: http_client(settings.timeout)?,
            settings,
        })
    }

    fn table_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.settings.api_url.trim_end_matches('/'),
            self.settings.base_id,
            urlencoding::encode(&self.settings.table)
        )
    }
}

#[async_trait]
impl BookStore for AirtableStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn query_by_field(
        &self,
        field: StoreField,
        value: &str,
        limit: usize,
    ) -> Result<Vec<StoredRecord>> {
        let formula = format!("{{{}}} = {}", column_name(field), formula_string(value));
        let max_records = limit.max(1).to_string();
        let resp = self
            .client
            .get(self.table_url())
            .bearer_auth(&self.settings.api_key)
            .query(&[
                ("filterByFormula", formula.as_str()),
                ("maxRecords", max_records.as_str()),
            ])
            .send()
            .await?;
        let list: RecordList = check_status(BACKEND, resp).await?.json().await?;

        Ok(list
            .records
            .into_iter()
            .map(|r| StoredRecord {
                id: r.id,
                fields: r.fields,
            })
            .collect())
    }

    async fn insert(&self, record: &BookRecord) -> Result<String> {
        let body = json!({ "fields": row_fields(record) });
        let resp = self
            .client
            .post(self.table_url())
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await?;
        let created: AirtableRecord = check_status(BACKEND, resp).await?.json().await?;
        if created.id.is_empty() {
            return Err(ShelfError::store(BACKEND, "created record has no id"));
        }
        tracing::debug!(id = %created.id, table = %self.settings.table, "airtable record created");
        Ok(created.id)
    }
}

fn column_name(field: StoreField) -> &'static str {
    match field {
        StoreField::ExternalCatalogId => "Google Books ID",
        StoreField::Isbn => "ISBN",
        StoreField::Title => "Title",
    }
}

/// Quotes a value as an Airtable formula string literal.
fn formula_string(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

/// Maps a record onto the table's columns. Optional columns are left out
/// when empty so Airtable keeps them blank.
fn row_fields(record: &BookRecord) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("Title".into(), json!(record.title));
    fields.insert("Author".into(), json!(record.author));
    fields.insert("Cover URL".into(), json!(record.cover_url));
    fields.insert("Genre".into(), json!(record.genre));
    fields.insert("Publisher".into(), json!(record.publisher));
    fields.insert("ISBN".into(), json!(record.isbn));
    fields.insert("Google Books ID".into(), json!(record.external_catalog_id));
    fields.insert("List".into(), json!(record.list.as_str()));

    let added = record.date_added.unwrap_or_else(Utc::now);
    fields.insert("Date Added".into(), json!(added.date_naive().to_string()));

    if let Some(year) = record.year() {
        fields.insert("Published Year".into(), json!(year));
    }
    if !record.tags.is_empty() {
        fields.insert("Tags".into(), json!(record.tags));
    }
    if !record.notes.is_empty() {
        fields.insert("Notes".into(), json!(record.notes));
    }
    fields
}
