use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{BookStore, StoreField, StoredRecord, check_status, http_client};
use crate::error::{Result, ShelfError};
use crate::models::BookRecord;

const BACKEND: &str = "firestore";

/// Connection settings for a Firestore collection, credentials already resolved.
#[derive(Debug, Clone)]
pub struct FirestoreSettings {
    pub api_url: String,
    pub project_id: String,
    pub database: String,
    pub collection: String,
    pub access_token: String,
    pub timeout: Duration,
}

/// Stores records as documents of a Firestore collection, through the REST API.
pub struct FirestoreStore {
    client: reqwest::Client,
    settings: FirestoreSettings,
}

#[derive(Debug, Deserialize)]
struct QueryRow {
    document: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl FirestoreStore {
    pub fn new(settings: FirestoreSettings) -> Result<Self> {
        Ok(Self {
            client: http_client(settings.timeout)?,
            settings,
        })
    }

    fn documents_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents",
            self.settings.api_url.trim_end_matches('/'),
            self.settings.project_id,
            self.settings.database
        )
    }
}

#[async_trait]
impl BookStore for FirestoreStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn query_by_field(
        &self,
        field: StoreField,
        value: &str,
        limit: usize,
    ) -> Result<Vec<StoredRecord>> {
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": self.settings.collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": field_path(field) },
                        "op": "EQUAL",
                        "value": { "stringValue": value }
                    }
                },
                "limit": limit.max(1)
            }
        });
        let resp = self
            .client
            .post(format!("{}:runQuery", self.documents_url()))
            .bearer_auth(&self.settings.access_token)
            .json(&body)
            .send()
            .await?;
        let rows: Vec<QueryRow> = check_status(BACKEND, resp).await?.json().await?;

        // An empty result is a single row carrying only `readTime`.
        Ok(rows
            .into_iter()
            .filter_map(|row| row.document)
            .map(|doc| StoredRecord {
                id: document_id(&doc.name).to_string(),
                fields: decode_fields(&doc.fields),
            })
            .collect())
    }

    async fn insert(&self, record: &BookRecord) -> Result<String> {
        let body = json!({ "fields": encode_fields(record) });
        let resp = self
            .client
            .post(format!("{}/{}", self.documents_url(), self.settings.collection))
            .bearer_auth(&self.settings.access_token)
            .json(&body)
            .send()
            .await?;
        let created: Document = check_status(BACKEND, resp).await?.json().await?;
        let id = document_id(&created.name);
        if id.is_empty() {
            return Err(ShelfError::store(BACKEND, "created document has no name"));
        }
        tracing::debug!(id, collection = %self.settings.collection, "firestore document created");
        Ok(id.to_string())
    }
}

fn field_path(field: StoreField) -> &'static str {
    match field {
        StoreField::ExternalCatalogId => "googleId",
        StoreField::Isbn => "isbn",
        StoreField::Title => "title",
    }
}

fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or_default()
}

fn string_value(s: &str) -> Value {
    json!({ "stringValue": s })
}

fn encode_fields(record: &BookRecord) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("title".into(), string_value(&record.title));
    fields.insert("author".into(), string_value(&record.author));
    fields.insert("publisher".into(), string_value(&record.publisher));
    fields.insert("publishedYear".into(), string_value(&record.published_year));
    fields.insert("genre".into(), string_value(&record.genre));
    fields.insert("description".into(), string_value(&record.description));
    fields.insert("isbn".into(), string_value(&record.isbn));
    fields.insert("googleId".into(), string_value(&record.external_catalog_id));
    fields.insert("coverUrl".into(), string_value(&record.cover_url));
    fields.insert("coverSource".into(), string_value(&record.cover_source.to_string()));
    fields.insert("list".into(), string_value(record.list.as_str()));
    fields.insert("notes".into(), string_value(&record.notes));

    let tags: Vec<Value> = record.tags.iter().map(|t| string_value(t)).collect();
    fields.insert("tags".into(), json!({ "arrayValue": { "values": tags } }));

    let added = record.date_added.unwrap_or_else(Utc::now);
    fields.insert(
        "dateAdded".into(),
        json!({ "timestampValue": added.to_rfc3339_opts(SecondsFormat::Secs, true) }),
    );
    fields
}

/// Flattens typed Firestore values into plain JSON.
fn decode_fields(fields: &Map<String, Value>) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), decode_value(v)))
            .collect(),
    )
}

fn decode_value(v: &Value) -> Value {
    let Some(obj) = v.as_object() else {
        return Value::Null;
    };
    let Some((kind, inner)) = obj.iter().next() else {
        return Value::Null;
    };
    match kind.as_str() {
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|vals| vals.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => inner
            .get("fields")
            .and_then(Value::as_object)
            .map(decode_fields)
            .unwrap_or_else(|| Value::Object(Map::new())),
        // Firestore sends 64-bit integers as strings.
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::from)
            .unwrap_or_else(|| inner.clone()),
        "nullValue" => Value::Null,
        _ => inner.clone(),
    }
}
