use std::borrow::Cow;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use reqwest::Url;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use shelfmark_core::config::CatalogConfig;
use shelfmark_core::{BookRecord, CoverSource, UNKNOWN_AUTHOR, UNKNOWN_TITLE};

use super::Catalog;
use crate::error::{LookupError, Result};
use crate::http::HttpClient;
use crate::identifiers::isbn::{as_isbn13, preferred_isbn};

static ZOOM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([?&])zoom=\d+(&?)").expect("valid regex"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolumeList {
    #[serde(default)]
    pub items: Vec<Volume>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub volume_info: VolumeInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VolumeInfo {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub categories: Vec<String>,
    pub description: Option<String>,
    pub industry_identifiers: Vec<IndustryIdentifier>,
    pub image_links: ImageLinks,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndustryIdentifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub identifier: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageLinks {
    pub small_thumbnail: Option<String>,
    pub thumbnail: Option<String>,
    pub medium: Option<String>,
    pub large: Option<String>,
    pub extra_large: Option<String>,
}

impl ImageLinks {
    /// Largest available size: extraLarge > large > medium > thumbnail.
    pub fn best(&self) -> Option<&str> {
        [&self.extra_large, &self.large, &self.medium, &self.thumbnail]
            .into_iter()
            .filter_map(|link| link.as_deref())
            .find(|link| !link.is_empty())
    }
}

impl Volume {
    pub fn into_record(self) -> BookRecord {
        let info = self.volume_info;
        let author = if info.authors.is_empty() {
            UNKNOWN_AUTHOR.to_string()
        } else {
            info.authors.join(", ")
        };
        let isbn = preferred_isbn(
            info.industry_identifiers
                .iter()
                .map(|id| (id.kind.as_str(), id.identifier.as_str())),
        );
        let cover_url = info
            .image_links
            .best()
            .map(normalize_cover_url)
            .unwrap_or_default();

        BookRecord {
            title: info.title.unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            author,
            publisher: info.publisher.unwrap_or_default(),
            published_year: published_year(info.published_date.as_deref().unwrap_or_default()),
            genre: info.categories.into_iter().next().unwrap_or_default(),
            description: info.description.unwrap_or_default(),
            isbn,
            external_catalog_id: self.id,
            cover_url,
            cover_source: CoverSource::Catalog,
            ..BookRecord::default()
        }
    }
}

/// First four characters of a publication date. `"2021-05-04"` and `"2021"`
/// both give `"2021"`; anything else is truncated as-is.
pub fn published_year(date: &str) -> String {
    date.chars().take(4).collect()
}

/// Drops every `zoom=N` parameter and forces https. Idempotent.
pub fn normalize_cover_url(url: &str) -> String {
    let mut unzoomed = url.to_string();
    // Adjacent zoom params share a separator, so one pass can leave one behind.
    while ZOOM_RE.is_match(&unzoomed) {
        unzoomed = ZOOM_RE
            .replace_all(&unzoomed, |caps: &Captures| {
                let keeps_params = !caps[2].is_empty();
                match (&caps[1], keeps_params) {
                    ("?", true) => "?",
                    (_, true) => "&",
                    (_, false) => "",
                }
            })
            .into_owned();
    }
    upgrade_to_https(&unzoomed).into_owned()
}

pub fn upgrade_to_https(url: &str) -> Cow<'_, str> {
    match url.strip_prefix("http://") {
        Some(rest) => Cow::Owned(format!("https://{rest}")),
        None => Cow::Borrowed(url),
    }
}

/// Google Books volumes API.
pub struct GoogleBooks {
    client: HttpClient,
    base_url: String,
    max_results: u32,
    api_key: Option<String>,
}

impl GoogleBooks {
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        Self::with_params(config, config.api_key())
    }

    pub fn with_params(config: &CatalogConfig, api_key: Option<String>) -> Result<Self> {
        let client = HttpClient::new(
            concat!("shelfmark/", env!("CARGO_PKG_VERSION")),
            config.timeout(),
            HeaderMap::new(),
        )?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            max_results: config.max_results,
            api_key,
        })
    }

    fn search_url(&self, q: &str, max_results: Option<u32>) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| LookupError::InvalidUrl(self.base_url.clone(), e.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", q);
            if let Some(n) = max_results {
                pairs.append_pair("maxResults", &n.to_string());
            }
            if let Some(key) = &self.api_key {
                pairs.append_pair("key", key);
            }
        }
        Ok(url)
    }

    pub async fn search(&self, q: &str, max_results: Option<u32>) -> Result<Vec<Volume>> {
        let url = self.search_url(q, max_results)?;
        let list: VolumeList = self.client.get_json(url.as_str()).await?;
        Ok(list.items)
    }

    /// Like [`search`](Self::search) but failures become an empty list.
    async fn search_or_empty(&self, q: &str, max_results: Option<u32>) -> Vec<Volume> {
        match self.search(q, max_results).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(query = q, "Google Books error: {e}");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Catalog for GoogleBooks {
    fn name(&self) -> &str {
        "Google Books"
    }

    async fn lookup(&self, query: &str) -> Option<BookRecord> {
        if let Some(isbn) = as_isbn13(query) {
            let hits = self.search_or_empty(&format!("isbn:{isbn}"), None).await;
            if let Some(volume) = hits.into_iter().next() {
                return Some(volume.into_record());
            }
            tracing::debug!(isbn = %isbn, "no exact ISBN match, falling back to text search");
        }

        self.search_or_empty(query, Some(self.max_results))
            .await
            .into_iter()
            .next()
            .map(Volume::into_record)
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};
    use serde_json::json;

    use super::*;

    const POND_JSON: &str = r#"{
        "totalItems": 1,
        "items": [{
            "id": "zyTCAlFPjgYC",
            "volumeInfo": {
                "title": "Pond",
                "authors": ["Claire-Louise Bennett"],
                "publisher": "Riverhead Books",
                "publishedDate": "2016-07-26",
                "description": "A collection of stories.",
                "industryIdentifiers": [
                    {"type": "ISBN_10", "identifier": "0399573356"},
                    {"type": "ISBN_13", "identifier": "9780399573354"}
                ],
                "categories": ["Fiction", "Short Stories"],
                "imageLinks": {
                    "smallThumbnail": "http://books.google.com/books/content?id=zyTCAlFPjgYC&printsec=frontcover&img=1&zoom=5&source=gbs_api",
                    "thumbnail": "http://books.google.com/books/content?id=zyTCAlFPjgYC&printsec=frontcover&img=1&zoom=1&edge=curl&source=gbs_api"
                }
            }
        }]
    }"#;

    fn catalog(server: &Server, api_key: Option<&str>) -> GoogleBooks {
        let config = CatalogConfig {
            base_url: format!("{}/books/v1/volumes", server.url()),
            timeout_secs: 5,
            ..CatalogConfig::default()
        };
        GoogleBooks::with_params(&config, api_key.map(str::to_string)).unwrap()
    }

    #[test]
    fn test_cover_normalization() {
        assert_eq!(normalize_cover_url("http://x/img?zoom=1"), "https://x/img");
        assert_eq!(
            normalize_cover_url("http://x/img?id=1&zoom=1&edge=curl"),
            "https://x/img?id=1&edge=curl"
        );
        assert_eq!(normalize_cover_url("http://x/img?zoom=12&id=1"), "https://x/img?id=1");
        assert_eq!(normalize_cover_url("http://x/img?id=1&zoom=3"), "https://x/img?id=1");
        assert_eq!(normalize_cover_url(""), "");
    }

    #[test]
    fn test_cover_normalization_is_idempotent() {
        for url in ["https://x/img", "https://x/img?id=1&edge=curl", "http://x/a?zoom=2&b=c"] {
            let once = normalize_cover_url(url);
            assert_eq!(normalize_cover_url(&once), once);
        }
        assert_eq!(normalize_cover_url("https://x/img?id=1"), "https://x/img?id=1");
    }

    #[test]
    fn test_cover_normalization_strips_repeated_zoom() {
        assert_eq!(
            normalize_cover_url("http://x/img?id=1&zoom=1&zoom=2"),
            "https://x/img?id=1"
        );
        assert_eq!(
            normalize_cover_url("http://x/img?zoom=1&zoom=2&edge=curl"),
            "https://x/img?edge=curl"
        );
        let once = normalize_cover_url("http://x/img?zoom=1&zoom=2&zoom=3");
        assert_eq!(once, "https://x/img");
        assert_eq!(normalize_cover_url(&once), once);
    }

    #[test]
    fn test_published_year() {
        assert_eq!(published_year("2021-05-04"), "2021");
        assert_eq!(published_year("1999"), "1999");
        assert_eq!(published_year(""), "");
        assert_eq!(published_year("circa 1900"), "circ");
    }

    #[test]
    fn test_into_record_normalizes() {
        let list: VolumeList = serde_json::from_str(POND_JSON).unwrap();
        let record = list.items.into_iter().next().unwrap().into_record();
        assert_eq!(record.title, "Pond");
        assert_eq!(record.author, "Claire-Louise Bennett");
        assert_eq!(record.isbn, "9780399573354");
        assert_eq!(record.genre, "Fiction");
        assert_eq!(record.published_year, "2016");
        assert_eq!(record.external_catalog_id, "zyTCAlFPjgYC");
        assert_eq!(record.cover_source, CoverSource::Catalog);
        assert_eq!(
            record.cover_url,
            "https://books.google.com/books/content?id=zyTCAlFPjgYC&printsec=frontcover&img=1&edge=curl&source=gbs_api"
        );
    }

    #[test]
    fn test_into_record_defaults() {
        let volume: Volume = serde_json::from_value(json!({
            "id": "x1",
            "volumeInfo": { "authors": ["A. One", "B. Two"], "imageLinks": { "large": "", "medium": "http://m/img" } }
        }))
        .unwrap();
        let record = volume.into_record();
        assert_eq!(record.title, UNKNOWN_TITLE);
        assert_eq!(record.author, "A. One, B. Two");
        assert_eq!(record.cover_url, "https://m/img");
        assert_eq!(record.isbn, "");
        assert_eq!(record.genre, "");

        let bare: Volume = serde_json::from_value(json!({ "id": "x2" })).unwrap();
        let record = bare.into_record();
        assert_eq!(record.author, UNKNOWN_AUTHOR);
        assert_eq!(record.cover_url, "");
        assert_eq!(record.published_year, "");
    }

    #[test]
    fn test_thumbnail_only_cover() {
        let volume: Volume = serde_json::from_value(json!({
            "id": "x3",
            "volumeInfo": { "imageLinks": { "thumbnail": "http://x/img?zoom=1" } }
        }))
        .unwrap();
        assert_eq!(volume.into_record().cover_url, "https://x/img");
    }

    #[tokio::test]
    async fn test_isbn_query_tries_exact_search_first() {
        let mut server = Server::new_async().await;
        let isbn_mock = server
            .mock("GET", "/books/v1/volumes")
            .match_query(Matcher::UrlEncoded("q".into(), "isbn:9780399573354".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(POND_JSON)
            .expect(1)
            .create_async()
            .await;

        let record = catalog(&server, None).lookup("978-0-399-57335-4").await.unwrap();
        assert_eq!(record.title, "Pond");
        isbn_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_isbn_miss_falls_back_to_text() {
        let mut server = Server::new_async().await;
        let isbn_mock = server
            .mock("GET", "/books/v1/volumes")
            .match_query(Matcher::UrlEncoded("q".into(), "isbn:9780374533557".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"totalItems": 0}"#)
            .expect(1)
            .create_async()
            .await;
        let text_mock = server
            .mock("GET", "/books/v1/volumes")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "9780374533557".into()),
                Matcher::UrlEncoded("maxResults".into(), "5".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(POND_JSON)
            .expect(1)
            .create_async()
            .await;

        let record = catalog(&server, None).lookup("9780374533557").await;
        assert!(record.is_some());
        isbn_mock.assert_async().await;
        text_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_text_search_sends_key_and_limit() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/books/v1/volumes")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "Pond Claire-Louise Bennett".into()),
                Matcher::UrlEncoded("maxResults".into(), "5".into()),
                Matcher::UrlEncoded("key".into(), "secret".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(POND_JSON)
            .create_async()
            .await;

        let record = catalog(&server, Some("secret"))
            .lookup("Pond Claire-Louise Bennett")
            .await
            .unwrap();
        assert_eq!(record.external_catalog_id, "zyTCAlFPjgYC");
    }

    #[tokio::test]
    async fn test_nothing_found_is_none() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/books/v1/volumes")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"kind": "books#volumes", "totalItems": 0}"#)
            .expect(2)
            .create_async()
            .await;

        assert!(catalog(&server, None).lookup("9780000000000").await.is_none());
    }

    #[tokio::test]
    async fn test_server_error_is_none() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/books/v1/volumes")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("backend error")
            .create_async()
            .await;

        assert!(catalog(&server, None).lookup("anything").await.is_none());
    }
}
