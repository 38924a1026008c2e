//! Best-effort title and cover extraction from arbitrary web pages.
//!
//! Works on the raw text of a bounded body prefix with regexes rather than a
//! DOM, so pages with broken markup still yield their meta tags.

use async_trait::async_trait;
use html_escape::decode_html_entities;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use shelfmark_core::PageInfo;
use shelfmark_core::config::FetchConfig;

use crate::error::Result;
use crate::http::HttpClient;

static COVER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"(?i)property=["']og:image["'][^>]+content=["'](https?://[^"']+)["']"#,
        r#"(?i)content=["'](https?://[^"']+)["'][^>]+property=["']og:image["']"#,
        r#"(?i)name=["']og:image["'][^>]+content=["'](https?://[^"']+)["']"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static OG_TITLE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"(?i)property=["']og:title["'][^>]+content=["'](.*?)["']"#,
        r#"(?i)content=["'](.*?)["'][^>]+property=["']og:title["']"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));
static H1_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").expect("valid regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

/// Anything that can turn a URL into [`PageInfo`]. Implementations never fail;
/// problems come back as an empty `PageInfo`.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> PageInfo;
}

pub struct PageExtractor {
    client: HttpClient,
    max_bytes: usize,
}

impl PageExtractor {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml"),
        );
        if let Ok(lang) = HeaderValue::from_str(&config.accept_language) {
            headers.insert(ACCEPT_LANGUAGE, lang);
        }
        Ok(Self {
            client: HttpClient::new(&config.user_agent, config.timeout(), headers)?,
            max_bytes: config.max_body_bytes,
        })
    }
}

#[async_trait]
impl PageSource for PageExtractor {
    async fn fetch(&self, url: &str) -> PageInfo {
        match self.client.get_prefix(url, self.max_bytes).await {
            Ok(html) => {
                let info = extract_page_info(&html);
                tracing::debug!(
                    url,
                    title = info.title.as_deref().unwrap_or(""),
                    has_cover = info.cover.is_some(),
                    "page scraped"
                );
                info
            }
            Err(e) => {
                tracing::warn!(url, "could not fetch page: {e}");
                PageInfo::default()
            }
        }
    }
}

/// Pulls the cover and title out of raw HTML.
///
/// Cover: `og:image` in three attribute shapes, first match wins.
/// Title: `og:title`, then `<title>`, then the first `<h1>` with inner tags
/// stripped. Everything is entity-decoded and trimmed.
pub fn extract_page_info(html: &str) -> PageInfo {
    let cover = COVER_PATTERNS
        .iter()
        .find_map(|re| capture(re, html))
        .map(|raw| decode_html_entities(raw.trim()).trim().to_string())
        .filter(|s| !s.is_empty());

    let title = OG_TITLE_PATTERNS
        .iter()
        .find_map(|re| capture(re, html))
        .and_then(clean_text)
        .or_else(|| capture(&TITLE_RE, html).and_then(clean_text))
        .or_else(|| {
            capture(&H1_RE, html).and_then(|inner| clean_text(&TAG_RE.replace_all(inner, "")))
        });

    PageInfo { title, cover }
}

fn capture<'a>(re: &Regex, haystack: &'a str) -> Option<&'a str> {
    re.captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn clean_text(raw: &str) -> Option<String> {
    let text = decode_html_entities(raw).trim().to_string();
    (!text.is_empty()).then_some(text)
}
