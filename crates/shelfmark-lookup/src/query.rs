//! Turns raw user input into a catalog search query.
//!
//! Plain text is used as-is. URLs are dispatched on their host: marketplace
//! and review-site listings carry a readable slug in the path, everything
//! else needs the page title. The page is fetched in every URL case because
//! only the live page shows the cover of that specific edition.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;

use crate::page::PageSource;

const MARKETPLACE_HOST: &str = "amazon.";
const REVIEW_AGGREGATOR_HOST: &str = "goodreads.com";

static MARKETPLACE_SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/([A-Za-z][^/]{4,})/dp/").expect("valid regex"));
static REVIEW_SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/book/show/\d+[.-](.+)$").expect("valid regex"));

static BY_AUTHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.+?)\s+by\s+(.+?)(?:\s*[|–—:]|$)").expect("valid regex"));
static SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*[|–—]\s*").expect("valid regex"));
static DASH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[|–—]").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteKind {
    Marketplace,
    ReviewAggregator,
    Generic,
}

impl SiteKind {
    pub fn classify(url: &Url) -> Self {
        let host = url.host_str().unwrap_or_default();
        if host.contains(MARKETPLACE_HOST) {
            Self::Marketplace
        } else if host.contains(REVIEW_AGGREGATOR_HOST) {
            Self::ReviewAggregator
        } else {
            Self::Generic
        }
    }

    /// The slug-derived query for this site, if the path carries one.
    fn slug(self, path: &str) -> Option<String> {
        match self {
            Self::Marketplace => marketplace_slug(path),
            Self::ReviewAggregator => review_slug(path),
            Self::Generic => None,
        }
    }
}

/// A search query and, when the input was a page, that page's cover.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltQuery {
    /// Empty when nothing usable could be derived from a URL.
    pub query: String,
    pub cover: Option<String>,
}

impl BuiltQuery {
    pub fn is_empty(&self) -> bool {
        self.query.trim().is_empty()
    }
}

pub struct QueryBuilder {
    pages: Arc<dyn PageSource>,
}

impl QueryBuilder {
    pub fn new(pages: Arc<dyn PageSource>) -> Self {
        Self { pages }
    }

    pub async fn build(&self, raw: &str) -> BuiltQuery {
        if !is_url(raw) {
            return BuiltQuery {
                query: raw.to_string(),
                cover: None,
            };
        }

        let parsed = Url::parse(raw).ok();
        let kind = parsed.as_ref().map_or(SiteKind::Generic, SiteKind::classify);
        let slug = parsed.as_ref().and_then(|url| kind.slug(url.path()));

        let page = self.pages.fetch(raw).await;
        let query = match slug {
            Some(slug) => slug,
            None => page.title.as_deref().map(clean_title).unwrap_or_default(),
        };

        tracing::info!(
            site = ?kind,
            query = %query,
            page_cover = page.cover.is_some(),
            "derived search query from URL"
        );

        BuiltQuery {
            query,
            cover: page.cover,
        }
    }
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// `/<Title-Slug>/dp/<ASIN>` → `"Title Slug"`.
pub fn marketplace_slug(path: &str) -> Option<String> {
    MARKETPLACE_SLUG_RE
        .captures(path)
        .map(|caps| caps[1].replace('-', " "))
}

/// `/book/show/<id>.<Title_Slug>` or `/book/show/<id>-<title-slug>` → `"Title Slug"`.
pub fn review_slug(path: &str) -> Option<String> {
    REVIEW_SLUG_RE
        .captures(path)
        .map(|caps| caps[1].replace(['-', '_'], " "))
}

/// Reduces a page title to the part worth searching for.
///
/// `"Pond by Claire-Louise Bennett | Fitzcarraldo Editions"` becomes
/// `"Pond Claire-Louise Bennett"`; `"Long Title – Publisher"` becomes
/// `"Long Title"`. Titles that fit neither shape come back unchanged.
pub fn clean_title(raw: &str) -> String {
    if let Some(caps) = BY_AUTHOR_RE.captures(raw) {
        let title = caps[1].trim();
        let author = DASH_RE.split(&caps[2]).next().unwrap_or_default().trim();
        return format!("{title} {author}");
    }

    let parts: Vec<&str> = SEPARATOR_RE
        .split(raw)
        .map(str::trim)
        .filter(|p| p.chars().count() > 4)
        .collect();
    match parts.first() {
        Some(first) if first.chars().count() > 8 => first.to_string(),
        Some(_) => parts.iter().take(2).copied().collect::<Vec<_>>().join(" "),
        None => raw.to_string(),
    }
}
