use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// Which reading list a book is filed under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShelfList {
    #[default]
    #[serde(rename = "To Read")]
    ToRead,
    #[serde(rename = "To Buy")]
    ToBuy,
    #[serde(rename = "Read")]
    Read,
}

impl ShelfList {
    pub const ALL: [ShelfList; 3] = [Self::ToRead, Self::ToBuy, Self::Read];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToRead => "To Read",
            Self::ToBuy => "To Buy",
            Self::Read => "Read",
        }
    }

    /// Short hint shown next to the list in the interactive menu.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::ToRead => "I own it",
            Self::ToBuy => "I want it",
            Self::Read => "finished",
        }
    }
}

impl std::fmt::Display for ShelfList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ShelfList {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "to read" | "to-read" | "toread" => Ok(Self::ToRead),
            "2" | "to buy" | "to-buy" | "tobuy" => Ok(Self::ToBuy),
            "3" | "read" => Ok(Self::Read),
            _ => Err(format!("Invalid list: {s} (expected to-read, to-buy or read)")),
        }
    }
}

/// Where the record's cover image came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverSource {
    /// Scraped from the page the user supplied.
    Page,
    #[default]
    Catalog,
}

impl std::fmt::Display for CoverSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Page => write!(f, "page"),
            Self::Catalog => write!(f, "catalog"),
        }
    }
}

/// The canonical book entity written to storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRecord {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub published_year: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub isbn: String,
    #[serde(default)]
    pub external_catalog_id: String,
    #[serde(default)]
    pub cover_url: String,
    #[serde(default)]
    pub cover_source: CoverSource,
    #[serde(default)]
    pub list: ShelfList,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<DateTime<Utc>>,
}

impl Default for BookRecord {
    fn default() -> Self {
        Self {
            title: UNKNOWN_TITLE.to_string(),
            author: UNKNOWN_AUTHOR.to_string(),
            publisher: String::new(),
            published_year: String::new(),
            genre: String::new(),
            description: String::new(),
            isbn: String::new(),
            external_catalog_id: String::new(),
            cover_url: String::new(),
            cover_source: CoverSource::default(),
            list: ShelfList::default(),
            tags: Vec::new(),
            notes: String::new(),
            date_added: None,
        }
    }
}

impl BookRecord {
    /// Sets `date_added` to now. Called right before the record is written.
    pub fn stamp(&mut self) {
        self.date_added = Some(Utc::now());
    }

    pub fn has_cover(&self) -> bool {
        !self.cover_url.is_empty()
    }

    /// Published year as a number, when it is one.
    pub fn year(&self) -> Option<i32> {
        self.published_year.trim().parse().ok()
    }

    pub fn set_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags.clear();
        for tag in tags {
            let tag = tag.as_ref().trim();
            if !tag.is_empty() && !self.tags.iter().any(|t| t == tag) {
                self.tags.push(tag.to_string());
            }
        }
    }
}

/// Splits a comma-separated tag string, dropping blanks and repeats.
pub fn parse_tags(raw: &str) -> Vec<String> {
    let mut record = BookRecord::default();
    record.set_tags(raw.split(','));
    record.tags
}
