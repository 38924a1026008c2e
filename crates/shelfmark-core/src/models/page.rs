use serde::{Deserialize, Serialize};

/// What could be recovered from a fetched web page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub title: Option<String>,
    pub cover: Option<String>,
}

impl PageInfo {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.cover.is_none()
    }
}
