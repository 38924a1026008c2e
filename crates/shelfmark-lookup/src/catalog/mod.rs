//! Bibliographic catalog lookups.

pub mod google_books;

use async_trait::async_trait;
use shelfmark_core::BookRecord;

pub use google_books::GoogleBooks;

/// A catalog that resolves a free-text or ISBN query to a single record.
#[async_trait]
pub trait Catalog: Send + Sync {
    fn name(&self) -> &str;

    /// The first matching record, or `None` when nothing matched. Transport
    /// and parse failures are logged and reported as `None`.
    async fn lookup(&self, query: &str) -> Option<BookRecord>;
}
