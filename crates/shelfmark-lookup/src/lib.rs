//! Shelfmark lookup: page scraping, query building, catalog search and
//! reconciliation against the store.

pub mod catalog;
pub mod error;
pub mod http;
pub mod identifiers;
pub mod page;
pub mod pipeline;
pub mod query;
pub mod reconcile;

pub use catalog::{Catalog, GoogleBooks};
pub use error::{LookupError, Result};
pub use page::{PageExtractor, PageSource, extract_page_info};
pub use pipeline::{Candidate, LookupPipeline, Resolution};
pub use query::{BuiltQuery, QueryBuilder, clean_title, is_url};
pub use reconcile::{Reconciled, reconcile};
