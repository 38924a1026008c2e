//! Query building, catalog lookup and reconciliation wired together.
//!
//! Both front ends drive the same three steps; the CLI interleaves prompts
//! between them, the server runs them straight through.

use std::sync::Arc;

use shelfmark_core::{AppConfig, BookRecord, BookStore};

use crate::catalog::{Catalog, GoogleBooks};
use crate::error::Result;
use crate::page::{PageExtractor, PageSource};
use crate::query::{BuiltQuery, QueryBuilder};
use crate::reconcile::{apply_cover_preference, reconcile};

/// A catalog match ready for confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub query: String,
    pub record: BookRecord,
    pub is_duplicate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(Candidate),
    NotFound { query: String },
}

pub struct LookupPipeline {
    queries: QueryBuilder,
    catalog: Arc<dyn Catalog>,
}

impl LookupPipeline {
    pub fn new(pages: Arc<dyn PageSource>, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            queries: QueryBuilder::new(pages),
            catalog,
        }
    }

    /// Live page fetcher and Google Books client from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let pages = PageExtractor::new(&config.fetch)?;
        let catalog = GoogleBooks::new(&config.catalog)?;
        Ok(Self::new(Arc::new(pages), Arc::new(catalog)))
    }

    pub fn catalog_name(&self) -> &str {
        self.catalog.name()
    }

    /// Callers trim their own input; plain text comes back unchanged.
    pub async fn build_query(&self, raw: &str) -> BuiltQuery {
        self.queries.build(raw).await
    }

    /// Catalog match with cover preference applied, no duplicate check.
    pub async fn candidate(&self, query: &str, page_cover: Option<&str>) -> Option<BookRecord> {
        if query.trim().is_empty() {
            return None;
        }
        let mut record = self.catalog.lookup(query).await?;
        apply_cover_preference(&mut record, page_cover);
        Some(record)
    }

    pub async fn resolve(
        &self,
        query: &str,
        page_cover: Option<&str>,
        store: &dyn BookStore,
    ) -> Resolution {
        if query.trim().is_empty() {
            return Resolution::NotFound {
                query: query.to_string(),
            };
        }
        let Some(record) = self.catalog.lookup(query).await else {
            tracing::info!(query, catalog = self.catalog.name(), "no catalog match");
            return Resolution::NotFound {
                query: query.to_string(),
            };
        };
        let reconciled = reconcile(record, page_cover, store).await;
        tracing::info!(
            query,
            title = %reconciled.record.title,
            duplicate = reconciled.is_duplicate,
            "catalog match"
        );
        Resolution::Found(Candidate {
            query: query.to_string(),
            record: reconciled.record,
            is_duplicate: reconciled.is_duplicate,
        })
    }
}
