use shelfmark_core::{BookRecord, BookStore, CoverSource, StoreField};

use crate::catalog::google_books::upgrade_to_https;

/// A catalog record after cover preference and the duplicate check.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub record: BookRecord,
    /// Advisory: the caller decides whether to write anyway.
    pub is_duplicate: bool,
}

/// A non-empty scraped cover always wins over the catalog's.
pub fn apply_cover_preference(record: &mut BookRecord, scraped_cover: Option<&str>) {
    match scraped_cover.map(str::trim).filter(|c| !c.is_empty()) {
        Some(cover) => {
            record.cover_url = upgrade_to_https(cover).into_owned();
            record.cover_source = CoverSource::Page;
        }
        None => record.cover_source = CoverSource::Catalog,
    }
}

/// True when a stored record already carries this record's catalog id.
/// A failing store is logged and treated as "no duplicate".
pub async fn is_duplicate(record: &BookRecord, store: &dyn BookStore) -> bool {
    let id = record.external_catalog_id.trim();
    if id.is_empty() {
        return false;
    }
    match store
        .query_by_field(StoreField::ExternalCatalogId, id, 1)
        .await
    {
        Ok(matches) => !matches.is_empty(),
        Err(e) => {
            tracing::warn!(backend = store.backend(), "duplicate check failed: {e}");
            false
        }
    }
}

pub async fn reconcile(
    mut record: BookRecord,
    scraped_cover: Option<&str>,
    store: &dyn BookStore,
) -> Reconciled {
    apply_cover_preference(&mut record, scraped_cover);
    let is_duplicate = is_duplicate(&record, store).await;
    Reconciled {
        record,
        is_duplicate,
    }
}
