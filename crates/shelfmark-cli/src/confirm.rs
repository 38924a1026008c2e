//! The `add` flow: look the input up, let the user confirm or correct the
//! match, collect list/tags/notes and write the record.

use anyhow::Result;
use shelfmark_core::{BookRecord, BookStore, ExitCode, ShelfList, parse_tags};
use shelfmark_lookup::{Candidate, LookupPipeline, Resolution};

use crate::prompt::Prompter;

/// Flag values for `shelfmark add`.
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// Accept the first match and take list/tags/notes from flags only.
    pub assume_yes: bool,
    /// Write even when the book is already stored.
    pub force: bool,
    pub list: Option<ShelfList>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Added { id: String, record: BookRecord },
    NotFound { query: String },
    /// Nothing to search for and no title was typed in.
    NoQuery,
    /// The user backed out at a prompt.
    Declined,
    /// Already stored and `--force` was not given.
    DuplicateRefused { record: BookRecord },
    WriteFailed { record: BookRecord, error: String },
}

impl AddOutcome {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Added { .. } | Self::Declined => ExitCode::Success,
            Self::NotFound { .. } => ExitCode::NotFound,
            Self::NoQuery => ExitCode::GeneralError,
            Self::DuplicateRefused { .. } => ExitCode::Duplicate,
            Self::WriteFailed { .. } => ExitCode::WriteFailed,
        }
    }
}

pub async fn add_book(
    pipeline: &LookupPipeline,
    store: &dyn BookStore,
    prompter: &mut dyn Prompter,
    input: &str,
    options: &AddOptions,
) -> Result<AddOutcome> {
    let built = pipeline.build_query(input.trim()).await;
    let page_cover = built.cover.as_deref();

    let mut query = built.query.trim().to_string();
    if query.is_empty() {
        if options.assume_yes {
            query = input.trim().to_string();
        } else {
            prompter.notice("Could not work out the book from that input.");
            query = prompter.input("Title and author")?;
        }
        if query.is_empty() {
            return Ok(AddOutcome::NoQuery);
        }
    }

    let mut candidate = match pipeline.resolve(&query, page_cover, store).await {
        Resolution::Found(candidate) => candidate,
        Resolution::NotFound { query } if options.assume_yes => {
            return Ok(AddOutcome::NotFound { query });
        }
        Resolution::NotFound { query } => {
            prompter.notice(&format!("No match found for \"{query}\"."));
            let retry = prompter.input("Try a different title/author (blank to give up)")?;
            if retry.is_empty() {
                return Ok(AddOutcome::NotFound { query });
            }
            match pipeline.resolve(&retry, page_cover, store).await {
                Resolution::Found(candidate) => candidate,
                Resolution::NotFound { query } => {
                    prompter.notice(&format!("No match found for \"{query}\"."));
                    return Ok(AddOutcome::NotFound { query });
                }
            }
        }
    };

    loop {
        if candidate.is_duplicate && !options.force {
            if options.assume_yes {
                return Ok(AddOutcome::DuplicateRefused {
                    record: candidate.record,
                });
            }
            prompter.notice(&format!(
                "\"{}\" is already in your library.",
                candidate.record.title
            ));
            if !prompter.confirm("Add again anyway?", false)? {
                return Ok(AddOutcome::Declined);
            }
        }

        if options.assume_yes {
            break;
        }
        prompter.notice(&describe(&candidate.record));
        if prompter.confirm("Is this the right book?", true)? {
            break;
        }

        match ask_replacement(pipeline, store, prompter, page_cover).await? {
            Some(next) => candidate = next,
            None => return Ok(AddOutcome::Declined),
        }
    }

    let mut record = candidate.record;
    fill_details(&mut record, prompter, options)?;
    record.stamp();

    match store.insert(&record).await {
        Ok(id) => {
            tracing::info!(id = %id, backend = store.backend(), "book saved");
            Ok(AddOutcome::Added { id, record })
        }
        Err(e) => {
            tracing::warn!(backend = store.backend(), "write failed: {e}");
            Ok(AddOutcome::WriteFailed {
                record,
                error: e.to_string(),
            })
        }
    }
}

/// Keeps asking for a better query until one matches. `None` on a blank answer.
async fn ask_replacement(
    pipeline: &LookupPipeline,
    store: &dyn BookStore,
    prompter: &mut dyn Prompter,
    page_cover: Option<&str>,
) -> Result<Option<Candidate>> {
    loop {
        let query = prompter.input("Enter a better title/author (blank to cancel)")?;
        if query.is_empty() {
            return Ok(None);
        }
        match pipeline.resolve(&query, page_cover, store).await {
            Resolution::Found(candidate) => return Ok(Some(candidate)),
            Resolution::NotFound { query } => {
                prompter.notice(&format!("No match found for \"{query}\"."));
            }
        }
    }
}

fn fill_details(
    record: &mut BookRecord,
    prompter: &mut dyn Prompter,
    options: &AddOptions,
) -> Result<()> {
    record.list = match options.list {
        Some(list) => list,
        None if options.assume_yes => ShelfList::default(),
        None => {
            let items: Vec<String> = ShelfList::ALL
                .iter()
                .map(|l| format!("{l} ({})", l.hint()))
                .collect();
            ShelfList::ALL[prompter.select("Which list?", &items, 0)?]
        }
    };

    if !options.tags.is_empty() || options.assume_yes {
        record.set_tags(&options.tags);
    } else {
        record.tags = parse_tags(&prompter.input("Tags (comma-separated, optional)")?);
    }

    record.notes = match &options.notes {
        Some(notes) => notes.trim().to_string(),
        None if options.assume_yes => String::new(),
        None => prompter.input("Notes (optional)")?,
    };
    Ok(())
}

/// Multi-line summary shown before the confirmation prompt.
pub fn describe(record: &BookRecord) -> String {
    let mut lines = vec![
        format!("  Title:     {}", record.title),
        format!("  Author:    {}", record.author),
    ];
    let optional = [
        ("Publisher", &record.publisher),
        ("Published", &record.published_year),
        ("Genre", &record.genre),
        ("ISBN", &record.isbn),
    ];
    for (label, value) in optional {
        if !value.is_empty() {
            lines.push(format!("  {:<10} {value}", format!("{label}:")));
        }
    }
    if record.has_cover() {
        lines.push(format!(
            "  Cover:     {} ({})",
            record.cover_url, record.cover_source
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Arc;

    use async_trait::async_trait;
    use shelfmark_core::{CoverSource, MemoryStore, PageInfo, ShelfError, StoreField, StoredRecord};
    use shelfmark_lookup::{Catalog, PageSource};

    use super::*;

    #[derive(Debug)]
    enum Answer {
        Yes,
        No,
        Text(&'static str),
        Choice(usize),
    }

    /// Replays canned answers in order and records every notice.
    #[derive(Default)]
    struct Scripted {
        answers: VecDeque<Answer>,
        notices: Vec<String>,
        prompts: Vec<String>,
    }

    impl Scripted {
        fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
            Self {
                answers: answers.into_iter().collect(),
                ..Self::default()
            }
        }

        fn next(&mut self, prompt: &str) -> Answer {
            self.prompts.push(prompt.to_string());
            self.answers
                .pop_front()
                .unwrap_or_else(|| panic!("no scripted answer for {prompt:?}"))
        }
    }

    impl Prompter for Scripted {
        fn notice(&mut self, message: &str) {
            self.notices.push(message.to_string());
        }

        fn confirm(&mut self, prompt: &str, _default: bool) -> Result<bool> {
            match self.next(prompt) {
                Answer::Yes => Ok(true),
                Answer::No => Ok(false),
                other => panic!("{prompt:?} expected yes/no, script has {other:?}"),
            }
        }

        fn input(&mut self, prompt: &str) -> Result<String> {
            match self.next(prompt) {
                Answer::Text(text) => Ok(text.to_string()),
                other => panic!("{prompt:?} expected text, script has {other:?}"),
            }
        }

        fn select(&mut self, prompt: &str, _items: &[String], _default: usize) -> Result<usize> {
            match self.next(prompt) {
                Answer::Choice(i) => Ok(i),
                other => panic!("{prompt:?} expected a choice, script has {other:?}"),
            }
        }
    }

    struct Page(PageInfo);

    #[async_trait]
    impl PageSource for Page {
        async fn fetch(&self, _url: &str) -> PageInfo {
            self.0.clone()
        }
    }

    struct Books(HashMap<&'static str, BookRecord>);

    #[async_trait]
    impl Catalog for Books {
        fn name(&self) -> &str {
            "books"
        }

        async fn lookup(&self, query: &str) -> Option<BookRecord> {
            self.0.get(query).cloned()
        }
    }

    struct ReadOnlyStore;

    #[async_trait]
    impl BookStore for ReadOnlyStore {
        fn backend(&self) -> &str {
            "readonly"
        }

        async fn query_by_field(
            &self,
            _field: StoreField,
            _value: &str,
            _limit: usize,
        ) -> shelfmark_core::Result<Vec<StoredRecord>> {
            Ok(Vec::new())
        }

        async fn insert(&self, _record: &BookRecord) -> shelfmark_core::Result<String> {
            Err(ShelfError::Store {
                backend: "readonly".to_string(),
                message: "HTTP 422: INVALID_VALUE".to_string(),
            })
        }
    }

    fn book(title: &str, id: &str) -> BookRecord {
        BookRecord {
            title: title.to_string(),
            author: "Claire-Louise Bennett".to_string(),
            external_catalog_id: id.to_string(),
            ..BookRecord::default()
        }
    }

    fn pipeline(page: PageInfo) -> LookupPipeline {
        let mut books = HashMap::new();
        books.insert("Pond", book("Pond", "vol-pond"));
        books.insert("Checkout 19", book("Checkout 19", "vol-c19"));
        LookupPipeline::new(Arc::new(Page(page)), Arc::new(Books(books)))
    }

    #[tokio::test]
    async fn interactive_happy_path() {
        let store = MemoryStore::default();
        let mut prompter = Scripted::new([
            Answer::Yes,
            Answer::Choice(1),
            Answer::Text("irish, fiction"),
            Answer::Text("from the bookshop"),
        ]);

        let outcome = add_book(
            &pipeline(PageInfo::default()),
            &store,
            &mut prompter,
            "Pond",
            &AddOptions::default(),
        )
        .await
        .unwrap();

        let AddOutcome::Added { id, record } = outcome else {
            panic!("expected Added, got {outcome:?}");
        };
        assert_eq!(id, "mem1");
        assert_eq!(record.list, ShelfList::ToBuy);
        assert_eq!(record.tags, vec!["irish", "fiction"]);
        assert_eq!(record.notes, "from the bookshop");
        assert!(record.date_added.is_some());
        assert_eq!(store.records()[0].title, "Pond");
        assert!(prompter.notices[0].contains("Title:     Pond"));
    }

    #[tokio::test]
    async fn rejecting_then_correcting_the_match() {
        let store = MemoryStore::default();
        let mut prompter = Scripted::new([
            Answer::No,
            Answer::Text("Nope"),
            Answer::Text("Checkout 19"),
            Answer::Yes,
            Answer::Choice(0),
            Answer::Text(""),
            Answer::Text(""),
        ]);

        let outcome = add_book(
            &pipeline(PageInfo::default()),
            &store,
            &mut prompter,
            "Pond",
            &AddOptions::default(),
        )
        .await
        .unwrap();

        match outcome {
            AddOutcome::Added { record, .. } => {
                assert_eq!(record.title, "Checkout 19");
                assert!(record.tags.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(prompter.notices.iter().any(|n| n.contains("\"Nope\"")));
    }

    #[tokio::test]
    async fn blank_replacement_cancels() {
        let store = MemoryStore::default();
        let mut prompter = Scripted::new([Answer::No, Answer::Text("")]);
        let outcome = add_book(
            &pipeline(PageInfo::default()),
            &store,
            &mut prompter,
            "Pond",
            &AddOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, AddOutcome::Declined);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn not_found_gets_one_retry() {
        let store = MemoryStore::default();

        let mut prompter = Scripted::new([Answer::Text("Still Nothing")]);
        let outcome = add_book(
            &pipeline(PageInfo::default()),
            &store,
            &mut prompter,
            "Nothing",
            &AddOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(
            outcome,
            AddOutcome::NotFound {
                query: "Still Nothing".to_string()
            }
        );
        assert_eq!(outcome.exit_code(), ExitCode::NotFound);

        let mut prompter = Scripted::new([
            Answer::Text("Pond"),
            Answer::Yes,
            Answer::Choice(2),
            Answer::Text(""),
            Answer::Text(""),
        ]);
        let outcome = add_book(
            &pipeline(PageInfo::default()),
            &store,
            &mut prompter,
            "Nothing",
            &AddOptions::default(),
        )
        .await
        .unwrap();
        assert!(matches!(outcome, AddOutcome::Added { ref record, .. } if record.list == ShelfList::Read));
    }

    #[tokio::test]
    async fn unreadable_url_asks_for_title() {
        let store = MemoryStore::default();
        let mut prompter = Scripted::new([Answer::Text("")]);
        let outcome = add_book(
            &pipeline(PageInfo::default()),
            &store,
            &mut prompter,
            "https://publisher.example/item/1",
            &AddOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, AddOutcome::NoQuery);
        assert_eq!(outcome.exit_code(), ExitCode::GeneralError);
    }

    #[tokio::test]
    async fn duplicate_prompt_defaults_to_skip() {
        let store = MemoryStore::with_records([book("Pond", "vol-pond")]);
        let mut prompter = Scripted::new([Answer::No]);
        let outcome = add_book(
            &pipeline(PageInfo::default()),
            &store,
            &mut prompter,
            "Pond",
            &AddOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, AddOutcome::Declined);
        assert_eq!(outcome.exit_code(), ExitCode::Success);
        assert_eq!(store.len(), 1);
        assert_eq!(prompter.prompts, vec!["Add again anyway?"]);
    }

    #[tokio::test]
    async fn assume_yes_uses_flags_and_page_cover() {
        let store = MemoryStore::default();
        let page = PageInfo {
            title: Some("Pond | Fitzcarraldo".to_string()),
            cover: Some("http://fitz.example/pond.jpg".to_string()),
        };
        let options = AddOptions {
            assume_yes: true,
            list: Some(ShelfList::Read),
            tags: vec!["essays".to_string(), " essays".to_string()],
            notes: Some(" signed ".to_string()),
            ..AddOptions::default()
        };
        let mut prompter = Scripted::default();

        let outcome = add_book(
            &pipeline(page),
            &store,
            &mut prompter,
            "https://fitz.example/pond",
            &options,
        )
        .await
        .unwrap();

        // "Pond | Fitzcarraldo" cleans to "Fitzcarraldo", which misses.
        assert_eq!(
            outcome,
            AddOutcome::NotFound {
                query: "Fitzcarraldo".to_string()
            }
        );

        let outcome = add_book(
            &pipeline(PageInfo {
                title: Some("Pond".to_string()),
                cover: Some("http://fitz.example/pond.jpg".to_string()),
            }),
            &store,
            &mut prompter,
            "https://fitz.example/pond",
            &options,
        )
        .await
        .unwrap();
        let AddOutcome::Added { record, .. } = outcome else {
            panic!("expected Added");
        };
        assert_eq!(record.cover_url, "https://fitz.example/pond.jpg");
        assert_eq!(record.cover_source, CoverSource::Page);
        assert_eq!(record.list, ShelfList::Read);
        assert_eq!(record.tags, vec!["essays"]);
        assert_eq!(record.notes, "signed");
        assert!(prompter.prompts.is_empty());
    }

    #[tokio::test]
    async fn assume_yes_refuses_duplicates_unless_forced() {
        let store = MemoryStore::with_records([book("Pond", "vol-pond")]);
        let mut prompter = Scripted::default();
        let mut options = AddOptions {
            assume_yes: true,
            ..AddOptions::default()
        };

        let outcome = add_book(&pipeline(PageInfo::default()), &store, &mut prompter, "Pond", &options)
            .await
            .unwrap();
        assert_eq!(outcome.exit_code(), ExitCode::Duplicate);

        options.force = true;
        let outcome = add_book(&pipeline(PageInfo::default()), &store, &mut prompter, "Pond", &options)
            .await
            .unwrap();
        assert!(matches!(outcome, AddOutcome::Added { .. }));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn write_failure_carries_cause() {
        let options = AddOptions {
            assume_yes: true,
            ..AddOptions::default()
        };
        let outcome = add_book(
            &pipeline(PageInfo::default()),
            &ReadOnlyStore,
            &mut Scripted::default(),
            "Pond",
            &options,
        )
        .await
        .unwrap();
        match &outcome {
            AddOutcome::WriteFailed { error, .. } => assert!(error.contains("HTTP 422")),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(outcome.exit_code(), ExitCode::WriteFailed);
    }

    #[test]
    fn describe_skips_blank_fields() {
        let mut record = book("Pond", "vol-pond");
        record.published_year = "2015".to_string();
        let text = describe(&record);
        assert!(text.contains("Published: 2015"));
        assert!(!text.contains("Publisher"));
        assert!(!text.contains("Cover"));
    }
}
