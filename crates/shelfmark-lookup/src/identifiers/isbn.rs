//! ISBN handling for catalog queries and results.

/// Strips hyphens and whitespace, the separators people paste ISBNs with.
pub fn strip_separators(input: &str) -> String {
    input
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect()
}

/// Returns the 13 digits when `query` is an ISBN-13 once separators are
/// removed. No check-digit validation: the catalog decides what matches.
pub fn as_isbn13(query: &str) -> Option<String> {
    let stripped = strip_separators(query);
    (stripped.len() == 13 && stripped.bytes().all(|b| b.is_ascii_digit())).then_some(stripped)
}

/// Picks ISBN-13 over ISBN-10 from `(type, identifier)` pairs, empty when
/// neither is present.
pub fn preferred_isbn<'a, I>(identifiers: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut isbn10 = None;
    for (kind, value) in identifiers {
        if value.is_empty() {
            continue;
        }
        match kind {
            "ISBN_13" => return value.to_string(),
            "ISBN_10" if isbn10.is_none() => isbn10 = Some(value),
            _ => {}
        }
    }
    isbn10.map(ToOwned::to_owned).unwrap_or_default()
}
