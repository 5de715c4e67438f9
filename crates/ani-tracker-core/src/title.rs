//! Title cleanup before a catalog search.
//!
//! Trackers such as ani-cli hand over titles like `"Show Title (2023)"` or
//! `"Show Title (24 episodes)"`; the catalog search only wants the name.

use std::sync::LazyLock;

use regex::Regex;

static RE_TRAILING_QUALIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^()]*\)\s*$").unwrap());

/// Remove every trailing parenthetical qualifier from `title`.
///
/// A title that is nothing but a parenthetical is returned trimmed but
/// otherwise unchanged, so the search never runs with an empty string.
pub fn strip_qualifiers(title: &str) -> String {
    let mut current = title.trim();
    loop {
        let Some(m) = RE_TRAILING_QUALIFIER.find(current) else {
            break;
        };
        let stripped = current[..m.start()].trim_end();
        if stripped.is_empty() {
            break;
        }
        current = stripped;
    }
    current.to_string()
}
