//! Placeholder tokens and template discovery.
//!
//! A placeholder is the character `#` immediately followed by one or more
//! Latin letters, Cyrillic letters, or digits. The token ends at the first
//! character outside that set; no other punctuation is part of the name.
//! The same grammar is the wire contract with template authors and is shared
//! by discovery and substitution.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Token grammar: `#` followed by Latin/Cyrillic letters or digits.
pub static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#([0-9A-Za-zА-Яа-яЁё]+)").expect("valid token regex"));

/// A named substitution point in a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    /// Identifier after the `#` marker. Matched case-sensitively against
    /// template text; requisite-matching lookups lowercase it first.
    pub name: String,
    /// Value substituted for every occurrence of the token. An empty value
    /// deletes the token from the output.
    #[serde(default)]
    pub value: String,
    /// Character offset of the first occurrence in the rendered template
    /// text. Subsequent occurrences do not update it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_position: Option<usize>,
}

impl Placeholder {
    /// Create a placeholder with a known value and no recorded position.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            first_position: None,
        }
    }
}

/// Scan rendered template text for placeholder tokens.
///
/// Records one entry per distinct name with the character offset of its
/// first occurrence and an empty value. Insertion order is preserved; use
/// [`sort_for_display`] to order by position for presentation.
#[must_use]
pub fn discover_placeholders(text: &str) -> Vec<Placeholder> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut found = Vec::new();

    // Matches ascend, so the byte-to-character offset conversion can be
    // done incrementally instead of rescanning from the start each time.
    let mut last_byte = 0usize;
    let mut last_char = 0usize;
    for caps in TOKEN_RE.captures_iter(text) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        let name = caps.get(1).map_or("", |m| m.as_str());
        if name.is_empty() || !seen.insert(name) {
            continue;
        }
        last_char += text[last_byte..whole.start].chars().count();
        last_byte = whole.start;
        found.push(Placeholder {
            name: name.to_string(),
            value: String::new(),
            first_position: Some(last_char),
        });
    }
    found
}

/// Sort placeholders by ascending first occurrence for display.
pub fn sort_for_display(placeholders: &mut [Placeholder]) {
    placeholders.sort_by_key(|p| p.first_position.unwrap_or(usize::MAX));
}

/// Strip legacy `{{` / `}}` markers left behind by older templates.
#[must_use]
pub fn strip_legacy_markers(text: &str) -> String {
    text.replace("{{", "").replace("}}", "")
}

/// Normalize a substitution value: collapse runs of whitespace (including
/// non-breaking spaces and line breaks) to single spaces and trim the ends.
#[must_use]
pub fn normalize_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
