//! Heuristic matching of requisite lines to placeholders.
//!
//! Requisites are free-text lines taken from a counterparty's details
//! document (one line per bank account, tax number, address, …). Each
//! placeholder name selects a recognition rule; lines are consumed
//! first-fit in source order and a consumed line never satisfies a second
//! placeholder. There is no backtracking: an earlier, less specific rule
//! can starve a later one of its correct line.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::placeholder::Placeholder;

/// One line of counterparty details, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requisite {
    pub id: usize,
    pub value: String,
}

impl Requisite {
    #[must_use]
    pub fn new(id: usize, value: impl Into<String>) -> Self {
        Self {
            id,
            value: value.into(),
        }
    }
}

/// Raw lines already consumed by earlier placeholders in a matching pass.
///
/// Owned by the caller and threaded through [`assign_requisites`] so the
/// accumulator is explicit rather than ambient.
#[derive(Debug, Default, Clone)]
pub struct UsedValues(HashSet<String>);

impl UsedValues {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        self.0.contains(value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn consume(&mut self, value: &str) {
        self.0.insert(value.to_string());
    }
}

/// Recognition rule for one requisite field.
///
/// Two of the rules are shape predicates rather than regexes: the original
/// recognition patterns for addresses and bank names relied on lookahead,
/// which the `regex` crate does not support.
enum Recognizer {
    /// The matched substring becomes the placeholder value.
    Pattern(Regex),
    /// A postal address: at least one digit, one letter, and a `.` or `,`.
    /// The whole trimmed line is the value.
    AddressShape,
    /// A bank name line: contains both `банк` and `в`, case-insensitive.
    /// The whole trimmed line is the value.
    BankName,
}

impl Recognizer {
    fn matches(&self, line: &str) -> Option<String> {
        match self {
            Self::Pattern(re) => re.find(line).map(|m| m.as_str().to_string()),
            Self::AddressShape => {
                let has_digit = line.chars().any(|c| c.is_ascii_digit());
                let has_letter = line.chars().any(char::is_alphabetic);
                let has_punct = line.contains('.') || line.contains(',');
                (has_digit && has_letter && has_punct).then(|| line.trim().to_string())
            }
            Self::BankName => {
                let lower = line.to_lowercase();
                (lower.contains("банк") && lower.contains("в"))
                    .then(|| line.trim().to_string())
            }
        }
    }
}

/// Field-name → recognition rule. Keys are lowercased placeholder names;
/// the name keys (`имя`, `имякратко`) and the vehicle plate are handled
/// by dedicated rules before this table is consulted.
static RECOGNIZERS: Lazy<Vec<(&'static str, Recognizer)>> = Lazy::new(|| {
    let re = |pattern: &str| {
        Recognizer::Pattern(Regex::new(pattern).expect("valid requisite pattern"))
    };
    vec![
        ("название", re(r#""[^"]*[A-ZА-ЯЁ][^"]*""#)),
        ("огрнип", re(r"\b\d{15}\b")),
        ("огрн", re(r"\b\d{13}\b")),
        ("инн", re(r"\b\d{12}\b")),
        ("инно", re(r"\b\d{10}\b")),
        ("бик", re(r"\b04\d{7}\b")),
        ("кпп", re(r"\b\d{9}\b")),
        ("снилс", re(r"(?i)\b\d{3}-\d{3}-\d{3} \d{2}\b")),
        ("расчетныйсчет", re(r"\b40\d{18}\b")),
        ("коррсчет", re(r"\b30\d{18}\b")),
        ("адрес", Recognizer::AddressShape),
        ("наименованиебанка", Recognizer::BankName),
        ("имейл", re(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")),
    ]
});

/// Three capitalized Cyrillic words: `Фамилия Имя Отчество`.
static FULL_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[А-ЯЁ][а-яё]+ [А-ЯЁ][а-яё]+ [А-ЯЁ][а-яё]+").expect("valid full-name pattern")
});

/// Abbreviated form: `Фамилия И.О.` (second initial optional).
static SHORT_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[А-ЯЁ][а-яё]+\s[А-ЯЁ]\.(?:\s?[А-ЯЁ]\.)?").expect("valid short-name pattern")
});

/// Registration plate shape after normalization: letter, 3 digits,
/// 2 letters, 2-3 digit region code.
static PLATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[А-Я]\d{3}[А-Я]{2}\d{2,3}$").expect("valid plate pattern"));

/// Latin letters that are visually identical to Cyrillic plate letters.
const PLATE_HOMOGLYPHS: &[(char, char)] = &[
    ('A', 'А'),
    ('B', 'В'),
    ('E', 'Е'),
    ('K', 'К'),
    ('M', 'М'),
    ('H', 'Н'),
    ('O', 'О'),
    ('P', 'Р'),
    ('C', 'С'),
    ('T', 'Т'),
    ('Y', 'У'),
    ('X', 'Х'),
];

/// Map Latin homoglyphs onto their Cyrillic counterparts (case-insensitive)
/// and uppercase the result.
#[must_use]
pub fn normalize_plate(value: &str) -> String {
    value
        .chars()
        .map(|ch| {
            let upper = ch.to_ascii_uppercase();
            PLATE_HOMOGLYPHS
                .iter()
                .find(|(latin, _)| *latin == upper)
                .map_or(ch, |(_, cyrillic)| *cyrillic)
        })
        .collect::<String>()
        .to_uppercase()
}

/// Whether a line, once normalized, has the shape of a registration plate.
#[must_use]
pub fn looks_like_plate(value: &str) -> bool {
    PLATE_RE.is_match(&normalize_plate(value.trim()))
}

/// Derive `Фамилия И.О.` from a three-part full name.
#[must_use]
pub fn derive_short_name(full_name: &str) -> Option<String> {
    let parts: Vec<&str> = full_name.split(' ').collect();
    if parts.len() != 3 {
        return None;
    }
    let first_initial = parts[1].chars().next()?;
    let middle_initial = parts[2].chars().next()?;
    Some(format!("{} {first_initial}.{middle_initial}.", parts[0]))
}

/// Auto-fill placeholder values from requisite lines.
///
/// Placeholders are visited in input order; for each one the first unused
/// line its rule recognizes is consumed. Unmatched placeholders keep their
/// prior value. The accumulator is returned so a caller can continue the
/// pass over further placeholders without re-consuming lines.
pub fn assign_requisites(
    placeholders: &mut [Placeholder],
    requisites: &[Requisite],
    mut used: UsedValues,
) -> UsedValues {
    // The name scan is shared by `имя` and `имякратко`, so do it once.
    let mut full_name: Option<String> = None;
    let mut short_name: Option<String> = None;
    for requisite in requisites {
        if full_name.is_none() {
            if let Some(m) = FULL_NAME_RE.find(&requisite.value) {
                full_name = Some(m.as_str().to_string());
            }
        }
        if short_name.is_none() {
            if let Some(m) = SHORT_NAME_RE.find(&requisite.value) {
                short_name = Some(m.as_str().to_string());
            }
        }
    }
    if short_name.is_none() {
        short_name = full_name.as_deref().and_then(derive_short_name);
    }

    for placeholder in placeholders.iter_mut() {
        let key = placeholder.name.trim().to_lowercase();
        match key.as_str() {
            "имя" => {
                if let Some(full) = &full_name {
                    placeholder.value = full.clone();
                    used.consume(full);
                }
            }
            "имякратко" => {
                if let Some(short) = &short_name {
                    placeholder.value = short.clone();
                    used.consume(short);
                }
            }
            "госномер" => {
                for requisite in requisites {
                    if used.contains(&requisite.value) {
                        continue;
                    }
                    let candidate = requisite.value.trim();
                    if looks_like_plate(candidate) {
                        placeholder.value = normalize_plate(candidate);
                        used.consume(&requisite.value);
                        break;
                    }
                }
            }
            _ => {
                let Some((_, recognizer)) = RECOGNIZERS.iter().find(|(name, _)| *name == key)
                else {
                    log::debug!("no recognition rule for placeholder '{}'", placeholder.name);
                    continue;
                };
                for requisite in requisites {
                    if used.contains(&requisite.value) {
                        continue;
                    }
                    if let Some(value) = recognizer.matches(&requisite.value) {
                        placeholder.value = value;
                        used.consume(&requisite.value);
                        break;
                    }
                }
            }
        }
    }
    used
}

/// [`assign_requisites`] starting from an empty accumulator.
pub fn match_requisites(placeholders: &mut [Placeholder], requisites: &[Requisite]) -> UsedValues {
    assign_requisites(placeholders, requisites, UsedValues::new())
}
