//! Placeholder substitution over a flattened character stream.

use docfill_core::{normalize_value, Placeholder, TOKEN_RE};

use super::FlatStream;

/// Replace placeholder tokens in a flattened paragraph stream.
///
/// The stream is scanned left to right. A token whose name is known is
/// replaced by its normalized value, every substituted character carrying
/// the single format recorded at the token's `#` marker, so a short token
/// cannot smear a format transition across the replacement. A known token
/// with an empty normalized value is
/// deleted. A token whose name is unknown is not consumed: its characters
/// pass through literally, each keeping its own position's format.
pub(crate) fn substitute(stream: &FlatStream, placeholders: &[Placeholder]) -> FlatStream {
    let text = stream.text();
    let mut out = FlatStream::default();

    let mut matches = TOKEN_RE.find_iter(&text).peekable();
    // Byte offset up to which the current consumed token extends.
    let mut skip_until: Option<usize> = None;

    for (char_idx, (byte_idx, ch)) in text.char_indices().enumerate() {
        if let Some(end) = skip_until {
            if byte_idx < end {
                continue;
            }
            skip_until = None;
        }
        // Discard matches already passed over (unknown tokens emitted
        // literally walk straight through their own match).
        while matches.peek().is_some_and(|m| m.start() < byte_idx) {
            matches.next();
        }
        if let Some(m) = matches.peek() {
            if m.start() == byte_idx {
                let name = &text[m.start() + 1..m.end()];
                if let Some(placeholder) = placeholders.iter().find(|p| p.name == name) {
                    let marker_format = stream.formats[char_idx].clone();
                    let value = normalize_value(&placeholder.value);
                    for value_ch in value.chars() {
                        out.push(value_ch, marker_format.clone());
                    }
                    skip_until = Some(m.end());
                    matches.next();
                    continue;
                }
            }
        }
        out.push(ch, stream.formats[char_idx].clone());
    }
    out
}
