//! WordprocessingML paragraph model and the flatten half of the engine.
//!
//! The main document part is transformed paragraph by paragraph: each
//! `w:p` subtree is parsed into a [`ParagraphData`] (non-run children kept
//! as verbatim markup, runs parsed into [`RunData`]), flattened into a
//! character stream with per-character formats, substituted, re-segmented,
//! and written back. Everything outside paragraphs is copied through
//! untouched.

mod resegment;
mod rewrite;
mod substitute;

pub use rewrite::rewrite_document_xml;
pub(crate) use substitute::substitute;

use docfill_core::{CharFormat, DocfillError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// One flattenable fragment of a run, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RunPiece {
    Text(String),
    Tab,
}

/// A `w:r` subtree parsed for templating.
#[derive(Debug, Clone)]
pub(crate) struct RunData {
    /// The full run markup, verbatim, for pass-through of object runs.
    pub raw: Vec<u8>,
    /// Format shared by every character this run contributes.
    pub format: CharFormat,
    /// Text fragments and tab markers, in document order.
    pub pieces: Vec<RunPiece>,
    /// Whether the run embeds a drawing/picture/object. Such runs carry no
    /// flattenable text and are never deleted during cleanup.
    pub has_object: bool,
}

/// A direct child of a paragraph.
#[derive(Debug, Clone)]
pub(crate) enum ParagraphChild {
    /// Any non-run node (`w:pPr`, bookmarks, hyperlinks, …), verbatim.
    Node(Vec<u8>),
    Run(RunData),
}

/// A captured `w:p` subtree.
#[derive(Debug, Clone)]
pub(crate) struct ParagraphData {
    pub start: BytesStart<'static>,
    pub children: Vec<ParagraphChild>,
}

impl ParagraphData {
    pub fn runs(&self) -> Vec<&RunData> {
        self.children
            .iter()
            .filter_map(|child| match child {
                ParagraphChild::Run(run) => Some(run),
                ParagraphChild::Node(_) => None,
            })
            .collect()
    }
}

/// A paragraph's character stream with one format per position.
#[derive(Debug, Clone, Default)]
pub(crate) struct FlatStream {
    pub chars: Vec<char>,
    pub formats: Vec<CharFormat>,
}

impl FlatStream {
    pub fn push(&mut self, ch: char, format: CharFormat) {
        self.chars.push(ch);
        self.formats.push(format);
    }

    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

/// Flatten a paragraph's runs into a single character stream.
///
/// Run order is preserved and pieces are emitted in document order; a tab
/// marker occupies one character position. Runs with no pieces contribute
/// nothing.
pub(crate) fn flatten_runs(runs: &[&RunData]) -> FlatStream {
    let mut stream = FlatStream::default();
    for run in runs {
        for piece in &run.pieces {
            match piece {
                RunPiece::Text(text) => {
                    for ch in text.chars() {
                        stream.push(ch, run.format.clone());
                    }
                }
                RunPiece::Tab => stream.push('\t', run.format.clone()),
            }
        }
    }
    stream
}

/// Render the document part as plain text: run texts and tabs in order,
/// paragraphs and line breaks as newlines. Feeds placeholder discovery and
/// requisite line extraction.
pub fn render_text(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => out.push('\t'),
                b"w:br" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let text = e.unescape().map_err(|err| {
                    DocfillError::InvalidPackage(format!("bad text node in document.xml: {err}"))
                })?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(DocfillError::InvalidPackage(format!(
                    "document.xml parse error at byte {}: {err}",
                    reader.buffer_position()
                )));
            }
        }
        buf.clear();
    }
    Ok(out)
}

/// Extract an attribute value by key from an element.
pub(crate) fn get_attr(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .find(|a| a.as_ref().ok().map(|x| x.key.as_ref()) == Some(key))
        .and_then(std::result::Result::ok)
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

/// Check if `w:val` is explicitly "0" or "false" (formatting off).
pub(crate) fn check_val_off(e: &BytesStart) -> bool {
    e.attributes().any(|a| {
        if let Ok(attr) = a {
            if attr.key.as_ref() == b"w:val" {
                let v = std::str::from_utf8(&attr.value).unwrap_or_default();
                return v == "0" || v == "false";
            }
        }
        false
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use docfill_core::RunProps;
    use std::sync::Arc;

    fn text_run(text: &str, format: CharFormat) -> RunData {
        RunData {
            raw: Vec::new(),
            format,
            pieces: vec![RunPiece::Text(text.to_string())],
            has_object: false,
        }
    }

    #[test]
    fn test_flatten_preserves_run_and_piece_order() {
        let mut run = text_run("ab", CharFormat::plain());
        run.pieces.push(RunPiece::Tab);
        run.pieces.push(RunPiece::Text("c".to_string()));
        let second = text_run("d", CharFormat::plain());
        let stream = flatten_runs(&[&run, &second]);
        assert_eq!(stream.text(), "ab\tcd");
        assert_eq!(stream.formats.len(), 5);
    }

    #[test]
    fn test_flatten_empty_run_contributes_no_positions() {
        let empty = RunData {
            raw: Vec::new(),
            format: CharFormat::plain(),
            pieces: Vec::new(),
            has_object: true,
        };
        let stream = flatten_runs(&[&empty]);
        assert!(stream.is_empty());
    }

    #[test]
    fn test_flatten_assigns_each_char_its_run_format() {
        let props: Arc<str> = Arc::from("<w:rPr><w:b/></w:rPr>");
        let bold = CharFormat {
            bold: true,
            props: RunProps::Preserved(Arc::clone(&props)),
            ..CharFormat::plain()
        };
        let stream = flatten_runs(&[&text_run("ab", bold), &text_run("c", CharFormat::plain())]);
        assert!(stream.formats[0].bold && stream.formats[1].bold);
        assert!(!stream.formats[2].bold);
        assert!(stream.formats[0].props.same_block(&stream.formats[1].props));
        assert!(!stream.formats[0].props.same_block(&stream.formats[2].props));
    }

    #[test]
    fn test_render_text_joins_paragraphs_with_newlines() {
        let xml = "<w:document><w:body>\
            <w:p><w:r><w:t>Первая</w:t></w:r><w:r><w:tab/><w:t>строка</w:t></w:r></w:p>\
            <w:p><w:r><w:t xml:space=\"preserve\">Вторая </w:t><w:t>строка</w:t></w:r></w:p>\
            </w:body></w:document>";
        let text = render_text(xml).unwrap();
        assert_eq!(text, "Первая\tстрока\nВторая строка\n");
    }
}
