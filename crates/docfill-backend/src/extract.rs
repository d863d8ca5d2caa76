//! Requisite line extraction from counterparty documents.
//!
//! A details document (DOCX or PDF) is rendered to plain text and split
//! into trimmed, non-empty lines. The lines keep their source order, which
//! the matcher relies on for first-fit assignment.

use std::path::Path;

use docfill_core::{strip_legacy_markers, DocfillError, Requisite, Result};

use crate::docx::render_text;
use crate::package::DocxPackage;

/// A document that can yield requisite lines.
pub trait RequisiteSource {
    fn requisite_lines(&self) -> Result<Vec<Requisite>>;
}

/// Split rendered text into ordered requisite lines. Legacy `{{`/`}}`
/// markers left by older templates are stripped before splitting.
fn lines_from_text(text: &str) -> Vec<Requisite> {
    strip_legacy_markers(text)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(id, line)| Requisite::new(id, line))
        .collect()
}

impl RequisiteSource for DocxPackage {
    fn requisite_lines(&self) -> Result<Vec<Requisite>> {
        let xml = self.document_xml()?;
        let text = render_text(&xml)?;
        Ok(lines_from_text(&text))
    }
}

/// A PDF details document.
pub struct PdfDocument {
    doc: lopdf::Document,
}

impl PdfDocument {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let doc = lopdf::Document::load(path.as_ref())
            .map_err(|e| DocfillError::InvalidPackage(format!("cannot load PDF: {e}")))?;
        Ok(Self { doc })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let doc = lopdf::Document::load_mem(bytes)
            .map_err(|e| DocfillError::InvalidPackage(format!("cannot load PDF: {e}")))?;
        Ok(Self { doc })
    }
}

impl RequisiteSource for PdfDocument {
    fn requisite_lines(&self) -> Result<Vec<Requisite>> {
        let pages: Vec<u32> = self.doc.get_pages().keys().copied().collect();
        let text = self
            .doc
            .extract_text(&pages)
            .map_err(|e| DocfillError::InvalidPackage(format!("cannot extract PDF text: {e}")))?;
        Ok(dedup_lines(lines_from_text(&text)))
    }
}

/// Drop repeated lines, keeping first occurrences in order. PDF extraction
/// repeats header and footer lines on every page.
fn dedup_lines(lines: Vec<Requisite>) -> Vec<Requisite> {
    let mut seen = std::collections::HashSet::new();
    let mut unique: Vec<Requisite> = Vec::new();
    for line in lines {
        if seen.insert(line.value.clone()) {
            unique.push(Requisite::new(unique.len(), line.value));
        }
    }
    unique
}

/// Open a details document by extension. `.pdf` loads as PDF, anything
/// else as a DOCX package.
pub fn open_requisite_source(path: impl AsRef<Path>) -> Result<Box<dyn RequisiteSource>> {
    let path = path.as_ref();
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        Ok(Box::new(PdfDocument::open(path)?))
    } else {
        Ok(Box::new(DocxPackage::open(path)?))
    }
}
