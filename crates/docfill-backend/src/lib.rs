//! DOCX template engine for docfill.
//!
//! This crate does the document work: reading and rebuilding the zip
//! package, the paragraph-level flatten / substitute / re-segment rewrite
//! of `word/document.xml`, requisite line extraction from DOCX and PDF
//! details documents, and the remote PDF conversion client. The pure data
//! model and the matching heuristics live in `docfill-core`.

pub mod convert;
pub mod docx;
pub mod engine;
pub mod extract;
pub mod package;

pub use convert::{PdfConverter, DEFAULT_CONVERT_URL};
pub use docx::{render_text, rewrite_document_xml};
pub use engine::{autofill_placeholders, discover, fill_template, FilledDocument};
pub use extract::{open_requisite_source, PdfDocument, RequisiteSource};
pub use package::{DocxPackage, DOCUMENT_PART};
