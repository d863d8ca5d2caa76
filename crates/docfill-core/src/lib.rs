//! Core types for docfill, a DOCX placeholder templating engine.
//!
//! This crate holds the pure-logic half of the system:
//!
//! - the placeholder data model and token grammar ([`placeholder`]),
//! - per-character formatting records used by the flatten / substitute /
//!   re-segment cycle ([`format`]),
//! - the heuristic requisite matcher that auto-fills placeholders from
//!   free-text lines ([`requisites`]),
//! - the error taxonomy ([`error`]).
//!
//! Package I/O, the XML rewrite engine, and the remote PDF conversion
//! client live in `docfill-backend`.

pub mod error;
pub mod format;
pub mod placeholder;
pub mod requisites;

pub use error::{DocfillError, Result};
pub use format::{CharFormat, FontPolicy, RenderOptions, RunProps, SizePolicy};
pub use placeholder::{
    discover_placeholders, normalize_value, sort_for_display, strip_legacy_markers, Placeholder,
    TOKEN_RE,
};
pub use requisites::{
    assign_requisites, derive_short_name, looks_like_plate, match_requisites, normalize_plate,
    Requisite, UsedValues,
};
