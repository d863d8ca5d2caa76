//! Per-character formatting records and rendering options.
//!
//! Flattening a paragraph produces one [`CharFormat`] per character
//! position. The record keeps the four scalar flags next to the run's
//! original properties block so re-segmentation can group characters back
//! into a minimal set of runs.

use std::sync::Arc;

/// Source of a run's properties block.
///
/// Equality for run merging is defined over the scalar flags when neither
/// side carries a block, and over block *identity* otherwise: two source
/// runs with identical-looking properties still produce distinct blocks,
/// and must not be merged.
#[derive(Debug, Clone)]
pub enum RunProps {
    /// No captured block. Properties are synthesized at serialization time
    /// from the scalar flags and the active [`RenderOptions`].
    Synthesized,
    /// The run's original `w:rPr` subtree, captured verbatim as raw markup
    /// and shared by every character the source run produced.
    Preserved(Arc<str>),
}

impl RunProps {
    /// Whether two records may end up in the same output run.
    #[must_use]
    pub fn same_block(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Synthesized, Self::Synthesized) => true,
            (Self::Preserved(a), Self::Preserved(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The preserved raw markup, if any.
    #[must_use]
    pub fn preserved_xml(&self) -> Option<&str> {
        match self {
            Self::Synthesized => None,
            Self::Preserved(xml) => Some(xml),
        }
    }
}

/// Formatting of one character position in a flattened paragraph stream.
#[derive(Debug, Clone)]
pub struct CharFormat {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    /// `w:color` value (e.g. `"FF0000"`), when the run declared one.
    pub color: Option<String>,
    pub props: RunProps,
}

impl CharFormat {
    /// Unformatted text with no captured properties block.
    #[must_use]
    pub const fn plain() -> Self {
        Self {
            bold: false,
            italic: false,
            underline: false,
            color: None,
            props: RunProps::Synthesized,
        }
    }

    /// Whether a character carrying `other` can extend a run that currently
    /// carries `self`. Scalar flags plus block identity; see [`RunProps`].
    #[must_use]
    pub fn same_run(&self, other: &Self) -> bool {
        self.bold == other.bold
            && self.italic == other.italic
            && self.underline == other.underline
            && self.color == other.color
            && self.props.same_block(&other.props)
    }
}

impl Default for CharFormat {
    fn default() -> Self {
        Self::plain()
    }
}

/// Font selection for synthesized run properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontPolicy {
    /// Do not emit a `w:rFonts` declaration; the original formatting block
    /// (when captured) is reused verbatim instead.
    Preserve,
    /// Declare this family on every synthesized run.
    Named(String),
}

/// Font size selection for synthesized run properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizePolicy {
    /// Keep the original size; no `w:sz` declaration is emitted.
    Preserve,
    /// Size in points. Serialized as half-points (`w:sz w:val="2n"`).
    Points(u32),
}

/// Output options for one fill pass.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub font: FontPolicy,
    pub font_size: SizePolicy,
    /// Also request a PDF rendition from the remote converter.
    pub export_pdf: bool,
    /// Conversion endpoint override; the backend's default service is used
    /// otherwise.
    pub pdf_url: Option<String>,
    /// Explicit output file name; a timestamped name is derived otherwise.
    pub output_name: Option<String>,
}

impl RenderOptions {
    /// Preserve-everything defaults: original fonts and sizes, DOCX only.
    #[must_use]
    pub const fn preserve() -> Self {
        Self {
            font: FontPolicy::Preserve,
            font_size: SizePolicy::Preserve,
            export_pdf: false,
            pdf_url: None,
            output_name: None,
        }
    }

    /// Set the font family applied to synthesized runs.
    #[must_use = "returns options with the font configured"]
    pub fn with_font(mut self, family: impl Into<String>) -> Self {
        self.font = FontPolicy::Named(family.into());
        self
    }

    /// Set the font size (points) applied to synthesized runs.
    #[must_use = "returns options with the size configured"]
    pub const fn with_font_size(mut self, points: u32) -> Self {
        self.font_size = SizePolicy::Points(points);
        self
    }

    /// Request a PDF rendition alongside the DOCX.
    #[must_use = "returns options with PDF export configured"]
    pub const fn with_pdf(mut self, enable: bool) -> Self {
        self.export_pdf = enable;
        self
    }

    /// Send conversion requests to this endpoint instead of the default.
    #[must_use = "returns options with the endpoint configured"]
    pub fn with_pdf_url(mut self, url: impl Into<String>) -> Self {
        self.pdf_url = Some(url.into());
        self
    }

    /// Use an explicit output file name.
    #[must_use = "returns options with the output name configured"]
    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::preserve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesized_formats_merge_on_scalar_flags() {
        let a = CharFormat {
            bold: true,
            ..CharFormat::plain()
        };
        let b = CharFormat {
            bold: true,
            ..CharFormat::plain()
        };
        assert!(a.same_run(&b));
        let c = CharFormat::plain();
        assert!(!a.same_run(&c));
    }

    #[test]
    fn test_preserved_formats_merge_on_block_identity() {
        let block: Arc<str> = Arc::from("<w:rPr><w:b/></w:rPr>");
        let same_block = CharFormat {
            bold: true,
            props: RunProps::Preserved(Arc::clone(&block)),
            ..CharFormat::plain()
        };
        let shared = CharFormat {
            bold: true,
            props: RunProps::Preserved(Arc::clone(&block)),
            ..CharFormat::plain()
        };
        // Identical markup, distinct clone: a different source run.
        let distinct = CharFormat {
            bold: true,
            props: RunProps::Preserved(Arc::from("<w:rPr><w:b/></w:rPr>")),
            ..CharFormat::plain()
        };
        assert!(same_block.same_run(&shared));
        assert!(!same_block.same_run(&distinct));
    }

    #[test]
    fn test_preserved_never_merges_with_synthesized() {
        let preserved = CharFormat {
            props: RunProps::Preserved(Arc::from("<w:rPr/>")),
            ..CharFormat::plain()
        };
        assert!(!preserved.same_run(&CharFormat::plain()));
    }

    #[test]
    fn test_color_difference_splits_runs() {
        let red = CharFormat {
            color: Some("FF0000".to_string()),
            ..CharFormat::plain()
        };
        assert!(!red.same_run(&CharFormat::plain()));
    }

    #[test]
    fn test_render_options_builder() {
        let options = RenderOptions::preserve()
            .with_font("Times New Roman")
            .with_font_size(12)
            .with_pdf(true)
            .with_pdf_url("http://localhost:3000/convert-to-pdf");
        assert_eq!(options.font, FontPolicy::Named("Times New Roman".into()));
        assert_eq!(options.font_size, SizePolicy::Points(12));
        assert!(options.export_pdf);
        assert_eq!(
            options.pdf_url.as_deref(),
            Some("http://localhost:3000/convert-to-pdf")
        );
    }
}
