//! Template engine entry points: discovery, autofill matching, and filling.

use docfill_core::{
    discover_placeholders, match_requisites, sort_for_display, strip_legacy_markers, Placeholder,
    RenderOptions, Result,
};

use crate::convert::PdfConverter;
use crate::docx::{render_text, rewrite_document_xml};
use crate::extract::RequisiteSource;
use crate::package::DocxPackage;

/// The result of filling a template.
#[derive(Debug, Clone)]
pub struct FilledDocument {
    /// The rebuilt package.
    pub docx: Vec<u8>,
    /// Converted PDF, when conversion was requested and succeeded.
    pub pdf: Option<Vec<u8>>,
    /// Suggested output file name.
    pub file_name: String,
}

/// List the placeholders of a template, ordered by first occurrence.
pub fn discover(package: &DocxPackage) -> Result<Vec<Placeholder>> {
    let xml = package.document_xml()?;
    let text = strip_legacy_markers(&render_text(&xml)?);
    let mut placeholders = discover_placeholders(&text);
    sort_for_display(&mut placeholders);
    log::debug!("discovered {} placeholder(s)", placeholders.len());
    Ok(placeholders)
}

/// Discover a template's placeholders and fill their values from a
/// counterparty details document.
pub fn autofill_placeholders(
    package: &DocxPackage,
    source: &dyn RequisiteSource,
) -> Result<Vec<Placeholder>> {
    let mut placeholders = discover(package)?;
    let requisites = source.requisite_lines()?;
    match_requisites(&mut placeholders, &requisites);
    let matched = placeholders.iter().filter(|p| !p.value.is_empty()).count();
    log::info!(
        "matched {matched} of {} placeholder(s) from {} requisite line(s)",
        placeholders.len(),
        requisites.len()
    );
    Ok(placeholders)
}

/// Substitute placeholder values into a template and rebuild the package.
///
/// Only the main document part changes; every other part is copied
/// byte for byte. A requested PDF conversion that fails is logged and
/// reported as `pdf: None`, never as a filling failure.
pub fn fill_template(
    package: &DocxPackage,
    placeholders: &[Placeholder],
    options: &RenderOptions,
) -> Result<FilledDocument> {
    let xml = package.document_xml()?;
    let rewritten = rewrite_document_xml(&xml, placeholders, options)?;
    let docx = package.rebuild(&rewritten)?;

    let file_name = options
        .output_name
        .clone()
        .unwrap_or_else(|| package.default_output_name());

    let pdf = if options.export_pdf {
        let converter = match &options.pdf_url {
            Some(url) => PdfConverter::new(url),
            None => PdfConverter::default(),
        };
        match converter.convert(docx.clone(), &file_name) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                log::warn!("PDF conversion failed, keeping DOCX only: {err}");
                None
            }
        }
    } else {
        None
    };

    Ok(FilledDocument {
        docx,
        pdf,
        file_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::tests::docx_with_parts;
    use crate::package::DOCUMENT_PART;

    fn template(body: &str) -> DocxPackage {
        let xml = format!(
            "<w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
             <w:body>{body}</w:body></w:document>"
        );
        DocxPackage::from_bytes(docx_with_parts(&[
            ("[Content_Types].xml", "<Types/>"),
            (DOCUMENT_PART, &xml),
        ]))
    }

    #[test]
    fn test_discover_orders_by_first_occurrence() {
        let package = template(
            "<w:p><w:r><w:t>Исп: #имя, ИНН #инн</w:t></w:r></w:p>\
             <w:p><w:r><w:t>Повторно #имя</w:t></w:r></w:p>",
        );
        let placeholders = discover(&package).unwrap();
        let names: Vec<&str> = placeholders.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["имя", "инн"]);
    }

    #[test]
    fn test_fill_template_replaces_tokens_in_rebuilt_package() {
        let package = template("<w:p><w:r><w:t>Уважаемый #имя!</w:t></w:r></w:p>");
        let placeholders = vec![Placeholder::new("имя", "Иванов Иван Иванович")];
        let filled = fill_template(&package, &placeholders, &RenderOptions::preserve()).unwrap();

        let rebuilt = DocxPackage::from_bytes(filled.docx);
        let text = render_text(&rebuilt.document_xml().unwrap()).unwrap();
        assert_eq!(text, "Уважаемый Иванов Иван Иванович!\n");
        assert!(filled.pdf.is_none());
    }

    #[test]
    fn test_fill_template_honors_output_name_override() {
        let package = template("<w:p><w:r><w:t>т</w:t></w:r></w:p>");
        let options = RenderOptions::preserve().with_output_name("готово.docx");
        let filled = fill_template(&package, &[], &options).unwrap();
        assert_eq!(filled.file_name, "готово.docx");
    }

    #[test]
    fn test_failed_conversion_at_custom_endpoint_keeps_docx() {
        let package = template("<w:p><w:r><w:t>#имя</w:t></w:r></w:p>");
        // An unparsable endpoint fails the conversion immediately; the
        // filled DOCX must still come back, with no PDF.
        let options = RenderOptions::preserve()
            .with_pdf(true)
            .with_pdf_url("not-a-url");
        let filled =
            fill_template(&package, &[Placeholder::new("имя", "Иванов")], &options).unwrap();
        assert!(filled.pdf.is_none());
        let text =
            render_text(&DocxPackage::from_bytes(filled.docx).document_xml().unwrap()).unwrap();
        assert_eq!(text, "Иванов\n");
    }

    #[test]
    fn test_autofill_fills_values_from_details_document() {
        let package = template("<w:p><w:r><w:t>#имя, ИНН #инн</w:t></w:r></w:p>");
        let details = template(
            "<w:p><w:r><w:t>Иванов Иван Иванович</w:t></w:r></w:p>\
             <w:p><w:r><w:t>ИНН 123456789012</w:t></w:r></w:p>",
        );
        let placeholders = autofill_placeholders(&package, &details).unwrap();
        let by_name = |name: &str| {
            placeholders
                .iter()
                .find(|p| p.name == name)
                .map(|p| p.value.as_str())
        };
        assert_eq!(by_name("имя"), Some("Иванов Иван Иванович"));
        assert_eq!(by_name("инн"), Some("123456789012"));
    }
}
