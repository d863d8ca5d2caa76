//! DOCX package access: the zip container around the document parts.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use docfill_core::{DocfillError, Result};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// The main document part inside the package.
pub const DOCUMENT_PART: &str = "word/document.xml";

/// A DOCX package held in memory.
///
/// The original bytes are kept so that every part except the main document
/// can be copied back without recompression when the package is rebuilt.
#[derive(Debug, Clone)]
pub struct DocxPackage {
    bytes: Vec<u8>,
    source: Option<PathBuf>,
}

impl DocxPackage {
    /// Read a package from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Ok(Self {
            bytes,
            source: Some(path.to_path_buf()),
        })
    }

    /// Wrap already loaded bytes, e.g. an upload.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            source: None,
        }
    }

    /// The raw package bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn archive(&self) -> Result<ZipArchive<Cursor<&[u8]>>> {
        ZipArchive::new(Cursor::new(self.bytes.as_slice()))
            .map_err(|e| DocfillError::InvalidPackage(format!("not a readable zip archive: {e}")))
    }

    /// Read the main document part as XML text.
    pub fn document_xml(&self) -> Result<String> {
        let mut archive = self.archive()?;
        let mut part = archive.by_name(DOCUMENT_PART).map_err(|e| match e {
            zip::result::ZipError::FileNotFound => {
                DocfillError::MissingPart(DOCUMENT_PART.to_string())
            }
            other => DocfillError::InvalidPackage(format!("cannot open {DOCUMENT_PART}: {other}")),
        })?;
        let mut xml = String::new();
        part.read_to_string(&mut xml)?;
        Ok(xml)
    }

    /// Rebuild the package with a replaced main document part.
    ///
    /// Every other entry is copied raw, byte for byte, so untouched parts
    /// (styles, relationships, media) come out identical to the input.
    pub fn rebuild(&self, document_xml: &str) -> Result<Vec<u8>> {
        let mut archive = self.archive()?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for index in 0..archive.len() {
            let entry = archive.by_index_raw(index).map_err(|e| {
                DocfillError::InvalidPackage(format!("cannot read zip entry {index}: {e}"))
            })?;
            if entry.name() == DOCUMENT_PART {
                continue;
            }
            writer.raw_copy_file(entry).map_err(|e| {
                DocfillError::InvalidPackage(format!("cannot copy zip entry {index}: {e}"))
            })?;
        }

        writer
            .start_file(DOCUMENT_PART, SimpleFileOptions::default())
            .map_err(|e| {
                DocfillError::InvalidPackage(format!("cannot start {DOCUMENT_PART}: {e}"))
            })?;
        std::io::Write::write_all(&mut writer, document_xml.as_bytes())?;

        let cursor = writer.finish().map_err(|e| {
            DocfillError::InvalidPackage(format!("cannot finalize rebuilt package: {e}"))
        })?;
        Ok(cursor.into_inner())
    }

    /// Output file name for a filled copy of this package:
    /// `<stem>_filled_<timestamp>.docx`.
    #[must_use]
    pub fn default_output_name(&self) -> String {
        let stem = self
            .source
            .as_deref()
            .and_then(Path::file_stem)
            .and_then(|s| s.to_str())
            .unwrap_or("document");
        let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
        format!("{stem}_filled_{timestamp}.docx")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) fn docx_with_parts(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in parts {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_document_xml_reads_the_main_part() {
        let bytes = docx_with_parts(&[
            ("[Content_Types].xml", "<Types/>"),
            (DOCUMENT_PART, "<w:document/>"),
        ]);
        let package = DocxPackage::from_bytes(bytes);
        assert_eq!(package.document_xml().unwrap(), "<w:document/>");
    }

    #[test]
    fn test_missing_document_part_is_reported() {
        let bytes = docx_with_parts(&[("[Content_Types].xml", "<Types/>")]);
        let package = DocxPackage::from_bytes(bytes);
        match package.document_xml() {
            Err(DocfillError::MissingPart(part)) => assert_eq!(part, DOCUMENT_PART),
            other => panic!("expected MissingPart, got {other:?}"),
        }
    }

    #[test]
    fn test_rebuild_replaces_document_and_keeps_other_parts() {
        let bytes = docx_with_parts(&[
            ("[Content_Types].xml", "<Types/>"),
            (DOCUMENT_PART, "<w:document>old</w:document>"),
            ("word/styles.xml", "<w:styles/>"),
        ]);
        let package = DocxPackage::from_bytes(bytes);
        let rebuilt = DocxPackage::from_bytes(package.rebuild("<w:document>new</w:document>").unwrap());
        assert_eq!(rebuilt.document_xml().unwrap(), "<w:document>new</w:document>");

        let mut archive = ZipArchive::new(Cursor::new(rebuilt.bytes())).unwrap();
        let mut styles = String::new();
        archive
            .by_name("word/styles.xml")
            .unwrap()
            .read_to_string(&mut styles)
            .unwrap();
        assert_eq!(styles, "<w:styles/>");
    }

    #[test]
    fn test_not_a_zip_is_an_invalid_package() {
        let package = DocxPackage::from_bytes(b"plain text".to_vec());
        assert!(matches!(
            package.document_xml(),
            Err(DocfillError::InvalidPackage(_))
        ));
    }

    #[test]
    fn test_default_output_name_uses_source_stem() {
        let package = DocxPackage {
            bytes: Vec::new(),
            source: Some(PathBuf::from("/tmp/contract.docx")),
        };
        let name = package.default_output_name();
        assert!(name.starts_with("contract_filled_"));
        assert!(name.ends_with(".docx"));
    }
}
