//! Remote DOCX to PDF conversion.
//!
//! Conversion is delegated to an external HTTP service that accepts a
//! multipart upload and responds with the PDF bytes. Failures surface as
//! [`DocfillError::ConversionService`]; filling never depends on this
//! path succeeding.

use docfill_core::{DocfillError, Result};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use std::time::Duration;

/// Default conversion endpoint.
pub const DEFAULT_CONVERT_URL: &str =
    "https://contract-pdf-server-production.up.railway.app/convert-to-pdf";

const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Client for the PDF conversion service.
pub struct PdfConverter {
    url: String,
    client: Client,
}

impl Default for PdfConverter {
    fn default() -> Self {
        Self::new(DEFAULT_CONVERT_URL)
    }
}

impl PdfConverter {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Upload a filled DOCX and return the converted PDF bytes.
    pub fn convert(&self, docx: Vec<u8>, file_name: &str) -> Result<Vec<u8>> {
        let part = Part::bytes(docx)
            .file_name(file_name.to_string())
            .mime_str(DOCX_MIME)
            .map_err(|e| DocfillError::ConversionService(format!("invalid upload part: {e}")))?;
        let form = Form::new().part("file", part);

        log::info!("converting {file_name} to PDF via {}", self.url);
        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .map_err(|e| DocfillError::ConversionService(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DocfillError::ConversionService(format!(
                "service returned {status}"
            )));
        }
        let bytes = response
            .bytes()
            .map_err(|e| DocfillError::ConversionService(format!("cannot read response: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_service_is_a_conversion_error() {
        let converter = PdfConverter::new("not-a-url");
        let result = converter.convert(b"PK".to_vec(), "contract.docx");
        assert!(matches!(
            result,
            Err(DocfillError::ConversionService(_))
        ));
    }
}
