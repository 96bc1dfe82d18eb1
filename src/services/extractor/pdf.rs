//! PDF extractor.

use std::path::Path;

use tracing::debug;

use super::FormatExtractor;
use crate::error::ExtractError;

/// Extracts the text layer of a PDF with pdf-extract.
///
/// Scanned PDFs without a text layer come back empty.
pub struct PdfExtractor;

impl FormatExtractor for PdfExtractor {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        debug!(path = %path.display(), "extracting pdf");
        let bytes = std::fs::read(path)?;
        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| ExtractError::failed("pdf", e))
    }
}
