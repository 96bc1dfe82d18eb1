//! Plain text extractor.

use std::path::Path;

use super::FormatExtractor;
use crate::error::ExtractError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub struct PlainTextExtractor;

impl FormatExtractor for PlainTextExtractor {
    fn name(&self) -> &'static str {
        "txt"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path)?;
        Ok(decode_text(&bytes))
    }
}

/// Decode as UTF-8 (dropping a BOM), falling back to Latin-1.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => decode_latin1(bytes),
    }
}

/// ISO-8859-1: every byte maps to the code point of the same value.
pub(super) fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
