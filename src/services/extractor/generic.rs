//! Format-agnostic fallback extraction.

use std::path::Path;

use tracing::debug;

use super::FormatExtractor;
use super::legacy::printable_runs;
use super::office::{all_text_nodes, open_archive, read_entry};
use crate::error::ExtractError;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const MIN_RUN_CHARS: usize = 4;

/// Pulls whatever text it can out of a file whose structured parser failed.
///
/// ZIP containers yield the text nodes of every XML part; anything else
/// yields its printable byte runs.
pub struct GenericExtractor;

impl FormatExtractor for GenericExtractor {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path)?;
        if !bytes.starts_with(ZIP_MAGIC) {
            return Ok(printable_runs(&bytes, MIN_RUN_CHARS));
        }

        let mut archive = open_archive(path, "generic")?;
        let mut parts: Vec<String> = archive
            .file_names()
            .filter(|name| name.ends_with(".xml"))
            .map(str::to_string)
            .collect();
        parts.sort_unstable();

        let mut texts = Vec::new();
        for name in &parts {
            let text = read_entry(&mut archive, name)
                .map_err(|e| e.to_string())
                .and_then(|xml| all_text_nodes(&xml).map_err(|e| e.to_string()));
            match text {
                Ok(text) if !text.is_empty() => texts.push(text),
                Ok(_) => {}
                Err(e) => debug!(part = %name, error = %e, "skipping unreadable part"),
            }
        }

        Ok(texts.join("\n"))
    }
}
