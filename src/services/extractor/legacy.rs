//! Legacy binary Office formats (DOC, PPT).
//!
//! There is no structured parser for the compound document format; text is
//! recovered by scanning for runs of printable characters, the same way
//! `strings(1)` does. Both 8-bit and UTF-16LE encodings are scanned and the
//! one that recovers more text wins.

use std::path::Path;

use super::FormatExtractor;
use crate::error::ExtractError;

/// Shortest run of printable characters kept as text.
const MIN_RUN_CHARS: usize = 4;

pub struct LegacyBinaryExtractor {
    format: &'static str,
}

impl LegacyBinaryExtractor {
    pub fn new(format: &'static str) -> Self {
        Self { format }
    }
}

impl FormatExtractor for LegacyBinaryExtractor {
    fn name(&self) -> &'static str {
        self.format
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path)?;
        Ok(printable_runs(&bytes, MIN_RUN_CHARS))
    }
}

/// Recover text runs of at least `min_len` printable characters.
pub fn printable_runs(bytes: &[u8], min_len: usize) -> String {
    let narrow = collect_runs(bytes.iter().map(|&b| b as u16), min_len);
    let wide = collect_runs(
        bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]])),
        min_len,
    );

    let narrow_len: usize = narrow.iter().map(String::len).sum();
    let wide_len: usize = wide.iter().map(String::len).sum();
    let runs = if wide_len > narrow_len { wide } else { narrow };
    runs.join("\n")
}

fn collect_runs(units: impl Iterator<Item = u16>, min_len: usize) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for unit in units {
        match printable(unit) {
            Some(c) => {
                current.push(c);
                current_chars += 1;
            }
            None => {
                flush_run(&mut runs, &mut current, current_chars, min_len);
                current_chars = 0;
            }
        }
    }
    flush_run(&mut runs, &mut current, current_chars, min_len);

    runs
}

fn flush_run(runs: &mut Vec<String>, current: &mut String, chars: usize, min_len: usize) {
    if chars >= min_len {
        let trimmed = current.trim();
        if !trimmed.is_empty() {
            runs.push(trimmed.to_string());
        }
    }
    current.clear();
}

fn printable(unit: u16) -> Option<char> {
    match unit {
        0x09 => Some('\t'),
        0x0A | 0x0D => Some('\n'),
        0x20..=0x7E | 0xA0..=0xFF => char::from_u32(u32::from(unit)),
        _ => None,
    }
}
