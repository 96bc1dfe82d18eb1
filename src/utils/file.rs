//! File utilities for uploads and ingestion.

use std::io::Write;
use std::path::Path;

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

/// Calculate SHA-256 checksum of bytes.
pub fn calculate_checksum(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Lower-cased extension of a filename, without the dot.
pub fn file_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Reduce a client-supplied filename to its final component and strip characters
/// that are not allowed in filenames on common operating systems.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.chars()
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect::<String>()
        .trim_matches(|c: char| c == '-' || c.is_whitespace())
        .to_string()
}

/// Write `bytes` to a temporary file that keeps the original extension.
///
/// The file is removed when the returned handle is dropped.
pub fn write_temp_upload(
    dir: Option<&Path>,
    extension: &str,
    bytes: &[u8],
) -> std::io::Result<NamedTempFile> {
    let suffix = format!(".{extension}");
    let mut builder = tempfile::Builder::new();
    builder.prefix("upload-").suffix(&suffix);

    let mut file = match dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            builder.tempfile_in(dir)?
        }
        None => builder.tempfile()?,
    };
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

/// Get the relative path from a base directory.
pub fn get_relative_path(base: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(base)
        .ok()
        .map(|p| p.to_string_lossy().to_string())
}

/// Display name for an ingested file: relative to `base` when possible.
pub fn display_name(base: &Path, path: &Path) -> String {
    if base == path {
        return path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
    }
    get_relative_path(base, path).unwrap_or_else(|| path.to_string_lossy().to_string())
}
