//! Text processing utilities.

use std::sync::LazyLock;

use regex::Regex;

static TRAILING_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+\n").expect("valid regex"));
static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Check if content has any non-whitespace text.
pub fn has_meaningful_content(content: &str) -> bool {
    content.chars().any(|c| !c.is_whitespace() && !c.is_control())
}

/// Normalize extracted text: unify line endings, drop trailing spaces and
/// collapse runs of blank lines.
pub fn normalize_extracted(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n").replace('\u{0}', "");
    let text = TRAILING_SPACES.replace_all(&text, "\n");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}
