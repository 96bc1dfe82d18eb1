//! RTF extractor: strips control words and groups, keeping the document body.

use std::path::Path;

use super::FormatExtractor;
use super::text::decode_latin1;
use crate::error::ExtractError;

/// Destination groups whose content is not document text.
const SKIPPED_DESTINATIONS: &[&str] = &[
    "author",
    "colortbl",
    "comment",
    "company",
    "creatim",
    "doccomm",
    "fonttbl",
    "footer",
    "footerf",
    "footerl",
    "footerr",
    "header",
    "headerf",
    "headerl",
    "headerr",
    "info",
    "keywords",
    "listoverridetable",
    "listtable",
    "object",
    "operator",
    "pict",
    "printim",
    "revtim",
    "rsidtbl",
    "stylesheet",
    "subject",
    "title",
];

pub struct RtfExtractor;

impl FormatExtractor for RtfExtractor {
    fn name(&self) -> &'static str {
        "rtf"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path)?;
        let source = decode_latin1(&bytes);
        if !source.trim_start().starts_with("{\\rtf") {
            return Err(ExtractError::failed("rtf", "missing {\\rtf header"));
        }
        Ok(strip_rtf(&source))
    }
}

#[derive(Debug, Clone, Copy)]
struct GroupState {
    skip: bool,
    /// Fallback characters that follow a `\uN` escape.
    unicode_skip: usize,
}

impl Default for GroupState {
    fn default() -> Self {
        Self {
            skip: false,
            unicode_skip: 1,
        }
    }
}

/// Convert RTF markup to plain text.
pub fn strip_rtf(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::new();
    let mut stack: Vec<GroupState> = Vec::new();
    let mut state = GroupState::default();
    // Fallback characters still to drop after a `\uN`.
    let mut pending_skip = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '{' => {
                stack.push(state);
                i += 1;
            }
            '}' => {
                state = stack.pop().unwrap_or_default();
                i += 1;
            }
            '\\' => {
                i += 1;
                let Some(&next) = chars.get(i) else { break };

                if next.is_ascii_alphabetic() {
                    let word_start = i;
                    while i < chars.len() && chars[i].is_ascii_alphabetic() {
                        i += 1;
                    }
                    let word: String = chars[word_start..i].iter().collect();

                    let param_start = i;
                    if i < chars.len() && chars[i] == '-' {
                        i += 1;
                    }
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                    let param: Option<i32> = chars[param_start..i]
                        .iter()
                        .collect::<String>()
                        .parse()
                        .ok();
                    if i < chars.len() && chars[i] == ' ' {
                        i += 1;
                    }

                    match word.as_str() {
                        "par" | "line" | "sect" | "page" | "row" if !state.skip => {
                            out.push('\n')
                        }
                        "tab" | "cell" if !state.skip => out.push('\t'),
                        "uc" => state.unicode_skip = param.unwrap_or(1).max(0) as usize,
                        "u" => {
                            if let Some(code) = param {
                                let code = if code < 0 { code + 65536 } else { code };
                                if !state.skip
                                    && let Some(ch) = char::from_u32(code as u32)
                                {
                                    out.push(ch);
                                }
                                pending_skip = state.unicode_skip;
                            }
                        }
                        w if SKIPPED_DESTINATIONS.contains(&w) => state.skip = true,
                        _ => {}
                    }
                    continue;
                }

                i += 1;
                match next {
                    '\'' => {
                        let hex: String = chars.iter().skip(i).take(2).collect();
                        i += hex.len();
                        if pending_skip > 0 {
                            pending_skip -= 1;
                        } else if !state.skip
                            && let Ok(byte) = u8::from_str_radix(&hex, 16)
                        {
                            out.push(char::from(byte));
                        }
                    }
                    '*' => state.skip = true,
                    '\\' | '{' | '}' if !state.skip => out.push(next),
                    '~' if !state.skip => out.push(' '),
                    '_' if !state.skip => out.push('-'),
                    '\n' | '\r' if !state.skip => out.push('\n'),
                    _ => {}
                }
            }
            '\r' | '\n' => i += 1,
            _ => {
                if pending_skip > 0 {
                    pending_skip -= 1;
                } else if !state.skip {
                    out.push(c);
                }
                i += 1;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_strip_basic_document() {
        let rtf = r"{\rtf1\ansi\deff0{\fonttbl{\f0 Times New Roman;}}{\colortbl;\red0\green0\blue0;}
\f0\fs24 Hello \b bold\b0  world.\par
Second line.\par
}";
        assert_eq!(strip_rtf(rtf), "Hello bold world.\nSecond line.\n");
    }

    #[test]
    fn test_hex_and_unicode_escapes() {
        let rtf = r"{\rtf1 caf\'e9 \u8364? euro\par}";
        assert_eq!(strip_rtf(rtf), "café € euro\n");
    }

    #[test]
    fn test_ignorable_destinations_skipped() {
        let rtf = r"{\rtf1{\*\generator Riched20;}{\info{\title Secret}}Body\par}";
        assert_eq!(strip_rtf(rtf), "Body\n");
    }

    #[test]
    fn test_escaped_braces() {
        let rtf = r"{\rtf1 a \{b\} c\\d}";
        assert_eq!(strip_rtf(rtf), "a {b} c\\d");
    }

    #[test]
    fn test_extract_rejects_non_rtf() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fake.rtf");
        std::fs::write(&path, "just text").unwrap();

        assert!(RtfExtractor.extract(&path).is_err());
    }

    #[test]
    fn test_extract_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memo.rtf");
        std::fs::write(&path, r"{\rtf1\ansi Memo body\par}").unwrap();

        assert_eq!(RtfExtractor.extract(&path).unwrap(), "Memo body\n");
    }
}
