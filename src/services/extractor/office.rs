//! Office Open XML extractors (DOCX, PPTX).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use zip::ZipArchive;

use super::FormatExtractor;
use crate::error::ExtractError;

const DOCX_BODY: &str = "word/document.xml";
const PPTX_SLIDE_PREFIX: &str = "ppt/slides/slide";

/// Reads paragraphs from `word/document.xml`.
pub struct DocxExtractor;

impl FormatExtractor for DocxExtractor {
    fn name(&self) -> &'static str {
        "docx"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let mut archive = open_archive(path, "docx")?;
        let xml = read_entry(&mut archive, DOCX_BODY)
            .map_err(|e| ExtractError::failed("docx", format!("{DOCX_BODY}: {e}")))?;
        paragraph_text(&xml).map_err(|e| ExtractError::failed("docx", e))
    }
}

/// Reads slide text in slide order from `ppt/slides/slideN.xml`.
pub struct PptxExtractor;

impl FormatExtractor for PptxExtractor {
    fn name(&self) -> &'static str {
        "pptx"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let mut archive = open_archive(path, "pptx")?;

        let mut slides: Vec<(u32, String)> = archive
            .file_names()
            .filter_map(|name| slide_number(name).map(|n| (n, name.to_string())))
            .collect();
        if slides.is_empty() {
            return Err(ExtractError::failed("pptx", "no slides found"));
        }
        slides.sort_unstable_by_key(|(n, _)| *n);

        let mut texts = Vec::with_capacity(slides.len());
        for (_, name) in &slides {
            let xml = read_entry(&mut archive, name)
                .map_err(|e| ExtractError::failed("pptx", format!("{name}: {e}")))?;
            let text = paragraph_text(&xml).map_err(|e| ExtractError::failed("pptx", e))?;
            let text = text.trim();
            if !text.is_empty() {
                texts.push(text.to_string());
            }
        }

        Ok(texts.join("\n\n"))
    }
}

fn slide_number(name: &str) -> Option<u32> {
    name.strip_prefix(PPTX_SLIDE_PREFIX)?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

pub(super) fn open_archive(path: &Path, format: &str) -> Result<ZipArchive<File>, ExtractError> {
    let file = File::open(path)?;
    ZipArchive::new(file).map_err(|e| ExtractError::failed(format, e))
}

pub(super) fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> Result<String, String> {
    let mut entry = archive.by_name(name).map_err(|e| e.to_string())?;
    let mut xml = String::new();
    entry.read_to_string(&mut xml).map_err(|e| e.to_string())?;
    Ok(xml)
}

/// Text of the `t` runs in WordprocessingML or DrawingML, one line per `p`.
pub(super) fn paragraph_text(xml: &str) -> Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_run_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_run_text = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_run_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" | b"p" => out.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_run_text => out.push_str(&t.unescape()?),
            Event::CData(t) if in_run_text => out.push_str(&String::from_utf8_lossy(&t)),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out)
}

/// Every non-blank text node in the document, one per line.
pub(super) fn all_text_nodes(xml: &str) -> Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut nodes = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Text(t) => {
                let text = t.unescape()?;
                let text = text.trim();
                if !text.is_empty() {
                    nodes.push(text.to_string());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(nodes.join("\n"))
}
