//! Text extraction from uploaded documents.
//!
//! Each supported extension maps to an [`ExtractionStrategy`]: a primary
//! extractor and an optional fallback that runs when the primary fails or
//! yields nothing. All extractors are blocking; callers run them on a
//! blocking thread.

mod generic;
mod legacy;
mod office;
mod pdf;
mod rtf;
mod text;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::ExtractError;
use crate::utils::has_meaningful_content;

pub use generic::GenericExtractor;
pub use legacy::{LegacyBinaryExtractor, printable_runs};
pub use office::{DocxExtractor, PptxExtractor};
pub use pdf::PdfExtractor;
pub use rtf::{RtfExtractor, strip_rtf};
pub use text::{PlainTextExtractor, decode_text};

/// Extracts the full text of one file format.
pub trait FormatExtractor: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &'static str;

    fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

/// How a single extension is handled.
#[derive(Clone)]
pub struct ExtractionStrategy {
    pub primary: Arc<dyn FormatExtractor>,
    pub fallback: Option<Arc<dyn FormatExtractor>>,
}

impl ExtractionStrategy {
    pub fn new(primary: impl FormatExtractor + 'static) -> Self {
        Self {
            primary: Arc::new(primary),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: impl FormatExtractor + 'static) -> Self {
        self.fallback = Some(Arc::new(fallback));
        self
    }
}

/// Registry of extraction strategies keyed by lower-case extension.
pub struct ExtractorRegistry {
    strategies: HashMap<String, ExtractionStrategy>,
}

impl ExtractorRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Registry with every supported document format.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("pdf", ExtractionStrategy::new(PdfExtractor));
        registry.register(
            "docx",
            ExtractionStrategy::new(DocxExtractor).with_fallback(GenericExtractor),
        );
        registry.register(
            "pptx",
            ExtractionStrategy::new(PptxExtractor).with_fallback(GenericExtractor),
        );
        registry.register("doc", ExtractionStrategy::new(LegacyBinaryExtractor::new("doc")));
        registry.register("ppt", ExtractionStrategy::new(LegacyBinaryExtractor::new("ppt")));
        registry.register("rtf", ExtractionStrategy::new(RtfExtractor));
        registry.register("txt", ExtractionStrategy::new(PlainTextExtractor));
        registry
    }

    pub fn register(&mut self, extension: &str, strategy: ExtractionStrategy) {
        self.strategies.insert(extension.to_lowercase(), strategy);
    }

    pub fn supports(&self, extension: &str) -> bool {
        self.strategies.contains_key(&extension.to_lowercase())
    }

    /// Supported extensions, sorted.
    pub fn supported_extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        exts.sort_unstable();
        exts
    }

    /// Extract the text of `path`, dispatching on `extension`.
    ///
    /// Returns [`ExtractError::NoText`] when every extractor for the format
    /// succeeded but produced only whitespace.
    pub fn extract(&self, path: &Path, extension: &str) -> Result<String, ExtractError> {
        let extension = extension.to_lowercase();
        let strategy = self
            .strategies
            .get(&extension)
            .ok_or_else(|| ExtractError::Unsupported(extension.clone()))?;

        let primary = strategy.primary.extract(path);
        if let Ok(text) = &primary
            && has_meaningful_content(text)
        {
            return primary;
        }

        if let Some(fallback) = &strategy.fallback {
            match &primary {
                Ok(_) => debug!(
                    extractor = strategy.primary.name(),
                    "primary extractor found no text, trying fallback"
                ),
                Err(e) => warn!(
                    extractor = strategy.primary.name(),
                    error = %e,
                    "primary extractor failed, trying fallback"
                ),
            }

            match fallback.extract(path) {
                Ok(text) if has_meaningful_content(&text) => return Ok(text),
                Ok(_) => {}
                Err(e) => debug!(extractor = fallback.name(), error = %e, "fallback failed"),
            }
        }

        match primary {
            Ok(_) => Err(ExtractError::NoText(extension)),
            Err(e) => Err(e),
        }
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
