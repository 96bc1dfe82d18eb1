use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::models::{Answer, OutputFormat};
use crate::services::MetricsSummary;

pub trait Formatter {
    fn format_answer(&self, answer: &Answer) -> String;
    fn format_ingest_stats(&self, stats: &IngestStats) -> String;
    fn format_documents(&self, documents: &[String]) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub vector_store_driver: String,
    pub vector_store_url: String,
    pub vector_store_connected: bool,
    pub vector_store_points: u64,
    pub collection: String,
    pub api_key_configured: bool,
    pub embedding_model: String,
    pub generation_model: String,
    pub metrics: Option<MetricsSummary>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStats {
    pub files_scanned: u64,
    pub files_ingested: u64,
    pub files_skipped: u64,
    pub files_failed: u64,
    pub chunks_created: u64,
    pub duration_ms: u64,
    /// Filename and user-facing reason for each failed file.
    pub failures: Vec<(String, String)>,
}

const PREVIEW_CHARS: usize = 160;

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > PREVIEW_CHARS {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        flat
    }
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_answer(&self, answer: &Answer) -> String {
        let mut output = String::new();
        writeln!(output, "{}", answer.response.trim_end()).unwrap();

        if !answer.sources.is_empty() {
            writeln!(output).unwrap();
            writeln!(output, "Sources ({} in {}ms):", answer.sources.len(), answer.duration_ms)
                .unwrap();
            for (i, source) in answer.sources.iter().enumerate() {
                writeln!(
                    output,
                    "{}. {} #{} [Score: {:.3}]",
                    i + 1,
                    source.filename,
                    source.chunk_index,
                    source.score
                )
                .unwrap();
                writeln!(output, "   {}", preview(&source.text)).unwrap();
            }
        }

        output
    }

    fn format_ingest_stats(&self, stats: &IngestStats) -> String {
        let mut output = String::new();
        writeln!(output, "Ingest Complete").unwrap();
        writeln!(output, "---------------").unwrap();
        writeln!(output, "Files scanned:  {}", stats.files_scanned).unwrap();
        writeln!(output, "Files ingested: {}", stats.files_ingested).unwrap();
        writeln!(output, "Files skipped:  {}", stats.files_skipped).unwrap();
        writeln!(output, "Files failed:   {}", stats.files_failed).unwrap();
        writeln!(output, "Chunks created: {}", stats.chunks_created).unwrap();
        writeln!(output, "Duration: {}ms", stats.duration_ms).unwrap();
        for (file, reason) in &stats.failures {
            writeln!(output, "  ✗ {}: {}", file, reason).unwrap();
        }
        output
    }

    fn format_documents(&self, documents: &[String]) -> String {
        if documents.is_empty() {
            return "No documents stored.\n".to_string();
        }

        let mut output = String::new();
        writeln!(output, "Documents ({})", documents.len()).unwrap();
        writeln!(output, "---------").unwrap();
        for name in documents {
            writeln!(output, "  {}", name).unwrap();
        }
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();

        let vector_status = if status.vector_store_connected {
            "[CONNECTED]"
        } else {
            "[DISCONNECTED]"
        };
        writeln!(
            output,
            "Vector Store:  {} ({})",
            status.vector_store_driver, vector_status
        )
        .unwrap();
        writeln!(output, "  URL:         {}", status.vector_store_url).unwrap();
        writeln!(output, "  Collection:  {}", status.collection).unwrap();
        if status.vector_store_connected {
            writeln!(output, "  Points:      {}", status.vector_store_points).unwrap();
        }
        writeln!(output).unwrap();

        let key_status = if status.api_key_configured {
            "[CONFIGURED]"
        } else {
            "[MISSING]"
        };
        writeln!(output, "Gemini API:    {}", key_status).unwrap();
        writeln!(output, "  Embedding:   {}", status.embedding_model).unwrap();
        writeln!(output, "  Generation:  {}", status.generation_model).unwrap();

        if let Some(ref m) = status.metrics {
            writeln!(output).unwrap();
            writeln!(output, "Metrics").unwrap();
            writeln!(output, "  Requests:    {}", m.total_requests).unwrap();
            writeln!(output, "  Uploads:     {}", m.uploads).unwrap();
            writeln!(output, "  Queries:     {}", m.queries).unwrap();
            writeln!(output, "  Avg Latency: {}ms", m.avg_latency_ms).unwrap();
            if m.error_rate > 0.0 {
                writeln!(output, "  Error Rate:  {:.1}%", m.error_rate).unwrap();
            }
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render(&self, value: &impl Serialize) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}).to_string())
    }
}

impl Formatter for JsonFormatter {
    fn format_answer(&self, answer: &Answer) -> String {
        self.render(answer)
    }

    fn format_ingest_stats(&self, stats: &IngestStats) -> String {
        let failures: Vec<serde_json::Value> = stats
            .failures
            .iter()
            .map(|(file, reason)| serde_json::json!({"file": file, "reason": reason}))
            .collect();

        self.render(&serde_json::json!({
            "files_scanned": stats.files_scanned,
            "files_ingested": stats.files_ingested,
            "files_skipped": stats.files_skipped,
            "files_failed": stats.files_failed,
            "chunks_created": stats.chunks_created,
            "duration_ms": stats.duration_ms,
            "failures": failures,
        }))
    }

    fn format_documents(&self, documents: &[String]) -> String {
        self.render(&serde_json::json!({"documents": documents}))
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.render(&serde_json::json!({
            "vector_store": {
                "driver": status.vector_store_driver,
                "url": status.vector_store_url,
                "connected": status.vector_store_connected,
                "collection": status.collection,
                "points": status.vector_store_points,
            },
            "gemini": {
                "api_key_configured": status.api_key_configured,
                "embedding_model": status.embedding_model,
                "generation_model": status.generation_model,
            },
            "metrics": status.metrics,
        }))
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_answer(&self, answer: &Answer) -> String {
        let mut output = String::new();
        writeln!(output, "## Answer\n").unwrap();
        writeln!(output, "**Question:** `{}`\n", answer.query).unwrap();
        writeln!(output, "{}\n", answer.response.trim_end()).unwrap();

        if !answer.sources.is_empty() {
            writeln!(output, "### Sources\n").unwrap();
            writeln!(output, "| # | Document | Chunk | Score |").unwrap();
            writeln!(output, "|---|----------|-------|-------|").unwrap();
            for (i, source) in answer.sources.iter().enumerate() {
                writeln!(
                    output,
                    "| {} | `{}` | {} | {:.3} |",
                    i + 1,
                    source.filename,
                    source.chunk_index,
                    source.score
                )
                .unwrap();
            }
        }

        output
    }

    fn format_ingest_stats(&self, stats: &IngestStats) -> String {
        let mut output = String::new();
        writeln!(output, "## Ingest Complete\n").unwrap();
        writeln!(output, "| Metric | Value |").unwrap();
        writeln!(output, "|--------|-------|").unwrap();
        writeln!(output, "| Files scanned | {} |", stats.files_scanned).unwrap();
        writeln!(output, "| Files ingested | {} |", stats.files_ingested).unwrap();
        writeln!(output, "| Files skipped | {} |", stats.files_skipped).unwrap();
        writeln!(output, "| Files failed | {} |", stats.files_failed).unwrap();
        writeln!(output, "| Chunks created | {} |", stats.chunks_created).unwrap();
        writeln!(output, "| Duration | {}ms |", stats.duration_ms).unwrap();
        if !stats.failures.is_empty() {
            writeln!(output, "\n### Failures\n").unwrap();
            for (file, reason) in &stats.failures {
                writeln!(output, "- `{}`: {}", file, reason).unwrap();
            }
        }
        output
    }

    fn format_documents(&self, documents: &[String]) -> String {
        if documents.is_empty() {
            return "## Documents\n\n*No documents stored.*\n".to_string();
        }

        let mut output = String::new();
        writeln!(output, "## Documents\n").unwrap();
        for name in documents {
            writeln!(output, "- `{}`", name).unwrap();
        }
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "## Status\n").unwrap();

        let vector_status = if status.vector_store_connected {
            "✅"
        } else {
            "❌"
        };
        writeln!(
            output,
            "### Vector Store ({}) {}\n",
            status.vector_store_driver, vector_status
        )
        .unwrap();
        writeln!(output, "- **URL:** `{}`", status.vector_store_url).unwrap();
        writeln!(output, "- **Collection:** {}", status.collection).unwrap();
        writeln!(output, "- **Points:** {}", status.vector_store_points).unwrap();
        writeln!(output).unwrap();

        let key_status = if status.api_key_configured {
            "✅"
        } else {
            "❌"
        };
        writeln!(output, "### Gemini API {}\n", key_status).unwrap();
        writeln!(output, "- **Embedding:** `{}`", status.embedding_model).unwrap();
        writeln!(output, "- **Generation:** `{}`", status.generation_model).unwrap();

        if let Some(ref m) = status.metrics {
            writeln!(output, "\n### Metrics\n").unwrap();
            writeln!(output, "- **Requests:** {}", m.total_requests).unwrap();
            writeln!(output, "- **Avg Latency:** {}ms", m.avg_latency_ms).unwrap();
            if m.error_rate > 0.0 {
                writeln!(output, "- **Error Rate:** {:.1}%", m.error_rate).unwrap();
            }
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}
