use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::warn;
use walkdir::WalkDir;

use crate::cli::output::{IngestStats, get_formatter};
use crate::error::{PipelineError, VectorStoreError};
use crate::models::{Config, OutputFormat};
use crate::services::{ExtractorRegistry, RagPipeline};
use crate::utils::file::display_name;
use crate::utils::{file_extension, sanitize_filename};

#[derive(Debug, Args)]
pub struct IngestArgs {
    #[arg(required = true, help = "File or directory to ingest")]
    pub path: PathBuf,

    #[arg(long, short = 'e', help = "Glob pattern to exclude (repeatable)")]
    pub exclude: Vec<String>,

    #[arg(long, help = "List the files that would be ingested without ingesting them")]
    pub dry_run: bool,
}

pub async fn handle_ingest(args: IngestArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?.config;
    let formatter = get_formatter(format);
    let start_time = Instant::now();

    let base = args.path.canonicalize().context("invalid path")?;
    let files = collect_files(&base, &args.exclude)?;

    let registry = ExtractorRegistry::with_defaults();
    let (supported, unsupported): (Vec<PathBuf>, Vec<PathBuf>) =
        files.into_iter().partition(|f| is_supported(&registry, f));

    if supported.is_empty() {
        println!(
            "{}",
            formatter.format_message(&format!(
                "No supported documents found. Supported types: {}",
                registry.supported_extensions().join(", ")
            ))
        );
        return Ok(());
    }

    if args.dry_run {
        println!(
            "{}",
            formatter.format_message(&format!(
                "Dry run: Would ingest {} files ({} skipped)",
                supported.len(),
                unsupported.len()
            ))
        );
        for file in &supported {
            println!("  {}", display_name(&base, file));
        }
        return Ok(());
    }

    let pipeline = RagPipeline::from_config(&config)
        .await
        .context("failed to initialise the pipeline")?;

    let pb = ProgressBar::new(supported.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )?
            .progress_chars("#>-"),
    );

    let mut stats = IngestStats {
        files_scanned: (supported.len() + unsupported.len()) as u64,
        files_skipped: unsupported.len() as u64,
        ..Default::default()
    };

    for file in &supported {
        let name = display_name(&base, file);
        let document = document_name(file);
        pb.set_message(name.clone());

        match pipeline.ingest(file, &document).await {
            Ok(report) => {
                stats.files_ingested += 1;
                stats.chunks_created += report.chunks as u64;
                if verbose {
                    pb.println(format!(
                        "Ingested {} as '{}' ({} chunks)",
                        name, document, report.chunks
                    ));
                }
            }
            Err(PipelineError::Store(
                e @ (VectorStoreError::Unavailable(_) | VectorStoreError::PgVectorExtensionError(_)),
            )) => {
                pb.finish_and_clear();
                return Err(e).context("vector store is unavailable");
            }
            Err(e) => {
                warn!(file = %name, stage = e.stage(), error = %e, "ingest failed");
                stats.files_failed += 1;
                stats.failures.push((name, e.to_string()));
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    stats.duration_ms = start_time.elapsed().as_millis() as u64;
    print!("{}", formatter.format_ingest_stats(&stats));

    if stats.files_ingested == 0 {
        anyhow::bail!("no documents were ingested");
    }
    Ok(())
}

/// Stored document name: the sanitized base name, the same key an HTTP upload gets.
fn document_name(path: &Path) -> String {
    path.file_name()
        .map(|n| sanitize_filename(&n.to_string_lossy()))
        .unwrap_or_default()
}

fn is_supported(registry: &ExtractorRegistry, path: &Path) -> bool {
    path.file_name()
        .and_then(|n| file_extension(&n.to_string_lossy()))
        .is_some_and(|ext| registry.supports(&ext))
}

fn collect_files(path: &Path, exclude: &[String]) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let patterns = exclude
        .iter()
        .map(|p| glob::Pattern::new(p).with_context(|| format!("invalid exclude pattern: {}", p)))
        .collect::<Result<Vec<_>>>()?;

    let mut files = Vec::new();
    for entry in WalkDir::new(path).follow_links(false).sort_by_file_name() {
        let entry = entry.context("failed to read directory entry")?;
        let entry_path = entry.path();

        if !entry.file_type().is_file() {
            continue;
        }

        let path_str = entry_path.to_string_lossy();
        if patterns.iter().any(|p| p.matches(&path_str)) {
            continue;
        }
        files.push(entry_path.to_path_buf());
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_collect_files_applies_excludes() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("drafts")).unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("b.pdf"), "b").unwrap();
        std::fs::write(dir.path().join("drafts/c.txt"), "c").unwrap();

        let files = collect_files(dir.path(), &["**/drafts/**".to_string()]).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|f| display_name(dir.path(), f))
            .collect();

        assert_eq!(names, vec!["a.txt", "b.pdf"]);
    }

    #[test]
    fn test_collect_single_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("only.docx");
        std::fs::write(&file, "x").unwrap();

        assert_eq!(collect_files(&file, &[]).unwrap(), vec![file]);
    }

    #[test]
    fn test_invalid_exclude_pattern() {
        let dir = tempdir().unwrap();
        assert!(collect_files(dir.path(), &["[".to_string()]).is_err());
    }

    #[test]
    fn test_document_name_matches_upload_naming() {
        let nested = Path::new("/srv/docs/hr/2024/handbook.pdf");
        assert_eq!(document_name(nested), "handbook.pdf");
        assert_eq!(document_name(nested), sanitize_filename("hr/2024/handbook.pdf"));
        assert_eq!(document_name(Path::new("notes: draft.txt")), "notes- draft.txt");
    }

    #[test]
    fn test_is_supported() {
        let registry = ExtractorRegistry::with_defaults();
        assert!(is_supported(&registry, Path::new("/x/Report.PDF")));
        assert!(is_supported(&registry, Path::new("slides.pptx")));
        assert!(!is_supported(&registry, Path::new("setup.exe")));
        assert!(!is_supported(&registry, Path::new("Makefile")));
    }
}
