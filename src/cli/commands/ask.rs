use anyhow::{Context, Result};
use clap::Args;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat, Question};
use crate::services::RagPipeline;

#[derive(Debug, Args)]
pub struct AskArgs {
    #[arg(required = true, help = "Question to answer")]
    pub query: String,

    #[arg(
        long = "document",
        short = 'd',
        help = "Only use this document as context (repeatable)"
    )]
    pub documents: Vec<String>,

    #[arg(long, short = 'n', help = "Number of chunks to retrieve")]
    pub n_results: Option<u32>,
}

pub async fn handle_ask(args: AskArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    if args.query.trim().is_empty() {
        anyhow::bail!("query cannot be empty");
    }

    let config = Config::load()?.config;
    let formatter = get_formatter(format);

    let pipeline = RagPipeline::from_config(&config)
        .await
        .context("failed to initialise the pipeline")?;

    let mut question = Question::new(args.query).with_documents(args.documents);
    if let Some(n) = args.n_results {
        question = question.with_n_results(n);
    }

    if verbose {
        eprintln!(
            "Retrieving from '{}' ({})",
            config.vector_store.collection, config.vector_store.driver
        );
    }

    let answer = pipeline
        .answer(&question)
        .await
        .context("failed to answer the question")?;
    print!("{}", formatter.format_answer(&answer));

    Ok(())
}
