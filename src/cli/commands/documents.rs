use anyhow::{Context, Result};

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::create_backend;

pub async fn handle_documents(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?.config;
    let formatter = get_formatter(format);

    let store = create_backend(
        &config.vector_store,
        u64::from(config.embedding.dimension),
    )
    .await
    .context("failed to connect to the vector store")?;

    let documents: Vec<String> = store
        .list_documents()
        .await
        .context("failed to list documents")?
        .into_iter()
        .collect();

    print!("{}", formatter.format_documents(&documents));
    Ok(())
}
