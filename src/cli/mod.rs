//! Command-line interface for docqa.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Ask questions about your documents, answered by Gemini over a vector store.
#[derive(Debug, Parser)]
#[command(name = "docqa")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP API (upload, query, documents)
    Serve(commands::ServeArgs),

    /// Extract, chunk, embed and store local documents
    Ingest(commands::IngestArgs),

    /// Answer a question from the stored documents
    Ask(commands::AskArgs),

    /// List stored documents
    Documents,

    /// Check vector store connectivity and API configuration
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
