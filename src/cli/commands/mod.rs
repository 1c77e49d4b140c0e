//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod check;
mod classify;
mod scrape;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "tenderscrape")]
#[command(about = "Tender attachment acquisition pipeline")]
#[command(version)]
pub struct Cli {
    /// Config file path (TOML)
    #[arg(short, long, global = true, env = "TENDERSCRAPE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server and background job worker
    Serve {
        /// Address to bind to: PORT, HOST, or HOST:PORT (default from config)
        bind: Option<String>,
    },

    /// Scrape attachments from one or more documents URLs in the foreground
    Scrape {
        /// Documents page URLs
        #[arg(required = true)]
        urls: Vec<String>,
        /// Webhook destination (overrides WEBHOOK_DEST)
        #[arg(long)]
        webhook_url: Option<String>,
        /// Print outcomes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the category filter for announcement ids without scraping
    Classify {
        /// Announcement ids (e.g. 2024/00123)
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Check that the browser and document tools are installed
    Check,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => serve::cmd_serve(settings, bind.as_deref()).await,
        Commands::Scrape {
            urls,
            webhook_url,
            json,
        } => scrape::cmd_scrape(settings, urls, webhook_url, json).await,
        Commands::Classify { ids } => classify::cmd_classify(settings, ids).await,
        Commands::Check => check::cmd_check(&settings).await,
    }
}
