//! md-rehost main entry point
//!
//! This is the command-line interface for moving Markdown images to a new host.

use anyhow::Context;
use clap::Parser;
use md_rehost::config::{load_config, Config, SMMS_TOKEN_ENV};
use md_rehost::output::print_summary;
use md_rehost::rehost::{build_http_client, find_documents, ReferenceExtractor};
use md_rehost::upload::{smms_uploader, Uploader};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// md-rehost: move images embedded in Markdown documents to a new host
///
/// Every image referenced by the documents under the configured root is
/// downloaded, uploaded to the image host and the references are rewritten
/// to the hosted copy.
#[derive(Parser, Debug)]
#[command(name = "md-rehost")]
#[command(version)]
#[command(about = "Rehost images referenced by Markdown documents", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Process this file or directory instead of the configured root
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Download images without uploading or rewriting documents
    #[arg(long, conflicts_with = "dry_run")]
    download_only: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// List documents and image references without fetching anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let mut config = match load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e).with_context(|| format!("loading {}", cli.config.display()));
        }
    };

    if let Some(root) = cli.root {
        config.documents.root = root;
    }

    if cli.dry_run {
        handle_dry_run(&config)
    } else {
        handle_rehost(config, cli.download_only).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("md_rehost=info,warn"),
            1 => EnvFilter::new("md_rehost=debug,info"),
            2 => EnvFilter::new("md_rehost=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows what would be fetched
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== md-rehost Dry Run ===\n");

    println!("Documents:");
    println!("  Root: {}", config.documents.root.display());
    println!("  Extension: .{}", config.documents.extension);

    println!("\nStorage:");
    println!("  Image directory: {}", config.storage.image_dir.display());
    println!("  Remote prefix: {}", config.storage.remote_prefix);

    println!("\nUpload limits:");
    println!("  Per minute: {}", config.rate_limit.per_minute);
    println!("  Per hour: {}", config.rate_limit.per_hour);

    match &config.smms {
        Some(smms) => println!("\nUpload backend: SM.MS ({})", smms.endpoint),
        None if std::env::var_os(SMMS_TOKEN_ENV).is_some() => {
            println!("\nUpload backend: SM.MS (default endpoint, token from {})", SMMS_TOKEN_ENV)
        }
        None => println!("\nUpload backend: none (download only)"),
    }

    let documents = find_documents(&config.documents.root, &config.documents.extension)?;
    let extractor = ReferenceExtractor::new(config.extract.skip_markers.clone());

    let mut total = 0;
    println!("\nImage references:");
    for document in &documents {
        let text = match std::fs::read_to_string(document) {
            Ok(text) => text,
            Err(e) => {
                println!("  {} (unreadable: {})", document.display(), e);
                continue;
            }
        };

        let references = extractor.extract(&text);
        if references.is_empty() {
            continue;
        }

        println!("  {} ({})", document.display(), references.len());
        for reference in &references {
            println!("    * {}", reference);
        }
        total += references.len();
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would rehost {} references from {} documents",
        total,
        documents.len()
    );

    Ok(())
}

/// Handles the main rehosting run
async fn handle_rehost(config: Config, download_only: bool) -> anyhow::Result<()> {
    let uploader = if download_only {
        tracing::info!("Download-only mode: documents will not be modified");
        None
    } else {
        build_uploader(&config)?
    };

    if uploader.is_none() && !download_only {
        tracing::warn!("No upload backend configured, downloading only");
    }

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing current document");
            signal_token.cancel();
        }
    });

    match md_rehost::rehost::run(&config, uploader, &cancel).await {
        Ok(summary) => {
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Rehost failed: {}", e);
            Err(e.into())
        }
    }
}

/// Builds the SM.MS uploader from `[smms]` or the environment token
fn build_uploader(config: &Config) -> anyhow::Result<Option<Arc<dyn Uploader>>> {
    let client = build_http_client(&config.fetch).context("building HTTP client")?;
    Ok(smms_uploader(config, client)?)
}
