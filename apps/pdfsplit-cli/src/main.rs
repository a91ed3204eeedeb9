//! pdfsplit - run a split job against a storage bucket
//!
//! Reads a split specification JSON, fetches the referenced source PDFs
//! from the configured bucket, assembles the requested outputs and uploads
//! them back. Exits non-zero when any output fails.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use pdfsplit_core::{SplitSpec, Splitter, StorageConfig};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "pdfsplit", about = "Split bucket-hosted PDFs into new documents")]
struct Cli {
    /// Path to the split specification JSON
    spec: PathBuf,

    /// Storage configuration JSON; environment variables are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pdfsplit=info".parse()?)
                .add_directive("pdfsplit_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => StorageConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => StorageConfig::from_env()?,
    };

    let raw = std::fs::read_to_string(&cli.spec)
        .with_context(|| format!("failed to read spec {}", cli.spec.display()))?;
    let spec: SplitSpec =
        serde_json::from_str(&raw).context("failed to parse split specification")?;

    info!(
        bucket = config.bucket.as_str(),
        sources = spec.input.len(),
        outputs = spec.output.len(),
        "starting split job"
    );

    let gateway = config.build_gateway()?;
    let mut splitter = Splitter::new(gateway);
    let report = splitter.run(&spec).await;

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(()) => info!(output = outcome.target.as_str(), "output uploaded"),
            Err(err) => error!(output = outcome.target.as_str(), %err, "output failed"),
        }
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
