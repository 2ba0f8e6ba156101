// ==============================================================================
// main.rs - Gene Covariance Builder Entry Point
// ==============================================================================
// Description: Command line entry point for per-gene covariance generation
// Author: Matt Barham
// Created: 2025-10-31
// Modified: 2026-10-18
// Version: 2.0.0
// ==============================================================================

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gene_covariance::models::IdentifierMode;
use gene_covariance::output::partial_path;
use gene_covariance::processor::{CovarianceProcessor, RunConfig, RunOutcome};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Folder holding per-chromosome Parquet genotype files
    #[arg(long, env)]
    parquet_genotype_folder: PathBuf,

    /// Filename pattern with one capture group for the chromosome label
    #[arg(long, env)]
    parquet_genotype_pattern: String,

    /// SQLite gene model database (extra + weights tables)
    #[arg(long, env)]
    model_db: PathBuf,

    /// Gzip-compressed covariance output (must not exist yet)
    #[arg(long, env = "COVARIANCE_OUTPUT")]
    output: PathBuf,

    /// Name variants by rsid instead of variant identifier
    #[arg(long)]
    output_rsids: bool,

    /// Newline-delimited individual identifiers (not applied to the computation)
    #[arg(long)]
    individuals: Option<PathBuf>,

    /// Log verbosity: 1 logs everything, 10 is the default, above 30 is nearly silent
    #[arg(long, default_value_t = 10)]
    parsimony: u32,

    /// Fail when a gene references a chromosome without a genotype file
    #[arg(long)]
    require_all_chromosomes: bool,
}

impl Args {
    fn into_config(self) -> RunConfig {
        RunConfig {
            genotype_folder: self.parquet_genotype_folder,
            genotype_pattern: self.parquet_genotype_pattern,
            model_db: self.model_db,
            output: self.output,
            identifier_mode: IdentifierMode::from_output_rsids(self.output_rsids),
            individuals: self.individuals,
            require_all_chromosomes: self.require_all_chromosomes,
        }
    }
}

/// Map parsimony (lower is chattier) to a tracing level
fn parsimony_level(parsimony: u32) -> &'static str {
    match parsimony {
        0..=9 => "trace",
        10..=19 => "debug",
        20..=29 => "info",
        30..=39 => "warn",
        _ => "error",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing (RUST_LOG wins over --parsimony)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("gene_covariance={}", parsimony_level(args.parsimony)).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Gene covariance builder starting...");

    let stop = Arc::new(AtomicBool::new(false));
    let signal_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current gene");
            signal_stop.store(true, Ordering::SeqCst);
        }
    });

    let config = args.into_config();
    let output = config.output.clone();
    let processor = CovarianceProcessor::new(config).with_stop_flag(stop);

    // Genes are processed one at a time on a single blocking thread
    match tokio::task::spawn_blocking(move || processor.run()).await?? {
        RunOutcome::Completed(summary) => {
            info!(
                "Processing completed successfully: {} of {} genes written ({} rows)",
                summary.genes_written, summary.genes_listed, summary.rows_written
            );
            Ok(())
        }
        RunOutcome::OutputExists(path) => {
            info!("Nothing to do, {:?} is already built", path);
            Ok(())
        }
        RunOutcome::Interrupted(summary) => {
            anyhow::bail!(
                "Interrupted after {} of {} genes; partial rows left in {:?}",
                summary.genes_written + summary.genes_skipped,
                summary.genes_listed,
                partial_path(&output)
            )
        }
    }
}
