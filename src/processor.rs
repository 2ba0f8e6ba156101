// ==============================================================================
// processor.rs - Covariance Run Orchestration
// ==============================================================================
// Description: Builds per-gene variant covariance for every gene in a model db
// Author: Matt Barham
// Created: 2025-10-31
// Modified: 2026-10-18
// Version: 3.1.0
// ==============================================================================

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::covariance;
use crate::gene_model::GeneModelReader;
use crate::genotype_registry::GenotypeRegistry;
use crate::models::{GeneMetadata, IdentifierMode};
use crate::output::{self, CovarianceWriter};
use crate::parsers::load_individuals;

/// Inputs for one covariance run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub genotype_folder: PathBuf,
    /// Filename pattern with one capture group for the chromosome label
    pub genotype_pattern: String,
    pub model_db: PathBuf,
    pub output: PathBuf,
    pub identifier_mode: IdentifierMode,
    /// Accepted for compatibility; does not change the computation
    pub individuals: Option<PathBuf>,
    /// Fail when a gene references a chromosome without a genotype file
    pub require_all_chromosomes: bool,
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub genes_listed: usize,
    pub genes_written: usize,
    pub genes_skipped: usize,
    pub rows_written: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every gene was processed
    Completed(RunSummary),
    /// Output already present; nothing was read or written
    OutputExists(PathBuf),
    /// Stopped between genes; rows so far are left in `<output>.partial`
    Interrupted(RunSummary),
}

pub struct CovarianceProcessor {
    config: RunConfig,
    stop: Arc<AtomicBool>,
}

impl CovarianceProcessor {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a flag that stops the run before the next gene
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Main processing pipeline
    pub fn run(&self) -> Result<RunOutcome> {
        let config = &self.config;

        // 1. Idempotence guard
        if output::output_exists(&config.output) {
            info!(
                "Output {:?} already exists, either delete it or move it",
                config.output
            );
            return Ok(RunOutcome::OutputExists(config.output.clone()));
        }

        // 2. Discover genotype archives
        info!("Getting parquet genotypes from {:?}", config.genotype_folder);
        let registry = GenotypeRegistry::discover(&config.genotype_folder, &config.genotype_pattern)
            .context("Failed to discover genotype files")?;

        // 3. Load gene list
        info!("Getting genes from {:?}", config.model_db);
        let model = GeneModelReader::open(&config.model_db)?;
        model.validate().context("Gene model database validation failed")?;
        let genes = model.list_genes()?;

        if let Some(path) = &config.individuals {
            let individuals = load_individuals(path)
                .with_context(|| format!("Failed to load individual list {:?}", path))?;
            info!(
                "Loaded {} individuals from {:?} (not applied to covariance)",
                individuals.len(),
                path
            );
        }

        // 4. Stream per-gene covariance
        info!("Processing {} genes", genes.len());
        let mut writer = CovarianceWriter::create(&config.output)?;
        let mut summary = RunSummary {
            genes_listed: genes.len(),
            ..RunSummary::default()
        };

        let streamed = self.stream_genes(&model, &registry, &genes, &mut writer, &mut summary);
        summary.rows_written = writer.rows_written();

        match streamed {
            Ok(GeneStream::Finished) => {
                writer.finish()?;
                info!(
                    "Finished building covariance: {} genes written, {} skipped, {} rows",
                    summary.genes_written, summary.genes_skipped, summary.rows_written
                );
                Ok(RunOutcome::Completed(summary))
            }
            Ok(GeneStream::Stopped) => {
                writer.abandon()?;
                Ok(RunOutcome::Interrupted(summary))
            }
            Err(err) => {
                writer.discard();
                Err(err)
            }
        }
    }

    fn stream_genes(
        &self,
        model: &GeneModelReader,
        registry: &GenotypeRegistry,
        genes: &[GeneMetadata],
        writer: &mut CovarianceWriter,
        summary: &mut RunSummary,
    ) -> Result<GeneStream> {
        let config = &self.config;
        let mut warned_chromosomes: BTreeSet<String> = BTreeSet::new();

        writer.write_header()?;

        for (idx, gene) in genes.iter().enumerate() {
            if self.stop.load(Ordering::SeqCst) {
                warn!("Stop requested after {}/{} genes", idx, genes.len());
                return Ok(GeneStream::Stopped);
            }

            trace!("Processing {}/{}: {}", idx + 1, genes.len(), gene.gene);

            let weights = model.weights_for(&gene.gene)?;
            let genotypes = covariance::gather(&weights, registry)
                .with_context(|| format!("Failed to gather genotypes for gene {}", gene.gene))?;

            let missing = genotypes.missing_chromosomes();
            if !missing.is_empty() {
                if config.require_all_chromosomes {
                    anyhow::bail!(
                        "Gene {} references chromosomes without genotype files: {}",
                        gene.gene,
                        missing.join(", ")
                    );
                }
                for chromosome in missing {
                    if warned_chromosomes.insert(chromosome.clone()) {
                        warn!(
                            "No genotype file for chromosome {} (first referenced by gene {})",
                            chromosome, gene.gene
                        );
                    }
                }
            }

            if genotypes.is_empty() {
                debug!("No genotype available for {}, skipping", gene.gene);
                summary.genes_skipped += 1;
                continue;
            }

            let entries = covariance::compute_and_flatten(
                &gene.gene,
                &genotypes,
                &weights,
                config.identifier_mode,
            )?;
            writer.write_entries(&entries)?;
            summary.genes_written += 1;
        }

        Ok(GeneStream::Finished)
    }
}

/// How the gene loop ended
enum GeneStream {
    Finished,
    Stopped,
}
