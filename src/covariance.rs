// ==============================================================================
// covariance.rs - Per-Gene Variant Covariance
// ==============================================================================
// Description: Collects a gene's genotype vectors and flattens their sample
//              covariance matrix into long-format entries
// Author: Matt Barham
// Created: 2026-10-13
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================
// Algorithm:
//   1. Chromosome labels are read from the gene's variant identifiers
//   2. Matching columns are fetched from each chromosome's archive and put
//      back in weight order (first occurrence wins)
//   3. cov[i][j] = Σ(x_i - mean_i)(x_j - mean_j) / (N - 1)
//   4. Entries are emitted for i <= j, row-major over the weight order
// ==============================================================================

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;
use tracing::debug;

use crate::genotype_registry::{GenotypeRegistry, RegistryError};
use crate::models::{CovarianceEntry, IdentifierMode, WeightRecord};
use crate::parsers::VariantId;

/// Errors raised while computing a gene's covariance
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CovarianceError {
    #[error("Gene {gene}: variant {variant} has {found} individuals, expected {expected}")]
    LengthMismatch {
        gene: String,
        variant: String,
        expected: usize,
        found: usize,
    },

    #[error("Gene {gene}: sample covariance needs at least 2 individuals, found {found}")]
    InsufficientIndividuals { gene: String, found: usize },

    #[error("Gene {gene}: variant {variant} has no alternate identifier (rsid) in the weights table")]
    MissingAlternateId { gene: String, variant: String },
}

/// Genotype vectors collected for one gene
#[derive(Debug, Clone, Default)]
pub struct GeneGenotypes {
    variants: Vec<VariantId>,
    vectors: Vec<Vec<f64>>,
    missing_chromosomes: Vec<String>,
}

impl GeneGenotypes {
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Variants with data, in weight order
    pub fn variants(&self) -> &[VariantId] {
        &self.variants
    }

    pub fn vectors(&self) -> &[Vec<f64>] {
        &self.vectors
    }

    /// Chromosomes referenced by the gene that have no archive
    pub fn missing_chromosomes(&self) -> &[String] {
        &self.missing_chromosomes
    }
}

/// Chromosome labels referenced by a gene's weights
pub fn chromosomes_needed(weights: &[WeightRecord]) -> BTreeSet<String> {
    weights
        .iter()
        .map(|w| w.variant.chromosome().to_string())
        .collect()
}

/// Fetch the gene's variant columns from every referenced chromosome archive
///
/// Variants without a column, and chromosomes without an archive, contribute
/// nothing. The latter are reported in `missing_chromosomes`.
pub fn gather(weights: &[WeightRecord], registry: &GenotypeRegistry) -> Result<GeneGenotypes, RegistryError> {
    let mut fetched: HashMap<String, Vec<f64>> = HashMap::new();
    let mut missing_chromosomes = Vec::new();

    for chromosome in chromosomes_needed(weights) {
        let Some(dataset) = registry.get(&chromosome) else {
            missing_chromosomes.push(chromosome);
            continue;
        };

        let ids: Vec<&str> = weights
            .iter()
            .filter(|w| w.variant.chromosome() == chromosome)
            .map(|w| w.variant.as_str())
            .collect();

        fetched.extend(dataset.fetch(&ids)?);
    }

    let mut variants = Vec::with_capacity(fetched.len());
    let mut vectors = Vec::with_capacity(fetched.len());
    for weight in weights {
        if let Some(vector) = fetched.remove(weight.variant.as_str()) {
            variants.push(weight.variant.clone());
            vectors.push(vector);
        }
    }

    Ok(GeneGenotypes {
        variants,
        vectors,
        missing_chromosomes,
    })
}

/// Symmetric sample covariance matrix, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceMatrix {
    dim: usize,
    values: Vec<f64>,
}

impl CovarianceMatrix {
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Cell `(i, j)`, or `None` outside the matrix
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        if i < self.dim && j < self.dim {
            Some(self.values[i * self.dim + j])
        } else {
            None
        }
    }
}

/// Sample covariance (N - 1 normalization) of a gene's genotype vectors
pub fn covariance_matrix(gene: &str, genotypes: &GeneGenotypes) -> Result<CovarianceMatrix, CovarianceError> {
    let dim = genotypes.len();
    if dim == 0 {
        return Ok(CovarianceMatrix { dim, values: Vec::new() });
    }
    let n = genotypes.vectors[0].len();

    for (variant, vector) in genotypes.variants.iter().zip(&genotypes.vectors) {
        if vector.len() != n {
            return Err(CovarianceError::LengthMismatch {
                gene: gene.to_string(),
                variant: variant.to_string(),
                expected: n,
                found: vector.len(),
            });
        }
    }
    if n < 2 {
        return Err(CovarianceError::InsufficientIndividuals {
            gene: gene.to_string(),
            found: n,
        });
    }

    let centered: Vec<Vec<f64>> = genotypes
        .vectors
        .iter()
        .map(|vector| {
            let mean = vector.iter().sum::<f64>() / n as f64;
            vector.iter().map(|x| x - mean).collect()
        })
        .collect();

    let denominator = (n - 1) as f64;
    let mut values = vec![0.0; dim * dim];
    for i in 0..dim {
        for j in i..dim {
            let dot: f64 = centered[i].iter().zip(&centered[j]).map(|(a, b)| a * b).sum();
            let value = dot / denominator;
            values[i * dim + j] = value;
            values[j * dim + i] = value;
        }
    }

    Ok(CovarianceMatrix { dim, values })
}

/// Compute the gene's covariance and flatten the upper triangle
///
/// Entries run over `i` in weight order and, for each `i`, over `j >= i`, so
/// a gene with `k` variants yields `k * (k + 1) / 2` entries.
pub fn compute_and_flatten(
    gene: &str,
    genotypes: &GeneGenotypes,
    weights: &[WeightRecord],
    mode: IdentifierMode,
) -> Result<Vec<CovarianceEntry>, CovarianceError> {
    let labels = output_labels(gene, genotypes, weights, mode)?;
    let matrix = covariance_matrix(gene, genotypes)?;

    let dim = matrix.dim();
    let mut entries = Vec::with_capacity(dim * (dim + 1) / 2);
    for i in 0..dim {
        for j in i..dim {
            entries.push(CovarianceEntry {
                gene: gene.to_string(),
                id1: labels[i].clone(),
                id2: labels[j].clone(),
                value: matrix.values[i * dim + j],
            });
        }
    }

    debug!("Gene {}: {} variants, {} covariance entries", gene, dim, entries.len());

    Ok(entries)
}

fn output_labels(
    gene: &str,
    genotypes: &GeneGenotypes,
    weights: &[WeightRecord],
    mode: IdentifierMode,
) -> Result<Vec<String>, CovarianceError> {
    match mode {
        IdentifierMode::VariantId => Ok(genotypes.variants.iter().map(|v| v.as_str().to_string()).collect()),
        IdentifierMode::Rsid => {
            let mut rsids: HashMap<&str, Option<&str>> = HashMap::new();
            for weight in weights {
                rsids
                    .entry(weight.variant.as_str())
                    .or_insert(weight.rsid.as_deref());
            }

            genotypes
                .variants
                .iter()
                .map(|variant| {
                    rsids
                        .get(variant.as_str())
                        .copied()
                        .flatten()
                        .map(str::to_string)
                        .ok_or_else(|| CovarianceError::MissingAlternateId {
                            gene: gene.to_string(),
                            variant: variant.to_string(),
                        })
                })
                .collect()
        }
    }
}
