// ==============================================================================
// models.rs - Gene Model Data Structures
// ==============================================================================
// Description: Data structures for gene models, weights and covariance entries
// Author: Matt Barham
// Created: 2025-11-12
// Modified: 2026-10-14
// Version: 3.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};

use crate::parsers::VariantId;

/// Gene-level row from the model database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneMetadata {
    /// Gene identifier (e.g., "ENSG00000107937.14")
    pub gene: String,

    /// Number of variants in the gene's prediction model (always > 0)
    pub n_snps_in_model: u32,
}

/// Variant weight for one gene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightRecord {
    /// Gene identifier
    pub gene: String,

    /// Variant identifier, also the genotype column name
    pub variant: VariantId,

    /// Alternate identifier (rsID) if the model has one
    pub rsid: Option<String>,

    /// Model weight
    pub weight: f64,
}

/// One upper-triangle cell of a gene's covariance matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovarianceEntry {
    pub gene: String,
    pub id1: String,
    pub id2: String,
    pub value: f64,
}

/// Which identifier names the rows and columns of the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierMode {
    /// Raw variant identifier (e.g., "chr7_140453136_A_T")
    #[default]
    VariantId,
    /// Alternate identifier from the weights table (e.g., "rs113488022")
    Rsid,
}

impl IdentifierMode {
    pub fn from_output_rsids(output_rsids: bool) -> Self {
        if output_rsids {
            IdentifierMode::Rsid
        } else {
            IdentifierMode::VariantId
        }
    }
}
