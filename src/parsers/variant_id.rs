// ==============================================================================
// parsers/variant_id.rs - Variant Identifier Parser
// ==============================================================================
// Description: Parses structured variant identifiers into chromosome and position
// Author: Matt Barham
// Created: 2026-10-12
// Modified: 2026-10-18
// Version: 1.1.0
// ==============================================================================
// Format:
//   <chrom>_<position>[_<ref>_<alt>[_<build>]]
//   The chromosome segment may carry a leading "chr" marker.
// Examples:
//   chr7_140453136_A_T   -> chromosome "7",  position 140453136
//   chrX_155270560_G_A   -> chromosome "X",  position 155270560
//   22_16050075_A_G_b37  -> chromosome "22", position 16050075
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Segment delimiter inside a variant identifier
pub const VARIANT_ID_DELIMITER: char = '_';

/// Literal marker stripped from the chromosome segment
pub const CHROMOSOME_MARKER: &str = "chr";

/// Errors raised for malformed variant identifiers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VariantIdError {
    #[error("Variant identifier is empty")]
    Empty,

    #[error("Variant identifier '{0}' has no '_' delimiter (expected <chrom>_<position>...)")]
    MissingDelimiter(String),

    #[error("Variant identifier '{0}' has an empty chromosome segment")]
    EmptyChromosome(String),

    #[error("Variant identifier '{id}' has a non-numeric position '{position}'")]
    InvalidPosition { id: String, position: String },
}

/// Parsed variant identifier
///
/// The raw string is kept verbatim because it doubles as the column name in
/// the genotype archives and as the default output identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VariantId {
    raw: String,
    chromosome: String,
    position: u64,
}

impl VariantId {
    /// Parse a variant identifier
    ///
    /// # Examples
    /// ```
    /// use gene_covariance::parsers::VariantId;
    ///
    /// let id = VariantId::parse("chr7_140453136_A_T").unwrap();
    /// assert_eq!(id.chromosome(), "7");
    /// assert_eq!(id.position(), 140453136);
    /// ```
    pub fn parse(raw: &str) -> Result<Self, VariantIdError> {
        if raw.is_empty() {
            return Err(VariantIdError::Empty);
        }

        let mut segments = raw.split(VARIANT_ID_DELIMITER);
        let chrom_segment = segments.next().unwrap_or_default();
        let position_segment = segments
            .next()
            .ok_or_else(|| VariantIdError::MissingDelimiter(raw.to_string()))?;

        let chromosome = chrom_segment
            .strip_prefix(CHROMOSOME_MARKER)
            .unwrap_or(chrom_segment);
        if chromosome.is_empty() {
            return Err(VariantIdError::EmptyChromosome(raw.to_string()));
        }

        let position = position_segment
            .parse::<u64>()
            .map_err(|_| VariantIdError::InvalidPosition {
                id: raw.to_string(),
                position: position_segment.to_string(),
            })?;

        Ok(Self {
            raw: raw.to_string(),
            chromosome: chromosome.to_string(),
            position,
        })
    }

    /// Identifier exactly as stored in the model database
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Chromosome label with any "chr" marker removed
    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    pub fn position(&self) -> u64 {
        self.position
    }
}

impl FromStr for VariantId {
    type Err = VariantIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VariantId {
    type Error = VariantIdError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<VariantId> for String {
    fn from(id: VariantId) -> Self {
        id.raw
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
