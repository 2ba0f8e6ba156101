// ==============================================================================
// parsers/mod.rs - Input parser modules
// ==============================================================================
// Description: Parsers for variant identifiers and auxiliary input lists
// Author: Matt Barham
// Created: 2025-11-03
// Modified: 2026-10-13
// Version: 2.0.0
// ==============================================================================

pub mod variant_id;
pub mod individuals;

pub use variant_id::{VariantId, VariantIdError};
pub use individuals::{load_individuals, IndividualListError};
