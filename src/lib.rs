// ==============================================================================
// lib.rs - Gene Covariance Library
// ==============================================================================
// Description: Library interface for per-gene variant covariance modules
// Author: Matt Barham
// Created: 2025-11-03
// Modified: 2026-10-16
// Version: 2.0.0
// ==============================================================================

pub mod parsers;
pub mod models;
pub mod genotype_registry;
pub mod gene_model;
pub mod covariance;
pub mod output;
pub mod processor;
