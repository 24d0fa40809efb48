// ==============================================================================
// lib.rs - HPO Pedigree Extraction Library
// ==============================================================================
// Description: Library interface for pedigree and candidate-gene extraction
// Created: 2025-11-20
// Modified: 2025-12-04
// Version: 1.2.0
// ==============================================================================

pub mod client;
pub mod config;
pub mod error;
pub mod gene_resolver;
pub mod models;
pub mod output;
pub mod parsers;
pub mod pedigree;
pub mod phenotype;
pub mod processor;
