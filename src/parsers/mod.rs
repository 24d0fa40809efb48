// ==============================================================================
// parsers/mod.rs - File parser modules
// ==============================================================================
// Description: Parsers for sample sheets, reference tables and archive listings
// Created: 2025-11-21
// Modified: 2025-11-24
// Version: 1.1.0
// ==============================================================================

pub mod irods;
pub mod reference;
pub mod sample_sheet;

pub use irods::{ArchiveManifest, IrodsListingParser, KeyedPaths, ListingMode};
pub use reference::{GeneXrefTable, ReferenceTableError, TermGeneRow, TermGeneTable};
pub use sample_sheet::{SampleSheet, SampleSheetError, DEFAULT_SAMPLE_COLUMN};
