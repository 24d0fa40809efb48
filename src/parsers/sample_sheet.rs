// ==============================================================================
// sample_sheet.rs - Sample Sheet Parser
// ==============================================================================
// Description: Reads clinical sample identifiers from a tab-separated sheet
// Created: 2025-11-21
// Modified: 2025-11-21
// Version: 1.0.0
// ==============================================================================
// Format: Tab-delimited with header; only the identifier column is used
// Example:
//   Decoder_ID    Sex    Relationship
//   DEC_001.01    M      Father
//   DEC_001.03    F      Proband
// ==============================================================================

use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::SampleId;

pub const DEFAULT_SAMPLE_COLUMN: &str = "Decoder_ID";

#[derive(Error, Debug)]
pub enum SampleSheetError {
    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Sample sheet has no '{0}' column")]
    MissingColumn(String),
}

/// Sample sheet reader
pub struct SampleSheet {
    column: String,
}

impl Default for SampleSheet {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_COLUMN)
    }
}

impl SampleSheet {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }

    /// All sample ids in sheet order. Blank or malformed cells are skipped.
    pub fn read(&self, path: impl AsRef<Path>) -> Result<Vec<SampleId>, SampleSheetError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_path(path.as_ref())?;

        let column = reader
            .headers()?
            .iter()
            .position(|h| h.trim() == self.column)
            .ok_or_else(|| SampleSheetError::MissingColumn(self.column.clone()))?;

        let mut samples = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let record = result?;
            let cell = record.get(column).unwrap_or("");
            if cell.trim().is_empty() {
                continue;
            }
            match SampleId::parse(cell) {
                Ok(id) => samples.push(id),
                Err(e) => warn!("Skipping sample sheet row {}: {}", row + 2, e),
            }
        }

        debug!("Read {} sample ids from sample sheet", samples.len());
        Ok(samples)
    }

    /// Proband ids only, in sheet order
    pub fn probands(&self, path: impl AsRef<Path>) -> Result<Vec<SampleId>, SampleSheetError> {
        Ok(self
            .read(path)?
            .into_iter()
            .filter(SampleId::is_proband)
            .collect())
    }
}
