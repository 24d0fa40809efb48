// ==============================================================================
// error.rs - Pipeline Error and Warning Types
// ==============================================================================
// Description: Sample-scoped failures and non-fatal warnings raised while
//              resolving pedigrees and candidate-gene tables
// Created: 2025-11-20
// Modified: 2025-12-02
// Version: 1.1.0
// ==============================================================================

use std::fmt;
use thiserror::Error;

/// Failures that abort processing of a single sample.
///
/// None of these abort a batch: the driver logs the sample id and moves on.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{service} request failed: {reason}")]
    UpstreamLookup { service: &'static str, reason: String },

    #[error("Proband node {node:?} has no external identifier in the pedigree")]
    MissingProbandIdentifier { node: Option<i64> },

    #[error("No sex recorded for patient {patient_id} (pedigree and patient record both empty)")]
    MissingSexData { patient_id: String },

    #[error("Family member {external_id} ({patient_id}) has no node in the pedigree")]
    UnmatchedFamilyMember { external_id: String, patient_id: String },

    #[error("Invalid sample identifier: {0}")]
    InvalidSampleId(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn upstream(service: &'static str, reason: impl fmt::Display) -> Self {
        PipelineError::UpstreamLookup {
            service,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Conditions worth reporting that still let the sample complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineWarning {
    /// Proband has no phenotype terms; the gene table is header-only.
    EmptyPhenotypeSet { patient_id: String },
    /// No stable identifier could be found for a gene symbol.
    SymbolResolutionGap { symbol: String },
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineWarning::EmptyPhenotypeSet { patient_id } => {
                write!(f, "participant {} has no HPO terms", patient_id)
            }
            PipelineWarning::SymbolResolutionGap { symbol } => {
                write!(f, "no stable gene identifier for {}", symbol)
            }
        }
    }
}
