// ==============================================================================
// models.rs - Pedigree and Candidate Gene Data Models
// ==============================================================================
// Description: Data structures shared by the pedigree and gene-table pipelines
// Created: 2025-11-20
// Modified: 2025-12-02
// Version: 1.1.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PipelineError, Result};

/// Biological sex as recorded in PhenoTips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    Unknown,
}

impl Sex {
    /// Interpret a PhenoTips sex value. Absent or blank values return `None`
    /// so the caller can fall back to the patient record.
    pub fn from_phenotips(value: Option<&str>) -> Option<Self> {
        match value.map(str::trim) {
            None | Some("") => None,
            Some("M") => Some(Sex::Male),
            Some("F") => Some(Sex::Female),
            Some(_) => Some(Sex::Unknown),
        }
    }

    /// PED sex column. `other` for unknown is what the downstream
    /// long-read pipeline expects, not the usual `0`.
    pub fn ped_code(&self) -> &'static str {
        match self {
            Sex::Male => "1",
            Sex::Female => "2",
            Sex::Unknown => "other",
        }
    }
}

/// Affection status from the pedigree carrier status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AffectedStatus {
    Affected,
    Unaffected,
    Unknown,
}

impl AffectedStatus {
    pub fn from_carrier_status(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some("uncertain") => AffectedStatus::Unknown,
            Some("affected") => AffectedStatus::Affected,
            Some(_) => AffectedStatus::Unaffected,
        }
    }

    pub fn ped_code(&self) -> &'static str {
        match self {
            AffectedStatus::Affected => "2",
            AffectedStatus::Unaffected | AffectedStatus::Unknown => "0",
        }
    }
}

/// One family member resolved from the pedigree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    /// Clinical sample identifier (e.g., "FAM01.03")
    pub external_id: String,

    /// PhenoTips patient identifier (e.g., "P0001234")
    pub patient_id: String,

    /// Node id in the pedigree drawing
    pub node_id: i64,

    pub sex: Sex,

    pub affected: AffectedStatus,

    /// Parent node ids from the relationship edge (0-2)
    pub parent_node_ids: Vec<i64>,

    /// Parents that carry an external identifier. Always a subset of the
    /// members of the same pedigree.
    pub parent_external_ids: Vec<String>,
}

/// Phenotype term attached to the proband
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhenotypeTerm {
    /// HPO identifier (e.g., "HP:0001250")
    pub id: String,
    pub name: String,
}

/// One row of the final candidate-gene table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateGene {
    pub gene_symbol: String,

    /// Stable (Ensembl) gene identifier, `None` when unresolved
    pub gene_id: Option<String>,

    /// Number of distinct HPO terms linked to this gene
    pub occurrence_count: usize,

    pub term_ids: Vec<String>,

    /// Term names, parallel to `term_ids`
    pub features: Vec<String>,
}

/// Clinical sample identifier of the form `FAMILY.NN`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SampleId(String);

impl SampleId {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('.') {
            return Err(PipelineError::InvalidSampleId(raw.to_string()));
        }
        Ok(SampleId(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Family key used in output file names: the part before the first
    /// period with underscores removed ("FAM_01.03" -> "FAM01").
    pub fn family(&self) -> String {
        let prefix = self.0.split('.').next().unwrap_or(&self.0);
        prefix.replace('_', "")
    }

    /// Probands carry the `.03` member suffix.
    pub fn is_proband(&self) -> bool {
        self.0.split('.').nth(1) == Some("03")
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Convert a clinical identifier to the form used by the long-read pipeline:
/// strip underscores, then turn periods into underscores.
///
/// Idempotent over identifiers without periods; an identifier that has been
/// normalized once must not be normalized again.
pub fn normalize_id(id: &str) -> String {
    id.replace('_', "").replace('.', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sex_from_phenotips() {
        assert_eq!(Sex::from_phenotips(Some("M")), Some(Sex::Male));
        assert_eq!(Sex::from_phenotips(Some("F")), Some(Sex::Female));
        assert_eq!(Sex::from_phenotips(Some("U")), Some(Sex::Unknown));
        assert_eq!(Sex::from_phenotips(Some("")), None);
        assert_eq!(Sex::from_phenotips(None), None);
    }

    #[test]
    fn test_ped_codes() {
        assert_eq!(Sex::Male.ped_code(), "1");
        assert_eq!(Sex::Female.ped_code(), "2");
        assert_eq!(Sex::Unknown.ped_code(), "other");
        assert_eq!(AffectedStatus::Affected.ped_code(), "2");
        assert_eq!(AffectedStatus::Unaffected.ped_code(), "0");
        assert_eq!(AffectedStatus::Unknown.ped_code(), "0");
    }

    #[test]
    fn test_affected_from_carrier_status() {
        assert_eq!(
            AffectedStatus::from_carrier_status(Some("affected")),
            AffectedStatus::Affected
        );
        assert_eq!(
            AffectedStatus::from_carrier_status(Some("carrier")),
            AffectedStatus::Unaffected
        );
        assert_eq!(
            AffectedStatus::from_carrier_status(None),
            AffectedStatus::Unknown
        );
    }

    #[test]
    fn test_sample_id_family_and_proband() {
        let id = SampleId::parse("FAM01.03").unwrap();
        assert_eq!(id.family(), "FAM01");
        assert!(id.is_proband());

        let id = SampleId::parse("DEC_012.01").unwrap();
        assert_eq!(id.family(), "DEC012");
        assert!(!id.is_proband());

        assert!(!SampleId::parse("FAM01.030").unwrap().is_proband());
        assert!(SampleId::parse("   ").is_err());
    }

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id("DEC_012.03"), "DEC012_03");
        assert_eq!(normalize_id("FAM01"), "FAM01");
    }

    #[test]
    fn test_normalize_id_idempotent_without_periods() {
        for id in ["FAM0103", "DEC_012", "P0001234"] {
            let once = normalize_id(id);
            assert_eq!(normalize_id(&once), once);
        }
    }
}
