// ==============================================================================
// config.rs - Immutable Pipeline Configuration
// ==============================================================================
// Description: Credentials, service endpoints and output locations, built once
//              at startup and shared read-only by every component
// Created: 2025-11-20
// Modified: 2025-12-02
// Version: 1.1.0
// Security: Password held in zeroizing storage and redacted from Debug output
// ==============================================================================

use chrono::NaiveDate;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use zeroize::Zeroizing;

pub const DEFAULT_PHENOTIPS_URL: &str = "https://genomeclinic.ccm.sickkids.ca";
pub const DEFAULT_ENSEMBL_URL: &str = "https://rest.ensembl.org";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Credentials file has no data rows")]
    Empty,

    #[error("Credentials file has an empty {0}")]
    BlankField(&'static str),
}

/// PhenoTips basic-auth credentials
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: Zeroizing<String>,
}

#[derive(Deserialize)]
struct CredentialsRow {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    /// Load the first row of a `username,password` CSV file
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self, CredentialsError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path.as_ref())?;

        let row: CredentialsRow = reader
            .deserialize()
            .next()
            .ok_or(CredentialsError::Empty)??;

        if row.username.is_empty() {
            return Err(CredentialsError::BlankField("username"));
        }
        if row.password.is_empty() {
            return Err(CredentialsError::BlankField("password"));
        }

        Ok(Self::new(row.username, row.password))
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Remote service endpoints
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// PhenoTips base URL, without trailing slash
    pub phenotips: String,
    /// Ensembl REST base URL, without trailing slash
    pub ensembl: String,
    pub timeout: Duration,
}

impl Endpoints {
    pub fn new(phenotips: &str, ensembl: &str, timeout: Duration) -> Self {
        Self {
            phenotips: phenotips.trim_end_matches('/').to_string(),
            ensembl: ensembl.trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(
            DEFAULT_PHENOTIPS_URL,
            DEFAULT_ENSEMBL_URL,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }
}

/// Where per-family output files land
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub pedigree_dir: PathBuf,
    pub hpo_dir: PathBuf,
    /// Date stamped into gene-table file names, fixed for the whole run
    pub run_date: NaiveDate,
}

impl OutputLayout {
    pub fn pedigree_path(&self, family: &str) -> PathBuf {
        self.pedigree_dir.join(format!("{}_pedigree.ped", family))
    }

    pub fn gene_table_path(&self, family: &str) -> PathBuf {
        self.hpo_dir.join(format!(
            "{}_HPO_{}.txt",
            family,
            self.run_date.format("%Y-%m-%d")
        ))
    }
}

/// Everything a run needs, constructed once in `main`
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub credentials: Credentials,
    pub endpoints: Endpoints,
    pub output: OutputLayout,
}
