// ==============================================================================
// client.rs - Remote Service Clients
// ==============================================================================
// Description: Blocking clients for the PhenoTips REST interface and the
//              Ensembl batch symbol lookup, behind traits so the pipeline can
//              be driven against in-memory fakes
// Created: 2025-11-20
// Modified: 2025-12-02
// Version: 1.1.0
// ==============================================================================
// No retries: a failed or timed-out call surfaces as UpstreamLookup and is
// handled by the per-sample isolation in the processor.
// ==============================================================================

use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use crate::config::{Credentials, Endpoints};
use crate::error::{PipelineError, Result};
use crate::pedigree::FamilyInfo;
use crate::phenotype::GenePanel;

const PATIENT_LOOKUP: &str = "patient lookup";
const FAMILY_INFO: &str = "family info";
const PATIENT_RECORD: &str = "patient record";
const GENE_PANEL: &str = "suggested gene panel";
const SYMBOL_LOOKUP: &str = "Ensembl symbol lookup";

/// Calls made against the phenotype database
pub trait PhenotipsApi {
    /// Resolve a clinical sample id to the internal patient id
    fn patient_id(&self, external_id: &str) -> Result<String>;

    fn family_info(&self, patient_id: &str) -> Result<FamilyInfo>;

    /// Sex recorded on the patient record itself, if any
    fn patient_sex(&self, patient_id: &str) -> Result<Option<String>>;

    fn suggested_gene_panel(&self, patient_id: &str) -> Result<GenePanel>;
}

/// Batched gene symbol to stable identifier lookup.
///
/// Symbols missing from the returned map are unresolved.
pub trait SymbolLookup {
    fn lookup_symbols(&self, symbols: &[String]) -> Result<HashMap<String, String>>;
}

#[derive(Deserialize)]
struct PatientRef {
    id: Option<String>,
}

#[derive(Deserialize)]
struct PatientRecord {
    sex: Option<String>,
}

fn build_http(endpoints: &Endpoints) -> Result<Client> {
    Client::builder()
        .timeout(endpoints.timeout)
        .build()
        .map_err(|e| PipelineError::upstream("HTTP client setup", e))
}

/// Send a request and decode its JSON body. Transport errors, timeouts,
/// non-success statuses and malformed bodies all become `UpstreamLookup`.
fn send_json<T: DeserializeOwned>(service: &'static str, request: RequestBuilder) -> Result<T> {
    let response = request
        .send()
        .map_err(|e| PipelineError::upstream(service, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::upstream(service, format!("status {}", status)));
    }

    let body = response
        .text()
        .map_err(|e| PipelineError::upstream(service, e))?;

    serde_json::from_str(&body)
        .map_err(|e| PipelineError::upstream(service, format!("malformed response: {}", e)))
}

/// PhenoTips REST client using HTTP basic auth
pub struct PhenotipsClient {
    http: Client,
    base_url: String,
    credentials: Credentials,
}

impl PhenotipsClient {
    pub fn new(endpoints: &Endpoints, credentials: &Credentials) -> Result<Self> {
        Ok(Self {
            http: build_http(endpoints)?,
            base_url: endpoints.phenotips.clone(),
            credentials: credentials.clone(),
        })
    }

    fn get(&self, url: &str) -> RequestBuilder {
        self.http
            .get(url)
            .basic_auth(&self.credentials.username, Some(self.credentials.password()))
    }
}

impl PhenotipsApi for PhenotipsClient {
    fn patient_id(&self, external_id: &str) -> Result<String> {
        let url = format!("{}/rest/patients/eid/{}", self.base_url, external_id);
        debug!("Querying PhenoTips for external id {}", external_id);

        let patient: PatientRef = send_json(PATIENT_LOOKUP, self.get(&url))?;
        patient
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PipelineError::upstream(PATIENT_LOOKUP, format!("no patient id for {}", external_id)))
    }

    fn family_info(&self, patient_id: &str) -> Result<FamilyInfo> {
        let url = format!("{}/get/PhenoTips/FamilyPedigreeInterface", self.base_url);
        debug!("Requesting family info for {}", patient_id);

        let request = self
            .get(&url)
            .query(&[("action", "familyinfo"), ("document_id", patient_id)]);
        send_json(FAMILY_INFO, request)
    }

    fn patient_sex(&self, patient_id: &str) -> Result<Option<String>> {
        let url = format!("{}/rest/patients/{}", self.base_url, patient_id);
        debug!("Querying PhenoTips patient record for {}", patient_id);

        let record: PatientRecord = send_json(PATIENT_RECORD, self.get(&url))?;
        Ok(record.sex)
    }

    fn suggested_gene_panel(&self, patient_id: &str) -> Result<GenePanel> {
        let url = format!(
            "{}/rest/patients/{}/suggested-gene-panels",
            self.base_url, patient_id
        );
        debug!("Requesting suggested gene panel for {}", patient_id);

        send_json(GENE_PANEL, self.get(&url))
    }
}

#[derive(Deserialize)]
struct EnsemblGene {
    id: String,
}

/// Ensembl REST `lookup/symbol` client (one POST per batch)
pub struct EnsemblClient {
    http: Client,
    base_url: String,
    species: String,
}

impl EnsemblClient {
    pub fn new(endpoints: &Endpoints) -> Result<Self> {
        Ok(Self {
            http: build_http(endpoints)?,
            base_url: endpoints.ensembl.clone(),
            species: "homo_sapiens".to_string(),
        })
    }
}

impl SymbolLookup for EnsemblClient {
    fn lookup_symbols(&self, symbols: &[String]) -> Result<HashMap<String, String>> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }

        let url = format!("{}/lookup/symbol/{}", self.base_url, self.species);
        debug!("Looking up {} gene symbols at Ensembl", symbols.len());

        let request = self
            .http
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&serde_json::json!({ "symbols": symbols }));

        let genes: HashMap<String, Option<EnsemblGene>> = send_json(SYMBOL_LOOKUP, request)?;
        Ok(genes
            .into_iter()
            .filter_map(|(symbol, gene)| gene.map(|g| (symbol, g.id)))
            .collect())
    }
}
