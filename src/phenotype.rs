// ==============================================================================
// phenotype.rs - Phenotype Term Collection and Gene Aggregation
// ==============================================================================
// Description: Pulls the proband's HPO terms from the suggested-gene-panel
//              endpoint and maps them to candidate genes via the static
//              term-to-gene table
// Created: 2025-11-21
// Modified: 2025-12-02
// Version: 1.1.0
// ==============================================================================

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

use crate::client::PhenotipsApi;
use crate::error::Result;
use crate::models::PhenotypeTerm;
use crate::parsers::TermGeneTable;

/// Suggested-gene-panel response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenePanel {
    #[serde(default)]
    pub rows: Vec<GenePanelRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenePanelRow {
    #[serde(default)]
    pub gene_symbol: Option<String>,
    #[serde(default)]
    pub gene_id: Option<String>,
    #[serde(default)]
    pub terms: Vec<PanelTerm>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PanelTerm {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub name_translated: Option<String>,
}

/// Unique phenotype terms across all panel rows, in first-seen order
pub fn unique_terms(panel: &GenePanel) -> Vec<PhenotypeTerm> {
    let mut seen = HashSet::new();
    panel
        .rows
        .iter()
        .flat_map(|row| row.terms.iter())
        .filter(|term| !term.id.is_empty() && seen.insert(term.id.as_str()))
        .map(|term| PhenotypeTerm {
            id: term.id.clone(),
            name: term
                .name_translated
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| term.name.clone()),
        })
        .collect()
}

/// Retrieves the proband's phenotype terms
pub struct PhenotypeTermCollector<'a, A: PhenotipsApi + ?Sized> {
    api: &'a A,
}

impl<'a, A: PhenotipsApi + ?Sized> PhenotypeTermCollector<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// An empty result is not an error; the caller reports it as a warning.
    pub fn collect(&self, patient_id: &str) -> Result<Vec<PhenotypeTerm>> {
        let panel = self.api.suggested_gene_panel(patient_id)?;
        let terms = unique_terms(&panel);

        if terms.is_empty() {
            warn!("Participant {} has no HPO terms", patient_id);
        } else {
            info!(
                "Participant {} has {} HPO terms across {} panel genes",
                patient_id,
                terms.len(),
                panel.rows.len()
            );
        }
        Ok(terms)
    }
}

/// Term ids and names grouped under one gene symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedGene {
    pub gene_symbol: String,
    pub term_ids: Vec<String>,
    pub term_names: Vec<String>,
}

/// Maps phenotype terms to candidate genes
pub struct GeneCandidateAggregator<'t> {
    table: &'t TermGeneTable,
}

impl<'t> GeneCandidateAggregator<'t> {
    pub fn new(table: &'t TermGeneTable) -> Self {
        Self { table }
    }

    /// One entry per gene symbol (sorted by symbol), with the terms linked
    /// to it in table order
    pub fn aggregate(&self, terms: &[PhenotypeTerm]) -> Vec<AggregatedGene> {
        let wanted: HashSet<&str> = terms.iter().map(|t| t.id.as_str()).collect();
        let mut genes: BTreeMap<&str, AggregatedGene> = BTreeMap::new();

        for row in self.table.rows() {
            if !wanted.contains(row.term_id.as_str()) {
                continue;
            }
            let gene = genes
                .entry(row.gene_symbol.as_str())
                .or_insert_with(|| AggregatedGene {
                    gene_symbol: row.gene_symbol.clone(),
                    term_ids: Vec::new(),
                    term_names: Vec::new(),
                });
            gene.term_ids.push(row.term_id.clone());
            gene.term_names.push(row.term_name.clone());
        }

        debug!(
            "{} phenotype terms map to {} candidate genes",
            wanted.len(),
            genes.len()
        );
        genes.into_values().collect()
    }
}
