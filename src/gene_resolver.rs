// ==============================================================================
// gene_resolver.rs - Stable Gene Identifier Resolution
// ==============================================================================
// Description: Attaches Ensembl gene identifiers to aggregated candidate
//              genes using the local cross-reference plus at most two batched
//              remote lookups, then deduplicates and recounts
// Created: 2025-11-22
// Modified: 2025-12-04
// Version: 1.2.0
// ==============================================================================
// Steps:
//   1. Left-join genes against the symbol -> identifier cross-reference
//   2. One remote lookup for symbols the cross-reference lacks
//   3. One remote lookup for symbols the cross-reference maps to several
//      identifiers; the remote answer replaces every row for those symbols
//   4. Drop exact duplicate rows
//   5. occurrence_count = distinct term ids per gene
// A failed lookup leaves the affected genes without an identifier.
// ==============================================================================

use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::client::SymbolLookup;
use crate::error::PipelineWarning;
use crate::models::CandidateGene;
use crate::parsers::GeneXrefTable;
use crate::phenotype::AggregatedGene;

/// Resolution result for one proband
#[derive(Debug, Clone, Default)]
pub struct ResolvedGenes {
    pub genes: Vec<CandidateGene>,
    pub warnings: Vec<PipelineWarning>,
    /// Remote batch calls issued (never more than two)
    pub remote_calls: usize,
}

pub struct GeneIdentifierResolver<'a, L: SymbolLookup + ?Sized> {
    xref: &'a GeneXrefTable,
    lookup: &'a L,
}

impl<'a, L: SymbolLookup + ?Sized> GeneIdentifierResolver<'a, L> {
    pub fn new(xref: &'a GeneXrefTable, lookup: &'a L) -> Self {
        Self { xref, lookup }
    }

    pub fn resolve(&self, genes: Vec<AggregatedGene>) -> ResolvedGenes {
        let mut remote_calls = 0;

        // 1. Left join; an ambiguous symbol yields one row per identifier
        let mut rows: Vec<CandidateGene> = Vec::with_capacity(genes.len());
        for gene in genes {
            let ids = self.xref.ids(&gene.gene_symbol);
            let candidate = CandidateGene {
                gene_symbol: gene.gene_symbol,
                gene_id: None,
                occurrence_count: 0,
                term_ids: gene.term_ids,
                features: gene.term_names,
            };
            if ids.is_empty() {
                rows.push(candidate);
            } else {
                for id in ids {
                    rows.push(CandidateGene {
                        gene_id: Some(id.clone()),
                        ..candidate.clone()
                    });
                }
            }
        }

        // 2. Symbols missing from the cross-reference
        let unresolved = distinct_symbols(rows.iter().filter(|r| r.gene_id.is_none()));
        if !unresolved.is_empty() {
            remote_calls += 1;
            let found = self.remote_lookup(&unresolved, "unresolved");
            for row in rows.iter_mut().filter(|r| r.gene_id.is_none()) {
                row.gene_id = found.get(&row.gene_symbol).cloned();
            }
        }

        // 3. Symbols with conflicting identifiers; remote result wins
        let ambiguous =
            distinct_symbols(rows.iter().filter(|r| self.xref.is_ambiguous(&r.gene_symbol)));
        if !ambiguous.is_empty() {
            remote_calls += 1;
            let found = self.remote_lookup(&ambiguous, "ambiguous");
            for row in rows
                .iter_mut()
                .filter(|r| self.xref.is_ambiguous(&r.gene_symbol))
            {
                row.gene_id = found.get(&row.gene_symbol).cloned();
            }
        }

        // 4. Exact duplicates
        let before = rows.len();
        let mut seen = HashSet::new();
        rows.retain(|r| {
            seen.insert((
                r.gene_symbol.clone(),
                r.term_ids.clone(),
                r.features.clone(),
                r.gene_id.clone(),
            ))
        });
        if rows.len() < before {
            debug!("Dropped {} duplicate gene rows", before - rows.len());
        }

        // 5. Recount
        for row in &mut rows {
            row.occurrence_count = row.term_ids.iter().collect::<HashSet<_>>().len();
        }

        let warnings: Vec<PipelineWarning> = rows
            .iter()
            .filter(|r| r.gene_id.is_none())
            .map(|r| {
                warn!(gene = %r.gene_symbol, "No stable gene identifier found");
                PipelineWarning::SymbolResolutionGap {
                    symbol: r.gene_symbol.clone(),
                }
            })
            .collect();

        info!(
            "Resolved {} candidate genes ({} without identifier, {} remote lookups)",
            rows.len(),
            warnings.len(),
            remote_calls
        );

        ResolvedGenes {
            genes: rows,
            warnings,
            remote_calls,
        }
    }

    /// Batched remote lookup; failures degrade to "nothing found"
    fn remote_lookup(&self, symbols: &[String], reason: &str) -> HashMap<String, String> {
        debug!("Looking up {} {} symbols remotely: {:?}", symbols.len(), reason, symbols);
        match self.lookup.lookup_symbols(symbols) {
            Ok(found) => found,
            Err(e) => {
                warn!(
                    "Remote lookup of {} {} symbols failed, leaving them unresolved: {}",
                    symbols.len(),
                    reason,
                    e
                );
                HashMap::new()
            }
        }
    }
}

/// Symbols in first-seen order without repeats
fn distinct_symbols<'r>(rows: impl Iterator<Item = &'r CandidateGene>) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.filter(|r| seen.insert(r.gene_symbol.as_str()))
        .map(|r| r.gene_symbol.clone())
        .collect()
}
