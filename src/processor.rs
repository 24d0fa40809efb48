// ==============================================================================
// processor.rs - Per-Sample Extraction Pipeline
// ==============================================================================
// Description: Drives one sample from clinical identifier to pedigree file and
//              candidate-gene table, and runs batches with per-sample isolation
// Created: 2025-11-22
// Modified: 2025-12-04
// Version: 1.2.0
// ==============================================================================
// Flow per sample:
//   1. Resolve sample id -> PhenoTips patient id
//   2. Fetch family info, resolve pedigree and proband
//   3. Resolve proband id -> PhenoTips patient id
//   4. Collect proband HPO terms, aggregate candidate genes
//   5. Resolve stable gene identifiers
//   6. Write pedigree and gene table (only once everything above succeeded)
// ==============================================================================

use std::fs;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::client::{PhenotipsApi, SymbolLookup};
use crate::config::OutputLayout;
use crate::error::{PipelineWarning, Result};
use crate::gene_resolver::GeneIdentifierResolver;
use crate::models::SampleId;
use crate::output;
use crate::parsers::{GeneXrefTable, TermGeneTable};
use crate::pedigree::PedigreeGraphBuilder;
use crate::phenotype::{GeneCandidateAggregator, PhenotypeTermCollector};

/// Static reference data loaded once per run
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub term_genes: TermGeneTable,
    pub xref: GeneXrefTable,
}

/// What a successfully processed sample produced
#[derive(Debug, Clone)]
pub struct SampleOutcome {
    pub sample: SampleId,
    pub family: String,
    /// External id of the proband found in the pedigree
    pub proband_id: String,
    pub members: usize,
    pub genes: usize,
    pub pedigree_path: PathBuf,
    pub gene_table_path: PathBuf,
    pub warnings: Vec<PipelineWarning>,
}

/// Result of a batch run
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub succeeded: Vec<SampleOutcome>,
    pub failed: Vec<(SampleId, String)>,
}

impl BatchSummary {
    pub fn processed(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn warning_count(&self) -> usize {
        self.succeeded.iter().map(|o| o.warnings.len()).sum()
    }
}

pub struct SampleProcessor<'a, A, L>
where
    A: PhenotipsApi + ?Sized,
    L: SymbolLookup + ?Sized,
{
    api: &'a A,
    lookup: &'a L,
    reference: &'a ReferenceData,
    output: &'a OutputLayout,
}

impl<'a, A, L> SampleProcessor<'a, A, L>
where
    A: PhenotipsApi + ?Sized,
    L: SymbolLookup + ?Sized,
{
    pub fn new(
        api: &'a A,
        lookup: &'a L,
        reference: &'a ReferenceData,
        output: &'a OutputLayout,
    ) -> Self {
        Self {
            api,
            lookup,
            reference,
            output,
        }
    }

    /// Clinical sample id -> PhenoTips patient id
    fn resolve_patient(&self, external_id: &str) -> Result<String> {
        let patient_id = self.api.patient_id(external_id)?;
        info!("Sample {} is PhenoTips patient {}", external_id, patient_id);
        Ok(patient_id)
    }

    pub fn process_sample(&self, sample: &SampleId) -> Result<SampleOutcome> {
        let family = sample.family();
        info!("Processing sample {} (family {})", sample, family);

        let patient_id = self.resolve_patient(sample.as_str())?;
        let family_info = self.api.family_info(&patient_id)?;
        let pedigree = PedigreeGraphBuilder::new(self.api).build(&family_info)?;

        let proband_patient = self.resolve_patient(pedigree.proband_id())?;
        let terms = PhenotypeTermCollector::new(self.api).collect(&proband_patient)?;

        let mut warnings = Vec::new();
        if terms.is_empty() {
            warnings.push(PipelineWarning::EmptyPhenotypeSet {
                patient_id: proband_patient.clone(),
            });
        }

        let aggregated = GeneCandidateAggregator::new(&self.reference.term_genes).aggregate(&terms);
        let resolved = GeneIdentifierResolver::new(&self.reference.xref, self.lookup).resolve(aggregated);
        warnings.extend(resolved.warnings);

        let pedigree_path = self.output.pedigree_path(&family);
        let gene_table_path = self.output.gene_table_path(&family);

        output::write_pedigree(&pedigree, &family, &pedigree_path)?;
        if let Err(e) = output::write_gene_table(&resolved.genes, &gene_table_path) {
            // Keep the pair consistent: no pedigree without its gene table
            if let Err(cleanup) = fs::remove_file(&pedigree_path) {
                warn!("Could not remove {:?} after failed write: {}", pedigree_path, cleanup);
            }
            return Err(e);
        }

        Ok(SampleOutcome {
            sample: sample.clone(),
            family,
            proband_id: pedigree.proband_id().to_string(),
            members: pedigree.len(),
            genes: resolved.genes.len(),
            pedigree_path,
            gene_table_path,
            warnings,
        })
    }

    /// Process samples strictly in order; a failed sample is logged and skipped
    pub fn process_batch(&self, samples: &[SampleId]) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for sample in samples {
            match self.process_sample(sample) {
                Ok(outcome) => {
                    for warning in &outcome.warnings {
                        warn!(sample = %sample, "{}", warning);
                    }
                    summary.succeeded.push(outcome);
                }
                Err(e) => {
                    error!(sample = %sample, "Did not retrieve HPO and pedigree information: {}", e);
                    summary.failed.push((sample.clone(), e.to_string()));
                }
            }
        }

        info!(
            "Batch complete: {} processed, {} succeeded, {} failed, {} warnings",
            summary.processed(),
            summary.succeeded.len(),
            summary.failed.len(),
            summary.warning_count()
        );
        if !summary.failed.is_empty() {
            let ids: Vec<&str> = summary.failed.iter().map(|(id, _)| id.as_str()).collect();
            info!("Failed samples: {}", ids.join(", "));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::parsers::TermGeneRow;
    use crate::pedigree::tests::trio_payload;
    use crate::pedigree::FamilyInfo;
    use crate::phenotype::GenePanel;
    use chrono::NaiveDate;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// In-memory PhenoTips
    #[derive(Default)]
    struct FakePhenotips {
        patients: HashMap<String, String>,
        families: HashMap<String, Value>,
        panels: HashMap<String, Value>,
    }

    impl FakePhenotips {
        /// Trio FAM_01 with the given panel for the proband
        fn trio(panel: Value) -> Self {
            let mut fake = Self::default();
            for (eid, pid) in [
                ("FAM_01.01", "P0000101"),
                ("FAM_01.02", "P0000102"),
                ("FAM_01.03", "P0000103"),
            ] {
                fake.patients.insert(eid.to_string(), pid.to_string());
                fake.families.insert(pid.to_string(), trio_payload());
            }
            fake.panels.insert("P0000103".to_string(), panel);
            fake
        }
    }

    impl PhenotipsApi for FakePhenotips {
        fn patient_id(&self, external_id: &str) -> Result<String> {
            self.patients
                .get(external_id)
                .cloned()
                .ok_or_else(|| PipelineError::upstream("patient lookup", "status 404 Not Found"))
        }

        fn family_info(&self, patient_id: &str) -> Result<FamilyInfo> {
            let payload = self
                .families
                .get(patient_id)
                .ok_or_else(|| PipelineError::upstream("family info", "status 404 Not Found"))?;
            serde_json::from_value(payload.clone())
                .map_err(|e| PipelineError::upstream("family info", format!("malformed response: {}", e)))
        }

        fn patient_sex(&self, _patient_id: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn suggested_gene_panel(&self, patient_id: &str) -> Result<GenePanel> {
            let payload = self
                .panels
                .get(patient_id)
                .ok_or_else(|| PipelineError::upstream("suggested gene panel", "status 404 Not Found"))?;
            Ok(serde_json::from_value(payload.clone())?)
        }
    }

    struct FakeLookup {
        known: HashMap<String, String>,
        fail: bool,
        calls: RefCell<usize>,
    }

    impl FakeLookup {
        fn new(known: &[(&str, &str)]) -> Self {
            Self {
                known: known
                    .iter()
                    .map(|(s, id)| (s.to_string(), id.to_string()))
                    .collect(),
                fail: false,
                calls: RefCell::new(0),
            }
        }
    }

    impl SymbolLookup for FakeLookup {
        fn lookup_symbols(&self, symbols: &[String]) -> Result<HashMap<String, String>> {
            *self.calls.borrow_mut() += 1;
            if self.fail {
                return Err(PipelineError::upstream("Ensembl symbol lookup", "connection reset"));
            }
            Ok(symbols
                .iter()
                .filter_map(|s| self.known.get(s).map(|id| (s.clone(), id.clone())))
                .collect())
        }
    }

    fn reference() -> ReferenceData {
        let row = |term: &str, name: &str, gene: &str| TermGeneRow {
            term_id: term.to_string(),
            term_name: name.to_string(),
            gene_symbol: gene.to_string(),
        };
        ReferenceData {
            term_genes: TermGeneTable::from_rows(vec![
                row("HP:0001250", "Seizure", "SCN1A"),
                row("HP:0001250", "Seizure", "ABC1"),
                row("HP:0001263", "Global developmental delay", "ABC1"),
                row("HP:0001263", "Global developmental delay", "NOVEL1"),
            ]),
            xref: GeneXrefTable::from_pairs([
                ("SCN1A", "ENSG00000144285"),
                ("ABC1", "ENSG00000000001"),
                ("ABC1", "ENSG00000000002"),
            ]),
        }
    }

    fn panel_with_terms() -> Value {
        json!({
            "rows": [
                { "gene_symbol": "SCN1A", "gene_id": "ENSG00000144285", "count": 1,
                  "terms": [ { "id": "HP:0001250", "name": "Seizure", "name_translated": "Seizure" } ] },
                { "gene_symbol": "ABC1", "count": 2,
                  "terms": [
                      { "id": "HP:0001250", "name": "Seizure" },
                      { "id": "HP:0001263", "name": "Global developmental delay" }
                  ] }
            ]
        })
    }

    fn layout(dir: &TempDir) -> OutputLayout {
        OutputLayout {
            pedigree_dir: dir.path().join("pedigrees"),
            hpo_dir: dir.path().join("HPO"),
            run_date: NaiveDate::from_ymd_opt(2025, 11, 24).unwrap(),
        }
    }

    fn gene_rows(path: &std::path::Path) -> Vec<Vec<String>> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .skip(1)
            .map(|l| l.split('\t').map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_trio_pedigree_and_family_key() {
        let dir = TempDir::new().unwrap();
        let output = layout(&dir);
        let reference = reference();
        let api = FakePhenotips::trio(panel_with_terms());
        let lookup = FakeLookup::new(&[("ABC1", "ENSG00000000002")]);
        let processor = SampleProcessor::new(&api, &lookup, &reference, &output);

        let sample = SampleId::parse("FAM_01.03").unwrap();
        let outcome = processor.process_sample(&sample).unwrap();

        assert_eq!(outcome.family, "FAM01");
        assert_eq!(outcome.proband_id, "FAM_01.03");
        assert_eq!(outcome.pedigree_path, dir.path().join("pedigrees/FAM01_pedigree.ped"));
        assert_eq!(outcome.gene_table_path, dir.path().join("HPO/FAM01_HPO_2025-11-24.txt"));

        let ped = fs::read_to_string(&outcome.pedigree_path).unwrap();
        let lines: Vec<&str> = ped.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "FAM01 FAM01_03 FAM01_01 FAM01_02 2 2");
    }

    #[test]
    fn test_ambiguous_symbol_resolved_remotely() {
        let dir = TempDir::new().unwrap();
        let output = layout(&dir);
        let reference = reference();
        let api = FakePhenotips::trio(panel_with_terms());
        let lookup = FakeLookup::new(&[("ABC1", "ENSG00000000002")]);
        let processor = SampleProcessor::new(&api, &lookup, &reference, &output);

        let outcome = processor
            .process_sample(&SampleId::parse("FAM_01.03").unwrap())
            .unwrap();
        let rows = gene_rows(&outcome.gene_table_path);

        let abc1: Vec<&Vec<String>> = rows.iter().filter(|r| r[0] == "ABC1").collect();
        assert_eq!(abc1.len(), 1);
        assert_eq!(abc1[0][1], "ENSG00000000002");
        assert_eq!(abc1[0][2], "2");
        assert_eq!(abc1[0][4], "HP:0001250, HP:0001263");

        // NOVEL1 was looked up (call 1) and is absent remotely; ABC1 is call 2
        assert_eq!(*lookup.calls.borrow(), 2);
        assert!(outcome.warnings.contains(&PipelineWarning::SymbolResolutionGap {
            symbol: "NOVEL1".to_string()
        }));
    }

    #[test]
    fn test_no_duplicate_symbols_and_counts_match_terms() {
        let dir = TempDir::new().unwrap();
        let output = layout(&dir);
        let reference = reference();
        let api = FakePhenotips::trio(panel_with_terms());
        let lookup = FakeLookup::new(&[]);
        let processor = SampleProcessor::new(&api, &lookup, &reference, &output);

        let outcome = processor
            .process_sample(&SampleId::parse("FAM_01.03").unwrap())
            .unwrap();
        let rows = gene_rows(&outcome.gene_table_path);

        let mut symbols: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
        symbols.sort_unstable();
        let total = symbols.len();
        symbols.dedup();
        assert_eq!(symbols.len(), total);

        for row in &rows {
            let distinct: std::collections::HashSet<&str> = row[4].split(", ").collect();
            assert_eq!(row[2], distinct.len().to_string());
        }
    }

    #[test]
    fn test_empty_phenotype_set_writes_header_only_table() {
        let dir = TempDir::new().unwrap();
        let output = layout(&dir);
        let reference = reference();
        let api = FakePhenotips::trio(json!({ "rows": [] }));
        let lookup = FakeLookup::new(&[]);
        let processor = SampleProcessor::new(&api, &lookup, &reference, &output);

        let outcome = processor
            .process_sample(&SampleId::parse("FAM_01.03").unwrap())
            .unwrap();

        assert_eq!(
            fs::read_to_string(&outcome.gene_table_path).unwrap(),
            "Gene Symbol\tGene ID\tNumber of occurrences\tFeatures\tHPO IDs\n"
        );
        assert_eq!(
            outcome.warnings,
            vec![PipelineWarning::EmptyPhenotypeSet {
                patient_id: "P0000103".to_string()
            }]
        );
        assert_eq!(*lookup.calls.borrow(), 0);
    }

    #[test]
    fn test_symbol_lookup_failure_keeps_rows() {
        let dir = TempDir::new().unwrap();
        let output = layout(&dir);
        let reference = reference();
        let api = FakePhenotips::trio(panel_with_terms());
        let mut lookup = FakeLookup::new(&[]);
        lookup.fail = true;
        let processor = SampleProcessor::new(&api, &lookup, &reference, &output);

        let outcome = processor
            .process_sample(&SampleId::parse("FAM_01.03").unwrap())
            .unwrap();
        let rows = gene_rows(&outcome.gene_table_path);

        let symbols: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(symbols, vec!["ABC1", "NOVEL1", "SCN1A"]);
        assert_eq!(rows[1][1], "");
        assert_eq!(rows[2][1], "ENSG00000144285");
    }

    #[test]
    fn test_failed_sample_writes_nothing_and_batch_continues() {
        let dir = TempDir::new().unwrap();
        let output = layout(&dir);
        let reference = reference();
        let mut api = FakePhenotips::trio(panel_with_terms());

        // Second family: proband node has no external id
        let mut broken = trio_payload();
        broken["pedigree"]["proband"] = json!(4);
        api.patients.insert("FAM_02.03".to_string(), "P0000203".to_string());
        api.families.insert("P0000203".to_string(), broken);

        let lookup = FakeLookup::new(&[]);
        let processor = SampleProcessor::new(&api, &lookup, &reference, &output);

        let samples = vec![
            SampleId::parse("FAM_02.03").unwrap(),
            SampleId::parse("UNKNOWN.03").unwrap(),
            SampleId::parse("FAM_01.03").unwrap(),
        ];
        let summary = processor.process_batch(&samples);

        assert_eq!(summary.processed(), 3);
        assert_eq!(summary.succeeded.len(), 1);
        assert_eq!(summary.succeeded[0].family, "FAM01");
        assert_eq!(summary.failed.len(), 2);
        assert_eq!(summary.failed[0].0.as_str(), "FAM_02.03");
        assert!(summary.failed[0].1.contains("Proband"));

        assert!(!output.pedigree_path("FAM02").exists());
        assert!(!output.gene_table_path("FAM02").exists());
        assert!(!output.pedigree_path("UNKNOWN").exists());
    }

    #[test]
    fn test_missing_gene_panel_is_sample_failure() {
        let dir = TempDir::new().unwrap();
        let output = layout(&dir);
        let reference = reference();
        let mut api = FakePhenotips::trio(panel_with_terms());
        api.panels.clear();
        let lookup = FakeLookup::new(&[]);
        let processor = SampleProcessor::new(&api, &lookup, &reference, &output);

        let result = processor.process_sample(&SampleId::parse("FAM_01.03").unwrap());
        assert!(matches!(result, Err(PipelineError::UpstreamLookup { .. })));
        assert!(!output.pedigree_path("FAM01").exists());
    }
}
