// ==============================================================================
// reference.rs - Static Reference Table Parsers
// ==============================================================================
// Description: Loads the HPO term-to-gene table and the gene symbol to
//              Ensembl identifier cross-reference table
// Created: 2025-11-21
// Modified: 2025-12-02
// Version: 1.1.0
// ==============================================================================
// Formats: tab-delimited with a header row, optionally gzip-compressed (.gz)
//
//   phenotype_to_genes.txt
//     hpo_id      hpo_name         ncbi_gene_id  gene_symbol  disease_id
//     HP:0000002  Abnormality...   2192          FBLN1        OMIM:608180
//
//   hgnc_complete_set.txt
//     hgnc_id     symbol  ...  ensembl_gene_id
//     HGNC:5      A1BG    ...  ENSG00000121410
// ==============================================================================

use flate2::read::GzDecoder;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ReferenceTableError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Reference table {0} contains no usable rows")]
    EmptyTable(String),
}

/// Open a tab-delimited table, transparently decompressing `.gz` files
fn tsv_reader(path: &Path) -> Result<csv::Reader<Box<dyn Read>>, ReferenceTableError> {
    let file = File::open(path)?;
    let source: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    Ok(csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .from_reader(source))
}

/// One term-to-gene association
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TermGeneRow {
    #[serde(rename = "hpo_id")]
    pub term_id: String,

    #[serde(rename = "hpo_name")]
    pub term_name: String,

    pub gene_symbol: String,
}

/// HPO term to gene associations, one row per distinct (term, gene) pair
#[derive(Debug, Clone, Default)]
pub struct TermGeneTable {
    rows: Vec<TermGeneRow>,
}

impl TermGeneTable {
    /// Build from rows; repeated (term, gene) pairs keep the first row.
    /// The public file repeats a pair once per associated disease.
    pub fn from_rows(rows: impl IntoIterator<Item = TermGeneRow>) -> Self {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let rows = rows
            .into_iter()
            .filter(|row| !row.term_id.is_empty() && !row.gene_symbol.is_empty())
            .filter(|row| seen.insert((row.term_id.clone(), row.gene_symbol.clone())))
            .collect();
        Self { rows }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ReferenceTableError> {
        let path = path.as_ref();
        let mut reader = tsv_reader(path)?;

        let mut rows = Vec::new();
        for result in reader.deserialize() {
            let row: TermGeneRow = result?;
            rows.push(row);
        }

        let table = Self::from_rows(rows);
        if table.rows.is_empty() {
            return Err(ReferenceTableError::EmptyTable(path.display().to_string()));
        }

        info!(
            "Loaded {} term-gene associations from {}",
            table.rows.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn rows(&self) -> &[TermGeneRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct XrefRow {
    symbol: String,
    #[serde(default)]
    ensembl_gene_id: String,
}

/// Gene symbol to stable identifier cross-reference.
///
/// A symbol may map to several identifiers when the table mixes releases.
#[derive(Debug, Clone, Default)]
pub struct GeneXrefTable {
    ids: HashMap<String, Vec<String>>,
}

impl GeneXrefTable {
    pub fn from_pairs<S: Into<String>>(pairs: impl IntoIterator<Item = (S, S)>) -> Self {
        let mut ids: HashMap<String, Vec<String>> = HashMap::new();
        for (symbol, id) in pairs {
            let (symbol, id) = (symbol.into(), id.into());
            if symbol.is_empty() || id.is_empty() {
                continue;
            }
            let entry = ids.entry(symbol).or_default();
            if !entry.contains(&id) {
                entry.push(id);
            }
        }
        Self { ids }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ReferenceTableError> {
        let path = path.as_ref();
        let mut reader = tsv_reader(path)?;

        let mut pairs = Vec::new();
        for result in reader.deserialize() {
            let row: XrefRow = result?;
            pairs.push((row.symbol.trim().to_string(), row.ensembl_gene_id.trim().to_string()));
        }

        let table = Self::from_pairs(pairs);
        if table.ids.is_empty() {
            return Err(ReferenceTableError::EmptyTable(path.display().to_string()));
        }

        info!(
            "Loaded {} gene symbols from cross-reference {}",
            table.ids.len(),
            path.display()
        );
        Ok(table)
    }

    /// Distinct identifiers for a symbol, in table order
    pub fn ids(&self, symbol: &str) -> &[String] {
        self.ids.get(symbol).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_ambiguous(&self, symbol: &str) -> bool {
        self.ids(symbol).len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    const PHENOTYPE_TO_GENES: &str = "\
hpo_id\thpo_name\tncbi_gene_id\tgene_symbol\tdisease_id
HP:0001250\tSeizure\t6323\tSCN1A\tOMIM:607208
HP:0001250\tSeizure\t6323\tSCN1A\tOMIM:604403
HP:0001263\tGlobal developmental delay\t6323\tSCN1A\tOMIM:607208
HP:0001263\tGlobal developmental delay\t4204\tMECP2\tOMIM:312750
";

    #[test]
    fn test_term_gene_table_collapses_disease_rows() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(PHENOTYPE_TO_GENES.as_bytes()).unwrap();
        file.flush().unwrap();

        let table = TermGeneTable::from_path(file.path()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows()[0].term_id, "HP:0001250");
        assert_eq!(table.rows()[0].term_name, "Seizure");
        assert_eq!(table.rows()[2].gene_symbol, "MECP2");
    }

    #[test]
    fn test_term_gene_table_gzip() {
        let file = Builder::new().suffix(".txt.gz").tempfile().unwrap();
        let mut encoder = GzEncoder::new(file.reopen().unwrap(), Compression::default());
        encoder.write_all(PHENOTYPE_TO_GENES.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let table = TermGeneTable::from_path(file.path()).unwrap();
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_empty_term_gene_table() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "hpo_id\thpo_name\tncbi_gene_id\tgene_symbol\tdisease_id").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            TermGeneTable::from_path(file.path()),
            Err(ReferenceTableError::EmptyTable(_))
        ));
    }

    #[test]
    fn test_xref_table() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "hgnc_id\tsymbol\tname\tensembl_gene_id").unwrap();
        writeln!(file, "HGNC:10585\tSCN1A\tsodium channel\tENSG00000144285").unwrap();
        writeln!(file, "HGNC:1\tABC1\tversioned gene\tENSG00000000001").unwrap();
        writeln!(file, "HGNC:2\tABC1\tversioned gene\tENSG00000000002").unwrap();
        writeln!(file, "HGNC:3\tNOID\tno identifier\t").unwrap();
        file.flush().unwrap();

        let table = GeneXrefTable::from_path(file.path()).unwrap();
        assert_eq!(table.ids("SCN1A"), ["ENSG00000144285".to_string()]);
        assert!(table.is_ambiguous("ABC1"));
        assert!(!table.is_ambiguous("SCN1A"));
        assert!(table.ids("NOID").is_empty());
        assert!(table.ids("MISSING").is_empty());
    }

    #[test]
    fn test_xref_repeated_pair_is_not_ambiguous() {
        let table = GeneXrefTable::from_pairs([
            ("MECP2", "ENSG00000169057"),
            ("MECP2", "ENSG00000169057"),
        ]);
        assert_eq!(table.ids("MECP2").len(), 1);
    }
}
