// ==============================================================================
// output.rs - Pedigree, Gene Table and Manifest Writers
// ==============================================================================
// Description: Serializes resolved pedigrees to PED-like text, candidate genes
//              to a tab-delimited table, and archive manifests to path lists
// Created: 2025-11-22
// Modified: 2025-12-04
// Version: 1.2.0
// ==============================================================================
// Files are written to a temporary sibling and renamed into place, so a
// reader never sees a half-written file.
// ==============================================================================

use chrono::NaiveDate;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::models::{normalize_id, CandidateGene, Sex};
use crate::parsers::ArchiveManifest;
use crate::pedigree::ResolvedPedigree;

pub const GENE_TABLE_HEADER: [&str; 5] = [
    "Gene Symbol",
    "Gene ID",
    "Number of occurrences",
    "Features",
    "HPO IDs",
];

/// Write `contents` to `path` via a temporary file in the same directory
pub fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// One line per member, in pedigree order:
/// `family_id sample_id paternal_id maternal_id sex phenotype`
pub fn pedigree_lines(pedigree: &ResolvedPedigree, family: &str) -> Vec<String> {
    pedigree
        .members()
        .iter()
        .map(|member| {
            let mut paternal: Option<&str> = None;
            let mut maternal: Option<&str> = None;
            for parent in &member.parent_external_ids {
                let is_father = pedigree
                    .get(parent)
                    .is_some_and(|p| p.sex == Sex::Male);
                if is_father {
                    paternal = Some(parent.as_str());
                } else {
                    maternal = Some(parent.as_str());
                }
            }

            format!(
                "{} {} {} {} {} {}",
                family,
                normalize_id(&member.external_id),
                paternal.map(normalize_id).unwrap_or_else(|| "0".to_string()),
                maternal.map(normalize_id).unwrap_or_else(|| "0".to_string()),
                member.sex.ped_code(),
                member.affected.ped_code()
            )
        })
        .collect()
}

pub fn write_pedigree(pedigree: &ResolvedPedigree, family: &str, path: &Path) -> Result<()> {
    let mut contents = String::new();
    for line in pedigree_lines(pedigree, family) {
        contents.push_str(&line);
        contents.push('\n');
    }
    write_atomically(path, contents.as_bytes())?;
    info!("Wrote pedigree for {} ({} members) to {:?}", family, pedigree.len(), path);
    Ok(())
}

/// Tab-delimited gene table with header; an empty slice gives a header-only table
pub fn gene_table_bytes(genes: &[CandidateGene]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(GENE_TABLE_HEADER)?;
    for gene in genes {
        let count = gene.occurrence_count.to_string();
        let features = gene.features.join(", ");
        let term_ids = gene.term_ids.join(", ");
        writer.write_record([
            gene.gene_symbol.as_str(),
            gene.gene_id.as_deref().unwrap_or(""),
            count.as_str(),
            features.as_str(),
            term_ids.as_str(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| PipelineError::Io(e.into_error()))
}

pub fn write_gene_table(genes: &[CandidateGene], path: &Path) -> Result<()> {
    let contents = gene_table_bytes(genes)?;
    write_atomically(path, &contents)?;
    info!("Wrote {} candidate genes to {:?}", genes.len(), path);
    Ok(())
}

/// Write the five archive manifests into `dir`, returning their paths
pub fn write_archive_manifests(
    manifest: &ArchiveManifest,
    dir: &Path,
    date: NaiveDate,
) -> Result<Vec<PathBuf>> {
    let stamp = date.format("%Y-%m-%d");
    let manifests: [(&str, Vec<String>); 5] = [
        ("deepvariant", manifest.deepvariant.paths().map(str::to_string).collect()),
        ("pbsv", manifest.pbsv.paths().map(str::to_string).collect()),
        ("BAMs", manifest.bam_lines()),
        ("trgt", manifest.trgt.paths().map(str::to_string).collect()),
        ("CNV", manifest.cnv.paths().map(str::to_string).collect()),
    ];

    let mut written = Vec::with_capacity(manifests.len());
    for (name, lines) in manifests {
        let path = dir.join(format!("{}_{}.txt", name, stamp));
        let mut contents = String::new();
        for line in &lines {
            contents.push_str(line);
            contents.push('\n');
        }
        write_atomically(&path, contents.as_bytes())?;
        info!("Wrote {} entries to {:?}", lines.len(), path);
        written.push(path);
    }
    Ok(written)
}
