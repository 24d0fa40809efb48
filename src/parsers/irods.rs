// ==============================================================================
// irods.rs - Sequencing Archive Listing Parser
// ==============================================================================
// Description: Extracts PacBio HiFi-WGS deliverable paths (small variants,
//              structural variants, BAMs, tandem repeats, CNV reports) from a
//              recursive iRODS archive listing
// Created: 2025-11-24
// Modified: 2025-12-01
// Version: 1.1.0
// ==============================================================================
// Input: output of `ils -r <collection>`; directory headers end with ':' and
// are followed by the file names they contain, e.g.
//   /zone/pacbio/decoder/DEC_001-fam.joint/humanwgs_family:
//     DEC_001_01.GRCh38.aligned.haplotagged.bam
//     DEC_001_01.trgt.sorted.vcf.gz
//   /zone/pacbio/decoder/DEC_001_01/annotations:
// ==============================================================================

use std::io::BufRead;
use tracing::debug;

const JOINT_PBSV: &str = ".joint.GRCh38.pbsv.phased.vcf.gz";
const JOINT_DEEPVARIANT: &str = ".joint.GRCh38.deepvariant.glnexus.phased.vcf.gz";
const SINGLETON_PBSV: &str = ".GRCh38.pbsv.phased.vcf.gz";
const SINGLETON_DEEPVARIANT: &str = ".GRCh38.deepvariant.phased.vcf.gz";
const ALIGNED_BAM: &str = "GRCh38.aligned.haplotagged.bam";
const TRGT_VCF: &str = ".trgt.sorted.vcf.gz";
const CNV_REPORT_SUFFIX: &str = ".hificnv_annPipelineRev1.6.0_20230818_hg38_PACBIO_cnv.tagged.tsv";

/// Which part of the archive is being listed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingMode {
    /// Research families: joint calls only, restricted to the named families
    Family { families: Vec<String> },
    /// Clinical cohort: every sample, singleton or joint
    Cohort,
}

/// Paths keyed by family or sample. A repeated key replaces the earlier
/// path but keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyedPaths {
    entries: Vec<(String, String)>,
}

impl KeyedPaths {
    pub fn insert(&mut self, key: impl Into<String>, path: String) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = path,
            None => self.entries.push((key, path)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, p)| p.as_str())
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, p)| p.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Deliverables found in a listing
#[derive(Debug, Clone, Default)]
pub struct ArchiveManifest {
    pub deepvariant: KeyedPaths,
    pub pbsv: KeyedPaths,
    pub bams: KeyedPaths,
    pub trgt: KeyedPaths,
    pub cnv: KeyedPaths,
    /// Add the TRGT spanning-read BAM (and index) next to each aligned BAM
    pub with_trgt_spanning_bams: bool,
}

impl ArchiveManifest {
    /// BAM manifest lines: each BAM with its index, plus the TRGT spanning
    /// BAM pair when enabled
    pub fn bam_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.bams.len() * 4);
        for bam in self.bams.paths() {
            lines.push(bam.to_string());
            lines.push(format!("{}.bai", bam));
            if self.with_trgt_spanning_bams {
                let spanning = format!("{}.trgt.spanning.sorted.bam", bam.replace(".bam", ""));
                let spanning_index = format!("{}.bai", spanning);
                lines.push(spanning);
                lines.push(spanning_index);
            }
        }
        lines
    }
}

/// `FAM_01` also appears in the archive as `FAM_DNA_01`
fn dna_spelling(family: &str) -> Option<String> {
    let mut parts = family.split('_');
    match (parts.next(), parts.next()) {
        (Some(prefix), Some(suffix)) => Some(format!("{}_DNA_{}", prefix, suffix)),
        _ => None,
    }
}

/// Second-to-last path component of a directory header
fn parent_component(line: &str) -> Option<&str> {
    let mut parts = line.rsplit('/');
    parts.next()?;
    parts.next()
}

fn sample_prefix(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

/// Stateful line-by-line listing parser
pub struct IrodsListingParser {
    mode: ListingMode,
    family_patterns: Vec<(String, Option<String>)>,
}

impl IrodsListingParser {
    pub fn new(mode: ListingMode) -> Self {
        let family_patterns = match &mode {
            ListingMode::Family { families } => families
                .iter()
                .map(|f| (f.clone(), dna_spelling(f)))
                .collect(),
            ListingMode::Cohort => Vec::new(),
        };
        Self {
            mode,
            family_patterns,
        }
    }

    fn line_selected(&self, line: &str) -> bool {
        match self.mode {
            ListingMode::Cohort => true,
            ListingMode::Family { .. } => self.family_patterns.iter().any(|(family, dna)| {
                line.contains(family.as_str())
                    || dna.as_deref().is_some_and(|d| line.contains(d))
            }),
        }
    }

    fn is_directory_header(&self, line: &str) -> bool {
        let analysis_dir = line.contains("humanwgs") && line.contains(':');
        match self.mode {
            ListingMode::Family { .. } => analysis_dir && line.contains("fam"),
            ListingMode::Cohort => analysis_dir,
        }
    }

    pub fn parse<R: BufRead>(&self, reader: R) -> std::io::Result<ArchiveManifest> {
        let mut manifest = ArchiveManifest {
            with_trgt_spanning_bams: matches!(self.mode, ListingMode::Family { .. }),
            ..Default::default()
        };
        let mut current_dir: Option<String> = None;

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || !self.line_selected(line) {
                continue;
            }

            if self.is_directory_header(line) {
                let Some(analysis_dir) = parent_component(line) else {
                    continue;
                };
                let prefix = analysis_dir.replace(".joint", "");
                let family = analysis_dir.split('-').next().unwrap_or(analysis_dir);
                let dir = line.replace(':', "");

                let (pbsv, deepvariant) = if line.contains("fam") {
                    (JOINT_PBSV, JOINT_DEEPVARIANT)
                } else {
                    (SINGLETON_PBSV, SINGLETON_DEEPVARIANT)
                };
                debug!("Analysis directory for {}: {}", family, dir);
                manifest.pbsv.insert(family, format!("{}/{}{}", dir, prefix, pbsv));
                manifest
                    .deepvariant
                    .insert(family, format!("{}/{}{}", dir, prefix, deepvariant));
                current_dir = Some(dir);
            } else if line.contains(ALIGNED_BAM) && !line.contains("bai") {
                if let Some(dir) = &current_dir {
                    manifest
                        .bams
                        .insert(sample_prefix(line), format!("{}/{}", dir, line));
                }
            } else if line.contains(TRGT_VCF) && !line.contains("tbi") {
                if let Some(dir) = &current_dir {
                    manifest
                        .trgt
                        .insert(sample_prefix(line), format!("{}/{}", dir, line));
                }
            } else if line.contains("annotations:") && !line.contains("CPG") && !line.contains("fam") {
                if let Some(sample) = parent_component(line) {
                    let dir = line.replace(':', "");
                    manifest
                        .cnv
                        .insert(sample, format!("{}/{}{}", dir, sample, CNV_REPORT_SUFFIX));
                }
            }
        }

        debug!(
            "Listing yielded {} deepvariant, {} pbsv, {} BAM, {} TRGT, {} CNV entries",
            manifest.deepvariant.len(),
            manifest.pbsv.len(),
            manifest.bams.len(),
            manifest.trgt.len(),
            manifest.cnv.len()
        );
        Ok(manifest)
    }
}
