// ==============================================================================
// main.rs - HPO Pedigree Extraction Entry Point
// ==============================================================================
// Description: Command-line entry point: pedigree and candidate-gene extraction
//              from PhenoTips, and archive manifest generation from iRODS
//              listings
// Created: 2025-11-20
// Modified: 2025-12-04
// Version: 1.2.0
// ==============================================================================

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hpo_pedigree::client::{EnsemblClient, PhenotipsClient};
use hpo_pedigree::config::{
    Credentials, Endpoints, OutputLayout, PipelineConfig, DEFAULT_ENSEMBL_URL,
    DEFAULT_PHENOTIPS_URL, DEFAULT_TIMEOUT_SECS,
};
use hpo_pedigree::models::SampleId;
use hpo_pedigree::output::write_archive_manifests;
use hpo_pedigree::parsers::{
    GeneXrefTable, IrodsListingParser, ListingMode, SampleSheet, TermGeneTable,
    DEFAULT_SAMPLE_COLUMN,
};
use hpo_pedigree::processor::{ReferenceData, SampleProcessor};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract pedigree files and candidate-gene tables for probands
    Extract(ExtractArgs),
    /// Build archive manifests from an iRODS recursive listing
    IrodsManifest(ManifestArgs),
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// CSV with `username,password` columns for PhenoTips
    #[arg(long, env = "PHENOTIPS_CREDENTIALS")]
    credentials: PathBuf,

    /// Sample sheet; only proband rows are processed
    #[arg(long)]
    sample_sheet: Option<PathBuf>,

    /// Single sample identifier (used when no sample sheet is given)
    #[arg(long)]
    sample_id: Option<String>,

    /// Sample sheet column holding sample identifiers
    #[arg(long, default_value = DEFAULT_SAMPLE_COLUMN)]
    sample_column: String,

    #[arg(long, env = "HPO_PEDIGREE_PEDIGREE_DIR", default_value = "pedigrees")]
    pedigree_dir: PathBuf,

    #[arg(long, env = "HPO_PEDIGREE_HPO_DIR", default_value = "HPO")]
    hpo_dir: PathBuf,

    /// HPO term to gene table (TSV, optionally gzipped)
    #[arg(long, env = "HPO_TERM_GENE_TABLE")]
    term_gene_table: PathBuf,

    /// Gene symbol to Ensembl identifier table (TSV, optionally gzipped)
    #[arg(long, env = "HPO_GENE_XREF_TABLE")]
    gene_xref_table: PathBuf,

    #[arg(long, env = "PHENOTIPS_URL", default_value = DEFAULT_PHENOTIPS_URL)]
    phenotips_url: String,

    #[arg(long, env = "ENSEMBL_URL", default_value = DEFAULT_ENSEMBL_URL)]
    ensembl_url: String,

    /// Per-request HTTP timeout
    #[arg(long, env = "HPO_PEDIGREE_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,
}

#[derive(Args, Debug)]
struct ManifestArgs {
    /// Output of `ils -r` over the archive collection
    #[arg(long)]
    listing: PathBuf,

    /// Comma-separated family ids; omit for cohort mode
    #[arg(long, value_delimiter = ',')]
    families: Option<Vec<String>>,

    #[arg(long, default_value = "sample_sheets")]
    out_dir: PathBuf,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hpo_pedigree=info".into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    info!("Starting HPO pedigree extraction v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Extract(args) => run_extract(args),
        Command::IrodsManifest(args) => run_manifest(args),
    }
}

fn run_extract(args: ExtractArgs) -> Result<()> {
    let samples = match (&args.sample_sheet, &args.sample_id) {
        (Some(sheet), sample_id) => {
            if let Some(id) = sample_id {
                warn!("Both a sample sheet and --sample-id were given; ignoring {}", id);
            }
            let probands = SampleSheet::new(args.sample_column.as_str())
                .probands(sheet)
                .with_context(|| format!("Failed to read sample sheet {:?}", sheet))?;
            info!("Sample sheet {:?} lists {} probands", sheet, probands.len());
            probands
        }
        (None, Some(id)) => vec![SampleId::parse(id)?],
        (None, None) => {
            error!("No sample ID or sample sheet provided");
            bail!("Nothing to process: pass --sample-sheet or --sample-id");
        }
    };

    let config = PipelineConfig {
        credentials: Credentials::from_csv(&args.credentials)
            .with_context(|| format!("Failed to read credentials from {:?}", args.credentials))?,
        endpoints: Endpoints::new(
            &args.phenotips_url,
            &args.ensembl_url,
            Duration::from_secs(args.timeout_secs),
        ),
        output: OutputLayout {
            pedigree_dir: args.pedigree_dir,
            hpo_dir: args.hpo_dir,
            run_date: chrono::Local::now().date_naive(),
        },
    };

    let reference = ReferenceData {
        term_genes: TermGeneTable::from_path(&args.term_gene_table).with_context(|| {
            format!("Failed to load term-gene table {:?}", args.term_gene_table)
        })?,
        xref: GeneXrefTable::from_path(&args.gene_xref_table).with_context(|| {
            format!("Failed to load gene cross-reference {:?}", args.gene_xref_table)
        })?,
    };
    info!(
        "Loaded {} term-gene associations",
        reference.term_genes.len()
    );

    let phenotips = PhenotipsClient::new(&config.endpoints, &config.credentials)
        .context("Failed to build PhenoTips client")?;
    let ensembl =
        EnsemblClient::new(&config.endpoints).context("Failed to build Ensembl client")?;

    let processor = SampleProcessor::new(&phenotips, &ensembl, &reference, &config.output);
    // Per-sample failures are reported in the summary, not the exit status
    processor.process_batch(&samples);
    Ok(())
}

fn run_manifest(args: ManifestArgs) -> Result<()> {
    let mode = match args.families {
        Some(families) => ListingMode::Family {
            families: families
                .into_iter()
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect(),
        },
        None => ListingMode::Cohort,
    };

    let file = File::open(&args.listing)
        .with_context(|| format!("Failed to open listing {:?}", args.listing))?;
    let manifest = IrodsListingParser::new(mode)
        .parse(BufReader::new(file))
        .with_context(|| format!("Failed to parse listing {:?}", args.listing))?;

    let written = write_archive_manifests(
        &manifest,
        &args.out_dir,
        chrono::Local::now().date_naive(),
    )?;
    info!("Wrote {} manifests to {:?}", written.len(), args.out_dir);
    Ok(())
}
