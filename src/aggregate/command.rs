//! Functionality relating to the `editbatch aggregate` subcommand itself.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Args;
use tracing::{info, warn};

use crate::aggregate::sensitivity::ReferenceSelection;
use crate::aggregate::table::{build_tables, list_replicates, list_treatments, ResultTable};
use crate::errors::PipelineError;
use crate::report::parse::ReferenceSequences;
use crate::run::tool::ToolConfig;
use crate::utils::args::comma_list;
use crate::utils::sequence;

/// Arguments controlling how results are normalized, selected, ordered and
/// exported. Shared by `run` and `aggregate`.
#[derive(Args, Debug, Default)]
pub struct ReportArgs {
    /// Treatment whose MUT/WT*% is the sensitivity reference.
    #[arg(long, value_name = "TREATMENT")]
    pub reference_treatment: Option<String>,

    /// Use the untreated sample of this day as the sensitivity reference.
    #[arg(long, value_name = "DAY")]
    pub reference_day: Option<u32>,

    /// Only report these replicates (comma separated).
    #[arg(long, value_name = "NAMES")]
    pub replicates: Option<String>,

    /// Treatments to list first, in this order (comma separated).
    #[arg(long, value_name = "NAMES")]
    pub treatment_order: Option<String>,

    /// Write the result table to this CSV file.
    #[arg(long, value_name = "PATH")]
    pub csv: Option<PathBuf>,

    /// Write the result table to this JSON file.
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,
}

impl ReportArgs {
    /// How the reference row of each replicate is chosen.
    pub fn selection(&self) -> ReferenceSelection {
        ReferenceSelection {
            treatment: self.reference_treatment.clone(),
            day: self.reference_day,
        }
    }
}

/// Validates the sequences reads are classified against.
pub fn reference_sequences(
    amplicon: &str,
    mut_seq: &str,
    wt_seq: &str,
) -> Result<ReferenceSequences, PipelineError> {
    Ok(ReferenceSequences {
        amplicon: sequence::required("amplicon", amplicon)?,
        mutant: sequence::required("MUT", mut_seq)?,
        wild_type: sequence::required("WT*", wt_seq)?,
    })
}

/// Parses every replicate under `out_root` into the final, selected and
/// ordered result table.
pub fn collect_results(
    out_root: &Path,
    references: &ReferenceSequences,
    report: &ReportArgs,
) -> anyhow::Result<ResultTable> {
    let replicates = list_replicates(out_root)?;
    info!(
        "Found {} replicates and {} treatments.",
        replicates.len(),
        list_treatments(out_root)?.len()
    );

    let tables = build_tables(out_root, &replicates, references, &report.selection())?;
    let chosen = report.replicates.as_deref().map(comma_list);
    let order = report
        .treatment_order
        .as_deref()
        .map(comma_list)
        .unwrap_or_default();

    Ok(ResultTable::select(&tables, chosen.as_deref()).ordered(&order))
}

/// Prints the result table and writes the requested exports.
pub fn emit(table: &ResultTable, report: &ReportArgs) -> anyhow::Result<()> {
    if table.rows.is_empty() {
        warn!("No results were found.");
    } else {
        table.to_pretty_table().printstd();
    }

    if let Some(path) = &report.csv {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        table
            .write_csv(BufWriter::new(file))
            .with_context(|| format!("writing {}", path.display()))?;
        info!("Wrote {}.", path.display());
    }

    if let Some(path) = &report.json {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        table
            .write_json(BufWriter::new(file))
            .with_context(|| format!("writing {}", path.display()))?;
        info!("Wrote {}.", path.display());
    }

    Ok(())
}

/// Clap arguments for the `editbatch aggregate` subcommand.
#[derive(Args)]
pub struct AggregateArgs {
    /// Output directory of a previous `editbatch run`.
    #[arg(value_name = "OUTPUT_DIR")]
    src: PathBuf,

    /// Sequence window carrying the mutant allele.
    #[arg(long, value_name = "SEQ")]
    mut_seq: String,

    /// Sequence window carrying the edited wild-type allele.
    #[arg(long, value_name = "SEQ")]
    wt_seq: String,

    /// Amplicon sequence. Defaults to the one recorded by `editbatch run`.
    #[arg(long, value_name = "SEQ")]
    amplicon: Option<String>,

    #[command(flatten)]
    report: ReportArgs,
}

/// Main function for the `editbatch aggregate` subcommand.
pub fn aggregate(args: AggregateArgs) -> anyhow::Result<()> {
    info!("Starting aggregate subcommand...");

    if !args.src.is_dir() {
        bail!("not a directory: {}", args.src.display());
    }

    let amplicon = match args.amplicon {
        Some(amplicon) => amplicon,
        None => {
            ToolConfig::read(&args.src)
                .context("no --amplicon was given and none was recorded for this run")?
                .amplicon
        }
    };

    let references = reference_sequences(&amplicon, &args.mut_seq, &args.wt_seq)?;
    let table = collect_results(&args.src, &references, &args.report)?;
    emit(&table, &args.report)
}
