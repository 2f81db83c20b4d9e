//! Functionality relating to the `editbatch run` subcommand itself.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::aggregate::command::{emit, reference_sequences, ReportArgs};
use crate::pipeline::PipelineContext;
use crate::run::orchestrator::{cancellation, SchedulerOptions, JOB_LOG_FILE_NAME};
use crate::run::tool::{ToolConfig, DEFAULT_PROGRAM};
use crate::utils::args::{at_least_one, timeout_in_seconds};
use crate::utils::sequence;

/// Clap arguments for the `editbatch run` subcommand.
#[derive(Args)]
pub struct RunArgs {
    /// ZIP archive holding the paired-end FASTQ files.
    #[arg(value_name = "ARCHIVE")]
    src: PathBuf,

    /// Amplicon sequence.
    #[arg(long, value_name = "SEQ")]
    amplicon: String,

    /// Guide sequence.
    #[arg(long, value_name = "SEQ")]
    guide: String,

    /// Coding sequence within the amplicon.
    #[arg(long, value_name = "SEQ")]
    coding_seq: Option<String>,

    /// Sequence window carrying the mutant allele.
    #[arg(long, value_name = "SEQ")]
    mut_seq: String,

    /// Sequence window carrying the edited wild-type allele.
    #[arg(long, value_name = "SEQ")]
    wt_seq: String,

    /// Minimum alignment score for a read to be aligned to the amplicon.
    #[arg(long, value_name = "SCORE", default_value_t = 60)]
    min_aln_score: u32,

    /// Number of bases shown on either side of the cut site in plots.
    #[arg(long, value_name = "BASES", default_value_t = 20)]
    plot_window: u32,

    /// Processes each job may use.
    #[arg(long, value_name = "N", default_value_t = 4, value_parser = at_least_one)]
    threads_per_job: usize,

    /// Maximum number of jobs running at once.
    #[arg(long, value_name = "N", default_value_t = 4, value_parser = at_least_one)]
    max_jobs: usize,

    /// Kill any job still running after this many seconds.
    #[arg(long, value_name = "SECS", value_parser = timeout_in_seconds)]
    job_timeout: Option<Duration>,

    /// Additional arguments passed to every invocation of the tool, split the
    /// way a shell would split them.
    #[arg(long, value_name = "ARGS", allow_hyphen_values = true)]
    extra_args: Option<String>,

    /// The analysis program, optionally preceded by a wrapper command.
    #[arg(long, value_name = "PROGRAM", default_value = DEFAULT_PROGRAM)]
    tool: String,

    /// Directory results are written to. Defaults to `./run-<timestamp>`.
    #[arg(short, long, value_name = "DIR")]
    output_directory: Option<PathBuf>,

    #[command(flatten)]
    report: ReportArgs,
}

fn default_output_directory() -> anyhow::Result<PathBuf> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the Unix epoch")?;
    Ok(PathBuf::from(format!("run-{}", now.as_secs())))
}

/// Splits `--tool` and `--extra-args` into words. Quotes and backslash
/// escapes are honored; nothing is expanded.
fn tool_words(args: &RunArgs) -> anyhow::Result<(Vec<String>, Vec<String>)> {
    let command = shell_words::split(&args.tool).context("parsing --tool")?;
    if command.is_empty() {
        bail!("--tool must name a program");
    }

    let extra_args = match &args.extra_args {
        Some(raw) => shell_words::split(raw).context("parsing --extra-args")?,
        None => Vec::new(),
    };

    Ok((command, extra_args))
}

/// Main function for the `editbatch run` subcommand.
pub fn run(args: RunArgs) -> anyhow::Result<()> {
    info!("Starting run subcommand...");

    //===========//
    // Sequences //
    //===========//

    let amplicon = sequence::required("amplicon", &args.amplicon)?;
    let guide = sequence::required("guide", &args.guide)?;
    let coding_seq = sequence::optional("coding", args.coding_seq.as_deref())?;
    let references = reference_sequences(&amplicon, &args.mut_seq, &args.wt_seq)?;

    info!(
        "Amplicon length: {}, coding sequence length: {}, guide length: {}.",
        amplicon.len(),
        coding_seq.as_ref().map(String::len).unwrap_or_default(),
        guide.len()
    );
    info!(
        "Minimum alignment score: {}, plot window: {}.",
        args.min_aln_score, args.plot_window
    );

    //===============//
    // Configuration //
    //===============//

    let (command, extra_args) = tool_words(&args)?;

    let config = ToolConfig {
        command,
        coding_seq,
        min_aln_score: args.min_aln_score,
        plot_window: args.plot_window,
        threads_per_job: args.threads_per_job,
        extra_args,
        ..ToolConfig::new(amplicon, guide)
    };

    let options = SchedulerOptions {
        max_jobs: args.max_jobs,
        timeout: args.job_timeout,
    };

    let out_root = match args.output_directory {
        Some(dir) => dir,
        None => default_output_directory()?,
    };

    //=======//
    // Input //
    //=======//

    let mut ctx = PipelineContext::from_archive(&args.src, out_root)?;
    ctx.organize()?;
    let pairs = ctx.pair()?;

    //======//
    // Jobs //
    //======//

    let pb = ProgressBar::new(pairs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:.cyan.bold} {spinner:.green} [{elapsed_precise}] [{bar}] {pos}/{len} ({eta})")
            .progress_chars("=> "),
    );
    pb.set_prefix("Analyzing");

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting the async runtime")?;

    let report = rt.block_on(async {
        let (handle, token) = cancellation();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling the remaining jobs.");
                handle.cancel();
            }
        });

        ctx.run(pairs, Arc::new(config), &options, token, &pb).await
    })?;
    pb.finish_and_clear();

    let failed = report.failures().count();
    if failed > 0 {
        warn!(
            "{} jobs did not succeed; their output is in {} files.",
            failed,
            JOB_LOG_FILE_NAME
        );
    }

    //=============//
    // Aggregation //
    //=============//

    info!("Results written to {}.", ctx.out_root().display());
    let table = ctx.aggregate(&references, &args.report)?;
    emit(&table, &args.report)?;

    ctx.close()
}
