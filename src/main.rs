use clap::{Parser, Subcommand};
use git_testament::{git_testament, render_testament};

use editbatch::aggregate::command::{aggregate, AggregateArgs};
use editbatch::errors;
use editbatch::organize::command::{organize, OrganizeArgs};
use editbatch::pair::command::{pair, PairArgs};
use editbatch::run::command::{run, RunArgs};

git_testament!(TESTAMENT);

#[derive(Parser)]
#[command(author, about, long_about = None, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    subcommand: Subcommands,

    /// Only errors are printed to the stderr stream.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// All available information, including debug information, is printed to
    /// stderr.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
}

#[derive(Subcommand)]
enum Subcommands {
    /// Sorts FASTQ files into replicate and treatment directories.
    Organize(OrganizeArgs),

    /// Pairs read one and read two FASTQ files into samples.
    Pair(PairArgs),

    /// Runs the full analysis over an archive of FASTQ files.
    Run(RunArgs),

    /// Rebuilds the result table from an existing output directory.
    Aggregate(AggregateArgs),
}

fn main() {
    let version = render_testament!(TESTAMENT);
    let cli = Cli::parse_from_args_with_version(version);

    let mut level = tracing::Level::INFO;
    if cli.quiet {
        level = tracing::Level::ERROR;
    } else if cli.verbose {
        level = tracing::Level::DEBUG;
    }

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let result = match cli.subcommand {
        Subcommands::Organize(args) => organize(args),
        Subcommands::Pair(args) => pair(args),
        Subcommands::Run(args) => run(args),
        Subcommands::Aggregate(args) => aggregate(args),
    };

    if let Err(err) = result {
        errors::exit(err);
    }
}

impl Cli {
    fn parse_from_args_with_version(version: String) -> Self {
        use clap::{CommandFactory, FromArgMatches};

        let matches = Cli::command().version(version).get_matches();
        match Cli::from_arg_matches(&matches) {
            Ok(cli) => cli,
            Err(e) => e.exit(),
        }
    }
}
