//! Functionality relating to the `editbatch pair` subcommand itself.

use std::path::PathBuf;

use anyhow::bail;
use clap::Args;
use prettytable::{row, Table};
use tracing::info;

use crate::pair::matcher;

/// Clap arguments for the `editbatch pair` subcommand.
#[derive(Args)]
pub struct PairArgs {
    /// Directory to search (recursively) for FASTQ files.
    #[arg(value_name = "DIR")]
    src: PathBuf,

    /// Print the result as JSON instead of a table.
    #[arg(long)]
    json: bool,
}

/// Main function for the `editbatch pair` subcommand.
pub fn pair(args: PairArgs) -> anyhow::Result<()> {
    info!("Starting pair subcommand...");

    if !args.src.is_dir() {
        bail!("not a directory: {}", args.src.display());
    }

    let result = matcher::pair_fastqs(&args.src)?;

    if args.json {
        let output = serde_json::to_string_pretty(&result)?;
        println!("{}", output);
        return Ok(());
    }

    let mut table = Table::new();
    table.add_row(row!["Sample", "Read one", "Read two"]);
    for pair in &result.pairs {
        table.add_row(row![
            pair.sample_name,
            pair.r1.display(),
            pair.r2
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| String::from("-")),
        ]);
    }
    table.printstd();

    Ok(())
}
