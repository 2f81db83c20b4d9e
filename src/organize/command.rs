//! Functionality relating to the `editbatch organize` subcommand itself.

use std::path::PathBuf;

use anyhow::bail;
use clap::Args;
use tracing::info;

use crate::organize::classifier;

/// Clap arguments for the `editbatch organize` subcommand.
#[derive(Args)]
pub struct OrganizeArgs {
    /// Directory holding the FASTQ files to sort into replicates and
    /// treatments.
    #[arg(value_name = "DIR")]
    src: PathBuf,
}

/// Main function for the `editbatch organize` subcommand.
pub fn organize(args: OrganizeArgs) -> anyhow::Result<()> {
    info!("Starting organize subcommand...");

    if !args.src.is_dir() {
        bail!("not a directory: {}", args.src.display());
    }

    let summary = classifier::reorganize(&args.src)?;

    let output = serde_json::to_string_pretty(&summary)?;
    println!("{}", output);

    Ok(())
}
