//! Error types shared by the pipeline stages.
//!
//! Only errors that halt the pipeline before any job is scheduled live here.
//! Per-sample problems (a failed job, a missing report file, a file that
//! could not be moved) are ordinary values returned by the respective stage.

use std::path::PathBuf;

use thiserror::Error;
use tracing::error;

/// Exit codes for the `editbatch` binary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitCode {
    /// Indicates that invalid data was supplied to the given subcommand.
    InvalidInputData = 1,

    /// Any other failure.
    Failure = 2,
}

/// Errors that stop the pipeline before any external job runs.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input bundle could not be opened or extracted.
    #[error("could not read input archive `{path}`: {source}")]
    Archive {
        /// Path of the archive.
        path: PathBuf,
        /// Underlying archive error.
        #[source]
        source: zip::result::ZipError,
    },

    /// The input tree held no file that the pair matcher recognizes.
    #[error("no valid FASTQ pairs found under `{0}`")]
    NoPairs(PathBuf),

    /// A reference sequence held characters outside of `ACGTN`.
    #[error("invalid {name} sequence: unexpected character `{found}` at position {position}")]
    InvalidSequence {
        /// Which sequence was rejected (amplicon, guide, ...).
        name: &'static str,
        /// The offending character.
        found: char,
        /// Zero-based position of the offending character.
        position: usize,
    },

    /// A required reference sequence was empty.
    #[error("the {0} sequence is required but was empty")]
    MissingSequence(&'static str),
}

impl PipelineError {
    /// The exit code the binary reports for this error.
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::InvalidInputData
    }
}

/// Logs the error chain and terminates the process.
pub fn exit(err: anyhow::Error) -> ! {
    let code = match err.downcast_ref::<PipelineError>() {
        Some(e) => e.exit_code(),
        None => ExitCode::Failure,
    };

    error!("{:#}", err);
    std::process::exit(code as i32);
}
