//! Functionality related to the `editbatch organize` subcommand.
//!
//! Raw FASTQ files are classified into a replicate and a treatment from their
//! file names and moved into a `<replicate>/<treatment>/` hierarchy, which the
//! rest of the pipeline relies on to lay out its outputs.

pub mod classifier;
pub mod command;
