//! `editbatch` is a command line tool for the batch analysis of amplicon
//! editing experiments. A bundle of paired-end FASTQ files is sorted into
//! replicates and treatments, every sample is run through an external
//! per-sample analysis tool with bounded parallelism, and the resulting
//! reports are collated into one table of editing metrics with a sensitivity
//! score per treatment.
//!
//! This package is composed of both a library crate, as well as a binary
//! crate. Each subcommand of the binary has a module here, with a `command`
//! submodule holding its arguments and entry point.
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]

pub mod aggregate;
pub mod errors;
pub mod organize;
pub mod pair;
pub mod pipeline;
pub mod report;
pub mod run;
pub mod utils;

#[cfg(test)]
mod testing;
