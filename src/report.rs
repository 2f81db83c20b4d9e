//! Parsing of the text reports written by the external analysis tool.
//!
//! For each sample output directory the parser locates a fixed set of report
//! files, extracts read counts from them, classifies the reads of the allele
//! frequency table against the caller's mutant and wild-type sequences, and
//! assembles one [`metrics::MetricsRecord`].

pub mod locate;
pub mod metrics;
pub mod parse;
