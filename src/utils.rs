//! Utilities that are used across the `editbatch` subcommands.

pub mod args;
pub mod display;
pub mod sequence;
pub mod walk;
