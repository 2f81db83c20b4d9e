//! Functionality related to the `editbatch pair` subcommand.

pub mod command;
pub mod matcher;
