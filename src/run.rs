//! Running the external analysis tool over every sample of a batch.

pub mod command;
pub mod orchestrator;
pub mod tool;
