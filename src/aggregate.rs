//! Collation of per-sample metrics into replicate tables and a final result
//! table.

pub mod command;
pub mod sensitivity;
pub mod table;
