//! bgc-store - SQLite storage layer for BGC annotations
//!
//! This crate owns the relational schema for genomic records, BGC regions,
//! coding sequences, HMM hits and HMM databases, and enforces its keys and
//! constraints.

mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

// Re-export schema for external tooling and tests
pub use schema::{SCHEMA, SCHEMA_VERSION, TABLES};
