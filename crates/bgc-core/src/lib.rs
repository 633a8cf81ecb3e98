//! bgc-core - Core types and traits for the BGC annotation database
//!
//! This crate provides the row types, the storage trait, error handling and
//! configuration shared by the store and the CLI.

pub mod checksum;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{BgcError, ConstraintKind, Result};
pub use traits::*;
pub use types::*;
