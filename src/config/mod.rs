//! Declarative CLI definitions
//!
//! This module handles discovery and parsing of qel.yml files, validation
//! of their structure, and compilation into a ready `Parser`.

pub mod build;
pub mod parse;
pub mod schema;
pub mod types;

// Re-export main types
pub use build::*;
pub use parse::*;
pub use schema::*;
pub use types::*;
