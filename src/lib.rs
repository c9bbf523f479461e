//! qel - declarative command-line handling for script authors
//!
//! qel parses argument vectors against a declared option specification,
//! renders usage and help, answers shell completion requests, and runs
//! child processes under supervision with line-oriented output events.

// Public modules
pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod logging;
pub mod runner;
pub mod validate;

// Re-export commonly used types
pub use cli::{Outcome, ParseResult, Parser, ParserOptions, Spec};
pub use env::{Environment, ProcessEnv};
pub use error::{ArgsError, ConfigError, ExecutionError, QelError, Result};
pub use runner::{exec, Process, ProcessOptions};
pub use validate::{flag, number, path, string, Builder, Value};

/// Current version of qel
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
