//! CLI interface and argument parsing
//!
//! This module handles option specifications, argument parsing, help
//! generation, shell completion and the `qel` binary itself.

pub mod app;
pub mod completion;
pub mod parser;
pub mod result;
pub mod spec;
pub mod tokenizer;
pub mod usage;

// Re-export main types
pub use app::{run, App, Command};
pub use completion::{complete, completion_script, CompletionRequest, Shell};
pub use parser::{Outcome, Parser, ParserOptions};
pub use result::ParseResult;
pub use spec::{CompiledSpec, Handler, Spec};
pub use tokenizer::{shell_quote, split_words, tokenize, Token};
pub use usage::{describe, UsageDescriptor, UsageOptions, UsageRenderer};
