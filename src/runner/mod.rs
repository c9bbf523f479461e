//! Process supervision
//!
//! This module spawns child processes, streams their output to event
//! handlers or buffers, and handles pause, resume, kill and timeouts.

mod buffer;
pub mod exec;
pub mod options;
pub mod process;
pub mod signal;
pub mod state;

// Re-export main types
pub use exec::{exec, waitpid};
pub use options::{CommandLine, ProcessOptions, StdinSource, StdoutTarget};
pub use process::{Process, RunningProcess};
pub use signal::{signal_name, signal_number};
pub use state::{EventHandler, EventHandlers, EventKind, ProcessEvent, ProcessOutput, ProcessState, Stream};
