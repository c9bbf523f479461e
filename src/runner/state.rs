//! Process state and events

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// Observable state of a supervised child
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessState {
    /// 0 before the child starts
    pub pid: i32,
    /// Negative when the child was killed by a signal
    pub exit_code: i32,
    /// Name of the terminating signal
    pub signal: Option<String>,
    pub did_timeout: bool,
    pub running: bool,
    pub paused: bool,
}

impl ProcessState {
    pub fn success(&self) -> bool {
        !self.running && self.exit_code == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Stdout(String),
    Stderr(String),
    Exit(ProcessState),
    Pause,
    Resume,
}

/// Record handed to event handlers
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessEvent {
    pub pid: i32,
    pub timestamp: SystemTime,
    pub kind: EventKind,
}

impl ProcessEvent {
    /// Payload of a `stdout`/`stderr` event
    pub fn data(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Stdout(data) | EventKind::Stderr(data) => Some(data),
            _ => None,
        }
    }
}

pub type EventHandler = Arc<dyn Fn(&ProcessEvent) + Send + Sync>;

/// Callbacks keyed by event name
#[derive(Clone, Default)]
pub struct EventHandlers {
    pub stdout: Option<EventHandler>,
    pub stderr: Option<EventHandler>,
    pub exit: Option<EventHandler>,
    pub pause: Option<EventHandler>,
    pub resume: Option<EventHandler>,
}

impl EventHandlers {
    pub(crate) fn for_stream(&self, stream: Stream) -> Option<&EventHandler> {
        match stream {
            Stream::Stdout => self.stdout.as_ref(),
            Stream::Stderr => self.stderr.as_ref(),
        }
    }
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .field("exit", &self.exit.is_some())
            .field("pause", &self.pause.is_some())
            .field("resume", &self.resume.is_some())
            .finish()
    }
}

/// Terminal state plus whatever output was buffered
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessOutput {
    pub state: ProcessState,
    pub stdout: String,
    pub stderr: String,
}
