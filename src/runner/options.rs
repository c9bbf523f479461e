//! Process options
//!
//! Everything the supervisor needs to know before spawning a child:
//! how to build the argv, where stdio goes, how output is buffered and
//! when to give up on the child.

use crate::cli::tokenizer::{shell_quote, split_words};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Command to run: a shell-style line or an explicit argument list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    Line(String),
    Args(Vec<String>),
}

impl CommandLine {
    pub fn is_empty(&self) -> bool {
        match self {
            CommandLine::Line(line) => line.trim().is_empty(),
            CommandLine::Args(args) => args.is_empty() || args[0].is_empty(),
        }
    }

    /// Text passed to `sh -c`
    pub fn to_shell_line(&self) -> String {
        match self {
            CommandLine::Line(line) => line.clone(),
            CommandLine::Args(args) => args
                .iter()
                .map(|a| shell_quote(a))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Words for direct execution
    pub fn to_args(&self) -> Vec<String> {
        match self {
            CommandLine::Line(line) => split_words(line),
            CommandLine::Args(args) => args.clone(),
        }
    }
}

impl From<&str> for CommandLine {
    fn from(line: &str) -> Self {
        CommandLine::Line(line.to_string())
    }
}

impl From<String> for CommandLine {
    fn from(line: String) -> Self {
        CommandLine::Line(line)
    }
}

impl From<Vec<String>> for CommandLine {
    fn from(args: Vec<String>) -> Self {
        CommandLine::Args(args)
    }
}

impl From<&[&str]> for CommandLine {
    fn from(args: &[&str]) -> Self {
        CommandLine::Args(args.iter().map(|a| a.to_string()).collect())
    }
}

/// Where the child's stdin comes from
#[derive(Debug, Clone, Default)]
pub enum StdinSource {
    #[default]
    Inherit,
    Null,
    /// Opened fresh for every run
    Path(PathBuf),
    /// Caller-owned file, rewound before exec
    File(Arc<File>),
    /// Payload written to a temporary file that becomes stdin
    Input(Vec<u8>),
}

/// Where the child's stdout goes
#[derive(Debug, Clone, Default)]
pub enum StdoutTarget {
    /// Pipe read by the supervisor
    #[default]
    Pipe,
    /// Created or truncated for every run
    Path(PathBuf),
    /// Caller-owned file, rewound before exec
    File(Arc<File>),
}

impl StdoutTarget {
    pub fn is_pipe(&self) -> bool {
        matches!(self, StdoutTarget::Pipe)
    }
}

/// Process settings
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub cwd: Option<PathBuf>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    /// Variables added to (or replacing) the inherited environment
    pub env: Vec<(String, String)>,
    pub replace_env: bool,
    /// Run through `<shell> -c <line>`
    pub use_shell: bool,
    pub shell: String,
    /// Start the child as a session and process-group leader
    pub new_session: bool,
    /// Send stderr into the stdout pipe
    pub redirect_stderr: bool,
    pub stdin: StdinSource,
    pub stdout: StdoutTarget,
    /// Dispatch complete lines instead of raw chunks
    pub line_buffered: bool,
    /// Trim buffered output at end of stream
    pub trim: bool,
    /// Drop blank lines from buffered output at end of stream
    pub skip_blank_lines: bool,
    pub timeout: Option<Duration>,
    /// Signal sent when the timeout fires
    pub timeout_signal: String,
    /// Read size for the stdout/stderr pipes
    pub buffer_size: usize,
    /// Opaque caller data carried with the options
    pub props: serde_json::Value,
    /// `exec` returns stdout even on a non-zero exit
    pub ignore_error: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        ProcessOptions {
            cwd: None,
            uid: None,
            gid: None,
            env: Vec::new(),
            replace_env: false,
            use_shell: false,
            shell: "/bin/sh".to_string(),
            new_session: false,
            redirect_stderr: false,
            stdin: StdinSource::Inherit,
            stdout: StdoutTarget::Pipe,
            line_buffered: true,
            trim: false,
            skip_blank_lines: false,
            timeout: None,
            timeout_signal: "SIGTERM".to_string(),
            buffer_size: 4096,
            props: serde_json::Value::Null,
            ignore_error: false,
        }
    }
}

impl ProcessOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }

    pub fn with_gid(mut self, gid: u32) -> Self {
        self.gid = Some(gid);
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// Start from an empty environment instead of the inherited one
    pub fn with_replace_env(mut self, replace: bool) -> Self {
        self.replace_env = replace;
        self
    }

    pub fn with_shell(mut self, use_shell: bool) -> Self {
        self.use_shell = use_shell;
        self
    }

    pub fn with_shell_path(mut self, shell: &str) -> Self {
        self.shell = shell.to_string();
        self
    }

    pub fn with_new_session(mut self, new_session: bool) -> Self {
        self.new_session = new_session;
        self
    }

    pub fn with_redirect_stderr(mut self, redirect: bool) -> Self {
        self.redirect_stderr = redirect;
        self
    }

    pub fn with_stdin(mut self, stdin: StdinSource) -> Self {
        self.stdin = stdin;
        self
    }

    pub fn with_input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = StdinSource::Input(input.into());
        self
    }

    pub fn with_stdout(mut self, stdout: StdoutTarget) -> Self {
        self.stdout = stdout;
        self
    }

    pub fn with_line_buffered(mut self, line_buffered: bool) -> Self {
        self.line_buffered = line_buffered;
        self
    }

    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    pub fn with_skip_blank_lines(mut self, skip: bool) -> Self {
        self.skip_blank_lines = skip;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_timeout_signal(mut self, signal: &str) -> Self {
        self.timeout_signal = signal.to_string();
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    pub fn with_props(mut self, props: serde_json::Value) -> Self {
        self.props = props;
        self
    }

    pub fn with_ignore_error(mut self, ignore: bool) -> Self {
        self.ignore_error = ignore;
        self
    }

    /// Full argv for `command` under these options
    pub fn argv(&self, command: &CommandLine) -> Vec<String> {
        if self.use_shell {
            vec![
                self.shell.clone(),
                "-c".to_string(),
                command.to_shell_line(),
            ]
        } else {
            command.to_args()
        }
    }

    /// Whether stderr shares the stdout pipe
    pub(crate) fn merges_stderr(&self) -> bool {
        self.stdout.is_pipe() && self.redirect_stderr
    }
}
