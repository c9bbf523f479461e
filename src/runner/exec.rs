//! One-shot helpers on top of the supervisor

use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::options::{CommandLine, ProcessOptions};
use crate::runner::process::Process;
use crate::runner::signal::is_alive;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Run `command` and return its buffered stdout.
///
/// A non-zero exit fails with `ExecutionError::Failed` carrying stderr and
/// the final state, unless `ignore_error` is set.
pub fn exec(command: impl Into<CommandLine>, options: ProcessOptions) -> ExecutionResult<String> {
    let ignore_error = options.ignore_error;
    let output = Process::new(command, options)?.run()?;
    if output.state.exit_code == 0 || ignore_error {
        return Ok(output.stdout);
    }
    let message = if output.stderr.is_empty() {
        match &output.state.signal {
            Some(signal) => format!("process killed by {}", signal),
            None => format!("process exited with code {}", output.state.exit_code),
        }
    } else {
        output.stderr
    };
    Err(ExecutionError::Failed {
        message,
        state: Box::new(output.state),
    })
}

/// Block until `pid` no longer exists, probing every `poll`
pub fn waitpid(pid: i32, poll: Duration) {
    debug!(pid, "waiting for process to disappear");
    while is_alive(pid) {
        thread::sleep(poll);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_returns_stdout() {
        let out = exec("echo hi", ProcessOptions::new().with_trim(true)).unwrap();
        assert_eq!(out, "hi");
    }

    #[test]
    fn test_exec_failure_carries_stderr_and_state() {
        let err = exec(
            "echo oops >&2; exit 4",
            ProcessOptions::new().with_shell(true).with_trim(true),
        )
        .unwrap_err();
        match err {
            ExecutionError::Failed { message, state } => {
                assert_eq!(message, "oops");
                assert_eq!(state.exit_code, 4);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_exec_ignore_error() {
        let out = exec(
            "echo partial; exit 1",
            ProcessOptions::new()
                .with_shell(true)
                .with_trim(true)
                .with_ignore_error(true),
        )
        .unwrap();
        assert_eq!(out, "partial");
    }

    #[test]
    fn test_waitpid_returns_for_missing_pid() {
        let child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id() as i32;
        let mut child = child;
        child.wait().unwrap();
        waitpid(pid, Duration::from_millis(10));
    }
}
