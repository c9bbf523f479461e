//! Child-process supervisor
//!
//! One reader thread per pipe and one waiter thread feed a channel; the
//! supervisor thread owns decoding, buffering, event dispatch and the
//! timeout. The exit event fires only after every pipe reached end of
//! stream and the child was reaped.

use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::buffer::{OutputBuffer, StreamDecoder};
use crate::runner::options::{CommandLine, ProcessOptions, StdinSource, StdoutTarget};
use crate::runner::signal::{send_signal, signal_name, signal_number};
use crate::runner::state::{
    EventHandler, EventHandlers, EventKind, ProcessEvent, ProcessOutput, ProcessState, Stream,
};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, warn};

const NOT_FOUND_MESSAGE: &str = "Command not found";

/// A command plus the options and handlers to run it with.
///
/// A `Process` can be spawned any number of times; each run starts from a
/// fresh state.
#[derive(Debug, Clone)]
pub struct Process {
    command: CommandLine,
    options: ProcessOptions,
    handlers: EventHandlers,
}

impl Process {
    pub fn new(command: impl Into<CommandLine>, options: ProcessOptions) -> ExecutionResult<Self> {
        let command = command.into();
        if command.is_empty() {
            return Err(ExecutionError::EmptyCommand);
        }
        Ok(Process {
            command,
            options,
            handlers: EventHandlers::default(),
        })
    }

    pub fn command(&self) -> &CommandLine {
        &self.command
    }

    pub fn options(&self) -> &ProcessOptions {
        &self.options
    }

    /// Receive stdout lines (or chunks); stdout is then not buffered
    pub fn on_stdout<F>(mut self, f: F) -> Self
    where
        F: Fn(&ProcessEvent) + Send + Sync + 'static,
    {
        self.handlers.stdout = Some(Arc::new(f));
        self
    }

    /// Receive stderr lines (or chunks); stderr is then not buffered
    pub fn on_stderr<F>(mut self, f: F) -> Self
    where
        F: Fn(&ProcessEvent) + Send + Sync + 'static,
    {
        self.handlers.stderr = Some(Arc::new(f));
        self
    }

    pub fn on_exit<F>(mut self, f: F) -> Self
    where
        F: Fn(&ProcessEvent) + Send + Sync + 'static,
    {
        self.handlers.exit = Some(Arc::new(f));
        self
    }

    pub fn on_pause<F>(mut self, f: F) -> Self
    where
        F: Fn(&ProcessEvent) + Send + Sync + 'static,
    {
        self.handlers.pause = Some(Arc::new(f));
        self
    }

    pub fn on_resume<F>(mut self, f: F) -> Self
    where
        F: Fn(&ProcessEvent) + Send + Sync + 'static,
    {
        self.handlers.resume = Some(Arc::new(f));
        self
    }

    /// Spawn and block until the child finished
    pub fn run(&self) -> ExecutionResult<ProcessOutput> {
        self.spawn()?.wait()
    }

    /// Spawn the child and start supervising it
    pub fn spawn(&self) -> ExecutionResult<RunningProcess> {
        let opts = &self.options;
        let argv = opts.argv(&self.command);
        let (program, args) = match argv.split_first() {
            Some((program, args)) if !program.is_empty() => (program, args),
            _ => return Err(ExecutionError::EmptyCommand),
        };
        let timeout_signal = match opts.timeout {
            Some(_) => Some(
                signal_number(&opts.timeout_signal)
                    .ok_or_else(|| ExecutionError::UnknownSignal(opts.timeout_signal.clone()))?,
            ),
            None => None,
        };

        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(cwd) = &opts.cwd {
            cmd.current_dir(cwd);
        }
        if opts.replace_env {
            cmd.env_clear();
        }
        cmd.envs(opts.env.iter().map(|(k, v)| (k, v)));
        if let Some(uid) = opts.uid {
            cmd.uid(uid);
        }
        if let Some(gid) = opts.gid {
            cmd.gid(gid);
        }
        if opts.new_session {
            // SAFETY: setsid is async-signal-safe and only affects the child.
            unsafe {
                cmd.pre_exec(|| {
                    if libc::setsid() == -1 {
                        return Err(io::Error::last_os_error());
                    }
                    Ok(())
                });
            }
        } else if opts.timeout.is_some() {
            // the timeout signal must also reach the child's descendants
            cmd.process_group(0);
        }
        cmd.stdin(stdin_stdio(&opts.stdin)?);

        let mut merged = None;
        match &opts.stdout {
            StdoutTarget::Pipe if opts.redirect_stderr => {
                let (reader, writer) = io::pipe().map_err(ExecutionError::Stdio)?;
                let copy = writer.try_clone().map_err(ExecutionError::Stdio)?;
                cmd.stdout(copy);
                cmd.stderr(writer);
                merged = Some(reader);
            }
            StdoutTarget::Pipe => {
                cmd.stdout(Stdio::piped());
                cmd.stderr(Stdio::piped());
            }
            StdoutTarget::Path(path) => {
                cmd.stdout(File::create(path).map_err(ExecutionError::Stdio)?);
                cmd.stderr(Stdio::inherit());
            }
            StdoutTarget::File(file) => {
                cmd.stdout(rewound(file)?);
                cmd.stderr(Stdio::inherit());
            }
        }

        let mut child = cmd.spawn().map_err(|error| ExecutionError::Spawn {
            program: program.clone(),
            error,
        })?;
        // release the parent's copies of the pipe write ends
        drop(cmd);

        let pid = child.id() as i32;
        debug!(pid, argv = ?argv, "spawned process");

        let mut streams: Vec<(Stream, Box<dyn Read + Send>)> = Vec::new();
        if let Some(reader) = merged {
            streams.push((Stream::Stdout, Box::new(reader)));
        }
        if let Some(stdout) = child.stdout.take() {
            streams.push((Stream::Stdout, Box::new(stdout)));
        }
        if let Some(stderr) = child.stderr.take() {
            streams.push((Stream::Stderr, Box::new(stderr)));
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(ProcessState {
                pid,
                running: true,
                ..ProcessState::default()
            }),
            handlers: self.handlers.clone(),
            group: opts.new_session,
            own_group: opts.new_session || opts.timeout.is_some(),
        });

        let (tx, rx) = mpsc::channel();
        let open = streams.len();
        for (stream, reader) in streams {
            let tx = tx.clone();
            let size = opts.buffer_size.max(1);
            thread::spawn(move || pump(stream, reader, size, tx));
        }
        {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                let status = reap(&mut child, &shared);
                let _ = tx.send(Message::Exited(status));
            });
        }

        let supervisor = {
            let shared = Arc::clone(&shared);
            let settings = Settings {
                line_buffered: opts.line_buffered,
                trim: opts.trim,
                skip_blank_lines: opts.skip_blank_lines,
                merged: opts.merges_stderr(),
                timeout: opts.timeout.zip(timeout_signal),
            };
            thread::spawn(move || supervise(rx, shared, settings, open))
        };

        Ok(RunningProcess {
            pid,
            shared,
            supervisor,
        })
    }
}

struct Shared {
    state: Mutex<ProcessState>,
    handlers: EventHandlers,
    /// Signals go to the whole process group
    group: bool,
    /// The child leads its own process group
    own_group: bool,
}

impl Shared {
    fn target(&self, pid: i32) -> i32 {
        if self.group {
            -pid
        } else {
            pid
        }
    }

    fn emit(&self, handler: Option<&EventHandler>, pid: i32, kind: EventKind) {
        if let Some(handler) = handler {
            handler(&ProcessEvent {
                pid,
                timestamp: SystemTime::now(),
                kind,
            });
        }
    }
}

enum Message {
    Chunk {
        stream: Stream,
        bytes: Vec<u8>,
        at: SystemTime,
    },
    Eof(Stream),
    Exited(io::Result<ExitStatus>),
}

struct Settings {
    line_buffered: bool,
    trim: bool,
    skip_blank_lines: bool,
    merged: bool,
    timeout: Option<(Duration, i32)>,
}

fn pump(stream: Stream, mut reader: Box<dyn Read + Send>, size: usize, tx: Sender<Message>) {
    let mut buf = vec![0u8; size];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                let chunk = Message::Chunk {
                    stream,
                    bytes: buf[..n].to_vec(),
                    at: SystemTime::now(),
                };
                if tx.send(chunk).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(?stream, error = %e, "pipe read failed");
                break;
            }
        }
    }
    let _ = tx.send(Message::Eof(stream));
}

/// Wait for termination, mark the state, then collect the status. The
/// pid stays reserved until the final wait, so signals sent while the
/// state still says running never reach a recycled pid.
fn reap(child: &mut Child, shared: &Shared) -> io::Result<ExitStatus> {
    let pid = child.id() as libc::id_t;
    loop {
        // SAFETY: siginfo_t is plain data that waitid fills in.
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::waitid(libc::P_PID, pid, &mut info, libc::WEXITED | libc::WNOWAIT) };
        if rc == 0 || io::Error::last_os_error().kind() != io::ErrorKind::Interrupted {
            break;
        }
    }
    shared.state.lock().running = false;
    child.wait()
}

/// Per-stream decoding and routing
struct Channel {
    stream: Stream,
    decoder: StreamDecoder,
    handler: Option<EventHandler>,
    buffer: OutputBuffer,
    /// Drop blank lines before they reach the handler
    skip_blank_lines: bool,
    saw_data: bool,
}

impl Channel {
    fn new(stream: Stream, handlers: &EventHandlers, settings: &Settings) -> Self {
        let handler = handlers.for_stream(stream).cloned();
        let lines = settings.line_buffered && handler.is_some();
        Channel {
            stream,
            decoder: StreamDecoder::new(lines),
            handler,
            buffer: OutputBuffer::default(),
            skip_blank_lines: lines && settings.skip_blank_lines,
            saw_data: false,
        }
    }

    fn push(&mut self, pid: i32, bytes: &[u8], at: SystemTime) {
        self.saw_data = true;
        for (text, at) in self.decoder.push(bytes, at) {
            self.dispatch(pid, text, at);
        }
    }

    fn finish(&mut self, pid: i32) {
        if let Some((text, at)) = self.decoder.finish(SystemTime::now()) {
            self.dispatch(pid, text, at);
        }
    }

    fn dispatch(&mut self, pid: i32, text: String, at: SystemTime) {
        match &self.handler {
            Some(_) if self.skip_blank_lines && text.trim().is_empty() => {}
            Some(handler) => {
                let kind = match self.stream {
                    Stream::Stdout => EventKind::Stdout(text),
                    Stream::Stderr => EventKind::Stderr(text),
                };
                handler(&ProcessEvent {
                    pid,
                    timestamp: at,
                    kind,
                });
            }
            None => self.buffer.append(&text),
        }
    }
}

fn supervise(rx: Receiver<Message>, shared: Arc<Shared>, settings: Settings, mut open: usize) -> ProcessOutput {
    let pid = shared.state.lock().pid;
    let handlers = shared.handlers.clone();
    let mut stdout = Channel::new(Stream::Stdout, &handlers, &settings);
    let mut stderr = Channel::new(Stream::Stderr, &handlers, &settings);
    let mut deadline = settings
        .timeout
        .map(|(after, signal)| (Instant::now() + after, signal));
    let mut status = None;

    while open > 0 || status.is_none() {
        let message = match deadline {
            Some((at, signal)) => match rx.recv_timeout(at.saturating_duration_since(Instant::now())) {
                Ok(message) => message,
                Err(RecvTimeoutError::Timeout) => {
                    fire_timeout(&shared, pid, signal);
                    deadline = None;
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(message) => message,
                Err(_) => break,
            },
        };

        match message {
            Message::Chunk { stream, bytes, at } => match stream {
                Stream::Stdout => stdout.push(pid, &bytes, at),
                Stream::Stderr => stderr.push(pid, &bytes, at),
            },
            Message::Eof(stream) => {
                match stream {
                    Stream::Stdout => stdout.finish(pid),
                    Stream::Stderr => stderr.finish(pid),
                }
                open = open.saturating_sub(1);
            }
            Message::Exited(result) => status = Some(result),
        }
    }

    let (exit_code, signal) = match status {
        Some(Ok(status)) => match (status.code(), status.signal()) {
            (Some(code), _) => (code, None),
            (None, Some(sig)) => (-sig, Some(signal_name(sig))),
            (None, None) => (-1, None),
        },
        Some(Err(e)) => {
            warn!(pid, error = %e, "failed to reap process");
            (-1, None)
        }
        None => {
            warn!(pid, "process status was never collected");
            (-1, None)
        }
    };

    if exit_code == 127 {
        let carrier = if settings.merged { &mut stdout } else { &mut stderr };
        if !carrier.saw_data {
            carrier.dispatch(pid, NOT_FOUND_MESSAGE.to_string(), SystemTime::now());
        }
    }

    let state = {
        let mut state = shared.state.lock();
        state.exit_code = exit_code;
        state.signal = signal;
        state.running = false;
        state.paused = false;
        state.clone()
    };
    debug!(pid, exit_code, signal = ?state.signal, timed_out = state.did_timeout, "process finished");
    shared.emit(handlers.exit.as_ref(), pid, EventKind::Exit(state.clone()));

    ProcessOutput {
        state,
        stdout: stdout.buffer.finish(settings.skip_blank_lines, settings.trim),
        stderr: stderr.buffer.finish(settings.skip_blank_lines, settings.trim),
    }
}

fn fire_timeout(shared: &Shared, pid: i32, signal: i32) {
    let mut state = shared.state.lock();
    if !state.running {
        return;
    }
    state.did_timeout = true;
    warn!(pid, signal = %signal_name(signal), "process timed out");
    let target = if shared.own_group { -pid } else { pid };
    if state.paused {
        let _ = send_signal(target, libc::SIGCONT);
        state.paused = false;
    }
    if let Err(e) = send_signal(target, signal) {
        warn!(pid, error = %e, "failed to signal timed out process");
    }
}

fn stdin_stdio(source: &StdinSource) -> ExecutionResult<Stdio> {
    Ok(match source {
        StdinSource::Inherit => Stdio::inherit(),
        StdinSource::Null => Stdio::null(),
        StdinSource::Path(path) => File::open(path).map_err(ExecutionError::Stdio)?.into(),
        StdinSource::File(file) => rewound(file)?.into(),
        StdinSource::Input(bytes) => {
            let mut file = tempfile::tempfile().map_err(ExecutionError::Stdio)?;
            file.write_all(bytes).map_err(ExecutionError::Stdio)?;
            file.seek(SeekFrom::Start(0)).map_err(ExecutionError::Stdio)?;
            file.into()
        }
    })
}

fn rewound(file: &File) -> ExecutionResult<File> {
    let mut copy = file.try_clone().map_err(ExecutionError::Stdio)?;
    copy.seek(SeekFrom::Start(0)).map_err(ExecutionError::Stdio)?;
    Ok(copy)
}

/// Handle to a spawned child
pub struct RunningProcess {
    pid: i32,
    shared: Arc<Shared>,
    supervisor: JoinHandle<ProcessOutput>,
}

impl RunningProcess {
    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// Snapshot of the current state
    pub fn state(&self) -> ProcessState {
        self.shared.state.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    pub fn is_paused(&self) -> bool {
        self.shared.state.lock().paused
    }

    /// Stop the child with SIGSTOP
    pub fn pause(&self) -> ExecutionResult<()> {
        {
            let mut state = self.shared.state.lock();
            if !state.running {
                return Err(ExecutionError::NotRunning);
            }
            if state.paused {
                return Ok(());
            }
            self.signal(libc::SIGSTOP)?;
            state.paused = true;
        }
        self.shared
            .emit(self.shared.handlers.pause.as_ref(), self.pid, EventKind::Pause);
        Ok(())
    }

    /// Continue a paused child with SIGCONT
    pub fn resume(&self) -> ExecutionResult<()> {
        {
            let mut state = self.shared.state.lock();
            if !state.running {
                return Err(ExecutionError::NotRunning);
            }
            if !state.paused {
                return Ok(());
            }
            self.signal(libc::SIGCONT)?;
            state.paused = false;
        }
        self.shared
            .emit(self.shared.handlers.resume.as_ref(), self.pid, EventKind::Resume);
        Ok(())
    }

    /// Send a signal by name (`SIGTERM`, `KILL`, `9`); a paused child is
    /// resumed first so the signal can be delivered
    pub fn kill(&self, signal: &str) -> ExecutionResult<()> {
        let number =
            signal_number(signal).ok_or_else(|| ExecutionError::UnknownSignal(signal.to_string()))?;
        let resumed = {
            let mut state = self.shared.state.lock();
            if !state.running {
                return Err(ExecutionError::NotRunning);
            }
            let resumed = state.paused;
            if resumed {
                self.signal(libc::SIGCONT)?;
                state.paused = false;
            }
            debug!(pid = self.pid, signal = %signal_name(number), "killing process");
            self.signal(number)?;
            resumed
        };
        if resumed {
            self.shared
                .emit(self.shared.handlers.resume.as_ref(), self.pid, EventKind::Resume);
        }
        Ok(())
    }

    /// `kill("SIGTERM")`
    pub fn terminate(&self) -> ExecutionResult<()> {
        self.kill("SIGTERM")
    }

    /// Block until the exit event was delivered
    pub fn wait(self) -> ExecutionResult<ProcessOutput> {
        self.supervisor.join().map_err(|_| ExecutionError::Supervisor)
    }

    fn signal(&self, signal: i32) -> ExecutionResult<()> {
        send_signal(self.shared.target(self.pid), signal).map_err(|error| ExecutionError::Signal {
            pid: self.pid,
            signal: signal_name(signal),
            error,
        })
    }
}
