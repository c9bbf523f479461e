//! Main CLI application

use crate::cli::completion::{completion_script, Shell};
use crate::cli::parser::{Outcome, Parser, ParserOptions};
use crate::cli::result::ParseResult;
use crate::cli::spec::Spec;
use crate::config::{find_config_file, load_parser};
use crate::env::{Environment, ProcessEnv};
use crate::runner::{signal_number, CommandLine, Process, ProcessEvent, ProcessOptions};
use crate::validate::{flag, number, path, string, Builder, Flow};
use anyhow::{anyhow, Context as _};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const TOP_HELP: &str = "\
Declarative argument parsing, shell completion and process supervision

Usage: qel <COMMAND> [OPTIONS] [-- ARGS...]

Commands:
  parse         Parse ARGS against a qel.yml definition and print JSON
  exec          Run a command under supervision
  completion    Print the shell completion wrapper for a program

Run 'qel <COMMAND> --help' for the options of a command.
";

/// Subcommands of the `qel` binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Parse,
    Exec,
    Completion,
}

impl Command {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "parse" => Some(Command::Parse),
            "exec" => Some(Command::Exec),
            "completion" => Some(Command::Completion),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Command::Parse => "parse",
            Command::Exec => "exec",
            Command::Completion => "completion",
        }
    }

    /// Parser for the subcommand's own options
    fn parser(&self) -> anyhow::Result<Parser> {
        let (spec, description) = match self {
            Command::Parse => (
                Spec::new()
                    .arg(
                        "--file",
                        path()
                            .check(true)
                            .value_text("FILE")
                            .description("Definition file (default: qel.yml searched upwards)"),
                    )
                    .alias("-f", "--file"),
                "Parse ARGS against a definition and print the result as JSON",
            ),
            Command::Exec => (
                Spec::new()
                    .arg("--shell", flag().description("Run the command line through /bin/sh"))
                    .arg(
                        "--timeout",
                        number()
                            .positive(true)
                            .value_text("SECS")
                            .description("Signal the command after this many seconds"),
                    )
                    .arg(
                        "--signal",
                        string()
                            .default("SIGTERM")
                            .value_text("NAME")
                            .description("Signal sent on timeout")
                            .custom(|v| match v.as_str().and_then(signal_number) {
                                Some(_) => Ok(Flow::Continue),
                                None => Err("it is not a known signal".to_string()),
                            }),
                    )
                    .arg("--trim", flag().description("Trim whitespace around each output line"))
                    .arg("--skip-blank-lines", flag().description("Drop blank output lines"))
                    .arg("--merge-stderr", flag().description("Send stderr into stdout"))
                    .arg("--new-session", flag().description("Start the command in a new session"))
                    .arg(
                        "--cwd",
                        path()
                            .directory(true)
                            .check(true)
                            .description("Working directory"),
                    )
                    .arg(
                        "--input",
                        string().value_text("TEXT").description("Text written to stdin"),
                    ),
                "Run CMD under supervision and exit with its exit code",
            ),
            Command::Completion => (
                Spec::new().arg(
                    "--prefix",
                    string()
                        .default("QEL")
                        .value_text("PREFIX")
                        .description("Environment prefix of the program's parser"),
                ),
                "Print the bash or zsh completion wrapper for PROGRAM",
            ),
        };
        let options = ParserOptions::new()
            .with_script_name(&format!("qel {}", self.name()))
            .with_description(description)
            .with_stop_at_positional(true);
        Ok(Parser::new(&spec, options)?)
    }
}

/// CLI application
pub struct App {
    command: Command,
    args: Vec<String>,
}

impl App {
    /// Split `argv` (program name excluded) into a subcommand and its arguments.
    ///
    /// Returns the exit code instead when the arguments only ask for help or
    /// the version, or name no known subcommand.
    pub fn from_args(argv: &[String], err: &mut dyn Write) -> Result<Self, i32> {
        let Some(first) = argv.first() else {
            let _ = write!(err, "{}", TOP_HELP);
            return Err(2);
        };
        match first.as_str() {
            "-h" | "--help" | "help" => {
                print!("{}", TOP_HELP);
                Err(0)
            }
            "-V" | "--version" => {
                println!("qel {}", crate::VERSION);
                Err(0)
            }
            name => match Command::from_name(name) {
                Some(command) => Ok(App {
                    command,
                    args: argv[1..].to_vec(),
                }),
                None => {
                    let _ = writeln!(err, "Unknown command '{}'\n", name);
                    let _ = write!(err, "{}", TOP_HELP);
                    Err(2)
                }
            },
        }
    }

    pub fn command(&self) -> Command {
        self.command
    }

    /// Run the application, returning the process exit code
    pub fn run(self, env: &dyn Environment) -> anyhow::Result<i32> {
        let parser = self.command.parser()?;
        let stdout = io::stdout();
        let stderr = io::stderr();
        let mut out = stdout.lock();
        let mut err = stderr.lock();

        // Completion variables belong to the wrapped definition, not to
        // qel's own options.
        let own_env: HashMap<String, String> = HashMap::new();
        let result = match parser.run_from(&self.args, &own_env, &mut out, &mut err)? {
            Outcome::Parsed(result) => result,
            Outcome::Exit(code) => return Ok(code),
        };
        debug!(command = self.command.name(), "dispatching");

        match self.command {
            Command::Parse => run_parse(&result, env, &mut out, &mut err),
            Command::Exec => {
                drop(out);
                drop(err);
                run_exec(&parser, &result)
            }
            Command::Completion => run_completion(&parser, &result, &mut out, &mut err),
        }
    }
}

fn run_parse(
    result: &ParseResult,
    env: &dyn Environment,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> anyhow::Result<i32> {
    let file = match result.str("--file") {
        Some(file) => PathBuf::from(file),
        None => find_config_file()?,
    };
    debug!(file = %file.display(), "loading definition");
    let parser = load_parser(&file)?;

    match parser.run_from(result.positionals(), env, out, err)? {
        Outcome::Parsed(parsed) => {
            writeln!(out, "{}", serde_json::to_string(&parsed)?)?;
            Ok(0)
        }
        Outcome::Exit(code) => Ok(code),
    }
}

fn run_exec(parser: &Parser, result: &ParseResult) -> anyhow::Result<i32> {
    let words = result.positionals();
    if words.is_empty() {
        parser.usage(Some("a command is required"));
        return Ok(2);
    }

    let use_shell = result.flag("--shell");
    let command: CommandLine = if use_shell {
        words.join(" ").into()
    } else {
        words.to_vec().into()
    };

    let signal = result.str("--signal").unwrap_or("SIGTERM");
    let mut options = ProcessOptions::new()
        .with_shell(use_shell)
        .with_skip_blank_lines(result.flag("--skip-blank-lines"))
        .with_redirect_stderr(result.flag("--merge-stderr"))
        .with_new_session(result.flag("--new-session"))
        .with_timeout_signal(signal);
    if let Some(secs) = result.num("--timeout") {
        options = options.with_timeout(Duration::from_secs_f64(secs));
    }
    if let Some(cwd) = result.str("--cwd") {
        options = options.with_cwd(cwd);
    }
    if let Some(input) = result.str("--input") {
        options = options.with_input(input.as_bytes().to_vec());
    }

    // blank lines are dropped by the supervisor; trimming is per line here
    let trim = result.flag("--trim");
    let output = Process::new(command, options)?
        .on_stdout(move |e: &ProcessEvent| {
            if let Some(line) = e.data() {
                let _ = writeln!(io::stdout().lock(), "{}", trimmed(line, trim));
            }
        })
        .on_stderr(move |e: &ProcessEvent| {
            if let Some(line) = e.data() {
                let _ = writeln!(io::stderr().lock(), "{}", trimmed(line, trim));
            }
        })
        .run()
        .context("failed to run command")?;

    let state = output.state;
    debug!(exit_code = state.exit_code, signal = ?state.signal, "command finished");
    Ok(match state.signal.as_deref().and_then(signal_number) {
        Some(number) => 128 + number,
        None => state.exit_code,
    })
}

fn trimmed(line: &str, trim: bool) -> &str {
    if trim {
        line.trim()
    } else {
        line
    }
}

fn run_completion(
    parser: &Parser,
    result: &ParseResult,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> anyhow::Result<i32> {
    let (shell, program) = match result.positionals() {
        [shell, program] => (shell, program),
        _ => {
            let _ = write!(err, "{}", parser.get_usage(Some("expected SHELL and PROGRAM")));
            return Ok(2);
        }
    };
    let shell: Shell = shell.parse().map_err(|e: String| anyhow!(e))?;
    let prefix = result.str("--prefix").unwrap_or("QEL");
    write!(out, "{}", completion_script(shell, program, prefix))?;
    Ok(0)
}

/// Run the CLI application with the process arguments
pub fn run() -> anyhow::Result<i32> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let app = match App::from_args(&argv, &mut io::stderr()) {
        Ok(app) => app,
        Err(code) => return Ok(code),
    };
    app.run(&ProcessEnv)
}
