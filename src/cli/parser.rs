//! Argument parser
//!
//! `Parser::parse_with_env` is the pure parsing step. `Parser::run_from`
//! adds the short-circuit modes (completion, describe-usage, help,
//! version) and usage-on-error handling, and reports through `Outcome`
//! whether the caller should continue or exit with a code.

use crate::cli::completion::{self, CompletionRequest};
use crate::cli::result::ParseResult;
use crate::cli::spec::{CompiledSpec, Handler, Spec};
use crate::cli::usage::{describe, UsageDescriptor, UsageOptions, UsageRenderer};
use crate::env::{Environment, ProcessEnv};
use crate::error::{ArgsError, ArgsResult, ConfigResult, QelError};
use crate::validate::{looks_numeric, Value};
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Hook invoked with the result of a successful `run`
pub type AfterParse = Arc<dyn Fn(&ParseResult) + Send + Sync>;

/// Parser settings
#[derive(Clone)]
pub struct ParserOptions {
    /// Collect unknown options in `_` instead of failing
    pub permissive: bool,
    /// Treat everything after the first positional as positional
    pub stop_at_positional: bool,
    pub help_flags: Vec<String>,
    pub version_flags: Vec<String>,
    pub version: Option<String>,
    pub script_name: Option<String>,
    pub description: Option<String>,
    pub examples: Vec<String>,
    /// Prefix of the `<PREFIX>_COMPLETION_*`, `<PREFIX>_DESCRIBE_USAGE` and
    /// `<PREFIX>_SCRIPT_NAME` variables
    pub env_prefix: String,
    pub usage: UsageOptions,
    pub after_parse: Option<AfterParse>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            permissive: false,
            stop_at_positional: false,
            help_flags: vec!["--help".to_string(), "-h".to_string()],
            version_flags: vec!["--version".to_string()],
            version: None,
            script_name: None,
            description: None,
            examples: Vec::new(),
            env_prefix: "QEL".to_string(),
            usage: UsageOptions::default(),
            after_parse: None,
        }
    }
}

impl fmt::Debug for ParserOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserOptions")
            .field("permissive", &self.permissive)
            .field("stop_at_positional", &self.stop_at_positional)
            .field("help_flags", &self.help_flags)
            .field("version_flags", &self.version_flags)
            .field("version", &self.version)
            .field("script_name", &self.script_name)
            .field("env_prefix", &self.env_prefix)
            .field("usage", &self.usage)
            .finish()
    }
}

impl ParserOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_permissive(mut self, permissive: bool) -> Self {
        self.permissive = permissive;
        self
    }

    pub fn with_stop_at_positional(mut self, stop: bool) -> Self {
        self.stop_at_positional = stop;
        self
    }

    pub fn with_help_flags(mut self, flags: &[&str]) -> Self {
        self.help_flags = flags.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    pub fn with_version_flags(mut self, flags: &[&str]) -> Self {
        self.version_flags = flags.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_script_name(mut self, name: &str) -> Self {
        self.script_name = Some(name.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_examples(mut self, examples: Vec<String>) -> Self {
        self.examples = examples;
        self
    }

    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    pub fn with_usage(mut self, usage: UsageOptions) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_after_parse<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ParseResult) + Send + Sync + 'static,
    {
        self.after_parse = Some(Arc::new(hook));
        self
    }
}

/// What the caller should do after `run`
#[derive(Debug)]
pub enum Outcome {
    /// Arguments parsed; continue with the program
    Parsed(ParseResult),
    /// Help, version, completion or a usage error was handled; exit with
    /// this code
    Exit(i32),
}

/// Parser bound to a compiled specification
pub struct Parser {
    spec: CompiledSpec,
    aliases: Arc<HashMap<String, String>>,
    options: ParserOptions,
}

impl Parser {
    /// Compile `spec`; construction errors surface here
    pub fn new(spec: &Spec, options: ParserOptions) -> ConfigResult<Self> {
        let spec = spec.compile()?;
        let aliases = Arc::new(spec.aliases().clone());
        Ok(Parser {
            spec,
            aliases,
            options,
        })
    }

    pub fn spec(&self) -> &CompiledSpec {
        &self.spec
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Parse against the process environment
    pub fn parse<I, S>(&self, argv: I) -> ArgsResult<ParseResult>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
        self.parse_with_env(&argv, &ProcessEnv)
    }

    /// Parse `argv` (program name excluded)
    pub fn parse_with_env(&self, argv: &[String], env: &dyn Environment) -> ArgsResult<ParseResult> {
        debug!(args = argv.len(), "parsing arguments");
        let mut result = ParseResult::new(Arc::clone(&self.aliases));
        let mut options_done = false;
        let mut i = 0;

        while i < argv.len() {
            let token = &argv[i];
            i += 1;

            if options_done {
                result.push_positional(token.clone());
                continue;
            }

            if token == "--" {
                options_done = true;
                continue;
            }

            if let Some(body) = token.strip_prefix("--") {
                let (name, inline) = match body.split_once('=') {
                    Some((n, v)) => (format!("--{}", n), Some(v)),
                    None => (token.clone(), None),
                };

                if let Some(handler) = self.spec.handler(&name) {
                    let raw = if handler.takes_value() {
                        match inline {
                            Some(v) => v.to_string(),
                            None => take_value(argv, &mut i, handler)
                                .ok_or_else(|| ArgsError::MissingValueForLongOption(name.clone()))?,
                        }
                    } else {
                        inline.unwrap_or("true").to_string()
                    };
                    self.apply(&mut result, handler, &raw, env)?;
                } else if let (Some(handler), None) = (self.spec.negation(&name), inline) {
                    self.apply(&mut result, handler, "false", env)?;
                } else {
                    self.unknown(&mut result, token, &name)?;
                }
                continue;
            }

            if token.len() > 1 && token.starts_with('-') {
                let shorts: Vec<char> = token[1..].chars().collect();
                let first = format!("-{}", shorts[0]);
                if looks_numeric(token) && self.spec.handler(&first).is_none() {
                    result.push_positional(token.clone());
                    if self.options.stop_at_positional {
                        options_done = true;
                    }
                    continue;
                }

                let unknown = shorts
                    .iter()
                    .map(|c| format!("-{}", c))
                    .find(|n| self.spec.handler(n).is_none());
                if let Some(name) = unknown {
                    self.unknown(&mut result, token, &name)?;
                    continue;
                }

                for (j, c) in shorts.iter().enumerate() {
                    let name = format!("-{}", c);
                    let Some(handler) = self.spec.handler(&name) else {
                        continue;
                    };
                    if handler.takes_value() {
                        if j + 1 != shorts.len() {
                            return Err(ArgsError::MissingRequiredValue(name));
                        }
                        let raw = take_value(argv, &mut i, handler)
                            .ok_or_else(|| ArgsError::MissingRequiredValue(name.clone()))?;
                        self.apply(&mut result, handler, &raw, env)?;
                    } else {
                        self.apply(&mut result, handler, "true", env)?;
                    }
                }
                continue;
            }

            result.push_positional(token.clone());
            if self.options.stop_at_positional {
                options_done = true;
            }
        }

        self.finish(&mut result, env)?;
        Ok(result)
    }

    fn unknown(&self, result: &mut ParseResult, token: &str, name: &str) -> ArgsResult<()> {
        if self.options.permissive {
            debug!(token, "passing unknown option through");
            result.push_positional(token.to_string());
            Ok(())
        } else {
            Err(ArgsError::UnknownOption(name.to_string()))
        }
    }

    fn apply(
        &self,
        result: &mut ParseResult,
        handler: &Handler,
        raw: &str,
        env: &dyn Environment,
    ) -> ArgsResult<()> {
        let Some(value) = handler.validator.validate(Some(raw), &handler.name, env)? else {
            return Ok(());
        };
        if accumulates(handler) {
            match result.slot_mut(&handler.name) {
                Some(Value::List(items)) => items.push(value),
                _ => result.set(&handler.name, Value::List(vec![value])),
            }
        } else {
            result.set(&handler.name, value);
        }
        Ok(())
    }

    /// Materialize defaults and environment values, enforce required
    /// options and fold count-mode flags
    fn finish(&self, result: &mut ParseResult, env: &dyn Environment) -> ArgsResult<()> {
        for handler in self.spec.handlers() {
            let name = handler.name.as_str();
            if !result.has(name) {
                if let Some(value) = handler.validator.validate(None, name, env)? {
                    let value = match value {
                        Value::List(items) => Value::List(items),
                        other if accumulates(handler) => Value::List(vec![other]),
                        other => other,
                    };
                    result.set(name, value);
                }
            }

            if handler.validator.is_count() {
                if let Some(value) = result.get(name) {
                    let count = count_of(value);
                    let mapped = handler.validator.map_value(Value::Number(count), name)?;
                    result.set(name, mapped);
                }
            }

            if result.get(name).map(Value::is_empty_list).unwrap_or(false) {
                result.remove(name);
            }
        }
        Ok(())
    }

    /// Parse `std::env::args()` against the process environment, writing
    /// help, completions and diagnostics to stdout/stderr
    pub fn run(&self) -> Result<Outcome, QelError> {
        let argv: Vec<String> = std::env::args().skip(1).collect();
        let stdout = io::stdout();
        let stderr = io::stderr();
        self.run_from(&argv, &ProcessEnv, &mut stdout.lock(), &mut stderr.lock())
    }

    /// Full entry point with explicit arguments, environment and streams.
    ///
    /// Returns `Err` for parse errors when usage printing is disabled, and
    /// when writing to `out` or `err` fails.
    pub fn run_from(
        &self,
        argv: &[String],
        env: &dyn Environment,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<Outcome, QelError> {
        if let Some(request) = CompletionRequest::from_env(env, &self.options.env_prefix) {
            debug!(line = %request.line, point = request.point, "completion mode");
            for item in completion::complete(&self.spec, &request, env) {
                writeln!(out, "{}", item)?;
            }
            return Ok(Outcome::Exit(0));
        }

        let describe_var = format!("{}_DESCRIBE_USAGE", self.options.env_prefix);
        if env.var(&describe_var).is_some() || env.var("DESCRIBE_USAGE").is_some() {
            let json = serde_json::to_string(&self.describe_usage())?;
            writeln!(out, "{}", json)?;
            return Ok(Outcome::Exit(0));
        }

        let before_end: Vec<&String> = argv.iter().take_while(|a| *a != "--").collect();
        if before_end.iter().any(|a| self.options.help_flags.contains(*a)) {
            write!(out, "{}", self.help_text(env))?;
            return Ok(Outcome::Exit(0));
        }
        if let Some(version) = &self.options.version {
            if before_end.iter().any(|a| self.options.version_flags.contains(*a)) {
                writeln!(out, "{}", version)?;
                return Ok(Outcome::Exit(0));
            }
        }

        match self.parse_with_env(argv, env) {
            Ok(result) => {
                if let Some(hook) = &self.options.after_parse {
                    hook(&result);
                }
                Ok(Outcome::Parsed(result))
            }
            Err(e) if self.options.usage.enabled => {
                debug!(code = e.code(), "usage error");
                write!(err, "{}", self.usage_text(Some(&e.to_string()), env))?;
                Ok(Outcome::Exit(2))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Script name: explicit option, `<PREFIX>_SCRIPT_NAME`, then argv[0]
    pub fn script_name(&self, env: &dyn Environment) -> String {
        if let Some(name) = &self.options.script_name {
            return name.clone();
        }
        if let Some(name) = env.var(&format!("{}_SCRIPT_NAME", self.options.env_prefix)) {
            return name;
        }
        std::env::args()
            .next()
            .and_then(|arg0| {
                Path::new(&arg0)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "script".to_string())
    }

    fn usage_text(&self, error: Option<&str>, env: &dyn Environment) -> String {
        let name = self.script_name(env);
        UsageRenderer::new(&self.spec, &self.options.usage, &name).usage(error)
    }

    fn help_text(&self, env: &dyn Environment) -> String {
        let name = self.script_name(env);
        UsageRenderer::new(&self.spec, &self.options.usage, &name)
            .help(self.options.description.as_deref(), &self.options.examples)
    }

    /// Usage block, with a leading diagnostic when `error` is given
    pub fn get_usage(&self, error: Option<&str>) -> String {
        self.usage_text(error, &ProcessEnv)
    }

    pub fn get_help(&self) -> String {
        self.help_text(&ProcessEnv)
    }

    /// Print usage to stderr
    pub fn usage(&self, error: Option<&str>) {
        eprint!("{}", self.get_usage(error));
    }

    /// Print help to stdout
    pub fn help(&self) {
        print!("{}", self.get_help());
    }

    pub fn describe_usage(&self) -> Vec<UsageDescriptor> {
        describe(&self.spec)
    }
}

fn accumulates(handler: &Handler) -> bool {
    handler.multi || handler.validator.is_count()
}

/// Count-mode total: affirmative occurrences only
fn count_of(value: &Value) -> f64 {
    match value {
        Value::List(items) => items.iter().map(count_of).sum(),
        Value::Bool(true) => 1.0,
        Value::Number(n) => *n,
        _ => 0.0,
    }
}

/// Consume the next token as a value unless it looks like another option.
/// Numeric handlers may take negative numbers.
fn take_value(argv: &[String], i: &mut usize, handler: &Handler) -> Option<String> {
    let next = argv.get(*i)?;
    let is_option = next.len() > 1 && next.starts_with('-');
    if is_option && !(handler.validator.is_number() && looks_numeric(next)) {
        return None;
    }
    *i += 1;
    Some(next.clone())
}
