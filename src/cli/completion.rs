//! Shell completion
//!
//! The shell wrapper re-invokes the program with `COMP_LINE` and
//! `COMP_POINT` set. The parser detects that and hands the line to
//! `complete`, which prints one candidate per line. Path values are
//! delegated back to the shell through sentinel entries.

use crate::cli::spec::{CompiledSpec, Handler};
use crate::cli::tokenizer::{tokenize, Token};
use crate::env::{is_truthy, Environment};
use crate::validate::Validator;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Entry asking the wrapper for native file completion
pub const PATH_SENTINEL: &str = "@@QEL_PATH@@";
/// Entry asking the wrapper for native directory completion
pub const DIR_SENTINEL: &str = "@QEL_DIR@";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shell {
    #[default]
    Bash,
    Zsh,
}

impl FromStr for Shell {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bash" => Ok(Shell::Bash),
            "zsh" => Ok(Shell::Zsh),
            other => Err(format!("unsupported shell '{}'", other)),
        }
    }
}

/// A completion query from the shell
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub line: String,
    /// Cursor byte offset into `line`
    pub point: usize,
    pub shell: Shell,
    /// Offer alias names next to canonical names
    pub include_aliases: bool,
    /// File receiving appended trace lines
    pub debug_file: Option<PathBuf>,
}

impl CompletionRequest {
    pub fn new(line: &str, point: usize) -> Self {
        CompletionRequest {
            line: line.to_string(),
            point,
            shell: Shell::Bash,
            include_aliases: true,
            debug_file: None,
        }
    }

    pub fn with_shell(mut self, shell: Shell) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_aliases(mut self, include: bool) -> Self {
        self.include_aliases = include;
        self
    }

    pub fn with_debug_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_file = Some(path.into());
        self
    }

    /// Build a request from `COMP_LINE`/`COMP_POINT` and the
    /// `<PREFIX>_COMPLETION_*` variables; `None` outside completion mode
    pub fn from_env(env: &dyn Environment, prefix: &str) -> Option<Self> {
        let line = env.var("COMP_LINE")?;
        let point = env
            .var("COMP_POINT")
            .and_then(|p| p.trim().parse::<usize>().ok())
            .unwrap_or(line.len());
        let shell = env
            .var(&format!("{}_COMPLETION_SHELL", prefix))
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        let include_aliases = is_truthy(
            env.var(&format!("{}_COMPLETION_INCLUDE_ARG_ALIASES", prefix))
                .as_deref(),
            true,
        );
        let debug_file = env
            .var(&format!("{}_COMPLETION_DEBUG", prefix))
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        Some(CompletionRequest {
            line,
            point,
            shell,
            include_aliases,
            debug_file,
        })
    }
}

/// Candidates for the word at the cursor, formatted for the request's shell
pub fn complete(spec: &CompiledSpec, request: &CompletionRequest, env: &dyn Environment) -> Vec<String> {
    let mut point = request.point.min(request.line.len());
    while !request.line.is_char_boundary(point) {
        point -= 1;
    }
    let head = &request.line[..point];
    let tokens = tokenize(head);

    let in_word = match tokens.last() {
        Some(last) => {
            last.unterminated()
                || last.open_subshell
                || !head.ends_with(char::is_whitespace)
                || head.ends_with("\\ ")
        }
        None => false,
    };

    let items = if tokens.last().map(|t| t.open_subshell).unwrap_or(false) {
        Vec::new()
    } else {
        let (done, current) = match (in_word, tokens.split_last()) {
            (true, Some((last, rest))) => (rest, Some(last)),
            _ => (&tokens[..], None),
        };
        // the first word is the program itself
        let done = done.get(1..).unwrap_or(&[]);
        candidates(spec, request, env, done, current)
    };

    debug!(line = %request.line, point, count = items.len(), "completion candidates");
    if let Some(path) = &request.debug_file {
        trace_to_file(path, request, &items);
    }
    items
}

fn candidates(
    spec: &CompiledSpec,
    request: &CompletionRequest,
    env: &dyn Environment,
    done: &[Token],
    current: Option<&Token>,
) -> Vec<String> {
    let word = current.map(|t| t.content.as_str()).unwrap_or("");
    let quote = current.and_then(|t| t.quote);

    // --name=<partial>
    if let Some((name, partial)) = word.split_once('=') {
        if name.starts_with("--") {
            return match spec.handler(name) {
                Some(h) if h.takes_value() => value_candidates(&h.validator, partial, env)
                    .into_iter()
                    .map(|v| {
                        if is_sentinel(&v) {
                            v
                        } else {
                            format!("{}={}", name, v)
                        }
                    })
                    .map(|v| render_value(&v, request.shell, quote))
                    .collect(),
                _ => Vec::new(),
            };
        }
    }

    if let Some(handler) = done.last().and_then(|t| awaiting_value(spec, &t.content)) {
        return value_candidates(&handler.validator, word, env)
            .into_iter()
            .map(|v| render_value(&v, request.shell, quote))
            .collect();
    }

    if current.is_some() && !word.starts_with('-') {
        return Vec::new();
    }

    let used = used_handlers(spec, done);
    let (unused, used): (Vec<&Handler>, Vec<&Handler>) = spec
        .handlers()
        .iter()
        .partition(|h| h.multi || !used.contains(&h.name.as_str()));

    let names_of = |handlers: &[&Handler]| -> Vec<(String, Option<String>)> {
        let mut names = Vec::new();
        for h in handlers {
            let summary = h
                .validator
                .common()
                .description
                .as_ref()
                .and_then(|d| d.lines().next())
                .map(str::to_string);
            names.push((h.name.clone(), summary.clone()));
            if request.include_aliases {
                for alias in &h.aliases {
                    names.push((alias.clone(), summary.clone()));
                }
            }
        }
        names
    };

    let mut matches: Vec<(String, Option<String>)> = names_of(&unused)
        .into_iter()
        .filter(|(n, _)| n.starts_with(word))
        .collect();
    if matches.is_empty() && !word.is_empty() {
        let fallback: Vec<_> = names_of(&used)
            .into_iter()
            .filter(|(n, _)| n.starts_with(word))
            .collect();
        if fallback.len() == 1 {
            matches = fallback;
        }
    }

    matches
        .into_iter()
        .map(|(name, summary)| render_flag(&name, summary.as_deref(), request.shell))
        .collect()
}

/// Handler whose value the next word supplies, if `token` is such a flag
fn awaiting_value<'a>(spec: &'a CompiledSpec, token: &str) -> Option<&'a Handler> {
    if token.contains('=') || token == "--" {
        return None;
    }
    let name = if token.starts_with("--") {
        token.to_string()
    } else if token.len() > 1 && token.starts_with('-') {
        let last = token.chars().last()?;
        format!("-{}", last)
    } else {
        return None;
    };
    spec.handler(&name).filter(|h| h.takes_value())
}

/// Canonical names of options already present on the line
fn used_handlers<'a>(spec: &'a CompiledSpec, done: &[Token]) -> Vec<&'a str> {
    let mut used = Vec::new();
    for token in done {
        let word = token.content.as_str();
        if word == "--" {
            break;
        }
        if word.starts_with("--") {
            let name = word.split_once('=').map(|(n, _)| n).unwrap_or(word);
            if let Some(h) = spec.handler(name).or_else(|| spec.negation(name)) {
                used.push(h.name.as_str());
            }
        } else if word.len() > 1 && word.starts_with('-') {
            for c in word[1..].chars() {
                if let Some(h) = spec.handler(&format!("-{}", c)) {
                    used.push(h.name.as_str());
                }
            }
        }
    }
    used
}

fn value_candidates(validator: &Validator, word: &str, env: &dyn Environment) -> Vec<String> {
    if let Some(values) = validator.enum_values() {
        return values
            .iter()
            .filter(|v| v.starts_with(word))
            .cloned()
            .collect();
    }
    if let Validator::Path(p) = validator {
        let sentinel = if p.is_directory() {
            DIR_SENTINEL
        } else {
            PATH_SENTINEL
        };
        return vec![sentinel.to_string()];
    }
    if let Some(prefix) = word.strip_prefix('$') {
        return env
            .vars()
            .into_iter()
            .map(|(k, _)| k)
            .filter(|k| k.starts_with(prefix))
            .map(|k| format!("${}", k))
            .collect();
    }
    let defaults = || validator.default_completions();
    match &validator.common().completer {
        Some(completer) => completer(word, &defaults),
        None => defaults()
            .into_iter()
            .filter(|v| v.starts_with(word))
            .collect(),
    }
}

fn is_sentinel(item: &str) -> bool {
    item == PATH_SENTINEL || item == DIR_SENTINEL
}

fn render_flag(name: &str, summary: Option<&str>, shell: Shell) -> String {
    match (shell, summary) {
        (Shell::Zsh, Some(summary)) => format!("{}:{}", zsh_escape(name), summary),
        (Shell::Zsh, None) => zsh_escape(name),
        (Shell::Bash, _) => name.to_string(),
    }
}

fn render_value(value: &str, shell: Shell, quote: Option<char>) -> String {
    if is_sentinel(value) {
        return value.to_string();
    }
    match shell {
        Shell::Zsh => zsh_escape(value),
        Shell::Bash if value.contains(' ') => {
            let q = quote.unwrap_or('"');
            format!("{}{}{}", q, value, q)
        }
        Shell::Bash => value.to_string(),
    }
}

fn zsh_escape(item: &str) -> String {
    item.replace(':', "\\:")
}

fn trace_to_file(path: &Path, request: &CompletionRequest, items: &[String]) {
    let file = OpenOptions::new().create(true).append(true).open(path);
    let written = file.and_then(|mut f| {
        writeln!(
            f,
            "line={:?} point={} shell={:?} aliases={}",
            request.line, request.point, request.shell, request.include_aliases
        )?;
        writeln!(f, "completions={:?}", items)
    });
    if let Err(e) = written {
        warn!(path = %path.display(), error = %e, "cannot write completion trace");
    }
}

/// Shell function wiring `program` to its completion mode.
///
/// `prefix` is the parser's environment prefix; the script selects the
/// shell through `<PREFIX>_COMPLETION_SHELL`.
pub fn completion_script(shell: Shell, program: &str, prefix: &str) -> String {
    let func: String = program
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let name = program.rsplit('/').next().unwrap_or(program);
    match shell {
        Shell::Bash => format!(
            r#"# bash completion for {name}
_qel_complete_{func}() {{
    local IFS=$'\n'
    local cur="${{COMP_WORDS[COMP_CWORD]}}"
    local items
    items=$(COMP_LINE="$COMP_LINE" COMP_POINT="$COMP_POINT" {prefix}_COMPLETION_SHELL=bash "${{COMP_WORDS[0]}}" 2>/dev/null)
    if [[ "$items" == "{path}" ]]; then
        COMPREPLY=($(compgen -f -- "$cur"))
    elif [[ "$items" == "{dir}" ]]; then
        COMPREPLY=($(compgen -d -- "$cur"))
    else
        COMPREPLY=($items)
    fi
}}
complete -o default -F _qel_complete_{func} {name}
"#,
            name = name,
            func = func,
            prefix = prefix,
            path = PATH_SENTINEL,
            dir = DIR_SENTINEL,
        ),
        Shell::Zsh => format!(
            r#"#compdef {name}
_qel_complete_{func}() {{
    local -a items
    items=("${{(@f)$(COMP_LINE="$BUFFER" COMP_POINT="$CURSOR" {prefix}_COMPLETION_SHELL=zsh "${{words[1]}}" 2>/dev/null)}}")
    if [[ "${{items[1]}}" == "{path}" ]]; then
        _files
    elif [[ "${{items[1]}}" == "{dir}" ]]; then
        _files -/
    else
        _describe 'values' items
    fi
}}
compdef _qel_complete_{func} {name}
"#,
            name = name,
            func = func,
            prefix = prefix,
            path = PATH_SENTINEL,
            dir = DIR_SENTINEL,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::spec::Spec;
    use crate::env::env_from;
    use crate::validate::{flag, path, string, Builder, Value};
    use std::collections::HashMap;

    fn sample() -> CompiledSpec {
        Spec::new()
            .arg("--cmd", string().one_of(["date", "uptime", "disk usage"]))
            .arg("--out", path())
            .arg("--dir", path().directory(true))
            .arg("--verbose", flag().description("Be chatty: very"))
            .multi("--tag", string())
            .arg("--name", string().default("world"))
            .alias("-v", "--verbose")
            .compile()
            .unwrap()
    }

    fn run(line: &str) -> Vec<String> {
        complete(&sample(), &CompletionRequest::new(line, line.len()), &HashMap::new())
    }

    #[test]
    fn test_enum_values_after_flag() {
        assert_eq!(run("prog --cmd "), vec!["date", "uptime", "\"disk usage\""]);
        assert_eq!(run("prog --cmd up"), vec!["uptime"]);
    }

    #[test]
    fn test_bash_quotes_with_current_quote() {
        assert_eq!(run("prog --cmd 'di"), vec!["'disk usage'"]);
    }

    #[test]
    fn test_path_sentinels() {
        assert_eq!(run("prog --out "), vec![PATH_SENTINEL]);
        assert_eq!(run("prog --dir "), vec![DIR_SENTINEL]);
        assert_eq!(run("prog --out=sr"), vec![PATH_SENTINEL]);
    }

    #[test]
    fn test_env_var_names() {
        let env = env_from([("HOME", "/root"), ("HOSTNAME", "box"), ("PATH", "/bin")]);
        let line = "prog --name $HO";
        let items = complete(&sample(), &CompletionRequest::new(line, line.len()), &env);
        assert_eq!(items, vec!["$HOME", "$HOSTNAME"]);
    }

    #[test]
    fn test_defaults_and_custom_completer() {
        assert_eq!(run("prog --name "), vec!["world"]);

        let spec = Spec::new()
            .arg(
                "--host",
                string().default("localhost").complete(|word, defaults| {
                    let mut items = defaults();
                    items.push(format!("{}.example.org", word));
                    items
                }),
            )
            .compile()
            .unwrap();
        let line = "prog --host db";
        let items = complete(&spec, &CompletionRequest::new(line, line.len()), &HashMap::new());
        assert_eq!(items, vec!["localhost", "db.example.org"]);
    }

    #[test]
    fn test_unused_flags() {
        let items = run("prog --verbose ");
        assert!(!items.contains(&"--verbose".to_string()));
        assert!(!items.contains(&"-v".to_string()));
        assert!(items.contains(&"--cmd".to_string()));

        let items = run("prog --tag a ");
        assert!(items.contains(&"--tag".to_string()));
    }

    #[test]
    fn test_prefix_filter_and_used_fallback() {
        assert_eq!(run("prog --ve"), vec!["--verbose"]);
        assert_eq!(run("prog -v --ve"), vec!["--verbose"]);
        assert!(run("prog --zz").is_empty());
    }

    #[test]
    fn test_aliases_toggle() {
        let line = "prog -";
        let with = complete(&sample(), &CompletionRequest::new(line, line.len()), &HashMap::new());
        assert!(with.contains(&"-v".to_string()));

        let request = CompletionRequest::new(line, line.len()).with_aliases(false);
        let without = complete(&sample(), &request, &HashMap::new());
        assert!(!without.contains(&"-v".to_string()));
    }

    #[test]
    fn test_zsh_descriptions() {
        let line = "prog --verb";
        let request = CompletionRequest::new(line, line.len()).with_shell(Shell::Zsh);
        let items = complete(&sample(), &request, &HashMap::new());
        assert_eq!(items, vec!["--verbose:Be chatty: very"]);
    }

    #[test]
    fn test_inside_subshell_is_empty() {
        assert!(run("prog --name $(ls -").is_empty());
    }

    #[test]
    fn test_cursor_in_middle() {
        let line = "prog --cm --verbose";
        let items = complete(&sample(), &CompletionRequest::new(line, 9), &HashMap::new());
        assert_eq!(items, vec!["--cmd"]);
    }

    #[test]
    fn test_positional_word_has_no_candidates() {
        assert!(run("prog fil").is_empty());
    }

    #[test]
    fn test_from_env() {
        let env = env_from([
            ("COMP_LINE", "prog --v"),
            ("COMP_POINT", "8"),
            ("QEL_COMPLETION_SHELL", "zsh"),
            ("QEL_COMPLETION_INCLUDE_ARG_ALIASES", "0"),
        ]);
        let request = CompletionRequest::from_env(&env, "QEL").unwrap();
        assert_eq!(request.point, 8);
        assert_eq!(request.shell, Shell::Zsh);
        assert!(!request.include_aliases);
        assert!(CompletionRequest::from_env(&HashMap::new(), "QEL").is_none());
    }

    #[test]
    fn test_debug_file_appends() {
        let dir = tempfile::tempdir().unwrap();
        let trace = dir.path().join("trace.log");
        let line = "prog --ve";
        let request = CompletionRequest::new(line, line.len()).with_debug_file(&trace);
        complete(&sample(), &request, &HashMap::new());
        complete(&sample(), &request, &HashMap::new());
        let text = std::fs::read_to_string(&trace).unwrap();
        assert_eq!(text.matches("completions=").count(), 2);
        assert!(text.contains("--verbose"));
    }

    #[test]
    fn test_scripts_mention_sentinels() {
        let bash = completion_script(Shell::Bash, "my-tool", "QEL");
        assert!(bash.contains("complete -o default -F _qel_complete_my_tool my-tool"));
        assert!(bash.contains(PATH_SENTINEL));
        assert!(bash.contains("QEL_COMPLETION_SHELL=bash"));

        let zsh = completion_script(Shell::Zsh, "my-tool", "QEL");
        assert!(zsh.starts_with("#compdef my-tool"));
        assert!(zsh.contains("_files -/"));
    }

    #[test]
    fn test_value_defaults_list() {
        let spec = Spec::new()
            .multi("--lang", string().default(Value::from(vec!["en", "fr"])))
            .compile()
            .unwrap();
        let line = "prog --lang f";
        let items = complete(&spec, &CompletionRequest::new(line, line.len()), &HashMap::new());
        assert_eq!(items, vec!["fr"]);
    }
}
