//! Usage and help rendering
//!
//! Each option becomes a name column (names, placeholder, `(+)` for
//! multi-valued, `(*)` for required) and a description column wrapped to
//! the usage width, followed by bullet annotations.

use crate::cli::spec::{CompiledSpec, Handler};
use crate::validate::Value;
use serde::Serialize;

/// Usage rendering settings
#[derive(Debug, Clone)]
pub struct UsageOptions {
    /// Print the diagnostic and usage on parse errors and exit 2
    pub enabled: bool,
    /// Maximum line length
    pub max_length: usize,
    /// Indent before option names
    pub indent: usize,
    /// Spaces between the name column and the description column
    pub gap: usize,
    /// Shrink `max_length` to the terminal width when stderr is a TTY
    pub detect_width: bool,
}

impl Default for UsageOptions {
    fn default() -> Self {
        UsageOptions {
            enabled: true,
            max_length: 100,
            indent: 2,
            gap: 4,
            detect_width: true,
        }
    }
}

/// Machine-readable description of one option
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub value_text: String,
    #[serde(rename = "enum")]
    pub enum_values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub required: bool,
    pub multiple: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    pub aliases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    pub negatable: bool,
}

impl UsageDescriptor {
    pub fn from_handler(handler: &Handler) -> Self {
        let v = &handler.validator;
        let common = v.common();
        UsageDescriptor {
            name: handler.name.clone(),
            kind: v.type_tag().as_str().to_string(),
            default: common.default.clone(),
            value_text: v.value_label(),
            enum_values: v.enum_values().map(<[String]>::to_vec).unwrap_or_default(),
            format: v.format_name().map(str::to_string),
            required: common.required,
            multiple: handler.multi,
            env: common.env.clone(),
            aliases: handler.aliases.clone(),
            description: common.description.clone(),
            short_description: common
                .description
                .as_ref()
                .and_then(|d| d.lines().next())
                .map(str::to_string),
            negatable: v.negatable(),
        }
    }
}

/// Describe every option of a compiled spec
pub fn describe(spec: &CompiledSpec) -> Vec<UsageDescriptor> {
    spec.handlers()
        .iter()
        .map(UsageDescriptor::from_handler)
        .collect()
}

/// Renders usage blocks for one parser
pub struct UsageRenderer<'a> {
    spec: &'a CompiledSpec,
    options: &'a UsageOptions,
    script_name: &'a str,
}

impl<'a> UsageRenderer<'a> {
    pub fn new(spec: &'a CompiledSpec, options: &'a UsageOptions, script_name: &'a str) -> Self {
        UsageRenderer {
            spec,
            options,
            script_name,
        }
    }

    /// Effective line length after terminal-width detection
    pub fn width(&self) -> usize {
        let configured = self.options.max_length;
        if !self.options.detect_width {
            return configured;
        }
        match stderr_columns() {
            Some(cols) if cols < configured => cols,
            _ => configured,
        }
    }

    /// Usage block, preceded by a diagnostic line when `error` is given
    pub fn usage(&self, error: Option<&str>) -> String {
        self.usage_with_width(error, self.width())
    }

    pub fn usage_with_width(&self, error: Option<&str>, width: usize) -> String {
        let mut out = String::new();
        if let Some(error) = error {
            out.push_str(&format!("Error: {}\n\n", error));
        }
        out.push_str(&format!("Usage: {} [options]\n", self.script_name));
        let options = self.option_lines(width);
        if !options.is_empty() {
            out.push_str("\nOptions:\n");
            for line in options {
                out.push_str(&line);
                out.push('\n');
            }
        }
        out
    }

    /// Description, usage block and examples
    pub fn help(&self, description: Option<&str>, examples: &[String]) -> String {
        self.help_with_width(description, examples, self.width())
    }

    pub fn help_with_width(
        &self,
        description: Option<&str>,
        examples: &[String],
        width: usize,
    ) -> String {
        let mut out = String::new();
        if let Some(description) = description {
            for line in wrap(description, width) {
                out.push_str(&line);
                out.push('\n');
            }
            out.push('\n');
        }
        out.push_str(&self.usage_with_width(None, width));
        if !examples.is_empty() {
            out.push_str("\nEXAMPLES:\n");
            let pad = " ".repeat(self.options.indent);
            for example in examples {
                out.push_str(&pad);
                out.push_str(example);
                out.push('\n');
            }
        }
        out
    }

    fn option_lines(&self, width: usize) -> Vec<String> {
        let heads: Vec<String> = self
            .spec
            .handlers()
            .iter()
            .map(|h| self.name_column(h))
            .collect();
        let longest = heads.iter().map(|h| h.chars().count()).max().unwrap_or(0);
        let column = longest + self.options.gap;
        let available = width.saturating_sub(column).max(20);

        let mut lines = Vec::new();
        for (handler, head) in self.spec.handlers().iter().zip(heads) {
            let mut body = Vec::new();
            if let Some(description) = &handler.validator.common().description {
                body.extend(wrap(description, available));
            }
            for note in annotations(handler) {
                let wrapped = wrap(&note, available.saturating_sub(2).max(10));
                for (i, part) in wrapped.into_iter().enumerate() {
                    body.push(if i == 0 {
                        format!("- {}", part)
                    } else {
                        format!("  {}", part)
                    });
                }
            }

            let mut body = body.into_iter();
            match body.next() {
                Some(first) => lines.push(format!("{:<column$}{}", head, first, column = column)),
                None => lines.push(head),
            }
            for rest in body {
                lines.push(format!("{}{}", " ".repeat(column), rest));
            }
        }
        lines
    }

    fn name_column(&self, handler: &Handler) -> String {
        let negatable = handler.validator.negatable();
        let names: Vec<String> = handler
            .names()
            .into_iter()
            .map(|name| match name.strip_prefix("--") {
                Some(rest) if negatable => format!("--(no-){}", rest),
                _ => name.to_string(),
            })
            .collect();

        let mut head = format!("{}{}", " ".repeat(self.options.indent), names.join(", "));
        if handler.takes_value() {
            head.push(' ');
            head.push_str(&handler.validator.value_label());
        }
        if handler.multi {
            head.push_str(" (+)");
        }
        if handler.validator.common().required {
            head.push_str(" (*)");
        }
        head
    }
}

fn annotations(handler: &Handler) -> Vec<String> {
    let mut notes = Vec::new();
    if let Some(values) = handler.validator.enum_values() {
        notes.push(format!("it can be one of [{}]", values.join(", ")));
    }
    if handler.multi {
        notes.push("it can be set multiple times".to_string());
    }
    if let Some(env) = &handler.validator.common().env {
        notes.push(format!("it can be passed as '{}' environment variable", env));
    }
    notes
}

/// Word-wrap `text` to `width` columns, keeping explicit line breaks
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let needed = if line.is_empty() {
                word.chars().count()
            } else {
                line.chars().count() + 1 + word.chars().count()
            };
            if needed > width && !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        lines.push(line);
    }
    lines
}

/// Columns of the terminal attached to stderr, if any
pub fn stderr_columns() -> Option<usize> {
    // SAFETY: isatty and TIOCGWINSZ only read the descriptor state into a
    // zeroed winsize owned by this frame.
    unsafe {
        if libc::isatty(libc::STDERR_FILENO) != 1 {
            return None;
        }
        let mut ws: libc::winsize = std::mem::zeroed();
        if libc::ioctl(libc::STDERR_FILENO, libc::TIOCGWINSZ, &mut ws) == 0 && ws.ws_col > 0 {
            Some(ws.ws_col as usize)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::spec::Spec;
    use crate::validate::{flag, number, path, string, Builder};

    fn sample() -> CompiledSpec {
        Spec::new()
            .arg(
                "--email",
                string().format("email").required().description("Where to send the report"),
            )
            .alias("-e", "--email")
            .arg("--verbose", flag().description("Be chatty"))
            .multi("--tag", string().one_of(["a", "b"]))
            .arg("--out", path().env("OUT_FILE"))
            .arg("--retries", number().default(3.0))
            .compile()
            .unwrap()
    }

    fn fixed() -> UsageOptions {
        UsageOptions {
            detect_width: false,
            ..UsageOptions::default()
        }
    }

    #[test]
    fn test_name_column() {
        let spec = sample();
        let options = fixed();
        let text = UsageRenderer::new(&spec, &options, "report").usage(None);
        assert!(text.starts_with("Usage: report [options]\n"));
        assert!(text.contains("  -e, --email EMAIL (*)"));
        assert!(text.contains("  --(no-)verbose"));
        assert!(text.contains("  --tag VAL (+)"));
        assert!(text.contains("  --out FILE"));
        assert!(text.contains("  --retries NUM"));
    }

    #[test]
    fn test_descriptions_align_and_annotate() {
        let spec = sample();
        let options = fixed();
        let text = UsageRenderer::new(&spec, &options, "report").usage(None);
        let email = text.lines().find(|l| l.contains("--email")).unwrap();
        let verbose = text.lines().find(|l| l.contains("verbose")).unwrap();
        assert_eq!(email.find("Where"), verbose.find("Be chatty"));
        assert!(text.contains("- it can be one of [a, b]"));
        assert!(text.contains("- it can be set multiple times"));
        assert!(text.contains("- it can be passed as 'OUT_FILE' environment variable"));
    }

    #[test]
    fn test_error_line_first() {
        let spec = sample();
        let options = fixed();
        let text = UsageRenderer::new(&spec, &options, "report").usage(Some("unknown option '--x'"));
        assert!(text.starts_with("Error: unknown option '--x'\n\nUsage:"));
    }

    #[test]
    fn test_help_sections() {
        let spec = sample();
        let options = fixed();
        let text = UsageRenderer::new(&spec, &options, "report")
            .help(Some("Sends a report."), &["report -e a@b.co".to_string()]);
        assert!(text.starts_with("Sends a report.\n\nUsage:"));
        assert!(text.ends_with("EXAMPLES:\n  report -e a@b.co\n"));
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("aa bb cc", 5), vec!["aa bb", "cc"]);
        assert_eq!(wrap("one\ntwo", 80), vec!["one", "two"]);
        assert_eq!(wrap("averyveryverylongword x", 4), vec!["averyveryverylongword", "x"]);
    }

    #[test]
    fn test_long_description_wraps_under_column() {
        let spec = Spec::new()
            .arg("--x", string().description("word ".repeat(30).trim()))
            .compile()
            .unwrap();
        let options = UsageOptions {
            max_length: 40,
            detect_width: false,
            ..UsageOptions::default()
        };
        let text = UsageRenderer::new(&spec, &options, "t").usage(None);
        let lines: Vec<&str> = text.lines().filter(|l| l.contains("word")).collect();
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.chars().count() <= 40, "{:?}", line);
        }
    }

    #[test]
    fn test_describe() {
        let spec = sample();
        let described = describe(&spec);
        assert_eq!(described.len(), 5);
        let email = &described[0];
        assert_eq!(email.kind, "string");
        assert_eq!(email.format.as_deref(), Some("email"));
        assert_eq!(email.aliases, vec!["-e"]);
        assert_eq!(email.short_description.as_deref(), Some("Where to send the report"));
        assert!(email.required);
        assert!(described[1].negatable);
        assert_eq!(described[4].default, Some(Value::Number(3.0)));

        let json = serde_json::to_value(&described[2]).unwrap();
        assert_eq!(json["enum"], serde_json::json!(["a", "b"]));
        assert_eq!(json["multiple"], serde_json::json!(true));
        assert_eq!(json["valueText"], serde_json::json!("VAL"));
        assert!(json.get("default").is_none());
    }
}
