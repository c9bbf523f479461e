//! Declarative value validators
//!
//! A validator parses one raw option value, runs its constraint steps in
//! registration order, then applies an optional mapping. Builders are
//! chainable and cheap to clone; a clone owns its own step list.

pub mod flag;
pub mod format;
pub mod number;
pub mod path;
pub mod string;
pub mod value;

pub use flag::FlagValidator;
pub use format::{formats, register_format, FormatRegistry, Matcher};
pub use number::{looks_numeric, NumberValidator};
pub use path::{PathValidator, ReadOptions};
pub use string::StringValidator;
pub use value::Value;

use crate::env::Environment;
use crate::error::{ArgsError, ArgsResult, InvalidValue};
use std::fmt;
use std::sync::Arc;

/// Start a string validator
pub fn string() -> StringValidator {
    StringValidator::new()
}

/// Start a number validator
pub fn number() -> NumberValidator {
    NumberValidator::new()
}

/// Start a path validator (file semantics until `directory(true)`)
pub fn path() -> PathValidator {
    PathValidator::new()
}

/// Start a boolean flag validator
pub fn flag() -> FlagValidator {
    FlagValidator::new()
}

/// What a passing constraint asks for next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Accept the value and skip the remaining constraints
    Stop,
}

/// Constraint predicate; `Err` carries the failure reason
pub type CheckFn = Arc<dyn Fn(&Value) -> Result<Flow, String> + Send + Sync>;

/// Mapping applied after all constraints passed
pub type MapFn = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

/// Custom completion: receives the current word and a callback producing
/// the default candidates
pub type CompleteFn = Arc<dyn Fn(&str, &dyn Fn() -> Vec<String>) -> Vec<String> + Send + Sync>;

/// Closed set of constraint tags. Adding a non-`Custom` tag twice replaces
/// the earlier step in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTag {
    Custom,
    Enum,
    Format,
    IsInt,
    Min,
    Max,
    IsPositive,
    IsNegative,
    Regexp,
    CheckPath,
    CheckParentDir,
    EnsurePath,
    EnsureParentDir,
}

#[derive(Clone)]
pub(crate) enum Rule {
    Check(CheckFn),
    Path(path::PathRule),
}

#[derive(Clone)]
pub(crate) struct Step {
    pub(crate) tag: StepTag,
    pub(crate) rule: Rule,
}

/// State shared by every validator variant
#[derive(Clone, Default)]
pub struct Common {
    pub(crate) default: Option<Value>,
    pub(crate) required: bool,
    pub(crate) env: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) error_message: Option<String>,
    pub(crate) value_text: Option<String>,
    pub(crate) steps: Vec<Step>,
    pub(crate) mapper: Option<MapFn>,
    pub(crate) completer: Option<CompleteFn>,
    /// Problem found while chaining, reported when the spec is compiled
    pub(crate) build_error: Option<String>,
}

impl Common {
    pub(crate) fn add_step(&mut self, tag: StepTag, rule: Rule) {
        if tag != StepTag::Custom {
            if let Some(existing) = self.steps.iter_mut().find(|s| s.tag == tag) {
                existing.rule = rule;
                return;
            }
        }
        self.steps.push(Step { tag, rule });
    }

    pub(crate) fn add_check<F>(&mut self, tag: StepTag, f: F)
    where
        F: Fn(&Value) -> Result<Flow, String> + Send + Sync + 'static,
    {
        self.add_step(tag, Rule::Check(Arc::new(f)));
    }

    pub(crate) fn remove_step(&mut self, tag: StepTag) {
        self.steps.retain(|s| s.tag != tag);
    }

    /// Tags in execution order
    pub fn step_tags(&self) -> Vec<StepTag> {
        self.steps.iter().map(|s| s.tag).collect()
    }
}

impl fmt::Debug for Common {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Common")
            .field("default", &self.default)
            .field("required", &self.required)
            .field("env", &self.env)
            .field("description", &self.description)
            .field("value_text", &self.value_text)
            .field("steps", &self.step_tags())
            .field("mapped", &self.mapper.is_some())
            .finish()
    }
}

/// Chainable settings shared by every variant
pub trait Builder: Sized {
    fn common(&self) -> &Common;
    fn common_mut(&mut self) -> &mut Common;

    /// Value used when neither argv nor the environment provide one
    fn default(mut self, value: impl Into<Value>) -> Self {
        self.common_mut().default = Some(value.into());
        self
    }

    fn required(mut self) -> Self {
        self.common_mut().required = true;
        self
    }

    /// Environment variable consulted when the option is absent
    fn env(mut self, var: &str) -> Self {
        self.common_mut().env = Some(var.to_string());
        self
    }

    fn description(mut self, text: &str) -> Self {
        self.common_mut().description = Some(text.to_string());
        self
    }

    /// Message appended to every invalid-value diagnostic
    fn error_message(mut self, text: &str) -> Self {
        self.common_mut().error_message = Some(text.to_string());
        self
    }

    /// Placeholder shown after the option name in usage
    fn value_text(mut self, label: &str) -> Self {
        self.common_mut().value_text = Some(label.to_string());
        self
    }

    /// Append a custom constraint. Returning `Flow::Stop` skips the rest.
    fn custom<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Result<Flow, String> + Send + Sync + 'static,
    {
        self.common_mut().add_check(StepTag::Custom, f);
        self
    }

    /// Replace the mapping applied after the constraints
    fn map<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.common_mut().mapper = Some(Arc::new(f));
        self
    }

    /// Custom shell completion for this option's values
    fn complete<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &dyn Fn() -> Vec<String>) -> Vec<String> + Send + Sync + 'static,
    {
        self.common_mut().completer = Some(Arc::new(f));
        self
    }
}

/// Type tag reported in usage descriptors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    String,
    Number,
    Flag,
    File,
    Dir,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::String => "string",
            TypeTag::Number => "number",
            TypeTag::Flag => "flag",
            TypeTag::File => "file",
            TypeTag::Dir => "dir",
        }
    }
}

/// A compiled validator of any variant
#[derive(Clone, Debug)]
pub enum Validator {
    String(StringValidator),
    Number(NumberValidator),
    Path(PathValidator),
    Flag(FlagValidator),
}

impl Validator {
    pub fn common(&self) -> &Common {
        match self {
            Validator::String(v) => v.common(),
            Validator::Number(v) => v.common(),
            Validator::Path(v) => v.common(),
            Validator::Flag(v) => v.common(),
        }
    }

    pub fn is_flag(&self) -> bool {
        matches!(self, Validator::Flag(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Validator::Number(_))
    }

    /// Flag whose final value is the number of occurrences
    pub fn is_count(&self) -> bool {
        matches!(self, Validator::Flag(f) if f.counts())
    }

    /// Whether `--no-<name>` is accepted
    pub fn negatable(&self) -> bool {
        matches!(self, Validator::Flag(f) if f.negation_allowed())
    }

    pub fn type_tag(&self) -> TypeTag {
        match self {
            Validator::String(_) => TypeTag::String,
            Validator::Number(_) => TypeTag::Number,
            Validator::Flag(_) => TypeTag::Flag,
            Validator::Path(p) if p.is_directory() => TypeTag::Dir,
            Validator::Path(_) => TypeTag::File,
        }
    }

    pub fn enum_values(&self) -> Option<&[String]> {
        match self {
            Validator::String(s) => s.choices(),
            _ => None,
        }
    }

    pub fn format_name(&self) -> Option<&str> {
        match self {
            Validator::String(s) => s.format_name(),
            _ => None,
        }
    }

    /// Placeholder for usage lines: custom text, else derived from the type
    pub fn value_label(&self) -> String {
        if let Some(text) = &self.common().value_text {
            return text.clone();
        }
        match self {
            Validator::String(s) => s
                .format_name()
                .map(|f| f.to_uppercase())
                .unwrap_or_else(|| "VAL".to_string()),
            Validator::Number(_) => "NUM".to_string(),
            Validator::Path(p) if p.is_directory() => "DIR".to_string(),
            Validator::Path(_) => "FILE".to_string(),
            Validator::Flag(_) => String::new(),
        }
    }

    /// Default completion candidates: the default value, if any
    pub fn default_completions(&self) -> Vec<String> {
        match &self.common().default {
            Some(Value::List(items)) => items.iter().map(|v| v.to_string()).collect(),
            Some(v) => vec![v.to_string()],
            None => Vec::new(),
        }
    }

    /// Parse, constrain and map a value for `name`.
    ///
    /// An absent `raw` falls back to the environment variable, then the
    /// default. `Ok(None)` means no value and not required.
    pub fn validate(
        &self,
        raw: Option<&str>,
        name: &str,
        env: &dyn Environment,
    ) -> ArgsResult<Option<Value>> {
        let common = self.common();
        let (text, env_source) = match raw {
            Some(r) => (Some(r.to_string()), None),
            None => match &common.env {
                Some(var) => match env.var(var) {
                    Some(v) => (Some(v), Some(var.clone())),
                    None => (None, None),
                },
                None => (None, None),
            },
        };

        let parsed = match text {
            Some(text) => {
                let parsed = self
                    .parse(&text)
                    .map_err(|reason| self.invalid(name, &text, env_source.clone(), reason))?;
                (parsed, text)
            }
            None => match &common.default {
                // list defaults are constrained item by item
                Some(Value::List(items)) => {
                    let items = items
                        .iter()
                        .map(|item| self.finalize(item.clone(), name, &item.to_string(), &None))
                        .collect::<ArgsResult<Vec<_>>>()?;
                    return Ok(Some(Value::List(items)));
                }
                Some(default) => (default.clone(), default.to_string()),
                None if common.required => {
                    return Err(ArgsError::MissingRequiredOption(name.to_string()))
                }
                None => return Ok(None),
            },
        };

        let (value, text) = parsed;
        self.finalize(value, name, &text, &env_source).map(Some)
    }

    /// Constraint steps, then the mapping (count flags are mapped once
    /// folded)
    fn finalize(
        &self,
        value: Value,
        name: &str,
        text: &str,
        env_source: &Option<String>,
    ) -> ArgsResult<Value> {
        let value = self.run_steps(value, name, text, env_source)?;
        if self.is_count() {
            return Ok(value);
        }
        self.apply_map(value, name, text, env_source)
    }

    /// Apply the mapping function, if any
    pub fn map_value(&self, value: Value, name: &str) -> ArgsResult<Value> {
        let text = value.to_string();
        self.apply_map(value, name, &text, &None)
    }

    fn apply_map(
        &self,
        value: Value,
        name: &str,
        text: &str,
        env_source: &Option<String>,
    ) -> ArgsResult<Value> {
        match &self.common().mapper {
            Some(mapper) => {
                mapper(value).map_err(|reason| self.invalid(name, text, env_source.clone(), reason))
            }
            None => Ok(value),
        }
    }

    fn parse(&self, text: &str) -> Result<Value, String> {
        match self {
            Validator::String(v) => v.parse(text),
            Validator::Number(v) => v.parse(text),
            Validator::Path(v) => v.parse(text),
            Validator::Flag(v) => v.parse(text),
        }
    }

    fn run_steps(
        &self,
        value: Value,
        name: &str,
        text: &str,
        env_source: &Option<String>,
    ) -> ArgsResult<Value> {
        if let Validator::Path(p) = self {
            if p.is_std_sentinel(&value) {
                return Ok(value);
            }
        }

        for step in &self.common().steps {
            let outcome = match &step.rule {
                Rule::Check(check) => check(&value),
                Rule::Path(rule) => match self {
                    Validator::Path(p) => p.apply_rule(rule, &value),
                    _ => Ok(Flow::Continue),
                },
            };
            match outcome {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break,
                Err(reason) => return Err(self.invalid(name, text, env_source.clone(), reason)),
            }
        }

        match self {
            Validator::Path(p) => p
                .read_contents(value)
                .map_err(|reason| self.invalid(name, text, env_source.clone(), reason)),
            _ => Ok(value),
        }
    }

    fn invalid(&self, name: &str, text: &str, env: Option<String>, reason: String) -> ArgsError {
        ArgsError::InvalidOptionValue(InvalidValue {
            name: name.to_string(),
            value: text.to_string(),
            env,
            reason,
            message: self.common().error_message.clone(),
        })
    }
}

impl From<StringValidator> for Validator {
    fn from(v: StringValidator) -> Self {
        Validator::String(v)
    }
}

impl From<NumberValidator> for Validator {
    fn from(v: NumberValidator) -> Self {
        Validator::Number(v)
    }
}

impl From<PathValidator> for Validator {
    fn from(v: PathValidator) -> Self {
        Validator::Path(v)
    }
}

impl From<FlagValidator> for Validator {
    fn from(v: FlagValidator) -> Self {
        Validator::Flag(v)
    }
}
