//! String validator

use super::format::{formats, FormatRegistry};
use super::{Builder, Common, Flow, StepTag, Value};
use regex::Regex;

#[derive(Clone, Debug)]
pub struct StringValidator {
    common: Common,
    trim: bool,
    choices: Option<Vec<String>>,
    format: Option<String>,
}

impl StringValidator {
    pub fn new() -> Self {
        StringValidator {
            common: Common::default(),
            trim: true,
            choices: None,
            format: None,
        }
    }

    /// Strip surrounding whitespace before validation (on by default)
    pub fn trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    pub fn regexp(mut self, re: Regex) -> Self {
        self.common.add_check(StepTag::Regexp, move |v| {
            let s = v.as_str().unwrap_or_default();
            if re.is_match(s) {
                Ok(Flow::Continue)
            } else {
                Err(format!("it must match /{}/", re.as_str()))
            }
        });
        self
    }

    /// Minimum length in characters
    pub fn min(mut self, len: usize) -> Self {
        self.common.add_check(StepTag::Min, move |v| {
            let count = v.as_str().map(|s| s.chars().count()).unwrap_or(0);
            if count >= len {
                Ok(Flow::Continue)
            } else {
                Err(format!("it must be at least {} characters long", len))
            }
        });
        self
    }

    /// Maximum length in characters
    pub fn max(mut self, len: usize) -> Self {
        self.common.add_check(StepTag::Max, move |v| {
            let count = v.as_str().map(|s| s.chars().count()).unwrap_or(0);
            if count <= len {
                Ok(Flow::Continue)
            } else {
                Err(format!("it must be at most {} characters long", len))
            }
        });
        self
    }

    /// Restrict to a fixed set of values (exact, case-sensitive match)
    pub fn one_of<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.one_of_with_message(values, None)
    }

    pub fn one_of_with_message<I, S>(mut self, values: I, message: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        let allowed = values.clone();
        let message = message.map(str::to_string);
        self.common.add_check(StepTag::Enum, move |v| {
            let s = v.as_str().unwrap_or_default();
            if allowed.iter().any(|a| a == s) {
                Ok(Flow::Continue)
            } else {
                Err(message
                    .clone()
                    .unwrap_or_else(|| format!("it must be one of [{}]", allowed.join(", "))))
            }
        });
        self.choices = Some(values);
        self
    }

    /// Require a format from the process-wide registry
    pub fn format(self, name: &str) -> Self {
        self.format_in(formats(), name)
    }

    /// Require a format from an explicit registry
    pub fn format_in(mut self, registry: &FormatRegistry, name: &str) -> Self {
        self.format = Some(name.to_string());
        match registry.get(name) {
            Some(matcher) => {
                let format_name = name.to_string();
                self.common.add_check(StepTag::Format, move |v| {
                    if matcher.matches(v.as_str().unwrap_or_default()) {
                        Ok(Flow::Continue)
                    } else {
                        Err(format!("it is not a valid {}", format_name))
                    }
                });
            }
            None => {
                self.common.build_error = Some(format!("format '{}' not supported", name));
            }
        }
        self
    }

    pub fn choices(&self) -> Option<&[String]> {
        self.choices.as_deref()
    }

    pub fn format_name(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub(crate) fn parse(&self, text: &str) -> Result<Value, String> {
        let s = if self.trim { text.trim() } else { text };
        Ok(Value::String(s.to_string()))
    }
}

impl Default for StringValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder for StringValidator {
    fn common(&self) -> &Common {
        &self.common
    }

    fn common_mut(&mut self) -> &mut Common {
        &mut self.common
    }
}
