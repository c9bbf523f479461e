//! Number validator

use super::{Builder, Common, Flow, StepTag, Value};
use regex::Regex;
use std::sync::OnceLock;

fn numeric_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").expect("valid numeric regex")
    })
}

/// Whether `s` is a signed decimal number, e.g. `-3`, `+1.5`, `2e10`
pub fn looks_numeric(s: &str) -> bool {
    numeric_re().is_match(s)
}

#[derive(Clone, Debug, Default)]
pub struct NumberValidator {
    common: Common,
}

impl NumberValidator {
    pub fn new() -> Self {
        NumberValidator {
            common: Common::default(),
        }
    }

    /// Require a value greater than zero; `false` removes the requirement
    pub fn positive(mut self, on: bool) -> Self {
        if on {
            self.common.add_check(StepTag::IsPositive, |v| {
                if v.as_f64().unwrap_or(0.0) > 0.0 {
                    Ok(Flow::Continue)
                } else {
                    Err("it must be positive".to_string())
                }
            });
        } else {
            self.common.remove_step(StepTag::IsPositive);
        }
        self
    }

    /// Require a value below zero; `false` removes the requirement
    pub fn negative(mut self, on: bool) -> Self {
        if on {
            self.common.add_check(StepTag::IsNegative, |v| {
                if v.as_f64().unwrap_or(0.0) < 0.0 {
                    Ok(Flow::Continue)
                } else {
                    Err("it must be negative".to_string())
                }
            });
        } else {
            self.common.remove_step(StepTag::IsNegative);
        }
        self
    }

    pub fn integer(mut self) -> Self {
        self.common.add_check(StepTag::IsInt, |v| {
            if v.as_f64().map(|n| n.fract() == 0.0).unwrap_or(false) {
                Ok(Flow::Continue)
            } else {
                Err("it must be an integer".to_string())
            }
        });
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.common.add_check(StepTag::Min, move |v| {
            if v.as_f64().unwrap_or(f64::NAN) >= min {
                Ok(Flow::Continue)
            } else {
                Err(format!("it must be greater than or equal to {}", Value::Number(min)))
            }
        });
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.common.add_check(StepTag::Max, move |v| {
            if v.as_f64().unwrap_or(f64::NAN) <= max {
                Ok(Flow::Continue)
            } else {
                Err(format!("it must be less than or equal to {}", Value::Number(max)))
            }
        });
        self
    }

    pub(crate) fn parse(&self, text: &str) -> Result<Value, String> {
        let s = text.trim();
        if !looks_numeric(s) {
            return Err("expected a number".to_string());
        }
        s.parse::<f64>()
            .map(Value::Number)
            .map_err(|e| format!("expected a number ({})", e))
    }
}

impl Builder for NumberValidator {
    fn common(&self) -> &Common {
        &self.common
    }

    fn common_mut(&mut self) -> &mut Common {
        &mut self.common
    }
}
