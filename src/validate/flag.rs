//! Boolean flag validator

use super::{Builder, Common, Value};

#[derive(Clone, Debug)]
pub struct FlagValidator {
    common: Common,
    allow_negation: bool,
    count: bool,
}

impl FlagValidator {
    pub fn new() -> Self {
        FlagValidator {
            common: Common::default(),
            allow_negation: true,
            count: false,
        }
    }

    /// Whether `--no-<name>` is recognized (on by default)
    pub fn allow_negation(mut self, allow: bool) -> Self {
        self.allow_negation = allow;
        self
    }

    /// Produce the number of affirmative occurrences instead of a boolean
    pub fn count(mut self) -> Self {
        self.count = true;
        self
    }

    pub fn negation_allowed(&self) -> bool {
        self.allow_negation
    }

    pub fn counts(&self) -> bool {
        self.count
    }

    pub(crate) fn parse(&self, text: &str) -> Result<Value, String> {
        parse_bool(text)
            .map(Value::Bool)
            .ok_or_else(|| "expected a boolean (true/false)".to_string())
    }
}

/// Accepts the usual spellings of booleans in argv and environment values
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

impl Default for FlagValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder for FlagValidator {
    fn common(&self) -> &Common {
        &self.common
    }

    fn common_mut(&mut self) -> &mut Common {
        &mut self.common
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::Validator;
    use std::collections::HashMap;

    #[test]
    fn test_parse_bool_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool(""), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_env_fallback() {
        let v: Validator = FlagValidator::new().env("QEL_TEST_VERBOSE").into();
        let mut env = HashMap::new();
        env.insert("QEL_TEST_VERBOSE".to_string(), "yes".to_string());
        assert_eq!(v.validate(None, "--verbose", &env).unwrap(), Some(Value::Bool(true)));
    }

    #[test]
    fn test_negation_default_on() {
        assert!(FlagValidator::new().negation_allowed());
        assert!(!FlagValidator::new().allow_negation(false).negation_allowed());
    }

    #[test]
    fn test_count_defers_map() {
        let v: Validator = FlagValidator::new()
            .count()
            .map(|_| Ok(Value::from("mapped")))
            .into();
        let got = v.validate(Some("true"), "--v", &HashMap::new()).unwrap();
        assert_eq!(got, Some(Value::Bool(true)));
        assert_eq!(
            v.map_value(Value::Number(2.0), "--v").unwrap(),
            Value::from("mapped")
        );
    }
}
