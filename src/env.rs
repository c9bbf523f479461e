//! Environment lookup
//!
//! Parsing, validation and completion read variables through this trait
//! so callers and tests can supply a fixed table instead of the process
//! environment.

use std::collections::HashMap;

pub trait Environment {
    fn var(&self, key: &str) -> Option<String>;

    /// All variables, used to complete `$NAME` words
    fn vars(&self) -> Vec<(String, String)>;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn vars(&self) -> Vec<(String, String)> {
        std::env::vars().collect()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }

    fn vars(&self) -> Vec<(String, String)> {
        let mut vars: Vec<(String, String)> =
            self.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        vars.sort();
        vars
    }
}

/// Build a table environment from pairs
pub fn env_from<I, K, V>(pairs: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Interpret an environment flag: unset, empty, `0` and `false` are off
pub fn is_truthy(value: Option<&str>, default: bool) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        None => default,
        Some(v) if v.is_empty() => default,
        Some(v) => !(v == "0" || v == "false" || v == "no" || v == "off"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_env() {
        let env = env_from([("B", "2"), ("A", "1")]);
        assert_eq!(env.var("A").as_deref(), Some("1"));
        assert_eq!(env.var("C"), None);
        assert_eq!(env.vars()[0].0, "A");
    }

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy(None, true));
        assert!(!is_truthy(Some("0"), true));
        assert!(!is_truthy(Some("false"), true));
        assert!(is_truthy(Some("1"), false));
    }
}
