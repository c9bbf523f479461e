//! Parser results

use crate::validate::Value;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;
use std::sync::Arc;

/// Values keyed by canonical option name plus the residual positionals
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    values: Vec<(String, Value)>,
    positionals: Vec<String>,
    aliases: Arc<HashMap<String, String>>,
}

impl ParseResult {
    pub(crate) fn new(aliases: Arc<HashMap<String, String>>) -> Self {
        ParseResult {
            values: Vec::new(),
            positionals: Vec::new(),
            aliases,
        }
    }

    fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    pub(crate) fn set(&mut self, name: &str, value: Value) {
        match self.values.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name.to_string(), value)),
        }
    }

    pub(crate) fn slot_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.values
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub(crate) fn remove(&mut self, name: &str) {
        self.values.retain(|(n, _)| n != name);
    }

    pub(crate) fn push_positional(&mut self, token: String) {
        self.positionals.push(token);
    }

    /// Whether a value is present for an option or any of its aliases
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        let name = self.canonical(name);
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Value for `name`, or `default` when absent
    pub fn get_or(&self, name: &str, default: impl Into<Value>) -> Value {
        self.get(name).cloned().unwrap_or_else(|| default.into())
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn num(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    /// Flag state; absent flags are `false`
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Items of a multi-valued option; empty when absent
    pub fn list(&self, name: &str) -> &[Value] {
        self.get(name).and_then(Value::as_list).unwrap_or(&[])
    }

    /// Positional and passed-through tokens (`_`)
    pub fn positionals(&self) -> &[String] {
        &self.positionals
    }

    /// `(name, value)` pairs in first-seen order
    pub fn values(&self) -> &[(String, Value)] {
        &self.values
    }
}

impl Serialize for ParseResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 1))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.serialize_entry("_", &self.positionals)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_lookup_and_defaults() {
        let mut aliases = HashMap::new();
        aliases.insert("-n".to_string(), "--name".to_string());
        let mut result = ParseResult::new(Arc::new(aliases));
        result.set("--name", Value::from("x"));

        assert!(result.has("-n"));
        assert_eq!(result.str("-n"), Some("x"));
        assert_eq!(result.get_or("--other", 5i64), Value::Number(5.0));
        assert!(!result.flag("--verbose"));
        assert!(result.list("--tags").is_empty());
    }

    #[test]
    fn test_serialize_with_positionals() {
        let mut result = ParseResult::new(Arc::default());
        result.set("--n", Value::Number(3.0));
        result.push_positional("file".to_string());
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(json, r#"{"--n":3.0,"_":["file"]}"#);
    }
}
