//! Named string formats
//!
//! A registry maps a format name such as `email` to either a regular
//! expression or a predicate. String validators resolve the matcher when
//! `format()` is called, so a format must be registered before any
//! validator referencing it is built.

use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// How a format checks a value
#[derive(Clone)]
pub enum Matcher {
    Regex(Regex),
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl Matcher {
    /// Build a predicate matcher from a closure
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Matcher::Predicate(Arc::new(f))
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Matcher::Regex(re) => re.is_match(value),
            Matcher::Predicate(f) => f(value),
        }
    }
}

impl From<Regex> for Matcher {
    fn from(re: Regex) -> Self {
        Matcher::Regex(re)
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Regex(re) => write!(f, "Regex({})", re.as_str()),
            Matcher::Predicate(_) => f.write_str("Predicate"),
        }
    }
}

const BUILTIN_FORMATS: &[(&str, &str)] = &[
    (
        "uuid",
        r"^(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$",
    ),
    ("email", r"^[^\s@]+@[^\s@]+\.[^\s@]+$"),
    ("date", r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])$"),
    ("time", r"^([01]\d|2[0-3]):[0-5]\d$"),
    (
        "datetime",
        r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])[T ]([01]\d|2[0-3]):[0-5]\d(:[0-5]\d(\.\d+)?)?(Z|[+-]\d{2}:?\d{2})?$",
    ),
    ("url", r"^[a-zA-Z][a-zA-Z0-9+.-]*://[^\s/?#]+[^\s]*$"),
    (
        "ipv4",
        r"^((25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)$",
    ),
    ("hex", r"^(?i)(0x)?[0-9a-f]+$"),
    (
        "semver",
        r"^v?\d+\.\d+\.\d+(-[0-9A-Za-z.-]+)?(\+[0-9A-Za-z.-]+)?$",
    ),
];

/// Name-to-matcher table shared by string validators
#[derive(Debug)]
pub struct FormatRegistry {
    entries: RwLock<HashMap<String, Matcher>>,
}

impl FormatRegistry {
    /// Create an empty registry
    pub fn empty() -> Self {
        FormatRegistry {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry holding the built-in formats
    pub fn new() -> Self {
        let registry = Self::empty();
        for (name, pattern) in BUILTIN_FORMATS {
            if let Ok(re) = Regex::new(pattern) {
                registry.register(name, Matcher::Regex(re));
            }
        }
        registry
    }

    /// Register a format, replacing any existing entry of the same name
    pub fn register(&self, name: &str, matcher: impl Into<Matcher>) {
        self.entries.write().insert(name.to_string(), matcher.into());
    }

    /// Look up a format by name
    pub fn get(&self, name: &str) -> Option<Matcher> {
        self.entries.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide registry used by `StringValidator::format`
pub fn formats() -> &'static FormatRegistry {
    static REGISTRY: OnceLock<FormatRegistry> = OnceLock::new();
    REGISTRY.get_or_init(FormatRegistry::new)
}

/// Register a format in the process-wide registry
pub fn register_format(name: &str, matcher: impl Into<Matcher>) {
    formats().register(name, matcher);
}
