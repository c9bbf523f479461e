//! Argument specifications
//!
//! `Spec` is the user-facing builder: an ordered list of option names
//! mapped to a validator, a multi-valued validator, or an alias. `compile`
//! checks it once and produces the immutable `CompiledSpec` shared by the
//! parser, the usage renderer and the completion engine.

use crate::error::{ConfigError, ConfigResult};
use crate::validate::Validator;
use std::collections::{HashMap, HashSet};

/// One entry of a specification
#[derive(Clone, Debug)]
pub enum Entry {
    /// Single value; the last occurrence wins
    Single(Validator),
    /// Every occurrence is appended to a list
    Multi(Validator),
    /// Another name for an option (may point to another alias)
    Alias(String),
}

/// Ordered argument specification
#[derive(Clone, Debug, Default)]
pub struct Spec {
    entries: Vec<(String, Entry)>,
}

impl Spec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single-valued option
    pub fn arg(mut self, name: &str, validator: impl Into<Validator>) -> Self {
        self.entries
            .push((name.to_string(), Entry::Single(validator.into())));
        self
    }

    /// Add a multi-valued option
    pub fn multi(mut self, name: &str, validator: impl Into<Validator>) -> Self {
        self.entries
            .push((name.to_string(), Entry::Multi(validator.into())));
        self
    }

    /// Add an alias for another option name
    pub fn alias(mut self, name: &str, target: &str) -> Self {
        self.entries
            .push((name.to_string(), Entry::Alias(target.to_string())));
        self
    }

    pub fn entries(&self) -> &[(String, Entry)] {
        &self.entries
    }

    /// Check names, aliases and validators and build the compiled form
    pub fn compile(&self) -> ConfigResult<CompiledSpec> {
        let mut seen = HashSet::new();
        for (name, entry) in &self.entries {
            check_name(name)?;
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateKey(name.clone()));
            }
            if let Entry::Single(v) | Entry::Multi(v) = entry {
                if let Some(reason) = &v.common().build_error {
                    return Err(ConfigError::InvalidType {
                        name: name.clone(),
                        reason: reason.clone(),
                    });
                }
            }
        }

        let mut handlers = Vec::new();
        let mut index = HashMap::new();
        for (name, entry) in &self.entries {
            let (validator, multi) = match entry {
                Entry::Single(v) => (v.clone(), false),
                Entry::Multi(v) => (v.clone(), true),
                Entry::Alias(_) => continue,
            };
            index.insert(name.clone(), handlers.len());
            handlers.push(Handler {
                name: name.clone(),
                validator,
                multi,
                aliases: Vec::new(),
            });
        }

        let targets: HashMap<&str, &str> = self
            .entries
            .iter()
            .filter_map(|(name, entry)| match entry {
                Entry::Alias(target) => Some((name.as_str(), target.as_str())),
                _ => None,
            })
            .collect();

        let mut aliases = HashMap::new();
        for (name, entry) in &self.entries {
            if let Entry::Alias(_) = entry {
                let canonical = resolve_alias(name, &targets, &index)?;
                if let Some(&i) = index.get(&canonical) {
                    handlers[i].aliases.push(name.clone());
                }
                aliases.insert(name.clone(), canonical);
            }
        }

        Ok(CompiledSpec {
            handlers,
            index,
            aliases,
        })
    }
}

fn check_name(name: &str) -> ConfigResult<()> {
    if name.is_empty() {
        return Err(ConfigError::EmptyKey);
    }
    if !name.starts_with('-') {
        return Err(ConfigError::NonOptionKey(name.to_string()));
    }
    if name == "-" || name == "--" {
        return Err(ConfigError::NoName(name.to_string()));
    }
    if !name.starts_with("--") && name.chars().count() != 2 {
        return Err(ConfigError::ShortOptionTooLong(name.to_string()));
    }
    Ok(())
}

fn resolve_alias(
    name: &str,
    targets: &HashMap<&str, &str>,
    index: &HashMap<String, usize>,
) -> ConfigResult<String> {
    let mut chain = vec![name.to_string()];
    let mut current = name;
    while let Some(&next) = targets.get(current) {
        if chain.iter().any(|c| c == next) {
            chain.push(next.to_string());
            return Err(ConfigError::InvalidAlias {
                name: name.to_string(),
                reason: format!("cycle {}", chain.join(" -> ")),
            });
        }
        chain.push(next.to_string());
        current = next;
    }
    if index.contains_key(current) {
        Ok(current.to_string())
    } else {
        Err(ConfigError::InvalidAlias {
            name: name.to_string(),
            reason: format!("target '{}' is not defined", current),
        })
    }
}

/// A compiled option: validator plus how values accumulate
#[derive(Clone, Debug)]
pub struct Handler {
    /// Canonical name
    pub name: String,
    pub validator: Validator,
    pub multi: bool,
    /// Alias names resolving to this handler, in declaration order
    pub aliases: Vec<String>,
}

impl Handler {
    /// Whether the option consumes a value
    pub fn takes_value(&self) -> bool {
        !self.validator.is_flag()
    }

    /// Canonical name and aliases, short names first
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = std::iter::once(self.name.as_str())
            .chain(self.aliases.iter().map(String::as_str))
            .collect();
        names.sort_by_key(|n| !is_short(n));
        names
    }
}

pub(crate) fn is_short(name: &str) -> bool {
    !name.starts_with("--")
}

/// Immutable, checked specification
#[derive(Clone, Debug)]
pub struct CompiledSpec {
    handlers: Vec<Handler>,
    index: HashMap<String, usize>,
    aliases: HashMap<String, String>,
}

impl CompiledSpec {
    /// Handlers in declaration order
    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    /// Canonical name for an option or alias
    pub fn resolve(&self, name: &str) -> Option<&str> {
        if let Some(&i) = self.index.get(name) {
            return Some(&self.handlers[i].name);
        }
        self.aliases.get(name).map(String::as_str)
    }

    /// Handler for an option or alias name
    pub fn handler(&self, name: &str) -> Option<&Handler> {
        let canonical = self.resolve(name)?;
        self.index.get(canonical).map(|&i| &self.handlers[i])
    }

    /// Handler for `--no-<name>` when `--<name>` is a negatable flag
    pub fn negation(&self, name: &str) -> Option<&Handler> {
        let rest = name.strip_prefix("--no-")?;
        let handler = self.handler(&format!("--{}", rest))?;
        if handler.validator.negatable() {
            Some(handler)
        } else {
            None
        }
    }

    pub fn aliases(&self) -> &HashMap<String, String> {
        &self.aliases
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{flag, number, string};

    #[test]
    fn test_name_checks() {
        let err = Spec::new().arg("", string()).compile().unwrap_err();
        assert_eq!(err.code(), "ConfigEmptyKey");

        let err = Spec::new().arg("name", string()).compile().unwrap_err();
        assert_eq!(err.code(), "ConfigNonOptionKey");

        let err = Spec::new().arg("--", string()).compile().unwrap_err();
        assert_eq!(err.code(), "ConfigNoName");

        let err = Spec::new().arg("-ab", string()).compile().unwrap_err();
        assert_eq!(err.code(), "ConfigShortOptionTooLong");

        let err = Spec::new()
            .arg("--a", string())
            .arg("--a", number())
            .compile()
            .unwrap_err();
        assert_eq!(err.code(), "ConfigDuplicateKey");
    }

    #[test]
    fn test_unknown_format_fails_compile() {
        let err = Spec::new()
            .arg("--x", string().format("klingon"))
            .compile()
            .unwrap_err();
        assert_eq!(err.code(), "ConfigInvalidType");
        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn test_alias_chain_resolves() {
        let spec = Spec::new()
            .arg("--email", string())
            .alias("-e", "--mail")
            .alias("--mail", "--email")
            .compile()
            .unwrap();
        assert_eq!(spec.resolve("-e"), Some("--email"));
        assert_eq!(spec.handler("--mail").unwrap().name, "--email");
        assert_eq!(spec.handler("--email").unwrap().names(), vec!["-e", "--email", "--mail"]);
    }

    #[test]
    fn test_alias_cycle_detected() {
        let err = Spec::new()
            .arg("--x", string())
            .alias("--a", "--b")
            .alias("--b", "--a")
            .compile()
            .unwrap_err();
        assert_eq!(err.code(), "ConfigInvalidAlias");
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_alias_missing_target() {
        let err = Spec::new().alias("-x", "--nope").compile().unwrap_err();
        assert_eq!(err.code(), "ConfigInvalidAlias");
    }

    #[test]
    fn test_negation_lookup() {
        let spec = Spec::new()
            .arg("--color", flag())
            .arg("--force", flag().allow_negation(false))
            .arg("--name", string())
            .compile()
            .unwrap();
        assert_eq!(spec.negation("--no-color").unwrap().name, "--color");
        assert!(spec.negation("--no-force").is_none());
        assert!(spec.negation("--no-name").is_none());
    }
}
