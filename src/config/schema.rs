//! Definition validation
//!
//! Rejects option settings that do not apply to the option's type and
//! defaults whose YAML type cannot be produced by the option.

use crate::config::types::{CliConfig, OptionDef, OptionType};
use crate::error::{ConfigError, ConfigResult};
use regex::Regex;
use std::collections::HashSet;

/// Validate a complete definition
pub fn validate_config(config: &CliConfig) -> ConfigResult<()> {
    let mut names = HashSet::new();
    for option in &config.options {
        validate_option(option)?;
        for name in std::iter::once(&option.name).chain(&option.aliases) {
            if !names.insert(name.as_str()) {
                return Err(ConfigError::DuplicateKey(name.clone()));
            }
        }
    }
    Ok(())
}

/// Validate a single option
pub fn validate_option(option: &OptionDef) -> ConfigResult<()> {
    use OptionType as T;
    let kind = option.kind;
    let settings: [(&str, bool, &[OptionType]); 12] = [
        ("enum", option.choices.is_some(), &[T::String]),
        ("format", option.format.is_some(), &[T::String]),
        ("regexp", option.regexp.is_some(), &[T::String]),
        ("trim", option.trim.is_some(), &[T::String]),
        ("min", option.min.is_some(), &[T::String, T::Number]),
        ("max", option.max.is_some(), &[T::String, T::Number]),
        ("integer", option.integer, &[T::Number]),
        ("positive", option.positive, &[T::Number]),
        ("negative", option.negative, &[T::Number]),
        ("exists", option.exists.is_some(), &[T::Path, T::Dir]),
        ("allow_std", option.allow_std, &[T::Path]),
        ("count", option.count, &[T::Flag]),
    ];
    for (setting, present, allowed) in settings {
        if present && !allowed.contains(&kind) {
            return Err(not_applicable(option, setting));
        }
    }
    if option.negatable.is_some() && kind != T::Flag {
        return Err(not_applicable(option, "negatable"));
    }

    if option.positive && option.negative {
        return Err(invalid(option, "positive and negative are mutually exclusive"));
    }
    if let (Some(min), Some(max)) = (option.min, option.max) {
        if min > max {
            return Err(invalid(option, &format!("min {} is greater than max {}", min, max)));
        }
    }
    if kind == T::String {
        for (setting, bound) in [("min", option.min), ("max", option.max)] {
            if matches!(bound, Some(b) if b < 0.0 || b.fract() != 0.0) {
                return Err(invalid(option, &format!("{} must be a whole length", setting)));
            }
        }
    }
    if let Some(re) = &option.regexp {
        Regex::new(re).map_err(|e| invalid(option, &format!("invalid regexp: {}", e)))?;
    }
    if let Some(default) = &option.default {
        check_default(option, default)?;
    }
    Ok(())
}

fn check_default(option: &OptionDef, default: &serde_yaml::Value) -> ConfigResult<()> {
    use serde_yaml::Value as Yaml;
    let scalar_ok = |v: &Yaml| match option.kind {
        OptionType::Flag => v.is_bool() || (option.count && v.is_number()),
        OptionType::Number => v.is_number(),
        OptionType::String | OptionType::Path | OptionType::Dir => v.is_string(),
    };
    let ok = match default {
        Yaml::Sequence(items) if option.multiple => items.iter().all(scalar_ok),
        other => scalar_ok(other),
    };
    if ok {
        Ok(())
    } else {
        Err(invalid(
            option,
            &format!("default does not match type '{}'", option.kind.as_str()),
        ))
    }
}

fn not_applicable(option: &OptionDef, setting: &str) -> ConfigError {
    invalid(
        option,
        &format!("'{}' does not apply to type '{}'", setting, option.kind.as_str()),
    )
}

fn invalid(option: &OptionDef, reason: &str) -> ConfigError {
    ConfigError::InvalidType {
        name: option.name.clone(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(yaml: &str) -> OptionDef {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_setting_must_apply_to_type() {
        let err = validate_option(&option("name: --n\ntype: number\nenum: [a]")).unwrap_err();
        assert_eq!(err.code(), "ConfigInvalidType");
        assert!(err.to_string().contains("'enum' does not apply to type 'number'"));

        assert!(validate_option(&option("name: --v\ntype: flag\ncount: true")).is_ok());
        assert!(validate_option(&option("name: --v\ntype: string\ncount: true")).is_err());
        assert!(validate_option(&option("name: --d\ntype: dir\nallow_std: true")).is_err());
        assert!(validate_option(&option("name: --v\ntype: number\nnegatable: false")).is_err());
    }

    #[test]
    fn test_bounds() {
        assert!(validate_option(&option("name: --n\ntype: number\nmin: 5\nmax: 1")).is_err());
        assert!(validate_option(&option("name: --s\nmin: 1.5")).is_err());
        assert!(validate_option(&option("name: --s\nmin: 1\nmax: 3")).is_ok());
        assert!(validate_option(&option(
            "name: --n\ntype: number\npositive: true\nnegative: true"
        ))
        .is_err());
    }

    #[test]
    fn test_bad_regexp() {
        let err = validate_option(&option("name: --s\nregexp: '('")).unwrap_err();
        assert!(err.to_string().contains("invalid regexp"));
    }

    #[test]
    fn test_default_types() {
        assert!(validate_option(&option("name: --n\ntype: number\ndefault: 3")).is_ok());
        assert!(validate_option(&option("name: --n\ntype: number\ndefault: three")).is_err());
        assert!(validate_option(&option("name: --f\ntype: flag\ndefault: true")).is_ok());
        assert!(validate_option(&option(
            "name: --t\nmultiple: true\ndefault: [a, b]"
        ))
        .is_ok());
        assert!(validate_option(&option("name: --t\ndefault: [a, b]")).is_err());
    }

    #[test]
    fn test_duplicate_names_across_aliases() {
        let config: CliConfig = serde_yaml::from_str(
            "options:\n  - name: --a\n    aliases: [-x]\n  - name: --b\n    aliases: [-x]\n",
        )
        .unwrap();
        let err = validate_config(&config).unwrap_err();
        assert_eq!(err, ConfigError::DuplicateKey("-x".into()));
    }
}
