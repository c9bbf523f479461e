//! Turning a definition into a parser

use crate::cli::parser::{Parser, ParserOptions};
use crate::cli::spec::Spec;
use crate::config::parse::parse_config_file;
use crate::config::types::{CliConfig, OptionDef, OptionType};
use crate::error::{ConfigError, ConfigResult, QelError};
use crate::validate::{flag, number, path, string, Builder, Validator, Value};
use regex::Regex;
use std::path::Path;

/// Specification for every option of `config`, aliases included
pub fn build_spec(config: &CliConfig) -> ConfigResult<Spec> {
    let mut spec = Spec::new();
    for option in &config.options {
        let validator = build_validator(option)?;
        spec = if option.multiple {
            spec.multi(&option.name, validator)
        } else {
            spec.arg(&option.name, validator)
        };
        for alias in &option.aliases {
            spec = spec.alias(alias, &option.name);
        }
    }
    Ok(spec)
}

/// Parser settings carried by the definition
pub fn parser_options(config: &CliConfig) -> ParserOptions {
    let mut options = ParserOptions::new()
        .with_permissive(config.permissive)
        .with_stop_at_positional(config.stop_at_positional)
        .with_examples(config.examples.clone());
    if let Some(name) = &config.name {
        options = options.with_script_name(name);
    }
    if let Some(description) = &config.description {
        options = options.with_description(description);
    }
    if let Some(version) = &config.version {
        options = options.with_version(version);
    }
    if let Some(prefix) = &config.env_prefix {
        options = options.with_env_prefix(prefix);
    }
    options
}

/// Compile a definition into a ready parser
pub fn build_parser(config: &CliConfig) -> ConfigResult<Parser> {
    Parser::new(&build_spec(config)?, parser_options(config))
}

/// Load, validate and compile a definition file
pub fn load_parser(path: &Path) -> Result<Parser, QelError> {
    let config = parse_config_file(path)?;
    Ok(build_parser(&config)?)
}

fn build_validator(option: &OptionDef) -> ConfigResult<Validator> {
    let validator: Validator = match option.kind {
        OptionType::String => {
            let mut v = string();
            if let Some(trim) = option.trim {
                v = v.trim(trim);
            }
            if let Some(re) = &option.regexp {
                let re = Regex::new(re).map_err(|e| invalid(option, e.to_string()))?;
                v = v.regexp(re);
            }
            if let Some(min) = option.min {
                v = v.min(min as usize);
            }
            if let Some(max) = option.max {
                v = v.max(max as usize);
            }
            if let Some(choices) = &option.choices {
                v = v.one_of(choices.iter().cloned());
            }
            if let Some(format) = &option.format {
                v = v.format(format);
            }
            common(v, option)?.into()
        }
        OptionType::Number => {
            let mut v = number();
            if option.integer {
                v = v.integer();
            }
            if option.positive {
                v = v.positive(true);
            }
            if option.negative {
                v = v.negative(true);
            }
            if let Some(min) = option.min {
                v = v.min(min);
            }
            if let Some(max) = option.max {
                v = v.max(max);
            }
            common(v, option)?.into()
        }
        OptionType::Path | OptionType::Dir => {
            let mut v = path()
                .directory(option.kind == OptionType::Dir)
                .allow_std(option.allow_std);
            if let Some(exists) = option.exists {
                v = v.check(exists);
            }
            common(v, option)?.into()
        }
        OptionType::Flag => {
            let mut v = flag();
            if let Some(negatable) = option.negatable {
                v = v.allow_negation(negatable);
            }
            if option.count {
                v = v.count();
            }
            common(v, option)?.into()
        }
    };
    Ok(validator)
}

fn common<B: Builder>(mut v: B, option: &OptionDef) -> ConfigResult<B> {
    if let Some(default) = &option.default {
        v = v.default(yaml_to_value(default).ok_or_else(|| {
            invalid(option, "default must be a scalar or a list of scalars".to_string())
        })?);
    }
    if option.required {
        v = v.required();
    }
    if let Some(env) = &option.env {
        v = v.env(env);
    }
    if let Some(description) = &option.description {
        v = v.description(description);
    }
    if let Some(message) = &option.error_message {
        v = v.error_message(message);
    }
    if let Some(text) = &option.value_text {
        v = v.value_text(text);
    }
    Ok(v)
}

fn yaml_to_value(yaml: &serde_yaml::Value) -> Option<Value> {
    use serde_yaml::Value as Yaml;
    match yaml {
        Yaml::Bool(b) => Some(Value::Bool(*b)),
        Yaml::Number(n) => n.as_f64().map(Value::Number),
        Yaml::String(s) => Some(Value::String(s.clone())),
        Yaml::Sequence(items) => items
            .iter()
            .map(yaml_to_value)
            .collect::<Option<Vec<_>>>()
            .map(Value::List),
        _ => None,
    }
}

fn invalid(option: &OptionDef, reason: String) -> ConfigError {
    ConfigError::InvalidType {
        name: option.name.clone(),
        reason,
    }
}
