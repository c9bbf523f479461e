//! Core configuration types
//!
//! This module defines the data structures that represent a qel.yml file:
//! a declarative description of a command-line interface.

use serde::{Deserialize, Serialize};

/// Top-level definition file
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    /// Program name shown in usage (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Text printed above the usage block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Printed for `--version`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Prefix of the completion and describe-usage variables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,

    /// Pass unknown options through as positionals
    #[serde(default)]
    pub permissive: bool,

    #[serde(default)]
    pub stop_at_positional: bool,

    /// Options in declaration order
    #[serde(default)]
    pub options: Vec<OptionDef>,
}

/// Value type of an option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    #[default]
    String,
    Number,
    Path,
    Dir,
    Flag,
}

impl OptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionType::String => "string",
            OptionType::Number => "number",
            OptionType::Path => "path",
            OptionType::Dir => "dir",
            OptionType::Flag => "flag",
        }
    }
}

/// One option of a definition file
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OptionDef {
    /// Canonical name including dashes (`--email`, `-v`)
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,

    #[serde(rename = "type", default)]
    pub kind: OptionType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_yaml::Value>,

    #[serde(default)]
    pub required: bool,

    /// Environment variable consulted when the option is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Collect every occurrence into a list
    #[serde(default)]
    pub multiple: bool,

    /// Flag counts occurrences
    #[serde(default)]
    pub count: bool,

    /// Length bound for strings, value bound for numbers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    #[serde(default)]
    pub integer: bool,

    #[serde(default)]
    pub positive: bool,

    #[serde(default)]
    pub negative: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regexp: Option<String>,

    /// Path must (true) or must not (false) exist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim: Option<bool>,

    /// Accept `-` for stdin/stdout
    #[serde(default)]
    pub allow_std: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negatable: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_defaults() {
        let def: OptionDef = serde_yaml::from_str("name: --x").unwrap();
        assert_eq!(def.kind, OptionType::String);
        assert!(!def.required);
        assert!(def.aliases.is_empty());
    }

    #[test]
    fn test_enum_and_type_renames() {
        let def: OptionDef = serde_yaml::from_str(
            "name: --cmd\ntype: string\nenum: [date, uptime]\n",
        )
        .unwrap();
        assert_eq!(def.choices, Some(vec!["date".to_string(), "uptime".to_string()]));
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(serde_yaml::from_str::<OptionDef>("name: --x\ntype: color").is_err());
        assert!(serde_yaml::from_str::<OptionDef>("name: --x\ncolour: red").is_err());
    }
}
