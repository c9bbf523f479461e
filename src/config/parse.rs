//! Definition file parsing and discovery

use crate::config::schema::validate_config;
use crate::config::types::CliConfig;
use crate::error::{ConfigError, ConfigResult, QelError};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default definition file names to search for
const CONFIG_FILE_NAMES: &[&str] = &["qel.yml", "qel.yaml"];

/// Find the definition file by searching current and parent directories
pub fn find_config_file() -> ConfigResult<PathBuf> {
    find_config_file_from(env::current_dir().map_err(|e| {
        ConfigError::Invalid(format!("Failed to get current directory: {}", e))
    })?)
}

/// Find the definition file starting from a specific directory
pub fn find_config_file_from(start_dir: PathBuf) -> ConfigResult<PathBuf> {
    let mut current_dir = start_dir;
    let mut searched_paths = Vec::new();

    loop {
        for file_name in CONFIG_FILE_NAMES {
            let config_path = current_dir.join(file_name);
            searched_paths.push(config_path.display().to_string());

            if config_path.is_file() {
                return Ok(config_path);
            }
        }

        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => return Err(ConfigError::NotFound(searched_paths.join(", "))),
        }
    }
}

/// Parse a definition file from a path
pub fn parse_config_file(path: &Path) -> Result<CliConfig, QelError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    parse_config(&contents)
}

/// Parse and validate a definition from a string
pub fn parse_config(yaml: &str) -> Result<CliConfig, QelError> {
    let config: CliConfig = serde_yaml::from_str(yaml)?;
    validate_config(&config)?;
    Ok(config)
}

/// Parse a definition with automatic file discovery
pub fn parse_config_auto() -> Result<(CliConfig, PathBuf), QelError> {
    let config_path = find_config_file()?;
    let config = parse_config_file(&config_path)?;
    Ok((config, config_path))
}
