//! Common test utilities
#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Create a temporary directory with a qel.yml file
pub fn create_test_config(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("qel.yml");
    fs::write(&config_path, content).unwrap();
    (temp_dir, config_path)
}

/// Create a test config with an empty subdirectory next to it
pub fn create_test_config_in_subdir(content: &str) -> (TempDir, PathBuf, PathBuf) {
    let (temp_dir, config_path) = create_test_config(content);
    let sub_dir = temp_dir.path().join("subdir");
    fs::create_dir(&sub_dir).unwrap();
    (temp_dir, config_path, sub_dir)
}

pub fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Fixed environment table
pub fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    qel::env::env_from(pairs.iter().copied())
}

/// Definition used across the integration tests
pub const DEPLOY_YML: &str = r#"
name: deploy
description: Ship a build to an environment
version: 1.2.3
examples:
  - deploy --target production -r 3
options:
  - name: --target
    enum: [staging, production]
    default: staging
    description: Where to deploy
  - name: --replicas
    aliases: [-r]
    type: number
    integer: true
    min: 1
    max: 10
  - name: --email
    format: email
    env: DEPLOY_EMAIL
  - name: --verbose
    aliases: [-v]
    type: flag
    count: true
  - name: --dry-run
    type: flag
"#;
