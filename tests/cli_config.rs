//! Integration tests for qel.yml definitions

mod common;

use common::{args, create_test_config, create_test_config_in_subdir, env, DEPLOY_YML};
use qel::cli::Outcome;
use qel::config::{find_config_file_from, load_parser, parse_config, parse_config_file};
use qel::{ConfigError, QelError};
use std::collections::HashMap;

#[test]
fn test_load_and_parse() {
    let (_dir, path) = create_test_config(DEPLOY_YML);
    let parser = load_parser(&path).unwrap();

    let result = parser
        .parse_with_env(
            &args(&["--target", "production", "-r", "3", "-vv", "extra"]),
            &env(&[("DEPLOY_EMAIL", "ops@example.com")]),
        )
        .unwrap();
    assert_eq!(result.str("--target"), Some("production"));
    assert_eq!(result.num("-r"), Some(3.0));
    assert_eq!(result.num("--verbose"), Some(2.0));
    assert_eq!(result.str("--email"), Some("ops@example.com"));
    assert!(!result.flag("--dry-run"));
    assert_eq!(result.positionals(), &args(&["extra"])[..]);
}

#[test]
fn test_definition_bounds_apply() {
    let (_dir, path) = create_test_config(DEPLOY_YML);
    let parser = load_parser(&path).unwrap();
    for bad in ["0", "11", "2.5", "many"] {
        let err = parser
            .parse_with_env(&args(&["--replicas", bad]), &HashMap::new())
            .unwrap_err();
        assert_eq!(err.code(), "InvalidOptionValue", "value {}", bad);
    }
}

#[test]
fn test_help_uses_definition_metadata() {
    let (_dir, path) = create_test_config(DEPLOY_YML);
    let parser = load_parser(&path).unwrap();
    let mut out = Vec::new();
    let mut err = Vec::new();
    let outcome = parser
        .run_from(&args(&["--help"]), &HashMap::new(), &mut out, &mut err)
        .unwrap();
    assert!(matches!(outcome, Outcome::Exit(0)));
    let help = String::from_utf8(out).unwrap();
    assert!(help.contains("Ship a build to an environment"));
    assert!(help.contains("deploy"));
    assert!(help.contains("--target"));
    assert!(help.contains("it can be one of [staging, production]"));
    assert!(help.contains("deploy --target production -r 3"));

    let mut out = Vec::new();
    parser
        .run_from(&args(&["--version"]), &HashMap::new(), &mut out, &mut err)
        .unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "1.2.3\n");
}

#[test]
fn test_describe_usage_lists_every_option() {
    let (_dir, path) = create_test_config(DEPLOY_YML);
    let parser = load_parser(&path).unwrap();
    let descriptors = parser.describe_usage();
    assert_eq!(descriptors.len(), 5);
}

#[test]
fn test_find_config_from_subdir() {
    let (_dir, path, sub_dir) = create_test_config_in_subdir(DEPLOY_YML);
    assert_eq!(find_config_file_from(sub_dir).unwrap(), path);
}

#[test]
fn test_invalid_definitions() {
    let err = parse_config("options:\n  - name: --n\n    type: number\n    regexp: x\n").unwrap_err();
    assert!(matches!(
        err,
        QelError::Config(ConfigError::InvalidType { .. })
    ));

    let err = parse_config("options:\n  - name: --n\n    type: colour\n").unwrap_err();
    assert!(matches!(err, QelError::Yaml(_)));

    let err = parse_config("options:\n  - name: --a\n  - name: --a\n").unwrap_err();
    assert!(matches!(
        err,
        QelError::Config(ConfigError::DuplicateKey(_))
    ));
}

#[test]
fn test_invalid_name_fails_at_load() {
    let (_dir, path) = create_test_config("options:\n  - name: email\n");
    assert!(parse_config_file(&path).is_ok());
    let err = load_parser(&path).err().unwrap();
    assert!(matches!(
        err,
        QelError::Config(ConfigError::NonOptionKey(_))
    ));
}
