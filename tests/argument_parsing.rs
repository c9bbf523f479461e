//! Integration tests for argument parsing, usage and completion

mod common;

use common::{args, env};
use qel::cli::{complete, tokenize, CompletionRequest, Outcome, Parser, ParserOptions, Spec};
use qel::validate::{flag, number, string, Builder, Flow};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn parser(spec: Spec) -> Parser {
    Parser::new(&spec, ParserOptions::new().with_script_name("test")).unwrap()
}

#[test]
fn test_short_alias_resolves_to_canonical() {
    let p = parser(
        Spec::new()
            .arg("--email", string().format("email").required())
            .alias("-e", "--email"),
    );
    let result = p.parse_with_env(&args(&["-e", "a@b.co"]), &HashMap::new()).unwrap();
    assert_eq!(result.str("--email"), Some("a@b.co"));
    assert_eq!(result.str("-e"), Some("a@b.co"));
    assert!(result.positionals().is_empty());

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json, serde_json::json!({"--email": "a@b.co", "_": []}));
}

#[test]
fn test_count_flag() {
    let p = parser(Spec::new().multi("--count", flag().count()));
    let result = p
        .parse_with_env(&args(&["--count", "--count", "--count"]), &HashMap::new())
        .unwrap();
    assert_eq!(result.num("--count"), Some(3.0));
}

#[test]
fn test_enum_violation_lists_choices() {
    let p = parser(Spec::new().arg("--cmd", string().one_of(["date", "uptime"])));
    let err = p
        .parse_with_env(&args(&["--cmd=unknown"]), &HashMap::new())
        .unwrap_err();
    assert_eq!(err.code(), "InvalidOptionValue");
    assert!(err.to_string().contains("[date, uptime]"));
}

#[test]
fn test_value_precedence() {
    let p = parser(Spec::new().arg("--name", string().env("NAME").default("fallback")));
    let from_argv = p
        .parse_with_env(&args(&["--name", "argv"]), &env(&[("NAME", "env")]))
        .unwrap();
    assert_eq!(from_argv.str("--name"), Some("argv"));

    let from_env = p.parse_with_env(&[], &env(&[("NAME", "env")])).unwrap();
    assert_eq!(from_env.str("--name"), Some("env"));

    let from_default = p.parse_with_env(&[], &HashMap::new()).unwrap();
    assert_eq!(from_default.str("--name"), Some("fallback"));
}

#[test]
fn test_negation_last_occurrence_wins() {
    let p = parser(Spec::new().arg("--color", flag()));
    let off = p
        .parse_with_env(&args(&["--color", "--no-color"]), &HashMap::new())
        .unwrap();
    assert!(!off.flag("--color"));
    let on = p
        .parse_with_env(&args(&["--no-color", "--color"]), &HashMap::new())
        .unwrap();
    assert!(on.flag("--color"));
}

#[test]
fn test_multi_values_keep_order() {
    let p = parser(Spec::new().multi("--tag", string()).alias("-t", "--tag"));
    let result = p
        .parse_with_env(&args(&["-t", "b", "--tag", "a", "-t", "c"]), &HashMap::new())
        .unwrap();
    let tags: Vec<&str> = result.list("--tag").iter().filter_map(|v| v.as_str()).collect();
    assert_eq!(tags, vec!["b", "a", "c"]);
}

#[test]
fn test_stop_skips_later_constraints() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let p = parser(Spec::new().arg(
        "--n",
        number()
            .custom(|_| Ok(Flow::Stop))
            .custom(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Err("unreachable".to_string())
            }),
    ));
    let result = p.parse_with_env(&args(&["--n", "4"]), &HashMap::new()).unwrap();
    assert_eq!(result.num("--n"), Some(4.0));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_run_prints_usage_on_error() {
    let p = parser(Spec::new().arg("--n", number().required()));
    let mut out = Vec::new();
    let mut err = Vec::new();
    let outcome = p
        .run_from(&[], &HashMap::new(), &mut out, &mut err)
        .unwrap();
    assert!(matches!(outcome, Outcome::Exit(2)));
    let text = String::from_utf8(err).unwrap();
    assert!(text.contains("'--n' is required"));
    assert!(text.contains("--n"));
    assert!(out.is_empty());
}

#[test]
fn test_completion_mode_answers_and_exits() {
    let p = parser(
        Spec::new()
            .arg("--cmd", string().one_of(["date", "uptime"]))
            .arg("--verbose", flag()),
    );
    let mut out = Vec::new();
    let mut err = Vec::new();
    let outcome = p
        .run_from(
            &[],
            &env(&[("COMP_LINE", "test --cmd u"), ("COMP_POINT", "12")]),
            &mut out,
            &mut err,
        )
        .unwrap();
    assert!(matches!(outcome, Outcome::Exit(0)));
    assert_eq!(String::from_utf8(out).unwrap(), "uptime\n");
}

#[test]
fn test_completion_offers_unused_options() {
    let p = parser(Spec::new().arg("--alpha", flag()).arg("--beta", string()));
    let request = CompletionRequest::new("test --alpha --", 15);
    let items = complete(p.spec(), &request, &HashMap::new());
    assert!(items.contains(&"--beta".to_string()));
    assert!(!items.contains(&"--alpha".to_string()));
}

#[test]
fn test_tokenizer_keeps_subshell_in_quotes() {
    let tokens = tokenize(r#"echo "User: $(whoami)""#);
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[0].content, "echo");
    assert_eq!(tokens[0].index, 0);
    assert_eq!(tokens[0].quote, None);
    assert_eq!(tokens[1].content, "User: $(whoami)");
    assert_eq!(tokens[1].index, 5);
    assert_eq!(tokens[1].quote, Some('"'));
    assert!(tokens[1].closed);
}

#[test]
fn test_cloned_validator_is_independent() {
    let base = string().description("base");
    let copy = base.clone().required();
    let p = parser(Spec::new().arg("--a", base).arg("--b", copy));
    assert!(p.parse_with_env(&[], &HashMap::new()).is_err());
    let result = p
        .parse_with_env(&args(&["--b", "x"]), &HashMap::new())
        .unwrap();
    assert!(!result.has("--a"));
}
