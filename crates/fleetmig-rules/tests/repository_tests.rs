//! Rule repository loading and template properties
//!
//! Run with: cargo test --package fleetmig-rules --test repository_tests

use fleetmig_rules::prelude::*;
use fleetmig_rules::{RepositoryError, Template};
use proptest::prelude::*;
use std::io::Write;

const RULE_FILE: &str = r#"
version = "acme/v3"

[contract]
module = "acme_runtime"
keyed_functions = ["lock_for"]
legacy_identifiers = ["_lock"]

[[rules]]
id = "coord-lock"
family = "coordination_migration"
matcher = { kind = "pattern", source = '\bwith _lock:' }
rewrite = 'with lock_for("{site_id}"):'
description = "key the lock by site"

[[rules]]
id = "remove-helper"
family = "removal"
matcher = { kind = "block", source = 'def helper\(' }
arity = "zero-or-one"
when = { flag = "keep_helper", equals = false }
"#;

#[test]
fn loads_rule_file_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(RULE_FILE.as_bytes()).unwrap();

    let repo = RuleRepository::from_toml_path(file.path()).unwrap();
    assert_eq!(repo.version(), "acme/v3");
    assert_eq!(repo.contract().module, "acme_runtime");
    assert_eq!(
        repo.contract().import_line(),
        "from acme_runtime import lock_for"
    );

    let ids: Vec<_> = repo.all_rules().iter().map(Rule::id).collect();
    assert_eq!(ids, vec!["remove-helper", "coord-lock"]);
    assert_eq!(
        repo.get("coord-lock").unwrap().description(),
        "key the lock by site"
    );
}

#[test]
fn parse_error_carries_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"[[rules]]\nid = 3\n").unwrap();

    let err = RuleRepository::from_toml_path(file.path()).unwrap_err();
    match err {
        RepositoryError::Parse { path, .. } => assert_eq!(path.as_deref(), Some(file.path())),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn invalid_rewrite_in_file_rejected() {
    let text = r#"
        version = "bad/v1"

        [[rules]]
        id = "call-x"
        family = "call_rewrite"
        matcher = { kind = "pattern", source = 'x\(\)' }
        rewrite = '${missing}y()'
    "#;
    let err = RuleRepository::from_toml_str(text).unwrap_err();
    assert!(err.to_string().contains("call-x"));
}

proptest! {
    #[test]
    fn substituted_site_is_matched_literally(site in "[a-z0-9_]{1,16}") {
        let rule = Rule::call_rewrite(
            "call-probe",
            Matcher::pattern(r#"probe\("{site_id}"\)"#),
            "ok()",
        );
        let params = TemplateParams::new(&site, "https://example.com");
        let compiled = rule.compile(params).unwrap();

        let call = format!("probe(\"{site}\")");
        prop_assert_eq!(compiled.count(&call), 1);
        prop_assert_eq!(compiled.replace_all(&call), "ok()");
    }

    #[test]
    fn rewrite_keeps_dollars_in_urls_literal(path in "[a-z$]{0,12}") {
        let url = format!("https://example.com/{path}");
        let template = Template::new(r#"headers("{base_url}")"#);
        let rewrite = template.instantiate_rewrite(TemplateParams::new("s", &url));

        let regex = regex::Regex::new("x").unwrap();
        prop_assert_eq!(
            regex.replace_all("x", rewrite.as_str()).into_owned(),
            format!("headers(\"{url}\")")
        );
    }
}
