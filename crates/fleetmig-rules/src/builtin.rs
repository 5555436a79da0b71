//! Built-in `scraper-fleet` rule repository
//!
//! Migrates a legacy listing worker onto `scraper_runtime`:
//!
//! 1. Removal: duplicated helper definitions and the seen-file constant
//! 2. CallRewrite: helper calls take the shared signatures
//! 3. CoordinationMigration: global guard, lock and seen set become site-keyed

use crate::contract::CoordinationContract;
use crate::error::RepositoryError;
use crate::repository::RuleRepository;
use crate::rule::{Arity, Rule};
use crate::template::Matcher;

/// Version string of the built-in repository
pub const SCRAPER_FLEET_VERSION: &str = "scraper-fleet/v1";

/// Flag that keeps a worker's own browser driver helper
pub const PRESERVE_LEGACY_DRIVER: &str = "preserve_legacy_driver";

// Anything but an attribute access or a longer name may precede a helper call
const CALL_LEAD: &str = r"(?m)(?P<lead>^|[^.\w\n])";

/// The built-in repository
///
/// # Errors
/// Only fails if a built-in rule is malformed
pub fn scraper_fleet() -> Result<RuleRepository, RepositoryError> {
    let contract = CoordinationContract::scraper_runtime();
    let import_detector = format!(
        r"(?m)^from[ \t]+{}[ \t]+import\b",
        regex::escape(&contract.module)
    );
    let import_line = contract.import_line();

    let mut rules = removal_rules();
    rules.extend(call_rewrite_rules());
    rules.extend(coordination_rules(&import_line, &import_detector));

    RuleRepository::new(SCRAPER_FLEET_VERSION, contract, rules)
}

fn removal_rules() -> Vec<Rule> {
    let helper = |id: &str, name: &str| {
        Rule::removal(id, Matcher::python_def(name))
            .with_arity(Arity::ZeroOrOne)
            .describe(format!("delete local `{name}`, provided by the shared runtime"))
    };

    vec![
        helper("remove-get-random-user-agent", "get_random_user_agent"),
        helper("remove-get-realistic-headers", "get_realistic_headers"),
        helper("remove-load-seen", "load_seen"),
        helper("remove-save-seen", "save_seen"),
        helper("remove-rate-limit", "rate_limit"),
        helper("remove-legacy-driver", "get_driver")
            .when_flag(PRESERVE_LEGACY_DRIVER, false),
        Rule::removal(
            "remove-seen-file-constant",
            Matcher::pattern(r"(?m)^SEEN_FILE[ \t]*=[^\n]*\n"),
        )
        .with_arity(Arity::ZeroOrOne)
        .describe("seen-set persistence path is owned by the runtime"),
    ]
}

fn call_rewrite_rules() -> Vec<Rule> {
    vec![
        Rule::call_rewrite(
            "call-random-user-agent",
            Matcher::pattern(r"\bget_random_user_agent\(\)"),
            "random_user_agent()",
        ),
        Rule::call_rewrite(
            "call-realistic-headers",
            Matcher::pattern(r"\bget_realistic_headers\(\)"),
            r#"realistic_headers("{base_url}")"#,
        )
        .describe("headers are built for the worker's own base URL"),
        Rule::call_rewrite(
            "call-rate-limit",
            Matcher::pattern(format!(r"{CALL_LEAD}rate_limit\(\)")),
            r#"${lead}rate_limit("{site_id}")"#,
        ),
        Rule::call_rewrite(
            "call-rate-limit-delay",
            Matcher::pattern(format!(
                r"{CALL_LEAD}rate_limit\((?P<delay>(?:delay[ \t]*=[ \t]*)?[0-9]+(?:\.[0-9]+)?)\)"
            )),
            r#"${lead}rate_limit("{site_id}", ${delay})"#,
        ),
    ]
}

fn coordination_rules(import_line: &str, import_detector: &str) -> Vec<Rule> {
    vec![
        Rule::coordination(
            "coord-guard-declaration",
            Matcher::pattern(r"(?m)^_recursion_guard[ \t]*=[ \t]*threading\.local\(\)[ \t]*\n"),
            format!("{import_line}\n"),
        )
        .with_arity(Arity::ExactlyOne)
        .already_applied(import_detector)
        .describe("process-wide guard becomes the shared runtime import"),
        Rule::coordination(
            "coord-seen-lock-declaration",
            Matcher::pattern(r"(?m)^_seen_lock[ \t]*=[ \t]*threading\.R?Lock\(\)[ \t]*\n"),
            "",
        )
        .with_arity(Arity::ZeroOrOne),
        Rule::coordination(
            "coord-guard-check",
            Matcher::pattern(
                r#"(?m)^(?P<indent>[ \t]*)if getattr\(_recursion_guard,[ \t]*['"]in_scraper['"],[ \t]*False\):"#,
            ),
            r#"${indent}if not acquire_guard("{site_id}"):"#,
        )
        .with_arity(Arity::ExactlyOne)
        .already_applied(r#"acquire_guard\("{site_id}"\)"#)
        .describe("check-and-set of the worker's own guard"),
        Rule::coordination(
            "coord-guard-set",
            Matcher::pattern(r"(?m)^[ \t]*_recursion_guard\.in_scraper[ \t]*=[ \t]*True[ \t]*\n"),
            "",
        )
        .with_arity(Arity::ZeroOrOne)
        .describe("acquire_guard sets the flag itself"),
        Rule::coordination(
            "coord-guard-clear",
            Matcher::pattern(
                r"(?m)^(?P<indent>[ \t]*)_recursion_guard\.in_scraper[ \t]*=[ \t]*False",
            ),
            r#"${indent}release_guard("{site_id}")"#,
        ),
        Rule::coordination(
            "coord-seen-lock",
            Matcher::pattern(r"\bwith _seen_lock:"),
            r#"with lock_for("{site_id}"):"#,
        ),
        Rule::coordination(
            "coord-seen-declaration",
            Matcher::pattern(r"(?m)^(?P<name>seen_ids)[ \t]*=[ \t]*set\(\)"),
            r#"${name} = load_seen("{site_id}")"#,
        )
        .with_arity(Arity::ZeroOrOne),
        Rule::coordination(
            "coord-load-seen",
            Matcher::pattern(format!(r"{CALL_LEAD}load_seen\(\)")),
            r#"${lead}load_seen("{site_id}")"#,
        ),
        Rule::coordination(
            "coord-save-seen",
            Matcher::pattern(format!(r"{CALL_LEAD}save_seen\(\)")),
            r#"${lead}save_seen("{site_id}", seen_ids)"#,
        ),
        Rule::coordination(
            "coord-save-seen-arg",
            Matcher::pattern(format!(
                r"{CALL_LEAD}save_seen\((?P<set>[A-Za-z_][A-Za-z0-9_]*)\)"
            )),
            r#"${lead}save_seen("{site_id}", ${set})"#,
        ),
    ]
}
