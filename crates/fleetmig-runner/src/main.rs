//! `fleetmig` command line

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use fleetmig_rules::{builtin, RuleFamily, RuleRepository};
use fleetmig_runner::{
    atomic_replace, validate_targets, AggregateReport, FleetConfig, FsStore, RunOptions, Runner,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const EXIT_FAILED: i32 = 1;
const EXIT_CONFIG: i32 = 2;

fn cli() -> Command {
    let config = Arg::new("config")
        .long("config")
        .short('c')
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Fleet file listing the workers to migrate");
    let rules = Arg::new("rules")
        .long("rules")
        .value_parser(value_parser!(PathBuf))
        .help("Rule file; overrides the fleet file's `rules`");
    let json = Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Print the report as JSON");

    Command::new("fleetmig")
        .version(fleetmig_runner::VERSION)
        .about("Migrate scraper workers onto the shared site-keyed runtime")
        .subcommand_required(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON on stderr"),
        )
        .subcommand(
            Command::new("run")
                .about("Rewrite, verify and replace every target")
                .arg(config.clone())
                .arg(rules.clone())
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Do everything but write; report rule diagnostics"),
                )
                .arg(
                    Arg::new("only")
                        .long("only")
                        .value_delimiter(',')
                        .action(ArgAction::Append)
                        .help("Restrict the run to these site ids"),
                )
                .arg(json.clone())
                .arg(
                    Arg::new("report")
                        .long("report")
                        .value_parser(value_parser!(PathBuf))
                        .help("Also write the JSON report to this file"),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about("Check the target list and that every target is readable")
                .arg(config)
                .arg(json.clone()),
        )
        .subcommand(
            Command::new("rules")
                .about("List the rule repository in execution order")
                .arg(rules)
                .arg(json),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env("FLEETMIG_LOG")
        .unwrap_or_else(|_| EnvFilter::new("fleetmig=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let code = match dispatch(&matches) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_CONFIG
        }
    };
    std::process::exit(code);
}

fn dispatch(matches: &ArgMatches) -> Result<i32> {
    match matches.subcommand() {
        Some(("run", args)) => run(args),
        Some(("validate", args)) => validate(args),
        Some(("rules", args)) => list_rules(args),
        _ => Ok(EXIT_CONFIG),
    }
}

fn load_config(args: &ArgMatches) -> Result<FleetConfig> {
    let path = args
        .get_one::<PathBuf>("config")
        .context("--config is required")?;
    FleetConfig::load(path).with_context(|| format!("loading fleet file {}", path.display()))
}

fn run(args: &ArgMatches) -> Result<i32> {
    let config = load_config(args)?;
    let repo = config
        .repository(args.get_one::<PathBuf>("rules").map(PathBuf::as_path))
        .context("loading rule repository")?;

    let mut options = RunOptions {
        dry_run: args.get_flag("dry-run"),
        only: None,
    };
    if let Some(only) = args.get_many::<String>("only") {
        options = options.only(only.cloned());
    }

    let runner = Runner::new(&repo, FsStore)?;
    let report = runner.run(&config.targets, &options)?;

    if let Some(path) = args.get_one::<PathBuf>("report") {
        write_report(&report, path)?;
    }
    emit(&report, args.get_flag("json"))?;
    Ok(exit_code(&report))
}

fn validate(args: &ArgMatches) -> Result<i32> {
    let config = load_config(args)?;
    let report = validate_targets(&FsStore, &config.targets)?;
    emit(&report, args.get_flag("json"))?;
    Ok(exit_code(&report))
}

fn list_rules(args: &ArgMatches) -> Result<i32> {
    let repo = match args.get_one::<PathBuf>("rules") {
        Some(path) => RuleRepository::from_toml_path(path)
            .with_context(|| format!("loading rule file {}", path.display()))?,
        None => builtin::scraper_fleet()?,
    };

    if args.get_flag("json") {
        let listing = serde_json::json!({
            "version": repo.version(),
            "contract": repo.contract(),
            "rules": repo.all_rules(),
        });
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(0);
    }

    println!("Rules: {} ({} rules)", repo.version(), repo.len());
    for family in RuleFamily::ALL {
        println!("\n{}:", family.as_str());
        for rule in repo.rules_for(family) {
            let gate = rule
                .when()
                .map(|w| format!(" [when {} = {}]", w.flag, w.equals))
                .unwrap_or_default();
            println!("  {:<32} {:<12}{gate}", rule.id(), rule.arity().as_str());
            if !rule.description().is_empty() {
                println!("  {:<32} {}", "", rule.description());
            }
        }
    }
    Ok(0)
}

fn emit(report: &AggregateReport, json: bool) -> Result<()> {
    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.generate_text());
    }
    Ok(())
}

fn write_report(report: &AggregateReport, path: &Path) -> Result<()> {
    let json = report.to_json()?;
    atomic_replace(path, None, &json)
        .with_context(|| format!("writing report {}", path.display()))?;
    Ok(())
}

fn exit_code(report: &AggregateReport) -> i32 {
    if report.passed() {
        0
    } else {
        EXIT_FAILED
    }
}
