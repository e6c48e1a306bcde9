//! Argument definitions for the `rca` binary

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{value_parser, Arg, ArgAction, Command};
use rca_core::MAX_WINDOW_DAYS;
use rca_domain::{
    ActionId, ActionType, Environment, EvidenceKind, IncidentId, RcaId, RcaStatus, Severity,
    VerificationOutcome,
};

/// Default location of the state file
pub(crate) const DEFAULT_STATE_FILE: &str = "rca-state.json";

fn json_flag() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON")
}

fn rca_arg() -> Arg {
    Arg::new("rca")
        .long("rca")
        .required(true)
        .value_parser(value_parser!(RcaId))
        .help("RCA id (RCA-<ulid> or bare ulid)")
}

fn action_arg() -> Arg {
    Arg::new("action")
        .long("action")
        .required(true)
        .value_parser(value_parser!(ActionId))
        .help("Action id (ACT-<ulid> or bare ulid)")
}

fn text_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).required(true).help(help)
}

/// Build the full command tree
pub(crate) fn build() -> Command {
    Command::new("rca")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Closed-loop root-cause analysis: incidents, actions, evidence and verification")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("state")
                .long("state")
                .global(true)
                .default_value(DEFAULT_STATE_FILE)
                .value_parser(value_parser!(PathBuf))
                .help("JSON state file to load and save"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML workflow configuration"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines on stderr"),
        )
        .subcommand(
            Command::new("seed")
                .about("Load the demo data set")
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                ),
        )
        .subcommand(
            Command::new("incident")
                .about("Submit an incident, open its RCA and list similar prior RCAs")
                .arg(text_arg("title", "Short incident title"))
                .arg(text_arg("description", "What happened"))
                .arg(text_arg("site", "Site or organisation"))
                .arg(
                    Arg::new("occurred-at")
                        .long("occurred-at")
                        .value_parser(value_parser!(DateTime<Utc>))
                        .help("RFC 3339 timestamp (defaults to now)"),
                )
                .arg(
                    Arg::new("severity")
                        .long("severity")
                        .default_value("P3")
                        .value_parser(value_parser!(Severity))
                        .help("P1..P4"),
                )
                .arg(
                    Arg::new("environment")
                        .long("environment")
                        .default_value("Production")
                        .value_parser(value_parser!(Environment))
                        .help("Pre-Live, UAT or Production"),
                )
                .arg(
                    Arg::new("component")
                        .long("component")
                        .help("Affected system component"),
                )
                .arg(json_flag()),
        )
        .subcommand(
            Command::new("correct")
                .about("Correct fields of an existing incident")
                .arg(
                    Arg::new("incident")
                        .long("incident")
                        .required(true)
                        .value_parser(value_parser!(IncidentId))
                        .help("Incident id (INC-<ulid> or bare ulid)"),
                )
                .arg(Arg::new("title").long("title"))
                .arg(Arg::new("description").long("description"))
                .arg(Arg::new("site").long("site"))
                .arg(Arg::new("severity").long("severity").value_parser(value_parser!(Severity)))
                .arg(
                    Arg::new("environment")
                        .long("environment")
                        .value_parser(value_parser!(Environment)),
                )
                .arg(Arg::new("component").long("component")),
        )
        .subcommand(
            Command::new("similar")
                .about("Rank prior RCAs against free text")
                .arg(Arg::new("query").required(true).help("Free-text query"))
                .arg(
                    Arg::new("top-k")
                        .long("top-k")
                        .value_parser(value_parser!(usize))
                        .help("Maximum number of candidates"),
                )
                .arg(json_flag()),
        )
        .subcommand(
            Command::new("narrative")
                .about("Replace an RCA's root-cause narrative")
                .arg(rca_arg())
                .arg(text_arg("text", "Narrative text")),
        )
        .subcommand(
            Command::new("action")
                .about("Add a corrective action to an RCA")
                .arg(rca_arg())
                .arg(text_arg("description", "What will be done"))
                .arg(text_arg("owner", "Accountable owner"))
                .arg(
                    Arg::new("due")
                        .long("due")
                        .required(true)
                        .value_parser(value_parser!(NaiveDate))
                        .help("Due date (YYYY-MM-DD)"),
                )
                .arg(Arg::new("team").long("team").help("Owning team"))
                .arg(
                    Arg::new("type")
                        .long("type")
                        .value_parser(value_parser!(ActionType))
                        .help("Prevent, Detect, Process, Code fix, Config or Test coverage"),
                )
                .arg(
                    Arg::new("method")
                        .long("method")
                        .help("How completion will be verified"),
                ),
        )
        .subcommand(
            Command::new("evidence")
                .about("Attach evidence to an action")
                .arg(action_arg())
                .arg(
                    Arg::new("kind")
                        .long("kind")
                        .default_value("Link")
                        .value_parser(value_parser!(EvidenceKind))
                        .help("Link, File note, Screenshot note, Test run note or Monitoring note"),
                )
                .arg(text_arg("reference", "URL or note"))
                .arg(text_arg("by", "Submitter")),
        )
        .subcommand(
            Command::new("verify")
                .about("Record a verification decision on an action")
                .arg(action_arg())
                .arg(text_arg("verifier", "Verifier name"))
                .arg(
                    Arg::new("outcome")
                        .long("outcome")
                        .required(true)
                        .value_parser(value_parser!(VerificationOutcome))
                        .help("Pass or Fail"),
                )
                .arg(Arg::new("notes").long("notes").help("Free-text notes")),
        )
        .subcommand(
            Command::new("close")
                .about("Close an RCA once every action is verified")
                .arg(rca_arg()),
        )
        .subcommand(
            Command::new("dashboard")
                .about("Aggregate KPIs across open RCAs")
                .arg(json_flag()),
        )
        .subcommand(
            Command::new("detail")
                .about("Show an RCA with its actions, evidence and verifications")
                .arg(rca_arg())
                .arg(json_flag()),
        )
        .subcommand(
            Command::new("audit")
                .about("List RCAs for audit review")
                .arg(
                    Arg::new("environment")
                        .long("environment")
                        .value_parser(value_parser!(Environment)),
                )
                .arg(
                    Arg::new("status")
                        .long("status")
                        .value_parser(value_parser!(RcaStatus)),
                )
                .arg(
                    Arg::new("days")
                        .long("days")
                        .value_parser(value_parser!(u32).range(0..=i64::from(MAX_WINDOW_DAYS)))
                        .help("Only RCAs created within this many days"),
                )
                .arg(
                    Arg::new("site")
                        .long("site")
                        .help("Only RCAs whose site contains this text"),
                )
                .arg(
                    Arg::new("pre-live")
                        .long("pre-live")
                        .action(ArgAction::SetTrue)
                        .conflicts_with_all(["environment", "days"])
                        .help("Pre-Live RCAs from the last six months"),
                )
                .arg(json_flag()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_tree_is_consistent() {
        build().debug_assert();
    }

    #[test]
    fn global_state_defaults() {
        let matches = build().try_get_matches_from(["rca", "dashboard"]).unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "dashboard");
        assert_eq!(
            sub.get_one::<PathBuf>("state").unwrap(),
            &PathBuf::from(DEFAULT_STATE_FILE)
        );
        assert!(!sub.get_flag("json"));
    }

    #[test]
    fn action_parses_typed_values() {
        let id: RcaId = "01ARZ3NDEKTSV4RRFFQ69G5FAV".parse().unwrap();
        let matches = build()
            .try_get_matches_from([
                "rca",
                "action",
                "--rca",
                &id.to_string(),
                "--description",
                "Replace seal",
                "--owner",
                "Alice",
                "--due",
                "2024-06-10",
                "--type",
                "code-fix",
            ])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(sub.get_one::<RcaId>("rca"), Some(&id));
        assert_eq!(
            sub.get_one::<NaiveDate>("due"),
            NaiveDate::from_ymd_opt(2024, 6, 10).as_ref()
        );
        assert_eq!(sub.get_one::<ActionType>("type"), Some(&ActionType::CodeFix));
    }

    #[test]
    fn rejects_bad_ids_and_enums() {
        assert!(build()
            .try_get_matches_from(["rca", "close", "--rca", "not-an-id"])
            .is_err());
        assert!(build()
            .try_get_matches_from([
                "rca", "verify", "--action", "01ARZ3NDEKTSV4RRFFQ69G5FAV", "--verifier", "QA",
                "--outcome", "Maybe",
            ])
            .is_err());
    }

    #[test]
    fn audit_window_is_bounded() {
        assert!(build()
            .try_get_matches_from(["rca", "audit", "--days", "4294967295"])
            .is_err());
        let matches = build()
            .try_get_matches_from(["rca", "audit", "--days", "36500", "--site", "Nissan"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(sub.get_one::<u32>("days"), Some(&MAX_WINDOW_DAYS));
        assert_eq!(sub.get_one::<String>("site").map(String::as_str), Some("Nissan"));
    }

    #[test]
    fn pre_live_conflicts_with_explicit_window() {
        assert!(build()
            .try_get_matches_from(["rca", "audit", "--pre-live", "--days", "10"])
            .is_err());
    }
}
