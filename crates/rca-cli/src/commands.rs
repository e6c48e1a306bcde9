//! Subcommand execution against a state-file backed workflow
//!
//! Every invocation loads the state file (if present), runs one command and
//! writes the state back when the command changed anything.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, Utc};
use clap::ArgMatches;
use rca_core::{AuditFilter, WorkflowConfig, WorkflowOrchestrator};
use rca_domain::{
    ActionDraft, ActionId, ActionType, Environment, EvidenceDraft, EvidenceKind,
    IncidentCorrection, IncidentDraft, IncidentId, RcaId, RcaStatus, Severity, VerificationDraft,
    VerificationOutcome,
};
use rca_store::{load_snapshot, save_snapshot, MemoryStore};

use crate::cli::DEFAULT_STATE_FILE;
use crate::render;

/// Whether a command changed stored records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    ReadOnly,
    Mutated,
}

/// Run the selected subcommand
pub(crate) async fn run(matches: &ArgMatches) -> anyhow::Result<()> {
    let Some((name, args)) = matches.subcommand() else {
        bail!("no command given");
    };

    let state = args
        .get_one::<PathBuf>("state")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE));
    let config = match args.get_one::<PathBuf>("config") {
        Some(path) => WorkflowConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => WorkflowConfig::default(),
    };

    let wf = open(config, &state).await?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if execute(&wf, name, args, &mut out).await? == Outcome::Mutated {
        let snapshot = wf.export_snapshot().await;
        save_snapshot(&state, &snapshot)
            .with_context(|| format!("saving state to {}", state.display()))?;
        tracing::debug!(path = %state.display(), records = snapshot.record_count(), "state saved");
    }
    out.flush()?;
    Ok(())
}

async fn open(config: WorkflowConfig, state: &Path) -> anyhow::Result<WorkflowOrchestrator> {
    let wf = WorkflowOrchestrator::with_store(config, Arc::new(MemoryStore::new()));
    let loaded = load_snapshot(state)
        .with_context(|| format!("loading state from {}", state.display()))?;
    match loaded {
        Some(snapshot) => {
            tracing::debug!(path = %state.display(), records = snapshot.record_count(), "state loaded");
            wf.import_snapshot(snapshot).await?;
        }
        None => tracing::debug!(path = %state.display(), "no state file; starting empty"),
    }
    Ok(wf)
}

fn required<'a, T>(args: &'a ArgMatches, id: &str) -> anyhow::Result<&'a T>
where
    T: Clone + Send + Sync + 'static,
{
    args.get_one::<T>(id)
        .with_context(|| format!("missing required argument --{id}"))
}

fn optional_string(args: &ArgMatches, id: &str) -> Option<String> {
    args.get_one::<String>(id).cloned()
}

async fn execute(
    wf: &WorkflowOrchestrator,
    name: &str,
    args: &ArgMatches,
    out: &mut dyn Write,
) -> anyhow::Result<Outcome> {
    let json = args.try_get_one::<bool>("json").ok().flatten().copied().unwrap_or(false);

    match name {
        "seed" => {
            let seed = *required::<u64>(args, "seed")?;
            let records = wf.seed_demo(seed).await?;
            writeln!(out, "Seeded {records} demo records (seed {seed}).")?;
            Ok(Outcome::Mutated)
        }
        "incident" => {
            let occurred_at = args
                .get_one::<DateTime<Utc>>("occurred-at")
                .copied()
                .unwrap_or_else(|| wf.now());
            let mut draft = IncidentDraft::new(
                required::<String>(args, "title")?.as_str(),
                required::<String>(args, "description")?.as_str(),
                required::<String>(args, "site")?.as_str(),
                occurred_at,
            )
            .with_severity(*required::<Severity>(args, "severity")?)
            .with_environment(*required::<Environment>(args, "environment")?);
            if let Some(component) = optional_string(args, "component") {
                draft = draft.with_component(component);
            }

            let intake = wf.submit_incident(draft).await?;
            if json {
                render::json(out, &intake)?;
            } else {
                render::intake(out, &intake)?;
            }
            Ok(Outcome::Mutated)
        }
        "correct" => {
            let incident_id = *required::<IncidentId>(args, "incident")?;
            let correction = IncidentCorrection {
                title: optional_string(args, "title"),
                description: optional_string(args, "description"),
                severity: args.get_one::<Severity>("severity").copied(),
                site: optional_string(args, "site"),
                environment: args.get_one::<Environment>("environment").copied(),
                system_component: optional_string(args, "component"),
            };
            let incident = wf.correct_incident(incident_id, correction).await?;
            writeln!(out, "Incident {} updated: {}", incident.id, incident.title)?;
            Ok(Outcome::Mutated)
        }
        "similar" => {
            let query = required::<String>(args, "query")?;
            let top_k = args.get_one::<usize>("top-k").copied();
            let candidates = wf.find_similar(query, top_k).await?;
            if json {
                render::json(out, &candidates)?;
            } else {
                render::candidates(out, &candidates)?;
            }
            Ok(Outcome::ReadOnly)
        }
        "narrative" => {
            let rca_id = *required::<RcaId>(args, "rca")?;
            let text = required::<String>(args, "text")?;
            let rca = wf.update_narrative(rca_id, text.as_str()).await?;
            writeln!(out, "Narrative of {} updated ({} chars).", rca.id, rca.narrative.len())?;
            Ok(Outcome::Mutated)
        }
        "action" => {
            let rca_id = *required::<RcaId>(args, "rca")?;
            let mut draft = ActionDraft::new(
                required::<String>(args, "description")?.as_str(),
                required::<String>(args, "owner")?.as_str(),
                *required::<NaiveDate>(args, "due")?,
            );
            if let Some(team) = optional_string(args, "team") {
                draft = draft.with_team(team);
            }
            if let Some(action_type) = args.get_one::<ActionType>("type") {
                draft = draft.with_type(*action_type);
            }
            if let Some(method) = optional_string(args, "method") {
                draft = draft.with_verification_method(method);
            }

            let action = wf.add_action(rca_id, draft).await?;
            let rca = wf.rca(rca_id).await?;
            writeln!(out, "Action {} added [{}].", action.id, action.status())?;
            writeln!(out, "RCA {} is {}.", rca.id, rca.status())?;
            Ok(Outcome::Mutated)
        }
        "evidence" => {
            let action_id = *required::<ActionId>(args, "action")?;
            let draft = EvidenceDraft::new(
                *required::<EvidenceKind>(args, "kind")?,
                required::<String>(args, "reference")?.as_str(),
                required::<String>(args, "by")?.as_str(),
            );
            let evidence = wf.add_evidence(action_id, draft).await?;
            writeln!(out, "Evidence {} attached.", evidence.id)?;
            report_action(wf, action_id, out).await?;
            Ok(Outcome::Mutated)
        }
        "verify" => {
            let action_id = *required::<ActionId>(args, "action")?;
            let verifier = required::<String>(args, "verifier")?.as_str();
            let mut draft = match required::<VerificationOutcome>(args, "outcome")? {
                VerificationOutcome::Pass => VerificationDraft::pass(verifier),
                VerificationOutcome::Fail => VerificationDraft::fail(verifier),
            };
            if let Some(notes) = optional_string(args, "notes") {
                draft = draft.with_notes(notes);
            }
            let verification = wf.add_verification(action_id, draft).await?;
            writeln!(out, "Verification {} recorded ({}).", verification.id, verification.outcome)?;
            report_action(wf, action_id, out).await?;
            Ok(Outcome::Mutated)
        }
        "close" => {
            let rca_id = *required::<RcaId>(args, "rca")?;
            let rca = wf.close_rca(rca_id).await?;
            writeln!(out, "RCA {} is {}.", rca.id, rca.status())?;
            Ok(Outcome::ReadOnly)
        }
        "dashboard" => {
            let snapshot = wf.dashboard_snapshot().await?;
            if json {
                render::json(out, &snapshot)?;
            } else {
                render::dashboard(out, &snapshot)?;
            }
            Ok(Outcome::ReadOnly)
        }
        "detail" => {
            let detail = wf.rca_detail(*required::<RcaId>(args, "rca")?).await?;
            if json {
                render::json(out, &detail)?;
            } else {
                render::detail(out, &detail)?;
            }
            Ok(Outcome::ReadOnly)
        }
        "audit" => {
            let filter = audit_filter(args);
            let rows = wf.audit_view(filter).await?;
            if json {
                render::json(out, &rows)?;
            } else {
                render::audit(out, &rows)?;
            }
            Ok(Outcome::ReadOnly)
        }
        other => bail!("unknown command: {other}"),
    }
}

fn audit_filter(args: &ArgMatches) -> AuditFilter {
    let mut filter = if args.get_flag("pre-live") {
        AuditFilter::pre_live_last_six_months()
    } else {
        AuditFilter::default()
    };
    if let Some(environment) = args.get_one::<Environment>("environment") {
        filter = filter.with_environment(*environment);
    }
    if let Some(status) = args.get_one::<RcaStatus>("status") {
        filter = filter.with_status(*status);
    }
    if let Some(days) = args.get_one::<u32>("days") {
        filter = filter.within_days(*days);
    }
    if let Some(site) = optional_string(args, "site") {
        filter = filter.with_site(site);
    }
    filter
}

async fn report_action(
    wf: &WorkflowOrchestrator,
    action_id: ActionId,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let action = wf.action(action_id).await?;
    let rca = wf.rca(action.rca_id).await?;
    writeln!(out, "Action {} is {}.", action.id, action.status())?;
    writeln!(out, "RCA {} is {}.", rca.id, rca.status())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli;

    async fn invoke(state: &Path, argv: &[&str]) -> anyhow::Result<(Outcome, String)> {
        let mut full = vec!["rca", "--state"];
        let state = state.to_str().unwrap();
        full.push(state);
        full.extend_from_slice(argv);
        let matches = cli::build().try_get_matches_from(full)?;
        let (name, args) = matches.subcommand().unwrap();
        let wf = open(WorkflowConfig::default(), state.as_ref()).await?;
        let mut buf = Vec::new();
        let outcome = execute(&wf, name, args, &mut buf).await?;
        if outcome == Outcome::Mutated {
            save_snapshot(state.as_ref(), &wf.export_snapshot().await)?;
        }
        Ok((outcome, String::from_utf8(buf)?))
    }

    #[tokio::test]
    async fn seed_then_dashboard_reads_persisted_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");

        let (outcome, text) = invoke(&state, &["seed", "--seed", "7"]).await.unwrap();
        assert_eq!(outcome, Outcome::Mutated);
        assert!(text.starts_with("Seeded "));
        assert!(state.exists());

        let (outcome, text) = invoke(&state, &["dashboard"]).await.unwrap();
        assert_eq!(outcome, Outcome::ReadOnly);
        assert!(text.contains("RCAs: 6 total"));
    }

    #[tokio::test]
    async fn audit_site_option_narrows_rows() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");
        invoke(&state, &["seed"]).await.unwrap();

        let (_, text) = invoke(&state, &["audit", "--site", "nissan", "--json"])
            .await
            .unwrap();
        let rows: Vec<serde_json::Value> = serde_json::from_str(&text).unwrap();
        assert!(!rows.is_empty());
        assert!(rows.iter().all(|row| row["site"] == "Nissan"));
    }

    #[tokio::test]
    async fn close_refusal_surfaces_as_workflow_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");

        let (_, text) = invoke(
            &state,
            &[
                "incident",
                "--title",
                "Pump seal failure",
                "--description",
                "Seal leaking on line 3",
                "--site",
                "Plant A",
                "--json",
            ],
        )
        .await
        .unwrap();
        let intake: serde_json::Value = serde_json::from_str(&text).unwrap();
        let rca_id = intake["rca"]["id"].as_str().unwrap().to_string();

        let err = invoke(&state, &["close", "--rca", &rca_id]).await.unwrap_err();
        let workflow = err.downcast_ref::<rca_core::WorkflowError>().unwrap();
        assert_eq!(workflow.kind(), rca_core::ErrorKind::GateNotSatisfied);
    }
}
