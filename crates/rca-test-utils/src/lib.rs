//! Testing utilities for the RCA workspace
//!
//! Shared fixtures: a pinned clock, an orchestrator wired to it, and the
//! pump seal / gateway timeout drafts the scenario tests build on.

#![allow(missing_docs)]

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rca_core::{FixedClock, WorkflowConfig, WorkflowOrchestrator};
use rca_domain::{
    ActionDraft, ActionId, ActionType, Environment, EvidenceDraft, EvidenceKind, IncidentDraft,
    RcaId, Severity, VerificationDraft,
};
use std::sync::Arc;

/// Fixed start of every test timeline
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
}

pub fn days_after_t0(days: i64) -> DateTime<Utc> {
    t0() + Duration::days(days)
}

pub fn date_after_t0(days: i64) -> NaiveDate {
    days_after_t0(days).date_naive()
}

pub struct TestWorkflow {
    pub wf: WorkflowOrchestrator,
    pub clock: Arc<FixedClock>,
}

impl TestWorkflow {
    pub fn advance_days(&self, days: i64) {
        self.clock.advance(Duration::days(days));
    }
}

pub fn setup_workflow() -> TestWorkflow {
    setup_workflow_with(WorkflowConfig::default())
}

pub fn setup_workflow_with(config: WorkflowConfig) -> TestWorkflow {
    let clock = Arc::new(FixedClock::new(t0()));
    let wf = WorkflowOrchestrator::new(config).with_clock(clock.clone());
    TestWorkflow { wf, clock }
}

pub fn pump_seal_incident() -> IncidentDraft {
    IncidentDraft::new(
        "Pump seal failure, Line 3",
        "Mechanical seal on the Line 3 transfer pump failed and leaked product",
        "Line 3",
        t0() - Duration::hours(2),
    )
    .with_severity(Severity::P2)
    .with_environment(Environment::Production)
    .with_component("Transfer pump")
}

pub fn unrelated_incidents() -> Vec<IncidentDraft> {
    [
        ("Gateway timeout during high latency calls", "Auth gateway dropped sessions", "API"),
        ("Conveyor belt misalignment", "Belt drifted off the rollers at packing", "Line 1"),
        ("Config drift between UAT and production", "Feature flags differed", "Platform"),
        ("Label printer firmware crash", "Printer rebooted mid-batch", "Line 2"),
    ]
    .into_iter()
    .map(|(title, description, site)| {
        IncidentDraft::new(title, description, site, t0() - Duration::hours(3))
    })
    .collect()
}

pub fn seal_action(owner: &str, due: NaiveDate) -> ActionDraft {
    ActionDraft::new("Replace mechanical seal with upgraded cartridge seal", owner, due)
        .with_type(ActionType::CodeFix)
        .with_team("Maintenance")
}

pub fn inspection_action(owner: &str, due: NaiveDate) -> ActionDraft {
    ActionDraft::new("Add seal inspection to weekly preventive maintenance", owner, due)
        .with_type(ActionType::Prevent)
        .with_team("Reliability")
        .with_verification_method("PM checklist record + two weeks of inspections")
}

pub fn evidence_from(submitter: &str) -> EvidenceDraft {
    EvidenceDraft::new(EvidenceKind::TestRunNote, "Pressure test passed after change", submitter)
}

pub fn pass_by(verifier: &str) -> VerificationDraft {
    VerificationDraft::pass(verifier).with_notes("Checked on site")
}

pub fn fail_by(verifier: &str) -> VerificationDraft {
    VerificationDraft::fail(verifier).with_notes("Seal weeping again")
}

/// Submit the pump seal incident with two actions that become overdue
///
/// Actions are due 3 and 5 days after submission; the clock then moves
/// forward 10 days.
pub async fn overdue_pump_seal(t: &TestWorkflow) -> (RcaId, ActionId, ActionId) {
    let submitted = t.wf.now();
    let due = |days: i64| (submitted + Duration::days(days)).date_naive();
    let intake = t.wf.submit_incident(pump_seal_incident()).await.unwrap();
    let rca = intake.rca.id;
    t.wf.update_narrative(rca, "Worn mechanical seal on the Line 3 pump; no inspection interval")
        .await
        .unwrap();
    let seal = t
        .wf
        .add_action(rca, seal_action("alice", due(3)))
        .await
        .unwrap();
    let inspection = t
        .wf
        .add_action(rca, inspection_action("bob", due(5)))
        .await
        .unwrap();
    t.advance_days(10);
    (rca, seal.id, inspection.id)
}
