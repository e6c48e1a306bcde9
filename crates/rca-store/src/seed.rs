//! Deterministic demo data
//!
//! Reproduces the demo graph used for walkthroughs:
//! - a gateway timeout RCA 70 days old with one overdue action and one
//!   evidenced, independently verified action
//! - four Pre-Live RCAs backdated 5 to 175 days with 1 to 3 actions each
//! - a Production incident 3 days old that repeats the timeout issue
//!
//! Ids embed the backdated creation time so id order matches age. Cached
//! statuses are left at their initial values; recompute after loading.

use crate::snapshot::StoreSnapshot;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::Rng;
use rca_domain::{
    Action, ActionDraft, ActionId, ActionType, Environment, Evidence, EvidenceDraft, EvidenceId,
    EvidenceKind, Incident, IncidentDraft, IncidentId, Rca, RcaId, Severity, Verification,
    VerificationDraft, VerificationId,
};
use ulid::Ulid;

const PRE_LIVE_SITES: &[&str] = &["Nissan", "OEM-X", "OEM-Y"];
const PRE_LIVE_COMPONENTS: &[&str] = &["Payments", "Telemetry", "Provisioning", "Reporting"];
const PRE_LIVE_SEVERITIES: &[Severity] = &[Severity::P2, Severity::P3, Severity::P4];
const PRE_LIVE_TITLES: &[&str] = &[
    "UAT data mismatch carried into pre-live",
    "Retry logic missing for transient 502s",
    "Config drift between environments",
    "Missing test coverage for edge case",
];
const PRE_LIVE_ACTIONS: &[&str] = &[
    "Add regression test + attach test run output",
    "Update config and attach change record link",
    "Implement code fix and attach PR + release note",
    "Add monitoring dashboard panel and screenshot evidence",
];
const PRE_LIVE_TYPES: &[ActionType] = &[
    ActionType::TestCoverage,
    ActionType::Config,
    ActionType::CodeFix,
    ActionType::Detect,
];
const PRE_LIVE_OWNERS: &[&str] = &["Owner C", "Owner D", "Owner E"];

fn pick<T: Copy, R: Rng>(rng: &mut R, items: &[T]) -> T {
    items[rng.random_range(0..items.len())]
}

struct DemoBuilder<'r, R: Rng> {
    rng: &'r mut R,
    snapshot: StoreSnapshot,
}

impl<R: Rng> DemoBuilder<'_, R> {
    fn ulid(&mut self, at: DateTime<Utc>) -> Ulid {
        let ms = u64::try_from(at.timestamp_millis()).unwrap_or(0);
        Ulid::from_parts(ms, self.rng.random::<u128>())
    }

    fn incident(&mut self, draft: IncidentDraft, at: DateTime<Utc>) -> IncidentId {
        let id = IncidentId(self.ulid(at));
        self.snapshot.incidents.push(Incident::from_draft(id, draft, at));
        id
    }

    fn rca(&mut self, incident_id: IncidentId, narrative: &str, at: DateTime<Utc>) -> RcaId {
        let id = RcaId(self.ulid(at));
        self.snapshot
            .rcas
            .push(Rca::new(id, incident_id, narrative, at));
        id
    }

    fn action(&mut self, rca_id: RcaId, draft: ActionDraft, at: DateTime<Utc>) -> ActionId {
        let id = ActionId(self.ulid(at));
        self.snapshot
            .actions
            .push(Action::from_draft(id, rca_id, draft, at));
        id
    }

    fn evidence(&mut self, action_id: ActionId, draft: EvidenceDraft, at: DateTime<Utc>) {
        let id = EvidenceId(self.ulid(at));
        self.snapshot
            .evidence
            .push(Evidence::from_draft(id, action_id, draft, at));
    }

    fn verification(&mut self, action_id: ActionId, draft: VerificationDraft, at: DateTime<Utc>) {
        let id = VerificationId(self.ulid(at));
        self.snapshot
            .verifications
            .push(Verification::from_draft(id, action_id, draft, at));
    }
}

fn day(now: DateTime<Utc>, offset: i64) -> NaiveDate {
    (now + Duration::days(offset)).date_naive()
}

/// Build the demo record graph relative to `now`
///
/// The same `now` and RNG seed always produce the same snapshot.
pub fn demo_snapshot<R: Rng>(now: DateTime<Utc>, rng: &mut R) -> StoreSnapshot {
    let mut demo = DemoBuilder {
        rng,
        snapshot: StoreSnapshot::default(),
    };

    // gateway timeout with a verified alerting action
    let opened = now - Duration::days(70);
    let incident = demo.incident(
        IncidentDraft::new(
            "Intermittent session timeout during high-latency calls",
            "Sessions dropped in UAT when upstream calls exceeded the gateway timeout.",
            "Nissan",
            opened,
        )
        .with_environment(Environment::Uat)
        .with_component("Auth/API Gateway")
        .with_severity(Severity::P2),
        opened,
    );
    let rca = demo.rca(
        incident,
        "Gateway timeout thresholds not aligned across environments; missing regression test for slow responses.",
        opened,
    );
    demo.action(
        rca,
        ActionDraft::new(
            "Align timeout config across UAT and Production; add regression test simulating 95th percentile latency; attach before/after config + test run evidence.",
            "Owner A",
            day(now, -10),
        )
        .with_type(ActionType::Config)
        .with_team("Tech")
        .with_verification_method("Config diff + regression test run + monitoring screenshot"),
        opened,
    );
    let alerting = demo.action(
        rca,
        ActionDraft::new(
            "Add alerting for elevated gateway timeouts; validate alert triggers in UAT and capture screenshot.",
            "Owner B",
            day(now, -20),
        )
        .with_type(ActionType::Detect)
        .with_team("Tech")
        .with_verification_method("Alert config + test trigger evidence"),
        opened,
    );
    demo.evidence(
        alerting,
        EvidenceDraft::new(
            EvidenceKind::MonitoringNote,
            "Screenshot: Alert fired for simulated timeout (UAT)",
            "Owner B",
        ),
        now - Duration::days(16),
    );
    demo.verification(
        alerting,
        VerificationDraft::pass("QA Lead")
            .with_notes("Alert triggered as expected during simulated timeout."),
        now - Duration::days(15),
    );

    // low-volume Pre-Live RCAs for the audit view
    for _ in 0..4 {
        let rng = &mut *demo.rng;
        let opened = now - Duration::days(rng.random_range(5..=175));
        let title = pick(rng, PRE_LIVE_TITLES);
        let draft = IncidentDraft::new(title, title, pick(rng, PRE_LIVE_SITES), opened)
            .with_environment(Environment::PreLive)
            .with_component(pick(rng, PRE_LIVE_COMPONENTS))
            .with_severity(pick(rng, PRE_LIVE_SEVERITIES));
        let incident = demo.incident(draft, opened);
        let rca = demo.rca(
            incident,
            "Seeded demo RCA for audit view. Actions need evidence + verification.",
            opened,
        );

        let action_count = demo.rng.random_range(1..=3);
        for _ in 0..action_count {
            let rng = &mut *demo.rng;
            let due = day(now, rng.random_range(-20..=25)).max(opened.date_naive());
            let owner = pick(rng, PRE_LIVE_OWNERS);
            let draft = ActionDraft::new(pick(rng, PRE_LIVE_ACTIONS), owner, due)
                .with_type(pick(rng, PRE_LIVE_TYPES))
                .with_team("Tech")
                .with_verification_method("Evidence link + independent verification");
            let evidenced = rng.random_bool(1.0 / 3.0);
            let action = demo.action(rca, draft, opened);
            if evidenced {
                demo.evidence(
                    action,
                    EvidenceDraft::new(EvidenceKind::Link, "Change record link", owner),
                    opened + Duration::days(1),
                );
            }
        }
    }

    // recent repeat of the gateway timeout
    let reported = now - Duration::days(3);
    let incident = demo.incident(
        IncidentDraft::new(
            "Timeout observed again in Production for high latency calls",
            "Resembles prior UAT timeout issue.",
            "Nissan",
            reported,
        )
        .with_environment(Environment::Production)
        .with_component("Auth/API Gateway")
        .with_severity(Severity::P2),
        reported,
    );
    demo.rca(incident, "", reported);

    let mut snapshot = demo.snapshot;
    snapshot.incidents.sort_by_key(|i| i.id);
    snapshot.rcas.sort_by_key(|r| r.id);
    snapshot.actions.sort_by_key(|a| a.id);
    snapshot.evidence.sort_by_key(|e| e.id);
    snapshot.verifications.sort_by_key(|v| v.id);
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap()
    }

    #[test]
    fn same_seed_same_graph() {
        let a = demo_snapshot(now(), &mut StdRng::seed_from_u64(7));
        let b = demo_snapshot(now(), &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn every_rca_has_an_incident() {
        let snapshot = demo_snapshot(now(), &mut StdRng::seed_from_u64(1));
        assert_eq!(snapshot.rcas.len(), 6);
        assert_eq!(snapshot.incidents.len(), 6);
        for rca in &snapshot.rcas {
            assert!(snapshot.incidents.iter().any(|i| i.id == rca.incident_id));
        }
    }

    #[test]
    fn pre_live_rcas_fall_in_audit_window() {
        let snapshot = demo_snapshot(now(), &mut StdRng::seed_from_u64(3));
        let pre_live: Vec<&Incident> = snapshot
            .incidents
            .iter()
            .filter(|i| i.environment == Environment::PreLive)
            .collect();
        assert_eq!(pre_live.len(), 4);
        for incident in pre_live {
            let age = now() - incident.created_at;
            assert!((5..=175).contains(&age.num_days()));
        }
    }

    #[test]
    fn timeout_rca_carries_one_verified_action() {
        let snapshot = demo_snapshot(now(), &mut StdRng::seed_from_u64(9));
        assert_eq!(snapshot.verifications.len(), 1);
        let verified = snapshot.verifications[0].action_id;
        assert!(snapshot.evidence.iter().any(|e| e.action_id == verified));
    }

    #[test]
    fn id_order_follows_backdated_creation() {
        let snapshot = demo_snapshot(now(), &mut StdRng::seed_from_u64(11));
        let mut by_time = snapshot.rcas.clone();
        by_time.sort_by_key(|r| r.created_at);
        let ids: Vec<RcaId> = snapshot.rcas.iter().map(|r| r.id).collect();
        let time_ids: Vec<RcaId> = by_time.iter().map(|r| r.id).collect();
        assert_eq!(ids, time_ids);
    }
}
