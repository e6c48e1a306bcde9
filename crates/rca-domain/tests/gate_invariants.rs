//! Property tests for the closure gate invariants
//!
//! - An RCA is Closed iff it has at least one action and every action is Verified.
//! - An action is Verified iff it has evidence and its latest verification passed.
//! - Applying outcomes never rewrites `closed_at` once set.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rca_domain::gate::{self, derive_action_status};
use rca_domain::{
    Action, ActionDraft, ActionId, ActionStatus, Evidence, EvidenceId, EvidenceKind, IncidentId,
    Rca, RcaId, RcaStatus, Verification, VerificationId, VerificationOutcome,
};
use std::collections::HashMap;
use ulid::Ulid;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Shape of one generated action: evidence count and verification outcomes in time order
#[derive(Debug, Clone)]
struct ActionShape {
    evidence: usize,
    outcomes: Vec<bool>,
}

fn action_shape() -> impl Strategy<Value = ActionShape> {
    (0usize..3, prop::collection::vec(any::<bool>(), 0..4))
        .prop_map(|(evidence, outcomes)| ActionShape { evidence, outcomes })
}

struct Aggregate {
    rca: Rca,
    actions: Vec<Action>,
    evidence: HashMap<ActionId, Vec<Evidence>>,
    verifications: HashMap<ActionId, Vec<Verification>>,
}

fn build(shapes: &[ActionShape]) -> Aggregate {
    let rca = Rca::new(RcaId(Ulid::new()), IncidentId(Ulid::new()), "", base());
    let due = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
    let mut actions = Vec::new();
    let mut evidence = HashMap::new();
    let mut verifications = HashMap::new();

    for shape in shapes {
        let action = Action::from_draft(
            ActionId(Ulid::new()),
            rca.id,
            ActionDraft::new("fix", "owner", due),
            base(),
        );
        let records: Vec<Evidence> = (0..shape.evidence)
            .map(|i| Evidence {
                id: EvidenceId(Ulid::new()),
                action_id: action.id,
                kind: EvidenceKind::Link,
                reference: format!("ref-{i}"),
                submitted_by: "owner".into(),
                submitted_at: base(),
            })
            .collect();
        let checks: Vec<Verification> = shape
            .outcomes
            .iter()
            .enumerate()
            .map(|(i, pass)| Verification {
                id: VerificationId(Ulid::new()),
                action_id: action.id,
                verifier: "qa".into(),
                outcome: if *pass {
                    VerificationOutcome::Pass
                } else {
                    VerificationOutcome::Fail
                },
                notes: None,
                verified_at: base() + Duration::minutes(i64::try_from(i).unwrap()),
            })
            .collect();
        evidence.insert(action.id, records);
        verifications.insert(action.id, checks);
        actions.push(action);
    }

    Aggregate {
        rca,
        actions,
        evidence,
        verifications,
    }
}

proptest! {
    #[test]
    fn prop_closed_iff_all_actions_verified(shapes in prop::collection::vec(action_shape(), 0..6)) {
        let agg = build(&shapes);
        let outcome = gate::recompute(&agg.rca, &agg.actions, &agg.evidence, &agg.verifications, base());

        let all_verified = !outcome.verdicts().is_empty()
            && outcome.verdicts().iter().all(|v| v.status == ActionStatus::Verified);
        prop_assert_eq!(outcome.status() == RcaStatus::Closed, all_verified);
        prop_assert_eq!(outcome.require_closed().is_ok(), all_verified);
        prop_assert_eq!(outcome.unmet_conditions().is_empty(), all_verified);
    }

    #[test]
    fn prop_verified_iff_evidence_and_latest_pass(shape in action_shape()) {
        let agg = build(std::slice::from_ref(&shape));
        let action = &agg.actions[0];
        let status = derive_action_status(&agg.evidence[&action.id], &agg.verifications[&action.id]);

        let expected_verified = shape.evidence > 0 && shape.outcomes.last() == Some(&true);
        prop_assert_eq!(status == ActionStatus::Verified, expected_verified);
        if shape.evidence == 0 {
            prop_assert_eq!(status, ActionStatus::Open);
        }
    }

    #[test]
    fn prop_kpis_are_consistent(shapes in prop::collection::vec(action_shape(), 0..6)) {
        let agg = build(&shapes);
        let late = base() + Duration::days(60);
        let outcome = gate::recompute(&agg.rca, &agg.actions, &agg.evidence, &agg.verifications, late);
        let kpis = outcome.kpis();

        prop_assert_eq!(kpis.total_actions, shapes.len());
        prop_assert_eq!(kpis.verified_actions + kpis.outstanding_actions, kpis.total_actions);
        // every action is past due at `late`
        prop_assert_eq!(kpis.overdue_actions, kpis.outstanding_actions);
        prop_assert!(kpis.missing_evidence <= kpis.overdue_actions);
    }
}

#[test]
fn closed_at_survives_repeated_outcomes() {
    let shapes = vec![ActionShape {
        evidence: 1,
        outcomes: vec![true],
    }];
    let mut agg = build(&shapes);
    let first = gate::recompute(&agg.rca, &agg.actions, &agg.evidence, &agg.verifications, base());
    agg.rca.apply_outcome(&first).unwrap();
    let closed_at = agg.rca.closed_at();
    assert!(closed_at.is_some());

    let later = gate::recompute(
        &agg.rca,
        &agg.actions,
        &agg.evidence,
        &agg.verifications,
        base() + Duration::days(3),
    );
    agg.rca.apply_outcome(&later).unwrap();
    assert_eq!(agg.rca.closed_at(), closed_at);
}
