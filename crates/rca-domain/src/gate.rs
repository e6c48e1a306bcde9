//! Closure gate
//!
//! Pure decision function over one RCA aggregate:
//! - derives each action's status from its evidence and verifications
//! - derives the RCA status from the action statuses
//! - computes the missing-evidence / overdue KPIs
//! - refuses explicit closure unless every gate condition holds
//!
//! Nothing here reads a clock or touches storage; callers pass `as_of`.

use crate::ids::{ActionId, RcaId};
use crate::model::{
    Action, ActionStatus, Evidence, Rca, RcaStatus, StatusEpoch, StatusTransition, Verification,
    VerificationOutcome,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Gate failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// Closure requested while conditions are unmet
    #[error("closure gate not satisfied for {rca_id}: {}", format_unmet(.unmet))]
    NotSatisfied {
        /// RCA the closure was requested for
        rca_id: RcaId,
        /// Every unmet condition
        unmet: Vec<UnmetCondition>,
    },

    /// Outcome applied to a record it was not computed for
    #[error("gate outcome for {found} applied to {expected}")]
    OutcomeMismatch {
        /// Record being updated
        expected: RcaId,
        /// Record the outcome belongs to
        found: RcaId,
    },
}

fn format_unmet(unmet: &[UnmetCondition]) -> String {
    unmet
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// One reason closure was refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UnmetCondition {
    /// The RCA has no actions; it can never close vacuously
    NoActions,
    /// An action is not verified
    ActionNotVerified {
        /// Action
        action_id: ActionId,
        /// Its derived status
        status: ActionStatus,
    },
}

impl fmt::Display for UnmetCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoActions => f.write_str("RCA has no actions"),
            Self::ActionNotVerified { action_id, status } => {
                write!(f, "{action_id} is {status}, not Verified")
            }
        }
    }
}

/// Derived status of one action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionVerdict {
    /// Action
    pub action_id: ActionId,
    /// Derived status
    pub status: ActionStatus,
    /// Number of evidence records
    pub evidence_count: usize,
    /// Due date has passed and the action is not verified
    pub overdue: bool,
}

/// KPI counters for one RCA (or summed across many)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GateKpis {
    /// Number of actions
    pub total_actions: usize,
    /// Actions not yet verified
    pub outstanding_actions: usize,
    /// Actions with at least one evidence record
    pub evidenced_actions: usize,
    /// Verified actions
    pub verified_actions: usize,
    /// `Open` actions past their due date
    pub missing_evidence: usize,
    /// Actions past their due date and not verified
    pub overdue_actions: usize,
}

impl GateKpis {
    /// Add another set of counters into this one
    pub fn accumulate(&mut self, other: &GateKpis) {
        self.total_actions += other.total_actions;
        self.outstanding_actions += other.outstanding_actions;
        self.evidenced_actions += other.evidenced_actions;
        self.verified_actions += other.verified_actions;
        self.missing_evidence += other.missing_evidence;
        self.overdue_actions += other.overdue_actions;
    }

    /// Share of actions with evidence, in percent
    #[must_use]
    pub fn evidenced_pct(&self) -> f64 {
        percent(self.evidenced_actions, self.total_actions)
    }

    /// Share of verified actions, in percent
    #[must_use]
    pub fn verified_pct(&self) -> f64 {
        percent(self.verified_actions, self.total_actions)
    }
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Result of a recompute; only [`recompute`] constructs it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateOutcome {
    rca_id: RcaId,
    status: RcaStatus,
    verdicts: Vec<ActionVerdict>,
    kpis: GateKpis,
    evaluated_at: DateTime<Utc>,
}

impl GateOutcome {
    /// RCA the outcome was computed for
    #[inline]
    #[must_use]
    pub fn rca_id(&self) -> RcaId {
        self.rca_id
    }

    /// Derived RCA status
    #[inline]
    #[must_use]
    pub fn status(&self) -> RcaStatus {
        self.status
    }

    /// Per-action verdicts, in the order the actions were given
    #[inline]
    #[must_use]
    pub fn verdicts(&self) -> &[ActionVerdict] {
        &self.verdicts
    }

    /// Verdict for one action
    #[must_use]
    pub fn verdict(&self, action_id: ActionId) -> Option<&ActionVerdict> {
        self.verdicts.iter().find(|v| v.action_id == action_id)
    }

    /// KPI counters
    #[inline]
    #[must_use]
    pub fn kpis(&self) -> &GateKpis {
        &self.kpis
    }

    /// Time the outcome was computed for
    #[inline]
    #[must_use]
    pub fn evaluated_at(&self) -> DateTime<Utc> {
        self.evaluated_at
    }

    /// Conditions preventing closure; empty when closed
    #[must_use]
    pub fn unmet_conditions(&self) -> Vec<UnmetCondition> {
        if self.verdicts.is_empty() {
            return vec![UnmetCondition::NoActions];
        }
        self.verdicts
            .iter()
            .filter(|v| v.status != ActionStatus::Verified)
            .map(|v| UnmetCondition::ActionNotVerified {
                action_id: v.action_id,
                status: v.status,
            })
            .collect()
    }

    /// Explicit closure check
    ///
    /// # Errors
    /// Returns [`GateError::NotSatisfied`] unless the derived status is `Closed`.
    pub fn require_closed(&self) -> Result<(), GateError> {
        if self.status == RcaStatus::Closed {
            Ok(())
        } else {
            Err(GateError::NotSatisfied {
                rca_id: self.rca_id,
                unmet: self.unmet_conditions(),
            })
        }
    }
}

/// Latest verification by time, then id
#[must_use]
pub fn latest_verification(verifications: &[Verification]) -> Option<&Verification> {
    verifications.iter().max_by_key(|v| v.order_key())
}

/// Per-action status derivation
///
/// - `Open`: no evidence
/// - `Verified`: evidence exists and the latest verification passed
/// - `EvidenceSubmitted`: otherwise
#[must_use]
pub fn derive_action_status(evidence: &[Evidence], verifications: &[Verification]) -> ActionStatus {
    if evidence.is_empty() {
        return ActionStatus::Open;
    }
    match latest_verification(verifications) {
        Some(v) if v.outcome == VerificationOutcome::Pass => ActionStatus::Verified,
        _ => ActionStatus::EvidenceSubmitted,
    }
}

/// RCA status derivation; zero actions is never `Closed`
#[must_use]
pub fn derive_rca_status(statuses: &[ActionStatus]) -> RcaStatus {
    if !statuses.is_empty() && statuses.iter().all(|s| *s == ActionStatus::Verified) {
        RcaStatus::Closed
    } else if statuses.iter().any(|s| *s != ActionStatus::Open) {
        RcaStatus::PendingVerification
    } else {
        RcaStatus::Open
    }
}

/// Recompute the status and KPIs of one RCA
///
/// Actions belonging to other RCAs are ignored. Evidence and verifications
/// are looked up by action id; a missing entry means none.
#[must_use]
pub fn recompute(
    rca: &Rca,
    actions: &[Action],
    evidence_by_action: &HashMap<ActionId, Vec<Evidence>>,
    verifications_by_action: &HashMap<ActionId, Vec<Verification>>,
    as_of: DateTime<Utc>,
) -> GateOutcome {
    let today = as_of.date_naive();
    let mut kpis = GateKpis::default();
    let mut verdicts = Vec::with_capacity(actions.len());

    for action in actions.iter().filter(|a| a.rca_id == rca.id) {
        let evidence = evidence_by_action
            .get(&action.id)
            .map_or(&[][..], Vec::as_slice);
        let verifications = verifications_by_action
            .get(&action.id)
            .map_or(&[][..], Vec::as_slice);

        let status = derive_action_status(evidence, verifications);
        let past_due = action.is_past_due(today);
        let overdue = past_due && status != ActionStatus::Verified;

        kpis.total_actions += 1;
        if status != ActionStatus::Verified {
            kpis.outstanding_actions += 1;
        }
        if !evidence.is_empty() {
            kpis.evidenced_actions += 1;
        }
        if status == ActionStatus::Verified {
            kpis.verified_actions += 1;
        }
        if past_due && status == ActionStatus::Open {
            kpis.missing_evidence += 1;
        }
        if overdue {
            kpis.overdue_actions += 1;
        }

        verdicts.push(ActionVerdict {
            action_id: action.id,
            status,
            evidence_count: evidence.len(),
            overdue,
        });
    }

    let statuses: Vec<ActionStatus> = verdicts.iter().map(|v| v.status).collect();

    GateOutcome {
        rca_id: rca.id,
        status: derive_rca_status(&statuses),
        verdicts,
        kpis,
        evaluated_at: as_of,
    }
}

impl Rca {
    /// Persist a gate outcome into the cached status
    ///
    /// `closed_at` is set on the first entry into `Closed` and never changed
    /// afterwards. Every change appends a new epoch to the history.
    ///
    /// # Errors
    /// Returns [`GateError::OutcomeMismatch`] if the outcome belongs to another RCA.
    pub fn apply_outcome(
        &mut self,
        outcome: &GateOutcome,
    ) -> Result<Option<StatusTransition>, GateError> {
        if outcome.rca_id != self.id {
            return Err(GateError::OutcomeMismatch {
                expected: self.id,
                found: outcome.rca_id,
            });
        }
        let to = outcome.status;
        if to == self.status {
            return Ok(None);
        }

        let from = self.status;
        let at = outcome.evaluated_at;
        self.status = to;
        if to == RcaStatus::Closed && self.closed_at.is_none() {
            self.closed_at = Some(at);
        }
        self.history.push(StatusEpoch { status: to, since: at });

        Ok(Some(StatusTransition { from, to, at }))
    }
}

impl Action {
    /// Persist this action's verdict from a gate outcome; returns whether it changed
    pub fn apply_outcome(&mut self, outcome: &GateOutcome) -> bool {
        match outcome.verdict(self.id) {
            Some(verdict) if verdict.status != self.status => {
                self.status = verdict.status;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{EvidenceId, IncidentId, VerificationId};
    use crate::model::EvidenceKind;
    use crate::validation::ActionDraft;
    use chrono::{Duration, NaiveDate, TimeZone};
    use ulid::Ulid;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn rca() -> Rca {
        Rca::new(RcaId(Ulid::new()), IncidentId(Ulid::new()), "seal wear", t0())
    }

    fn action(rca: &Rca, due: NaiveDate) -> Action {
        Action::from_draft(
            ActionId(Ulid::new()),
            rca.id,
            ActionDraft::new("Replace seal", "alice", due),
            t0(),
        )
    }

    fn evidence(action: &Action, at: DateTime<Utc>) -> Evidence {
        Evidence {
            id: EvidenceId(Ulid::new()),
            action_id: action.id,
            kind: EvidenceKind::TestRunNote,
            reference: "pressure test log".into(),
            submitted_by: "alice".into(),
            submitted_at: at,
        }
    }

    fn verification(action: &Action, outcome: VerificationOutcome, at: DateTime<Utc>) -> Verification {
        Verification {
            id: VerificationId(Ulid::new()),
            action_id: action.id,
            verifier: "qa".into(),
            outcome,
            notes: None,
            verified_at: at,
        }
    }

    fn due(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    #[test]
    fn action_without_evidence_is_open() {
        assert_eq!(derive_action_status(&[], &[]), ActionStatus::Open);
    }

    #[test]
    fn pass_without_evidence_stays_open() {
        let rca = rca();
        let a = action(&rca, due(10));
        let v = verification(&a, VerificationOutcome::Pass, t0());
        assert_eq!(derive_action_status(&[], &[v]), ActionStatus::Open);
    }

    #[test]
    fn evidence_without_verification_is_submitted() {
        let rca = rca();
        let a = action(&rca, due(10));
        let e = evidence(&a, t0());
        assert_eq!(derive_action_status(&[e], &[]), ActionStatus::EvidenceSubmitted);
    }

    #[test]
    fn latest_verification_wins() {
        let rca = rca();
        let a = action(&rca, due(10));
        let e = evidence(&a, t0());
        let pass = verification(&a, VerificationOutcome::Pass, t0() + Duration::hours(1));
        let fail = verification(&a, VerificationOutcome::Fail, t0() + Duration::hours(2));

        assert_eq!(
            derive_action_status(std::slice::from_ref(&e), &[pass.clone()]),
            ActionStatus::Verified
        );
        // order of the slice does not matter, time does
        assert_eq!(
            derive_action_status(std::slice::from_ref(&e), &[fail, pass]),
            ActionStatus::EvidenceSubmitted
        );
    }

    #[test]
    fn rca_without_actions_never_closes() {
        assert_eq!(derive_rca_status(&[]), RcaStatus::Open);

        let rca = rca();
        let outcome = recompute(&rca, &[], &HashMap::new(), &HashMap::new(), t0());
        assert_eq!(outcome.status(), RcaStatus::Open);
        assert_eq!(
            outcome.require_closed(),
            Err(GateError::NotSatisfied {
                rca_id: rca.id,
                unmet: vec![UnmetCondition::NoActions],
            })
        );
    }

    #[test]
    fn mixed_statuses_are_pending() {
        assert_eq!(
            derive_rca_status(&[ActionStatus::Verified, ActionStatus::Open]),
            RcaStatus::PendingVerification
        );
        assert_eq!(
            derive_rca_status(&[ActionStatus::Open, ActionStatus::Open]),
            RcaStatus::Open
        );
        assert_eq!(
            derive_rca_status(&[ActionStatus::Verified, ActionStatus::Verified]),
            RcaStatus::Closed
        );
    }

    #[test]
    fn kpis_count_overdue_and_missing_evidence() {
        let rca = rca();
        let late_open = action(&rca, due(2));
        let late_submitted = action(&rca, due(2));
        let late_verified = action(&rca, due(2));
        let future_open = action(&rca, due(28));

        let mut evidence_map = HashMap::new();
        evidence_map.insert(late_submitted.id, vec![evidence(&late_submitted, t0())]);
        evidence_map.insert(late_verified.id, vec![evidence(&late_verified, t0())]);
        let mut verification_map = HashMap::new();
        verification_map.insert(
            late_verified.id,
            vec![verification(&late_verified, VerificationOutcome::Pass, t0())],
        );

        let as_of = t0() + Duration::days(5);
        let outcome = recompute(
            &rca,
            &[late_open, late_submitted, late_verified, future_open],
            &evidence_map,
            &verification_map,
            as_of,
        );

        let kpis = outcome.kpis();
        assert_eq!(kpis.total_actions, 4);
        assert_eq!(kpis.missing_evidence, 1);
        assert_eq!(kpis.overdue_actions, 2);
        assert_eq!(kpis.verified_actions, 1);
        assert_eq!(kpis.evidenced_actions, 2);
        assert_eq!(kpis.outstanding_actions, 3);
        assert_eq!(outcome.status(), RcaStatus::PendingVerification);
    }

    #[test]
    fn due_today_is_not_overdue() {
        let rca = rca();
        let a = action(&rca, t0().date_naive());
        let outcome = recompute(&rca, &[a], &HashMap::new(), &HashMap::new(), t0());
        assert_eq!(outcome.kpis().overdue_actions, 0);
    }

    #[test]
    fn foreign_actions_are_ignored() {
        let rca = rca();
        let other = Rca::new(RcaId(Ulid::new()), IncidentId(Ulid::new()), "", t0());
        let a = action(&other, due(10));
        let outcome = recompute(&rca, &[a], &HashMap::new(), &HashMap::new(), t0());
        assert!(outcome.verdicts().is_empty());
    }

    #[test]
    fn closed_at_is_set_once_and_reopen_appends_epoch() {
        let mut rca = rca();
        let a = action(&rca, due(10));
        let e = evidence(&a, t0());
        let first_close = t0() + Duration::days(1);

        let mut evidence_map = HashMap::new();
        evidence_map.insert(a.id, vec![e]);
        let mut verification_map = HashMap::new();
        verification_map.insert(a.id, vec![verification(&a, VerificationOutcome::Pass, first_close)]);

        let closed = recompute(&rca, std::slice::from_ref(&a), &evidence_map, &verification_map, first_close);
        let transition = rca.apply_outcome(&closed).unwrap().unwrap();
        assert_eq!(transition.to, RcaStatus::Closed);
        assert_eq!(rca.closed_at(), Some(first_close));

        let reopen_at = first_close + Duration::days(1);
        verification_map
            .get_mut(&a.id)
            .unwrap()
            .push(verification(&a, VerificationOutcome::Fail, reopen_at));
        let reopened = recompute(&rca, std::slice::from_ref(&a), &evidence_map, &verification_map, reopen_at);
        let transition = rca.apply_outcome(&reopened).unwrap().unwrap();
        assert!(transition.is_reopen());
        assert_eq!(rca.status(), RcaStatus::PendingVerification);
        assert_eq!(rca.closed_at(), Some(first_close));

        let second_close = reopen_at + Duration::days(1);
        verification_map
            .get_mut(&a.id)
            .unwrap()
            .push(verification(&a, VerificationOutcome::Pass, second_close));
        let closed_again = recompute(&rca, std::slice::from_ref(&a), &evidence_map, &verification_map, second_close);
        rca.apply_outcome(&closed_again).unwrap();

        assert_eq!(rca.closed_at(), Some(first_close));
        assert_eq!(rca.reopen_count(), 1);
        assert_eq!(rca.history().len(), 4);
    }

    #[test]
    fn applying_foreign_outcome_fails() {
        let mut rca = rca();
        let other = Rca::new(RcaId(Ulid::new()), IncidentId(Ulid::new()), "", t0());
        let outcome = recompute(&other, &[], &HashMap::new(), &HashMap::new(), t0());
        assert!(matches!(
            rca.apply_outcome(&outcome),
            Err(GateError::OutcomeMismatch { .. })
        ));
    }

    #[test]
    fn unchanged_status_records_no_epoch() {
        let mut rca = rca();
        let outcome = recompute(&rca, &[], &HashMap::new(), &HashMap::new(), t0());
        assert_eq!(rca.apply_outcome(&outcome).unwrap(), None);
        assert_eq!(rca.history().len(), 1);
    }
}
