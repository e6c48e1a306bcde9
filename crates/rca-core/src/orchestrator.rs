//! Workflow orchestrator
//!
//! The single entry point for state changes:
//! - incident intake with recurrence candidates
//! - action, evidence and verification appends, each followed by a closure
//!   gate recompute whose outcome is persisted as the cached status
//! - explicit closure requests
//! - dashboard, detail and audit read models
//!
//! Writes to one RCA aggregate (RCA, its actions and their records) are
//! serialized by a per-RCA async mutex; different RCAs proceed
//! independently. Reads take no locks and may see a slightly older state.

use crate::clock::{Clock, SystemClock};
use crate::config::WorkflowConfig;
use crate::error::{WorkflowError, WorkflowResult};
use crate::recurrence::RecurrenceIndex;
use crate::views::{
    ActionDetail, AuditFilter, AuditRow, DashboardSnapshot, IncidentIntake, OpenRcaSummary,
    RcaDetail, SimilarCandidate, StatusCounts,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rca_domain::gate;
use rca_domain::{
    Action, ActionDraft, ActionId, Evidence, EvidenceDraft, GateKpis, GateOutcome, Incident,
    IncidentCorrection, IncidentDraft, IncidentId, Rca, RcaId, RcaStatus, Verification,
    VerificationDraft,
};
use rca_similarity::SimilarMatch;
use rca_store::{demo_snapshot, MemoryStore, RecordStore, StoreSnapshot};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;

/// One RCA with every record the gate looks at
struct Aggregate {
    rca: Rca,
    actions: Vec<Action>,
    evidence: HashMap<ActionId, Vec<Evidence>>,
    verifications: HashMap<ActionId, Vec<Verification>>,
}

impl Aggregate {
    fn evaluate(&self, as_of: DateTime<Utc>) -> GateOutcome {
        gate::recompute(
            &self.rca,
            &self.actions,
            &self.evidence,
            &self.verifications,
            as_of,
        )
    }
}

/// Start of a look-back window, saturating at the earliest representable time
fn window_start(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    Duration::try_days(i64::from(days))
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Coordinates the record store, closure gate and recurrence index
pub struct WorkflowOrchestrator {
    config: WorkflowConfig,
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    index: Arc<RecurrenceIndex>,
    rca_locks: DashMap<RcaId, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for WorkflowOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowOrchestrator")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl WorkflowOrchestrator {
    /// Orchestrator over a fresh in-memory store and the system clock
    #[must_use]
    pub fn new(config: WorkflowConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    /// Orchestrator over an existing store
    #[must_use]
    pub fn with_store(config: WorkflowConfig, store: Arc<dyn RecordStore>) -> Self {
        let index = RecurrenceIndex::new(config.similarity.index_config(), &config.index);
        Self {
            config,
            store,
            clock: Arc::new(SystemClock),
            index: Arc::new(index),
            rca_locks: DashMap::new(),
        }
    }

    /// With a different time source
    #[inline]
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Underlying record store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Recurrence index handle
    #[inline]
    #[must_use]
    pub fn recurrence_index(&self) -> &Arc<RecurrenceIndex> {
        &self.index
    }

    /// Current time according to the configured clock
    #[inline]
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Start the background index refresher if an interval is configured
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn_index_refresher(&self) -> Option<JoinHandle<()>> {
        let interval = self.config.index.refresh_interval()?;
        Some(self.index.spawn_refresher(Arc::clone(&self.store), interval))
    }

    async fn lock_rca(&self, rca_id: RcaId) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.rca_locks.entry(rca_id).or_default().value());
        lock.lock_owned().await
    }

    async fn load_aggregate(&self, rca: Rca) -> WorkflowResult<Aggregate> {
        let actions = self.store.actions_for_rca(rca.id).await?;
        let mut evidence = HashMap::with_capacity(actions.len());
        let mut verifications = HashMap::with_capacity(actions.len());
        for action in &actions {
            evidence.insert(action.id, self.store.evidence_for_action(action.id).await?);
            verifications.insert(
                action.id,
                self.store.verifications_for_action(action.id).await?,
            );
        }
        Ok(Aggregate {
            rca,
            actions,
            evidence,
            verifications,
        })
    }

    /// Recompute and persist; caller holds the RCA lock
    async fn recompute_locked(&self, rca_id: RcaId) -> WorkflowResult<GateOutcome> {
        let rca = self.store.get_rca(rca_id).await?;
        let outcome = self.load_aggregate(rca).await?.evaluate(self.clock.now());

        if let Some(transition) = self.store.apply_gate_outcome(&outcome).await? {
            if transition.is_reopen() {
                tracing::info!(
                    rca = %rca_id,
                    status = %transition.to,
                    "RCA reopened"
                );
            } else {
                tracing::info!(
                    rca = %rca_id,
                    from = %transition.from,
                    to = %transition.to,
                    "RCA status changed"
                );
            }
        }
        Ok(outcome)
    }

    // ---- intake and similarity ----

    /// Record an incident, open an empty RCA for it and look up prior RCAs
    /// that resemble it
    ///
    /// # Errors
    /// Returns [`WorkflowError::Validation`] for malformed input.
    pub async fn submit_incident(&self, draft: IncidentDraft) -> WorkflowResult<IncidentIntake> {
        let now = self.clock.now();
        draft.validate(now)?;
        let query = draft.query_text();

        let incident = self.store.create_incident(draft, now).await?;
        let rca = self.store.create_rca(incident.id, String::new(), now).await?;
        self.index.mark_stale();

        let matches = self
            .index
            .query(
                self.store.as_ref(),
                &query,
                self.config.similarity.top_k,
                Some(rca.id),
                self.config.index.rebuild_on_read,
            )
            .await?;
        let candidates = self.candidates(&matches).await?;

        tracing::info!(
            incident = %incident.id,
            rca = %rca.id,
            severity = %incident.severity,
            candidates = candidates.len(),
            likely_recurrences = candidates.iter().filter(|c| c.likely_recurrence).count(),
            "incident submitted"
        );

        Ok(IncidentIntake {
            incident,
            rca,
            candidates,
        })
    }

    /// Rank prior RCAs against free text
    ///
    /// Empty text, or an empty corpus, yields no candidates.
    ///
    /// # Errors
    /// Propagates store failures of an index rebuild.
    pub async fn find_similar(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> WorkflowResult<Vec<SimilarCandidate>> {
        let top_k = top_k.unwrap_or(self.config.similarity.top_k);
        let matches = self
            .index
            .query(
                self.store.as_ref(),
                query,
                top_k,
                None,
                self.config.index.rebuild_on_read,
            )
            .await?;
        self.candidates(&matches).await
    }

    async fn candidates(&self, matches: &[SimilarMatch]) -> WorkflowResult<Vec<SimilarCandidate>> {
        let threshold = self.config.similarity.recurrence_threshold;
        let mut candidates = Vec::with_capacity(matches.len());
        for m in matches {
            let rca = self.store.get_rca(m.rca_id).await?;
            let incident = self.store.get_incident(rca.incident_id).await?;
            candidates.push(SimilarCandidate {
                rca_id: rca.id,
                incident_id: incident.id,
                incident_title: incident.title,
                status: rca.status(),
                score: m.score,
                likely_recurrence: m.score > 0.0 && m.score >= threshold,
            });
        }
        Ok(candidates)
    }

    /// Force an index rebuild now (unless one is already running)
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn refresh_index(&self) -> WorkflowResult<bool> {
        Ok(self.index.refresh(self.store.as_ref()).await?)
    }

    // ---- record edits ----

    /// Replace an RCA's root-cause narrative
    ///
    /// # Errors
    /// Returns [`WorkflowError::NotFound`] for an unknown RCA.
    pub async fn update_narrative(
        &self,
        rca_id: RcaId,
        narrative: impl Into<String>,
    ) -> WorkflowResult<Rca> {
        let _guard = self.lock_rca(rca_id).await;
        let rca = self
            .store
            .update_narrative(rca_id, narrative.into().trim().to_string())
            .await?;
        self.index.mark_stale();
        tracing::info!(rca = %rca_id, chars = rca.narrative.len(), "narrative updated");
        Ok(rca)
    }

    /// Administrative correction of incident fields
    ///
    /// # Errors
    /// Returns [`WorkflowError::Validation`] for blank required fields and
    /// [`WorkflowError::NotFound`] for an unknown incident.
    pub async fn correct_incident(
        &self,
        incident_id: IncidentId,
        correction: IncidentCorrection,
    ) -> WorkflowResult<Incident> {
        correction.validate()?;
        let touches_corpus = correction.touches_corpus();
        let incident = self.store.correct_incident(incident_id, correction).await?;
        if touches_corpus {
            self.index.mark_stale();
        }
        tracing::info!(incident = %incident_id, "incident corrected");
        Ok(incident)
    }

    /// Add a corrective action to an RCA and recompute its status
    ///
    /// Adding an action to a closed RCA reopens it.
    ///
    /// # Errors
    /// Returns [`WorkflowError::InvalidReference`] for an unknown RCA and
    /// [`WorkflowError::Validation`] for malformed input.
    pub async fn add_action(&self, rca_id: RcaId, draft: ActionDraft) -> WorkflowResult<Action> {
        let _guard = self.lock_rca(rca_id).await;
        let rca = self
            .store
            .get_rca(rca_id)
            .await
            .map_err(|err| WorkflowError::from(err).parent_missing("action"))?;
        draft.validate(rca.created_at)?;

        let action = self
            .store
            .create_action(rca_id, draft, self.clock.now())
            .await?;
        self.index.mark_stale();
        self.recompute_locked(rca_id).await?;

        tracing::info!(
            rca = %rca_id,
            action = %action.id,
            owner = %action.owner,
            due = %action.due_date,
            "action added"
        );
        Ok(self.store.get_action(action.id).await?)
    }

    /// Append evidence to an action and recompute its RCA
    ///
    /// # Errors
    /// Returns [`WorkflowError::InvalidReference`] for an unknown action and
    /// [`WorkflowError::Validation`] for malformed input.
    pub async fn add_evidence(
        &self,
        action_id: ActionId,
        draft: EvidenceDraft,
    ) -> WorkflowResult<Evidence> {
        draft.validate()?;
        let action = self.parent_action(action_id, "evidence").await?;
        // An action never moves to another RCA, so locking after the read is sound.
        let _guard = self.lock_rca(action.rca_id).await;

        let evidence = self
            .store
            .append_evidence(action_id, draft, self.clock.now())
            .await?;
        let outcome = self.recompute_locked(action.rca_id).await?;

        tracing::info!(
            rca = %action.rca_id,
            action = %action_id,
            evidence = %evidence.id,
            kind = %evidence.kind,
            action_status = ?outcome.verdict(action_id).map(|v| v.status),
            "evidence added"
        );
        Ok(evidence)
    }

    /// Append a verification to an action and recompute its RCA
    ///
    /// The latest verification decides the action status, so a `Fail` after
    /// a `Pass` regresses the action and may reopen a closed RCA.
    ///
    /// # Errors
    /// Returns [`WorkflowError::InvalidReference`] for an unknown action and
    /// [`WorkflowError::Validation`] for malformed input or, when
    /// independence is required, a verifier who owns the action or
    /// submitted its evidence.
    pub async fn add_verification(
        &self,
        action_id: ActionId,
        draft: VerificationDraft,
    ) -> WorkflowResult<Verification> {
        draft.validate()?;
        let action = self.parent_action(action_id, "verification").await?;
        // An action never moves to another RCA, so locking after the read is sound.
        let _guard = self.lock_rca(action.rca_id).await;

        if self.config.require_independent_verification {
            let evidence = self.store.evidence_for_action(action_id).await?;
            draft.validate_independence(
                &action.owner,
                evidence.iter().map(|e| e.submitted_by.as_str()),
            )?;
        }

        let verification = self
            .store
            .append_verification(action_id, draft, self.clock.now())
            .await?;
        let outcome = self.recompute_locked(action.rca_id).await?;

        tracing::info!(
            rca = %action.rca_id,
            action = %action_id,
            verification = %verification.id,
            outcome = %verification.outcome,
            action_status = ?outcome.verdict(action_id).map(|v| v.status),
            "verification recorded"
        );
        Ok(verification)
    }

    async fn parent_action(&self, action_id: ActionId, entity: &'static str) -> WorkflowResult<Action> {
        self.store
            .get_action(action_id)
            .await
            .map_err(|err| WorkflowError::from(err).parent_missing(entity))
    }

    // ---- gate ----

    /// Recompute and persist one RCA's status
    ///
    /// # Errors
    /// Returns [`WorkflowError::NotFound`] for an unknown RCA.
    pub async fn recompute_rca(&self, rca_id: RcaId) -> WorkflowResult<GateOutcome> {
        let _guard = self.lock_rca(rca_id).await;
        self.recompute_locked(rca_id).await
    }

    /// Recompute and persist every RCA's status
    ///
    /// # Errors
    /// Propagates the first store failure.
    pub async fn recompute_all(&self) -> WorkflowResult<Vec<GateOutcome>> {
        let rcas = self.store.list_rcas().await;
        let mut outcomes = Vec::with_capacity(rcas.len());
        for rca in rcas {
            outcomes.push(self.recompute_rca(rca.id).await?);
        }
        Ok(outcomes)
    }

    /// Close an RCA if the gate allows it
    ///
    /// Closure is never forced: status is recomputed and the request
    /// succeeds only if every action is verified.
    ///
    /// # Errors
    /// Returns [`WorkflowError::GateNotSatisfied`] listing every unmet
    /// condition, or [`WorkflowError::NotFound`] for an unknown RCA.
    pub async fn close_rca(&self, rca_id: RcaId) -> WorkflowResult<Rca> {
        let _guard = self.lock_rca(rca_id).await;
        let outcome = self.recompute_locked(rca_id).await?;
        if let Err(refused) = outcome.require_closed() {
            tracing::warn!(
                rca = %rca_id,
                status = %outcome.status(),
                unmet = outcome.unmet_conditions().len(),
                "closure refused"
            );
            return Err(refused.into());
        }
        Ok(self.store.get_rca(rca_id).await?)
    }

    // ---- reads ----

    /// Fetch an incident
    ///
    /// # Errors
    /// Returns [`WorkflowError::NotFound`].
    pub async fn incident(&self, id: IncidentId) -> WorkflowResult<Incident> {
        Ok(self.store.get_incident(id).await?)
    }

    /// Fetch an RCA
    ///
    /// # Errors
    /// Returns [`WorkflowError::NotFound`].
    pub async fn rca(&self, id: RcaId) -> WorkflowResult<Rca> {
        Ok(self.store.get_rca(id).await?)
    }

    /// Fetch an action
    ///
    /// # Errors
    /// Returns [`WorkflowError::NotFound`].
    pub async fn action(&self, id: ActionId) -> WorkflowResult<Action> {
        Ok(self.store.get_action(id).await?)
    }

    /// RCAs of an incident
    ///
    /// # Errors
    /// Returns [`WorkflowError::NotFound`] for an unknown incident.
    pub async fn rcas_for_incident(&self, id: IncidentId) -> WorkflowResult<Vec<Rca>> {
        Ok(self.store.rcas_for_incident(id).await?)
    }

    /// Actions of an RCA
    ///
    /// # Errors
    /// Returns [`WorkflowError::NotFound`] for an unknown RCA.
    pub async fn actions_for_rca(&self, id: RcaId) -> WorkflowResult<Vec<Action>> {
        Ok(self.store.actions_for_rca(id).await?)
    }

    /// Evidence of an action
    ///
    /// # Errors
    /// Returns [`WorkflowError::NotFound`] for an unknown action.
    pub async fn evidence_for_action(&self, id: ActionId) -> WorkflowResult<Vec<Evidence>> {
        Ok(self.store.evidence_for_action(id).await?)
    }

    /// Verifications of an action
    ///
    /// # Errors
    /// Returns [`WorkflowError::NotFound`] for an unknown action.
    pub async fn verifications_for_action(&self, id: ActionId) -> WorkflowResult<Vec<Verification>> {
        Ok(self.store.verifications_for_action(id).await?)
    }

    /// Incident, RCA, actions with their records, and KPIs
    ///
    /// # Errors
    /// Returns [`WorkflowError::NotFound`] for an unknown RCA.
    pub async fn rca_detail(&self, rca_id: RcaId) -> WorkflowResult<RcaDetail> {
        let rca = self.store.get_rca(rca_id).await?;
        let incident = self.store.get_incident(rca.incident_id).await?;
        let aggregate = self.load_aggregate(rca).await?;
        let outcome = aggregate.evaluate(self.clock.now());

        let Aggregate {
            rca,
            actions,
            mut evidence,
            mut verifications,
        } = aggregate;
        let actions = actions
            .into_iter()
            .map(|action| ActionDetail {
                overdue: outcome.verdict(action.id).is_some_and(|v| v.overdue),
                evidence: evidence.remove(&action.id).unwrap_or_default(),
                verifications: verifications.remove(&action.id).unwrap_or_default(),
                action,
            })
            .collect();

        Ok(RcaDetail {
            incident,
            rca,
            actions,
            kpis: *outcome.kpis(),
            unmet: outcome.unmet_conditions(),
        })
    }

    /// Evaluate every RCA as of now without persisting anything
    async fn evaluate_all(&self) -> WorkflowResult<Vec<(Rca, GateOutcome)>> {
        let now = self.clock.now();
        let rcas = self.store.list_rcas().await;
        let mut evaluated = Vec::with_capacity(rcas.len());
        for rca in rcas {
            let aggregate = self.load_aggregate(rca).await?;
            let outcome = aggregate.evaluate(now);
            evaluated.push((aggregate.rca, outcome));
        }
        Ok(evaluated)
    }

    /// Aggregate KPIs across RCAs
    ///
    /// Missing-evidence, overdue and open-action counts cover RCAs that are
    /// not closed; evidenced and verified shares cover every action.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn dashboard_snapshot(&self) -> WorkflowResult<DashboardSnapshot> {
        let now = self.clock.now();
        let evaluated = self.evaluate_all().await?;

        let mut status_counts = StatusCounts::default();
        let mut open_kpis = GateKpis::default();
        let mut all_kpis = GateKpis::default();
        let mut open_rcas = Vec::new();

        for (rca, outcome) in &evaluated {
            status_counts.record(outcome.status());
            all_kpis.accumulate(outcome.kpis());
            if outcome.status() == RcaStatus::Closed {
                continue;
            }
            open_kpis.accumulate(outcome.kpis());
            let incident = self.store.get_incident(rca.incident_id).await?;
            open_rcas.push(OpenRcaSummary {
                rca_id: rca.id,
                title: incident.title,
                environment: incident.environment,
                status: outcome.status(),
                created_at: rca.created_at,
                kpis: *outcome.kpis(),
            });
        }
        open_rcas.sort_by(|a, b| b.rca_id.cmp(&a.rca_id));

        let window = self.config.recent_incident_window_days;
        let since = window_start(now, window);
        let recent_incidents = self
            .store
            .list_incidents()
            .await
            .iter()
            .filter(|i| i.occurred_at >= since && i.occurred_at <= now)
            .count();

        Ok(DashboardSnapshot {
            generated_at: now,
            total_rcas: evaluated.len(),
            status_counts,
            open_kpis,
            evidenced_pct: all_kpis.evidenced_pct(),
            verified_pct: all_kpis.verified_pct(),
            recent_incidents,
            recent_window_days: window,
            open_rcas,
        })
    }

    /// RCAs matching a filter, by environment then newest first
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn audit_view(&self, filter: AuditFilter) -> WorkflowResult<Vec<AuditRow>> {
        let now = self.clock.now();
        let days = filter.within_days.unwrap_or(self.config.audit_window_days);
        let since = window_start(now, days);

        let mut rows = Vec::new();
        for (rca, outcome) in self.evaluate_all().await? {
            if rca.created_at < since {
                continue;
            }
            if filter.status.is_some_and(|s| s != outcome.status()) {
                continue;
            }
            let incident = self.store.get_incident(rca.incident_id).await?;
            if filter.environment.is_some_and(|e| e != incident.environment)
                || !filter.matches_site(&incident.site)
            {
                continue;
            }
            let kpis = outcome.kpis();
            rows.push(AuditRow {
                rca_id: rca.id,
                incident_id: incident.id,
                site: incident.site,
                environment: incident.environment,
                system_component: incident.system_component,
                severity: incident.severity,
                title: incident.title,
                created_at: rca.created_at,
                status: outcome.status(),
                actions_total: kpis.total_actions,
                actions_open: kpis.outstanding_actions,
                actions_missing_evidence: outcome
                    .verdicts()
                    .iter()
                    .filter(|v| v.evidence_count == 0)
                    .count(),
            });
        }
        rows.sort_by(|a, b| {
            a.environment
                .cmp(&b.environment)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| b.rca_id.cmp(&a.rca_id))
        });
        Ok(rows)
    }

    // ---- bulk data ----

    /// Load the deterministic demo graph and recompute every status
    ///
    /// Returns the number of records inserted.
    ///
    /// # Errors
    /// Returns [`WorkflowError::Persistence`] if the demo records collide
    /// with existing ones.
    pub async fn seed_demo(&self, seed: u64) -> WorkflowResult<usize> {
        let snapshot = demo_snapshot(self.clock.now(), &mut StdRng::seed_from_u64(seed));
        let records = snapshot.record_count();
        self.import_snapshot(snapshot).await?;
        tracing::info!(seed, records, "demo data seeded");
        Ok(records)
    }

    /// Bulk-load records and recompute every status
    ///
    /// # Errors
    /// Propagates store integrity failures; nothing is inserted then.
    pub async fn import_snapshot(&self, snapshot: StoreSnapshot) -> WorkflowResult<()> {
        self.store.bulk_load(snapshot).await?;
        self.index.mark_stale();
        self.recompute_all().await?;
        Ok(())
    }

    /// Image of every stored record
    pub async fn export_snapshot(&self) -> StoreSnapshot {
        self.store.snapshot().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{NaiveDate, TimeZone};
    use rca_domain::{ActionStatus, EvidenceKind};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn orchestrator() -> (WorkflowOrchestrator, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(t0()));
        let orchestrator =
            WorkflowOrchestrator::new(WorkflowConfig::default()).with_clock(clock.clone());
        (orchestrator, clock)
    }

    fn incident() -> IncidentDraft {
        IncidentDraft::new("Pump seal failure", "Seal leak", "Line 3", t0())
    }

    fn action(owner: &str) -> ActionDraft {
        ActionDraft::new(
            "Replace seal",
            owner,
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
        )
    }

    #[tokio::test]
    async fn intake_opens_an_empty_rca() {
        let (wf, _) = orchestrator();
        let intake = wf.submit_incident(incident()).await.unwrap();
        assert_eq!(intake.rca.incident_id, intake.incident.id);
        assert_eq!(intake.rca.status(), RcaStatus::Open);
        assert!(intake.rca.narrative.is_empty());
        assert!(intake.candidates.is_empty());
    }

    #[tokio::test]
    async fn future_incident_is_rejected() {
        let (wf, _) = orchestrator();
        let draft = IncidentDraft::new("x", "", "Line 3", t0() + Duration::hours(1));
        let err = wf.submit_incident(draft).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn evidence_moves_action_and_rca_forward() {
        let (wf, _) = orchestrator();
        let intake = wf.submit_incident(incident()).await.unwrap();
        let action = wf.add_action(intake.rca.id, action("alice")).await.unwrap();
        assert_eq!(action.status(), ActionStatus::Open);

        wf.add_evidence(
            action.id,
            EvidenceDraft::new(EvidenceKind::Link, "https://ci/run/7", "alice"),
        )
        .await
        .unwrap();

        assert_eq!(
            wf.action(action.id).await.unwrap().status(),
            ActionStatus::EvidenceSubmitted
        );
        assert_eq!(
            wf.rca(intake.rca.id).await.unwrap().status(),
            RcaStatus::PendingVerification
        );
    }

    #[tokio::test]
    async fn owner_cannot_verify_own_action() {
        let (wf, _) = orchestrator();
        let intake = wf.submit_incident(incident()).await.unwrap();
        let action = wf.add_action(intake.rca.id, action("alice")).await.unwrap();
        let err = wf
            .add_verification(action.id, VerificationDraft::pass("Alice"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
        assert!(wf
            .verifications_for_action(action.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn independence_rule_can_be_disabled() {
        let clock = Arc::new(FixedClock::new(t0()));
        let wf = WorkflowOrchestrator::new(
            WorkflowConfig::default().with_independent_verification(false),
        )
        .with_clock(clock);
        let intake = wf.submit_incident(incident()).await.unwrap();
        let action = wf.add_action(intake.rca.id, action("alice")).await.unwrap();
        wf.add_verification(action.id, VerificationDraft::pass("alice"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn children_of_missing_parents_are_invalid_references() {
        let (wf, _) = orchestrator();
        let err = wf
            .add_action(RcaId(ulid::Ulid::new()), action("alice"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidReference);

        let err = wf
            .add_evidence(
                ActionId(ulid::Ulid::new()),
                EvidenceDraft::new(EvidenceKind::Link, "x", "alice"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidReference);
    }

    #[tokio::test]
    async fn unknown_rca_reads_are_not_found() {
        let (wf, _) = orchestrator();
        let err = wf.rca_detail(RcaId(ulid::Ulid::new())).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn empty_rca_cannot_close() {
        let (wf, _) = orchestrator();
        let intake = wf.submit_incident(incident()).await.unwrap();
        let err = wf.close_rca(intake.rca.id).await.unwrap_err();
        assert_eq!(
            err.unmet_conditions(),
            &[rca_domain::UnmetCondition::NoActions]
        );
    }

    #[tokio::test]
    async fn seeded_demo_has_overdue_work() {
        let (wf, _) = orchestrator();
        let records = wf.seed_demo(42).await.unwrap();
        assert!(records > 0);

        let dashboard = wf.dashboard_snapshot().await.unwrap();
        assert_eq!(dashboard.total_rcas, 6);
        // the gateway timeout config action is 10 days past due without evidence
        assert!(dashboard.missing_evidence() >= 1);
        assert!(dashboard.overdue_actions() >= 1);
    }

    #[test]
    fn window_start_saturates_instead_of_overflowing() {
        assert_eq!(window_start(t0(), 7), t0() - Duration::days(7));
        assert_eq!(window_start(t0(), 0), t0());
        assert_eq!(window_start(t0(), u32::MAX), DateTime::<Utc>::MIN_UTC);
    }
}
