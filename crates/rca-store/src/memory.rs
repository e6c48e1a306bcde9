//! Concurrent in-memory record store
//!
//! - Entity tables are [`DashMap`]s; every write touches a single entry
//! - Secondary indexes (incident -> RCA, RCA -> actions, action -> records)
//!   are append-only id lists; an incident's list holds at most one RCA
//! - Ids are ULIDs from one monotonic generator, so id order follows
//!   creation order

use crate::error::{StoreError, StoreResult};
use crate::snapshot::{StoreSnapshot, SNAPSHOT_VERSION};
use crate::store::RecordStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use rca_domain::{
    Action, ActionDraft, ActionId, Evidence, EvidenceDraft, EvidenceId, GateOutcome, Incident,
    IncidentCorrection, IncidentDraft, IncidentId, Rca, RcaId, StatusTransition, Verification,
    VerificationDraft, VerificationId,
};
use std::collections::HashSet;
use std::hash::Hash;
use std::time::SystemTime;
use ulid::{Generator, Ulid};

/// Monotonic ULID source shared by all tables
struct IdGenerator {
    inner: Mutex<Generator>,
}

impl IdGenerator {
    fn new() -> Self {
        Self {
            inner: Mutex::new(Generator::new()),
        }
    }

    fn next(&self, at: DateTime<Utc>) -> Ulid {
        let time = SystemTime::from(at);
        // overflow of the random part within one millisecond
        self.inner
            .lock()
            .generate_from_datetime(time)
            .unwrap_or_else(|_| Ulid::from_datetime(time))
    }
}

/// In-memory [`RecordStore`]
pub struct MemoryStore {
    incidents: DashMap<IncidentId, Incident>,
    rcas: DashMap<RcaId, Rca>,
    actions: DashMap<ActionId, Action>,
    evidence: DashMap<EvidenceId, Evidence>,
    verifications: DashMap<VerificationId, Verification>,
    rcas_by_incident: DashMap<IncidentId, Vec<RcaId>>,
    actions_by_rca: DashMap<RcaId, Vec<ActionId>>,
    evidence_by_action: DashMap<ActionId, Vec<EvidenceId>>,
    verifications_by_action: DashMap<ActionId, Vec<VerificationId>>,
    ids: IdGenerator,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("incidents", &self.incidents.len())
            .field("rcas", &self.rcas.len())
            .field("actions", &self.actions.len())
            .field("evidence", &self.evidence.len())
            .field("verifications", &self.verifications.len())
            .finish()
    }
}

fn sorted_values<K, V, F, O>(map: &DashMap<K, V>, key: F) -> Vec<V>
where
    K: Eq + Hash,
    V: Clone,
    F: Fn(&V) -> O,
    O: Ord,
{
    let mut values: Vec<V> = map.iter().map(|entry| entry.value().clone()).collect();
    values.sort_by_key(key);
    values
}

fn child_values<P, C, V>(
    index: &DashMap<P, Vec<C>>,
    table: &DashMap<C, V>,
    parent: &P,
) -> Vec<V>
where
    P: Eq + Hash,
    C: Eq + Hash + Copy,
    V: Clone,
{
    let ids: Vec<C> = index
        .get(parent)
        .map(|entry| entry.value().clone())
        .unwrap_or_default();
    ids.iter()
        .filter_map(|id| table.get(id).map(|entry| entry.value().clone()))
        .collect()
}

fn rca_already_opened(incident_id: IncidentId) -> StoreError {
    StoreError::Duplicate {
        entity: "rca for incident",
        id: incident_id.to_string(),
    }
}

fn check_unique<K, V, I>(
    existing: &DashMap<K, V>,
    ids: I,
    entity: &'static str,
) -> StoreResult<HashSet<K>>
where
    K: Eq + Hash + Copy + std::fmt::Display,
    I: IntoIterator<Item = K>,
{
    let mut seen = HashSet::new();
    for id in ids {
        if existing.contains_key(&id) || !seen.insert(id) {
            return Err(StoreError::Duplicate {
                entity,
                id: id.to_string(),
            });
        }
    }
    Ok(seen)
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self {
            incidents: DashMap::new(),
            rcas: DashMap::new(),
            actions: DashMap::new(),
            evidence: DashMap::new(),
            verifications: DashMap::new(),
            rcas_by_incident: DashMap::new(),
            actions_by_rca: DashMap::new(),
            evidence_by_action: DashMap::new(),
            verifications_by_action: DashMap::new(),
            ids: IdGenerator::new(),
        }
    }

    /// Create a store holding a snapshot's records
    ///
    /// # Errors
    /// Fails like [`RecordStore::bulk_load`] on inconsistent snapshots.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> StoreResult<Self> {
        let store = Self::new();
        store.load(snapshot)?;
        Ok(store)
    }

    /// Number of RCAs held
    #[inline]
    #[must_use]
    pub fn rca_count(&self) -> usize {
        self.rcas.len()
    }

    fn require_action(&self, id: ActionId) -> StoreResult<()> {
        if self.actions.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::not_found("action", id))
        }
    }

    fn load(&self, snapshot: StoreSnapshot) -> StoreResult<()> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }

        let incident_ids =
            check_unique(&self.incidents, snapshot.incidents.iter().map(|i| i.id), "incident")?;
        let rca_ids = check_unique(&self.rcas, snapshot.rcas.iter().map(|r| r.id), "rca")?;
        let action_ids =
            check_unique(&self.actions, snapshot.actions.iter().map(|a| a.id), "action")?;
        check_unique(&self.evidence, snapshot.evidence.iter().map(|e| e.id), "evidence")?;
        check_unique(
            &self.verifications,
            snapshot.verifications.iter().map(|v| v.id),
            "verification",
        )?;

        let mut owners = HashSet::with_capacity(snapshot.rcas.len());
        for rca in &snapshot.rcas {
            if !incident_ids.contains(&rca.incident_id)
                && !self.incidents.contains_key(&rca.incident_id)
            {
                return Err(StoreError::invalid_reference("rca", "incident", rca.incident_id));
            }
            if self.rcas_by_incident.contains_key(&rca.incident_id)
                || !owners.insert(rca.incident_id)
            {
                return Err(rca_already_opened(rca.incident_id));
            }
        }
        for action in &snapshot.actions {
            if !rca_ids.contains(&action.rca_id) && !self.rcas.contains_key(&action.rca_id) {
                return Err(StoreError::invalid_reference("action", "rca", action.rca_id));
            }
        }
        let known_action =
            |id: &ActionId| action_ids.contains(id) || self.actions.contains_key(id);
        if let Some(evidence) = snapshot.evidence.iter().find(|e| !known_action(&e.action_id)) {
            return Err(StoreError::invalid_reference("evidence", "action", evidence.action_id));
        }
        if let Some(verification) = snapshot
            .verifications
            .iter()
            .find(|v| !known_action(&v.action_id))
        {
            return Err(StoreError::invalid_reference(
                "verification",
                "action",
                verification.action_id,
            ));
        }

        let counts = snapshot.record_count();

        let mut rcas = snapshot.rcas;
        rcas.sort_by_key(|r| r.id);
        let mut actions = snapshot.actions;
        actions.sort_by_key(|a| a.id);
        let mut evidence = snapshot.evidence;
        evidence.sort_by_key(|e| (e.submitted_at, e.id));
        let mut verifications = snapshot.verifications;
        verifications.sort_by_key(Verification::order_key);

        for incident in snapshot.incidents {
            self.incidents.insert(incident.id, incident);
        }
        for rca in rcas {
            self.rcas_by_incident
                .entry(rca.incident_id)
                .or_default()
                .push(rca.id);
            self.rcas.insert(rca.id, rca);
        }
        for action in actions {
            self.actions_by_rca.entry(action.rca_id).or_default().push(action.id);
            self.actions.insert(action.id, action);
        }
        for record in evidence {
            self.evidence_by_action
                .entry(record.action_id)
                .or_default()
                .push(record.id);
            self.evidence.insert(record.id, record);
        }
        for record in verifications {
            self.verifications_by_action
                .entry(record.action_id)
                .or_default()
                .push(record.id);
            self.verifications.insert(record.id, record);
        }

        tracing::debug!(records = counts, "snapshot loaded into store");
        Ok(())
    }
}

fn apply_correction(incident: &mut Incident, correction: IncidentCorrection) {
    if let Some(title) = correction.title {
        incident.title = title.trim().to_string();
    }
    if let Some(description) = correction.description {
        incident.description = description;
    }
    if let Some(severity) = correction.severity {
        incident.severity = severity;
    }
    if let Some(site) = correction.site {
        incident.site = site.trim().to_string();
    }
    if let Some(environment) = correction.environment {
        incident.environment = environment;
    }
    if let Some(component) = correction.system_component {
        let component = component.trim().to_string();
        incident.system_component = (!component.is_empty()).then_some(component);
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create_incident(
        &self,
        draft: IncidentDraft,
        created_at: DateTime<Utc>,
    ) -> StoreResult<Incident> {
        let id = IncidentId(self.ids.next(created_at));
        let incident = Incident::from_draft(id, draft, created_at);
        self.incidents.insert(id, incident.clone());
        Ok(incident)
    }

    async fn get_incident(&self, id: IncidentId) -> StoreResult<Incident> {
        self.incidents
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::not_found("incident", id))
    }

    async fn list_incidents(&self) -> Vec<Incident> {
        sorted_values(&self.incidents, |i| i.id)
    }

    async fn correct_incident(
        &self,
        id: IncidentId,
        correction: IncidentCorrection,
    ) -> StoreResult<Incident> {
        let mut entry = self
            .incidents
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("incident", id))?;
        apply_correction(entry.value_mut(), correction);
        Ok(entry.value().clone())
    }

    async fn create_rca(
        &self,
        incident_id: IncidentId,
        narrative: String,
        created_at: DateTime<Utc>,
    ) -> StoreResult<Rca> {
        if !self.incidents.contains_key(&incident_id) {
            return Err(StoreError::invalid_reference("rca", "incident", incident_id));
        }
        match self.rcas_by_incident.entry(incident_id) {
            Entry::Occupied(_) => Err(rca_already_opened(incident_id)),
            Entry::Vacant(slot) => {
                let id = RcaId(self.ids.next(created_at));
                let rca = Rca::new(id, incident_id, narrative, created_at);
                self.rcas.insert(id, rca.clone());
                slot.insert(vec![id]);
                Ok(rca)
            }
        }
    }

    async fn get_rca(&self, id: RcaId) -> StoreResult<Rca> {
        self.rcas
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::not_found("rca", id))
    }

    async fn list_rcas(&self) -> Vec<Rca> {
        sorted_values(&self.rcas, |r| r.id)
    }

    async fn rcas_for_incident(&self, incident_id: IncidentId) -> StoreResult<Vec<Rca>> {
        if !self.incidents.contains_key(&incident_id) {
            return Err(StoreError::not_found("incident", incident_id));
        }
        Ok(child_values(&self.rcas_by_incident, &self.rcas, &incident_id))
    }

    async fn update_narrative(&self, id: RcaId, narrative: String) -> StoreResult<Rca> {
        let mut entry = self
            .rcas
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("rca", id))?;
        entry.narrative = narrative;
        Ok(entry.value().clone())
    }

    async fn apply_gate_outcome(
        &self,
        outcome: &GateOutcome,
    ) -> StoreResult<Option<StatusTransition>> {
        let transition = {
            let mut rca = self
                .rcas
                .get_mut(&outcome.rca_id())
                .ok_or_else(|| StoreError::not_found("rca", outcome.rca_id()))?;
            rca.apply_outcome(outcome)?
        };
        for verdict in outcome.verdicts() {
            if let Some(mut action) = self.actions.get_mut(&verdict.action_id) {
                action.apply_outcome(outcome);
            }
        }
        Ok(transition)
    }

    async fn create_action(
        &self,
        rca_id: RcaId,
        draft: ActionDraft,
        created_at: DateTime<Utc>,
    ) -> StoreResult<Action> {
        if !self.rcas.contains_key(&rca_id) {
            return Err(StoreError::invalid_reference("action", "rca", rca_id));
        }
        let id = ActionId(self.ids.next(created_at));
        let action = Action::from_draft(id, rca_id, draft, created_at);
        self.actions.insert(id, action.clone());
        self.actions_by_rca.entry(rca_id).or_default().push(id);
        Ok(action)
    }

    async fn get_action(&self, id: ActionId) -> StoreResult<Action> {
        self.actions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::not_found("action", id))
    }

    async fn actions_for_rca(&self, rca_id: RcaId) -> StoreResult<Vec<Action>> {
        if !self.rcas.contains_key(&rca_id) {
            return Err(StoreError::not_found("rca", rca_id));
        }
        let mut actions = child_values(&self.actions_by_rca, &self.actions, &rca_id);
        actions.sort_by_key(|a| (a.created_at, a.id));
        Ok(actions)
    }

    async fn append_evidence(
        &self,
        action_id: ActionId,
        draft: EvidenceDraft,
        submitted_at: DateTime<Utc>,
    ) -> StoreResult<Evidence> {
        if !self.actions.contains_key(&action_id) {
            return Err(StoreError::invalid_reference("evidence", "action", action_id));
        }
        let id = EvidenceId(self.ids.next(submitted_at));
        let record = Evidence::from_draft(id, action_id, draft, submitted_at);
        self.evidence.insert(id, record.clone());
        self.evidence_by_action.entry(action_id).or_default().push(id);
        Ok(record)
    }

    async fn evidence_for_action(&self, action_id: ActionId) -> StoreResult<Vec<Evidence>> {
        self.require_action(action_id)?;
        let mut records = child_values(&self.evidence_by_action, &self.evidence, &action_id);
        records.sort_by_key(|e| (e.submitted_at, e.id));
        Ok(records)
    }

    async fn append_verification(
        &self,
        action_id: ActionId,
        draft: VerificationDraft,
        verified_at: DateTime<Utc>,
    ) -> StoreResult<Verification> {
        if !self.actions.contains_key(&action_id) {
            return Err(StoreError::invalid_reference("verification", "action", action_id));
        }
        let id = VerificationId(self.ids.next(verified_at));
        let record = Verification::from_draft(id, action_id, draft, verified_at);
        self.verifications.insert(id, record.clone());
        self.verifications_by_action
            .entry(action_id)
            .or_default()
            .push(id);
        Ok(record)
    }

    async fn verifications_for_action(
        &self,
        action_id: ActionId,
    ) -> StoreResult<Vec<Verification>> {
        self.require_action(action_id)?;
        let mut records =
            child_values(&self.verifications_by_action, &self.verifications, &action_id);
        records.sort_by_key(Verification::order_key);
        Ok(records)
    }

    async fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            version: SNAPSHOT_VERSION,
            incidents: sorted_values(&self.incidents, |i| i.id),
            rcas: sorted_values(&self.rcas, |r| r.id),
            actions: sorted_values(&self.actions, |a| a.id),
            evidence: sorted_values(&self.evidence, |e| e.id),
            verifications: sorted_values(&self.verifications, |v| v.id),
        }
    }

    async fn bulk_load(&self, snapshot: StoreSnapshot) -> StoreResult<()> {
        self.load(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};
    use rca_domain::{EvidenceKind, GateOutcome};
    use std::collections::HashMap;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn draft() -> IncidentDraft {
        IncidentDraft::new("Pump seal failure", "Leak at the seal", "Line 3", t0())
    }

    fn due() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    #[tokio::test]
    async fn ids_follow_creation_order() {
        let store = MemoryStore::new();
        let a = store.create_incident(draft(), t0()).await.unwrap();
        let b = store.create_incident(draft(), t0()).await.unwrap();
        let c = store
            .create_incident(draft(), t0() - Duration::days(1))
            .await
            .unwrap();
        assert!(a.id < b.id);
        assert!(b.id < c.id);
    }

    #[tokio::test]
    async fn rca_requires_existing_incident() {
        let store = MemoryStore::new();
        let missing = IncidentId(Ulid::new());
        let err = store
            .create_rca(missing, String::new(), t0())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidReference { entity: "rca", .. }));
    }

    #[tokio::test]
    async fn child_queries_on_unknown_parent_are_not_found() {
        let store = MemoryStore::new();
        assert!(store
            .actions_for_rca(RcaId(Ulid::new()))
            .await
            .unwrap_err()
            .is_not_found());
        assert!(store
            .evidence_for_action(ActionId(Ulid::new()))
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn correction_overwrites_only_supplied_fields() {
        let store = MemoryStore::new();
        let incident = store.create_incident(draft(), t0()).await.unwrap();
        let corrected = store
            .correct_incident(
                incident.id,
                IncidentCorrection {
                    title: Some("  Pump seal failure (corrected) ".into()),
                    ..IncidentCorrection::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(corrected.title, "Pump seal failure (corrected)");
        assert_eq!(corrected.site, incident.site);
        assert_eq!(corrected.description, incident.description);
    }

    #[tokio::test]
    async fn gate_outcome_updates_cached_statuses() {
        let store = MemoryStore::new();
        let incident = store.create_incident(draft(), t0()).await.unwrap();
        let rca = store
            .create_rca(incident.id, "worn seal".into(), t0())
            .await
            .unwrap();
        let action = store
            .create_action(rca.id, ActionDraft::new("Replace seal", "alice", due()), t0())
            .await
            .unwrap();
        let evidence = store
            .append_evidence(
                action.id,
                EvidenceDraft::new(EvidenceKind::Link, "https://ci/run/1", "alice"),
                t0(),
            )
            .await
            .unwrap();

        let outcome: GateOutcome = rca_domain::gate::recompute(
            &rca,
            &[action.clone()],
            &HashMap::from([(action.id, vec![evidence])]),
            &HashMap::new(),
            t0(),
        );
        let transition = store.apply_gate_outcome(&outcome).await.unwrap();

        assert_eq!(
            transition.map(|t| t.to),
            Some(rca_domain::RcaStatus::PendingVerification)
        );
        assert_eq!(
            store.get_action(action.id).await.unwrap().status(),
            rca_domain::ActionStatus::EvidenceSubmitted
        );
    }
}
