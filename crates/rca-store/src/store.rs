//! The record store seam
//!
//! The store owns identity and referential integrity. It does not validate
//! field contents (the orchestrator does) and never derives status: cached
//! statuses change only through [`RecordStore::apply_gate_outcome`].

use crate::error::StoreResult;
use crate::snapshot::StoreSnapshot;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rca_domain::{
    Action, ActionDraft, ActionId, Evidence, EvidenceDraft, GateOutcome, Incident,
    IncidentCorrection, IncidentDraft, IncidentId, Rca, RcaId, StatusTransition, Verification,
    VerificationDraft,
};

/// Persistence operations over the RCA record graph
///
/// Fetching an unknown id yields `NotFound`; creating a record whose parent
/// does not exist yields `InvalidReference`. Evidence and verifications are
/// append-only.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new incident
    async fn create_incident(
        &self,
        draft: IncidentDraft,
        created_at: DateTime<Utc>,
    ) -> StoreResult<Incident>;

    /// Fetch an incident
    async fn get_incident(&self, id: IncidentId) -> StoreResult<Incident>;

    /// All incidents, oldest first
    async fn list_incidents(&self) -> Vec<Incident>;

    /// Overwrite the supplied incident fields
    async fn correct_incident(
        &self,
        id: IncidentId,
        correction: IncidentCorrection,
    ) -> StoreResult<Incident>;

    /// Open the RCA of an existing incident
    ///
    /// An incident owns at most one RCA; a second one is refused with
    /// [`StoreError::Duplicate`](crate::StoreError::Duplicate).
    async fn create_rca(
        &self,
        incident_id: IncidentId,
        narrative: String,
        created_at: DateTime<Utc>,
    ) -> StoreResult<Rca>;

    /// Fetch an RCA
    async fn get_rca(&self, id: RcaId) -> StoreResult<Rca>;

    /// All RCAs, oldest first
    async fn list_rcas(&self) -> Vec<Rca>;

    /// RCA opened for an incident (zero or one)
    async fn rcas_for_incident(&self, incident_id: IncidentId) -> StoreResult<Vec<Rca>>;

    /// Replace an RCA's narrative
    async fn update_narrative(&self, id: RcaId, narrative: String) -> StoreResult<Rca>;

    /// Persist a recomputed gate outcome into the cached RCA and action statuses
    async fn apply_gate_outcome(
        &self,
        outcome: &GateOutcome,
    ) -> StoreResult<Option<StatusTransition>>;

    /// Add a corrective action to an existing RCA
    async fn create_action(
        &self,
        rca_id: RcaId,
        draft: ActionDraft,
        created_at: DateTime<Utc>,
    ) -> StoreResult<Action>;

    /// Fetch an action
    async fn get_action(&self, id: ActionId) -> StoreResult<Action>;

    /// Actions of an RCA, oldest first
    async fn actions_for_rca(&self, rca_id: RcaId) -> StoreResult<Vec<Action>>;

    /// Append evidence to an existing action
    async fn append_evidence(
        &self,
        action_id: ActionId,
        draft: EvidenceDraft,
        submitted_at: DateTime<Utc>,
    ) -> StoreResult<Evidence>;

    /// Evidence of an action ordered by submission time
    async fn evidence_for_action(&self, action_id: ActionId) -> StoreResult<Vec<Evidence>>;

    /// Append a verification to an existing action
    async fn append_verification(
        &self,
        action_id: ActionId,
        draft: VerificationDraft,
        verified_at: DateTime<Utc>,
    ) -> StoreResult<Verification>;

    /// Verifications of an action ordered by verification time
    async fn verifications_for_action(&self, action_id: ActionId)
        -> StoreResult<Vec<Verification>>;

    /// Consistent-per-table image of every record
    async fn snapshot(&self) -> StoreSnapshot;

    /// Insert every record of a snapshot
    ///
    /// Nothing is inserted when any record duplicates an existing id, gives
    /// an incident a second RCA, or references a parent absent from both the
    /// store and the snapshot.
    async fn bulk_load(&self, snapshot: StoreSnapshot) -> StoreResult<()>;
}
