//! Serializable image of the whole store

use rca_domain::{Action, Evidence, Incident, Rca, Verification};
use serde::{Deserialize, Serialize};

/// Snapshot format written by this build
pub const SNAPSHOT_VERSION: u32 = 1;

/// Every record in the store, each table sorted by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Format version
    pub version: u32,
    /// Incidents
    #[serde(default)]
    pub incidents: Vec<Incident>,
    /// RCAs
    #[serde(default)]
    pub rcas: Vec<Rca>,
    /// Corrective actions
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Evidence records
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    /// Verification records
    #[serde(default)]
    pub verifications: Vec<Verification>,
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            incidents: Vec::new(),
            rcas: Vec::new(),
            actions: Vec::new(),
            evidence: Vec::new(),
            verifications: Vec::new(),
        }
    }
}

impl StoreSnapshot {
    /// Whether the snapshot holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
            && self.rcas.is_empty()
            && self.actions.is_empty()
            && self.evidence.is_empty()
            && self.verifications.is_empty()
    }

    /// Total record count
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.incidents.len()
            + self.rcas.len()
            + self.actions.len()
            + self.evidence.len()
            + self.verifications.len()
    }
}
