//! Read models returned by the orchestrator

use chrono::{DateTime, Utc};
use rca_domain::{
    Action, Environment, Evidence, GateKpis, Incident, IncidentId, Rca, RcaId, RcaStatus,
    Severity, UnmetCondition, Verification,
};
use serde::Serialize;

/// Prior RCA resembling a new incident
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarCandidate {
    /// Matching RCA
    pub rca_id: RcaId,
    /// Incident the RCA belongs to
    pub incident_id: IncidentId,
    /// Title of that incident
    pub incident_title: String,
    /// Cached status of the RCA
    pub status: RcaStatus,
    /// Cosine similarity in `[0, 1]`
    pub score: f64,
    /// Score reached the configured recurrence threshold
    pub likely_recurrence: bool,
}

/// Result of submitting an incident
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncidentIntake {
    /// Stored incident
    pub incident: Incident,
    /// Empty RCA opened for it
    pub rca: Rca,
    /// Possible recurrences, best first; linking stays a human decision
    pub candidates: Vec<SimilarCandidate>,
}

/// Action with its supporting records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionDetail {
    /// The action
    pub action: Action,
    /// Evidence, oldest first
    pub evidence: Vec<Evidence>,
    /// Verifications, oldest first
    pub verifications: Vec<Verification>,
    /// Past due and not verified
    pub overdue: bool,
}

/// Everything recorded about one RCA
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RcaDetail {
    /// Owning incident
    pub incident: Incident,
    /// The RCA
    pub rca: Rca,
    /// Actions, oldest first
    pub actions: Vec<ActionDetail>,
    /// KPIs as of the read
    pub kpis: GateKpis,
    /// What still blocks closure
    pub unmet: Vec<UnmetCondition>,
}

/// Open RCA line in the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenRcaSummary {
    /// RCA
    pub rca_id: RcaId,
    /// Incident title
    pub title: String,
    /// Incident environment
    pub environment: Environment,
    /// Current status
    pub status: RcaStatus,
    /// When the RCA was opened
    pub created_at: DateTime<Utc>,
    /// Per-RCA KPIs
    pub kpis: GateKpis,
}

/// RCA counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    /// `Open`
    pub open: usize,
    /// `PendingVerification`
    pub pending_verification: usize,
    /// `Closed`
    pub closed: usize,
}

impl StatusCounts {
    pub(crate) fn record(&mut self, status: RcaStatus) {
        match status {
            RcaStatus::Open => self.open += 1,
            RcaStatus::PendingVerification => self.pending_verification += 1,
            RcaStatus::Closed => self.closed += 1,
        }
    }

    /// RCAs not closed
    #[inline]
    #[must_use]
    pub fn not_closed(&self) -> usize {
        self.open + self.pending_verification
    }
}

/// Aggregate KPIs across RCAs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    /// Time the KPIs were computed for
    pub generated_at: DateTime<Utc>,
    /// All RCAs
    pub total_rcas: usize,
    /// RCAs per status
    pub status_counts: StatusCounts,
    /// KPIs summed over RCAs that are not closed
    pub open_kpis: GateKpis,
    /// Share of all actions with evidence, in percent
    pub evidenced_pct: f64,
    /// Share of all actions verified, in percent
    pub verified_pct: f64,
    /// Incidents that occurred within the recent window
    pub recent_incidents: usize,
    /// Length of the recent window
    pub recent_window_days: u32,
    /// RCAs not closed, newest first
    pub open_rcas: Vec<OpenRcaSummary>,
}

impl DashboardSnapshot {
    /// Past-due actions without evidence across open RCAs
    #[inline]
    #[must_use]
    pub fn missing_evidence(&self) -> usize {
        self.open_kpis.missing_evidence
    }

    /// Past-due unverified actions across open RCAs
    #[inline]
    #[must_use]
    pub fn overdue_actions(&self) -> usize {
        self.open_kpis.overdue_actions
    }

    /// Unverified actions across open RCAs
    #[inline]
    #[must_use]
    pub fn open_actions(&self) -> usize {
        self.open_kpis.outstanding_actions
    }
}

/// Audit view filter; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    /// Only RCAs whose incident was in this environment
    pub environment: Option<Environment>,
    /// Only RCAs whose incident site contains this text (case-insensitive)
    pub site_contains: Option<String>,
    /// Only RCAs with this status
    pub status: Option<RcaStatus>,
    /// Only RCAs opened within this many days; configured default when unset
    pub within_days: Option<u32>,
}

impl AuditFilter {
    /// With environment
    #[inline]
    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// With site substring
    #[inline]
    #[must_use]
    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site_contains = Some(site.into());
        self
    }

    /// Whether an incident site passes the site filter
    #[must_use]
    pub fn matches_site(&self, site: &str) -> bool {
        self.site_contains.as_deref().map_or(true, |needle| {
            site.to_lowercase().contains(&needle.trim().to_lowercase())
        })
    }

    /// With status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: RcaStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// With look-back window
    #[inline]
    #[must_use]
    pub fn within_days(mut self, days: u32) -> Self {
        self.within_days = Some(days);
        self
    }

    /// Pre-Live RCAs of the last six months
    #[must_use]
    pub fn pre_live_last_six_months() -> Self {
        Self::default()
            .with_environment(Environment::PreLive)
            .within_days(183)
    }
}

/// One line of the audit view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRow {
    /// RCA
    pub rca_id: RcaId,
    /// Incident
    pub incident_id: IncidentId,
    /// Site or unit
    pub site: String,
    /// Environment
    pub environment: Environment,
    /// Affected component
    pub system_component: Option<String>,
    /// Severity
    pub severity: Severity,
    /// Incident title
    pub title: String,
    /// When the RCA was opened
    pub created_at: DateTime<Utc>,
    /// Current status
    pub status: RcaStatus,
    /// Number of actions
    pub actions_total: usize,
    /// Actions not yet verified
    pub actions_open: usize,
    /// Actions without any evidence
    pub actions_missing_evidence: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_filter_is_case_insensitive_substring() {
        let filter = AuditFilter::default().with_site(" nis ");
        assert!(filter.matches_site("Nissan Sunderland"));
        assert!(!filter.matches_site("Toyota"));
        assert!(AuditFilter::default().matches_site("anything"));
    }
}
