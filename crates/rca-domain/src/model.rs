//! Core entities of the closed loop
//!
//! Incident → RCA (1:1) → Actions → Evidence / Verifications.
//!
//! Status values on [`Rca`] and [`Action`] are never written directly; they
//! change only by applying a [`GateOutcome`](crate::gate::GateOutcome).

use crate::ids::{ActionId, EvidenceId, IncidentId, RcaId, VerificationId};
use crate::validation::{ActionDraft, EvidenceDraft, IncidentDraft, VerificationDraft};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when parsing an enumerated value from text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {input:?} (expected one of: {expected})")]
pub struct ParseEnumError {
    /// Enumeration being parsed
    pub kind: &'static str,
    /// Offending input
    pub input: String,
    /// Accepted spellings
    pub expected: &'static str,
}

/// Implements `as_str`, `Display` and case-insensitive `FromStr`.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal $(| $alias:literal)*),+ $(,)? }) => {
        impl $name {
            /// All variants in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Canonical text form
            #[inline]
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.trim();
                $(
                    if needle.eq_ignore_ascii_case($text) $(|| needle.eq_ignore_ascii_case($alias))* {
                        return Ok($name::$variant);
                    }
                )+
                Err(ParseEnumError {
                    kind: $kind,
                    input: s.to_string(),
                    expected: concat!($($text, " "),+),
                })
            }
        }
    };
}

/// Incident severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Severity {
    /// Critical
    P1,
    /// Major
    #[default]
    P2,
    /// Minor
    P3,
    /// Cosmetic
    P4,
}

text_enum!(Severity, "severity", {
    P1 => "P1",
    P2 => "P2",
    P3 => "P3",
    P4 => "P4",
});

/// Deployment environment an incident was observed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Environment {
    /// Pre-live / staging
    #[serde(rename = "Pre-Live")]
    PreLive,
    /// User acceptance testing
    #[serde(rename = "UAT")]
    Uat,
    /// Production
    #[default]
    Production,
}

text_enum!(Environment, "environment", {
    PreLive => "Pre-Live" | "prelive" | "pre_live",
    Uat => "UAT",
    Production => "Production" | "prod",
});

/// Category of corrective action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ActionType {
    /// Prevent the failure mode
    Prevent,
    /// Detect the failure mode earlier
    Detect,
    /// Process change
    Process,
    /// Code fix
    #[default]
    CodeFix,
    /// Configuration change
    Config,
    /// Additional test coverage
    TestCoverage,
}

text_enum!(ActionType, "action type", {
    Prevent => "Prevent",
    Detect => "Detect",
    Process => "Process",
    CodeFix => "Code fix" | "codefix" | "code-fix",
    Config => "Config",
    TestCoverage => "Test coverage" | "testcoverage" | "test-coverage",
});

/// Kind of evidence artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EvidenceKind {
    /// URL to an external artifact
    #[default]
    Link,
    /// Note describing an attached file
    FileNote,
    /// Note describing a screenshot
    ScreenshotNote,
    /// Note describing a test run
    TestRunNote,
    /// Note describing monitoring output
    MonitoringNote,
}

text_enum!(EvidenceKind, "evidence kind", {
    Link => "Link",
    FileNote => "File note" | "file",
    ScreenshotNote => "Screenshot note" | "screenshot",
    TestRunNote => "Test run note" | "test-run" | "testrun",
    MonitoringNote => "Monitoring note" | "monitoring",
});

/// Outcome of an independent verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationOutcome {
    /// Evidence confirms the action is effective
    Pass,
    /// Evidence does not confirm the action
    Fail,
}

text_enum!(VerificationOutcome, "verification outcome", {
    Pass => "Pass",
    Fail => "Fail",
});

/// Derived status of a corrective action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ActionStatus {
    /// No evidence yet
    #[default]
    Open,
    /// Evidence exists, latest verification (if any) is not a pass
    EvidenceSubmitted,
    /// Evidence exists and the latest verification passed
    Verified,
}

text_enum!(ActionStatus, "action status", {
    Open => "Open",
    EvidenceSubmitted => "EvidenceSubmitted" | "Evidence Submitted",
    Verified => "Verified",
});

/// Derived status of an RCA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RcaStatus {
    /// No action has evidence
    #[default]
    Open,
    /// Some evidence is in, not every action verified
    PendingVerification,
    /// Every action verified
    Closed,
}

text_enum!(RcaStatus, "RCA status", {
    Open => "Open",
    PendingVerification => "PendingVerification" | "Pending Verification" | "pending",
    Closed => "Closed",
});

/// A recorded incident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Identifier
    pub id: IncidentId,
    /// Short title
    pub title: String,
    /// Free-text description
    pub description: String,
    /// When the incident happened
    pub occurred_at: DateTime<Utc>,
    /// Severity
    pub severity: Severity,
    /// Site or unit the incident happened at
    pub site: String,
    /// Environment the incident was observed in
    pub environment: Environment,
    /// Affected system or component
    pub system_component: Option<String>,
    /// When the record was created
    pub created_at: DateTime<Utc>,
}

impl Incident {
    /// Build an incident from a validated draft
    #[must_use]
    pub fn from_draft(id: IncidentId, draft: IncidentDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title.trim().to_string(),
            description: draft.description,
            occurred_at: draft.occurred_at,
            severity: draft.severity,
            site: draft.site.trim().to_string(),
            environment: draft.environment,
            system_component: draft.system_component,
            created_at,
        }
    }

    /// Text contributed to the similarity corpus
    #[must_use]
    pub fn corpus_text(&self) -> String {
        let mut text = format!("{} {}", self.title, self.description);
        if let Some(component) = &self.system_component {
            text.push(' ');
            text.push_str(component);
        }
        text
    }
}

/// One status epoch in an RCA's history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEpoch {
    /// Status held during the epoch
    pub status: RcaStatus,
    /// Start of the epoch
    pub since: DateTime<Utc>,
}

/// Status change produced by applying a gate outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusTransition {
    /// Status before
    pub from: RcaStatus,
    /// Status after
    pub to: RcaStatus,
    /// When the change was recorded
    pub at: DateTime<Utc>,
}

impl StatusTransition {
    /// Whether this transition left `Closed`
    #[inline]
    #[must_use]
    pub fn is_reopen(&self) -> bool {
        self.from == RcaStatus::Closed && self.to != RcaStatus::Closed
    }
}

/// Root-cause analysis tied to exactly one incident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rca {
    /// Identifier
    pub id: RcaId,
    /// Owning incident
    pub incident_id: IncidentId,
    /// Root-cause narrative
    pub narrative: String,
    /// When the RCA was opened
    pub created_at: DateTime<Utc>,
    pub(crate) status: RcaStatus,
    pub(crate) closed_at: Option<DateTime<Utc>>,
    pub(crate) history: Vec<StatusEpoch>,
}

impl Rca {
    /// Open a new RCA for an incident
    #[must_use]
    pub fn new(
        id: RcaId,
        incident_id: IncidentId,
        narrative: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            incident_id,
            narrative: narrative.into(),
            created_at,
            status: RcaStatus::Open,
            closed_at: None,
            history: vec![StatusEpoch {
                status: RcaStatus::Open,
                since: created_at,
            }],
        }
    }

    /// Cached status (as of the last recompute)
    #[inline]
    #[must_use]
    pub fn status(&self) -> RcaStatus {
        self.status
    }

    /// First time the RCA entered `Closed`; never cleared
    #[inline]
    #[must_use]
    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    /// Append-only status history, oldest first
    #[inline]
    #[must_use]
    pub fn history(&self) -> &[StatusEpoch] {
        &self.history
    }

    /// Number of times the RCA left `Closed`
    #[must_use]
    pub fn reopen_count(&self) -> usize {
        self.history
            .windows(2)
            .filter(|w| w[0].status == RcaStatus::Closed && w[1].status != RcaStatus::Closed)
            .count()
    }

    /// Whether the RCA is not closed
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status != RcaStatus::Closed
    }
}

/// Corrective action owned by one RCA
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Identifier
    pub id: ActionId,
    /// Owning RCA
    pub rca_id: RcaId,
    /// What has to be done
    pub description: String,
    /// Responsible person
    pub owner: String,
    /// Responsible team
    pub owner_team: Option<String>,
    /// Category
    pub action_type: ActionType,
    /// Due date
    pub due_date: NaiveDate,
    /// How completion will be verified
    pub verification_method: String,
    /// When the action was added
    pub created_at: DateTime<Utc>,
    pub(crate) status: ActionStatus,
}

impl Action {
    /// Build an action from a validated draft
    #[must_use]
    pub fn from_draft(
        id: ActionId,
        rca_id: RcaId,
        draft: ActionDraft,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            rca_id,
            description: draft.description.trim().to_string(),
            owner: draft.owner.trim().to_string(),
            owner_team: draft.owner_team,
            action_type: draft.action_type,
            due_date: draft.due_date,
            verification_method: draft.verification_method.trim().to_string(),
            created_at,
            status: ActionStatus::Open,
        }
    }

    /// Cached status (as of the last recompute)
    #[inline]
    #[must_use]
    pub fn status(&self) -> ActionStatus {
        self.status
    }

    /// Whether the due date has passed as of `today`
    #[inline]
    #[must_use]
    pub fn is_past_due(&self, today: NaiveDate) -> bool {
        self.due_date < today
    }
}

/// Append-only evidence record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Identifier
    pub id: EvidenceId,
    /// Action this supports
    pub action_id: ActionId,
    /// Kind of artifact
    pub kind: EvidenceKind,
    /// Free text or attachment reference
    pub reference: String,
    /// Who submitted it
    pub submitted_by: String,
    /// When it was submitted
    pub submitted_at: DateTime<Utc>,
}

impl Evidence {
    /// Build an evidence record from a validated draft
    #[must_use]
    pub fn from_draft(
        id: EvidenceId,
        action_id: ActionId,
        draft: EvidenceDraft,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            action_id,
            kind: draft.kind,
            reference: draft.reference.trim().to_string(),
            submitted_by: draft.submitted_by.trim().to_string(),
            submitted_at,
        }
    }
}

/// Append-only verification record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    /// Identifier
    pub id: VerificationId,
    /// Action being verified
    pub action_id: ActionId,
    /// Who verified
    pub verifier: String,
    /// Pass or fail
    pub outcome: VerificationOutcome,
    /// Optional notes
    pub notes: Option<String>,
    /// When the check was made
    pub verified_at: DateTime<Utc>,
}

impl Verification {
    /// Build a verification record from a validated draft
    #[must_use]
    pub fn from_draft(
        id: VerificationId,
        action_id: ActionId,
        draft: VerificationDraft,
        verified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            action_id,
            verifier: draft.verifier.trim().to_string(),
            outcome: draft.outcome,
            notes: draft.notes.filter(|n| !n.trim().is_empty()),
            verified_at,
        }
    }

    /// Ordering key: verification time, then id
    #[inline]
    #[must_use]
    pub fn order_key(&self) -> (DateTime<Utc>, VerificationId) {
        (self.verified_at, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ulid::Ulid;

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!("pre-live".parse::<Environment>().unwrap(), Environment::PreLive);
        assert_eq!("uat".parse::<Environment>().unwrap(), Environment::Uat);
        assert_eq!("pass".parse::<VerificationOutcome>().unwrap(), VerificationOutcome::Pass);
        assert_eq!("Code fix".parse::<ActionType>().unwrap(), ActionType::CodeFix);
        assert!("P7".parse::<Severity>().is_err());
    }

    #[test]
    fn environment_serializes_with_dashboard_spelling() {
        let json = serde_json::to_string(&Environment::PreLive).unwrap();
        assert_eq!(json, "\"Pre-Live\"");
    }

    #[test]
    fn new_rca_starts_open_with_one_epoch() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let rca = Rca::new(RcaId(Ulid::new()), IncidentId(Ulid::new()), "", at);
        assert_eq!(rca.status(), RcaStatus::Open);
        assert_eq!(rca.closed_at(), None);
        assert_eq!(rca.history().len(), 1);
        assert_eq!(rca.reopen_count(), 0);
    }
}
