//! Entity drafts and input validation
//!
//! Drafts are what callers hand to the orchestrator. Identifiers and
//! timestamps are assigned later, so a draft can be validated without
//! touching storage.

use crate::model::{ActionType, Environment, EvidenceKind, Severity, VerificationOutcome};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Verification method suggested when the caller gives none
pub const DEFAULT_VERIFICATION_METHOD: &str = "Regression test + monitoring evidence";

/// Malformed input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A required text field is blank
    #[error("{field} must not be empty")]
    EmptyField {
        /// Field name
        field: &'static str,
    },

    /// Incident timestamp lies in the future
    #[error("occurred_at {occurred_at} is later than now ({now})")]
    OccurredInFuture {
        /// Supplied timestamp
        occurred_at: DateTime<Utc>,
        /// Reference time
        now: DateTime<Utc>,
    },

    /// Action due before its RCA was opened
    #[error("due date {due} is before the RCA creation date {created}")]
    DueBeforeCreation {
        /// Supplied due date
        due: NaiveDate,
        /// RCA creation date
        created: NaiveDate,
    },

    /// Verifier is not independent of the work being verified
    #[error("verifier {verifier:?} is not independent: {reason}")]
    VerifierNotIndependent {
        /// Supplied verifier
        verifier: String,
        /// Why the verifier was refused
        reason: String,
    },

    /// Numeric argument out of range
    #[error("{field} out of range: {reason}")]
    OutOfRange {
        /// Field name
        field: &'static str,
        /// Explanation
        reason: String,
    },
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::EmptyField { field })
    } else {
        Ok(())
    }
}

/// Input for a new incident
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentDraft {
    /// Short title (required)
    pub title: String,
    /// Free-text description
    pub description: String,
    /// When it happened
    pub occurred_at: DateTime<Utc>,
    /// Severity
    pub severity: Severity,
    /// Site or unit (required)
    pub site: String,
    /// Environment
    pub environment: Environment,
    /// Affected system or component
    pub system_component: Option<String>,
}

impl IncidentDraft {
    /// Create draft with default severity and environment
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        site: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            occurred_at,
            severity: Severity::default(),
            site: site.into(),
            environment: Environment::default(),
            system_component: None,
        }
    }

    /// With severity
    #[inline]
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// With environment
    #[inline]
    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// With system/component
    #[inline]
    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.system_component = Some(component.into());
        self
    }

    /// Check the draft against `now`
    ///
    /// # Errors
    /// Returns [`ValidationError`] on a blank title/site or a future timestamp.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ValidationError> {
        require("title", &self.title)?;
        require("site", &self.site)?;
        if self.occurred_at > now {
            return Err(ValidationError::OccurredInFuture {
                occurred_at: self.occurred_at,
                now,
            });
        }
        Ok(())
    }

    /// Text used when querying for similar past RCAs
    #[must_use]
    pub fn query_text(&self) -> String {
        let mut text = format!("{} {}", self.title, self.description);
        if let Some(component) = &self.system_component {
            text.push(' ');
            text.push_str(component);
        }
        text
    }
}

/// Administrative correction of an incident; `None` keeps the current value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncidentCorrection {
    /// New title
    pub title: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New severity
    pub severity: Option<Severity>,
    /// New site
    pub site: Option<String>,
    /// New environment
    pub environment: Option<Environment>,
    /// New system/component
    pub system_component: Option<String>,
}

impl IncidentCorrection {
    /// Check the supplied fields
    ///
    /// # Errors
    /// Returns [`ValidationError::EmptyField`] when a supplied title or site is blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            require("title", title)?;
        }
        if let Some(site) = &self.site {
            require("site", site)?;
        }
        Ok(())
    }

    /// Whether the correction changes text that feeds the similarity corpus
    #[must_use]
    pub fn touches_corpus(&self) -> bool {
        self.title.is_some() || self.description.is_some() || self.system_component.is_some()
    }
}

/// Input for a new corrective action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDraft {
    /// What has to be done (required)
    pub description: String,
    /// Responsible person (required)
    pub owner: String,
    /// Responsible team
    pub owner_team: Option<String>,
    /// Category
    pub action_type: ActionType,
    /// Due date
    pub due_date: NaiveDate,
    /// How completion will be verified (required)
    pub verification_method: String,
}

impl ActionDraft {
    /// Create draft with the default type and verification method
    #[must_use]
    pub fn new(description: impl Into<String>, owner: impl Into<String>, due_date: NaiveDate) -> Self {
        Self {
            description: description.into(),
            owner: owner.into(),
            owner_team: None,
            action_type: ActionType::default(),
            due_date,
            verification_method: DEFAULT_VERIFICATION_METHOD.to_string(),
        }
    }

    /// With owner team
    #[inline]
    #[must_use]
    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.owner_team = Some(team.into());
        self
    }

    /// With action type
    #[inline]
    #[must_use]
    pub fn with_type(mut self, action_type: ActionType) -> Self {
        self.action_type = action_type;
        self
    }

    /// With verification method
    #[inline]
    #[must_use]
    pub fn with_verification_method(mut self, method: impl Into<String>) -> Self {
        self.verification_method = method.into();
        self
    }

    /// Check the draft against the owning RCA's creation time
    ///
    /// # Errors
    /// Returns [`ValidationError`] on blank fields or a due date before the
    /// RCA was opened.
    pub fn validate(&self, rca_created_at: DateTime<Utc>) -> Result<(), ValidationError> {
        require("description", &self.description)?;
        require("owner", &self.owner)?;
        require("verification_method", &self.verification_method)?;
        let created = rca_created_at.date_naive();
        if self.due_date < created {
            return Err(ValidationError::DueBeforeCreation {
                due: self.due_date,
                created,
            });
        }
        Ok(())
    }
}

/// Input for a new evidence record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceDraft {
    /// Kind of artifact
    pub kind: EvidenceKind,
    /// Free text or attachment reference (required)
    pub reference: String,
    /// Submitter (required)
    pub submitted_by: String,
}

impl EvidenceDraft {
    /// Create draft
    #[must_use]
    pub fn new(kind: EvidenceKind, reference: impl Into<String>, submitted_by: impl Into<String>) -> Self {
        Self {
            kind,
            reference: reference.into(),
            submitted_by: submitted_by.into(),
        }
    }

    /// Check the draft
    ///
    /// # Errors
    /// Returns [`ValidationError::EmptyField`] on a blank reference or submitter.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("reference", &self.reference)?;
        require("submitted_by", &self.submitted_by)
    }
}

/// Input for a new verification record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationDraft {
    /// Verifier (required)
    pub verifier: String,
    /// Pass or fail
    pub outcome: VerificationOutcome,
    /// Optional notes
    pub notes: Option<String>,
}

impl VerificationDraft {
    /// Passing verification
    #[must_use]
    pub fn pass(verifier: impl Into<String>) -> Self {
        Self {
            verifier: verifier.into(),
            outcome: VerificationOutcome::Pass,
            notes: None,
        }
    }

    /// Failing verification
    #[must_use]
    pub fn fail(verifier: impl Into<String>) -> Self {
        Self {
            verifier: verifier.into(),
            outcome: VerificationOutcome::Fail,
            notes: None,
        }
    }

    /// With notes
    #[inline]
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Check the draft
    ///
    /// # Errors
    /// Returns [`ValidationError::EmptyField`] on a blank verifier.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("verifier", &self.verifier)
    }

    /// Check that the verifier is neither the action owner nor an evidence submitter
    ///
    /// # Errors
    /// Returns [`ValidationError::VerifierNotIndependent`] otherwise.
    pub fn validate_independence<'a>(
        &self,
        owner: &str,
        submitters: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), ValidationError> {
        let verifier = self.verifier.trim();
        if verifier.eq_ignore_ascii_case(owner.trim()) {
            return Err(ValidationError::VerifierNotIndependent {
                verifier: verifier.to_string(),
                reason: "verifier owns the action".to_string(),
            });
        }
        if submitters
            .into_iter()
            .any(|s| verifier.eq_ignore_ascii_case(s.trim()))
        {
            return Err(ValidationError::VerifierNotIndependent {
                verifier: verifier.to_string(),
                reason: "verifier submitted evidence for the action".to_string(),
            });
        }
        Ok(())
    }
}
