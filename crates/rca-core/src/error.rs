//! Orchestrator error taxonomy
//!
//! Every failure surfaced by the workflow falls into one [`ErrorKind`]:
//! - `NotFound`: a read or update named a missing record
//! - `InvalidReference`: a child was created against a missing parent
//! - `GateNotSatisfied`: closure requested while conditions are unmet
//! - `Validation`: malformed input
//!
//! Storage and configuration failures are reported separately and are not
//! the caller's fault.

use crate::config::ConfigError;
use rca_domain::{GateError, RcaId, UnmetCondition, ValidationError};
use rca_store::StoreError;
use serde::Serialize;
use std::fmt;

/// Result alias for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Coarse classification of a [`WorkflowError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Missing record
    NotFound,
    /// Missing or mismatched parent
    InvalidReference,
    /// Closure refused
    GateNotSatisfied,
    /// Malformed input
    Validation,
    /// Storage failure
    Persistence,
    /// Configuration failure
    Config,
    /// Broken internal invariant
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not_found",
            Self::InvalidReference => "invalid_reference",
            Self::GateNotSatisfied => "gate_not_satisfied",
            Self::Validation => "validation",
            Self::Persistence => "persistence",
            Self::Config => "config",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Workflow errors
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Missing record
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind
        entity: &'static str,
        /// Requested id
        id: String,
    },

    /// Missing parent
    #[error("cannot create {entity}: unknown {parent_kind} {parent}")]
    InvalidReference {
        /// Entity being created
        entity: &'static str,
        /// Parent kind
        parent_kind: &'static str,
        /// Parent id
        parent: String,
    },

    /// Closure refused
    #[error("RCA {rca_id} cannot be closed: {}", describe_unmet(.unmet))]
    GateNotSatisfied {
        /// RCA
        rca_id: RcaId,
        /// Conditions still open
        unmet: Vec<UnmetCondition>,
    },

    /// Malformed input
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Storage failure
    #[error("persistence failed: {0}")]
    Persistence(#[source] StoreError),

    /// Configuration failure
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Broken internal invariant
    #[error("internal error: {0}")]
    Internal(String),
}

fn describe_unmet(unmet: &[UnmetCondition]) -> String {
    unmet
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl WorkflowError {
    /// Classification
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidReference { .. } => ErrorKind::InvalidReference,
            Self::GateNotSatisfied { .. } => ErrorKind::GateNotSatisfied,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::Config(_) => ErrorKind::Config,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the caller can fix the request and retry
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NotFound
                | ErrorKind::InvalidReference
                | ErrorKind::GateNotSatisfied
                | ErrorKind::Validation
        )
    }

    /// Unmet closure conditions, if this is a refused closure
    #[must_use]
    pub fn unmet_conditions(&self) -> &[UnmetCondition] {
        match self {
            Self::GateNotSatisfied { unmet, .. } => unmet,
            _ => &[],
        }
    }

    /// Rewrite a missing-record error into a missing-parent error
    pub(crate) fn parent_missing(self, entity: &'static str) -> Self {
        match self {
            Self::NotFound {
                entity: parent_kind,
                id,
            } => Self::InvalidReference {
                entity,
                parent_kind,
                parent: id,
            },
            other => other,
        }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::InvalidReference {
                entity,
                parent_kind,
                parent,
            } => Self::InvalidReference {
                entity,
                parent_kind,
                parent,
            },
            StoreError::Gate(gate) => gate.into(),
            other => Self::Persistence(other),
        }
    }
}

impl From<GateError> for WorkflowError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::NotSatisfied { rca_id, unmet } => Self::GateNotSatisfied { rca_id, unmet },
            mismatch @ GateError::OutcomeMismatch { .. } => Self::Internal(mismatch.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn store_errors_keep_their_taxonomy() {
        let err: WorkflowError = StoreError::NotFound {
            entity: "rca",
            id: "RCA-1".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.is_client_error());

        let err: WorkflowError = StoreError::Io(std::io::Error::other("disk")).into();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(!err.is_client_error());
    }

    #[test]
    fn refused_closure_lists_unmet_conditions() {
        let rca_id = RcaId(Ulid::nil());
        let err: WorkflowError = GateError::NotSatisfied {
            rca_id,
            unmet: vec![UnmetCondition::NoActions],
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::GateNotSatisfied);
        assert_eq!(err.unmet_conditions(), &[UnmetCondition::NoActions]);
        assert!(err.to_string().contains("cannot be closed"));
    }

    #[test]
    fn missing_parent_becomes_invalid_reference() {
        let err = WorkflowError::NotFound {
            entity: "rca",
            id: "RCA-1".into(),
        }
        .parent_missing("action");
        assert!(matches!(
            err,
            WorkflowError::InvalidReference {
                entity: "action",
                parent_kind: "rca",
                ..
            }
        ));
    }
}
