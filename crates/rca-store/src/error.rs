//! Store error types

use rca_domain::GateError;
use thiserror::Error;

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Record store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// A fetch or update named an id that does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind
        entity: &'static str,
        /// Requested id
        id: String,
    },

    /// A new record points at a parent that does not exist
    #[error("{entity} references unknown {parent_kind} {parent}")]
    InvalidReference {
        /// Entity kind being created
        entity: &'static str,
        /// Parent entity kind
        parent_kind: &'static str,
        /// Parent id
        parent: String,
    },

    /// A record with this identity already exists, or an incident already
    /// owns an RCA
    #[error("duplicate {entity}: {id}")]
    Duplicate {
        /// Entity kind
        entity: &'static str,
        /// Conflicting id
        id: String,
    },

    /// Gate outcome could not be applied
    #[error(transparent)]
    Gate(#[from] GateError),

    /// Snapshot file I/O failed
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot (de)serialization failed
    #[error("snapshot encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Snapshot format version is not understood
    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version found in the file
        found: u32,
        /// Version this build writes
        expected: u32,
    },
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid_reference(
        entity: &'static str,
        parent_kind: &'static str,
        parent: impl ToString,
    ) -> Self {
        Self::InvalidReference {
            entity,
            parent_kind,
            parent: parent.to_string(),
        }
    }

    /// Whether the error names a missing record
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
