//! RCA Domain
//!
//! The closed-loop data model and its decision logic:
//! - **Identifiers**: ULID-backed, time-sortable entity ids
//! - **Model**: Incident, RCA, Action, Evidence, Verification
//! - **Validation**: drafts for every entity with input checks
//! - **Closure Gate**: pure status derivation, KPIs and closure refusal
//!
//! Status fields on [`Rca`] and [`Action`] are caches of the gate's output.
//! The only way to change them is to apply a [`GateOutcome`], and the only
//! way to obtain one is [`gate::recompute`].
//!
//! # Example
//!
//! ```rust
//! use chrono::{NaiveDate, TimeZone, Utc};
//! use rca_domain::{gate, Action, ActionDraft, ActionId, IncidentId, Rca, RcaId, RcaStatus};
//! use std::collections::HashMap;
//! use ulid::Ulid;
//!
//! let created = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
//! let rca = Rca::new(RcaId(Ulid::new()), IncidentId(Ulid::new()), "", created);
//! let draft = ActionDraft::new("Replace seal", "maintenance", NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
//! let action = Action::from_draft(ActionId(Ulid::new()), rca.id, draft, created);
//!
//! let outcome = gate::recompute(&rca, &[action], &HashMap::new(), &HashMap::new(), created);
//! assert_eq!(outcome.status(), RcaStatus::Open);
//! assert!(outcome.require_closed().is_err());
//! ```

#![warn(missing_docs)]

pub mod gate;
pub mod ids;
pub mod model;
pub mod validation;

// Re-exports
pub use gate::{ActionVerdict, GateError, GateKpis, GateOutcome, UnmetCondition};
pub use ids::{ActionId, EvidenceId, IncidentId, ParseIdError, RcaId, VerificationId};
pub use model::{
    Action, ActionStatus, ActionType, Environment, Evidence, EvidenceKind, Incident, ParseEnumError,
    Rca, RcaStatus, Severity, StatusEpoch, StatusTransition, Verification, VerificationOutcome,
};
pub use validation::{
    ActionDraft, EvidenceDraft, IncidentCorrection, IncidentDraft, ValidationError,
    VerificationDraft,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the RCA domain
    pub use crate::{
        Action, ActionDraft, ActionId, ActionStatus, Evidence, EvidenceDraft, GateOutcome,
        Incident, IncidentDraft, IncidentId, Rca, RcaId, RcaStatus, Verification,
        VerificationDraft, VerificationOutcome,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
