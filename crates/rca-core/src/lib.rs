//! RCA Workflow Core
//!
//! Closed-loop root-cause analysis: every incident gets an RCA, every RCA
//! tracks corrective actions, and an RCA only closes once each action has
//! evidence and a passing independent verification.
//!
//! - **WorkflowOrchestrator**: intake, appends, closure, read models
//! - **RecurrenceIndex**: similarity snapshot maintained off the write path
//! - **WorkflowConfig**: TOML-loadable settings with defaults
//! - **WorkflowError**: the caller-facing error taxonomy
//!
//! # Example
//!
//! ```rust
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), rca_core::WorkflowError> {
//! use chrono::{Duration, Utc};
//! use rca_core::{WorkflowConfig, WorkflowOrchestrator};
//! use rca_domain::{ActionDraft, IncidentDraft, RcaStatus};
//!
//! let wf = WorkflowOrchestrator::new(WorkflowConfig::default());
//! let now = Utc::now();
//! let intake = wf
//!     .submit_incident(IncidentDraft::new("Pump seal failure", "Leak", "Line 3", now))
//!     .await?;
//! wf.add_action(
//!     intake.rca.id,
//!     ActionDraft::new("Replace seal", "alice", (now + Duration::days(7)).date_naive()),
//! )
//! .await?;
//!
//! assert_eq!(wf.rca(intake.rca.id).await?.status(), RcaStatus::Open);
//! assert!(wf.close_rca(intake.rca.id).await.is_err());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod recurrence;
pub mod views;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    ConfigError, IndexSettings, SimilaritySettings, WorkflowConfig, MAX_WINDOW_DAYS,
};
pub use error::{ErrorKind, WorkflowError, WorkflowResult};
pub use orchestrator::WorkflowOrchestrator;
pub use recurrence::{corpus_document, RecurrenceIndex};
pub use views::{
    ActionDetail, AuditFilter, AuditRow, DashboardSnapshot, IncidentIntake, OpenRcaSummary,
    RcaDetail, SimilarCandidate, StatusCounts,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
