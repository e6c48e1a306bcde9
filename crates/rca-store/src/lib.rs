//! RCA Record Store
//!
//! Persistence for the RCA record graph:
//! - **RecordStore**: async trait over incidents, RCAs, actions, evidence and
//!   verifications with referential integrity
//! - **MemoryStore**: concurrent in-memory implementation
//! - **Snapshots**: JSON image of the whole store with atomic file replace
//! - **Seed**: deterministic demo graph
//!
//! # Example
//!
//! ```rust
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use chrono::Utc;
//! use rca_domain::IncidentDraft;
//! use rca_store::{MemoryStore, RecordStore};
//!
//! let store = MemoryStore::new();
//! let now = Utc::now();
//! let incident = store
//!     .create_incident(IncidentDraft::new("Pump seal failure", "", "Line 3", now), now)
//!     .await
//!     .unwrap();
//! let rca = store.create_rca(incident.id, String::new(), now).await.unwrap();
//! assert_eq!(store.rcas_for_incident(incident.id).await.unwrap(), vec![rca]);
//! # }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod memory;
pub mod persistence;
pub mod seed;
pub mod snapshot;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use persistence::{load_snapshot, save_snapshot};
pub use seed::demo_snapshot;
pub use snapshot::{StoreSnapshot, SNAPSHOT_VERSION};
pub use store::RecordStore;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
