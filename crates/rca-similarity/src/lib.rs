//! RCA Similarity Index
//!
//! Lightweight recurrence detection over historical RCA narratives:
//! - **Tokenizer**: lowercase, punctuation-stripped terms, optional stop-word
//!   removal and bigrams
//! - **SimilarityIndex**: immutable tf-idf vector space with cosine ranking
//!
//! The index is a pure projection of the corpus handed to
//! [`SimilarityIndex::build`]. Keeping it fresh is the caller's job; a stale
//! index still answers queries.
//!
//! # Example
//!
//! ```rust
//! use rca_domain::RcaId;
//! use rca_similarity::{CorpusDocument, IndexConfig, SimilarityIndex};
//! use ulid::Ulid;
//!
//! let pump = RcaId(Ulid::new());
//! let gateway = RcaId(Ulid::new());
//! let index = SimilarityIndex::build(
//!     IndexConfig::default(),
//!     vec![
//!         CorpusDocument::new(pump, "Pump seal failure on line 3"),
//!         CorpusDocument::new(gateway, "Gateway timeout during peak traffic"),
//!     ],
//! );
//!
//! let matches = index.find_similar("seal failure on line 3 pump", 5);
//! assert_eq!(matches[0].rca_id, pump);
//! assert!(index.find_similar("", 5).is_empty());
//! ```

#![warn(missing_docs)]

pub mod index;
pub mod tokenize;

pub use index::{CorpusDocument, IndexConfig, SimilarMatch, SimilarityIndex};
pub use tokenize::{is_stop_word, tokenize};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
