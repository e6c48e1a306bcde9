//! Opaque entity identifiers
//!
//! Every id wraps a [`Ulid`], so ids order by creation time. Ranking ties in
//! the similarity index are broken on that order (newer first).
//!
//! The display form carries a short entity prefix (`RCA-01H...`); parsing
//! accepts either the prefixed or the bare ULID form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Error returned when an id string cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} id: {input:?}")]
pub struct ParseIdError {
    /// Entity prefix the input was parsed as
    pub kind: &'static str,
    /// Offending input
    pub input: String,
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Ulid);

        impl $name {
            /// Prefix used by the display form
            pub const PREFIX: &'static str = $prefix;

            /// Underlying ULID
            #[inline]
            #[must_use]
            pub const fn ulid(&self) -> Ulid {
                self.0
            }
        }

        impl From<Ulid> for $name {
            fn from(value: Ulid) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s
                    .trim()
                    .strip_prefix(concat!($prefix, "-"))
                    .unwrap_or_else(|| s.trim());
                Ulid::from_string(raw).map(Self).map_err(|_| ParseIdError {
                    kind: $prefix,
                    input: s.to_string(),
                })
            }
        }
    };
}

entity_id!(
    /// Incident identifier
    IncidentId,
    "INC"
);
entity_id!(
    /// Root-cause analysis identifier
    RcaId,
    "RCA"
);
entity_id!(
    /// Corrective action identifier
    ActionId,
    "ACT"
);
entity_id!(
    /// Evidence record identifier
    EvidenceId,
    "EVD"
);
entity_id!(
    /// Verification record identifier
    VerificationId,
    "VER"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_prefix_and_parses_back() {
        let id = RcaId(Ulid::new());
        let shown = id.to_string();
        assert!(shown.starts_with("RCA-"));
        assert_eq!(shown.parse::<RcaId>().unwrap(), id);
    }

    #[test]
    fn bare_ulid_parses() {
        let ulid = Ulid::new();
        let id: ActionId = ulid.to_string().parse().unwrap();
        assert_eq!(id.ulid(), ulid);
    }

    #[test]
    fn garbage_is_rejected() {
        let err = "RCA-not-a-ulid".parse::<RcaId>().unwrap_err();
        assert_eq!(err.kind, "RCA");
    }

    #[test]
    fn ids_sort_by_creation_time() {
        let older = RcaId(Ulid::from_parts(1_000, 7));
        let newer = RcaId(Ulid::from_parts(2_000, 1));
        assert!(newer > older);
    }
}
