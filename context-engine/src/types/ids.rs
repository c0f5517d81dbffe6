//! ID wrapper types for type-safe identifiers.
//!
//! Strongly typed ID wrappers around ULID prevent mixing up different kinds
//! of identifiers (a session id passed where a checkpoint id is expected,
//! etc.) at compile time.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

macro_rules! ulid_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Ulid);

        impl $name {
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            pub fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            pub fn as_ulid(&self) -> Ulid {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Ulid::from_string(s)?))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

ulid_id!(SessionId, "Identifies one conversation bound to one model and one fixed window.");
ulid_id!(MessageId, "Identifies a single turn within a session.");
ulid_id!(CheckpointId, "Identifies a compressed summary of a contiguous message range.");
ulid_id!(SnapshotId, "Identifies a full, uncompressed recovery point.");

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn round_trips_through_display_and_from_str() {
        let id = SessionId::new();
        let text = id.to_string();
        assert_eq!(SessionId::from_str(&text).unwrap(), id);
    }

    #[test]
    fn distinct_id_types_do_not_compare() {
        let session = SessionId::new();
        let checkpoint = CheckpointId::from_ulid(session.as_ulid());
        // Same underlying ULID, but the types are distinct — this would not
        // compile if someone tried `session == checkpoint`.
        assert_eq!(session.as_ulid(), checkpoint.as_ulid());
    }
}
