use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier of an issued artifact (certificate or document), owned by the
    /// issuing system.
    ArtifactId
);

string_id!(
    /// Batch identifier assigned by the ledger when a root is published.
    BatchId
);

string_id!(
    /// Ledger transaction reference (usually a `0x`-prefixed transaction hash).
    TxRef
);

/// Identifier of one anchoring attempt (UUID v7 for time-ordering).
///
/// Every scheduler run that claims records gets a fresh attempt id; a failed
/// attempt's id is never reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(uuid::Uuid);

impl AttemptId {
    /// Generate a new time-ordered attempt ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Short representation (first 8 characters of UUID).
    pub fn short_id(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttemptId({})", self.short_id())
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AttemptId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_ids_display_raw_value() {
        let id = ArtifactId::new("cert-42");
        assert_eq!(id.to_string(), "cert-42");
        assert_eq!(format!("{id:?}"), "ArtifactId(cert-42)");
    }

    #[test]
    fn string_ids_serialize_transparently() {
        let id = BatchId::from("17");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"17\"");
    }

    #[test]
    fn attempt_ids_are_unique_and_ordered() {
        let a = AttemptId::new();
        let b = AttemptId::new();
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn attempt_id_parses_back() {
        let a = AttemptId::new();
        let parsed: AttemptId = a.to_string().parse().unwrap();
        assert_eq!(a, parsed);
        assert_eq!(a.short_id().len(), 8);
    }
}
