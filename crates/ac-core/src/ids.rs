//! Stable identifiers. Sessions, messages, and tool calls are keyed by ULID
//! (Crockford base32), matching the workspace precedent's session ids.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

macro_rules! ulid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            pub fn as_str(&self) -> String {
                self.0.to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Ulid::from_string(s)?))
            }
        }
    };
}

ulid_id!(SessionId);
ulid_id!(MessageId);
ulid_id!(ToolCallId);

impl SessionId {
    /// A session id derived deterministically from a stable seed string
    /// (e.g. a tool-call id or a parent session id), so re-deriving the same
    /// seed always yields the same id. Used for task and title sessions,
    /// which must be idempotent across retries rather than freshly random.
    pub fn deterministic(seed: &str) -> Self {
        use sha2::{Digest, Sha256};
        let hash = Sha256::digest(seed.as_bytes());
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash[..16]);
        Self(Ulid::from_bytes(bytes))
    }
}
