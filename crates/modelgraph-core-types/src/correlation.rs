//! Correlation types for stores and sessions
//!
//! These types identify a store instance and the sessions it produces.
//! Session ids double as event correlation ids: every event carries the id
//! of the session that produced it, which is how replication receive paths
//! tell their own replayed events apart from foreign ones.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a store instance, immutable once assigned
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreId(String);

impl StoreId {
    /// Generate a new random StoreId using UUIDv7
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create from an existing string (for deserialization)
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for StoreId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StoreId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one session within a store
///
/// Monotonically increasing per store; also used as the correlation id
/// stamped on every event the session logs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct SessionId(u64);

impl SessionId {
    /// Wrap a raw session number
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw session number
    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
