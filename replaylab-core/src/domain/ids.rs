use serde::{Deserialize, Serialize};
use std::fmt;

/// Order identifier, dense within one trader's order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl OrderId {
    /// Id carried by a disregarded order that never entered a book.
    pub const UNASSIGNED: OrderId = OrderId(u64::MAX);

    pub fn is_assigned(&self) -> bool {
        *self != Self::UNASSIGNED
    }

    /// Arena slot of this id.
    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u64> for OrderId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_assigned() {
            write!(f, "#{}", self.0)
        } else {
            write!(f, "#unassigned")
        }
    }
}

/// Content fingerprint of a loaded series (BLAKE3 over its rows).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesFingerprint(pub String);

impl SeriesFingerprint {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    /// First 12 hex characters, enough for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for SeriesFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
