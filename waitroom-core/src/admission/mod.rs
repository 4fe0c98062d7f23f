//! Admission control
//!
//! Users register into a queue's wait set and are later promoted, in order,
//! into its proceed set. Being in the proceed set is what "admitted" means.

pub mod engine;
pub mod errors;

pub use engine::{AdmissionEngine, DEFAULT_STORE_TIMEOUT};
pub use errors::{AdmissionError, AdmissionResult};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Queue used when a caller does not name one
pub const DEFAULT_QUEUE: &str = "default";

/// A user's place in a wait set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitRank {
    /// One-based position; 1 is next in line
    Position(u64),
    /// Not in the wait set (never registered, or already promoted)
    NotWaiting,
}

impl WaitRank {
    /// Build from a store's zero-based rank
    pub fn from_zero_based(rank: Option<u64>) -> Self {
        match rank {
            Some(r) => WaitRank::Position(r + 1),
            None => WaitRank::NotWaiting,
        }
    }

    pub fn position(&self) -> Option<u64> {
        match self {
            WaitRank::Position(n) => Some(*n),
            WaitRank::NotWaiting => None,
        }
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, WaitRank::Position(_))
    }

    /// Wire form: the position, or `-1` when not waiting
    pub fn as_i64(&self) -> i64 {
        match self {
            WaitRank::Position(n) => *n as i64,
            WaitRank::NotWaiting => -1,
        }
    }
}

impl From<WaitRank> for i64 {
    fn from(rank: WaitRank) -> Self {
        rank.as_i64()
    }
}

impl fmt::Display for WaitRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i64())
    }
}

impl Serialize for WaitRank {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_i64())
    }
}

impl<'de> Deserialize<'de> for WaitRank {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        Ok(if raw < 1 { WaitRank::NotWaiting } else { WaitRank::Position(raw as u64) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_rank_from_store_rank() {
        assert_eq!(WaitRank::from_zero_based(Some(0)), WaitRank::Position(1));
        assert_eq!(WaitRank::from_zero_based(Some(4)), WaitRank::Position(5));
        assert_eq!(WaitRank::from_zero_based(None), WaitRank::NotWaiting);
    }

    #[test]
    fn test_wait_rank_wire_form() {
        assert_eq!(WaitRank::Position(3).as_i64(), 3);
        assert_eq!(WaitRank::NotWaiting.as_i64(), -1);
        assert_eq!(serde_json::to_string(&WaitRank::NotWaiting).unwrap(), "-1");
        assert_eq!(serde_json::from_str::<WaitRank>("2").unwrap(), WaitRank::Position(2));
        assert_eq!(serde_json::from_str::<WaitRank>("-1").unwrap(), WaitRank::NotWaiting);
    }
}
