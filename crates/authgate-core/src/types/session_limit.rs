//! Session limit resolution types.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Capacity bound for the sessions of one scope key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionLimit {
    /// A fixed maximum number of concurrent sessions.
    Fixed(u32),
    /// No bound; creating a session never evicts.
    Unlimited,
}

impl SessionLimit {
    /// Number of oldest sessions to evict so that one more insert keeps the
    /// scope at exactly the limit.
    pub fn evictions_for(&self, active_count: u32) -> u32 {
        match self {
            Self::Fixed(max) if active_count >= *max => active_count - *max + 1,
            _ => 0,
        }
    }

    /// Return the numeric limit, or `None` for unlimited.
    pub fn as_max(&self) -> Option<u32> {
        match self {
            Self::Fixed(max) => Some(*max),
            Self::Unlimited => None,
        }
    }
}

impl From<u32> for SessionLimit {
    /// Convert a `u32` to a `SessionLimit`. `0` means unlimited.
    fn from(value: u32) -> Self {
        if value == 0 {
            Self::Unlimited
        } else {
            Self::Fixed(value)
        }
    }
}

impl TryFrom<i32> for SessionLimit {
    type Error = AppError;

    /// Convert a wire-level limit. `0` means unlimited, negatives are rejected.
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        u32::try_from(value)
            .map(Self::from)
            .map_err(|_| AppError::validation(format!("session limit {value} must not be negative")))
    }
}
