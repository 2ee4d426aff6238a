//! Pagination types for list operations.

use serde::{Deserialize, Serialize};

/// Default number of rows returned when the caller does not ask for a size.
pub const DEFAULT_LIMIT: u32 = 10;

/// Offset/limit window requested by a list operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetPage {
    /// Number of rows to skip.
    #[serde(default)]
    pub offset: u32,
    /// Maximum number of rows to return.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl OffsetPage {
    /// Create a new page window. A zero limit falls back to the default.
    pub fn new(offset: u32, limit: u32) -> Self {
        Self {
            offset,
            limit: if limit == 0 { DEFAULT_LIMIT } else { limit },
        }
    }

    /// Clamp the limit to `max`, replacing a zero limit with `default`.
    pub fn normalized(self, default: u32, max: u32) -> Self {
        let limit = if self.limit == 0 { default } else { self.limit };
        Self {
            offset: self.offset,
            limit: limit.clamp(1, max.max(1)),
        }
    }
}

impl Default for OffsetPage {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// One page of rows together with the unpaginated total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paged<T> {
    /// The rows on this page.
    pub items: Vec<T>,
    /// Total number of rows matching the filter, ignoring pagination.
    pub count: i64,
}

impl<T> Paged<T> {
    /// Create a new page.
    pub fn new(items: Vec<T>, count: i64) -> Self {
        Self { items, count }
    }

    /// Create an empty page.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
        }
    }
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}
