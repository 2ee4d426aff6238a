//! Values bound to named query parameters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A dynamic value bound to a query placeholder.
///
/// Every variant maps to exactly one PostgreSQL parameter type so that a
/// `NULL` still carries the column type it is compared against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// A text value.
    String(String),
    /// A 64-bit integer value.
    Integer(i64),
    /// A floating-point value.
    Float(f64),
    /// A boolean value.
    Boolean(bool),
    /// A UUID value.
    Uuid(Uuid),
    /// A UUID that may be `NULL` (bound as a typed `uuid` parameter).
    NullableUuid(Option<Uuid>),
    /// A timestamp with time zone.
    Timestamp(DateTime<Utc>),
    /// A `text[]` value, for `= ANY(..)` membership.
    StringList(Vec<String>),
    /// A `uuid[]` value, for `= ANY(..)` membership.
    UuidList(Vec<Uuid>),
}

impl FilterValue {
    /// Whether the value is an empty string or an absent UUID.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::String(s) => s.trim().is_empty(),
            Self::Uuid(id) => id.is_nil(),
            Self::NullableUuid(id) => id.is_none_or(|id| id.is_nil()),
            Self::StringList(v) => v.is_empty(),
            Self::UuidList(v) => v.is_empty(),
            Self::Integer(_) | Self::Float(_) | Self::Boolean(_) | Self::Timestamp(_) => false,
        }
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<Uuid> for FilterValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<Option<Uuid>> for FilterValue {
    fn from(value: Option<Uuid>) -> Self {
        Self::NullableUuid(value)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(value: Vec<String>) -> Self {
        Self::StringList(value)
    }
}

impl From<Vec<Uuid>> for FilterValue {
    fn from(value: Vec<Uuid>) -> Self {
        Self::UuidList(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_values() {
        assert!(FilterValue::from("  ").is_blank());
        assert!(FilterValue::from(Uuid::nil()).is_blank());
        assert!(FilterValue::from(None::<Uuid>).is_blank());
        assert!(FilterValue::from(Vec::<Uuid>::new()).is_blank());
        assert!(!FilterValue::from(0i64).is_blank());
        assert!(!FilterValue::from(Uuid::new_v4()).is_blank());
    }

    #[test]
    fn test_optional_uuid_keeps_type() {
        let id = Uuid::new_v4();
        assert_eq!(FilterValue::from(Some(id)), FilterValue::NullableUuid(Some(id)));
        assert_eq!(FilterValue::from(None::<Uuid>), FilterValue::NullableUuid(None));
    }
}
