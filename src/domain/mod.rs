//! Domain types for operator identity.
//!
//! Store-assigned identifiers are wrapped in a newtype so they cannot be mixed
//! up with counts or other integers travelling through the same code paths.

pub mod operator;
pub mod password;
pub mod ports;

pub use operator::{AccountError, OperatorAccount, StoredOperator, ValidationError};
pub use password::{HashError, PasswordHasher};
pub use ports::OperatorStore;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an operator account.
///
/// Zero means "not yet persisted"; stores hand out positive ids.
///
/// # Examples
///
/// ```rust
/// use gatehouse::domain::OperatorId;
///
/// let id = OperatorId::new(42);
/// assert_eq!(id.value(), 42);
/// assert_eq!(id.to_string(), "42");
/// assert!(!id.is_unsaved());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct OperatorId(i32);

impl OperatorId {
    pub const UNSAVED: Self = Self(0);

    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn is_unsaved(&self) -> bool {
        self.0 <= 0
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<OperatorId> for i32 {
    fn from(id: OperatorId) -> Self {
        id.0
    }
}

impl From<i32> for OperatorId {
    fn from(id: i32) -> Self {
        Self::new(id)
    }
}

impl Serialize for OperatorId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i32(self.0)
    }
}

impl<'de> Deserialize<'de> for OperatorId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let id = i32::deserialize(deserializer)?;
        Ok(Self::new(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_id_conversions() {
        let id = OperatorId::new(42);
        assert_eq!(id.value(), 42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(i32::from(id), 42);
        assert_eq!(OperatorId::from(42), id);
    }

    #[test]
    fn operator_id_unsaved() {
        assert!(OperatorId::UNSAVED.is_unsaved());
        assert!(OperatorId::default().is_unsaved());
        assert!(!OperatorId::new(1).is_unsaved());
    }

    #[test]
    fn operator_id_serialization() {
        let id = OperatorId::new(42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "42");
        let deserialized: OperatorId = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, id);
    }
}
