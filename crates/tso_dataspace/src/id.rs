//! Object identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a single entry in a data space.
///
/// Ids are assigned by the data space on creation and are never reused
/// while referenced. [`ObjectId::INVALID`] is never assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// The reserved id that never names an object.
    pub const INVALID: Self = Self(0);

    /// Creates an object id from its raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns true unless this is [`ObjectId::INVALID`].
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "oid:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_is_not_valid() {
        assert!(!ObjectId::INVALID.is_valid());
        assert!(ObjectId::new(1).is_valid());
    }

    #[test]
    fn object_id_display() {
        assert_eq!(format!("{}", ObjectId::new(42)), "oid:42");
    }
}
