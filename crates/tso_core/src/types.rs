//! Core type definitions for the object store.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// Unique identity of a transaction.
///
/// Identities are random 128-bit UUIDs, stable for the transaction's lifetime.
/// They are what headers record as owner and listeners, and what the store
/// registry is keyed by.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Creates a new random transaction id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a transaction id from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", self.0)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// A transaction's fixed priority.
///
/// Lower is older. Priorities compare by creation timestamp first and the
/// random tiebreak second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Priority {
    /// Wall-clock milliseconds at transaction creation.
    pub timestamp: u64,
    /// Random value ordering transactions created in the same millisecond.
    pub tiebreak: i64,
}

impl Priority {
    /// Creates a priority.
    #[must_use]
    pub const fn new(timestamp: u64, tiebreak: i64) -> Self {
        Self {
            timestamp,
            tiebreak,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.timestamp, self.tiebreak)
    }
}

/// Returns true if `(priority, id)` is strictly older than `(other, other_id)`.
///
/// Equal priorities fall back to the identity so the order stays strict and
/// total even if two transactions draw the same timestamp and tiebreak.
#[must_use]
pub fn is_older(
    priority: Priority,
    id: TransactionId,
    other: Priority,
    other_id: TransactionId,
) -> bool {
    match priority.cmp(&other) {
        Ordering::Less => true,
        Ordering::Greater => false,
        Ordering::Equal => id < other_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn earlier_timestamp_is_older() {
        let a = TransactionId::new();
        let b = TransactionId::new();
        assert!(is_older(Priority::new(100, 9), a, Priority::new(200, 0), b));
        assert!(!is_older(Priority::new(200, 0), b, Priority::new(100, 9), a));
    }

    #[test]
    fn tiebreak_orders_equal_timestamps() {
        let a = TransactionId::new();
        let b = TransactionId::new();
        assert!(is_older(Priority::new(100, -5), a, Priority::new(100, 3), b));
        assert!(!is_older(Priority::new(100, 3), b, Priority::new(100, -5), a));
    }

    #[test]
    fn identity_breaks_full_ties() {
        let a = TransactionId::new();
        let b = TransactionId::new();
        let p = Priority::new(100, 7);
        assert_ne!(is_older(p, a, p, b), is_older(p, b, p, a));
        assert!(!is_older(p, a, p, a));
    }

    #[test]
    fn transaction_id_display() {
        let id = TransactionId::from_uuid(Uuid::nil());
        assert_eq!(
            format!("{id}"),
            "txn:00000000-0000-0000-0000-000000000000"
        );
    }

    proptest! {
        #[test]
        fn older_is_strict_and_total(
            t1 in 0u64..1000, b1 in any::<i64>(),
            t2 in 0u64..1000, b2 in any::<i64>(),
        ) {
            let a = TransactionId::new();
            let b = TransactionId::new();
            let pa = Priority::new(t1, b1);
            let pb = Priority::new(t2, b2);
            let ab = is_older(pa, a, pb, b);
            let ba = is_older(pb, b, pa, a);
            prop_assert!(ab != ba);
        }

        #[test]
        fn older_is_transitive(
            ts in proptest::collection::vec((0u64..50, -3i64..3), 3),
        ) {
            let ids = [TransactionId::new(), TransactionId::new(), TransactionId::new()];
            let ps: Vec<_> = ts.iter().map(|(t, b)| Priority::new(*t, *b)).collect();
            if is_older(ps[0], ids[0], ps[1], ids[1]) && is_older(ps[1], ids[1], ps[2], ids[2]) {
                prop_assert!(is_older(ps[0], ids[0], ps[2], ids[2]));
            }
        }
    }
}
