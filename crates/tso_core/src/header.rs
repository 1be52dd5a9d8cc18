//! Per-object lock header.
//!
//! Every logical object is stored as two data space entries: its payload and
//! a small header. The header id is the object id callers see. The header
//! records which transaction owns the object and which transactions are
//! waiting for it, and points at the payload.

use crate::codec;
use crate::error::CoreResult;
use crate::types::{is_older, Priority, TransactionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tso_dataspace::ObjectId;

/// Durable lock record for one logical object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectHeader {
    /// Priority of the owning transaction.
    pub owner_priority: Priority,
    /// Identity of the owning transaction, if any.
    pub owner: Option<TransactionId>,
    /// Clock reading after which the owner's hold may be taken over.
    pub owner_deadline: u64,
    /// True when no transaction holds the object.
    pub free: bool,
    /// Transactions waiting for the object to become free.
    pub listeners: BTreeSet<TransactionId>,
    /// Id of the payload entry.
    pub payload_id: ObjectId,
}

impl ObjectHeader {
    /// Creates the header for a freshly created object.
    ///
    /// The creator is recorded as owner, but the header starts free: the
    /// object is invisible to everyone else until the creator commits.
    #[must_use]
    pub fn created_by(owner: TransactionId, priority: Priority, payload_id: ObjectId) -> Self {
        Self {
            owner_priority: priority,
            owner: Some(owner),
            owner_deadline: 0,
            free: true,
            listeners: BTreeSet::new(),
            payload_id,
        }
    }

    /// Returns true if `(priority, id)` is strictly older than the owner.
    #[must_use]
    pub fn owner_outranked_by(&self, priority: Priority, id: TransactionId) -> bool {
        match self.owner {
            Some(owner) => is_older(priority, id, self.owner_priority, owner),
            None => false,
        }
    }

    /// Returns true if the object is held by an owner whose deadline passed
    /// before `now`.
    #[must_use]
    pub fn is_stale(&self, now: u64) -> bool {
        !self.free && now > self.owner_deadline
    }

    /// Registers a waiter. Returns false if it was already registered.
    pub fn add_listener(&mut self, id: TransactionId) -> bool {
        self.listeners.insert(id)
    }

    /// Marks the object as owned by `id` until `deadline`.
    ///
    /// Used both when a transaction takes the object for itself and when it
    /// hands a free object to an older waiter.
    pub fn take_ownership(&mut self, id: TransactionId, priority: Priority, deadline: u64) {
        self.owner = Some(id);
        self.owner_priority = priority;
        self.owner_deadline = deadline;
        self.free = false;
        self.listeners.remove(&id);
    }

    /// Frees the object and returns the waiters that should be woken.
    pub fn release(&mut self) -> BTreeSet<TransactionId> {
        self.free = true;
        self.owner = None;
        self.owner_deadline = 0;
        std::mem::take(&mut self.listeners)
    }

    /// Encodes the header.
    pub fn to_bytes(&self) -> CoreResult<Vec<u8>> {
        codec::encode(self)
    }

    /// Decodes a header.
    pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        codec::decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(owner: TransactionId, timestamp: u64) -> ObjectHeader {
        ObjectHeader::created_by(owner, Priority::new(timestamp, 0), ObjectId::new(10))
    }

    #[test]
    fn created_header_is_free() {
        let owner = TransactionId::new();
        let hdr = header(owner, 100);
        assert!(hdr.free);
        assert_eq!(hdr.owner, Some(owner));
        assert!(hdr.listeners.is_empty());
    }

    #[test]
    fn older_contender_outranks_owner() {
        let mut hdr = header(TransactionId::new(), 0);
        let owner = TransactionId::new();
        hdr.take_ownership(owner, Priority::new(200, 0), 1_000);

        assert!(hdr.owner_outranked_by(Priority::new(100, 0), TransactionId::new()));
        assert!(!hdr.owner_outranked_by(Priority::new(300, 0), TransactionId::new()));
    }

    #[test]
    fn released_header_has_no_owner_to_outrank() {
        let mut hdr = header(TransactionId::new(), 200);
        hdr.release();
        assert!(!hdr.owner_outranked_by(Priority::new(0, i64::MIN), TransactionId::new()));
    }

    #[test]
    fn listener_registration_is_idempotent() {
        let mut hdr = header(TransactionId::new(), 1);
        let waiter = TransactionId::new();
        assert!(hdr.add_listener(waiter));
        assert!(!hdr.add_listener(waiter));
        assert_eq!(hdr.listeners.len(), 1);
    }

    #[test]
    fn take_ownership_drops_own_listener_entry() {
        let mut hdr = header(TransactionId::new(), 1);
        let waiter = TransactionId::new();
        let other = TransactionId::new();
        hdr.add_listener(waiter);
        hdr.add_listener(other);

        hdr.take_ownership(waiter, Priority::new(5, 5), 500);
        assert!(!hdr.free);
        assert_eq!(hdr.owner, Some(waiter));
        assert_eq!(hdr.owner_priority, Priority::new(5, 5));
        assert_eq!(hdr.owner_deadline, 500);
        assert!(!hdr.listeners.contains(&waiter));
        assert!(hdr.listeners.contains(&other));
    }

    #[test]
    fn release_returns_listeners() {
        let mut hdr = header(TransactionId::new(), 1);
        hdr.take_ownership(TransactionId::new(), Priority::new(1, 1), 50);
        let a = TransactionId::new();
        let b = TransactionId::new();
        hdr.add_listener(a);
        hdr.add_listener(b);

        let woken = hdr.release();
        assert!(hdr.free);
        assert!(hdr.owner.is_none());
        assert!(hdr.listeners.is_empty());
        assert_eq!(hdr.owner_deadline, 0);
        assert_eq!(woken.len(), 2);
    }

    #[test]
    fn held_header_goes_stale_after_owner_deadline() {
        let mut hdr = header(TransactionId::new(), 1);
        assert!(!hdr.is_stale(u64::MAX));

        hdr.take_ownership(TransactionId::new(), Priority::new(1, 1), 150);
        assert!(!hdr.is_stale(100));
        assert!(!hdr.is_stale(150));
        assert!(hdr.is_stale(151));

        hdr.release();
        assert!(!hdr.is_stale(151));
    }

    #[test]
    fn encoding_preserves_header() {
        let mut hdr = header(TransactionId::new(), 42);
        hdr.take_ownership(TransactionId::new(), Priority::new(43, -1), 9_000);
        hdr.add_listener(TransactionId::new());
        let decoded = ObjectHeader::from_bytes(&hdr.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, hdr);
    }
}
