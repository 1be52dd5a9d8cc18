//! Header acquisition.

use super::cache::{CachedObject, Persistent};
use super::handle::Transaction;
use crate::error::{CoreError, CoreResult};
use crate::header::ObjectHeader;
use crate::registry::TransactionSignal;
use crate::types::{is_older, TransactionId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};
use tso_dataspace::ObjectId;

impl Transaction {
    /// Locks an object for exclusive use, waiting while another transaction
    /// holds it.
    ///
    /// Returns the transaction's in-memory copy of the object. Changes made
    /// through it are written back at commit. Locking an object that is
    /// already held returns the same copy.
    ///
    /// If this transaction is older than the holder, the holder is
    /// interrupted and aborts at its next blocking lock. A holder past its
    /// deadline is not waited for: its hold is taken over. When the object
    /// frees up it goes to the oldest live waiter.
    ///
    /// # Errors
    ///
    /// - `Preempted` if an older transaction interrupted this one. The
    ///   transaction has been aborted and released everything it held.
    /// - `TimedOut` if this transaction is past its deadline. It has been
    ///   aborted the same way.
    /// - `ObjectNotFound` if the object does not exist or was destroyed.
    /// - `TypeMismatch` or `Codec` if the object is not a `T`.
    pub fn lock<T: Persistent>(&mut self, id: ObjectId) -> CoreResult<&mut T> {
        self.acquire(id, true)?;
        self.cached_mut(id)
    }

    /// Locks an object if no other transaction holds it.
    ///
    /// Returns `Ok(None)` when the object is busy or an older transaction is
    /// waiting for it. Never waits and is never preempted, but does take over
    /// a stale hold.
    ///
    /// # Errors
    ///
    /// Same as [`lock`](Self::lock), except for `Preempted`.
    pub fn try_lock<T: Persistent>(&mut self, id: ObjectId) -> CoreResult<Option<&mut T>> {
        if !self.acquire(id, false)? {
            return Ok(None);
        }
        self.cached_mut(id).map(Some)
    }

    fn cached_mut<T: Persistent>(&mut self, id: ObjectId) -> CoreResult<&mut T> {
        match self.locked.get_mut(&id) {
            Some(cached) => cached.get_mut(id),
            None => Err(CoreError::invalid_operation(format!("{id} is not held"))),
        }
    }

    /// Takes ownership of the object's header. Returns false only when
    /// `block` is false and the object is held by someone else or was
    /// handed to an older waiter.
    fn acquire(&mut self, id: ObjectId, block: bool) -> CoreResult<bool> {
        self.ensure_active()?;
        if self.destroyed.contains(&id) {
            return Err(CoreError::ObjectNotFound { id });
        }
        if self.locked.contains_key(&id) {
            return Ok(true);
        }
        if self.past_deadline() {
            return Err(self.time_out(id));
        }
        if block && self.signal.is_interrupted() {
            return Err(self.preempt(id));
        }

        let mut header = self.lock_header(id)?;
        loop {
            while !header.free && header.owner != Some(self.id) {
                let now = self.store.clock.now_millis();
                if now > self.deadline() {
                    self.key.abort();
                    return Err(self.time_out(id));
                }
                if header.is_stale(now) {
                    self.take_over_stale(id, &header);
                    break;
                }
                if !block {
                    self.key.abort();
                    self.store.stats.record_lock_busy();
                    trace!(txn = %self.id, object = %id, "object busy");
                    return Ok(false);
                }
                if self.signal.is_interrupted() {
                    self.key.abort();
                    return Err(self.preempt(id));
                }
                if let Some(owner) = header.owner {
                    if header.owner_outranked_by(self.priority, self.id) {
                        self.store.request_timestamp_interrupt(&owner);
                    }
                }

                self.signal.arm();
                if header.add_listener(self.id) {
                    self.store_header(id, &header)?;
                } else {
                    self.key.abort();
                }

                trace!(txn = %self.id, object = %id, "waiting for object");
                self.wait_for(header.owner_deadline);
                header = self.lock_header(id)?;
            }

            let Some((senior, signal)) = self.senior_listener(&mut header) else {
                break;
            };

            // An older transaction is waiting: the object goes to it and a
            // blocking caller queues behind it.
            header.take_ownership(senior, signal.priority(), signal.deadline());
            if block {
                self.signal.arm();
                header.add_listener(self.id);
            }
            self.store_header(id, &header)?;
            self.store.stats.record_handoff();
            debug!(txn = %self.id, object = %id, senior = %senior, "handed object to older waiter");
            self.store.notify_availability_listeners([&senior]);

            if !block {
                self.store.stats.record_lock_busy();
                return Ok(false);
            }
            self.wait_for(signal.deadline());
            header = self.lock_header(id)?;
        }

        header.take_ownership(self.id, self.priority, self.deadline());
        self.store_header(id, &header)?;
        self.peeked.remove(&id);

        match self.main.read(header.payload_id) {
            Ok(bytes) => {
                self.locked
                    .insert(id, CachedObject::raw(header.payload_id, bytes));
                trace!(txn = %self.id, object = %id, "object locked");
                Ok(true)
            }
            Err(err) => {
                self.release_header(id);
                Err(err.into())
            }
        }
    }

    /// Drops listeners that are no longer live and returns the oldest one
    /// left, if it is older than this transaction. Listeners past their
    /// deadline are kept but never chosen.
    fn senior_listener(
        &self,
        header: &mut ObjectHeader,
    ) -> Option<(TransactionId, Arc<TransactionSignal>)> {
        let registry = &self.store.registry;
        let now = self.store.clock.now_millis();
        let (mut oldest_priority, mut oldest_id) = (self.priority, self.id);
        let mut senior = None;
        header.listeners.retain(|listener| match registry.get(listener) {
            Some(signal) => {
                if now <= signal.deadline()
                    && is_older(signal.priority(), *listener, oldest_priority, oldest_id)
                {
                    oldest_priority = signal.priority();
                    oldest_id = *listener;
                    senior = Some(signal);
                }
                true
            }
            None => false,
        });
        senior.map(|signal| (oldest_id, signal))
    }

    fn take_over_stale(&mut self, id: ObjectId, header: &ObjectHeader) {
        warn!(
            txn = %self.id,
            object = %id,
            owner = ?header.owner,
            owner_deadline = header.owner_deadline,
            "taking over stale lock"
        );
        if let Some(owner) = header.owner {
            self.store.request_timestamp_interrupt(&owner);
        }
        self.store.stats.record_stale_takeover();
    }

    /// Sleeps until woken, or until the earlier of `owner_deadline` and this
    /// transaction's deadline so that either can be noticed.
    fn wait_for(&self, owner_deadline: u64) {
        self.store.stats.record_lock_wait();
        let now = self.store.clock.now_millis();
        let remaining = owner_deadline.min(self.deadline()).saturating_sub(now).max(1);
        let mut bound = Duration::from_millis(remaining);
        if let Some(interval) = self.store.config.wake_check_interval {
            bound = bound.min(interval);
        }
        self.signal.wait(Some(bound));
    }

    fn past_deadline(&self) -> bool {
        self.store.clock.now_millis() > self.deadline()
    }

    /// Opens a key step on the header: lock, then read.
    fn lock_header(&mut self, id: ObjectId) -> CoreResult<ObjectHeader> {
        let read = self
            .key
            .lock(id)
            .and_then(|()| self.key.read(id))
            .map_err(CoreError::from)
            .and_then(|bytes| ObjectHeader::from_bytes(&bytes));
        if read.is_err() {
            self.key.abort();
        }
        read
    }

    /// Writes the header and closes the key step.
    fn store_header(&mut self, id: ObjectId, header: &ObjectHeader) -> CoreResult<()> {
        let stored = header
            .to_bytes()
            .and_then(|bytes| Ok(self.key.write(id, &bytes)?))
            .and_then(|()| Ok(self.key.commit()?));
        if stored.is_err() {
            self.key.abort();
        }
        stored
    }

    /// Gives a just-taken header back when the payload could not be read.
    fn release_header(&mut self, id: ObjectId) {
        let released = self.lock_header(id).and_then(|mut header| {
            let waiters = header.release();
            self.store_header(id, &header).map(|()| waiters)
        });
        match released {
            Ok(waiters) => self.store.notify_availability_listeners(&waiters),
            Err(err) => warn!(txn = %self.id, object = %id, error = %err, "failed to release header"),
        }
    }

    fn preempt(&mut self, id: ObjectId) -> CoreError {
        debug!(txn = %self.id, object = %id, "preempted by older transaction");
        self.store.stats.record_preemption();
        self.abort_in_place();
        CoreError::Preempted { txn: self.id }
    }

    fn time_out(&mut self, id: ObjectId) -> CoreError {
        warn!(txn = %self.id, object = %id, deadline = self.deadline(), "transaction past its deadline");
        self.store.stats.record_timeout();
        self.abort_in_place();
        CoreError::TimedOut { txn: self.id }
    }
}
