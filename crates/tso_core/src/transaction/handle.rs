//! The transaction handle and its non-locking operations.

use super::cache::{CachedObject, Persistent};
use super::state::TransactionState;
use crate::codec;
use crate::error::{CoreError, CoreResult};
use crate::header::ObjectHeader;
use crate::registry::TransactionSignal;
use crate::store::StoreShared;
use crate::types::{Priority, TransactionId};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{trace, warn};
use tso_dataspace::{DataSpaceTransaction, ObjectId};

/// A timestamp-ordered transaction over the object store.
///
/// Obtained from [`ObjectStore::new_transaction`](crate::ObjectStore::new_transaction).
/// Objects read through [`lock`](Self::lock) are held exclusively until the
/// transaction commits or aborts. Dropping an active transaction aborts it.
pub struct Transaction {
    pub(super) id: TransactionId,
    pub(super) priority: Priority,
    pub(super) state: TransactionState,
    pub(super) store: Arc<StoreShared>,
    pub(super) signal: Arc<TransactionSignal>,
    /// Application reads and writes. Spans the whole transaction.
    pub(super) main: Box<dyn DataSpaceTransaction>,
    /// Header bookkeeping. Never left open across a wait.
    pub(super) key: Box<dyn DataSpaceTransaction>,
    /// Objects held or created by this transaction, keyed by header id.
    pub(super) locked: HashMap<ObjectId, CachedObject>,
    pub(super) created: HashSet<ObjectId>,
    /// Held objects destroyed by this transaction.
    pub(super) destroyed: BTreeSet<ObjectId>,
    /// Payloads read by `peek`, so later peeks see the same value.
    pub(super) peeked: HashMap<ObjectId, Vec<u8>>,
}

impl Transaction {
    pub(crate) fn begin(
        store: Arc<StoreShared>,
        id: TransactionId,
        priority: Priority,
        signal: Arc<TransactionSignal>,
    ) -> Self {
        let main = store.data_space.begin();
        let key = store.data_space.begin();
        Self {
            id,
            priority,
            state: TransactionState::Active,
            store,
            signal,
            main,
            key,
            locked: HashMap::new(),
            created: HashSet::new(),
            destroyed: BTreeSet::new(),
            peeked: HashMap::new(),
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the priority. Lower priorities are older and win contention.
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Returns the clock reading after which this transaction times out.
    #[must_use]
    pub fn deadline(&self) -> u64 {
        self.signal.deadline()
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Returns true once an older transaction has asked this one to abort.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.signal.is_interrupted()
    }

    /// Returns the number of objects held or created by this transaction.
    #[must_use]
    pub fn locked_count(&self) -> usize {
        self.locked.len()
    }

    pub(super) fn ensure_active(&self) -> CoreResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(CoreError::invalid_operation(format!(
                "transaction {} is {}",
                self.id, self.state
            )))
        }
    }

    /// Creates a new object, optionally binding it to `name`.
    ///
    /// The object is held by this transaction and invisible to others until
    /// commit.
    ///
    /// # Errors
    ///
    /// - `NameAlreadyBound` if `name` is already bound; nothing is created.
    /// - `InvalidOperation` if `name` exceeds the configured maximum length.
    pub fn create<T: Persistent>(&mut self, value: T, name: Option<&str>) -> CoreResult<ObjectId> {
        self.ensure_active()?;
        if let Some(name) = name {
            let max = self.store.config.name_max_len;
            if name.len() > max {
                return Err(CoreError::invalid_operation(format!(
                    "name is {} bytes, limit is {max}",
                    name.len()
                )));
            }
            if self.main.lookup_name(name)?.is_some() {
                return Err(CoreError::NameAlreadyBound {
                    name: name.to_owned(),
                });
            }
        }

        let payload_id = self.main.create(&codec::encode(&value)?)?;
        let header = ObjectHeader::created_by(self.id, self.priority, payload_id);
        let id = self.main.create(&header.to_bytes()?)?;

        if let Some(name) = name {
            if let Err(err) = self.main.register_name(name, id) {
                self.main.destroy(id)?;
                self.main.destroy(payload_id)?;
                return Err(err.into());
            }
        }

        self.locked.insert(id, CachedObject::typed(payload_id, value));
        self.created.insert(id);
        trace!(txn = %self.id, object = %id, name, "object created");
        Ok(id)
    }

    /// Destroys an object held by this transaction.
    ///
    /// The object must have been obtained through [`lock`](Self::lock) or
    /// [`create`](Self::create). Waiters are woken at commit and find the
    /// object gone; on abort the destroy is discarded.
    ///
    /// # Errors
    ///
    /// - `ObjectNotFound` if the object does not exist or was already
    ///   destroyed.
    /// - `InvalidOperation` if the transaction has finished.
    pub fn destroy(&mut self, id: ObjectId) -> CoreResult<()> {
        self.ensure_active()?;
        let header = ObjectHeader::from_bytes(&self.main.read(id)?)?;
        self.main.destroy(header.payload_id)?;
        self.main.destroy(id)?;

        self.peeked.remove(&id);
        let held = self.locked.remove(&id).is_some();
        if self.created.remove(&id) {
            trace!(txn = %self.id, object = %id, "destroyed own creation");
        } else if held {
            self.destroyed.insert(id);
            trace!(txn = %self.id, object = %id, "object destroyed");
        } else {
            warn!(txn = %self.id, object = %id, "destroying object that is not locked");
        }
        Ok(())
    }

    /// Reads an object without locking it. The value may be stale.
    ///
    /// An object this transaction holds is read from its own copy, changes
    /// included. Otherwise the first peek reads the committed value and
    /// later peeks return that same value until the object is locked.
    ///
    /// # Errors
    ///
    /// - `ObjectNotFound` if the object does not exist, is not yet
    ///   committed by its creator, or was destroyed by this transaction.
    /// - `Codec` if the object is not a `T`.
    /// - `InvalidOperation` if the transaction has finished.
    pub fn peek<T: Persistent>(&mut self, id: ObjectId) -> CoreResult<T> {
        self.ensure_active()?;
        if self.destroyed.contains(&id) {
            return Err(CoreError::ObjectNotFound { id });
        }
        if let Some(cached) = self.locked.get(&id) {
            return codec::decode(&cached.encoded()?);
        }
        if let Some(bytes) = self.peeked.get(&id) {
            return codec::decode(bytes);
        }

        let header = ObjectHeader::from_bytes(&self.main.read(id)?)?;
        let bytes = self.main.read(header.payload_id)?;
        let value = codec::decode(&bytes)?;
        self.peeked.insert(id, bytes);
        Ok(value)
    }

    /// Returns the object bound to `name`, if any.
    ///
    /// Names bound by this transaction's own uncommitted creates are
    /// visible to it.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` if the transaction has finished.
    /// - `DataSpace` if the data space fails the lookup.
    pub fn lookup(&mut self, name: &str) -> CoreResult<Option<ObjectId>> {
        self.ensure_active()?;
        Ok(self.main.lookup_name(name)?)
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("state", &self.state)
            .field("locked", &self.locked.len())
            .field("created", &self.created.len())
            .field("destroyed", &self.destroyed.len())
            .field("peeked", &self.peeked.len())
            .finish_non_exhaustive()
    }
}
