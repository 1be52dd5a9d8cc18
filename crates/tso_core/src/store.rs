//! Object store: transaction factory and signal router.

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::registry::TransactionRegistry;
use crate::stats::StoreStats;
use crate::transaction::Transaction;
use crate::types::{Priority, TransactionId};
use rand::rngs::OsRng;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, trace};
use tso_dataspace::DataSpace;

/// State shared by the store handle and every transaction it minted.
pub(crate) struct StoreShared {
    pub(crate) data_space: Arc<dyn DataSpace>,
    pub(crate) registry: TransactionRegistry,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: Config,
    pub(crate) stats: StoreStats,
}

impl StoreShared {
    /// Asks a live transaction to abort because an older one needs an object
    /// it holds. Unknown identities are ignored: the target may already have
    /// finished.
    pub(crate) fn request_timestamp_interrupt(&self, id: &TransactionId) {
        match self.registry.get(id) {
            Some(signal) => {
                debug!(target_txn = %id, "priority interrupt");
                signal.interrupt();
                self.stats.record_interrupt();
            }
            None => trace!(target_txn = %id, "priority interrupt for finished transaction"),
        }
    }

    /// Wakes every still-live transaction in `ids`.
    pub(crate) fn notify_availability_listeners<'a, I>(&self, ids: I)
    where
        I: IntoIterator<Item = &'a TransactionId>,
    {
        for id in ids {
            if let Some(signal) = self.registry.get(id) {
                trace!(listener = %id, "waking listener");
                signal.wake();
                self.stats.record_wakeup();
            }
        }
    }
}

/// The transaction factory for a data space.
///
/// The store gives every transaction a fixed, totally ordered priority
/// (creation timestamp plus a random tiebreak) and keeps a registry of live
/// transactions so that one transaction can interrupt or wake another purely
/// by identity.
///
/// Cloning is cheap; clones share the registry, statistics and data space.
///
/// # Example
///
/// ```rust
/// use tso_core::ObjectStore;
/// use tso_dataspace::InMemoryDataSpace;
///
/// let store = ObjectStore::new(InMemoryDataSpace::new());
///
/// let mut txn = store.new_transaction().unwrap();
/// let id = txn.create(100u32, Some("gold")).unwrap();
/// txn.commit().unwrap();
///
/// let mut txn = store.new_transaction().unwrap();
/// assert_eq!(txn.lookup("gold").unwrap(), Some(id));
/// *txn.lock::<u32>(id).unwrap() += 5;
/// txn.commit().unwrap();
/// ```
#[derive(Clone)]
pub struct ObjectStore {
    shared: Arc<StoreShared>,
}

impl ObjectStore {
    /// Creates a store with the default configuration.
    pub fn new<D: DataSpace + 'static>(data_space: D) -> Self {
        Self::with_config(data_space, Config::default())
    }

    /// Creates a store with a custom configuration.
    pub fn with_config<D: DataSpace + 'static>(data_space: D, config: Config) -> Self {
        Self::with_clock(Arc::new(data_space), config, Arc::new(SystemClock))
    }

    /// Creates a store over a shared data space with a custom timestamp source.
    pub fn with_clock(
        data_space: Arc<dyn DataSpace>,
        config: Config,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            shared: Arc::new(StoreShared {
                data_space,
                registry: TransactionRegistry::default(),
                clock,
                config,
                stats: StoreStats::new(),
            }),
        }
    }

    /// Starts a new transaction.
    ///
    /// The transaction's priority is the current clock reading plus a random
    /// tiebreak drawn from the operating system's secure generator. Its
    /// deadline is the same reading plus the configured timeout.
    pub fn new_transaction(&self) -> CoreResult<Transaction> {
        let now = self.shared.clock.now_millis();
        let priority = Priority::new(now, OsRng.gen());
        let deadline = now.saturating_add(self.shared.config.timeout_millis());
        let (id, signal) = loop {
            let id = TransactionId::new();
            if let Some(signal) = self.shared.registry.register(id, priority, deadline) {
                break (id, signal);
            }
        };
        self.shared.stats.record_transaction_start();
        debug!(txn = %id, %priority, deadline, "transaction started");
        Ok(Transaction::begin(
            Arc::clone(&self.shared),
            id,
            priority,
            signal,
        ))
    }

    /// Sets a live transaction's interrupted flag and wakes it.
    ///
    /// Does nothing if the transaction has already finished.
    pub fn request_timestamp_interrupt(&self, id: &TransactionId) {
        self.shared.request_timestamp_interrupt(id);
    }

    /// Wakes every listed transaction that is still live.
    pub fn notify_availability_listeners<'a, I>(&self, ids: I)
    where
        I: IntoIterator<Item = &'a TransactionId>,
    {
        self.shared.notify_availability_listeners(ids);
    }

    /// Removes every object from the data space.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if any transaction is still live.
    pub fn clear_all(&self) -> CoreResult<()> {
        let live = self.shared.registry.len();
        if live > 0 {
            return Err(CoreError::invalid_operation(format!(
                "cannot clear with {live} live transactions"
            )));
        }
        debug!("clearing data space");
        self.shared.data_space.clear()?;
        Ok(())
    }

    /// Returns the number of live transactions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Returns true if the transaction is registered and not yet finished.
    #[must_use]
    pub fn is_live(&self, id: &TransactionId) -> bool {
        self.shared.registry.contains(id)
    }

    /// Returns the store's counters.
    #[must_use]
    pub fn stats(&self) -> &StoreStats {
        &self.shared.stats
    }

    /// Returns the store's configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("active_count", &self.active_count())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use tso_dataspace::InMemoryDataSpace;

    fn manual_store(start: u64) -> (ObjectStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start));
        let store = ObjectStore::with_clock(
            Arc::new(InMemoryDataSpace::new()),
            Config::default(),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        (store, clock)
    }

    #[test]
    fn new_transaction_registers_it() {
        let store = ObjectStore::new(InMemoryDataSpace::new());
        let txn = store.new_transaction().unwrap();
        assert!(store.is_live(&txn.id()));
        assert_eq!(store.active_count(), 1);
        assert_eq!(store.stats().transactions_started(), 1);
    }

    #[test]
    fn identities_are_unique() {
        let store = ObjectStore::new(InMemoryDataSpace::new());
        let a = store.new_transaction().unwrap();
        let b = store.new_transaction().unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn priority_uses_clock() {
        let (store, clock) = manual_store(100);
        let first = store.new_transaction().unwrap();
        clock.set(200);
        let second = store.new_transaction().unwrap();
        assert_eq!(first.priority().timestamp, 100);
        assert_eq!(second.priority().timestamp, 200);
        assert!(first.priority() < second.priority());
    }

    #[test]
    fn deadline_follows_clock_and_timeout() {
        let clock = Arc::new(ManualClock::new(1_000));
        let store = ObjectStore::with_clock(
            Arc::new(InMemoryDataSpace::new()),
            Config::new().transaction_timeout(std::time::Duration::from_millis(250)),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        let txn = store.new_transaction().unwrap();
        assert_eq!(txn.deadline(), 1_250);
    }

    #[test]
    fn one_notification_wakes_each_live_listener_once() {
        let store = ObjectStore::new(InMemoryDataSpace::new());
        let live: Vec<_> = (0..3).map(|_| store.new_transaction().unwrap()).collect();
        let finished = store.new_transaction().unwrap();
        let finished_id = finished.id();
        finished.commit().unwrap();

        let mut ids: Vec<_> = live.iter().map(Transaction::id).collect();
        ids.push(finished_id);
        store.notify_availability_listeners(&ids);

        assert_eq!(store.stats().wakeups_delivered(), 3);
    }

    #[test]
    fn finished_transactions_leave_registry() {
        let store = ObjectStore::new(InMemoryDataSpace::new());
        let committed = store.new_transaction().unwrap();
        let aborted = store.new_transaction().unwrap();
        let (c, a) = (committed.id(), aborted.id());
        committed.commit().unwrap();
        aborted.abort().unwrap();
        assert!(!store.is_live(&c));
        assert!(!store.is_live(&a));
        assert_eq!(store.active_count(), 0);
    }

    #[test]
    fn dropped_transaction_leaves_registry() {
        let store = ObjectStore::new(InMemoryDataSpace::new());
        {
            let _txn = store.new_transaction().unwrap();
            assert_eq!(store.active_count(), 1);
        }
        assert_eq!(store.active_count(), 0);
        assert_eq!(store.stats().transactions_aborted(), 1);
    }

    #[test]
    fn interrupt_of_finished_transaction_is_noop() {
        let store = ObjectStore::new(InMemoryDataSpace::new());
        let txn = store.new_transaction().unwrap();
        let id = txn.id();
        txn.commit().unwrap();

        store.request_timestamp_interrupt(&id);
        store.notify_availability_listeners([&id]);
        assert_eq!(store.stats().interrupts_sent(), 0);
        assert_eq!(store.stats().wakeups_delivered(), 0);
    }

    #[test]
    fn interrupt_marks_live_transaction() {
        let store = ObjectStore::new(InMemoryDataSpace::new());
        let txn = store.new_transaction().unwrap();
        assert!(!txn.is_interrupted());
        store.request_timestamp_interrupt(&txn.id());
        assert!(txn.is_interrupted());
        assert_eq!(store.stats().interrupts_sent(), 1);
    }

    #[test]
    fn clear_all_requires_no_live_transactions() {
        let space = InMemoryDataSpace::new();
        let store = ObjectStore::new(space.clone());

        let mut txn = store.new_transaction().unwrap();
        txn.create(String::from("rock"), None).unwrap();
        assert!(matches!(
            store.clear_all(),
            Err(CoreError::InvalidOperation { .. })
        ));
        txn.commit().unwrap();
        assert_eq!(space.len(), 2);

        store.clear_all().unwrap();
        assert!(space.is_empty());
    }
}
