//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up object stores with a
//! controllable clock and for seeding and inspecting objects.

use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tso_core::{Clock, Config, ManualClock, ObjectId, ObjectStore, Persistent};
use tso_dataspace::{DataSpace, DataSpaceStats, InMemoryDataSpace, MonitoredDataSpace};

/// Installs a `tracing` subscriber for test output.
///
/// Honors `RUST_LOG`, defaulting to `warn`. Safe to call from every test;
/// only the first call installs anything.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// An object store over an in-memory data space, driven by a manual clock.
pub struct TestStore {
    /// The store under test.
    pub store: ObjectStore,
    /// The clock that stamps new transactions.
    pub clock: Arc<ManualClock>,
    /// The underlying data space.
    pub space: InMemoryDataSpace,
    stats: Option<Arc<DataSpaceStats>>,
}

impl TestStore {
    /// Creates a store over a fresh in-memory data space.
    ///
    /// The clock starts at 100.
    pub fn memory() -> Self {
        Self::memory_with_config(Config::default())
    }

    /// Creates a store over a fresh in-memory data space with `config`.
    pub fn memory_with_config(config: Config) -> Self {
        let space = InMemoryDataSpace::new();
        Self::build(space.clone(), Arc::new(space), config, None)
    }

    /// Creates a store whose data space operations are traced and counted.
    pub fn monitored() -> Self {
        let space = InMemoryDataSpace::new();
        let monitored = MonitoredDataSpace::new(space.clone());
        let stats = Arc::clone(monitored.stats());
        Self::build(space, Arc::new(monitored), Config::default(), Some(stats))
    }

    fn build(
        space: InMemoryDataSpace,
        data_space: Arc<dyn DataSpace>,
        config: Config,
        stats: Option<Arc<DataSpaceStats>>,
    ) -> Self {
        init_tracing();
        let clock = Arc::new(ManualClock::new(100));
        let store = ObjectStore::with_clock(data_space, config, Arc::clone(&clock) as Arc<dyn Clock>);
        Self {
            store,
            clock,
            space,
            stats,
        }
    }

    /// Returns data space counters if the store is monitored.
    pub fn data_space_stats(&self) -> Option<&DataSpaceStats> {
        self.stats.as_deref()
    }

    /// Creates and commits an object, returning its id.
    pub fn seed<T: Persistent>(&self, value: T) -> ObjectId {
        let mut txn = self.store.new_transaction().expect("Failed to start transaction");
        let id = txn.create(value, None).expect("Failed to create object");
        txn.commit().expect("Failed to commit seed");
        id
    }

    /// Creates and commits a named object, returning its id.
    pub fn seed_named<T: Persistent>(&self, name: &str, value: T) -> ObjectId {
        let mut txn = self.store.new_transaction().expect("Failed to start transaction");
        let id = txn.create(value, Some(name)).expect("Failed to create object");
        txn.commit().expect("Failed to commit seed");
        id
    }

    /// Reads the committed value of an object without locking it.
    pub fn read<T: Persistent>(&self, id: ObjectId) -> T {
        let mut txn = self.store.new_transaction().expect("Failed to start transaction");
        let value = txn.peek(id).expect("Failed to peek object");
        txn.abort().expect("Failed to abort reader");
        value
    }

    /// Starts a transaction stamped with the given clock reading.
    pub fn transaction_at(&self, timestamp: u64) -> tso_core::Transaction {
        self.clock.set(timestamp);
        self.store
            .new_transaction()
            .expect("Failed to start transaction")
    }
}

impl std::ops::Deref for TestStore {
    type Target = ObjectStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a fresh in-memory store.
///
/// # Example
///
/// ```rust
/// use tso_testkit::with_test_store;
///
/// with_test_store(|fixture| {
///     let id = fixture.seed(String::from("lamp"));
///     assert_eq!(fixture.read::<String>(id), "lamp");
/// });
/// ```
pub fn with_test_store<F, R>(f: F) -> R
where
    F: FnOnce(&TestStore) -> R,
{
    let fixture = TestStore::memory();
    f(&fixture)
}
