//! Tracing and statistics wrapper for any data space.

use crate::error::DataSpaceResult;
use crate::space::{DataSpace, DataSpaceTransaction};
use crate::ObjectId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Operation counters for a [`MonitoredDataSpace`].
///
/// All counters are atomic and can be read while operations are in progress.
#[derive(Debug, Default)]
pub struct DataSpaceStats {
    creates: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    destroys: AtomicU64,
    locks: AtomicU64,
    name_registrations: AtomicU64,
    name_lookups: AtomicU64,
    commits: AtomicU64,
    aborts: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    errors: AtomicU64,
}

impl DataSpaceStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record<T>(&self, result: &DataSpaceResult<T>) {
        if result.is_err() {
            Self::bump(&self.errors);
        }
    }

    /// Returns the number of objects created.
    pub fn creates(&self) -> u64 {
        self.creates.load(Ordering::Relaxed)
    }

    /// Returns the number of reads.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns the number of writes.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Returns the number of destroys.
    pub fn destroys(&self) -> u64 {
        self.destroys.load(Ordering::Relaxed)
    }

    /// Returns the number of lock calls.
    pub fn locks(&self) -> u64 {
        self.locks.load(Ordering::Relaxed)
    }

    /// Returns the number of name registrations.
    pub fn name_registrations(&self) -> u64 {
        self.name_registrations.load(Ordering::Relaxed)
    }

    /// Returns the number of name lookups.
    pub fn name_lookups(&self) -> u64 {
        self.name_lookups.load(Ordering::Relaxed)
    }

    /// Returns the number of commits.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Returns the number of aborts.
    pub fn aborts(&self) -> u64 {
        self.aborts.load(Ordering::Relaxed)
    }

    /// Returns the total bytes returned by reads.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Returns the total bytes passed to creates and writes.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Returns the number of operations that failed.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

/// Wraps a [`DataSpace`] and records every operation.
///
/// Each operation emits a `trace`-level event under the
/// `tso_dataspace::monitored` target and bumps a counter in the shared
/// [`DataSpaceStats`].
///
/// ```rust
/// use tso_dataspace::{DataSpace, InMemoryDataSpace, MonitoredDataSpace};
///
/// let space = MonitoredDataSpace::new(InMemoryDataSpace::new());
/// let mut txn = space.begin();
/// txn.create(b"x").unwrap();
/// txn.commit().unwrap();
/// assert_eq!(space.stats().creates(), 1);
/// ```
#[derive(Debug)]
pub struct MonitoredDataSpace<D> {
    inner: D,
    stats: Arc<DataSpaceStats>,
}

impl<D: DataSpace> MonitoredDataSpace<D> {
    /// Wraps a data space.
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            stats: Arc::new(DataSpaceStats::new()),
        }
    }

    /// Returns the shared operation counters.
    pub fn stats(&self) -> &Arc<DataSpaceStats> {
        &self.stats
    }

    /// Returns the wrapped data space.
    pub fn inner(&self) -> &D {
        &self.inner
    }
}

impl<D: DataSpace> DataSpace for MonitoredDataSpace<D> {
    fn begin(&self) -> Box<dyn DataSpaceTransaction> {
        Box::new(MonitoredTransaction {
            inner: self.inner.begin(),
            stats: Arc::clone(&self.stats),
        })
    }

    fn clear(&self) -> DataSpaceResult<()> {
        trace!("clear");
        let result = self.inner.clear();
        self.stats.record(&result);
        result
    }
}

struct MonitoredTransaction {
    inner: Box<dyn DataSpaceTransaction>,
    stats: Arc<DataSpaceStats>,
}

impl DataSpaceTransaction for MonitoredTransaction {
    fn create(&mut self, data: &[u8]) -> DataSpaceResult<ObjectId> {
        let result = self.inner.create(data);
        trace!(len = data.len(), result = ?result, "create");
        DataSpaceStats::bump(&self.stats.creates);
        self.stats
            .bytes_written
            .fetch_add(data.len() as u64, Ordering::Relaxed);
        self.stats.record(&result);
        result
    }

    fn read(&mut self, id: ObjectId) -> DataSpaceResult<Vec<u8>> {
        let result = self.inner.read(id);
        trace!(%id, ok = result.is_ok(), "read");
        DataSpaceStats::bump(&self.stats.reads);
        if let Ok(data) = &result {
            self.stats
                .bytes_read
                .fetch_add(data.len() as u64, Ordering::Relaxed);
        }
        self.stats.record(&result);
        result
    }

    fn write(&mut self, id: ObjectId, data: &[u8]) -> DataSpaceResult<()> {
        let result = self.inner.write(id, data);
        trace!(%id, len = data.len(), ok = result.is_ok(), "write");
        DataSpaceStats::bump(&self.stats.writes);
        self.stats
            .bytes_written
            .fetch_add(data.len() as u64, Ordering::Relaxed);
        self.stats.record(&result);
        result
    }

    fn destroy(&mut self, id: ObjectId) -> DataSpaceResult<()> {
        let result = self.inner.destroy(id);
        trace!(%id, ok = result.is_ok(), "destroy");
        DataSpaceStats::bump(&self.stats.destroys);
        self.stats.record(&result);
        result
    }

    fn lock(&mut self, id: ObjectId) -> DataSpaceResult<()> {
        let result = self.inner.lock(id);
        trace!(%id, ok = result.is_ok(), "lock");
        DataSpaceStats::bump(&self.stats.locks);
        self.stats.record(&result);
        result
    }

    fn register_name(&mut self, name: &str, id: ObjectId) -> DataSpaceResult<()> {
        let result = self.inner.register_name(name, id);
        trace!(name, %id, ok = result.is_ok(), "register_name");
        DataSpaceStats::bump(&self.stats.name_registrations);
        self.stats.record(&result);
        result
    }

    fn lookup_name(&mut self, name: &str) -> DataSpaceResult<Option<ObjectId>> {
        let result = self.inner.lookup_name(name);
        trace!(name, result = ?result, "lookup_name");
        DataSpaceStats::bump(&self.stats.name_lookups);
        self.stats.record(&result);
        result
    }

    fn commit(&mut self) -> DataSpaceResult<()> {
        let result = self.inner.commit();
        trace!(ok = result.is_ok(), "commit");
        DataSpaceStats::bump(&self.stats.commits);
        self.stats.record(&result);
        result
    }

    fn abort(&mut self) {
        self.inner.abort();
        trace!("abort");
        DataSpaceStats::bump(&self.stats.aborts);
    }
}
