//! Object store statistics.
//!
//! # Usage
//!
//! ```rust
//! use tso_core::ObjectStore;
//! use tso_dataspace::InMemoryDataSpace;
//!
//! let store = ObjectStore::new(InMemoryDataSpace::new());
//! let txn = store.new_transaction().unwrap();
//! txn.commit().unwrap();
//!
//! let stats = store.stats();
//! assert_eq!(stats.transactions_started(), 1);
//! assert_eq!(stats.transactions_committed(), 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Object store counters.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct StoreStats {
    transactions_started: AtomicU64,
    transactions_committed: AtomicU64,
    transactions_aborted: AtomicU64,
    /// Aborts forced by an older transaction. Also counted as aborts.
    transactions_preempted: AtomicU64,
    /// Times a `lock` call went to sleep waiting for a header.
    lock_waits: AtomicU64,
    /// Busy results from non-blocking `lock` calls.
    lock_busy: AtomicU64,
    interrupts_sent: AtomicU64,
    /// Wake notifications that reached a live transaction.
    wakeups_delivered: AtomicU64,
    /// Aborts caused by a transaction running past its deadline.
    transactions_timed_out: AtomicU64,
    /// Headers taken from an owner whose deadline had passed.
    stale_takeovers: AtomicU64,
    /// Free headers handed to an older waiter instead of the caller.
    handoffs: AtomicU64,
}

impl StoreStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_transaction_start(&self) {
        self.transactions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_commit(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_abort(&self) {
        self.transactions_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_preemption(&self) {
        self.transactions_preempted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_lock_wait(&self) {
        self.lock_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_lock_busy(&self) {
        self.lock_busy.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_interrupt(&self) {
        self.interrupts_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_wakeup(&self) {
        self.wakeups_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.transactions_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale_takeover(&self) {
        self.stale_takeovers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_handoff(&self) {
        self.handoffs.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the total number of transactions started.
    pub fn transactions_started(&self) -> u64 {
        self.transactions_started.load(Ordering::Relaxed)
    }

    /// Returns the total number of transactions committed.
    pub fn transactions_committed(&self) -> u64 {
        self.transactions_committed.load(Ordering::Relaxed)
    }

    /// Returns the total number of transactions aborted, preemptions and
    /// timeouts included.
    pub fn transactions_aborted(&self) -> u64 {
        self.transactions_aborted.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions aborted by a priority interrupt.
    pub fn transactions_preempted(&self) -> u64 {
        self.transactions_preempted.load(Ordering::Relaxed)
    }

    /// Returns the number of times a lock call blocked.
    pub fn lock_waits(&self) -> u64 {
        self.lock_waits.load(Ordering::Relaxed)
    }

    /// Returns the number of non-blocking lock calls that found the object busy.
    pub fn lock_busy(&self) -> u64 {
        self.lock_busy.load(Ordering::Relaxed)
    }

    /// Returns the number of priority interrupts delivered to live transactions.
    pub fn interrupts_sent(&self) -> u64 {
        self.interrupts_sent.load(Ordering::Relaxed)
    }

    /// Returns the number of wake notifications delivered.
    pub fn wakeups_delivered(&self) -> u64 {
        self.wakeups_delivered.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions aborted for running out of time.
    pub fn transactions_timed_out(&self) -> u64 {
        self.transactions_timed_out.load(Ordering::Relaxed)
    }

    /// Returns the number of stale locks taken over.
    pub fn stale_takeovers(&self) -> u64 {
        self.stale_takeovers.load(Ordering::Relaxed)
    }

    /// Returns the number of headers handed to an older waiter.
    pub fn handoffs(&self) -> u64 {
        self.handoffs.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let stats = StoreStats::new();
        assert_eq!(stats.transactions_started(), 0);
        assert_eq!(stats.lock_waits(), 0);
        assert_eq!(stats.wakeups_delivered(), 0);
    }

    #[test]
    fn counters_increment() {
        let stats = StoreStats::new();
        stats.record_transaction_start();
        stats.record_transaction_abort();
        stats.record_preemption();
        stats.record_interrupt();
        stats.record_interrupt();
        stats.record_timeout();
        stats.record_handoff();

        assert_eq!(stats.transactions_started(), 1);
        assert_eq!(stats.transactions_aborted(), 1);
        assert_eq!(stats.transactions_preempted(), 1);
        assert_eq!(stats.interrupts_sent(), 2);
        assert_eq!(stats.transactions_timed_out(), 1);
        assert_eq!(stats.handoffs(), 1);
        assert_eq!(stats.stale_takeovers(), 0);
    }
}
