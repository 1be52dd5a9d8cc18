//! Stress tests for the object store.
//!
//! These runs hammer a small set of counters from many threads, each
//! transaction locking two counters in an order that differs between
//! threads. Preempted transactions are retried, and afterwards the counters
//! must account for every committed increment.

use crate::scenarios::retry_on_preempt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tso_core::{CoreResult, ObjectId, ObjectStore};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Transactions that committed.
    pub committed: usize,
    /// Attempts that were preempted or timed out and retried.
    pub preempted: usize,
    /// Total duration.
    pub duration: Duration,
    /// Committed transactions per second.
    pub commits_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(committed: usize, preempted: usize, duration: Duration) -> Self {
        let commits_per_second = if duration.as_secs_f64() > 0.0 {
            committed as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            committed,
            preempted,
            duration,
            commits_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Committed: {}", self.committed);
        println!("Preempted: {}", self.preempted);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} commits/sec", self.commits_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent threads.
    pub threads: usize,
    /// Transactions each thread commits.
    pub transactions_per_thread: usize,
    /// Number of shared counters.
    pub counters: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            transactions_per_thread: 200,
            counters: 4,
        }
    }
}

/// Seeds `count` counters at zero.
pub fn seed_counters(store: &ObjectStore, count: usize) -> CoreResult<Vec<ObjectId>> {
    let mut txn = store.new_transaction()?;
    let ids = (0..count)
        .map(|_| txn.create(0u64, None))
        .collect::<CoreResult<Vec<_>>>()?;
    txn.commit()?;
    Ok(ids)
}

/// Sums the committed values of `ids`.
pub fn sum_counters(store: &ObjectStore, ids: &[ObjectId]) -> CoreResult<u64> {
    let mut txn = store.new_transaction()?;
    let mut total = 0;
    for id in ids {
        total += txn.peek::<u64>(*id)?;
    }
    txn.abort()?;
    Ok(total)
}

/// Runs contended increments over shared counters.
///
/// Every transaction increments two neighbouring counters. Even threads lock
/// them in ascending order, odd threads in descending order, so crossed lock
/// orders are common.
pub fn stress_contended_counters(
    store: &ObjectStore,
    config: &StressConfig,
) -> CoreResult<(StressTestResult, Vec<ObjectId>)> {
    let counters = Arc::new(seed_counters(store, config.counters.max(2))?);
    let committed = Arc::new(AtomicUsize::new(0));
    let preempted = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();
    let handles: Vec<_> = (0..config.threads)
        .map(|thread_id| {
            let store = store.clone();
            let counters = Arc::clone(&counters);
            let committed = Arc::clone(&committed);
            let preempted = Arc::clone(&preempted);
            let rounds = config.transactions_per_thread;

            thread::spawn(move || -> CoreResult<()> {
                for round in 0..rounds {
                    let first = (thread_id + round) % counters.len();
                    let second = (first + 1) % counters.len();
                    let (a, b) = if thread_id % 2 == 0 {
                        (counters[first], counters[second])
                    } else {
                        (counters[second], counters[first])
                    };

                    let ((), retries) = retry_on_preempt(&store, |txn| {
                        *txn.lock::<u64>(a)? += 1;
                        *txn.lock::<u64>(b)? += 1;
                        Ok(())
                    })?;
                    committed.fetch_add(1, Ordering::Relaxed);
                    preempted.fetch_add(retries, Ordering::Relaxed);
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        match handle.join() {
            Ok(outcome) => outcome?,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    let result = StressTestResult::new(
        committed.load(Ordering::Relaxed),
        preempted.load(Ordering::Relaxed),
        start.elapsed(),
    );
    let ids = Arc::try_unwrap(counters).unwrap_or_else(|shared| shared.as_ref().clone());
    Ok((result, ids))
}

/// Runs single-threaded increments of one counter, the uncontended baseline.
pub fn stress_sequential_increments(
    store: &ObjectStore,
    config: &StressConfig,
) -> CoreResult<(StressTestResult, ObjectId)> {
    let id = seed_counters(store, 1)?[0];
    let start = Instant::now();
    for _ in 0..config.transactions_per_thread {
        let mut txn = store.new_transaction()?;
        *txn.lock::<u64>(id)? += 1;
        txn.commit()?;
    }
    Ok((
        StressTestResult::new(config.transactions_per_thread, 0, start.elapsed()),
        id,
    ))
}
