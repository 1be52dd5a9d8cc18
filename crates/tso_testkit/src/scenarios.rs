//! Contention scenario helpers.
//!
//! Threaded tests need to line transactions up in a particular order: one
//! holds an object, another blocks on it, then the first finishes. These
//! helpers spawn the blocked side and wait for observable progress through
//! the store's counters instead of sleeping for fixed times.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;
use tso_core::{CoreResult, ObjectId, ObjectStore, Persistent, Transaction};

/// Default time a scenario waits for a condition before giving up.
pub const SCENARIO_TIMEOUT: Duration = Duration::from_secs(5);

/// Polls `condition` until it holds or `timeout` elapses.
///
/// Returns whether the condition was reached.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(2));
    }
}

/// Waits until at least `count` lock calls have gone to sleep on `store`.
///
/// # Panics
///
/// Panics if that does not happen within [`SCENARIO_TIMEOUT`].
pub fn wait_for_lock_waits(store: &ObjectStore, count: u64) {
    assert!(
        wait_for(SCENARIO_TIMEOUT, || store.stats().lock_waits() >= count),
        "expected {count} lock waits, saw {}",
        store.stats().lock_waits()
    );
}

/// Locks `id` on a new thread, applies `update`, commits, and returns the
/// value as committed.
pub fn spawn_lock_and_commit<T, F>(
    mut txn: Transaction,
    id: ObjectId,
    update: F,
) -> JoinHandle<CoreResult<T>>
where
    T: Persistent + Clone,
    F: FnOnce(&mut T) + Send + 'static,
{
    thread::spawn(move || {
        let value = txn.lock::<T>(id)?;
        update(&mut *value);
        let committed = value.clone();
        txn.commit()?;
        Ok(committed)
    })
}

/// Runs `body` in fresh transactions until it is neither preempted nor timed
/// out, then commits.
///
/// Returns the body's result and how many attempts had to be retried.
pub fn retry_on_preempt<R>(
    store: &ObjectStore,
    mut body: impl FnMut(&mut Transaction) -> CoreResult<R>,
) -> CoreResult<(R, usize)> {
    let mut retries = 0;
    loop {
        let mut txn = store.new_transaction()?;
        match body(&mut txn) {
            Ok(result) => {
                txn.commit()?;
                return Ok((result, retries));
            }
            Err(e) if e.is_retryable() => {
                retries += 1;
                debug!(txn = %txn.id(), retries, error = %e, "retrying transaction");
            }
            Err(e) => return Err(e),
        }
    }
}
