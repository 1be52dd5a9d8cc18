//! Live transaction registry and cross-thread signals.
//!
//! A transaction is only ever reached from another thread through its
//! identity: interrupts and wake-ups look the identity up here and act on the
//! registered [`TransactionSignal`]. The signal also carries the
//! transaction's priority and deadline, so a contender can rank waiters it
//! only knows by identity.

use crate::types::{Priority, TransactionId};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Interrupt flag and wake latch of one live transaction.
#[derive(Debug)]
pub(crate) struct TransactionSignal {
    priority: Priority,
    /// Clock reading after which the transaction counts as stale.
    deadline: u64,
    interrupted: AtomicBool,
    woken: Mutex<bool>,
    cond: Condvar,
}

impl TransactionSignal {
    pub(crate) fn new(priority: Priority, deadline: u64) -> Self {
        Self {
            priority,
            deadline,
            interrupted: AtomicBool::new(false),
            woken: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn priority(&self) -> Priority {
        self.priority
    }

    pub(crate) fn deadline(&self) -> u64 {
        self.deadline
    }

    pub(crate) fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Marks the transaction for forced abort and wakes it if it sleeps.
    pub(crate) fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        self.wake();
    }

    pub(crate) fn wake(&self) {
        let mut woken = self.woken.lock();
        *woken = true;
        self.cond.notify_all();
    }

    /// Resets the latch. Must happen before the transaction makes itself
    /// reachable as a listener, so a wake-up racing with the wait is kept.
    pub(crate) fn arm(&self) {
        *self.woken.lock() = false;
    }

    /// Sleeps until woken, interrupted, or until `timeout` elapses. Returns
    /// true unless the wait timed out.
    pub(crate) fn wait(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut woken = self.woken.lock();
        while !*woken && !self.is_interrupted() {
            match deadline {
                Some(deadline) => {
                    if self.cond.wait_until(&mut woken, deadline).timed_out() {
                        break;
                    }
                }
                None => self.cond.wait(&mut woken),
            }
        }
        let signalled = *woken || self.is_interrupted();
        *woken = false;
        signalled
    }
}

/// Identity-keyed directory of live transactions.
#[derive(Debug, Default)]
pub(crate) struct TransactionRegistry {
    live: RwLock<HashMap<TransactionId, Arc<TransactionSignal>>>,
}

impl TransactionRegistry {
    /// Registers a new identity. Returns `None` if it is already live.
    pub(crate) fn register(
        &self,
        id: TransactionId,
        priority: Priority,
        deadline: u64,
    ) -> Option<Arc<TransactionSignal>> {
        let mut live = self.live.write();
        if live.contains_key(&id) {
            return None;
        }
        let signal = Arc::new(TransactionSignal::new(priority, deadline));
        live.insert(id, Arc::clone(&signal));
        Some(signal)
    }

    pub(crate) fn deregister(&self, id: &TransactionId) {
        self.live.write().remove(id);
    }

    pub(crate) fn get(&self, id: &TransactionId) -> Option<Arc<TransactionSignal>> {
        self.live.read().get(id).cloned()
    }

    pub(crate) fn contains(&self, id: &TransactionId) -> bool {
        self.live.read().contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.live.read().len()
    }
}
