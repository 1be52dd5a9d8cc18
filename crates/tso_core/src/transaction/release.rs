//! Commit, abort and lock release.

use super::handle::Transaction;
use super::state::TransactionState;
use crate::error::{CoreError, CoreResult};
use crate::header::ObjectHeader;
use std::collections::BTreeSet;
use tracing::{debug, warn};
use tso_dataspace::ObjectId;

impl Transaction {
    /// Commits the transaction.
    ///
    /// Every held object is written back and the main unit of work commits.
    /// Then all headers are released and their waiters woken.
    ///
    /// # Errors
    ///
    /// If the data space rejects the commit (for example a name bound
    /// concurrently by another transaction), the transaction is aborted, its
    /// locks are released and the error is returned.
    ///
    /// If another transaction took over a held object after this one's
    /// deadline passed, nothing is written and `TimedOut` is returned.
    pub fn commit(mut self) -> CoreResult<()> {
        self.ensure_active()?;
        self.finish(true)
    }

    /// Aborts the transaction, discarding its changes and releasing its locks.
    ///
    /// Aborting a transaction that has already finished does nothing.
    pub fn abort(mut self) -> CoreResult<()> {
        if !self.is_active() {
            return Ok(());
        }
        self.finish(false)
    }

    pub(super) fn abort_in_place(&mut self) {
        if let Err(err) = self.finish(false) {
            warn!(txn = %self.id, error = %err, "abort failed");
        }
    }

    /// Ends the transaction and releases every header it holds.
    fn finish(&mut self, commit: bool) -> CoreResult<()> {
        let mut outcome = if commit { self.write_back() } else { Ok(()) };
        let held = self.lock_held_headers();

        let taken_over = held
            .iter()
            .filter(|(_, header)| header.owner != Some(self.id))
            .count();
        if commit && outcome.is_ok() && taken_over > 0 {
            warn!(txn = %self.id, taken_over, "held objects were taken over, aborting");
            self.store.stats.record_timeout();
            outcome = Err(CoreError::TimedOut { txn: self.id });
        }

        if commit && outcome.is_ok() {
            outcome = self.main.commit().map_err(CoreError::from);
        }
        let committed = commit && outcome.is_ok();
        if !committed {
            self.main.abort();
        }

        let mut wake = BTreeSet::new();
        for (id, mut header) in held {
            if header.owner != Some(self.id) {
                continue;
            }
            wake.extend(header.release());
            if committed && self.destroyed.contains(&id) {
                continue;
            }
            let staged = header
                .to_bytes()
                .and_then(|bytes| Ok(self.key.write(id, &bytes)?));
            if let Err(err) = staged {
                warn!(txn = %self.id, object = %id, error = %err, "failed to stage header release");
            }
        }
        if let Err(err) = self.key.commit() {
            warn!(txn = %self.id, error = %err, "failed to commit header release");
            self.key.abort();
        }
        wake.remove(&self.id);
        self.store.notify_availability_listeners(&wake);

        self.locked.clear();
        self.created.clear();
        self.destroyed.clear();
        self.peeked.clear();
        self.store.registry.deregister(&self.id);
        if committed {
            self.state = TransactionState::Committed;
            self.store.stats.record_transaction_commit();
            debug!(txn = %self.id, woken = wake.len(), "transaction committed");
        } else {
            self.state = TransactionState::Aborted;
            self.store.stats.record_transaction_abort();
            debug!(txn = %self.id, woken = wake.len(), "transaction aborted");
        }
        outcome
    }

    fn write_back(&mut self) -> CoreResult<()> {
        for cached in self.locked.values() {
            if let Some(bytes) = cached.write_back()? {
                self.main.write(cached.payload_id, &bytes)?;
            }
        }
        Ok(())
    }

    /// Key-locks and reads every header this transaction holds, in ascending
    /// id order. Headers of destroyed objects are included so their waiters
    /// can still be woken once the destroy commits.
    fn lock_held_headers(&mut self) -> Vec<(ObjectId, ObjectHeader)> {
        let ids: BTreeSet<ObjectId> = self
            .locked
            .keys()
            .filter(|id| !self.created.contains(id))
            .chain(self.destroyed.iter())
            .copied()
            .collect();

        let mut headers = Vec::with_capacity(ids.len());
        for id in ids {
            let read = self
                .key
                .lock(id)
                .and_then(|()| self.key.read(id))
                .map_err(CoreError::from)
                .and_then(|bytes| ObjectHeader::from_bytes(&bytes));
            match read {
                Ok(header) => headers.push((id, header)),
                Err(err) => {
                    warn!(txn = %self.id, object = %id, error = %err, "failed to read held header");
                }
            }
        }
        headers
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.is_active() {
            debug!(txn = %self.id, "aborting dropped transaction");
            self.abort_in_place();
        }
    }
}
