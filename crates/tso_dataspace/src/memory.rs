//! In-memory data space.

use crate::error::{DataSpaceError, DataSpaceResult};
use crate::space::{DataSpace, DataSpaceTransaction};
use crate::ObjectId;
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Committed contents of the data space.
#[derive(Debug, Default)]
struct State {
    objects: HashMap<ObjectId, Vec<u8>>,
    names: HashMap<String, ObjectId>,
}

#[derive(Debug)]
struct Shared {
    state: RwLock<State>,
    /// Ids currently locked by some handle.
    locks: Mutex<HashSet<ObjectId>>,
    lock_released: Condvar,
    next_id: AtomicU64,
}

impl Default for Shared {
    fn default() -> Self {
        Self {
            state: RwLock::new(State::default()),
            locks: Mutex::new(HashSet::new()),
            lock_released: Condvar::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

/// A data space that keeps every object in memory.
///
/// This data space is suitable for:
/// - Unit and integration tests
/// - Ephemeral game worlds that don't need persistence
///
/// # Thread Safety
///
/// Cloning is cheap and every clone refers to the same store, so a single
/// instance can be shared by any number of object stores and threads.
///
/// # Example
///
/// ```rust
/// use tso_dataspace::{DataSpace, InMemoryDataSpace};
///
/// let space = InMemoryDataSpace::new();
/// let mut txn = space.begin();
/// let id = txn.create(b"hello").unwrap();
/// txn.commit().unwrap();
///
/// let mut reader = space.begin();
/// assert_eq!(reader.read(id).unwrap(), b"hello");
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataSpace {
    shared: Arc<Shared>,
}

impl InMemoryDataSpace {
    /// Creates a new empty data space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of committed objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.state.read().objects.len()
    }

    /// Returns true if no objects are committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of committed name bindings.
    #[must_use]
    pub fn name_count(&self) -> usize {
        self.shared.state.read().names.len()
    }

    /// Returns the number of ids currently locked by any handle.
    #[must_use]
    pub fn locked_count(&self) -> usize {
        self.shared.locks.lock().len()
    }
}

impl DataSpace for InMemoryDataSpace {
    fn begin(&self) -> Box<dyn DataSpaceTransaction> {
        Box::new(InMemoryTransaction {
            shared: Arc::clone(&self.shared),
            pending: HashMap::new(),
            names: HashMap::new(),
            held: HashSet::new(),
        })
    }

    fn clear(&self) -> DataSpaceResult<()> {
        let mut state = self.shared.state.write();
        state.objects.clear();
        state.names.clear();
        Ok(())
    }
}

#[derive(Debug)]
enum Pending {
    Write(Vec<u8>),
    Destroy,
}

/// Handle over an [`InMemoryDataSpace`].
#[derive(Debug)]
struct InMemoryTransaction {
    shared: Arc<Shared>,
    pending: HashMap<ObjectId, Pending>,
    names: HashMap<String, ObjectId>,
    held: HashSet<ObjectId>,
}

impl InMemoryTransaction {
    fn exists(&self, id: ObjectId) -> bool {
        match self.pending.get(&id) {
            Some(Pending::Write(_)) => true,
            Some(Pending::Destroy) => false,
            None => self.shared.state.read().objects.contains_key(&id),
        }
    }

    fn ensure_exists(&self, id: ObjectId) -> DataSpaceResult<()> {
        if !id.is_valid() {
            return Err(DataSpaceError::InvalidId);
        }
        if self.exists(id) {
            Ok(())
        } else {
            Err(DataSpaceError::not_found(id))
        }
    }

    fn release_held(&mut self) {
        if self.held.is_empty() {
            return;
        }
        let mut locks = self.shared.locks.lock();
        for id in self.held.drain() {
            locks.remove(&id);
        }
        self.shared.lock_released.notify_all();
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.names.clear();
        self.release_held();
    }
}

impl DataSpaceTransaction for InMemoryTransaction {
    fn create(&mut self, data: &[u8]) -> DataSpaceResult<ObjectId> {
        let id = ObjectId::new(self.shared.next_id.fetch_add(1, Ordering::SeqCst));
        self.pending.insert(id, Pending::Write(data.to_vec()));
        Ok(id)
    }

    fn read(&mut self, id: ObjectId) -> DataSpaceResult<Vec<u8>> {
        if !id.is_valid() {
            return Err(DataSpaceError::InvalidId);
        }
        match self.pending.get(&id) {
            Some(Pending::Write(data)) => Ok(data.clone()),
            Some(Pending::Destroy) => Err(DataSpaceError::not_found(id)),
            None => self
                .shared
                .state
                .read()
                .objects
                .get(&id)
                .cloned()
                .ok_or(DataSpaceError::not_found(id)),
        }
    }

    fn write(&mut self, id: ObjectId, data: &[u8]) -> DataSpaceResult<()> {
        self.ensure_exists(id)?;
        self.pending.insert(id, Pending::Write(data.to_vec()));
        Ok(())
    }

    fn destroy(&mut self, id: ObjectId) -> DataSpaceResult<()> {
        self.ensure_exists(id)?;
        self.pending.insert(id, Pending::Destroy);
        Ok(())
    }

    fn lock(&mut self, id: ObjectId) -> DataSpaceResult<()> {
        if self.held.contains(&id) {
            return Ok(());
        }
        self.ensure_exists(id)?;

        let mut locks = self.shared.locks.lock();
        while locks.contains(&id) {
            self.shared.lock_released.wait(&mut locks);
        }
        // The previous holder may have destroyed it.
        if !self.exists(id) {
            return Err(DataSpaceError::not_found(id));
        }
        locks.insert(id);
        drop(locks);

        self.held.insert(id);
        Ok(())
    }

    fn register_name(&mut self, name: &str, id: ObjectId) -> DataSpaceResult<()> {
        if !id.is_valid() {
            return Err(DataSpaceError::InvalidId);
        }
        if self.names.contains_key(name) || self.shared.state.read().names.contains_key(name) {
            return Err(DataSpaceError::name_already_bound(name));
        }
        self.names.insert(name.to_owned(), id);
        Ok(())
    }

    fn lookup_name(&mut self, name: &str) -> DataSpaceResult<Option<ObjectId>> {
        let id = match self.names.get(name) {
            Some(id) => Some(*id),
            None => self.shared.state.read().names.get(name).copied(),
        };
        Ok(id.filter(|id| !matches!(self.pending.get(id), Some(Pending::Destroy))))
    }

    fn commit(&mut self) -> DataSpaceResult<()> {
        let mut state = self.shared.state.write();

        // Validate before applying anything so a failed commit changes nothing.
        if let Some(name) = self
            .names
            .keys()
            .find(|name| state.names.contains_key(name.as_str()))
            .cloned()
        {
            drop(state);
            self.reset();
            return Err(DataSpaceError::name_already_bound(name));
        }

        for (id, change) in self.pending.drain() {
            match change {
                Pending::Write(data) => {
                    state.objects.insert(id, data);
                }
                Pending::Destroy => {
                    state.objects.remove(&id);
                    state.names.retain(|_, bound| *bound != id);
                }
            }
        }
        for (name, id) in self.names.drain() {
            if state.objects.contains_key(&id) {
                state.names.insert(name, id);
            }
        }
        drop(state);

        self.release_held();
        Ok(())
    }

    fn abort(&mut self) {
        self.reset();
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        self.release_held();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn committed(space: &InMemoryDataSpace, data: &[u8]) -> ObjectId {
        let mut txn = space.begin();
        let id = txn.create(data).unwrap();
        txn.commit().unwrap();
        id
    }

    #[test]
    fn create_is_invisible_until_commit() {
        let space = InMemoryDataSpace::new();
        let mut writer = space.begin();
        let id = writer.create(b"pending").unwrap();

        let mut reader = space.begin();
        assert!(matches!(
            reader.read(id),
            Err(DataSpaceError::NotFound { .. })
        ));

        writer.commit().unwrap();
        assert_eq!(reader.read(id).unwrap(), b"pending");
    }

    #[test]
    fn own_writes_are_visible() {
        let space = InMemoryDataSpace::new();
        let id = committed(&space, b"old");

        let mut txn = space.begin();
        txn.write(id, b"new").unwrap();
        assert_eq!(txn.read(id).unwrap(), b"new");

        let mut other = space.begin();
        assert_eq!(other.read(id).unwrap(), b"old");
    }

    #[test]
    fn abort_discards_changes() {
        let space = InMemoryDataSpace::new();
        let id = committed(&space, b"keep");

        let mut txn = space.begin();
        txn.write(id, b"lost").unwrap();
        let created = txn.create(b"lost too").unwrap();
        txn.abort();

        let mut reader = space.begin();
        assert_eq!(reader.read(id).unwrap(), b"keep");
        assert!(reader.read(created).is_err());
        assert_eq!(space.len(), 1);
    }

    #[test]
    fn handle_is_reusable_after_commit() {
        let space = InMemoryDataSpace::new();
        let mut txn = space.begin();
        let first = txn.create(b"one").unwrap();
        txn.commit().unwrap();
        let second = txn.create(b"two").unwrap();
        txn.commit().unwrap();

        assert_ne!(first, second);
        assert_eq!(space.len(), 2);
    }

    #[test]
    fn destroy_removes_object_and_names() {
        let space = InMemoryDataSpace::new();
        let mut txn = space.begin();
        let id = txn.create(b"named").unwrap();
        txn.register_name("player:1", id).unwrap();
        txn.commit().unwrap();
        assert_eq!(space.name_count(), 1);

        txn.destroy(id).unwrap();
        assert!(txn.read(id).is_err());
        assert_eq!(txn.lookup_name("player:1").unwrap(), None);
        txn.commit().unwrap();

        assert!(space.is_empty());
        assert_eq!(space.name_count(), 0);
    }

    #[test]
    fn write_to_missing_object_fails() {
        let space = InMemoryDataSpace::new();
        let mut txn = space.begin();
        assert!(txn.write(ObjectId::new(99), b"x").unwrap_err().is_not_found());
        assert!(txn.destroy(ObjectId::new(99)).unwrap_err().is_not_found());
    }

    #[test]
    fn invalid_id_is_rejected() {
        let space = InMemoryDataSpace::new();
        let mut txn = space.begin();
        assert_eq!(txn.read(ObjectId::INVALID), Err(DataSpaceError::InvalidId));
        assert_eq!(txn.lock(ObjectId::INVALID), Err(DataSpaceError::InvalidId));
    }

    #[test]
    fn duplicate_name_in_same_handle_fails() {
        let space = InMemoryDataSpace::new();
        let mut txn = space.begin();
        let a = txn.create(b"a").unwrap();
        let b = txn.create(b"b").unwrap();
        txn.register_name("hero", a).unwrap();
        assert!(matches!(
            txn.register_name("hero", b),
            Err(DataSpaceError::NameAlreadyBound { .. })
        ));
    }

    #[test]
    fn racing_name_bindings_fail_at_commit() {
        let space = InMemoryDataSpace::new();
        let mut first = space.begin();
        let mut second = space.begin();

        let a = first.create(b"a").unwrap();
        first.register_name("castle", a).unwrap();
        let b = second.create(b"b").unwrap();
        second.register_name("castle", b).unwrap();

        first.commit().unwrap();
        assert!(matches!(
            second.commit(),
            Err(DataSpaceError::NameAlreadyBound { .. })
        ));

        let mut reader = space.begin();
        assert_eq!(reader.lookup_name("castle").unwrap(), Some(a));
        assert!(reader.read(b).is_err());
    }

    #[test]
    fn lock_on_missing_object_fails() {
        let space = InMemoryDataSpace::new();
        let mut txn = space.begin();
        assert!(txn.lock(ObjectId::new(7)).unwrap_err().is_not_found());
        assert_eq!(space.locked_count(), 0);
    }

    #[test]
    fn relock_is_noop() {
        let space = InMemoryDataSpace::new();
        let id = committed(&space, b"x");
        let mut txn = space.begin();
        txn.lock(id).unwrap();
        txn.lock(id).unwrap();
        assert_eq!(space.locked_count(), 1);
        txn.abort();
        assert_eq!(space.locked_count(), 0);
    }

    #[test]
    fn lock_blocks_until_holder_commits() {
        let space = InMemoryDataSpace::new();
        let id = committed(&space, b"0");

        let mut holder = space.begin();
        holder.lock(id).unwrap();
        holder.write(id, b"1").unwrap();

        let contender_space = space.clone();
        let contender = thread::spawn(move || {
            let mut txn = contender_space.begin();
            txn.lock(id).unwrap();
            let seen = txn.read(id).unwrap();
            txn.abort();
            seen
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!contender.is_finished());
        holder.commit().unwrap();

        assert_eq!(contender.join().unwrap(), b"1");
    }

    #[test]
    fn lock_fails_when_holder_destroys() {
        let space = InMemoryDataSpace::new();
        let id = committed(&space, b"doomed");

        let mut holder = space.begin();
        holder.lock(id).unwrap();

        let contender_space = space.clone();
        let contender = thread::spawn(move || {
            let mut txn = contender_space.begin();
            txn.lock(id)
        });

        thread::sleep(Duration::from_millis(20));
        holder.destroy(id).unwrap();
        holder.commit().unwrap();

        assert!(contender.join().unwrap().unwrap_err().is_not_found());
    }

    #[test]
    fn dropping_handle_releases_locks() {
        let space = InMemoryDataSpace::new();
        let id = committed(&space, b"x");
        {
            let mut txn = space.begin();
            txn.lock(id).unwrap();
            assert_eq!(space.locked_count(), 1);
        }
        assert_eq!(space.locked_count(), 0);
    }

    #[test]
    fn clear_removes_everything() {
        let space = InMemoryDataSpace::new();
        let mut txn = space.begin();
        let id = txn.create(b"x").unwrap();
        txn.register_name("x", id).unwrap();
        txn.commit().unwrap();

        space.clear().unwrap();
        assert!(space.is_empty());
        assert_eq!(space.name_count(), 0);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn committed_values_read_back(values in proptest::collection::vec(
                proptest::collection::vec(any::<u8>(), 0..64), 1..20)) {
                let space = InMemoryDataSpace::new();
                let mut txn = space.begin();
                let ids: Vec<_> = values.iter().map(|v| txn.create(v).unwrap()).collect();
                txn.commit().unwrap();

                let mut reader = space.begin();
                for (id, value) in ids.iter().zip(&values) {
                    prop_assert_eq!(&reader.read(*id).unwrap(), value);
                }
                prop_assert_eq!(space.len(), values.len());
            }

            #[test]
            fn aborted_values_never_appear(values in proptest::collection::vec(
                proptest::collection::vec(any::<u8>(), 0..64), 1..20)) {
                let space = InMemoryDataSpace::new();
                let mut txn = space.begin();
                let ids: Vec<_> = values.iter().map(|v| txn.create(v).unwrap()).collect();
                txn.abort();

                let mut reader = space.begin();
                for id in ids {
                    prop_assert!(reader.read(id).unwrap_err().is_not_found());
                }
                prop_assert!(space.is_empty());
            }
        }
    }
}
