//! Data space trait definitions.

use crate::error::DataSpaceResult;
use crate::ObjectId;

/// A persistent key/value byte store with short transactional handles.
///
/// A data space maps [`ObjectId`]s to opaque byte strings and names to ids.
/// It knows nothing about headers, owners or payload encodings; the object
/// store builds all of that on top of these primitives.
///
/// # Invariants
///
/// - Changes made through a [`DataSpaceTransaction`] become visible to other
///   handles only when that handle commits
/// - A single commit is applied atomically
/// - Implementations must be `Send + Sync` for concurrent access
pub trait DataSpace: Send + Sync {
    /// Opens a new transactional handle.
    fn begin(&self) -> Box<dyn DataSpaceTransaction>;

    /// Removes every object and name binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be cleared.
    fn clear(&self) -> DataSpaceResult<()>;
}

/// A handle performing one unit of work at a time against a [`DataSpace`].
///
/// The handle is reusable: after [`commit`](Self::commit) or
/// [`abort`](Self::abort) it starts a fresh, empty unit of work. Locks taken
/// with [`lock`](Self::lock) are held until the current unit ends.
pub trait DataSpaceTransaction: Send {
    /// Creates a new object and returns its freshly assigned id.
    fn create(&mut self, data: &[u8]) -> DataSpaceResult<ObjectId>;

    /// Reads an object's bytes.
    ///
    /// Sees committed state overlaid with this handle's pending changes.
    ///
    /// # Errors
    ///
    /// Returns [`NotFound`](crate::DataSpaceError::NotFound) if the object
    /// does not exist.
    fn read(&mut self, id: ObjectId) -> DataSpaceResult<Vec<u8>>;

    /// Replaces an object's bytes.
    fn write(&mut self, id: ObjectId, data: &[u8]) -> DataSpaceResult<()>;

    /// Destroys an object.
    fn destroy(&mut self, id: ObjectId) -> DataSpaceResult<()>;

    /// Takes an exclusive lock on a single id, blocking while another handle
    /// holds it. Re-locking an id already held by this handle is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`NotFound`](crate::DataSpaceError::NotFound) if the object
    /// does not exist.
    fn lock(&mut self, id: ObjectId) -> DataSpaceResult<()>;

    /// Binds a name to an id.
    fn register_name(&mut self, name: &str, id: ObjectId) -> DataSpaceResult<()>;

    /// Looks up the id bound to a name.
    fn lookup_name(&mut self, name: &str) -> DataSpaceResult<Option<ObjectId>>;

    /// Applies all pending changes atomically and releases held locks.
    fn commit(&mut self) -> DataSpaceResult<()>;

    /// Discards all pending changes and releases held locks.
    fn abort(&mut self);
}
