//! # TSO Data Space
//!
//! The keyed byte store underneath the TSO object store.
//!
//! A data space durably maps opaque 64-bit [`ObjectId`]s to byte strings and
//! names to ids. Work is done through short transactional handles that can
//! create, read, write, destroy and lock individual ids, and then commit or
//! abort. The object store builds its whole locking protocol from these
//! primitives.
//!
//! ## Design Principles
//!
//! - Data spaces are opaque byte stores; they never interpret contents
//! - A commit is atomic; locks cover a single id and end with the handle's unit of work
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Data Spaces
//!
//! - [`InMemoryDataSpace`] - For tests and ephemeral worlds
//! - [`MonitoredDataSpace`] - Wrapper that traces and counts operations
//!
//! ## Example
//!
//! ```rust
//! use tso_dataspace::{DataSpace, InMemoryDataSpace};
//!
//! let space = InMemoryDataSpace::new();
//! let mut txn = space.begin();
//! let id = txn.create(b"sword").unwrap();
//! txn.register_name("armory:sword", id).unwrap();
//! txn.commit().unwrap();
//!
//! assert_eq!(txn.lookup_name("armory:sword").unwrap(), Some(id));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod id;
mod memory;
mod monitored;
mod space;

pub use error::{DataSpaceError, DataSpaceResult};
pub use id::ObjectId;
pub use memory::InMemoryDataSpace;
pub use monitored::{DataSpaceStats, MonitoredDataSpace};
pub use space::{DataSpace, DataSpaceTransaction};
