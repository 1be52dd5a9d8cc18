//! # TSO Core
//!
//! Timestamp-ordered transactional object store.
//!
//! This crate provides:
//! - Serializable, exclusive access to shared game objects through
//!   [`Transaction::lock`]
//! - Priority-based conflict resolution: the older of two contenders
//!   interrupts the younger, so contention never deadlocks
//! - Per-object lock headers stored in the data space next to each payload
//! - Transaction deadlines: stale holds are taken over, and a freed object
//!   goes to its oldest waiter
//! - Named objects, creation and destruction within a transaction
//!
//! Everything is built from the read/write/lock/commit primitives of a
//! [`tso_dataspace::DataSpace`].
//!
//! ## Example
//!
//! ```rust
//! use tso_core::ObjectStore;
//! use tso_dataspace::InMemoryDataSpace;
//!
//! let store = ObjectStore::new(InMemoryDataSpace::new());
//!
//! let mut txn = store.new_transaction().unwrap();
//! let gold = txn.create(0u64, Some("treasury")).unwrap();
//! txn.commit().unwrap();
//!
//! loop {
//!     let mut txn = store.new_transaction().unwrap();
//!     match txn.lock::<u64>(gold) {
//!         Ok(balance) => *balance += 10,
//!         Err(e) if e.is_retryable() => continue,
//!         Err(e) => panic!("{e}"),
//!     }
//!     txn.commit().unwrap();
//!     break;
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod codec;
mod config;
mod error;
mod header;
mod registry;
mod stats;
mod store;
mod transaction;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use header::ObjectHeader;
pub use stats::StoreStats;
pub use store::ObjectStore;
pub use transaction::{Persistent, Transaction, TransactionState};
pub use tso_dataspace::ObjectId;
pub use types::{is_older, Priority, TransactionId};
