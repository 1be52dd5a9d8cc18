//! Timestamp-ordered transactions.
//!
//! A [`Transaction`] gives exclusive, serializable access to the objects it
//! locks. Contention is resolved by priority: a transaction that finds an
//! object held waits for it, and if it is older than the holder it first
//! interrupts the holder, which then aborts and releases everything. The
//! oldest contender for any object therefore never waits on a younger one
//! for long, and no set of transactions can deadlock.
//!
//! When an object frees up, whichever contender reads its header first
//! hands it to the oldest live waiter rather than keeping it. Every hold
//! also carries its owner's deadline. Once that passes, a contender takes
//! the object over, so a transaction that vanished without finishing
//! cannot block an object forever.
//!
//! Each transaction drives two data space handles:
//! - **main** carries the application's creates, writes and destroys and
//!   spans the whole transaction
//! - **key** carries header bookkeeping only; every use of it is one short
//!   lock/read/write/commit step so lock state is visible to others at once

mod cache;
mod handle;
mod lock;
mod release;
mod state;

pub use cache::Persistent;
pub use handle::Transaction;
pub use state::TransactionState;
