//! # TSO Testkit
//!
//! Test utilities for the TSO object store.
//!
//! This crate provides:
//! - Store fixtures over in-memory and monitored data spaces
//! - Contention scenario helpers for threaded tests
//! - Stress runners that check no update is lost under contention
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use tso_testkit::prelude::*;
//!
//! let fixture = TestStore::memory();
//! let id = fixture.seed(5u32);
//! assert_eq!(fixture.read::<u32>(id), 5);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod scenarios;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::scenarios::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use scenarios::*;
pub use stress::*;
