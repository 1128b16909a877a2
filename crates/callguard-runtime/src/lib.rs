//! In-memory reference host for the callguard argument checker.
//!
//! Provides a [`Runtime`] implementing [`callguard_core::Host`]: a live
//! object graph of compiled units, function objects and containers, a type
//! registry, per-unit observer slots and execution contexts with one call
//! hook each.
//!
//! # Modules
//!
//! - [`error`]: RuntimeError for object-graph misuse
//! - `heap`: the petgraph-backed object graph and its referrer query
//! - [`state`]: Runtime, RuntimeConfig and the call path

pub mod error;
mod heap;
pub mod state;

pub use error::RuntimeError;
pub use heap::{Body, HeapReferrers};
pub use state::{Runtime, RuntimeConfig};
