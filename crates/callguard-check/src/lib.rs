//! Runtime argument contract checking.
//!
//! Intercepts every call made through a host's execution contexts, recovers
//! the called function from its compiled unit, and refuses the call with a
//! `TypeError` when an argument's exact runtime type differs from the type
//! declared for its parameter.
//!
//! # Architecture
//!
//! The host only hands the hook a compiled unit and a frame. Recovering the
//! function object (and its contracts) takes a referrer scan, so each unit is
//! resolved once and the outcome cached until the host destroys the unit:
//! - **Resolution** walks the unit's referrers for the first function.
//! - **Caching** is write-once per unit, including a negative entry for
//!   ownerless units.
//! - **Checking** compares exact type identity, never subtyping.
//!
//! # Modules
//!
//! - [`cache`]: ResolutionCache keyed by unit, released on destruction
//! - [`config`]: CheckerConfig and the unsupported-contract policy
//! - [`contracts`]: check_call, ContractViolation and CheckOutcome
//! - [`error`]: CheckError and ContractFault
//! - [`interceptor`]: TypeCheckHook, the installed call hook
//! - [`lifecycle`]: TypeChecker enable/disable
//! - [`resolver`]: unit-to-function resolution via referrer queries

pub mod cache;
pub mod config;
pub mod contracts;
pub mod error;
pub mod interceptor;
pub mod lifecycle;
pub mod resolver;

pub use cache::{CacheEntry, ResolutionCache};
pub use config::{CheckerConfig, UnsupportedPolicy};
pub use contracts::check::check_call;
pub use contracts::{CheckOutcome, ContractViolation};
pub use error::{CheckError, ContractFault};
pub use interceptor::{StatsSnapshot, TypeCheckHook, HOOK_NAME};
pub use lifecycle::TypeChecker;
pub use resolver::Resolver;
