//! Errors for misuse of the runtime's object graph.
//!
//! Call-time failures do not use this type; they travel through
//! [`CallError`](callguard_core::CallError) like any other raised error.

use callguard_core::{CoreError, ObjectId, UnitId};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("compiled unit not found: {unit}")]
    UnitNotFound { unit: UnitId },

    #[error("object not found: {object}")]
    ObjectNotFound { object: ObjectId },

    /// A unit cannot be destroyed while live objects still reference it.
    #[error("compiled unit {unit} is still referenced by {referrers} object(s)")]
    UnitInUse { unit: UnitId, referrers: usize },

    /// A unit cannot be destroyed while calls are still executing it.
    #[error("compiled unit {unit} is executing in {calls} call(s)")]
    UnitExecuting { unit: UnitId, calls: usize },

    #[error("object {object} is not a function")]
    NotAFunction { object: ObjectId },

    #[error(transparent)]
    Types(#[from] CoreError),
}
