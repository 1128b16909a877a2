//! Error types for the argument checker.
//!
//! [`CheckError`] covers fatal configuration problems, which surface from
//! [`TypeChecker::enable`](crate::TypeChecker::enable) before any call is
//! intercepted. [`ContractFault`] covers contracts that cannot be checked;
//! these are per-call, recoverable and never abort the host.

use callguard_core::{ContextId, HostError};

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// The host offers no referrer query, so functions cannot be recovered
    /// from their compiled units.
    #[error("could not locate the required introspection capability: referrer query")]
    MissingReferrerQuery,

    /// A context already runs another instrumentation layer's hook.
    #[error("execution context {context} already has call hook '{existing}' installed")]
    HookConflict { context: ContextId, existing: String },

    #[error("type checking is not enabled")]
    NotEnabled,

    #[error("invalid value '{value}' for {key}")]
    InvalidConfig { key: String, value: String },

    #[error(transparent)]
    Host(#[from] HostError),
}

/// A contract that cannot be checked against the call's frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractFault {
    /// The contract names something that is not a local of the unit.
    #[error("contract names parameter '{param}', which is not a local of '{unit}'")]
    UnknownParameter { param: String, unit: String },

    /// The parameter's slot holds no value.
    #[error("parameter '{param}' (slot {slot}) is unbound")]
    UnboundLocal { param: String, slot: usize },

    /// The declared annotation is not a plain concrete type.
    #[error("unsupported contract for parameter '{param}': expected a type, found a {shape}")]
    UnsupportedAnnotation { param: String, shape: String },
}
