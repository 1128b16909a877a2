//! Core error types for callguard-core.
//!
//! Uses `thiserror` for structured, matchable error variants:
//! [`CoreError`] for registry misuse, [`HostError`] for failures at the host
//! boundary, and [`CallError`] for the host's call-time error channel.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::{ContextId, ObserverSlot, UnitId};
use crate::type_id::TypeId;

/// Errors produced by the core data model.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Attempting to register a type name that already exists in the registry.
    #[error("duplicate type name: '{name}'")]
    DuplicateTypeName { name: String },

    /// A TypeId was not found in the type registry.
    #[error("type not found: TypeId({id})", id = id.0)]
    TypeNotFound { id: TypeId },
}

/// Failures reported by a host through the boundary traits.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum HostError {
    /// All per-unit auxiliary storage slots are taken.
    #[error("all {limit} unit observer slots are in use")]
    SlotsExhausted { limit: usize },

    #[error("unknown execution context: {context}")]
    UnknownContext { context: ContextId },

    #[error("unknown compiled unit: {unit}")]
    UnknownUnit { unit: UnitId },

    #[error("unknown observer slot: {slot}")]
    UnknownObserver { slot: ObserverSlot },

    /// A host query ran but failed.
    #[error("host query failed: {reason}")]
    Query { reason: String },
}

/// Category of a call-time error, mirroring the host's exception kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    TypeError,
    RuntimeError,
}

/// An error raised from call execution.
///
/// This is the single channel through which both host failures and contract
/// violations reach calling code; callers distinguish them by kind and
/// message only.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct CallError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CallError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        CallError {
            kind,
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    pub fn runtime_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RuntimeError, message)
    }
}
