//! Contract violations and check outcomes.
//!
//! Contracts are checked at call entry, before the callee's body runs.
//! A violation carries everything needed to explain it: the offending
//! parameter, the declared type and the type actually passed.

pub mod check;

use callguard_core::TypeId;
use serde::{Deserialize, Serialize};

/// A parameter whose argument does not have exactly the declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractViolation {
    /// Name of the offending parameter.
    pub param: String,
    pub expected: TypeId,
    pub expected_name: String,
    pub actual: TypeId,
    pub actual_name: String,
}

impl ContractViolation {
    /// Human-readable message raised to the caller.
    pub fn message(&self) -> String {
        format!(
            "expected type '{}', got '{}' for parameter '{}'",
            self.expected_name, self.actual_name, self.param
        )
    }
}

/// Result of checking one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Pass,
    /// The first violation found, in contract declaration order.
    Violation(ContractViolation),
}

impl CheckOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, CheckOutcome::Pass)
    }
}
