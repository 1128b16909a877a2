//! Argument checking: match declared contracts against the call's frame.
//!
//! Called by the interceptor at call entry, after the frame's argument slots
//! are bound but before the body runs. Pure: reads the contract table, the
//! unit's local names and the frame, nothing else.

use callguard_core::{CallFrame, CompiledUnit, FunctionObject, TypeNames};

use crate::contracts::{CheckOutcome, ContractViolation};
use crate::error::ContractFault;

/// Checks every declared contract of `function` against `frame`.
///
/// Entries are visited in declaration order. For each entry the parameter's
/// slot is located among `unit.varnames` by exact name, the argument is read
/// from that slot and its exact runtime type is compared with the declared
/// type by identity. Subclass instances do not match their base.
///
/// Stops at the first violation. Returns a [`ContractFault`] instead of a
/// verdict when an entry cannot be checked at all.
pub fn check_call(
    function: &FunctionObject,
    unit: &CompiledUnit,
    frame: &CallFrame,
    names: &dyn TypeNames,
) -> Result<CheckOutcome, ContractFault> {
    for (param, annotation) in function.contracts.iter() {
        let slot = unit
            .slot_of(param)
            .ok_or_else(|| ContractFault::UnknownParameter {
                param: param.to_string(),
                unit: unit.name.clone(),
            })?;

        let arg = frame.local(slot).ok_or_else(|| ContractFault::UnboundLocal {
            param: param.to_string(),
            slot,
        })?;

        let expected = annotation
            .as_concrete()
            .ok_or_else(|| ContractFault::UnsupportedAnnotation {
                param: param.to_string(),
                shape: annotation.shape().to_string(),
            })?;

        let actual = arg.type_id();
        if actual != expected {
            return Ok(CheckOutcome::Violation(ContractViolation {
                param: param.to_string(),
                expected,
                expected_name: names.type_name(expected),
                actual,
                actual_name: names.type_name(actual),
            }));
        }
    }

    Ok(CheckOutcome::Pass)
}
