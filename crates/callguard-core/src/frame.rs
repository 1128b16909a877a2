//! Per-invocation call frames.

use smallvec::SmallVec;

use crate::id::UnitId;
use crate::unit::CompiledUnit;
use crate::value::Value;

/// Local-variable storage for one in-flight call of a compiled unit.
///
/// Slots are positional and line up with [`CompiledUnit::varnames`]. Slots
/// that have not been bound yet hold `None`.
#[derive(Debug, Clone)]
pub struct CallFrame {
    pub unit: UnitId,
    locals: SmallVec<[Option<Value>; 8]>,
}

impl CallFrame {
    /// Creates a frame for `unit` with the leading slots bound to `args`.
    ///
    /// Arity is the host's concern; extra arguments beyond the slot count
    /// are ignored here.
    pub fn new(unit: &CompiledUnit, args: Vec<Value>) -> Self {
        let mut locals: SmallVec<[Option<Value>; 8]> =
            SmallVec::from_elem(None, unit.slot_count());
        for (slot, arg) in locals.iter_mut().zip(args) {
            *slot = Some(arg);
        }
        CallFrame {
            unit: unit.id,
            locals,
        }
    }

    /// Value in slot `index`. `None` if the slot is unbound or out of range.
    pub fn local(&self, index: usize) -> Option<&Value> {
        self.locals.get(index).and_then(|v| v.as_ref())
    }

    pub fn set_local(&mut self, index: usize, value: Value) -> bool {
        match self.locals.get_mut(index) {
            Some(slot) => {
                *slot = Some(value);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.locals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locals.is_empty()
    }
}
