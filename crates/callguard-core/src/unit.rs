//! Compiled units: the shared, immutable description of one function body.

use serde::{Deserialize, Serialize};

use crate::id::UnitId;

/// Host-owned executable description of a function body.
///
/// Produced once per function definition and shared by every function object
/// instantiated from it. `varnames` lists parameters first (the first
/// `arg_count` entries), then the remaining locals; frame slots are indexed
/// by position in this list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledUnit {
    pub id: UnitId,
    pub name: String,
    pub arg_count: usize,
    pub varnames: Vec<String>,
}

impl CompiledUnit {
    pub fn new(id: UnitId, name: impl Into<String>, params: &[&str], locals: &[&str]) -> Self {
        let varnames = params
            .iter()
            .chain(locals.iter())
            .map(|s| s.to_string())
            .collect();
        CompiledUnit {
            id,
            name: name.into(),
            arg_count: params.len(),
            varnames,
        }
    }

    /// Slot index of a local by exact name.
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.varnames.iter().position(|v| v == name)
    }

    pub fn params(&self) -> &[String] {
        &self.varnames[..self.arg_count]
    }

    pub fn slot_count(&self) -> usize {
        self.varnames.len()
    }
}
