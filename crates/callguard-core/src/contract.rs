//! Declared parameter contracts.
//!
//! A [`ContractTable`] maps parameter names to the [`Annotation`] declared
//! for them, in declaration order. Only [`Annotation::Type`] describes a
//! checkable contract; the other shapes exist so hosts can hand over whatever
//! they found without the checker having to guess.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::type_id::TypeId;

/// The declared value of one contract entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Annotation {
    /// A plain concrete type. The only supported shape.
    Type(TypeId),
    /// A string forward reference, to be evaluated lazily.
    Forward(String),
    /// A parameterized construct such as `list[int]`.
    Generic {
        origin: TypeId,
        args: Vec<Annotation>,
    },
    /// A union of alternatives.
    Union(Vec<Annotation>),
    /// Anything else, described by the host.
    Opaque(String),
}

impl Annotation {
    /// Returns the concrete type if this annotation is one.
    pub fn as_concrete(&self) -> Option<TypeId> {
        match self {
            Annotation::Type(ty) => Some(*ty),
            _ => None,
        }
    }

    /// Short description of the annotation's shape, for diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            Annotation::Type(_) => "type",
            Annotation::Forward(_) => "forward reference",
            Annotation::Generic { .. } => "generic alias",
            Annotation::Union(_) => "union",
            Annotation::Opaque(_) => "opaque annotation",
        }
    }
}

/// Insertion-ordered mapping from parameter name to declared annotation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractTable {
    entries: IndexMap<String, Annotation>,
}

impl ContractTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert. A repeated name keeps its original position.
    pub fn with(mut self, param: impl Into<String>, annotation: Annotation) -> Self {
        self.insert(param, annotation);
        self
    }

    pub fn insert(&mut self, param: impl Into<String>, annotation: Annotation) {
        self.entries.insert(param.into(), annotation);
    }

    pub fn get(&self, param: &str) -> Option<&Annotation> {
        self.entries.get(param)
    }

    /// Entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Annotation)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Annotation)> for ContractTable {
    fn from_iter<I: IntoIterator<Item = (S, Annotation)>>(iter: I) -> Self {
        let mut table = ContractTable::new();
        for (param, annotation) in iter {
            table.insert(param, annotation);
        }
        table
    }
}
