//! Function objects: live, callable instantiations of a compiled unit.
//!
//! Several [`FunctionObject`]s may share one [`UnitId`] (closures, rebinding).
//! Each carries its own [`ContractTable`]. Function objects are shared through
//! `Arc`; holding an `Arc<FunctionObject>` is what keeps one alive.

use serde::{Deserialize, Serialize};

use crate::contract::{Annotation, ContractTable};
use crate::id::{ObjectId, UnitId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionObject {
    pub id: ObjectId,
    pub name: String,
    /// The compiled unit this function executes.
    pub unit: UnitId,
    /// Declared parameter contracts, in declaration order.
    pub contracts: ContractTable,
    /// Declared return annotation. Carried, never validated.
    pub returns: Option<Annotation>,
}

impl FunctionObject {
    /// Creates a function with no declared contracts.
    pub fn new(id: ObjectId, name: impl Into<String>, unit: UnitId) -> Self {
        FunctionObject {
            id,
            name: name.into(),
            unit,
            contracts: ContractTable::new(),
            returns: None,
        }
    }

    pub fn with_contracts(mut self, contracts: ContractTable) -> Self {
        self.contracts = contracts;
        self
    }

    pub fn with_returns(mut self, returns: Annotation) -> Self {
        self.returns = Some(returns);
        self
    }

    /// Returns `true` if any parameter contract is declared.
    pub fn has_contracts(&self) -> bool {
        !self.contracts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_id::TypeId;

    #[test]
    fn plain_function_has_no_contracts() {
        let f = FunctionObject::new(ObjectId(1), "add", UnitId(4));
        assert_eq!(f.unit, UnitId(4));
        assert!(!f.has_contracts());
        assert!(f.returns.is_none());
    }

    #[test]
    fn return_annotation_is_not_a_parameter_contract() {
        let f = FunctionObject::new(ObjectId(1), "f", UnitId(1))
            .with_returns(Annotation::Type(TypeId::INT));
        assert!(!f.has_contracts());
    }

    #[test]
    fn contracts_attach() {
        let f = FunctionObject::new(ObjectId(2), "g", UnitId(1)).with_contracts(
            ContractTable::new().with("x", Annotation::Type(TypeId::INT)),
        );
        assert!(f.has_contracts());
        assert_eq!(f.contracts.len(), 1);
    }
}
