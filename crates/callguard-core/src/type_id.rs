//! TypeId and TypeRegistry for nominal typing.
//!
//! Every runtime type has a unique [`TypeId`] providing O(1) identity
//! comparison. The [`TypeRegistry`] manages class registration and lookup,
//! pre-registering the builtin types on construction.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Unique identifier for a type in the type registry.
///
/// The inner value is an index into the [`TypeRegistry`]'s type vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeId(pub u32);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

/// Pre-registered TypeId constants for builtin types.
impl TypeId {
    pub const OBJECT: TypeId = TypeId(0);
    pub const NONE: TypeId = TypeId(1);
    pub const BOOL: TypeId = TypeId(2);
    pub const INT: TypeId = TypeId(3);
    pub const FLOAT: TypeId = TypeId(4);
    pub const STR: TypeId = TypeId(5);
    pub const LIST: TypeId = TypeId(6);
    pub const TYPE: TypeId = TypeId(7);
    pub const FUNCTION: TypeId = TypeId(8);
    pub const CODE: TypeId = TypeId(9);
}

/// A registered type: its display name and optional base class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    pub base: Option<TypeId>,
}

/// Registry of all types known to a host.
///
/// On construction, the registry pre-registers the builtins:
/// - `TypeId(0)` = object
/// - `TypeId(1)` = NoneType
/// - `TypeId(2)` = bool (base: int)
/// - `TypeId(3)` = int
/// - `TypeId(4)` = float
/// - `TypeId(5)` = str
/// - `TypeId(6)` = list
/// - `TypeId(7)` = type
/// - `TypeId(8)` = function
/// - `TypeId(9)` = code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeRegistry {
    /// Types indexed by TypeId.0
    types: Vec<TypeDef>,
    /// Name lookup for every registered type, builtins included.
    names: HashMap<String, TypeId>,
}

impl TypeRegistry {
    /// Number of builtin types pre-registered on construction.
    const BUILTIN_COUNT: u32 = 10;

    pub fn new() -> Self {
        let builtins: [(&str, Option<TypeId>); 10] = [
            ("object", None),
            ("NoneType", Some(TypeId::OBJECT)),
            ("bool", Some(TypeId::INT)),
            ("int", Some(TypeId::OBJECT)),
            ("float", Some(TypeId::OBJECT)),
            ("str", Some(TypeId::OBJECT)),
            ("list", Some(TypeId::OBJECT)),
            ("type", Some(TypeId::OBJECT)),
            ("function", Some(TypeId::OBJECT)),
            ("code", Some(TypeId::OBJECT)),
        ];

        let mut types = Vec::with_capacity(builtins.len());
        let mut names = HashMap::new();
        for (idx, (name, base)) in builtins.into_iter().enumerate() {
            names.insert(name.to_string(), TypeId(idx as u32));
            types.push(TypeDef {
                name: name.to_string(),
                base,
            });
        }
        debug_assert_eq!(types.len() as u32, Self::BUILTIN_COUNT);

        TypeRegistry { types, names }
    }

    /// Registers a named class, returning its [`TypeId`].
    ///
    /// `base` defaults to `object`. Returns [`CoreError::DuplicateTypeName`]
    /// if the name is taken and [`CoreError::TypeNotFound`] if the base is
    /// not registered.
    pub fn register_class(
        &mut self,
        name: &str,
        base: Option<TypeId>,
    ) -> Result<TypeId, CoreError> {
        if self.names.contains_key(name) {
            return Err(CoreError::DuplicateTypeName {
                name: name.to_string(),
            });
        }
        let base = base.unwrap_or(TypeId::OBJECT);
        if self.get(base).is_none() {
            return Err(CoreError::TypeNotFound { id: base });
        }

        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeDef {
            name: name.to_string(),
            base: Some(base),
        });
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn get(&self, id: TypeId) -> Option<&TypeDef> {
        self.types.get(id.0 as usize)
    }

    pub fn get_by_name(&self, name: &str) -> Option<TypeId> {
        self.names.get(name).copied()
    }

    /// Display name of a type, or a placeholder for unknown ids.
    pub fn name(&self, id: TypeId) -> String {
        match self.get(id) {
            Some(def) => def.name.clone(),
            None => format!("<unknown {}>", id),
        }
    }

    /// Returns `true` if `ty` is `ancestor` or derives from it.
    pub fn is_subclass(&self, ty: TypeId, ancestor: TypeId) -> bool {
        let mut current = Some(ty);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.get(id).and_then(|def| def.base);
        }
        false
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_registry_has_builtins() {
        let reg = TypeRegistry::new();
        assert_eq!(reg.len(), 10);
        assert_eq!(reg.get_by_name("int"), Some(TypeId::INT));
        assert_eq!(reg.get_by_name("NoneType"), Some(TypeId::NONE));
        assert_eq!(reg.name(TypeId::STR), "str");
        assert_eq!(reg.name(TypeId::CODE), "code");
    }

    #[test]
    fn register_class_returns_unique_ids() {
        let mut reg = TypeRegistry::new();
        let animal = reg.register_class("Animal", None).unwrap();
        let dog = reg.register_class("Dog", Some(animal)).unwrap();

        assert_ne!(animal, dog);
        assert_eq!(animal, TypeId(10)); // First after builtins
        assert_eq!(reg.get(dog).unwrap().base, Some(animal));
        assert_eq!(reg.get(animal).unwrap().base, Some(TypeId::OBJECT));
    }

    #[test]
    fn duplicate_name_returns_error() {
        let mut reg = TypeRegistry::new();
        let result = reg.register_class("int", None);
        match result {
            Err(CoreError::DuplicateTypeName { name }) => assert_eq!(name, "int"),
            other => panic!("expected DuplicateTypeName error, got {:?}", other),
        }
    }

    #[test]
    fn unknown_base_returns_error() {
        let mut reg = TypeRegistry::new();
        let result = reg.register_class("Orphan", Some(TypeId(99)));
        assert!(matches!(result, Err(CoreError::TypeNotFound { id }) if id == TypeId(99)));
    }

    #[test]
    fn subclass_walks_base_chain() {
        let mut reg = TypeRegistry::new();
        let animal = reg.register_class("Animal", None).unwrap();
        let dog = reg.register_class("Dog", Some(animal)).unwrap();

        assert!(reg.is_subclass(dog, animal));
        assert!(reg.is_subclass(dog, TypeId::OBJECT));
        assert!(!reg.is_subclass(animal, dog));
        assert!(reg.is_subclass(TypeId::BOOL, TypeId::INT));
    }

    #[test]
    fn unknown_type_name_is_placeholder() {
        let reg = TypeRegistry::new();
        assert_eq!(reg.name(TypeId(500)), "<unknown TypeId(500)>");
    }
}
