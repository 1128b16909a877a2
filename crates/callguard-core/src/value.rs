//! Runtime value representation.
//!
//! [`Value`] is what a [`CallFrame`](crate::frame::CallFrame) stores in its
//! local slots. Every value knows its exact concrete runtime type via
//! [`Value::type_id`]; that is the only type information the argument
//! checker ever compares.

use serde::{Deserialize, Serialize};

use crate::id::{ObjectId, UnitId};
use crate::type_id::TypeId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// An instance of a user-registered class.
    Instance { class: TypeId },
    /// A type object.
    Type(TypeId),
    /// Reference to a live function object.
    Function(ObjectId),
    /// Reference to a compiled unit.
    Unit(UnitId),
}

impl Value {
    /// The exact runtime type of this value (never a supertype).
    pub fn type_id(&self) -> TypeId {
        match self {
            Value::None => TypeId::NONE,
            Value::Bool(_) => TypeId::BOOL,
            Value::Int(_) => TypeId::INT,
            Value::Float(_) => TypeId::FLOAT,
            Value::Str(_) => TypeId::STR,
            Value::List(_) => TypeId::LIST,
            Value::Instance { class } => *class,
            Value::Type(_) => TypeId::TYPE,
            Value::Function(_) => TypeId::FUNCTION,
            Value::Unit(_) => TypeId::CODE,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}
