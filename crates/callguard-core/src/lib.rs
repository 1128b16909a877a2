pub mod contract;
pub mod error;
pub mod frame;
pub mod function;
pub mod host;
pub mod id;
pub mod type_id;
pub mod unit;
pub mod value;

// Re-export commonly used types
pub use contract::{Annotation, ContractTable};
pub use error::{CallError, CoreError, ErrorKind, HostError};
pub use frame::CallFrame;
pub use function::FunctionObject;
pub use host::{CallHook, DefaultCall, Host, Referrer, ReferrerQuery, TypeNames, UnitObserver};
pub use id::{ContextId, ObjectId, ObserverSlot, UnitId};
pub use type_id::{TypeDef, TypeId, TypeRegistry};
pub use unit::CompiledUnit;
pub use value::Value;
