//! The boundary between a host runtime and the argument checker.
//!
//! A host implements [`Host`] and hands out the narrow capabilities the
//! checker consumes: a referrer query over its object graph, type names,
//! per-unit destruction notifications, and one call hook slot per execution
//! context. The checker in turn implements [`CallHook`] and
//! [`UnitObserver`].

use std::sync::Arc;

use crate::error::{CallError, HostError};
use crate::function::FunctionObject;
use crate::frame::CallFrame;
use crate::id::{ContextId, ObjectId, ObserverSlot, UnitId};
use crate::type_id::TypeId;
use crate::unit::CompiledUnit;
use crate::value::Value;

/// A live object holding a direct reference to a queried object.
#[derive(Debug, Clone)]
pub enum Referrer {
    /// A function object. Cloning the `Arc` acquires an owning reference.
    Function(Arc<FunctionObject>),
    /// Any other referrer (containers, frames, tuples).
    Other(ObjectId),
}

/// Reverse-reference lookup over the host's live object graph.
pub trait ReferrerQuery: Send + Sync {
    /// All live objects directly referencing `unit`, in host order.
    fn find_referrers(&self, unit: UnitId) -> Result<Vec<Referrer>, HostError>;
}

/// Display names for runtime types.
pub trait TypeNames: Send + Sync {
    fn type_name(&self, ty: TypeId) -> String;
}

/// Receives a callback when a compiled unit is destroyed.
pub trait UnitObserver: Send + Sync {
    fn on_unit_destroyed(&self, unit: UnitId);
}

/// The host's normal call execution routine.
pub trait DefaultCall {
    fn execute(&self, unit: &CompiledUnit, frame: &mut CallFrame) -> Result<Value, CallError>;
}

/// A replacement for the default call execution step of a context.
///
/// Implementations must either delegate to `next` or return an error without
/// running the callee.
pub trait CallHook: Send + Sync {
    /// Stable name identifying the hook's owner.
    fn name(&self) -> &str;

    fn on_call(
        &self,
        unit: &CompiledUnit,
        frame: &mut CallFrame,
        next: &dyn DefaultCall,
    ) -> Result<Value, CallError>;
}

/// Everything a host exposes to the checker's enable/disable lifecycle.
pub trait Host {
    /// The referrer capability, if the host has one.
    fn referrer_query(&self) -> Option<Arc<dyn ReferrerQuery>>;

    fn type_names(&self) -> Arc<dyn TypeNames>;

    /// Reserves one per-unit auxiliary storage slot for `observer`.
    fn register_unit_observer(
        &self,
        observer: Arc<dyn UnitObserver>,
    ) -> Result<ObserverSlot, HostError>;

    fn unregister_unit_observer(&self, slot: ObserverSlot) -> Result<(), HostError>;

    /// Every execution context currently known to the host.
    fn contexts(&self) -> Vec<ContextId>;

    /// The hook installed on `context`; `None` means default execution.
    fn call_hook(&self, context: ContextId) -> Result<Option<Arc<dyn CallHook>>, HostError>;

    fn set_call_hook(
        &self,
        context: ContextId,
        hook: Option<Arc<dyn CallHook>>,
    ) -> Result<(), HostError>;
}
