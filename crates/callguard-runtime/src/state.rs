//! The in-memory reference host.
//!
//! [`Runtime`] owns the object graph, the type registry, the registered unit
//! observers and a set of execution contexts. Each context has one call hook
//! slot: empty means calls run through the default executor, otherwise every
//! call of that context is handed to the hook first.
//!
//! The call path knows which function object it is invoking, but a hook only
//! ever receives the compiled unit and the frame. Hooks that need the
//! function have to recover it through the referrer query.

use std::cell::Cell;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use callguard_core::{
    CallError, CallFrame, CallHook, CompiledUnit, ContextId, ContractTable, DefaultCall,
    FunctionObject, Host, HostError, ObjectId, ObserverSlot, ReferrerQuery, TypeId, TypeNames,
    TypeRegistry, UnitId, UnitObserver, Value,
};

use crate::error::RuntimeError;
use crate::heap::{Body, Heap, HeapNode, HeapReferrers};

/// Configuration for the runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of per-unit observer slots. Default: 255.
    pub max_observers: usize,
    /// Maximum nested call depth per thread. Default: 256.
    pub max_call_depth: usize,
    /// Whether the referrer query capability is offered. Default: true.
    pub referrer_query: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            max_observers: 255,
            max_call_depth: 256,
            referrer_query: true,
        }
    }
}

#[derive(Default)]
struct ContextState {
    hook: Option<Arc<dyn CallHook>>,
}

thread_local! {
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Decrements the thread's call depth when a call finishes.
struct DepthGuard;

impl DepthGuard {
    fn enter(limit: usize) -> Result<DepthGuard, CallError> {
        CALL_DEPTH.with(|depth| {
            if depth.get() >= limit {
                return Err(CallError::runtime_error(format!(
                    "maximum call depth ({}) exceeded",
                    limit
                )));
            }
            depth.set(depth.get() + 1);
            Ok(DepthGuard)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        CALL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Default call execution: runs the unit's native body.
struct DefaultExecutor {
    body: Body,
}

impl DefaultCall for DefaultExecutor {
    fn execute(&self, _unit: &CompiledUnit, frame: &mut CallFrame) -> Result<Value, CallError> {
        (self.body)(frame)
    }
}

struct RegistryNames {
    types: Arc<RwLock<TypeRegistry>>,
}

impl TypeNames for RegistryNames {
    fn type_name(&self, ty: TypeId) -> String {
        self.types.read().name(ty)
    }
}

/// An in-memory host runtime.
pub struct Runtime {
    config: RuntimeConfig,
    heap: Arc<RwLock<Heap>>,
    types: Arc<RwLock<TypeRegistry>>,
    observers: RwLock<Vec<Option<Arc<dyn UnitObserver>>>>,
    contexts: RwLock<Vec<ContextState>>,
}

impl Runtime {
    /// Creates a runtime with a single execution context, `ContextId(0)`.
    pub fn new(config: RuntimeConfig) -> Self {
        Runtime {
            config,
            heap: Arc::new(RwLock::new(Heap::default())),
            types: Arc::new(RwLock::new(TypeRegistry::new())),
            observers: RwLock::new(Vec::new()),
            contexts: RwLock::new(vec![ContextState::default()]),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Types
    // -----------------------------------------------------------------------

    pub fn register_class(
        &self,
        name: &str,
        base: Option<TypeId>,
    ) -> Result<TypeId, RuntimeError> {
        Ok(self.types.write().register_class(name, base)?)
    }

    pub fn type_by_name(&self, name: &str) -> Option<TypeId> {
        self.types.read().get_by_name(name)
    }

    pub fn type_name(&self, ty: TypeId) -> String {
        self.types.read().name(ty)
    }

    pub fn is_subclass(&self, ty: TypeId, ancestor: TypeId) -> bool {
        self.types.read().is_subclass(ty, ancestor)
    }

    // -----------------------------------------------------------------------
    // Object graph
    // -----------------------------------------------------------------------

    /// Compiles a unit without binding any function object to it.
    pub fn define_unit(
        &self,
        name: &str,
        params: &[&str],
        locals: &[&str],
        body: Body,
    ) -> Arc<CompiledUnit> {
        let unit = self.heap.write().add_unit(name, params, locals, body);
        debug!(unit = %unit.id, name, "defined compiled unit");
        unit
    }

    /// Compiles a unit and binds a function object carrying `contracts` to it.
    pub fn define_function(
        &self,
        name: &str,
        params: &[&str],
        contracts: ContractTable,
        body: Body,
    ) -> Arc<FunctionObject> {
        let function = self
            .heap
            .write()
            .add_unit_with_function(name, params, contracts, body);
        debug!(unit = %function.unit, function = %function.id, name, "defined function");
        function
    }

    /// Binds an additional function object to an existing unit.
    pub fn bind_function(
        &self,
        unit: UnitId,
        name: &str,
        contracts: ContractTable,
    ) -> Result<Arc<FunctionObject>, RuntimeError> {
        let function = self.heap.write().add_function(unit, name, contracts)?;
        debug!(unit = %unit, function = %function.id, "bound function to existing unit");
        Ok(function)
    }

    /// Creates a non-function object referencing the given units/functions.
    pub fn add_container(&self, label: &str, refs: &[Value]) -> Result<ObjectId, RuntimeError> {
        self.heap.write().add_container(label, refs)
    }

    /// Removes a function object from the graph.
    pub fn drop_function(&self, object: ObjectId) -> Result<(), RuntimeError> {
        let mut heap = self.heap.write();
        heap.function(object)?;
        heap.remove_object(object)?;
        Ok(())
    }

    pub fn drop_container(&self, object: ObjectId) -> Result<(), RuntimeError> {
        if let HeapNode::Container { id, label } = self.heap.write().remove_object(object)? {
            debug!(object = %id, label = %label, "dropped container");
        }
        Ok(())
    }

    /// Destroys a compiled unit that nothing references any more and
    /// notifies every registered observer.
    ///
    /// Observers run after the graph lock is released.
    pub fn destroy_unit(&self, unit: UnitId) -> Result<(), RuntimeError> {
        self.heap.write().remove_unit(unit)?;
        debug!(unit = %unit, "destroyed compiled unit");

        let observers: Vec<Arc<dyn UnitObserver>> =
            self.observers.read().iter().flatten().cloned().collect();
        for observer in observers {
            observer.on_unit_destroyed(unit);
        }
        Ok(())
    }

    pub fn unit(&self, unit: UnitId) -> Option<Arc<CompiledUnit>> {
        self.heap.read().unit(unit)
    }

    pub fn function(&self, object: ObjectId) -> Result<Arc<FunctionObject>, RuntimeError> {
        self.heap.read().function(object)
    }

    pub fn live_units(&self) -> usize {
        self.heap.read().live_units()
    }

    pub fn live_objects(&self) -> usize {
        self.heap.read().live_objects()
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Adds an execution context with default call execution.
    pub fn new_context(&self) -> ContextId {
        let mut contexts = self.contexts.write();
        contexts.push(ContextState::default());
        ContextId((contexts.len() - 1) as u32)
    }

    /// Calls `function` with positional `args` in `context`.
    pub fn call(
        &self,
        context: ContextId,
        function: &FunctionObject,
        args: Vec<Value>,
    ) -> Result<Value, CallError> {
        self.call_unit(context, function.unit, args)
    }

    /// Executes a compiled unit directly, as hosts do for module bodies or
    /// `exec` of a bare code object.
    pub fn call_unit(
        &self,
        context: ContextId,
        unit: UnitId,
        args: Vec<Value>,
    ) -> Result<Value, CallError> {
        let (compiled, body, _active) = self
            .heap
            .read()
            .enter(unit)
            .ok_or_else(|| {
                CallError::runtime_error(format!("compiled unit {} no longer exists", unit))
            })?;

        if args.len() != compiled.arg_count {
            return Err(CallError::type_error(format!(
                "{}() takes {} positional argument(s) but {} were given",
                compiled.name,
                compiled.arg_count,
                args.len()
            )));
        }

        let hook = self
            .contexts
            .read()
            .get(context.0 as usize)
            .map(|state| state.hook.clone())
            .ok_or_else(|| {
                CallError::runtime_error(format!("unknown execution context {}", context))
            })?;

        let _depth = DepthGuard::enter(self.config.max_call_depth)?;
        let mut frame = CallFrame::new(&compiled, args);
        let executor = DefaultExecutor { body };

        match hook {
            Some(hook) => hook.on_call(&compiled, &mut frame, &executor),
            None => executor.execute(&compiled, &mut frame),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl Host for Runtime {
    fn referrer_query(&self) -> Option<Arc<dyn ReferrerQuery>> {
        if !self.config.referrer_query {
            return None;
        }
        Some(Arc::new(HeapReferrers {
            heap: Arc::clone(&self.heap),
        }))
    }

    fn type_names(&self) -> Arc<dyn TypeNames> {
        Arc::new(RegistryNames {
            types: Arc::clone(&self.types),
        })
    }

    fn register_unit_observer(
        &self,
        observer: Arc<dyn UnitObserver>,
    ) -> Result<ObserverSlot, HostError> {
        let mut observers = self.observers.write();
        if let Some(free) = observers.iter().position(Option::is_none) {
            observers[free] = Some(observer);
            return Ok(ObserverSlot(free as u32));
        }
        if observers.len() >= self.config.max_observers {
            return Err(HostError::SlotsExhausted {
                limit: self.config.max_observers,
            });
        }
        observers.push(Some(observer));
        Ok(ObserverSlot((observers.len() - 1) as u32))
    }

    fn unregister_unit_observer(&self, slot: ObserverSlot) -> Result<(), HostError> {
        let mut observers = self.observers.write();
        match observers.get_mut(slot.0 as usize) {
            Some(entry @ Some(_)) => {
                *entry = None;
                Ok(())
            }
            _ => Err(HostError::UnknownObserver { slot }),
        }
    }

    fn contexts(&self) -> Vec<ContextId> {
        (0..self.contexts.read().len())
            .map(|idx| ContextId(idx as u32))
            .collect()
    }

    fn call_hook(&self, context: ContextId) -> Result<Option<Arc<dyn CallHook>>, HostError> {
        self.contexts
            .read()
            .get(context.0 as usize)
            .map(|state| state.hook.clone())
            .ok_or(HostError::UnknownContext { context })
    }

    fn set_call_hook(
        &self,
        context: ContextId,
        hook: Option<Arc<dyn CallHook>>,
    ) -> Result<(), HostError> {
        let mut contexts = self.contexts.write();
        let state = contexts
            .get_mut(context.0 as usize)
            .ok_or(HostError::UnknownContext { context })?;
        state.hook = hook;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use callguard_core::{ErrorKind, Referrer};

    fn echo_first() -> Body {
        Arc::new(|frame: &CallFrame| Ok(frame.local(0).cloned().unwrap_or(Value::None)))
    }

    struct Counting {
        seen: AtomicUsize,
    }

    impl UnitObserver for Counting {
        fn on_unit_destroyed(&self, _unit: UnitId) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Refuse;

    impl CallHook for Refuse {
        fn name(&self) -> &str {
            "refuse"
        }

        fn on_call(
            &self,
            unit: &CompiledUnit,
            _frame: &mut CallFrame,
            _next: &dyn DefaultCall,
        ) -> Result<Value, CallError> {
            Err(CallError::runtime_error(format!("refused {}", unit.name)))
        }
    }

    #[test]
    fn config_default_values() {
        let config = RuntimeConfig::default();
        assert_eq!(config.max_observers, 255);
        assert_eq!(config.max_call_depth, 256);
        assert!(config.referrer_query);
    }

    #[test]
    fn default_call_runs_body() {
        let rt = Runtime::default();
        let f = rt.define_function("echo", &["x"], ContractTable::new(), echo_first());
        let result = rt.call(ContextId(0), &f, vec![Value::Int(5)]).unwrap();
        assert_eq!(result, Value::Int(5));
    }

    #[test]
    fn arity_mismatch_is_type_error() {
        let rt = Runtime::default();
        let f = rt.define_function("echo", &["x"], ContractTable::new(), echo_first());
        let err = rt.call(ContextId(0), &f, vec![]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
        assert_eq!(err.message, "echo() takes 1 positional argument(s) but 0 were given");
    }

    #[test]
    fn hook_replaces_default_execution() {
        let rt = Runtime::default();
        let f = rt.define_function("echo", &["x"], ContractTable::new(), echo_first());
        rt.set_call_hook(ContextId(0), Some(Arc::new(Refuse))).unwrap();

        let err = rt.call(ContextId(0), &f, vec![Value::Int(1)]).unwrap_err();
        assert_eq!(err.message, "refused echo");

        // Other contexts are untouched.
        let other = rt.new_context();
        assert_eq!(rt.call(other, &f, vec![Value::Int(1)]).unwrap(), Value::Int(1));
    }

    #[test]
    fn unknown_context_is_rejected() {
        let rt = Runtime::default();
        let f = rt.define_function("echo", &["x"], ContractTable::new(), echo_first());
        assert!(rt.call(ContextId(4), &f, vec![Value::Int(1)]).is_err());
        assert!(matches!(
            rt.call_hook(ContextId(4)),
            Err(HostError::UnknownContext { .. })
        ));
    }

    #[test]
    fn referrer_query_can_be_withheld() {
        let rt = Runtime::new(RuntimeConfig {
            referrer_query: false,
            ..RuntimeConfig::default()
        });
        assert!(rt.referrer_query().is_none());
    }

    #[test]
    fn referrer_query_finds_bound_functions() {
        let rt = Runtime::default();
        let f = rt.define_function("f", &[], ContractTable::new(), echo_first());
        let g = rt.bind_function(f.unit, "g", ContractTable::new()).unwrap();

        let query = rt.referrer_query().unwrap();
        let ids: Vec<ObjectId> = query
            .find_referrers(f.unit)
            .unwrap()
            .into_iter()
            .filter_map(|r| match r {
                Referrer::Function(func) => Some(func.id),
                Referrer::Other(_) => None,
            })
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&f.id) && ids.contains(&g.id));
    }

    #[test]
    fn destroy_unit_notifies_observers() {
        let rt = Runtime::default();
        let counting = Arc::new(Counting {
            seen: AtomicUsize::new(0),
        });
        rt.register_unit_observer(counting.clone()).unwrap();

        let f = rt.define_function("f", &[], ContractTable::new(), echo_first());
        assert!(rt.destroy_unit(f.unit).is_err());
        assert_eq!(counting.seen.load(Ordering::SeqCst), 0);

        rt.drop_function(f.id).unwrap();
        rt.destroy_unit(f.unit).unwrap();
        assert_eq!(counting.seen.load(Ordering::SeqCst), 1);
        assert!(rt.call(ContextId(0), &f, vec![]).is_err());
    }

    #[test]
    fn observer_slots_are_limited_and_reused() {
        let rt = Runtime::new(RuntimeConfig {
            max_observers: 1,
            ..RuntimeConfig::default()
        });
        let observer = Arc::new(Counting {
            seen: AtomicUsize::new(0),
        });

        let slot = rt.register_unit_observer(observer.clone()).unwrap();
        assert_eq!(
            rt.register_unit_observer(observer.clone()),
            Err(HostError::SlotsExhausted { limit: 1 })
        );

        rt.unregister_unit_observer(slot).unwrap();
        assert!(rt.unregister_unit_observer(slot).is_err());
        assert_eq!(rt.register_unit_observer(observer).unwrap(), slot);
    }

    #[test]
    fn executing_unit_cannot_be_destroyed() {
        let rt = Arc::new(Runtime::default());
        let weak = Arc::downgrade(&rt);
        let unit = rt.define_unit(
            "module",
            &[],
            &[],
            Arc::new(move |frame: &CallFrame| {
                let rt = weak
                    .upgrade()
                    .ok_or_else(|| CallError::runtime_error("runtime gone"))?;
                match rt.destroy_unit(frame.unit) {
                    Ok(()) => Ok(Value::None),
                    Err(err) => Ok(Value::Str(err.to_string())),
                }
            }),
        );

        let result = rt.call_unit(ContextId(0), unit.id, vec![]).unwrap();
        assert_eq!(
            result,
            Value::from(format!("compiled unit {} is executing in 1 call(s)", unit.id))
        );

        // Once the call has returned nothing is in flight.
        rt.destroy_unit(unit.id).unwrap();
        assert_eq!(rt.live_units(), 0);
    }

    #[test]
    fn drop_container_removes_the_referrer() {
        let rt = Runtime::default();
        let unit = rt.define_unit("module", &[], &[], echo_first());
        let holder = rt.add_container("namespace", &[Value::Unit(unit.id)]).unwrap();
        assert!(rt.destroy_unit(unit.id).is_err());

        rt.drop_container(holder).unwrap();
        rt.destroy_unit(unit.id).unwrap();
        assert!(rt.drop_container(holder).is_err());
    }

    #[test]
    fn call_depth_is_bounded() {
        let rt = Arc::new(Runtime::new(RuntimeConfig {
            max_call_depth: 3,
            ..RuntimeConfig::default()
        }));
        let weak = Arc::downgrade(&rt);
        let unit = rt.define_unit(
            "recurse",
            &[],
            &[],
            Arc::new(move |frame: &CallFrame| {
                let rt = weak
                    .upgrade()
                    .ok_or_else(|| CallError::runtime_error("runtime gone"))?;
                rt.call_unit(ContextId(0), frame.unit, vec![])
            }),
        );

        let err = rt.call_unit(ContextId(0), unit.id, vec![]).unwrap_err();
        assert_eq!(err.message, "maximum call depth (3) exceeded");
    }

    #[test]
    fn type_names_follow_registry() {
        let rt = Runtime::default();
        let point = rt.register_class("Point", None).unwrap();
        let names = rt.type_names();
        assert_eq!(names.type_name(point), "Point");
        assert_eq!(names.type_name(TypeId::INT), "int");
        assert!(rt.register_class("Point", None).is_err());
    }
}
