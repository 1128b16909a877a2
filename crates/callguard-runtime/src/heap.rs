//! The runtime's live object graph.
//!
//! Every compiled unit, function object, and container is a node in a
//! `StableDiGraph`; an edge `a -> b` means "`a` holds a direct reference to
//! `b`". Referrers of a unit are therefore exactly its incoming neighbors.
//! Stable indices keep node handles valid across removals.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction;

use callguard_core::{
    CallError, CallFrame, CompiledUnit, ContractTable, FunctionObject, HostError, ObjectId,
    Referrer, ReferrerQuery, UnitId, Value,
};

use crate::error::RuntimeError;

/// Native body of a compiled unit.
pub type Body = Arc<dyn Fn(&CallFrame) -> Result<Value, CallError> + Send + Sync>;

/// A node in the object graph.
#[derive(Debug, Clone)]
pub(crate) enum HeapNode {
    Unit(Arc<CompiledUnit>),
    Function(Arc<FunctionObject>),
    /// Any non-function referrer (module namespaces, tuples, cells).
    Container { id: ObjectId, label: String },
}

/// A unit's native body and the number of calls currently executing it.
struct UnitCode {
    body: Body,
    active: Arc<AtomicUsize>,
}

/// Marks one in-flight execution of a unit until dropped.
pub(crate) struct ActiveCall(Arc<AtomicUsize>);

impl Drop for ActiveCall {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Default)]
pub(crate) struct Heap {
    graph: StableDiGraph<HeapNode, ()>,
    units: HashMap<UnitId, NodeIndex>,
    objects: HashMap<ObjectId, NodeIndex>,
    bodies: HashMap<UnitId, UnitCode>,
    next_unit: u32,
    next_object: u32,
}

impl Heap {
    pub(crate) fn add_unit(
        &mut self,
        name: &str,
        params: &[&str],
        locals: &[&str],
        body: Body,
    ) -> Arc<CompiledUnit> {
        self.insert_unit(name, params, locals, body).0
    }

    /// Compiles a unit and binds one function object to it.
    pub(crate) fn add_unit_with_function(
        &mut self,
        name: &str,
        params: &[&str],
        contracts: ContractTable,
        body: Body,
    ) -> Arc<FunctionObject> {
        let (unit, unit_idx) = self.insert_unit(name, params, &[], body);
        self.insert_function(unit.id, unit_idx, name, contracts)
    }

    pub(crate) fn add_function(
        &mut self,
        unit: UnitId,
        name: &str,
        contracts: ContractTable,
    ) -> Result<Arc<FunctionObject>, RuntimeError> {
        let unit_idx = *self
            .units
            .get(&unit)
            .ok_or(RuntimeError::UnitNotFound { unit })?;
        Ok(self.insert_function(unit, unit_idx, name, contracts))
    }

    /// Adds a container holding references to the units and functions in
    /// `refs`. Other values carry no graph edges.
    pub(crate) fn add_container(
        &mut self,
        label: &str,
        refs: &[Value],
    ) -> Result<ObjectId, RuntimeError> {
        let mut targets = Vec::with_capacity(refs.len());
        for value in refs {
            match value {
                Value::Unit(unit) => targets.push(
                    *self
                        .units
                        .get(unit)
                        .ok_or(RuntimeError::UnitNotFound { unit: *unit })?,
                ),
                Value::Function(object) => targets.push(
                    *self
                        .objects
                        .get(object)
                        .ok_or(RuntimeError::ObjectNotFound { object: *object })?,
                ),
                _ => {}
            }
        }

        let id = self.alloc_object_id();
        let idx = self.graph.add_node(HeapNode::Container {
            id,
            label: label.to_string(),
        });
        for target in targets {
            self.graph.add_edge(idx, target, ());
        }
        self.objects.insert(id, idx);
        Ok(id)
    }

    /// Removes a function or container from the graph.
    ///
    /// A removed function may outlive its node through any `Arc` still held
    /// elsewhere.
    pub(crate) fn remove_object(
        &mut self,
        object: ObjectId,
    ) -> Result<HeapNode, RuntimeError> {
        let idx = self
            .objects
            .remove(&object)
            .ok_or(RuntimeError::ObjectNotFound { object })?;
        self.graph
            .remove_node(idx)
            .ok_or(RuntimeError::ObjectNotFound { object })
    }

    pub(crate) fn remove_unit(
        &mut self,
        unit: UnitId,
    ) -> Result<Arc<CompiledUnit>, RuntimeError> {
        let idx = *self
            .units
            .get(&unit)
            .ok_or(RuntimeError::UnitNotFound { unit })?;

        let referrers = self.graph.neighbors_directed(idx, Direction::Incoming).count();
        if referrers > 0 {
            return Err(RuntimeError::UnitInUse { unit, referrers });
        }
        let calls = self
            .bodies
            .get(&unit)
            .map_or(0, |code| code.active.load(Ordering::Acquire));
        if calls > 0 {
            return Err(RuntimeError::UnitExecuting { unit, calls });
        }

        self.units.remove(&unit);
        self.bodies.remove(&unit);
        match self.graph.remove_node(idx) {
            Some(HeapNode::Unit(compiled)) => Ok(compiled),
            _ => Err(RuntimeError::UnitNotFound { unit }),
        }
    }

    pub(crate) fn unit(&self, unit: UnitId) -> Option<Arc<CompiledUnit>> {
        let idx = self.units.get(&unit)?;
        match self.graph.node_weight(*idx)? {
            HeapNode::Unit(compiled) => Some(Arc::clone(compiled)),
            _ => None,
        }
    }

    /// Looks up a unit for execution and registers the call as in flight.
    ///
    /// The count is raised while the caller still holds the heap lock, so a
    /// unit cannot be destroyed between lookup and the end of the call.
    pub(crate) fn enter(&self, unit: UnitId) -> Option<(Arc<CompiledUnit>, Body, ActiveCall)> {
        let compiled = self.unit(unit)?;
        let code = self.bodies.get(&unit)?;
        code.active.fetch_add(1, Ordering::AcqRel);
        Some((
            compiled,
            Arc::clone(&code.body),
            ActiveCall(Arc::clone(&code.active)),
        ))
    }

    pub(crate) fn function(
        &self,
        object: ObjectId,
    ) -> Result<Arc<FunctionObject>, RuntimeError> {
        let idx = self
            .objects
            .get(&object)
            .ok_or(RuntimeError::ObjectNotFound { object })?;
        match self.graph.node_weight(*idx) {
            Some(HeapNode::Function(function)) => Ok(Arc::clone(function)),
            _ => Err(RuntimeError::NotAFunction { object }),
        }
    }

    /// Incoming neighbors of `unit`, in petgraph's adjacency order (most
    /// recently added edge first).
    pub(crate) fn referrers(&self, unit: UnitId) -> Option<Vec<Referrer>> {
        let idx = self.units.get(&unit)?;
        let referrers = self
            .graph
            .neighbors_directed(*idx, Direction::Incoming)
            .filter_map(|n| match self.graph.node_weight(n)? {
                HeapNode::Function(function) => Some(Referrer::Function(Arc::clone(function))),
                HeapNode::Container { id, .. } => Some(Referrer::Other(*id)),
                HeapNode::Unit(_) => None,
            })
            .collect();
        Some(referrers)
    }

    pub(crate) fn live_units(&self) -> usize {
        self.units.len()
    }

    pub(crate) fn live_objects(&self) -> usize {
        self.objects.len()
    }

    fn insert_unit(
        &mut self,
        name: &str,
        params: &[&str],
        locals: &[&str],
        body: Body,
    ) -> (Arc<CompiledUnit>, NodeIndex) {
        let id = UnitId(self.next_unit);
        self.next_unit += 1;

        let unit = Arc::new(CompiledUnit::new(id, name, params, locals));
        let idx = self.graph.add_node(HeapNode::Unit(Arc::clone(&unit)));
        self.units.insert(id, idx);
        self.bodies.insert(
            id,
            UnitCode {
                body,
                active: Arc::new(AtomicUsize::new(0)),
            },
        );
        (unit, idx)
    }

    fn insert_function(
        &mut self,
        unit: UnitId,
        unit_idx: NodeIndex,
        name: &str,
        contracts: ContractTable,
    ) -> Arc<FunctionObject> {
        let id = self.alloc_object_id();
        let function = Arc::new(FunctionObject::new(id, name, unit).with_contracts(contracts));
        let idx = self.graph.add_node(HeapNode::Function(Arc::clone(&function)));
        self.graph.add_edge(idx, unit_idx, ());
        self.objects.insert(id, idx);
        function
    }

    fn alloc_object_id(&mut self) -> ObjectId {
        let id = ObjectId(self.next_object);
        self.next_object += 1;
        id
    }
}

/// [`ReferrerQuery`] backed by the shared heap.
pub struct HeapReferrers {
    pub(crate) heap: Arc<RwLock<Heap>>,
}

impl ReferrerQuery for HeapReferrers {
    fn find_referrers(&self, unit: UnitId) -> Result<Vec<Referrer>, HostError> {
        self.heap
            .read()
            .referrers(unit)
            .ok_or(HostError::UnknownUnit { unit })
    }
}
