//! Lazy, memoizing node resolution.
//!
//! Every spec entry is treated as a lazily computable value keyed by node id:
//! referencing a not-yet-evaluated node triggers its evaluation on demand and
//! memoizes the result, so each node is compiled at most once regardless of
//! how many other nodes reference it — and regardless of declaration order,
//! which makes forward references valid.
//!
//! Re-entering a resolution that is already in progress means the spec
//! contains a reference cycle; that is a fatal configuration fault reported
//! as [`GraphError::CycleDetected`] rather than an infinite loop.

use std::rc::Rc;

use fxhash::FxHashMap;
use tracing::debug;

use freshet_core::Atom;

use crate::compile::compile_node;
use crate::error::GraphError;
use crate::spec::{Graph, GraphEntry, GraphSpec, Node, NodeStream};

/// Resolution state of one spec entry.
enum Slot {
    /// Not evaluated yet.
    Pending(GraphEntry),
    /// Evaluation currently on the stack; hitting this is a cycle.
    InProgress,
    /// Evaluated and memoized.
    Resolved(Node),
}

/// The lazy resolver handed to stream functions and node resolver entries.
pub struct Resolver {
    slots: FxHashMap<String, Slot>,
    /// Declaration order, for deterministic full-graph compilation.
    order: Vec<String>,
    atom: Rc<Atom>,
}

impl Resolver {
    /// Builds a resolver over a spec, rejecting duplicate node ids.
    pub(crate) fn new(spec: GraphSpec, atom: Rc<Atom>) -> Result<Self, GraphError> {
        let mut slots = FxHashMap::default();
        let mut order = Vec::with_capacity(spec.entries.len());
        for (id, entry) in spec.entries {
            if slots.contains_key(&id) {
                return Err(GraphError::DuplicateNode(id));
            }
            order.push(id.clone());
            slots.insert(id, Slot::Pending(entry));
        }
        Ok(Self { slots, order, atom })
    }

    /// All declared node ids, in declaration order.
    pub(crate) fn ids(&self) -> &[String] {
        &self.order
    }

    /// The shared state atom path inputs bind to.
    #[must_use]
    pub fn atom(&self) -> &Rc<Atom> {
        &self.atom
    }

    /// Resolves a node by id, evaluating it on first access.
    ///
    /// # Errors
    ///
    /// [`GraphError::NodeNotFound`] for unknown ids,
    /// [`GraphError::CycleDetected`] when the resolution re-enters itself,
    /// or whatever fault the entry's own evaluation produces.
    pub fn node(&mut self, id: &str) -> Result<Node, GraphError> {
        let entry = {
            let slot = self
                .slots
                .get_mut(id)
                .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
            match std::mem::replace(slot, Slot::InProgress) {
                Slot::Resolved(node) => {
                    *slot = Slot::Resolved(node.clone());
                    return Ok(node);
                }
                Slot::InProgress => return Err(GraphError::CycleDetected(id.to_string())),
                Slot::Pending(entry) => entry,
            }
        };
        debug!(node = id, "resolving node");
        let node = match entry {
            GraphEntry::Node(node) => node,
            GraphEntry::Resolver(f) => f(self)?,
            GraphEntry::Spec(spec) => compile_node(self, id, spec)?,
        };
        self.slots
            .insert(id.to_string(), Slot::Resolved(node.clone()));
        Ok(node)
    }

    /// Resolves a stream reference: `/id` or `/id/node` for a node's main
    /// stream, `/id/outs/<name>` for a named output.
    ///
    /// # Errors
    ///
    /// [`GraphError::InvalidStreamRef`] for malformed references,
    /// [`GraphError::OutputNotFound`] for unknown output names, plus
    /// everything [`Resolver::node`] can produce.
    pub fn stream(&mut self, reference: &str) -> Result<NodeStream, GraphError> {
        let Some(rest) = reference.strip_prefix('/') else {
            return Err(GraphError::InvalidStreamRef(reference.to_string()));
        };
        let parts: Vec<&str> = rest.split('/').collect();
        match parts.as_slice() {
            [id] | [id, "node"] if !id.is_empty() => Ok(self.node(id)?.node),
            [id, "outs", name] if !id.is_empty() && !name.is_empty() => {
                let node = self.node(id)?;
                node.outs
                    .get(*name)
                    .cloned()
                    .ok_or_else(|| GraphError::OutputNotFound {
                        node: (*id).to_string(),
                        output: (*name).to_string(),
                    })
            }
            _ => Err(GraphError::InvalidStreamRef(reference.to_string())),
        }
    }

    /// Resolves every declared node, in declaration order.
    pub(crate) fn resolve_all(mut self) -> Result<Graph, GraphError> {
        let ids = self.order.clone();
        let mut nodes = FxHashMap::default();
        for id in ids {
            let node = self.node(&id)?;
            nodes.insert(id, node);
        }
        Ok(Graph::new(nodes))
    }
}
