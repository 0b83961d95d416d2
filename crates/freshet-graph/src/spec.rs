//! Graph specification types.
//!
//! A dataflow graph spec is a flat mapping from node ids to [`GraphEntry`]
//! values, each defining a node's inputs, outputs, and the factory producing
//! its stream. The spec is plain data: it is authored once, handed to
//! [`compile`](crate::compile()), and the compiled [`Graph`] of live
//! subscriptions has its own independent runtime lifecycle thereafter.
//!
//! Nodes may reference each other's outputs by string path
//! (`"/node-id/node"`, `"/node-id/outs/<name>"`) regardless of declaration
//! order; forward references are resolved lazily.

use std::rc::Rc;

use fxhash::FxHashMap;

use freshet_core::{Stream, Value};

use crate::error::GraphError;
use crate::resolver::Resolver;

/// A dynamically typed stream inside a compiled graph.
pub type NodeStream = Rc<dyn Stream<Value>>;

/// Resolved named input streams handed to a node factory.
pub type NodeInputs = FxHashMap<String, NodeStream>;

/// Resolved named output streams of a compiled node.
pub type NodeOutputs = FxHashMap<String, NodeStream>;

/// Constructs a node's stream from its resolved inputs and its id.
pub type NodeFactory = Box<dyn FnOnce(&NodeInputs, &str) -> Result<NodeStream, GraphError>>;

/// A value transform; returning `None` suppresses the value.
pub type ValueXform = Box<dyn FnMut(&Value) -> Option<Value>>;

/// Produces an input stream with access to the lazy resolver.
pub type StreamFn = Box<dyn FnOnce(&mut Resolver) -> Result<NodeStream, GraphError>>;

/// Produces a constant input value on demand.
pub type ConstFn = Box<dyn FnOnce() -> Value>;

/// Resolves a whole node with access to the lazy resolver.
pub type NodeResolverFn = Box<dyn FnOnce(&mut Resolver) -> Result<Node, GraphError>>;

/// Derives a secondary output stream from a node's main stream and the
/// output name.
pub type OutputFn = Box<dyn FnOnce(&NodeStream, &str) -> NodeStream>;

// ---------------------------------------------------------------------------
// InputSpec
// ---------------------------------------------------------------------------

/// Where an input's values come from.
pub(crate) enum InputSource {
    /// A location in shared external state, e.g. `"nested.src.path"`.
    Path(String),
    /// A string reference to another node's output.
    StreamRef(String),
    /// A function building or looking up a stream via the resolver.
    StreamFn(StreamFn),
    /// A literal, emitted as a single-value stream.
    Const(Value),
    /// A zero-argument producer of a literal.
    ConstFn(ConstFn),
}

/// Specification for a single named input of a node.
pub struct InputSpec {
    pub(crate) source: InputSource,
    pub(crate) xform: Option<ValueXform>,
}

impl InputSpec {
    /// Input fed by the value at `path` in the shared state atom.
    #[must_use]
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            source: InputSource::Path(path.into()),
            xform: None,
        }
    }

    /// Input fed by another node's output: `"/node-id"`, `"/node-id/node"`,
    /// or `"/node-id/outs/<name>"`.
    #[must_use]
    pub fn stream(reference: impl Into<String>) -> Self {
        Self {
            source: InputSource::StreamRef(reference.into()),
            xform: None,
        }
    }

    /// Input fed by a stream the function builds or looks up itself (covers
    /// externally sourced and ad hoc streams).
    #[must_use]
    pub fn stream_fn(
        f: impl FnOnce(&mut Resolver) -> Result<NodeStream, GraphError> + 'static,
    ) -> Self {
        Self {
            source: InputSource::StreamFn(Box::new(f)),
            xform: None,
        }
    }

    /// Input fed exactly once with a literal value.
    #[must_use]
    pub fn constant(value: impl Into<Value>) -> Self {
        Self {
            source: InputSource::Const(value.into()),
            xform: None,
        }
    }

    /// Input fed exactly once with a produced value.
    #[must_use]
    pub fn constant_fn(f: impl FnOnce() -> Value + 'static) -> Self {
        Self {
            source: InputSource::ConstFn(Box::new(f)),
            xform: None,
        }
    }

    /// Post-processes this input through a transform before it reaches the
    /// node factory.
    #[must_use]
    pub fn xform(mut self, f: impl FnMut(&Value) -> Option<Value> + 'static) -> Self {
        self.xform = Some(Box::new(f));
        self
    }
}

// ---------------------------------------------------------------------------
// OutputSpec
// ---------------------------------------------------------------------------

/// Specification for a named secondary output of a node.
pub enum OutputSpec {
    /// Extract the value at this path from each value the node emits.
    Path(String),
    /// Derive the output stream from the node's main stream.
    Derive(OutputFn),
}

impl OutputSpec {
    /// Path-extraction output.
    #[must_use]
    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    /// Function-derived output.
    #[must_use]
    pub fn derive(f: impl FnOnce(&NodeStream, &str) -> NodeStream + 'static) -> Self {
        Self::Derive(Box::new(f))
    }
}

// ---------------------------------------------------------------------------
// NodeSpec / GraphEntry / GraphSpec
// ---------------------------------------------------------------------------

/// Specification for a single node: a factory plus named input/output
/// declarations.
pub struct NodeSpec {
    pub(crate) factory: NodeFactory,
    pub(crate) ins: Vec<(String, InputSpec)>,
    pub(crate) outs: Vec<(String, OutputSpec)>,
}

impl NodeSpec {
    /// Creates a node spec around a factory function.
    pub fn new(
        factory: impl FnOnce(&NodeInputs, &str) -> Result<NodeStream, GraphError> + 'static,
    ) -> Self {
        Self {
            factory: Box::new(factory),
            ins: Vec::new(),
            outs: Vec::new(),
        }
    }

    /// Declares a named input.
    #[must_use]
    pub fn input(mut self, name: impl Into<String>, spec: InputSpec) -> Self {
        self.ins.push((name.into(), spec));
        self
    }

    /// Declares a named output.
    #[must_use]
    pub fn output(mut self, name: impl Into<String>, spec: OutputSpec) -> Self {
        self.outs.push((name.into(), spec));
        self
    }
}

/// One entry of a [`GraphSpec`].
pub enum GraphEntry {
    /// A node specification, compiled by the graph compiler.
    Spec(NodeSpec),
    /// A pre-built node, taken as-is.
    Node(Node),
    /// A function resolving the node itself, with resolver access.
    Resolver(NodeResolverFn),
}

impl GraphEntry {
    /// Creates a resolver-function entry.
    #[must_use]
    pub fn resolver(
        f: impl FnOnce(&mut Resolver) -> Result<Node, GraphError> + 'static,
    ) -> Self {
        Self::Resolver(Box::new(f))
    }
}

impl From<NodeSpec> for GraphEntry {
    fn from(spec: NodeSpec) -> Self {
        Self::Spec(spec)
    }
}

impl From<Node> for GraphEntry {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

/// A flat, declaration-order-preserving mapping from node ids to entries.
#[derive(Default)]
pub struct GraphSpec {
    pub(crate) entries: Vec<(String, GraphEntry)>,
}

impl GraphSpec {
    /// Creates an empty spec.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node entry. Duplicate ids are rejected at compile time.
    #[must_use]
    pub fn node(mut self, id: impl Into<String>, entry: impl Into<GraphEntry>) -> Self {
        self.entries.push((id.into(), entry.into()));
        self
    }

    /// Number of declared entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no entries are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Node / Graph
// ---------------------------------------------------------------------------

/// A compiled node: resolved inputs, resolved outputs, and the node's own
/// stream.
#[derive(Clone)]
pub struct Node {
    /// Resolved input streams by local input name.
    pub ins: NodeInputs,
    /// Resolved output streams by output name.
    pub outs: NodeOutputs,
    /// The node's main stream.
    pub node: NodeStream,
}

impl Node {
    /// Looks up a named output stream.
    #[must_use]
    pub fn output(&self, name: &str) -> Option<NodeStream> {
        self.outs.get(name).cloned()
    }
}

/// A compiled dataflow graph: node id to compiled [`Node`].
pub struct Graph {
    nodes: FxHashMap<String, Node>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Graph {
    pub(crate) fn new(nodes: FxHashMap<String, Node>) -> Self {
        Self { nodes }
    }

    /// Looks up a compiled node.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Looks up a node's main stream.
    #[must_use]
    pub fn stream(&self, id: &str) -> Option<NodeStream> {
        self.nodes.get(id).map(|n| n.node.clone())
    }

    /// Iterates over all node ids.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Number of compiled nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` for a graph with no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
