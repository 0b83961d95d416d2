//! The graph compiler.
//!
//! Turns a [`GraphSpec`] into a fully wired [`Graph`] of live subscriptions:
//! for every node, resolves its declared inputs (shared state paths, other
//! nodes' outputs, ad hoc streams, constants), invokes the node's factory to
//! build its stream, and resolves its declared outputs. Compile-time faults
//! abort construction entirely; no partial graph is returned.

use std::rc::Rc;

use tracing::debug;

use freshet_core::stream::{subscribe, CommonOpts, Subscription};
use freshet_core::{Atom, StatePath, Value};

use crate::error::GraphError;
use crate::resolver::Resolver;
use crate::spec::{
    Graph, GraphSpec, InputSource, InputSpec, Node, NodeInputs, NodeOutputs, NodeSpec, NodeStream,
    OutputSpec,
};

/// Compiles a graph specification against a shared state atom.
///
/// Nodes are resolved lazily and memoized, so entry order in the spec is
/// irrelevant to the resulting wiring: compiling any permutation of the same
/// entries yields an identical graph.
///
/// # Errors
///
/// Any [`GraphError`]: unknown node ids or output names, malformed stream
/// references or state paths, duplicate node ids, reference cycles, or a
/// failing node factory.
pub fn compile(spec: GraphSpec, atom: &Rc<Atom>) -> Result<Graph, GraphError> {
    debug!(nodes = spec.len(), "compiling graph");
    Resolver::new(spec, atom.clone())?.resolve_all()
}

/// Compiles a single [`NodeSpec`] in the context of a resolution pass.
pub(crate) fn compile_node(
    resolver: &mut Resolver,
    id: &str,
    spec: NodeSpec,
) -> Result<Node, GraphError> {
    let NodeSpec { factory, ins, outs } = spec;

    // Constants are collected here and delivered only after the factory has
    // wired itself, so their single emission is actually observed.
    let mut const_feeds: Vec<(NodeStream, Value)> = Vec::new();

    let mut resolved_ins = NodeInputs::default();
    for (name, input) in ins {
        let InputSpec { source, xform } = input;
        let stream: NodeStream = match source {
            InputSource::Path(raw) => {
                let path: StatePath = raw.parse()?;
                resolver.atom().view(&path)
            }
            InputSource::StreamRef(reference) => resolver.stream(&reference)?,
            InputSource::StreamFn(f) => f(resolver)?,
            InputSource::Const(value) => const_input(&mut const_feeds, value),
            InputSource::ConstFn(f) => const_input(&mut const_feeds, f()),
        };
        let stream: NodeStream = match xform {
            Some(f) => {
                let derived =
                    Subscription::with_xform(f, CommonOpts::new().id(format!("{id}.{name}.xform")));
                subscribe(&*stream, derived.clone());
                derived
            }
            None => stream,
        };
        resolved_ins.insert(name, stream);
    }

    let node_stream = factory(&resolved_ins, id)?;

    let mut resolved_outs = NodeOutputs::default();
    for (name, output) in outs {
        let stream: NodeStream = match output {
            OutputSpec::Path(raw) => {
                let path: StatePath = raw.parse()?;
                let derived = Subscription::with_xform(
                    move |v: &Value| path.lookup(v).cloned(),
                    CommonOpts::new().id(format!("{id}.outs.{name}")),
                );
                subscribe(&*node_stream, derived.clone());
                derived
            }
            OutputSpec::Derive(f) => f(&node_stream, &name),
        };
        resolved_outs.insert(name, stream);
    }

    for (stream, value) in const_feeds {
        stream.next(&value);
        stream.done();
    }

    Ok(Node {
        ins: resolved_ins,
        outs: resolved_outs,
        node: node_stream,
    })
}

/// Wraps a literal as a single-value stream; the emission happens at the end
/// of the owning node's compilation.
fn const_input(feeds: &mut Vec<(NodeStream, Value)>, value: Value) -> NodeStream {
    let stream: NodeStream = Subscription::<Value, Value>::identity(CommonOpts::new());
    feeds.push((stream.clone(), value));
    stream
}
