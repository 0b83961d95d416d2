//! # Freshet Graph
//!
//! A declarative dataflow graph compiler over `freshet-core` subscriptions.
//!
//! A graph is described by data: a flat [`GraphSpec`] maps node ids to
//! [`NodeSpec`]s, each declaring named inputs (shared state paths, other
//! nodes' outputs, ad hoc streams, or constants), a factory building the
//! node's stream, and optional named outputs. [`compile`](compile()) turns
//! the spec into a wired network of live subscriptions, resolving forward
//! references between nodes regardless of declaration order.
//!
//! ## Example
//!
//! ```rust,ignore
//! use freshet_core::Atom;
//! use freshet_graph::{compile, nodes, GraphSpec, InputSpec, NodeSpec};
//! use serde_json::json;
//!
//! let atom = Atom::new(json!({"a": 0, "b": 0}));
//! let spec = GraphSpec::new()
//!     // `scaled` references `sum` before it is declared; order is free.
//!     .node(
//!         "scaled",
//!         NodeSpec::new(nodes::node1(|v| v.as_f64().map(|n| (n * 10.0).into())))
//!             .input("src", InputSpec::stream("/sum/node")),
//!     )
//!     .node(
//!         "sum",
//!         NodeSpec::new(nodes::add())
//!             .input("a", InputSpec::path("a"))
//!             .input("b", InputSpec::path("b")),
//!     );
//! let graph = compile(spec, &atom)?;
//! atom.reset(json!({"a": 3, "b": 4}));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod compile;
pub mod error;
pub mod nodes;
pub mod resolver;
pub mod spec;


pub use compile::compile;
pub use error::GraphError;
pub use resolver::Resolver;
pub use spec::{
    ConstFn, Graph, GraphEntry, GraphSpec, InputSpec, Node, NodeFactory, NodeInputs, NodeOutputs,
    NodeResolverFn, NodeSpec, NodeStream, OutputFn, OutputSpec, StreamFn, ValueXform,
};

// Re-exported so graph consumers do not need a direct core dependency for
// the common cases.
pub use freshet_core::{Atom, StatePath, Value};
