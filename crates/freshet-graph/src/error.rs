//! Error types for graph compilation.

use freshet_core::PathError;

/// Errors that can occur while compiling a graph specification.
///
/// Every variant is a compile-time fault: compilation aborts and no partial
/// graph is returned. Runtime value-errors never surface here; they flow
/// through the stream `error` channel instead.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A stream reference names a node id that does not exist.
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// A stream reference names an output the node does not declare.
    #[error("output not found: {node}/{output}")]
    OutputNotFound {
        /// Referenced node id.
        node: String,
        /// Referenced output name.
        output: String,
    },

    /// Resolving a node re-entered its own in-progress resolution.
    #[error("cycle detected involving node: {0}")]
    CycleDetected(String),

    /// Two spec entries share the same node id.
    #[error("duplicate node id: {0}")]
    DuplicateNode(String),

    /// A stream reference does not match `/id`, `/id/node`, or
    /// `/id/outs/<name>`.
    #[error("invalid stream reference: {0}")]
    InvalidStreamRef(String),

    /// A declared state path failed to parse.
    #[error("invalid state path: {0}")]
    Path(#[from] PathError),

    /// A node factory failed to construct its stream.
    #[error("node factory failed for '{node}': {reason}")]
    Factory {
        /// Node id whose factory failed.
        node: String,
        /// Description of the failure.
        reason: String,
    },
}
