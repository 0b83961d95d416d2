//! Error type for runtime stream notifications.
//!
//! Runtime value-errors are *data*: they flow downstream through the `error`
//! notification channel, terminate the originating subscription, and never
//! unwind past the subscription boundary. They must be cheap to clone since a
//! single error fans out to every downstream child.

use std::sync::Arc;

/// A runtime error propagated through a stream's `error` channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// A generic, user-originated error.
    #[error("{0}")]
    Message(Arc<str>),

    /// A value transform failed while processing an incoming value.
    #[error("transform failed: {0}")]
    Transform(Arc<str>),

    /// A stream factory failed to produce an inner stream.
    #[error("stream factory failed: {0}")]
    Factory(Arc<str>),
}

impl StreamError {
    /// Creates a generic error from any displayable message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into().into())
    }
}
