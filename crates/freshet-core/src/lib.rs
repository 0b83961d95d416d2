//! # Freshet Core
//!
//! Push-based reactive stream primitives for single-threaded cooperative
//! dataflow.
//!
//! This crate provides:
//! - **Subscription**: the fundamental push node with an explicit lifecycle
//!   state machine, an optional filtering transform, and ordered fan-out to
//!   downstream children
//! - **MetaStream**: per-value, factory-driven switching between inner
//!   streams with strict detach-then-attach ownership
//! - **StreamMerge**: an N-input merge with dynamically attachable sources
//! - **Atom**: a path-addressed reactive state tree with memoized, deduped
//!   view streams
//!
//! ## Design Principles
//!
//! 1. **Synchronous dispatch** - `next`/`done`/`error` run to completion
//!    along the full downstream fan-out before returning
//! 2. **Single-threaded ownership** - `Rc`/`RefCell` interior state, no locks
//! 3. **Explicit lifecycle** - terminal states are idempotent and silent
//! 4. **Identity-guarded switching** - superseded inner streams can never
//!    leak values into a metastream's output
//!
//! ## Example
//!
//! ```rust,ignore
//! use freshet_core::stream::{subscribe, CommonOpts, Observer, Subscription};
//!
//! let doubler = Subscription::with_xform(|x: &i64| Some(x * 2), CommonOpts::default());
//! subscribe(&*doubler, Rc::new(Observer::new().on_next(|x| println!("{x}"))));
//! doubler.next(&21);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod atom;
pub mod error;
pub mod stream;

pub use atom::{Atom, PathError, StatePath, Value};
pub use error::StreamError;
pub use stream::{
    subscribe, unsubscribe, CloseMode, CommonOpts, MetaStream, Observer, Sink, State, Stream,
    StreamMerge, SubKind, Subscribable, Subscription,
};
