//! Shared reactive state.
//!
//! An [`Atom`] holds a single JSON value tree and hands out *view streams*:
//! per-path subscriptions that emit the value at their path after every state
//! update that actually changed it. Views are memoized per canonical path —
//! asking twice for the same path returns the same stream — and are created
//! with [`CloseMode::Never`](crate::stream::CloseMode::Never) so a metastream
//! can switch away from and back to them.
//!
//! The atom performs no internal locking: it is a single shared resource
//! with a single-writer assumption, read and written only from the one
//! cooperative dispatch thread.

mod path;


pub use path::{PathError, Seg, StatePath};

use std::cell::RefCell;
use std::rc::Rc;

use fxhash::FxHashMap;
use tracing::trace;

use crate::stream::{CloseMode, CommonOpts, Subscription};

/// Dynamic value type flowing through atoms and dataflow graphs.
pub type Value = serde_json::Value;

/// A view stream bound to one location of the state tree.
pub type ViewStream = Rc<Subscription<Value, Value>>;

struct ViewEntry {
    path: StatePath,
    stream: ViewStream,
    /// Last emitted value, for change detection.
    last: Option<Value>,
}

/// A mutable, observable state container.
pub struct Atom {
    value: RefCell<Value>,
    views: RefCell<FxHashMap<String, ViewEntry>>,
}

impl Atom {
    /// Creates an atom holding `initial`.
    pub fn new(initial: Value) -> Rc<Self> {
        Rc::new(Self {
            value: RefCell::new(initial),
            views: RefCell::new(FxHashMap::default()),
        })
    }

    /// Clones the current state tree.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        self.value.borrow().clone()
    }

    /// Reads the value at `path`, if present.
    #[must_use]
    pub fn get_in(&self, path: &StatePath) -> Option<Value> {
        path.lookup(&self.value.borrow()).cloned()
    }

    /// Returns the reactive view stream for `path`, creating and memoizing
    /// it on first request.
    ///
    /// The stream emits the value at `path` after every update that changed
    /// it. It never closes on its own (`CloseMode::Never`).
    pub fn view(&self, path: &StatePath) -> ViewStream {
        let key = path.canonical();
        let mut views = self.views.borrow_mut();
        if let Some(entry) = views.get(&key) {
            return entry.stream.clone();
        }
        trace!(path = %key, "atom view created");
        let stream = Subscription::identity(
            CommonOpts::new()
                .id(format!("view-{key}"))
                .close_out(CloseMode::Never),
        );
        let last = path.lookup(&self.value.borrow()).cloned();
        views.insert(
            key,
            ViewEntry {
                path: path.clone(),
                stream: stream.clone(),
                last,
            },
        );
        stream
    }

    /// Replaces the entire state tree and notifies changed views.
    pub fn reset(&self, value: Value) {
        *self.value.borrow_mut() = value;
        self.notify(false);
    }

    /// Mutates the state tree in place and notifies changed views.
    pub fn swap(&self, f: impl FnOnce(&mut Value)) {
        {
            let mut value = self.value.borrow_mut();
            f(&mut value);
        }
        self.notify(false);
    }

    /// Writes `value` at `path` (creating intermediate objects for missing
    /// keys) and notifies changed views. Returns `false` when the path
    /// cannot be realized; the state is untouched in that case.
    pub fn reset_in(&self, path: &StatePath, value: Value) -> bool {
        let updated = path.set_in(&mut self.value.borrow_mut(), value);
        if updated {
            self.notify(false);
        }
        updated
    }

    /// Pushes the *current* value at every view's path through that view,
    /// changed or not. Used to seed consumers wired up after the state was
    /// already populated (e.g. a freshly compiled graph).
    pub fn publish(&self) {
        self.notify(true);
    }

    /// Emits through every view whose path value differs from the last
    /// emission (or through all of them when `force` is set).
    fn notify(&self, force: bool) {
        let mut pending: Vec<(ViewStream, Value)> = Vec::new();
        {
            let root = self.value.borrow();
            let mut views = self.views.borrow_mut();
            for entry in views.values_mut() {
                let current = entry.path.lookup(&root).cloned().unwrap_or(Value::Null);
                if force || entry.last.as_ref() != Some(&current) {
                    entry.last = Some(current.clone());
                    pending.push((entry.stream.clone(), current));
                }
            }
        }
        // Dispatch after releasing the borrows: a handler may read the atom
        // or request further views.
        for (stream, value) in pending {
            stream.next(&value);
        }
    }
}
