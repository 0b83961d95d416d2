//! The fundamental push node.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::{trace, warn};

use super::api::{same_sink, CloseMode, CommonOpts, Sink, State, SubKind, Subscribable};
use crate::error::StreamError;

/// Optional per-subscription transform.
///
/// Returning `None` suppresses dispatch for that value (filter semantics).
pub type Xform<I, O> = Box<dyn FnMut(&I) -> Option<O>>;

/// A registered downstream child.
struct Child<O: 'static> {
    kind: SubKind,
    sink: Rc<dyn Sink<O>>,
}

/// A push-based stream node.
///
/// Receives values of type `I`, applies the optional transform, and
/// dispatches the resulting `O` values to every registered child in
/// insertion order. Carries an explicit lifecycle ([`State`]): once terminal,
/// `next()` has no further effect and the terminal notification has fired
/// exactly once.
///
/// All construction returns `Rc` handles; interior mutability makes every
/// operation available through shared references, which is what allows a
/// subscription to sit in several roles at once (child of one stream, parent
/// of others) under single-threaded dispatch.
pub struct Subscription<I: 'static, O: 'static = I> {
    id: String,
    close_out: CloseMode,
    state: Cell<State>,
    xform: RefCell<Option<Xform<I, O>>>,
    subs: RefCell<SmallVec<[Child<O>; 2]>>,
    last_error: RefCell<Option<StreamError>>,
}

impl<I: 'static, O: 'static> Subscription<I, O> {
    /// Builds the raw node. Internal; public construction goes through
    /// [`Subscription::with_xform`] / [`Subscription::identity`].
    pub(crate) fn new_raw(xform: Option<Xform<I, O>>, mut opts: CommonOpts, prefix: &str) -> Self {
        Self {
            id: opts.resolve_id(prefix),
            close_out: opts.close_out,
            state: Cell::new(State::Idle),
            xform: RefCell::new(xform),
            subs: RefCell::new(SmallVec::new()),
            last_error: RefCell::new(None),
        }
    }

    /// Pushes a value into this subscription.
    ///
    /// Applies the transform (if any) and dispatches the result to every
    /// current child in insertion order. Ignored once terminal. A
    /// transform returning `None` suppresses dispatch for this value.
    pub fn next(&self, value: &I) {
        if self.state.get().is_terminal() {
            return;
        }
        self.touch();
        let out = {
            let mut xform = self.xform.borrow_mut();
            match xform.as_mut() {
                Some(f) => f(value),
                // No transform: nothing can be forwarded for I != O. The
                // identity constructor installs a cloning transform, so this
                // arm is only reached by composite bases that dispatch
                // directly.
                None => return,
            }
        };
        if let Some(v) = out {
            self.dispatch(&v);
        }
    }

    /// Completes this subscription.
    ///
    /// Transitions to [`State::Done`] exactly once and notifies every child's
    /// completion handler. Subsequent `next`/`done`/`error` calls are no-ops.
    pub fn done(&self) {
        if self.state.get().is_terminal() {
            return;
        }
        self.state.set(State::Done);
        trace!(id = %self.id, "subscription done");
        for child in self.snapshot() {
            child.done();
        }
        self.subs.borrow_mut().clear();
    }

    /// Terminates this subscription with an error.
    ///
    /// Transitions to [`State::Error`] exactly once and notifies every
    /// child's error handler. The error propagates purely through the
    /// notification channel; nothing is re-thrown past the subscription
    /// boundary.
    pub fn error(&self, err: StreamError) {
        if self.state.get().is_terminal() {
            return;
        }
        self.state.set(State::Error);
        *self.last_error.borrow_mut() = Some(err.clone());
        let children = self.snapshot();
        if children.is_empty() {
            warn!(id = %self.id, %err, "stream error with no subscribers");
        }
        for child in children {
            child.error(&err);
        }
        self.subs.borrow_mut().clear();
    }

    /// Dispatches an already-transformed value directly to all children.
    ///
    /// Used by composite streams (metastream, merge) that forward values
    /// produced elsewhere.
    pub(crate) fn dispatch(&self, value: &O) {
        if self.state.get().is_terminal() {
            return;
        }
        self.touch();
        for child in self.snapshot() {
            child.next(value);
        }
    }

    /// Returns `true` if `sink` is currently registered.
    pub(crate) fn contains_sink(&self, sink: &Rc<dyn Sink<O>>) -> bool {
        self.subs.borrow().iter().any(|c| same_sink(&c.sink, sink))
    }

    /// Child list snapshot, so handlers may re-subscribe or unsubscribe
    /// reentrantly while a dispatch is in flight.
    fn snapshot(&self) -> SmallVec<[Rc<dyn Sink<O>>; 2]> {
        self.subs.borrow().iter().map(|c| c.sink.clone()).collect()
    }

    fn touch(&self) {
        if self.state.get() == State::Idle {
            self.state.set(State::Active);
        }
    }

    /// Applies the closeout policy after a successful removal.
    fn after_unsubscribe(&self) {
        match self.close_out {
            CloseMode::Never => {}
            CloseMode::First => self.done(),
            CloseMode::Last => {
                if self.subs.borrow().is_empty() {
                    self.done();
                }
            }
        }
    }

    /// Creates a subscription applying `xform` to each incoming value.
    pub fn with_xform(
        xform: impl FnMut(&I) -> Option<O> + 'static,
        opts: CommonOpts,
    ) -> Rc<Self> {
        Rc::new(Self::new_raw(Some(Box::new(xform)), opts, "sub"))
    }
}

impl<T: Clone + 'static> Subscription<T, T> {
    /// Creates a pass-through subscription forwarding every value unchanged.
    pub fn identity(opts: CommonOpts) -> Rc<Self> {
        Self::with_xform(|v: &T| Some(v.clone()), opts)
    }
}

impl<I: 'static, O: 'static> Sink<I> for Subscription<I, O> {
    fn next(&self, value: &I) {
        Subscription::next(self, value);
    }

    fn done(&self) {
        Subscription::done(self);
    }

    fn error(&self, err: &StreamError) {
        Subscription::error(self, err.clone());
    }
}

impl<I: 'static, O: 'static> Subscribable<O> for Subscription<I, O> {
    fn subscribe_sink(&self, sink: Rc<dyn Sink<O>>, kind: SubKind) {
        match self.state.get() {
            State::Done => sink.done(),
            State::Error => {
                let err = self.last_error.borrow().clone();
                if let Some(err) = err {
                    sink.error(&err);
                }
            }
            State::Idle | State::Active => {
                trace!(id = %self.id, ?kind, "subscribe");
                self.subs.borrow_mut().push(Child { kind, sink });
            }
        }
    }

    fn unsubscribe_sink(&self, sink: &Rc<dyn Sink<O>>) {
        let removed = {
            let mut subs = self.subs.borrow_mut();
            let before = subs.len();
            subs.retain(|c| !same_sink(&c.sink, sink));
            before != subs.len()
        };
        if removed {
            trace!(id = %self.id, "unsubscribe");
            self.after_unsubscribe();
        }
    }

    fn unsubscribe_all(&self) {
        let had_subs = !self.subs.borrow().is_empty();
        self.subs.borrow_mut().clear();
        if had_subs {
            trace!(id = %self.id, "unsubscribe all");
            self.after_unsubscribe();
        }
    }

    fn state(&self) -> State {
        self.state.get()
    }

    fn num_subs(&self) -> usize {
        self.subs.borrow().len()
    }

    fn id(&self) -> &str {
        &self.id
    }
}
