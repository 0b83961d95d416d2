//! Factory-driven dynamic stream switching.
//!
//! A [`MetaStream`] transforms each incoming value into a new inner stream
//! (via a user-supplied factory), subscribes to it through a hidden internal
//! forwarding handle, and then only passes values from that inner stream to
//! its own subscribers.
//!
//! When a new value arrives, the metastream first detaches from any still
//! active inner stream before creating and attaching the new one — a strict
//! switch, never concurrent. The factory does not need to create *new*
//! streams; returning existing long-lived streams makes the metastream act as
//! a switch with arbitrary criteria. In that case the inputs must be built
//! with [`CloseMode::Never`](super::CloseMode::Never), otherwise the detach
//! performed on switch closes them.
//!
//! A factory returning `None` leaves the metastream with no inner stream and
//! produces no output for that value (filter semantics).

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::trace;

use super::api::{same_stream, CommonOpts, Sink, State, Stream, SubKind, Subscribable};
use super::subscription::Subscription;
use crate::error::StreamError;

/// Factory invoked per incoming value to select or build the inner stream.
pub type MetaFactory<A, B> = Box<dyn FnMut(&A) -> Option<Rc<dyn Stream<B>>>>;

/// A stream that switches exclusively to a per-value, factory-chosen inner
/// stream.
///
/// Invariants:
/// - at most one inner stream is attached at any time; attaching detaches
///   the predecessor first
/// - a notification arriving from a superseded inner stream is discarded
///   (identity-compared against the currently attached stream)
/// - an inner stream completing clears the attachment but does **not**
///   complete the metastream: the next incoming value may attach a fresh
///   stream
/// - an inner stream erroring terminates the metastream
pub struct MetaStream<A: 'static, B: 'static = A> {
    base: Subscription<A, B>,
    factory: RefCell<MetaFactory<A, B>>,
    stream: RefCell<Option<Rc<dyn Stream<B>>>>,
    handle: RefCell<Option<Rc<Forwarder<A, B>>>>,
    weak_self: Weak<MetaStream<A, B>>,
}

impl<A: 'static, B: 'static> MetaStream<A, B> {
    /// Creates a metastream from an inner-stream factory.
    pub fn new(
        factory: impl FnMut(&A) -> Option<Rc<dyn Stream<B>>> + 'static,
        opts: CommonOpts,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            base: Subscription::new_raw(None, opts, "metastream"),
            factory: RefCell::new(Box::new(factory)),
            stream: RefCell::new(None),
            handle: RefCell::new(None),
            weak_self: weak.clone(),
        })
    }

    /// Pushes a value, switching to the stream the factory selects for it.
    ///
    /// Detaches any currently attached inner stream first. If the factory
    /// yields no stream, the metastream stays without one and this value
    /// produces no output.
    pub fn next(&self, value: &A) {
        if self.base.state().is_terminal() {
            return;
        }
        if self.stream.borrow().is_some() {
            self.detach();
        }
        let produced = {
            let mut factory = self.factory.borrow_mut();
            (*factory)(value)
        };
        if let Some(stream) = produced {
            trace!(id = %self.base.id(), inner = %stream.id(), "metastream switch");
            let forwarder = Forwarder::new(self.weak_self.clone(), stream.clone());
            *self.stream.borrow_mut() = Some(stream.clone());
            *self.handle.borrow_mut() = Some(forwarder.clone());
            let sink: Rc<dyn Sink<B>> = forwarder;
            stream.subscribe_sink(sink, SubKind::InternalForwarding);
        }
    }

    /// Completes the metastream, detaching any attached inner stream first.
    pub fn done(&self) {
        if self.base.state().is_terminal() {
            return;
        }
        if self.stream.borrow().is_some() {
            self.detach();
        }
        self.base.done();
    }

    /// Terminates the metastream with an error, detaching any attached inner
    /// stream first.
    pub fn error(&self, err: StreamError) {
        if self.base.state().is_terminal() {
            return;
        }
        if self.stream.borrow().is_some() {
            self.detach();
        }
        self.base.error(err);
    }

    /// Returns `true` while an inner stream is attached.
    #[must_use]
    pub fn has_inner(&self) -> bool {
        self.stream.borrow().is_some()
    }

    /// Detaches the current inner stream: unsubscribes the internal
    /// forwarding handle and clears the attachment.
    ///
    /// # Panics
    ///
    /// Panics if no inner stream is attached — calling this without one is a
    /// programming error, not a recoverable condition.
    fn detach(&self) {
        let stream = self.stream.borrow_mut().take();
        let handle = self.handle.borrow_mut().take();
        let (Some(stream), Some(handle)) = (stream, handle) else {
            panic!("metastream: no inner stream attached");
        };
        trace!(id = %self.base.id(), inner = %stream.id(), "metastream detach");
        let sink: Rc<dyn Sink<B>> = handle;
        stream.unsubscribe_sink(&sink);
    }

    /// Identity check against the currently attached inner stream.
    fn is_current(&self, stream: &Rc<dyn Stream<B>>) -> bool {
        self.stream
            .borrow()
            .as_ref()
            .is_some_and(|current| same_stream(current, stream))
    }

    /// Clears the attachment if `stream` is still the current inner stream.
    fn clear_if_current(&self, stream: &Rc<dyn Stream<B>>) {
        if self.is_current(stream) {
            self.stream.borrow_mut().take();
            self.handle.borrow_mut().take();
        }
    }
}

impl<A: 'static, B: 'static> Sink<A> for MetaStream<A, B> {
    fn next(&self, value: &A) {
        MetaStream::next(self, value);
    }

    fn done(&self) {
        MetaStream::done(self);
    }

    fn error(&self, err: &StreamError) {
        MetaStream::error(self, err.clone());
    }
}

impl<A: 'static, B: 'static> Subscribable<B> for MetaStream<A, B> {
    fn subscribe_sink(&self, sink: Rc<dyn Sink<B>>, kind: SubKind) {
        self.base.subscribe_sink(sink, kind);
    }

    fn unsubscribe_sink(&self, sink: &Rc<dyn Sink<B>>) {
        // Losing the last subscriber releases the inner linkage as a
        // resource-cleanup side effect before the base bookkeeping runs.
        let leaves_none = self.base.num_subs() == 1 && self.base.contains_sink(sink);
        if leaves_none && self.stream.borrow().is_some() {
            self.detach();
        }
        self.base.unsubscribe_sink(sink);
    }

    fn unsubscribe_all(&self) {
        if self.stream.borrow().is_some() {
            self.detach();
        }
        self.base.unsubscribe_all();
    }

    fn state(&self) -> State {
        self.base.state()
    }

    fn num_subs(&self) -> usize {
        self.base.num_subs()
    }

    fn id(&self) -> &str {
        self.base.id()
    }
}

// ---------------------------------------------------------------------------
// Forwarder
// ---------------------------------------------------------------------------

/// The hidden internal subscription a metastream holds on its inner stream.
///
/// Captures the stream it was attached to, so a late notification from a
/// superseded stream (e.g. one still mid-dispatch when the switch happened)
/// can be identity-checked and discarded.
struct Forwarder<A: 'static, B: 'static> {
    owner: Weak<MetaStream<A, B>>,
    stream: Rc<dyn Stream<B>>,
    weak_self: Weak<Forwarder<A, B>>,
}

impl<A: 'static, B: 'static> Forwarder<A, B> {
    fn new(owner: Weak<MetaStream<A, B>>, stream: Rc<dyn Stream<B>>) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            owner,
            stream,
            weak_self: weak.clone(),
        })
    }
}

impl<A: 'static, B: 'static> Sink<B> for Forwarder<A, B> {
    fn next(&self, value: &B) {
        let Some(owner) = self.owner.upgrade() else {
            return;
        };
        // The crux: only the currently attached stream may reach the
        // metastream's subscribers.
        if owner.is_current(&self.stream) {
            owner.base.dispatch(value);
        }
    }

    fn done(&self) {
        let Some(owner) = self.owner.upgrade() else {
            return;
        };
        // Inner completion is local to that branch: clear the attachment so
        // the next incoming value can select a fresh stream, but do not
        // complete the metastream itself.
        if let Some(me) = self.weak_self.upgrade() {
            let sink: Rc<dyn Sink<B>> = me;
            self.stream.unsubscribe_sink(&sink);
        }
        owner.clear_if_current(&self.stream);
    }

    fn error(&self, err: &StreamError) {
        let Some(owner) = self.owner.upgrade() else {
            return;
        };
        owner.error(err.clone());
    }
}
