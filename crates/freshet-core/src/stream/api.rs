//! Shared stream vocabulary: lifecycle states, construction options, and the
//! `Sink`/`Subscribable` traits every stream type speaks.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::StreamError;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle state of a stream.
///
/// The ordering is significant: `Done` and `Error` are terminal, and
/// everything `>= Done` refuses further activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
    /// Constructed, no value seen yet.
    Idle,
    /// At least one value has been received or dispatched.
    Active,
    /// Completed normally. Terminal.
    Done,
    /// Terminated by an error. Terminal.
    Error,
}

impl State {
    /// Returns `true` for `Done` and `Error`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self >= State::Done
    }
}

// ---------------------------------------------------------------------------
// CloseMode
// ---------------------------------------------------------------------------

/// Closeout policy: what a stream does when subscribers detach.
///
/// Streams that are switched in and out of a [`MetaStream`](crate::stream::MetaStream)
/// must use [`CloseMode::Never`], otherwise the detach performed on switch
/// closes them and they cannot be re-attached later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloseMode {
    /// Stay alive regardless of subscriber count (supports re-subscription).
    Never,
    /// Transition to `Done` as soon as any subscriber detaches.
    First,
    /// Transition to `Done` when the last subscriber detaches.
    #[default]
    Last,
}

// ---------------------------------------------------------------------------
// CommonOpts
// ---------------------------------------------------------------------------

/// Construction options accepted by every stream-producing constructor.
#[derive(Debug, Default)]
pub struct CommonOpts {
    /// Stream identifier, used for diagnostics only. Auto-generated when
    /// absent.
    pub id: Option<String>,
    /// Closeout policy. Defaults to [`CloseMode::Last`].
    pub close_out: CloseMode,
}

impl CommonOpts {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an explicit stream id.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the closeout policy.
    #[must_use]
    pub fn close_out(mut self, mode: CloseMode) -> Self {
        self.close_out = mode;
        self
    }

    /// Resolves the configured id, or generates `<prefix>-<n>` from a global
    /// monotonic counter.
    pub(crate) fn resolve_id(&mut self, prefix: &str) -> String {
        self.id.take().unwrap_or_else(|| gen_id(prefix))
    }
}

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Returns `<prefix>-<n>` with a globally unique `n`.
pub(crate) fn gen_id(prefix: &str) -> String {
    format!("{prefix}-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

// ---------------------------------------------------------------------------
// SubKind
// ---------------------------------------------------------------------------

/// Kind tag on a registered subscriber.
///
/// Hidden forwarding handles owned by composite streams (metastream inner
/// links, merge inputs) are tagged [`SubKind::InternalForwarding`] so they
/// can be told apart from user-facing subscriptions in diagnostics and
/// resource accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubKind {
    /// A user-facing subscription.
    External,
    /// A hidden handle held by a composite stream that owns the linkage.
    InternalForwarding,
}

// ---------------------------------------------------------------------------
// Sink / Subscribable / Stream
// ---------------------------------------------------------------------------

/// The receiving side of a stream link: anything values can be pushed into.
pub trait Sink<T> {
    /// Delivers the next value.
    fn next(&self, value: &T);
    /// Signals normal completion of the upstream.
    fn done(&self);
    /// Signals upstream termination by error.
    fn error(&self, err: &StreamError);
}

/// The producing side of a stream link: anything that fans out to sinks.
pub trait Subscribable<T: 'static> {
    /// Registers a downstream sink.
    ///
    /// If this stream is already terminal, the sink is immediately notified
    /// of the terminal state and is *not* registered.
    fn subscribe_sink(&self, sink: Rc<dyn Sink<T>>, kind: SubKind);

    /// Removes a previously registered sink. Removing an absent sink is an
    /// idempotent no-op. May trigger the closeout policy.
    fn unsubscribe_sink(&self, sink: &Rc<dyn Sink<T>>);

    /// Removes every registered sink. May trigger the closeout policy.
    fn unsubscribe_all(&self);

    /// Current lifecycle state.
    fn state(&self) -> State;

    /// Number of currently registered sinks (internal handles included).
    fn num_subs(&self) -> usize;

    /// Diagnostic identifier.
    fn id(&self) -> &str;
}

/// A full stream: consumes values ([`Sink`]) and fans them out
/// ([`Subscribable`]). Implemented automatically.
pub trait Stream<T: 'static>: Sink<T> + Subscribable<T> {}

impl<T: 'static, S> Stream<T> for S where S: Sink<T> + Subscribable<T> {}

// ---------------------------------------------------------------------------
// subscribe / unsubscribe helpers
// ---------------------------------------------------------------------------

/// Registers `child` as an external subscriber of `src` and returns it, so a
/// chain can keep the handle for later [`unsubscribe`].
pub fn subscribe<T, P, S>(src: &P, child: Rc<S>) -> Rc<S>
where
    T: 'static,
    P: Subscribable<T> + ?Sized,
    S: Sink<T> + 'static,
{
    let sink: Rc<dyn Sink<T>> = child.clone();
    src.subscribe_sink(sink, SubKind::External);
    child
}

/// Removes `child` from `src`. Idempotent.
pub fn unsubscribe<T, P, S>(src: &P, child: &Rc<S>)
where
    T: 'static,
    P: Subscribable<T> + ?Sized,
    S: Sink<T> + 'static,
{
    let sink: Rc<dyn Sink<T>> = child.clone();
    src.unsubscribe_sink(&sink);
}

/// Identity comparison for sinks: same heap allocation.
///
/// Compares allocation addresses only. `Rc::ptr_eq` on trait objects also
/// compares vtable pointers, which are not unique across codegen units.
pub(crate) fn same_sink<T: 'static>(a: &Rc<dyn Sink<T>>, b: &Rc<dyn Sink<T>>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// Identity comparison for streams: same heap allocation.
pub(crate) fn same_stream<T: 'static>(a: &Rc<dyn Stream<T>>, b: &Rc<dyn Stream<T>>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}
