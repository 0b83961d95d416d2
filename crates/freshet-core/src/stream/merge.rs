//! N-input stream merge.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::trace;

use super::api::{same_stream, CommonOpts, Sink, State, Stream, SubKind, Subscribable};
use super::subscription::Subscription;
use crate::error::StreamError;

/// Joins any number of source streams into a single output.
///
/// Each source is attached through a hidden internal forwarding handle, the
/// same ownership pattern a [`MetaStream`](super::MetaStream) uses for its
/// inner stream. Sources can be added and removed while the merge is live. A
/// source completing removes itself; the merge completes when its *last*
/// source completes. A source error is the merge's error. Unsubscribing the
/// merge's last subscriber detaches all sources.
///
/// Values can also be pushed into the merge directly; it then acts as its own
/// additional source.
pub struct StreamMerge<T: 'static> {
    base: Subscription<T, T>,
    sources: RefCell<Vec<MergeSource<T>>>,
    weak_self: Weak<StreamMerge<T>>,
}

struct MergeSource<T: 'static> {
    stream: Rc<dyn Stream<T>>,
    handle: Rc<MergeInput<T>>,
}

impl<T: 'static> StreamMerge<T> {
    /// Creates an empty merge.
    pub fn new(opts: CommonOpts) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            base: Subscription::new_raw(None, opts, "merge"),
            sources: RefCell::new(Vec::new()),
            weak_self: weak.clone(),
        })
    }

    /// Creates a merge over the given sources.
    pub fn with_sources(sources: Vec<Rc<dyn Stream<T>>>, opts: CommonOpts) -> Rc<Self> {
        let merge = Self::new(opts);
        for source in sources {
            merge.add(source);
        }
        merge
    }

    /// Attaches another source stream. Ignored once terminal.
    pub fn add(&self, source: Rc<dyn Stream<T>>) {
        if self.base.state().is_terminal() {
            return;
        }
        trace!(id = %self.base.id(), source = %source.id(), "merge add");
        let handle = MergeInput::new(self.weak_self.clone(), source.clone());
        self.sources.borrow_mut().push(MergeSource {
            stream: source.clone(),
            handle: handle.clone(),
        });
        let sink: Rc<dyn Sink<T>> = handle;
        source.subscribe_sink(sink, SubKind::InternalForwarding);
    }

    /// Detaches a source stream. Removing an absent source is a no-op.
    pub fn remove(&self, source: &Rc<dyn Stream<T>>) {
        let found = {
            let mut sources = self.sources.borrow_mut();
            sources
                .iter()
                .position(|s| same_stream(&s.stream, source))
                .map(|idx| sources.remove(idx))
        };
        if let Some(removed) = found {
            trace!(id = %self.base.id(), source = %removed.stream.id(), "merge remove");
            let sink: Rc<dyn Sink<T>> = removed.handle;
            removed.stream.unsubscribe_sink(&sink);
        }
    }

    /// Pushes a value directly into the merge output.
    pub fn next(&self, value: &T) {
        self.base.dispatch(value);
    }

    /// Completes the merge, detaching all sources first.
    pub fn done(&self) {
        if self.base.state().is_terminal() {
            return;
        }
        self.detach_all();
        self.base.done();
    }

    /// Terminates the merge with an error, detaching all sources first.
    pub fn error(&self, err: StreamError) {
        if self.base.state().is_terminal() {
            return;
        }
        self.detach_all();
        self.base.error(err);
    }

    /// Number of currently attached sources.
    #[must_use]
    pub fn num_sources(&self) -> usize {
        self.sources.borrow().len()
    }

    fn detach_all(&self) {
        let sources = self.sources.borrow_mut().split_off(0);
        for source in sources {
            let sink: Rc<dyn Sink<T>> = source.handle;
            source.stream.unsubscribe_sink(&sink);
        }
    }

    /// Returns `true` if `stream` is an attached source.
    fn contains_source(&self, stream: &Rc<dyn Stream<T>>) -> bool {
        self.sources
            .borrow()
            .iter()
            .any(|s| same_stream(&s.stream, stream))
    }

    /// A source completed on its own: drop it, and complete the merge when
    /// it was the last one.
    fn source_done(&self, stream: &Rc<dyn Stream<T>>) {
        let emptied = {
            let mut sources = self.sources.borrow_mut();
            let before = sources.len();
            sources.retain(|s| !same_stream(&s.stream, stream));
            before != sources.len() && sources.is_empty()
        };
        if emptied {
            self.base.done();
        }
    }
}

impl<T: 'static> Sink<T> for StreamMerge<T> {
    fn next(&self, value: &T) {
        StreamMerge::next(self, value);
    }

    fn done(&self) {
        StreamMerge::done(self);
    }

    fn error(&self, err: &StreamError) {
        StreamMerge::error(self, err.clone());
    }
}

impl<T: 'static> Subscribable<T> for StreamMerge<T> {
    fn subscribe_sink(&self, sink: Rc<dyn Sink<T>>, kind: SubKind) {
        self.base.subscribe_sink(sink, kind);
    }

    fn unsubscribe_sink(&self, sink: &Rc<dyn Sink<T>>) {
        let leaves_none = self.base.num_subs() == 1 && self.base.contains_sink(sink);
        if leaves_none {
            self.detach_all();
        }
        self.base.unsubscribe_sink(sink);
    }

    fn unsubscribe_all(&self) {
        self.detach_all();
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
// MergeInput
// ---------------------------------------------------------------------------

/// The hidden internal subscription a merge holds on one of its sources.
struct MergeInput<T: 'static> {
    owner: Weak<StreamMerge<T>>,
    stream: Rc<dyn Stream<T>>,
    weak_self: Weak<MergeInput<T>>,
}

impl<T: 'static> MergeInput<T> {
    fn new(owner: Weak<StreamMerge<T>>, stream: Rc<dyn Stream<T>>) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            owner,
            stream,
            weak_self: weak.clone(),
        })
    }
}

impl<T: 'static> Sink<T> for MergeInput<T> {
    fn next(&self, value: &T) {
        let Some(owner) = self.owner.upgrade() else {
            return;
        };
        // A detached source still mid-dispatch may not leak values through.
        if owner.contains_source(&self.stream) {
            owner.base.dispatch(value);
        }
    }

    fn done(&self) {
        let Some(owner) = self.owner.upgrade() else {
            return;
        };
        if let Some(me) = self.weak_self.upgrade() {
            let sink: Rc<dyn Sink<T>> = me;
            self.stream.unsubscribe_sink(&sink);
        }
        owner.source_done(&self.stream);
    }

    fn error(&self, err: &StreamError) {
        let Some(owner) = self.owner.upgrade() else {
            return;
        };
        owner.error(err.clone());
    }
}
