//! Leaf consumers built from optional callbacks.

use std::cell::RefCell;

use super::api::Sink;
use crate::error::StreamError;

/// A [`Sink`] assembled from optional `next`/`done`/`error` callbacks.
///
/// Callbacks not provided are silently skipped, so a consumer only
/// interested in values can ignore lifecycle notifications entirely.
pub struct Observer<T: 'static> {
    next_fn: RefCell<Option<Box<dyn FnMut(&T)>>>,
    done_fn: RefCell<Option<Box<dyn FnMut()>>>,
    error_fn: RefCell<Option<Box<dyn FnMut(&StreamError)>>>,
}

impl<T: 'static> Observer<T> {
    /// Creates an observer with no callbacks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_fn: RefCell::new(None),
            done_fn: RefCell::new(None),
            error_fn: RefCell::new(None),
        }
    }

    /// Sets the value callback.
    #[must_use]
    pub fn on_next(self, f: impl FnMut(&T) + 'static) -> Self {
        *self.next_fn.borrow_mut() = Some(Box::new(f));
        self
    }

    /// Sets the completion callback.
    #[must_use]
    pub fn on_done(self, f: impl FnMut() + 'static) -> Self {
        *self.done_fn.borrow_mut() = Some(Box::new(f));
        self
    }

    /// Sets the error callback.
    #[must_use]
    pub fn on_error(self, f: impl FnMut(&StreamError) + 'static) -> Self {
        *self.error_fn.borrow_mut() = Some(Box::new(f));
        self
    }
}

impl<T: 'static> Default for Observer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Sink<T> for Observer<T> {
    fn next(&self, value: &T) {
        if let Some(f) = self.next_fn.borrow_mut().as_mut() {
            f(value);
        }
    }

    fn done(&self) {
        if let Some(f) = self.done_fn.borrow_mut().as_mut() {
            f();
        }
    }

    fn error(&self, err: &StreamError) {
        if let Some(f) = self.error_fn.borrow_mut().as_mut() {
            f(err);
        }
    }
}
