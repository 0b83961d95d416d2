//! Unit tests for the subscription state machine, metastream switching, and
//! stream merging.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::*;
use crate::error::StreamError;

/// Recording consumer: collected values plus lifecycle counters.
struct Probe {
    obs: Rc<Observer<i64>>,
    values: Rc<RefCell<Vec<i64>>>,
    done: Rc<Cell<u32>>,
    errors: Rc<RefCell<Vec<StreamError>>>,
}

fn probe() -> Probe {
    let values = Rc::new(RefCell::new(Vec::new()));
    let done = Rc::new(Cell::new(0));
    let errors = Rc::new(RefCell::new(Vec::new()));
    let (v, d, e) = (values.clone(), done.clone(), errors.clone());
    let obs = Rc::new(
        Observer::new()
            .on_next(move |x: &i64| v.borrow_mut().push(*x))
            .on_done(move || d.set(d.get() + 1))
            .on_error(move |err: &StreamError| e.borrow_mut().push(err.clone())),
    );
    Probe {
        obs,
        values,
        done,
        errors,
    }
}

/// A live identity stream usable as a metastream input.
fn live_stream() -> Rc<Subscription<i64, i64>> {
    Subscription::identity(CommonOpts::new().close_out(CloseMode::Never))
}

// ---- Subscription lifecycle ----

#[test]
fn test_next_dispatches_in_insertion_order() {
    let sub = Subscription::<i64, i64>::identity(CommonOpts::default());
    let order = Rc::new(RefCell::new(Vec::new()));
    let (o1, o2) = (order.clone(), order.clone());
    subscribe(
        &*sub,
        Rc::new(Observer::new().on_next(move |x: &i64| o1.borrow_mut().push(("a", *x)))),
    );
    subscribe(
        &*sub,
        Rc::new(Observer::new().on_next(move |x: &i64| o2.borrow_mut().push(("b", *x)))),
    );
    sub.next(&1);
    sub.next(&2);
    assert_eq!(
        *order.borrow(),
        vec![("a", 1), ("b", 1), ("a", 2), ("b", 2)]
    );
}

#[test]
fn test_xform_applies_and_suppresses() {
    let evens_doubled =
        Subscription::with_xform(|x: &i64| (x % 2 == 0).then_some(x * 2), CommonOpts::default());
    let p = probe();
    subscribe(&*evens_doubled, p.obs.clone());
    for x in [1, 2, 3, 4] {
        evens_doubled.next(&x);
    }
    assert_eq!(*p.values.borrow(), vec![4, 8]);
}

#[test]
fn test_state_transitions() {
    let sub = Subscription::<i64, i64>::identity(CommonOpts::default());
    assert_eq!(sub.state(), State::Idle);
    sub.next(&1);
    assert_eq!(sub.state(), State::Active);
    sub.done();
    assert_eq!(sub.state(), State::Done);
    assert!(sub.state().is_terminal());
}

#[test]
fn test_done_fires_exactly_once() {
    let sub = Subscription::<i64, i64>::identity(CommonOpts::default());
    let p = probe();
    subscribe(&*sub, p.obs.clone());
    sub.done();
    sub.done();
    sub.error(StreamError::msg("late"));
    assert_eq!(p.done.get(), 1);
    assert!(p.errors.borrow().is_empty());
}

#[test]
fn test_error_fires_exactly_once_and_is_terminal() {
    let sub = Subscription::<i64, i64>::identity(CommonOpts::default());
    let p = probe();
    subscribe(&*sub, p.obs.clone());
    sub.error(StreamError::msg("boom"));
    sub.error(StreamError::msg("again"));
    sub.next(&1);
    sub.done();
    assert_eq!(p.errors.borrow().len(), 1);
    assert_eq!(p.errors.borrow()[0], StreamError::msg("boom"));
    assert_eq!(p.done.get(), 0);
    assert!(p.values.borrow().is_empty());
    assert_eq!(sub.state(), State::Error);
}

#[test]
fn test_next_after_terminal_is_silent() {
    let sub = Subscription::<i64, i64>::identity(CommonOpts::default());
    let p = probe();
    subscribe(&*sub, p.obs.clone());
    sub.next(&1);
    sub.done();
    sub.next(&2);
    assert_eq!(*p.values.borrow(), vec![1]);
}

#[test]
fn test_subscribe_after_done_notifies_immediately() {
    let sub = Subscription::<i64, i64>::identity(CommonOpts::default());
    sub.done();
    let p = probe();
    subscribe(&*sub, p.obs.clone());
    assert_eq!(p.done.get(), 1);
    assert_eq!(sub.num_subs(), 0);
}

#[test]
fn test_subscribe_after_error_notifies_immediately() {
    let sub = Subscription::<i64, i64>::identity(CommonOpts::default());
    sub.error(StreamError::msg("gone"));
    let p = probe();
    subscribe(&*sub, p.obs.clone());
    assert_eq!(p.errors.borrow().len(), 1);
    assert_eq!(sub.num_subs(), 0);
}

#[test]
fn test_unsubscribe_is_idempotent() {
    let sub = Subscription::<i64, i64>::identity(CommonOpts::new().close_out(CloseMode::Never));
    let p = probe();
    subscribe(&*sub, p.obs.clone());
    unsubscribe(&*sub, &p.obs);
    unsubscribe(&*sub, &p.obs);
    assert_eq!(sub.num_subs(), 0);
    sub.next(&1);
    assert!(p.values.borrow().is_empty());
}

#[test]
fn test_unsubscribe_absent_child_is_noop() {
    let sub = Subscription::<i64, i64>::identity(CommonOpts::default());
    let p1 = probe();
    let p2 = probe();
    subscribe(&*sub, p1.obs.clone());
    unsubscribe(&*sub, &p2.obs);
    assert_eq!(sub.num_subs(), 1);
    assert_eq!(sub.state(), State::Idle);
}

#[test]
fn test_custom_id_and_generated_id() {
    let named = Subscription::<i64, i64>::identity(CommonOpts::new().id("totals"));
    assert_eq!(named.id(), "totals");
    let anon = Subscription::<i64, i64>::identity(CommonOpts::default());
    assert!(anon.id().starts_with("sub-"));
}

// ---- Closeout policy ----

#[test]
fn test_close_mode_last_closes_on_last_unsubscribe() {
    let sub = Subscription::<i64, i64>::identity(CommonOpts::new().close_out(CloseMode::Last));
    let p1 = probe();
    let p2 = probe();
    subscribe(&*sub, p1.obs.clone());
    subscribe(&*sub, p2.obs.clone());
    unsubscribe(&*sub, &p1.obs);
    assert_eq!(sub.state(), State::Idle);
    unsubscribe(&*sub, &p2.obs);
    assert_eq!(sub.state(), State::Done);
}

#[test]
fn test_close_mode_first_closes_on_first_unsubscribe() {
    let sub = Subscription::<i64, i64>::identity(CommonOpts::new().close_out(CloseMode::First));
    let p1 = probe();
    let p2 = probe();
    subscribe(&*sub, p1.obs.clone());
    subscribe(&*sub, p2.obs.clone());
    unsubscribe(&*sub, &p1.obs);
    assert_eq!(sub.state(), State::Done);
    // The remaining subscriber was notified of completion.
    assert_eq!(p2.done.get(), 1);
}

#[test]
fn test_close_mode_never_survives_resubscription() {
    let sub = Subscription::<i64, i64>::identity(CommonOpts::new().close_out(CloseMode::Never));
    let p = probe();
    subscribe(&*sub, p.obs.clone());
    unsubscribe(&*sub, &p.obs);
    assert_eq!(sub.state(), State::Idle);
    subscribe(&*sub, p.obs.clone());
    sub.next(&7);
    assert_eq!(*p.values.borrow(), vec![7]);
}

// ---- MetaStream ----

#[test]
fn test_metastream_odd_even_scenario() {
    // Odd input: a stream that will carry 3 copies of the value. Even
    // input: no stream.
    let made: Rc<RefCell<Vec<Rc<Subscription<i64, i64>>>>> = Rc::new(RefCell::new(Vec::new()));
    let created = made.clone();
    let meta = MetaStream::new(
        move |x: &i64| {
            if x % 2 != 0 {
                let s = live_stream();
                created.borrow_mut().push(s.clone());
                Some(s as Rc<dyn Stream<i64>>)
            } else {
                None
            }
        },
        CommonOpts::default(),
    );
    let p = probe();
    subscribe(&*meta, p.obs.clone());

    meta.next(&23);
    let first = made.borrow()[0].clone();
    for _ in 0..3 {
        first.next(&23);
    }
    assert_eq!(*p.values.borrow(), vec![23, 23, 23]);

    // Even value: ignored by the factory, and the previous stream is
    // already detached, so feeding it leaks nothing.
    meta.next(&42);
    first.next(&23);
    assert_eq!(*p.values.borrow(), vec![23, 23, 23]);

    meta.next(&43);
    let second = made.borrow()[1].clone();
    for _ in 0..3 {
        second.next(&43);
    }
    assert_eq!(*p.values.borrow(), vec![23, 23, 23, 43, 43, 43]);
}

#[test]
fn test_metastream_concatenates_inner_streams_in_push_order() {
    let made: Rc<RefCell<Vec<Rc<Subscription<i64, i64>>>>> = Rc::new(RefCell::new(Vec::new()));
    let created = made.clone();
    let meta = MetaStream::new(
        move |_: &i64| {
            let s = live_stream();
            created.borrow_mut().push(s.clone());
            Some(s as Rc<dyn Stream<i64>>)
        },
        CommonOpts::default(),
    );
    let p = probe();
    subscribe(&*meta, p.obs.clone());

    meta.next(&10);
    let s1 = made.borrow()[0].clone();
    s1.next(&11);
    s1.next(&12);
    s1.done();

    meta.next(&20);
    let s2 = made.borrow()[1].clone();
    s2.next(&21);
    // Superseded stream (completed) never reappears.
    s1.next(&99);
    assert_eq!(*p.values.borrow(), vec![11, 12, 21]);
}

#[test]
fn test_metastream_switch_detaches_previous_inner() {
    let a = live_stream();
    let b = live_stream();
    let (fa, fb) = (a.clone(), b.clone());
    let meta = MetaStream::new(
        move |flag: &i64| {
            Some(if *flag != 0 {
                fa.clone() as Rc<dyn Stream<i64>>
            } else {
                fb.clone() as Rc<dyn Stream<i64>>
            })
        },
        CommonOpts::default(),
    );
    let p = probe();
    subscribe(&*meta, p.obs.clone());

    meta.next(&1);
    assert_eq!(a.num_subs(), 1);
    a.next(&100);

    meta.next(&0);
    assert_eq!(a.num_subs(), 0);
    assert_eq!(b.num_subs(), 1);
    // Values from the superseded stream are gone; the new one flows.
    a.next(&101);
    b.next(&200);
    assert_eq!(*p.values.borrow(), vec![100, 200]);

    // Switching back works because the inputs never close.
    meta.next(&1);
    a.next(&102);
    assert_eq!(*p.values.borrow(), vec![100, 200, 102]);
}

#[test]
fn test_metastream_inner_completion_is_not_terminal() {
    let made: Rc<RefCell<Vec<Rc<Subscription<i64, i64>>>>> = Rc::new(RefCell::new(Vec::new()));
    let created = made.clone();
    let meta = MetaStream::new(
        move |_: &i64| {
            let s = live_stream();
            created.borrow_mut().push(s.clone());
            Some(s as Rc<dyn Stream<i64>>)
        },
        CommonOpts::default(),
    );
    let p = probe();
    subscribe(&*meta, p.obs.clone());

    meta.next(&1);
    made.borrow()[0].done();
    assert_eq!(p.done.get(), 0);
    assert!(!meta.has_inner());
    assert!(!meta.state().is_terminal());

    // A fresh value selects a fresh stream.
    meta.next(&2);
    made.borrow()[1].next(&5);
    assert_eq!(*p.values.borrow(), vec![5]);
}

#[test]
fn test_metastream_inner_error_is_terminal() {
    let inner = live_stream();
    let fi = inner.clone();
    let meta = MetaStream::new(
        move |_: &i64| Some(fi.clone() as Rc<dyn Stream<i64>>),
        CommonOpts::default(),
    );
    let p = probe();
    subscribe(&*meta, p.obs.clone());

    meta.next(&1);
    inner.error(StreamError::msg("inner failed"));
    assert_eq!(meta.state(), State::Error);
    assert_eq!(p.errors.borrow().len(), 1);
    assert!(!meta.has_inner());
}

#[test]
fn test_metastream_done_without_inner() {
    let meta: Rc<MetaStream<i64, i64>> =
        MetaStream::new(|_: &i64| None, CommonOpts::default());
    let p = probe();
    subscribe(&*meta, p.obs.clone());
    meta.done();
    assert_eq!(meta.state(), State::Done);
    assert_eq!(p.done.get(), 1);
}

#[test]
fn test_metastream_done_detaches_inner_first() {
    let inner = live_stream();
    let fi = inner.clone();
    let meta = MetaStream::new(
        move |_: &i64| Some(fi.clone() as Rc<dyn Stream<i64>>),
        CommonOpts::default(),
    );
    let p = probe();
    subscribe(&*meta, p.obs.clone());
    meta.next(&1);
    assert_eq!(inner.num_subs(), 1);
    meta.done();
    assert_eq!(inner.num_subs(), 0);
    assert_eq!(p.done.get(), 1);
}

#[test]
fn test_metastream_unsubscribe_last_releases_inner() {
    let inner = live_stream();
    let before = inner.num_subs();
    let fi = inner.clone();
    let meta = MetaStream::new(
        move |_: &i64| Some(fi.clone() as Rc<dyn Stream<i64>>),
        CommonOpts::default(),
    );
    let p = probe();
    subscribe(&*meta, p.obs.clone());
    meta.next(&1);
    assert_eq!(inner.num_subs(), before + 1);

    unsubscribe(&*meta, &p.obs);
    assert_eq!(inner.num_subs(), before);
    assert!(!meta.has_inner());
}

#[test]
fn test_metastream_unsubscribe_non_last_keeps_inner() {
    let inner = live_stream();
    let fi = inner.clone();
    let meta = MetaStream::new(
        move |_: &i64| Some(fi.clone() as Rc<dyn Stream<i64>>),
        CommonOpts::default(),
    );
    let p1 = probe();
    let p2 = probe();
    subscribe(&*meta, p1.obs.clone());
    subscribe(&*meta, p2.obs.clone());
    meta.next(&1);

    unsubscribe(&*meta, &p1.obs);
    assert!(meta.has_inner());
    inner.next(&9);
    assert_eq!(*p2.values.borrow(), vec![9]);
}

// ---- StreamMerge ----

#[test]
fn test_merge_interleaves_sources() {
    let a = live_stream();
    let b = live_stream();
    let merge = StreamMerge::with_sources(
        vec![
            a.clone() as Rc<dyn Stream<i64>>,
            b.clone() as Rc<dyn Stream<i64>>,
        ],
        CommonOpts::default(),
    );
    let p = probe();
    subscribe(&*merge, p.obs.clone());
    a.next(&1);
    b.next(&2);
    a.next(&3);
    assert_eq!(*p.values.borrow(), vec![1, 2, 3]);
}

#[test]
fn test_merge_completes_with_last_source() {
    let a = live_stream();
    let b = live_stream();
    let merge = StreamMerge::with_sources(
        vec![
            a.clone() as Rc<dyn Stream<i64>>,
            b.clone() as Rc<dyn Stream<i64>>,
        ],
        CommonOpts::default(),
    );
    let p = probe();
    subscribe(&*merge, p.obs.clone());
    a.done();
    assert_eq!(p.done.get(), 0);
    assert_eq!(merge.num_sources(), 1);
    b.done();
    assert_eq!(p.done.get(), 1);
    assert_eq!(merge.state(), State::Done);
}

#[test]
fn test_merge_propagates_source_error() {
    let a = live_stream();
    let b = live_stream();
    let merge = StreamMerge::with_sources(
        vec![
            a.clone() as Rc<dyn Stream<i64>>,
            b.clone() as Rc<dyn Stream<i64>>,
        ],
        CommonOpts::default(),
    );
    let p = probe();
    subscribe(&*merge, p.obs.clone());
    a.error(StreamError::msg("dead source"));
    assert_eq!(merge.state(), State::Error);
    assert_eq!(p.errors.borrow().len(), 1);
    // All sources were released.
    assert_eq!(b.num_subs(), 0);
}

#[test]
fn test_merge_remove_detaches_source() {
    let a = live_stream();
    let merge = StreamMerge::with_sources(
        vec![a.clone() as Rc<dyn Stream<i64>>],
        CommonOpts::default(),
    );
    let p = probe();
    subscribe(&*merge, p.obs.clone());
    let dyn_a = a.clone() as Rc<dyn Stream<i64>>;
    merge.remove(&dyn_a);
    assert_eq!(a.num_subs(), 0);
    a.next(&1);
    assert!(p.values.borrow().is_empty());
    // Explicit removal does not complete the merge.
    assert!(!merge.state().is_terminal());
}

#[test]
fn test_merge_unsubscribe_last_releases_sources() {
    let a = live_stream();
    let merge = StreamMerge::with_sources(
        vec![a.clone() as Rc<dyn Stream<i64>>],
        CommonOpts::default(),
    );
    let p = probe();
    subscribe(&*merge, p.obs.clone());
    assert_eq!(a.num_subs(), 1);
    unsubscribe(&*merge, &p.obs);
    assert_eq!(a.num_subs(), 0);
    assert_eq!(merge.num_sources(), 0);
}
