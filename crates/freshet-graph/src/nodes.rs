//! Node factory helpers.
//!
//! Ready-made factories for the common node shapes: a single transformed
//! input (`node1`), an N-input merge (`node_merge`), and a latest-values
//! join emitting an object of all named inputs (`combine` / `combine_with`).

use std::cell::RefCell;
use std::rc::Rc;

use fxhash::FxHashMap;

use freshet_core::stream::{
    subscribe, CommonOpts, Observer, Sink, StreamMerge, SubKind, Subscription,
};
use freshet_core::Value;

use crate::error::GraphError;
use crate::spec::{NodeInputs, NodeStream};

/// Factory for a node with a single input named `src`, transformed by
/// `xform`.
pub fn node1(
    xform: impl FnMut(&Value) -> Option<Value> + 'static,
) -> impl FnOnce(&NodeInputs, &str) -> Result<NodeStream, GraphError> {
    move |ins, id| {
        let src = require_input(ins, id, "src")?;
        let node = Subscription::with_xform(xform, CommonOpts::new().id(id));
        subscribe(&**src, node.clone());
        Ok(node as NodeStream)
    }
}

/// Factory merging all declared inputs into one output stream.
pub fn node_merge() -> impl FnOnce(&NodeInputs, &str) -> Result<NodeStream, GraphError> {
    |ins, id| {
        let merge = StreamMerge::new(CommonOpts::new().id(id));
        for stream in ins.values() {
            merge.add(stream.clone());
        }
        Ok(merge as NodeStream)
    }
}

/// Factory joining the latest value of every declared input.
///
/// Once each input has delivered at least one value, every subsequent
/// delivery emits an object mapping input names to their latest values,
/// transformed by `xform`.
pub fn combine_with(
    xform: impl FnMut(&Value) -> Option<Value> + 'static,
) -> impl FnOnce(&NodeInputs, &str) -> Result<NodeStream, GraphError> {
    move |ins, id| {
        let hub = Subscription::with_xform(xform, CommonOpts::new().id(id));
        let latest: Rc<RefCell<FxHashMap<String, Value>>> =
            Rc::new(RefCell::new(FxHashMap::default()));
        let total = ins.len();
        for (name, src) in ins {
            let slot = name.clone();
            let latest = latest.clone();
            let hub = hub.clone();
            let tap = Rc::new(Observer::new().on_next(move |v: &Value| {
                latest.borrow_mut().insert(slot.clone(), v.clone());
                let ready = latest.borrow().len() == total;
                if ready {
                    let combined = Value::Object(
                        latest
                            .borrow()
                            .iter()
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect(),
                    );
                    hub.next(&combined);
                }
            }));
            let sink: Rc<dyn Sink<Value>> = tap;
            src.subscribe_sink(sink, SubKind::InternalForwarding);
        }
        Ok(hub as NodeStream)
    }
}

/// Factory emitting the latest values of all inputs as an object, unchanged.
pub fn combine() -> impl FnOnce(&NodeInputs, &str) -> Result<NodeStream, GraphError> {
    combine_with(|v: &Value| Some(v.clone()))
}

/// Factory summing the numeric latest values of all inputs.
pub fn add() -> impl FnOnce(&NodeInputs, &str) -> Result<NodeStream, GraphError> {
    combine_with(|v: &Value| {
        let sum: f64 = v.as_object()?.values().filter_map(Value::as_f64).sum();
        Some(Value::from(sum))
    })
}

/// Looks up a required named input, turning absence into a factory fault.
fn require_input<'i>(
    ins: &'i NodeInputs,
    id: &str,
    name: &str,
) -> Result<&'i NodeStream, GraphError> {
    ins.get(name).ok_or_else(|| GraphError::Factory {
        node: id.to_string(),
        reason: format!("missing input '{name}'"),
    })
}
