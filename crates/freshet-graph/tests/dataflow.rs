//! End-to-end dataflow scenarios: declarative specs compiled into live
//! graphs, driven through shared state updates.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;

use freshet_core::stream::{subscribe, CommonOpts, MetaStream, Observer, Stream};
use freshet_graph::{
    compile, nodes, Atom, GraphError, GraphSpec, InputSpec, NodeInputs, NodeSpec, NodeStream,
    OutputSpec, Value,
};

fn collect(stream: &dyn Stream<Value>) -> Rc<RefCell<Vec<Value>>> {
    let values = Rc::new(RefCell::new(Vec::new()));
    let sink = values.clone();
    subscribe(
        stream,
        Rc::new(Observer::new().on_next(move |v: &Value| sink.borrow_mut().push(v.clone()))),
    );
    values
}

#[test]
fn sum_and_scale_pipeline() {
    let atom = Atom::new(json!({"a": 0, "b": 0}));
    // `scaled` is declared before the node it references.
    let spec = GraphSpec::new()
        .node(
            "scaled",
            NodeSpec::new(nodes::node1(|v| v.as_f64().map(|n| (n * 10.0).into())))
                .input("src", InputSpec::stream("/sum/node")),
        )
        .node(
            "sum",
            NodeSpec::new(nodes::add())
                .input("a", InputSpec::path("a"))
                .input("b", InputSpec::path("b")),
        );
    let graph = compile(spec, &atom).expect("spec compiles");

    let sums = collect(&*graph.stream("sum").expect("sum node"));
    let scaled = collect(&*graph.stream("scaled").expect("scaled node"));

    atom.reset(json!({"a": 3, "b": 4}));
    atom.reset(json!({"a": 3, "b": 10}));

    assert_eq!(*sums.borrow(), vec![json!(7.0), json!(13.0)]);
    assert_eq!(*scaled.borrow(), vec![json!(70.0), json!(130.0)]);
}

#[test]
fn metastream_node_routes_between_state_views() {
    let atom = Atom::new(json!({"mode": null, "a": 0, "b": 0}));

    // The router's factory builds a metastream switching between the two
    // value views based on the control input.
    let router_atom = atom.clone();
    let router = NodeSpec::new(move |ins: &NodeInputs, id: &str| {
        let ctrl = ins.get("ctrl").ok_or_else(|| GraphError::Factory {
            node: id.to_string(),
            reason: "missing input 'ctrl'".to_string(),
        })?;
        let a = router_atom.view(&"a".parse().expect("path"));
        let b = router_atom.view(&"b".parse().expect("path"));
        let meta = MetaStream::new(
            move |mode: &Value| {
                Some(match mode.as_str() {
                    Some("a") => a.clone() as NodeStream,
                    _ => b.clone() as NodeStream,
                })
            },
            CommonOpts::new().id(id),
        );
        subscribe(&**ctrl, meta.clone());
        Ok(meta as NodeStream)
    })
    .input("ctrl", InputSpec::path("mode"));

    let spec = GraphSpec::new().node("router", router);
    let graph = compile(spec, &atom).expect("spec compiles");
    let routed = collect(&*graph.stream("router").expect("router node"));

    let path = |s: &str| s.parse().expect("path");

    // Select the `a` branch, then drive both branches.
    atom.reset_in(&path("mode"), json!("a"));
    atom.reset_in(&path("a"), json!(1));
    atom.reset_in(&path("b"), json!(100));
    assert_eq!(*routed.borrow(), vec![json!(1)]);

    // Switch to `b`: the superseded branch no longer reaches the output.
    atom.reset_in(&path("mode"), json!("b"));
    atom.reset_in(&path("b"), json!(101));
    atom.reset_in(&path("a"), json!(2));
    assert_eq!(*routed.borrow(), vec![json!(1), json!(101)]);

    // And back again.
    atom.reset_in(&path("mode"), json!("a"));
    atom.reset_in(&path("a"), json!(3));
    assert_eq!(*routed.borrow(), vec![json!(1), json!(101), json!(3)]);
}

#[test]
fn output_declarations_compose_across_nodes() {
    let atom = Atom::new(json!({"a": 0, "b": 0}));
    let spec = GraphSpec::new()
        .node(
            "pair",
            NodeSpec::new(nodes::combine())
                .input("a", InputSpec::path("a"))
                .input("b", InputSpec::path("b"))
                .output("first", OutputSpec::path("a"))
                .output("second", OutputSpec::path("b")),
        )
        .node(
            "second_plus_one",
            NodeSpec::new(nodes::node1(|v| v.as_i64().map(|n| (n + 1).into())))
                .input("src", InputSpec::stream("/pair/outs/second")),
        );
    let graph = compile(spec, &atom).expect("spec compiles");
    let firsts = collect(&*graph.node("pair").unwrap().output("first").unwrap());
    let bumped = collect(&*graph.stream("second_plus_one").unwrap());

    atom.reset(json!({"a": 10, "b": 20}));
    assert_eq!(*firsts.borrow(), vec![json!(10)]);
    assert_eq!(*bumped.borrow(), vec![json!(21)]);
}
