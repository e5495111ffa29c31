//! Property-based tests for the universal invariants in the core's design notes: parse
//! determinism, topological order as a linear extension of the CFG, and annotation
//! round-trip stability.

use proptest::prelude::*;

use flowlang_core::ast::{Connection, DataType, Endpoint, NodeInstance, NodeType, PortDef, Workflow};
use flowlang_core::error::FlowError;
use flowlang_core::{analyzer, generate_annotations, parse};

/// Build a linear chain `a -> b -> c -> ...` of `n` branching nodes, each wired
/// `onSuccess -> execute` into the next, with the last one's `onSuccess` routed to `Exit`.
fn linear_chain(n: usize) -> Workflow {
    let mut wf = Workflow::new("chain");
    let mut t = NodeType::new("Step", "step");
    t.has_success_port = true;
    t.has_failure_port = true;
    wf.node_types.insert("Step", t);

    let ids: Vec<String> = (0..n).map(|i| format!("n{i}")).collect();
    for id in &ids {
        wf.instances.insert(id.clone(), NodeInstance::new(id.clone(), "Step"));
    }
    for pair in ids.windows(2) {
        wf.connections.push(Connection {
            from: Endpoint::new(pair[0].clone(), "onSuccess"),
            to: Endpoint::new(pair[1].clone(), "execute"),
        });
    }
    if let Some(last) = ids.last() {
        wf.connections.push(Connection {
            from: Endpoint::new(last.clone(), "onSuccess"),
            to: Endpoint::new("Exit", "onSuccess"),
        });
    }
    wf
}

/// Regression for the CFG builder excluding data edges: a workflow where a data-only wire
/// runs counter to declaration order must still schedule the data's producer before its
/// consumer, not just the nodes reachable via control edges.
#[test]
fn data_dependency_forces_order_against_declaration_tiebreak() {
    let mut wf = Workflow::new("sample");
    let mut producer = NodeType::new("Producer", "produce");
    producer.outputs.insert("value", PortDef::new("value", DataType::Number));
    wf.node_types.insert("Producer", producer);
    let mut consumer = NodeType::new("Consumer", "consume");
    consumer.inputs.insert("x", PortDef::new("x", DataType::Number));
    wf.node_types.insert("Consumer", consumer);

    // Declared in consumer-first order, and neither has a control-flow connection to the
    // other, so the pre-fix control-only CFG would tie-break "c" ahead of "b" by
    // declaration order alone.
    wf.instances.insert("c", NodeInstance::new("c", "Consumer"));
    wf.instances.insert("b", NodeInstance::new("b", "Producer"));
    wf.connections.push(Connection { from: Endpoint::new("b", "value"), to: Endpoint::new("c", "x") });

    let analysis = analyzer::analyze(&wf).unwrap();
    let b_pos = analysis.topo_order.iter().position(|x| x == "b").unwrap();
    let c_pos = analysis.topo_order.iter().position(|x| x == "c").unwrap();
    assert!(b_pos < c_pos, "data producer must precede its consumer: {:?}", analysis.topo_order);
}

/// A data edge whose direction contradicts the declared control order creates a genuine
/// cross-kind cycle once data edges are part of the CFG (the old control-only CFG could
/// not see it and would have silently scheduled the data consumer before its producer).
#[test]
fn data_edge_against_control_order_is_reported_as_a_cycle() {
    let mut wf = Workflow::new("sample");
    let mut a = NodeType::new("A", "a_fn");
    a.has_success_port = true;
    a.outputs.insert("out", PortDef::new("out", DataType::Number));
    wf.node_types.insert("A", a);
    let mut c = NodeType::new("C", "c_fn");
    c.has_success_port = true;
    c.inputs.insert("in", PortDef::new("in", DataType::Number));
    wf.node_types.insert("C", c);

    wf.instances.insert("a", NodeInstance::new("a", "A"));
    wf.instances.insert("c", NodeInstance::new("c", "C"));
    // c control-precedes a ...
    wf.connections.push(Connection { from: Endpoint::new("c", "onSuccess"), to: Endpoint::new("a", "execute") });
    // ... but a's data-only output feeds c, a direction only a correct schedule of
    // "a before c" could satisfy.
    wf.connections.push(Connection { from: Endpoint::new("a", "out"), to: Endpoint::new("c", "in") });

    let result = analyzer::analyze(&wf);
    assert!(matches!(result, Err(FlowError::Cycle(_))), "expected a structural cycle");
    if let Err(FlowError::Cycle(nodes)) = result {
        assert!(nodes.contains(&"a".to_string()));
        assert!(nodes.contains(&"c".to_string()));
    }
}

proptest! {
    /// A linear chain of any length has a topological order that is a linear extension of
    /// declaration order — every node appears after every node it depends on.
    #[test]
    fn topo_order_respects_chain_dependencies(n in 1usize..25) {
        let wf = linear_chain(n);
        let analysis = analyzer::analyze(&wf).unwrap();
        let ids: Vec<String> = (0..n).map(|i| format!("n{i}")).collect();
        let positions: Vec<usize> = ids
            .iter()
            .map(|id| analysis.topo_order.iter().position(|x| x == id).unwrap())
            .collect();
        for window in positions.windows(2) {
            prop_assert!(window[0] < window[1]);
        }
    }

    /// Two analyses of the same workflow always produce the identical topological order
    /// (insertion-order tie-breaking is deterministic, not hash-order dependent).
    #[test]
    fn analysis_is_deterministic(n in 1usize..25) {
        let wf = linear_chain(n);
        let a1 = analyzer::analyze(&wf).unwrap();
        let a2 = analyzer::analyze(&wf).unwrap();
        prop_assert_eq!(a1.topo_order, a2.topo_order);
    }

    /// `generate_annotations` always emits a re-parseable block: re-parsing it yields a
    /// workflow with the same connection count (permutation-insensitive round-trip).
    #[test]
    fn annotation_round_trip_preserves_connection_count(n in 1usize..10) {
        let wf = linear_chain(n);
        let annotated = generate_annotations(&wf);
        let src = format!("/**\n{annotated}*/\npub fn chain() {{}}\n");
        let reparsed = parse(&src);
        prop_assert_eq!(reparsed.workflows.len(), 1);
        prop_assert_eq!(reparsed.workflows[0].connections.len(), wf.connections.len());
    }
}
