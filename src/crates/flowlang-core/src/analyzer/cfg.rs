//! Control-flow graph construction.
//!
//! The CFG carries *every* non-scoped connection — control-flow edges (source port is a
//! `STEP`-typed output: `onSuccess`/`onFailure`/custom step ports) and data edges alike —
//! each tagged with [`CfgEdge::is_control`]. Data edges must be present so the topological
//! order (`analyzer::topo`) respects data dependency even when a data wire runs against
//! the declared control order (e.g. a node reads another's output before the control graph
//! would otherwise schedule it). Consumers that care specifically about control flow
//! (branch region discovery, chain detection, guard-expression construction) filter down
//! to `is_control` edges via [`Cfg::control_successors`]/[`Cfg::control_predecessors`]
//! rather than seeing data edges at all. [`crate::ast::START_NODE`] and
//! [`crate::ast::EXIT_NODE`] are synthesized: every node with no incoming edge (of either
//! kind) gets a `Start -> node` edge, and every node with no outgoing edge gets a
//! `node -> Exit` edge, so the graph always has a single source and sink for topological
//! sorting and reachability analysis. Self-edges (a node's own output feeding its own
//! input, used by retry/loop node types) are kept as-is; they are excluded from the
//! acyclic topo-order check but retained for CFG consumers that want to see the loop
//! back-edge (the emitter's chain/branch analysis).

use std::collections::{HashMap, HashSet};

use crate::ast::{Workflow, EXIT_NODE, START_NODE};

/// A directed CFG edge, annotated with the port that carried it and whether that port is
/// control-flow (`STEP`) or data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfgEdge {
    pub from: String,
    pub from_port: String,
    pub to: String,
    pub is_control: bool,
}

/// The control-flow graph: adjacency lists in both directions plus the full edge list.
#[derive(Debug, Clone, Default)]
pub struct Cfg {
    pub edges: Vec<CfgEdge>,
    pub successors: HashMap<String, Vec<CfgEdge>>,
    pub predecessors: HashMap<String, Vec<CfgEdge>>,
}

impl Cfg {
    pub fn self_edges(&self) -> impl Iterator<Item = &CfgEdge> {
        self.edges.iter().filter(|e| e.from == e.to)
    }

    pub fn nodes(&self) -> HashSet<&str> {
        let mut set = HashSet::new();
        for e in &self.edges {
            set.insert(e.from.as_str());
            set.insert(e.to.as_str());
        }
        set
    }

    /// `node`'s outgoing control-flow edges only, ignoring data edges. Used by branch
    /// region discovery, chain detection, and guard-expression construction, all of which
    /// reason purely about control flow.
    pub fn control_successors(&self, node: &str) -> impl Iterator<Item = &CfgEdge> {
        self.successors.get(node).into_iter().flatten().filter(|e| e.is_control)
    }

    /// `node`'s incoming control-flow edges only, ignoring data edges.
    pub fn control_predecessors(&self, node: &str) -> impl Iterator<Item = &CfgEdge> {
        self.predecessors.get(node).into_iter().flatten().filter(|e| e.is_control)
    }
}

fn is_control_port(wf: &Workflow, node: &str, port: &str) -> bool {
    wf.node_type_for(node)
        .map(|nt| {
            nt.outputs
                .get(port)
                .map(|p| p.is_control_flow)
                .unwrap_or(port == "onSuccess" || port == "onFailure")
        })
        .unwrap_or(port == "onSuccess" || port == "onFailure")
}

/// Build the CFG for `workflow`, synthesizing `Start`/`Exit` edges. Every non-scoped
/// connection becomes an edge (control or data); a scoped endpoint (either side) marks a
/// per-port-scoped wire and is excluded — those live inside a scope function's closure,
/// not the top-level CFG.
pub fn build(workflow: &Workflow) -> Cfg {
    let mut cfg = Cfg::default();
    let mut has_incoming: HashSet<String> = HashSet::new();
    let mut has_outgoing: HashSet<String> = HashSet::new();

    for conn in &workflow.connections {
        if conn.from.scope.is_some() || conn.to.scope.is_some() {
            continue;
        }
        let edge = CfgEdge {
            from: conn.from.node.clone(),
            from_port: conn.from.port.clone(),
            to: conn.to.node.clone(),
            is_control: is_control_port(workflow, &conn.from.node, &conn.from.port),
        };
        has_outgoing.insert(edge.from.clone());
        has_incoming.insert(edge.to.clone());
        cfg.edges.push(edge);
    }

    for id in workflow.instance_ids() {
        if !has_incoming.contains(id) {
            cfg.edges.push(CfgEdge {
                from: START_NODE.to_string(),
                from_port: "start".to_string(),
                to: id.to_string(),
                is_control: true,
            });
        }
        if !has_outgoing.contains(id) {
            cfg.edges.push(CfgEdge {
                from: id.to_string(),
                from_port: "onSuccess".to_string(),
                to: EXIT_NODE.to_string(),
                is_control: true,
            });
        }
    }

    for edge in &cfg.edges {
        cfg.successors.entry(edge.from.clone()).or_default().push(edge.clone());
        cfg.predecessors.entry(edge.to.clone()).or_default().push(edge.clone());
    }

    cfg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Connection, Endpoint, NodeInstance, NodeType};

    fn sample_workflow() -> Workflow {
        let mut wf = Workflow::new("sample");
        let mut t = NodeType::new("T", "t");
        t.has_success_port = true;
        wf.node_types.insert("T", t);
        wf.instances.insert("a", NodeInstance::new("a", "T"));
        wf.instances.insert("b", NodeInstance::new("b", "T"));
        wf.connections.push(Connection {
            from: Endpoint::new("a", "onSuccess"),
            to: Endpoint::new("b", "execute"),
        });
        wf
    }

    #[test]
    fn synthesizes_start_and_exit() {
        let cfg = build(&sample_workflow());
        assert!(cfg.edges.iter().any(|e| e.from == START_NODE && e.to == "a"));
        assert!(cfg.edges.iter().any(|e| e.from == "b" && e.to == EXIT_NODE));
    }

    #[test]
    fn retains_direct_edge() {
        let cfg = build(&sample_workflow());
        assert!(cfg.edges.iter().any(|e| e.from == "a" && e.to == "b"));
    }

    #[test]
    fn self_edge_is_retained_and_reported() {
        let mut wf = sample_workflow();
        wf.connections.push(Connection {
            from: Endpoint::new("a", "onSuccess"),
            to: Endpoint::new("a", "execute"),
        });
        let cfg = build(&wf);
        assert_eq!(cfg.self_edges().count(), 1);
    }

    #[test]
    fn data_only_edge_is_included_and_tagged_non_control() {
        use crate::ast::{DataType, PortDef};
        let mut wf = Workflow::new("sample");
        let mut producer = NodeType::new("Producer", "produce");
        producer.outputs.insert("value", PortDef::new("value", DataType::Number));
        wf.node_types.insert("Producer", producer);
        let mut consumer = NodeType::new("Consumer", "consume");
        consumer.inputs.insert("x", PortDef::new("x", DataType::Number));
        wf.node_types.insert("Consumer", consumer);
        wf.instances.insert("p", NodeInstance::new("p", "Producer"));
        wf.instances.insert("c", NodeInstance::new("c", "Consumer"));
        wf.connections.push(Connection { from: Endpoint::new("p", "value"), to: Endpoint::new("c", "x") });

        let cfg = build(&wf);
        let data_edge = cfg.edges.iter().find(|e| e.from == "p" && e.to == "c").expect("data edge present");
        assert!(!data_edge.is_control);
        assert_eq!(cfg.control_successors("p").count(), 0);
    }

    #[test]
    fn scoped_connection_is_excluded_from_cfg() {
        let mut wf = sample_workflow();
        wf.connections.push(Connection {
            from: Endpoint::scoped("parent", "start", "iteration"),
            to: Endpoint::new("child", "execute"),
        });
        let cfg = build(&wf);
        assert!(!cfg.edges.iter().any(|e| e.from == "parent" && e.to == "child"));
    }
}
