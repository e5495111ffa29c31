//! Branch region discovery, promotion, and chain detection.
//!
//! A node instance is *branching* when its type can declare more than one control-flow
//! output (`onSuccess`/`onFailure`, or custom step ports) *and* this workflow actually
//! connects two or more of them — a branching-typed node whose `onFailure` is left
//! unconnected never diverges in practice and stays eligible for chain flattening. Each
//! branching node opens exactly two regions in this compiler (success and failure) that run
//! forward until they reconverge
//! at a common successor or reach `Exit`. A node reachable from more than one region is
//! *promoted*: its declaration is lifted out of either arm's locally scoped code block so
//! both arms can call it, and its emitted name gets a region-scoped alias suffix
//! (`_success`/`_failure`) to keep per-arm bookkeeping distinguishable in generated
//! variable names. A *chain* is a maximal run of non-branching nodes linked one-to-one by
//! a single control edge each way; the emitter flattens a chain into one block instead of
//! one `addExecution` call per node.

use std::collections::{HashMap, HashSet};

use crate::analyzer::cfg::Cfg;
use crate::ast::{Workflow, EXIT_NODE};

/// The two control-flow regions opened by a branching node.
#[derive(Debug, Clone)]
pub struct BranchRegion {
    pub branch_node: String,
    /// Nodes reachable starting from the `onSuccess` edge, stopping at the merge point.
    pub success_region: Vec<String>,
    /// Nodes reachable starting from the `onFailure` edge, stopping at the merge point.
    pub failure_region: Vec<String>,
    /// The first node reachable from both regions, if the branch reconverges before
    /// `Exit`.
    pub merge_node: Option<String>,
}

/// A maximal chain of single-entry, single-exit non-branching nodes.
#[derive(Debug, Clone)]
pub struct Chain {
    pub nodes: Vec<String>,
}

/// A node instance branches when its type is capable of it (see
/// [`crate::ast::NodeType::is_branching_type`]) *and* this particular graph actually wires
/// up two or more distinct control-flow successors from it. A branching-typed node whose
/// `onFailure` output has no connection in this workflow never diverges in practice, so it
/// is left eligible for chain flattening rather than opening an (empty) failure region.
fn is_branching(workflow: &Workflow, cfg: &Cfg, node: &str) -> bool {
    if !workflow.node_type_for(node).map(|nt| nt.is_branching_type()).unwrap_or(false) {
        return false;
    }
    let distinct_ports: HashSet<&str> = cfg.control_successors(node).map(|e| e.from_port.as_str()).collect();
    distinct_ports.len() >= 2
}

/// Forward reachability from `start`, following control edges only (data edges never
/// decide branch-region membership), stopping at `Exit` and recording the order nodes
/// were first reached in (breadth-first, so "closest" reconverge points are found first).
fn reachable_from(cfg: &Cfg, start: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    let mut queue = std::collections::VecDeque::new();
    queue.push_back(start.to_string());
    seen.insert(start.to_string());

    while let Some(node) = queue.pop_front() {
        if node == EXIT_NODE {
            continue;
        }
        order.push(node.clone());
        for edge in cfg.control_successors(&node) {
            if edge.to == node {
                continue; // skip self-edges
            }
            if seen.insert(edge.to.clone()) {
                queue.push_back(edge.to.clone());
            }
        }
    }
    order
}

/// Discover every branching node's regions.
pub fn discover_regions(workflow: &Workflow, cfg: &Cfg) -> Vec<BranchRegion> {
    let mut regions = Vec::new();

    for id in workflow.instance_ids() {
        if !is_branching(workflow, cfg, id) {
            continue;
        }
        let success_start = cfg.control_successors(id).find(|e| e.from_port == "onSuccess").map(|e| e.to.clone());
        let failure_start = cfg.control_successors(id).find(|e| e.from_port == "onFailure").map(|e| e.to.clone());

        let success_region = success_start.as_deref().map(|s| reachable_from(cfg, s)).unwrap_or_default();
        let failure_region = failure_start.as_deref().map(|s| reachable_from(cfg, s)).unwrap_or_default();

        let success_set: HashSet<&str> = success_region.iter().map(String::as_str).collect();
        let merge_node = failure_region.iter().find(|n| success_set.contains(n.as_str())).cloned();

        regions.push(BranchRegion { branch_node: id.to_string(), success_region, failure_region, merge_node });
    }

    regions
}

/// Nodes that must be promoted: present in both the success and failure regions of the
/// same branch (the merge point and anything beyond it).
pub fn promote(regions: &[BranchRegion]) -> HashSet<String> {
    let mut promoted = HashSet::new();
    for region in regions {
        let success_set: HashSet<&str> = region.success_region.iter().map(String::as_str).collect();
        for node in &region.failure_region {
            if success_set.contains(node.as_str()) {
                promoted.insert(node.clone());
            }
        }
    }
    promoted
}

/// Detect maximal chains: runs of nodes where each has exactly one control predecessor and
/// each predecessor has exactly one control successor, and neither endpoint is itself
/// branching (a branching node always starts a new chain).
pub fn detect_chains(workflow: &Workflow, cfg: &Cfg, topo_order: &[String]) -> Vec<Chain> {
    let mut out_degree: HashMap<&str, usize> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    for edge in cfg.edges.iter().filter(|e| e.is_control) {
        if edge.from == edge.to {
            continue;
        }
        *out_degree.entry(edge.from.as_str()).or_insert(0) += 1;
        *in_degree.entry(edge.to.as_str()).or_insert(0) += 1;
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut chains = Vec::new();

    for id in topo_order {
        if visited.contains(id.as_str()) || is_branching(workflow, cfg, id) {
            continue;
        }
        if in_degree.get(id.as_str()).copied().unwrap_or(0) > 1 {
            continue; // a join point starts fresh, not mid-chain
        }

        let mut nodes = vec![id.clone()];
        visited.insert(id.as_str());
        let mut current = id.as_str();

        loop {
            if out_degree.get(current).copied().unwrap_or(0) != 1 {
                break;
            }
            let Some(next_edge) = cfg.control_successors(current).find(|e| e.to != current) else {
                break;
            };
            let next = next_edge.to.as_str();
            if next == EXIT_NODE || visited.contains(next) || is_branching(workflow, cfg, next) {
                break;
            }
            if in_degree.get(next).copied().unwrap_or(0) != 1 {
                break;
            }
            nodes.push(next.to_string());
            visited.insert(next);
            current = nodes.last().unwrap().as_str();
        }

        if nodes.len() > 1 {
            chains.push(Chain { nodes });
        }
    }

    chains
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{cfg as cfg_mod, topo};
    use crate::ast::{Connection, Endpoint, NodeInstance, NodeType};

    fn branching_workflow() -> Workflow {
        let mut wf = Workflow::new("sample");
        let mut branch_ty = NodeType::new("Branch", "branch");
        branch_ty.has_success_port = true;
        branch_ty.has_failure_port = true;
        wf.node_types.insert("Branch", branch_ty);
        let mut plain = NodeType::new("Plain", "plain");
        plain.has_success_port = true;
        wf.node_types.insert("Plain", plain);

        wf.instances.insert("check", NodeInstance::new("check", "Branch"));
        wf.instances.insert("onOk", NodeInstance::new("onOk", "Plain"));
        wf.instances.insert("onErr", NodeInstance::new("onErr", "Plain"));
        wf.instances.insert("done", NodeInstance::new("done", "Plain"));

        wf.connections.push(Connection { from: Endpoint::new("check", "onSuccess"), to: Endpoint::new("onOk", "execute") });
        wf.connections.push(Connection { from: Endpoint::new("check", "onFailure"), to: Endpoint::new("onErr", "execute") });
        wf.connections.push(Connection { from: Endpoint::new("onOk", "onSuccess"), to: Endpoint::new("done", "execute") });
        wf.connections.push(Connection { from: Endpoint::new("onErr", "onSuccess"), to: Endpoint::new("done", "execute") });
        wf
    }

    #[test]
    fn discovers_success_and_failure_regions() {
        let wf = branching_workflow();
        let cfg = cfg_mod::build(&wf);
        let regions = discover_regions(&wf, &cfg);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].success_region, vec!["onOk".to_string(), "done".to_string()]);
        assert_eq!(regions[0].failure_region, vec!["onErr".to_string(), "done".to_string()]);
        assert_eq!(regions[0].merge_node.as_deref(), Some("done"));
    }

    #[test]
    fn promotes_merge_node() {
        let wf = branching_workflow();
        let cfg = cfg_mod::build(&wf);
        let regions = discover_regions(&wf, &cfg);
        let promoted = promote(&regions);
        assert!(promoted.contains("done"));
        assert!(!promoted.contains("onOk"));
    }

    #[test]
    fn detects_linear_chain() {
        let mut wf = Workflow::new("sample");
        let mut t = NodeType::new("T", "t");
        t.has_success_port = true;
        wf.node_types.insert("T", t);
        for id in ["a", "b", "c"] {
            wf.instances.insert(id, NodeInstance::new(id, "T"));
        }
        wf.connections.push(Connection { from: Endpoint::new("a", "onSuccess"), to: Endpoint::new("b", "execute") });
        wf.connections.push(Connection { from: Endpoint::new("b", "onSuccess"), to: Endpoint::new("c", "execute") });
        let cfg = cfg_mod::build(&wf);
        let order = topo::sort(&wf, &cfg).unwrap();
        let chains = detect_chains(&wf, &cfg, &order);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].nodes, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[test]
    fn branching_node_breaks_chain() {
        let wf = branching_workflow();
        let cfg = cfg_mod::build(&wf);
        let order = topo::sort(&wf, &cfg).unwrap();
        let chains = detect_chains(&wf, &cfg, &order);
        assert!(chains.iter().all(|c| !c.nodes.contains(&"check".to_string())));
    }
}
