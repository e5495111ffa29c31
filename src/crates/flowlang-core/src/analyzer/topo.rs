//! Topological ordering via Kahn's algorithm.
//!
//! Ties (multiple nodes with in-degree zero at once) are broken by the node's position in
//! the workflow's declaration order, not by name or arbitrary hash order, so re-running
//! the analyzer on an unchanged workflow always yields the same schedule — a precondition
//! for the emitter's deterministic-output guarantee.

use std::collections::HashMap;

use crate::analyzer::cfg::Cfg;
use crate::ast::{Workflow, EXIT_NODE, START_NODE};
use crate::error::FlowError;

/// Compute a topological order of all real (non-synthetic) node ids in `workflow`,
/// according to `cfg`. Returns [`FlowError::Cycle`] naming every node that never reached
/// in-degree zero if the control-flow graph is not acyclic (ignoring self-edges, which
/// represent intentional loop-back wiring rather than cycles in the scheduling sense).
pub fn sort(workflow: &Workflow, cfg: &Cfg) -> Result<Vec<String>, FlowError> {
    let declared_order: HashMap<&str, usize> =
        workflow.instance_ids().into_iter().enumerate().map(|(i, id)| (id, i)).collect();

    let mut in_degree: HashMap<String, usize> = HashMap::new();
    for id in workflow.instance_ids() {
        in_degree.insert(id.to_string(), 0);
    }

    for edge in &cfg.edges {
        if edge.from == edge.to {
            continue; // self-edges don't block scheduling
        }
        if edge.from == START_NODE || edge.to == EXIT_NODE {
            continue; // synthetic edges carry no ordering constraint of their own
        }
        if let Some(d) = in_degree.get_mut(&edge.to) {
            *d += 1;
        }
    }

    let mut ready: Vec<String> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(id, _)| id.clone())
        .collect();
    ready.sort_by_key(|id| declared_order.get(id.as_str()).copied().unwrap_or(usize::MAX));

    let mut order = Vec::new();
    while let Some(next) = pop_lowest(&mut ready, &declared_order) {
        order.push(next.clone());
        if let Some(succs) = cfg.successors.get(&next) {
            let mut newly_ready = Vec::new();
            for edge in succs {
                if edge.to == next || edge.to == EXIT_NODE {
                    continue;
                }
                if let Some(d) = in_degree.get_mut(&edge.to) {
                    *d -= 1;
                    if *d == 0 {
                        newly_ready.push(edge.to.clone());
                    }
                }
            }
            newly_ready.sort_by_key(|id| declared_order.get(id.as_str()).copied().unwrap_or(usize::MAX));
            ready.extend(newly_ready);
        }
    }

    if order.len() != workflow.instances.len() {
        let stuck: Vec<String> = in_degree
            .into_iter()
            .filter(|(id, d)| *d > 0 || !order.contains(id))
            .map(|(id, _)| id)
            .collect();
        return Err(FlowError::Cycle(stuck));
    }

    Ok(order)
}

fn pop_lowest(ready: &mut Vec<String>, declared_order: &HashMap<&str, usize>) -> Option<String> {
    if ready.is_empty() {
        return None;
    }
    ready.sort_by_key(|id| declared_order.get(id.as_str()).copied().unwrap_or(usize::MAX));
    Some(ready.remove(0))
}
