//! `executeWhen` guard-expression construction.
//!
//! Every regular or branching node's call is preceded by a boolean guard assembled from
//! the success/failure flags of its control-flow predecessors. The shape of that guard
//! depends on the node's [`ExecuteWhen`] strategy: `CONJUNCTION` groups conditions by
//! target port (an OR within a port's own sources — multiple wires into the same port are
//! alternatives) and ANDs the groups together; `DISJUNCTION` flattens every source
//! condition into one OR; `CUSTOM` emits the instance's `custom_expression` verbatim,
//! falling back to `CONJUNCTION` when that field is empty (the open question on whether
//! this should instead be a `strictTypes` error is resolved in favor of a silent fallback,
//! matching the source's own behavior — see `DESIGN.md`).

use std::collections::BTreeMap;

use crate::analyzer::cfg::Cfg;
use crate::ast::{ExecuteWhen, Workflow, START_NODE};

/// One predecessor condition feeding into a node's `execute` port. Only control-flow
/// predecessors contribute a guard condition — a data-only wire into a node says nothing
/// about whether the node should run.
fn predecessor_conditions(cfg: &Cfg, node: &str) -> Vec<(String, String)> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for edge in cfg.control_predecessors(node) {
        if edge.from == START_NODE {
            continue; // Start carries no guard condition of its own
        }
        let cond = match edge.from_port.as_str() {
            "onSuccess" => format!("{}_success", edge.from),
            "onFailure" => format!("!{}_success", edge.from),
            other => format!("{}_{}", edge.from, other),
        };
        groups.entry("execute".to_string()).or_default().push(cond);
    }

    groups.into_iter().flat_map(|(port, conds)| conds.into_iter().map(move |c| (port.clone(), c))).collect()
}

/// Build the guard expression for `node` given its resolved `execute_when` strategy and
/// `custom_expression` (only consulted under [`ExecuteWhen::Custom`]). Returns `None` when
/// the node has no predecessor conditions at all (e.g. it runs directly off `Start`).
pub fn build_guard(cfg: &Cfg, node: &str, execute_when: ExecuteWhen, custom_expression: Option<&str>) -> Option<String> {
    match execute_when {
        ExecuteWhen::Custom => {
            if let Some(expr) = custom_expression.filter(|s| !s.is_empty()) {
                return Some(expr.to_string());
            }
            build_guard(cfg, node, ExecuteWhen::Conjunction, None)
        }
        ExecuteWhen::Conjunction => {
            let pairs = predecessor_conditions(cfg, node);
            if pairs.is_empty() {
                return None;
            }
            let mut by_port: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for (port, cond) in pairs {
                by_port.entry(port).or_default().push(cond);
            }
            let groups: Vec<String> = by_port
                .into_values()
                .map(|conds| {
                    if conds.len() == 1 {
                        conds.into_iter().next().unwrap()
                    } else {
                        format!("({})", conds.join(" || "))
                    }
                })
                .collect();
            Some(groups.join(" && "))
        }
        ExecuteWhen::Disjunction => {
            let pairs = predecessor_conditions(cfg, node);
            if pairs.is_empty() {
                return None;
            }
            Some(pairs.into_iter().map(|(_, c)| c).collect::<Vec<_>>().join(" || "))
        }
    }
}

/// Build the accumulated guard for a position in a flattened chain: the conjunction of
/// every predecessor member's own success flag, in chain order.
pub fn chain_guard(members: &[String], upto: usize) -> Option<String> {
    if upto == 0 {
        return None;
    }
    Some(members[..upto].iter().map(|m| format!("{m}_success")).collect::<Vec<_>>().join(" && "))
}
