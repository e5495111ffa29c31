//! The sugar engine: derives `@path`/`@map` macro candidates from a workflow's actual
//! connections, and validates macros already present against the current graph so a
//! macro that no longer matches its expansion is dropped rather than trusted.
//!
//! Route enumeration is a bounded DFS from `Start` to `Exit` over control-flow edges: it
//! stops after [`MAX_CANDIDATE_ROUTES`] candidates or once a path exceeds
//! `node_count + 1` hops, whichever comes first, so a workflow with many branches cannot
//! make re-emission pathological. Coverage is greedy — the longest remaining uncovered
//! route is chosen first — which tends to produce the fewest `@path` macros needed to
//! describe every edge at least once.

use std::collections::HashSet;

use crate::analyzer::cfg::Cfg;
use crate::ast::{Connection, MapMacro, PathMacro, PathStep, Route, Workflow, EXIT_NODE, START_NODE};

/// Hard ceiling on the number of candidate routes considered during macro derivation.
pub const MAX_CANDIDATE_ROUTES: usize = 1024;

/// A single Start-to-Exit walk over control-flow edges.
#[derive(Debug, Clone)]
struct CandidateRoute {
    steps: Vec<PathStep>,
    edges_covered: Vec<(String, String)>,
}

fn enumerate_routes(cfg: &Cfg, node_count: usize) -> Vec<CandidateRoute> {
    let max_len = node_count + 1;
    let mut routes = Vec::new();
    let mut stack: Vec<(String, Vec<PathStep>, Vec<(String, String)>, HashSet<String>)> = vec![(
        START_NODE.to_string(),
        Vec::new(),
        Vec::new(),
        HashSet::new(),
    )];

    while let Some((node, steps, covered, visited)) = stack.pop() {
        if routes.len() >= MAX_CANDIDATE_ROUTES {
            break;
        }
        if node == EXIT_NODE {
            if !steps.is_empty() {
                routes.push(CandidateRoute { steps, edges_covered: covered });
            }
            continue;
        }
        if steps.len() >= max_len {
            continue;
        }
        for edge in cfg.control_successors(&node) {
            if edge.to == node || visited.contains(&edge.to) {
                continue; // don't let a route loop back on itself
            }
            let mut next_steps = steps.clone();
            let route = if edge.from_port == "onFailure" { Some(Route::Fail) } else if node == START_NODE { None } else { Some(Route::Ok) };
            next_steps.push(PathStep { node: edge.to.clone(), route });
            let mut next_covered = covered.clone();
            next_covered.push((edge.from.clone(), edge.to.clone()));
            let mut next_visited = visited.clone();
            next_visited.insert(edge.to.clone());
            stack.push((edge.to.clone(), next_steps, next_covered, next_visited));
        }
    }

    routes
}

/// Derive a minimal-ish set of `@path` macros covering every control-flow edge at least
/// once, using greedy longest-route-first selection.
pub fn derive_path_macros(workflow: &Workflow, cfg: &Cfg) -> Vec<PathMacro> {
    let mut routes = enumerate_routes(cfg, workflow.instances.len());
    routes.sort_by_key(|r| std::cmp::Reverse(r.steps.len()));

    let all_edges: HashSet<(String, String)> = cfg
        .edges
        .iter()
        .filter(|e| e.is_control && e.from != START_NODE && e.to != EXIT_NODE && e.from != e.to)
        .map(|e| (e.from.clone(), e.to.clone()))
        .collect();

    let mut remaining = all_edges;
    let mut chosen = Vec::new();

    for route in routes {
        if remaining.is_empty() {
            break;
        }
        let covers_new = route.edges_covered.iter().any(|e| remaining.contains(e));
        if !covers_new {
            continue;
        }
        for e in &route.edges_covered {
            remaining.remove(e);
        }
        chosen.push(route);
    }

    chosen
        .into_iter()
        .map(|r| {
            let mut steps = r.steps;
            // route starts with Start -> first real node; drop the synthetic hop and
            // re-anchor on the first real node with no route marker.
            if let Some(first) = steps.first_mut() {
                first.route = None;
            }
            PathMacro { steps }
        })
        .collect()
}

/// Whether a previously-recorded `@path` macro still matches an unbroken run of actual
/// connections in `workflow`. A macro is stale the moment any of its implied edges no
/// longer exists.
pub fn path_macro_is_valid(workflow: &Workflow, macro_def: &PathMacro) -> bool {
    for window in macro_def.steps.windows(2) {
        let (from, to) = (&window[0], &window[1]);
        let out_port = match to.route {
            Some(Route::Fail) => "onFailure",
            _ => "onSuccess",
        };
        let implied = Connection {
            from: crate::ast::Endpoint::new(from.node.clone(), out_port),
            to: crate::ast::Endpoint::new(to.node.clone(), "execute"),
        };
        if !workflow.connections.iter().any(|c| c.from == implied.from && c.to.node == implied.to.node) {
            return false;
        }
    }
    true
}

/// Whether a previously-recorded `@map` macro still matches its implied wiring.
pub fn map_macro_is_valid(workflow: &Workflow, macro_def: &MapMacro) -> bool {
    let source_ok = workflow.connections.iter().any(|c| {
        c.from.node == macro_def.source_node
            && c.from.port == macro_def.source_port
            && c.to.node == macro_def.instance_id
    });
    let child_ok = workflow
        .instances
        .get(&macro_def.child_id)
        .map(|inst| inst.config.parent.as_ref().map(|p| p.id == macro_def.instance_id).unwrap_or(false))
        .unwrap_or(false);
    source_ok && child_ok
}

/// Filter `macros` down to those still valid against `workflow`, dropping stale entries.
pub fn filter_stale(workflow: &Workflow, macros: Vec<crate::ast::Macro>) -> Vec<crate::ast::Macro> {
    macros
        .into_iter()
        .filter(|m| match m {
            crate::ast::Macro::Path(p) => path_macro_is_valid(workflow, p),
            crate::ast::Macro::Map(m) => map_macro_is_valid(workflow, m),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::cfg as cfg_mod;
    use crate::ast::{Connection, Endpoint, NodeInstance, NodeType};

    fn linear_workflow() -> Workflow {
        let mut wf = Workflow::new("sample");
        let mut t = NodeType::new("T", "t");
        t.has_success_port = true;
        wf.node_types.insert("T", t);
        for id in ["a", "b", "c"] {
            wf.instances.insert(id, NodeInstance::new(id, "T"));
        }
        wf.connections.push(Connection { from: Endpoint::new("a", "onSuccess"), to: Endpoint::new("b", "execute") });
        wf.connections.push(Connection { from: Endpoint::new("b", "onSuccess"), to: Endpoint::new("c", "execute") });
        wf
    }

    #[test]
    fn derives_single_path_covering_whole_chain() {
        let wf = linear_workflow();
        let cfg = cfg_mod::build(&wf);
        let paths = derive_path_macros(&wf, &cfg);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].steps.len(), 3);
    }

    #[test]
    fn route_enumeration_respects_cap() {
        let wf = linear_workflow();
        let cfg = cfg_mod::build(&wf);
        let routes = enumerate_routes(&cfg, wf.instances.len());
        assert!(routes.len() <= MAX_CANDIDATE_ROUTES);
    }

    #[test]
    fn stale_path_macro_is_dropped() {
        let wf = linear_workflow();
        let stale = PathMacro {
            steps: vec![
                PathStep { node: "a".to_string(), route: None },
                PathStep { node: "z".to_string(), route: None },
            ],
        };
        assert!(!path_macro_is_valid(&wf, &stale));
    }

    #[test]
    fn valid_path_macro_survives_filter() {
        let wf = linear_workflow();
        let valid = PathMacro {
            steps: vec![
                PathStep { node: "a".to_string(), route: None },
                PathStep { node: "b".to_string(), route: None },
            ],
        };
        assert!(path_macro_is_valid(&wf, &valid));
    }
}
