//! The analyzer: turns an assembled [`crate::ast::Workflow`] into an [`Analysis`] — the
//! control-flow graph, a deterministic topological order, branch regions and their
//! promoted nodes, detected chains, and scope classification. `analyze` is pure and
//! allocates a fresh `Analysis` on every call; nothing is cached on the `Workflow` itself,
//! so re-analyzing after an edit always reflects the edit.

pub mod branch;
pub mod cfg;
pub mod scope;
pub mod topo;

use std::collections::{HashMap, HashSet};

use crate::ast::Workflow;
use crate::error::{FlowError, Result};

pub use branch::{BranchRegion, Chain};
pub use cfg::Cfg;
pub use scope::ScopeKind;

/// The complete analysis of a workflow.
pub struct Analysis {
    pub cfg: Cfg,
    pub topo_order: Vec<String>,
    pub branch_regions: Vec<BranchRegion>,
    pub promoted: HashSet<String>,
    pub chains: Vec<Chain>,
    pub scope_classification: HashMap<String, ScopeKind>,
}

/// The maximum recursion depth for nested workflow calls (see
/// `FlowError::RecursionDepthExceeded`). Checked by the compile-API layer, not here, since
/// it depends on the call graph across workflows rather than a single workflow's CFG.
pub const MAX_RECURSION_DEPTH: u32 = 1000;

/// Run every analysis pass over `workflow`.
pub fn analyze(workflow: &Workflow) -> Result<Analysis> {
    let cfg = cfg::build(workflow);
    let topo_order = topo::sort(workflow, &cfg).map_err(|e| match e {
        FlowError::Cycle(nodes) => FlowError::Cycle(nodes),
        other => other,
    })?;
    let branch_regions = branch::discover_regions(workflow, &cfg);
    let promoted = branch::promote(&branch_regions);
    let chains = branch::detect_chains(workflow, &cfg, &topo_order);
    let scope_classification = scope::classify(workflow);

    for instance in workflow.instances.iter().map(|(_, i)| i) {
        if let Some(parent) = &instance.config.parent {
            if let Some(parent_type) = workflow.node_type_for(&parent.id) {
                if !parent_type.opens_scope(&parent.scope) {
                    return Err(FlowError::IllegalScopeParent {
                        instance: instance.id.clone(),
                        parent: parent.id.clone(),
                        scope: parent.scope.clone(),
                    });
                }
            }
        }
    }

    Ok(Analysis { cfg, topo_order, branch_regions, promoted, chains, scope_classification })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Connection, Endpoint, NodeInstance, NodeType};

    #[test]
    fn analyzes_linear_workflow() {
        let mut wf = Workflow::new("sample");
        let mut t = NodeType::new("T", "t");
        t.has_success_port = true;
        wf.node_types.insert("T", t);
        for id in ["a", "b"] {
            wf.instances.insert(id, NodeInstance::new(id, "T"));
        }
        wf.connections.push(Connection { from: Endpoint::new("a", "onSuccess"), to: Endpoint::new("b", "execute") });

        let analysis = analyze(&wf).unwrap();
        assert_eq!(analysis.topo_order, vec!["a".to_string(), "b".to_string()]);
        assert!(analysis.branch_regions.is_empty());
    }

    #[test]
    fn illegal_scope_parent_is_rejected() {
        use crate::ast::ParentRef;
        let mut wf = Workflow::new("sample");
        let t = NodeType::new("Plain", "plain");
        wf.node_types.insert("Plain", t);
        wf.instances.insert("parent", NodeInstance::new("parent", "Plain"));
        let mut child = NodeInstance::new("child", "Plain");
        child.config.parent = Some(ParentRef { id: "parent".to_string(), scope: "body".to_string() });
        wf.instances.insert("child", child);

        assert!(matches!(analyze(&wf), Err(FlowError::IllegalScopeParent { .. })));
    }

    #[test]
    fn cycle_propagates_as_error() {
        let mut wf = Workflow::new("sample");
        let mut t = NodeType::new("T", "t");
        t.has_success_port = true;
        wf.node_types.insert("T", t);
        wf.instances.insert("a", NodeInstance::new("a", "T"));
        wf.instances.insert("b", NodeInstance::new("b", "T"));
        wf.connections.push(Connection { from: Endpoint::new("a", "onSuccess"), to: Endpoint::new("b", "execute") });
        wf.connections.push(Connection { from: Endpoint::new("b", "onSuccess"), to: Endpoint::new("a", "execute") });

        assert!(matches!(analyze(&wf), Err(FlowError::Cycle(_))));
    }
}
