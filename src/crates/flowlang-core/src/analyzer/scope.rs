//! Scope classification.
//!
//! A scope is either *node-level* (the parent node simply owns a set of children that run
//! once as a unit — e.g. a retry wrapper's body) or *per-port* (the parent's output ports
//! declare the scope, meaning the scope's children run once per value the parent produces
//! on that port — e.g. a map iterator's `item` output). The distinction matters to the
//! emitter: node-level scopes lower to one `createScope`/`mergeScope` pair, per-port
//! scopes lower to a loop that opens and merges a fresh scope per iteration.

use std::collections::HashMap;

use crate::ast::Workflow;

/// How a scope's children execute relative to their parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    NodeLevel,
    PerPort,
}

/// Classify every scope declared in `workflow` by the node type that opens it.
///
/// A scope whose name does not match any node type's declared scopes is left
/// unclassified (the validator reports `UNKNOWN_SCOPE` separately); this function only
/// records scopes it can resolve.
pub fn classify(workflow: &Workflow) -> HashMap<String, ScopeKind> {
    let mut out = HashMap::new();
    for scope in &workflow.scopes {
        let opener = workflow.instances.iter().find_map(|(id, inst)| {
            let nt = workflow.node_types.get(&inst.type_name)?;
            if nt.opens_scope(&scope.name) {
                Some((id.to_string(), nt.is_per_port_scope(&scope.name)))
            } else {
                None
            }
        });
        if let Some((_, per_port)) = opener {
            out.insert(
                scope.name.clone(),
                if per_port { ScopeKind::PerPort } else { ScopeKind::NodeLevel },
            );
        }
    }
    out
}
