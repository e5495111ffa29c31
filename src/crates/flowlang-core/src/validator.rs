//! The validator: a pure, read-only pass over an assembled [`Workflow`] that produces
//! [`Diagnostic`]s for every referential and semantic problem it can find. It never
//! mutates the workflow and never aborts — even an unknown node type is reported once and
//! validation continues, because downstream tooling (editors, `flowlang check`) wants the
//! full list in one pass rather than one error at a time.

use std::collections::{HashMap, HashSet};

use crate::ast::{DataType, Workflow};
use crate::error::{Diagnostic, DiagnosticCode};

/// Minimum Levenshtein distance, inclusive, below which a name is offered as a "did you
/// mean" suggestion. Exact matches are excluded (they wouldn't be unknown-name errors).
const SUGGESTION_MAX_DISTANCE: usize = 3;

/// Functions discovered in the host source that carry no `@input`/`@output`/`@step`
/// annotations at all — the validator treats a reference to one of these specially,
/// hinting that the author probably forgot to annotate it rather than misspelled a type
/// name.
#[derive(Debug, Clone, Default)]
pub struct UnannotatedFunctions(pub HashSet<String>);

fn suggestions<'a>(target: &str, candidates: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut scored: Vec<(usize, &str)> = candidates
        .map(|c| (strsim::levenshtein(target, c), c))
        .filter(|(d, c)| *d <= SUGGESTION_MAX_DISTANCE && *d > 0 && !c.is_empty())
        .collect();
    scored.sort_by_key(|(d, _)| *d);
    scored.into_iter().take(3).map(|(_, c)| c.to_string()).collect()
}

/// Validate `workflow`, optionally against `unannotated` host functions and with
/// `strict_types` controlling whether an `OBJECT`-typed mismatch is a warning or an error.
pub fn validate(workflow: &Workflow, unannotated: &UnannotatedFunctions, strict_types: bool) -> Vec<Diagnostic> {
    let mut diags = Vec::new();
    let mut reported_unknown_types: HashSet<String> = HashSet::new();

    validate_reserved_names(workflow, &mut diags);
    validate_duplicate_instance_ids(workflow, &mut diags);
    validate_node_types(workflow, unannotated, &mut reported_unknown_types, &mut diags);
    validate_connections(workflow, strict_types, &mut diags);
    validate_required_ports(workflow, &mut diags);
    validate_scopes(workflow, &mut diags);
    validate_sync_async(workflow, &mut diags);

    diags
}

fn validate_reserved_names(workflow: &Workflow, diags: &mut Vec<Diagnostic>) {
    for id in workflow.instance_ids() {
        if id == crate::ast::START_NODE || id == crate::ast::EXIT_NODE {
            diags.push(Diagnostic::error(
                DiagnosticCode::ReservedNameCollision,
                format!("'{id}' is a reserved name and cannot be used as an instance id"),
            ));
        }
    }
}

fn validate_duplicate_instance_ids(workflow: &Workflow, diags: &mut Vec<Diagnostic>) {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for id in workflow.instance_ids() {
        *seen.entry(id).or_insert(0) += 1;
    }
    for (id, count) in seen {
        if count > 1 {
            diags.push(Diagnostic::error(
                DiagnosticCode::DuplicateInstanceId,
                format!("instance id '{id}' is declared {count} times"),
            ));
        }
    }
}

fn validate_node_types(
    workflow: &Workflow,
    unannotated: &UnannotatedFunctions,
    reported: &mut HashSet<String>,
    diags: &mut Vec<Diagnostic>,
) {
    let known_types: Vec<&str> = workflow.node_types.keys().collect();
    for (id, inst) in workflow.instances.iter() {
        if workflow.node_types.contains_key(&inst.type_name) {
            continue;
        }
        if !reported.insert(inst.type_name.clone()) {
            continue; // cascade dedup: report each unknown type name once, not per use
        }
        if unannotated.0.contains(&inst.type_name) {
            diags.push(Diagnostic::error(
                DiagnosticCode::UnknownNodeType,
                format!(
                    "'{}' (used by instance '{}') exists as a function but has no node-type annotation",
                    inst.type_name, id
                ),
            ));
        } else {
            let hint = suggestions(&inst.type_name, known_types.iter().copied());
            diags.push(
                Diagnostic::error(
                    DiagnosticCode::UnknownNodeType,
                    format!("unknown node type '{}' (used by instance '{}')", inst.type_name, id),
                )
                .with_suggestions(hint),
            );
        }
    }
}

fn validate_connections(workflow: &Workflow, strict_types: bool, diags: &mut Vec<Diagnostic>) {
    let instance_ids: HashSet<&str> = workflow.instances.keys().collect();

    for conn in &workflow.connections {
        let from_known = instance_ids.contains(conn.from.node.as_str());
        let to_known = instance_ids.contains(conn.to.node.as_str());

        if !from_known {
            diags.push(
                Diagnostic::error(
                    DiagnosticCode::UnknownSourceNode,
                    format!("connection references unknown source node '{}'", conn.from.node),
                )
                .with_suggestions(suggestions(&conn.from.node, instance_ids.iter().copied())),
            );
        }
        if !to_known {
            diags.push(
                Diagnostic::error(
                    DiagnosticCode::UnknownTargetNode,
                    format!("connection references unknown target node '{}'", conn.to.node),
                )
                .with_suggestions(suggestions(&conn.to.node, instance_ids.iter().copied())),
            );
        }
        if !from_known || !to_known {
            continue; // can't check ports on a node we couldn't resolve
        }

        let from_type = workflow.node_type_for(&conn.from.node);
        let to_type = workflow.node_type_for(&conn.to.node);

        let from_port_names: Vec<&str> = from_type.map(|t| t.outputs.keys().collect()).unwrap_or_default();
        if from_type.map(|t| !t.outputs.contains_key(&conn.from.port)).unwrap_or(false) {
            diags.push(
                Diagnostic::error(
                    DiagnosticCode::UnknownSourcePort,
                    format!("'{}' has no output port '{}'", conn.from.node, conn.from.port),
                )
                .with_suggestions(suggestions(&conn.from.port, from_port_names.into_iter())),
            );
        }

        let to_port_names: Vec<&str> = to_type.map(|t| t.inputs.keys().collect()).unwrap_or_default();
        if to_type.map(|t| !t.inputs.contains_key(&conn.to.port)).unwrap_or(false) {
            diags.push(
                Diagnostic::error(
                    DiagnosticCode::UnknownTargetPort,
                    format!("'{}' has no input port '{}'", conn.to.node, conn.to.port),
                )
                .with_suggestions(suggestions(&conn.to.port, to_port_names.into_iter())),
            );
            continue;
        }

        if let (Some(from_ty), Some(to_ty)) = (from_type, to_type) {
            if let (Some(out_port), Some(in_port)) =
                (from_ty.outputs.get(&conn.from.port), to_ty.inputs.get(&conn.to.port))
            {
                let mismatch = out_port.data_type != in_port.data_type
                    && out_port.data_type != DataType::Any
                    && in_port.data_type != DataType::Any;
                let involves_object = out_port.data_type == DataType::Object || in_port.data_type == DataType::Object;
                if mismatch {
                    let message = format!(
                        "type mismatch on {}.{} -> {}.{}: {:?} does not match {:?}",
                        conn.from.node, conn.from.port, conn.to.node, conn.to.port, out_port.data_type, in_port.data_type
                    );
                    if involves_object && !strict_types {
                        diags.push(Diagnostic::warning(DiagnosticCode::ObjectTypeMismatch, message));
                    } else {
                        diags.push(Diagnostic::error(DiagnosticCode::ObjectTypeMismatch, message));
                    }
                }
            }
        }
    }
}

fn validate_required_ports(workflow: &Workflow, diags: &mut Vec<Diagnostic>) {
    for (id, inst) in workflow.instances.iter() {
        let Some(nt) = workflow.node_types.get(&inst.type_name) else { continue };
        for (port_name, port) in nt.inputs.iter() {
            if port.optional || port.default.is_some() || port.is_control_flow {
                continue;
            }
            let connected = workflow.connections.iter().any(|c| c.to.node == id && c.to.port == port_name);
            if !connected {
                // Non-blocking: the emitter's `data_params()` already falls back to
                // `undefined` for an unconnected input, same tier as the other semantic
                // cases in this validator (object-type mismatch, sync/async promotion).
                diags.push(Diagnostic::warning(
                    DiagnosticCode::RequiredPortUnconnected,
                    format!("required input '{port_name}' of '{id}' is not connected"),
                ));
            }
        }
    }
}

fn validate_scopes(workflow: &Workflow, diags: &mut Vec<Diagnostic>) {
    for scope in &workflow.scopes {
        let opens = workflow
            .instances
            .iter()
            .any(|(_, inst)| workflow.node_types.get(&inst.type_name).map(|nt| nt.opens_scope(&scope.name)).unwrap_or(false));
        if !opens {
            diags.push(Diagnostic::warning(
                DiagnosticCode::UnknownScope,
                format!("scope '{}' is not opened by any node type in this workflow", scope.name),
            ));
        }
        for child in &scope.children {
            if !workflow.instances.contains_key(child) {
                diags.push(
                    Diagnostic::error(
                        DiagnosticCode::UndefinedNode,
                        format!("scope '{}' names undefined child '{}'", scope.name, child),
                    )
                    .with_suggestions(suggestions(child, workflow.instances.keys())),
                );
            }
        }
    }
}

fn validate_sync_async(workflow: &Workflow, diags: &mut Vec<Diagnostic>) {
    if workflow.user_specified_async {
        return;
    }
    for (id, inst) in workflow.instances.iter() {
        if let Some(nt) = workflow.node_types.get(&inst.type_name) {
            if nt.is_async {
                diags.push(Diagnostic::warning(
                    DiagnosticCode::SyncWorkflowWithAsyncNode,
                    format!(
                        "workflow '{}' was declared synchronous but instance '{}' is async; promoting the workflow to async",
                        workflow.name, id
                    ),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{NodeInstance, NodeType, PortDef};

    #[test]
    fn unknown_node_type_cascade_is_deduped_by_type_name() {
        let mut wf = Workflow::new("sample");
        wf.instances.insert("a", NodeInstance::new("a", "Missing"));
        wf.instances.insert("b", NodeInstance::new("b", "Missing"));
        let diags = validate(&wf, &UnannotatedFunctions::default(), false);
        let count = diags.iter().filter(|d| d.code == DiagnosticCode::UnknownNodeType).count();
        assert_eq!(count, 1); // every use of the same unknown type collapses to one diagnostic
    }

    #[test]
    fn reserved_name_is_rejected() {
        let mut wf = Workflow::new("sample");
        wf.instances.insert("Start", NodeInstance::new("Start", "T"));
        let diags = validate(&wf, &UnannotatedFunctions::default(), false);
        assert!(diags.iter().any(|d| d.code == DiagnosticCode::ReservedNameCollision));
    }

    #[test]
    fn required_port_unconnected_is_a_non_blocking_warning() {
        let mut wf = Workflow::new("sample");
        let mut t = NodeType::new("T", "t");
        t.inputs.insert("amount", PortDef::new("amount", DataType::Number));
        wf.node_types.insert("T", t);
        wf.instances.insert("a", NodeInstance::new("a", "T"));
        let diags = validate(&wf, &UnannotatedFunctions::default(), false);
        let d = diags.iter().find(|d| d.code == DiagnosticCode::RequiredPortUnconnected).unwrap();
        assert!(!d.is_error(), "unconnected required port must not block generation");
    }

    #[test]
    fn suggestion_offered_for_close_typo() {
        let mut wf = Workflow::new("sample");
        let t = NodeType::new("ChargeCard", "charge_card");
        wf.node_types.insert("ChargeCard", t);
        wf.instances.insert("a", NodeInstance::new("a", "ChargeCrad"));
        let diags = validate(&wf, &UnannotatedFunctions::default(), false);
        let d = diags.iter().find(|d| d.code == DiagnosticCode::UnknownNodeType).unwrap();
        assert!(d.suggestions.contains(&"ChargeCard".to_string()));
    }
}
