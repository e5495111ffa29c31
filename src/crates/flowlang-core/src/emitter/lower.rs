//! Per-node emission strategies.
//!
//! Every instance in the workflow is lowered by exactly one of the strategies below,
//! chosen by [`emit_node`]. Each strategy writes directly into the shared [`ProcBuilder`]
//! against a named context variable (`ctx_var`) rather than always `"ctx"`, because
//! scope-opening nodes lower their children against a freshly created child context rather
//! than the parent's.
//!
//! Execution indices (`{id}Idx`) and branch flags (`{id}_success`) are pre-declared with
//! `let` at the top of the emitted function (see [`super::emit_prelude_declarations`])
//! rather than declared `const` at first use, because a downstream node's argument list
//! may read them from a sibling block (e.g. a node after an `if`/`else` reading a flag set
//! inside it) where a block-scoped `const` would not be visible. Every strategy here
//! therefore *assigns* to `{id}Idx`/`{id}_success` rather than declaring them.

use crate::analyzer::cfg::Cfg;
use crate::analyzer::{Analysis, BranchRegion, Chain, ScopeKind};
use crate::ast::{NodeType, NodeVariant, Workflow};

use super::builder::ProcBuilder;
use super::guard;

fn is_control_input(workflow: &Workflow, node: &str, port: &str) -> bool {
    workflow
        .node_type_for(node)
        .and_then(|nt| nt.inputs.get(port))
        .map(|p| p.is_control_flow)
        .unwrap_or(port == "execute")
}

fn node_name(workflow: &Workflow, id: &str) -> String {
    workflow.node_type_for(id).map(|nt| nt.name.clone()).unwrap_or_else(|| id.to_string())
}

/// An expression reading a port's last-set value off the shared context.
pub(crate) fn read_expr(ctx_var: &str, workflow: &Workflow, node: &str, port: &str, is_async: bool) -> String {
    let name = node_name(workflow, node);
    let await_kw = if is_async { "await " } else { "" };
    format!(
        "{await_kw}{ctx_var}.getVariable({{ id: \"{node}\", portName: \"{port}\", executionIndex: {node}Idx, nodeTypeName: \"{name}\" }})"
    )
}

/// Data-only input connections into `id`, as `(port, readExpr)` pairs, in connection
/// declaration order.
fn data_params(ctx_var: &str, workflow: &Workflow, id: &str, is_async: bool) -> Vec<(String, String)> {
    workflow
        .connections
        .iter()
        .filter(|c| c.to.node == id && c.to.scope.is_none() && !is_control_input(workflow, id, &c.to.port))
        .map(|c| (c.to.port.clone(), read_expr(ctx_var, workflow, &c.from.node, &c.from.port, is_async)))
        .collect()
}

fn emit_status_event(pb: &mut ProcBuilder, ctx_var: &str, name: &str, id: &str, idx: &str, status: &str) {
    pb.line(format!(
        "{ctx_var}.sendStatusChangedEvent({{ nodeTypeName: \"{name}\", id: \"{id}\", executionIndex: {idx}, status: \"{status}\" }});"
    ));
}

fn emit_params_object(pb: &mut ProcBuilder, var: &str, pairs: &[(String, String)], extra: &[(&str, String)]) {
    pb.line(format!("const {var} = {{"));
    pb.indent();
    for (name, val) in pairs {
        pb.line(format!("{name}: {val},"));
    }
    for (name, val) in extra {
        pb.line(format!("{name}: {val},"));
    }
    pb.dedent();
    pb.line("};");
}

fn emit_output_sets(pb: &mut ProcBuilder, ctx_var: &str, nt: &NodeType, id: &str, idx: &str, result_var: &str, is_async: bool) {
    let await_kw = if is_async { "await " } else { "" };
    for (port, _) in nt.outputs.iter() {
        pb.line(format!(
            "{await_kw}{ctx_var}.setVariable({{ id: \"{id}\", portName: \"{port}\", executionIndex: {idx}, nodeTypeName: \"{}\" }}, {result_var}.{port});",
            nt.name
        ));
    }
}

/// Emit the `addExecution` / `checkAborted` / `RUNNING` prologue common to every
/// non-cancelled node execution. Assigns the pre-declared `{id}Idx`.
fn emit_prologue(pb: &mut ProcBuilder, ctx_var: &str, id: &str, name: &str) -> String {
    let idx = format!("{id}Idx");
    pb.line(format!("{idx} = {ctx_var}.addExecution(\"{id}\");"));
    pb.line(format!("{ctx_var}.checkAborted(\"{id}\");"));
    emit_status_event(pb, ctx_var, name, id, &idx, "RUNNING");
    idx
}

/// Emit the CANCELLED status event for a node that will not execute on this run (a
/// non-taken branch member, or a chain member whose predecessor did not succeed).
pub fn emit_cancelled(pb: &mut ProcBuilder, workflow: &Workflow, ctx_var: &str, id: &str) {
    let name = node_name(workflow, id);
    let idx = format!("{id}Idx");
    pb.line(format!("{idx} = {ctx_var}.addExecution(\"{id}\");"));
    emit_status_event(pb, ctx_var, &name, id, &idx, "CANCELLED");
}

/// The try/catch + call + output-setting body shared by regular nodes, chain members, and
/// non-recursive calls. `call_expr` is the already built `fn(...)` (or `await fn(...)`)
/// call text (without the `const x =` prefix).
fn emit_call_body(pb: &mut ProcBuilder, ctx_var: &str, id: &str, nt: &NodeType, call_expr: &str, is_async: bool) {
    let idx = emit_prologue(pb, ctx_var, id, &nt.name);
    pb.open_block("try");
    let result_var = format!("{id}Result");
    pb.line(format!("const {result_var} = {call_expr};"));
    emit_status_event(pb, ctx_var, &nt.name, id, &idx, "SUCCEEDED");
    emit_output_sets(pb, ctx_var, nt, id, &idx, &result_var, is_async);
    pb.close_and_open("catch (err)");
    pb.open_block("if (CancellationError.isCancellationError(err))");
    emit_status_event(pb, ctx_var, &nt.name, id, &idx, "CANCELLED");
    pb.line("throw err;");
    pb.close_block();
    emit_status_event(pb, ctx_var, &nt.name, id, &idx, "FAILED");
    pb.line(format!("{ctx_var}.sendLogErrorEvent({{ id: \"{id}\", executionIndex: {idx}, error: err }});"));
    if nt.expression {
        let await_kw = if is_async { "await " } else { "" };
        pb.line(format!(
            "{await_kw}{ctx_var}.setVariable({{ id: \"{id}\", portName: \"onSuccess\", executionIndex: {idx}, nodeTypeName: \"{}\" }}, false);",
            nt.name
        ));
        pb.line(format!(
            "{await_kw}{ctx_var}.setVariable({{ id: \"{id}\", portName: \"onFailure\", executionIndex: {idx}, nodeTypeName: \"{}\" }}, true);",
            nt.name
        ));
    }
    pb.line("throw err;");
    pb.close_block();
}

fn resolved_execute_when(workflow: &Workflow, id: &str, nt: &NodeType) -> crate::ast::ExecuteWhen {
    workflow.instances.get(id).and_then(|i| i.config.execute_when).unwrap_or(nt.execute_when)
}

fn custom_expr(workflow: &Workflow, id: &str) -> Option<String> {
    workflow.instances.get(id).and_then(|i| i.config.custom_expression.clone())
}

/// Regular (non-branching, non-special-variant) node: guarded call with full status/error
/// handling.
pub fn emit_regular_node(pb: &mut ProcBuilder, ctx_var: &str, workflow: &Workflow, cfg: &Cfg, id: &str, is_async: bool) {
    let nt = workflow.node_type_for(id).expect("node type resolved for instance");
    let guard = guard::build_guard(cfg, id, resolved_execute_when(workflow, id, nt), custom_expr(workflow, id).as_deref());
    let params = data_params(ctx_var, workflow, id, is_async);
    let await_kw = if is_async { "await " } else { "" };

    let emit_body = |pb: &mut ProcBuilder| {
        emit_params_object(pb, &format!("{id}Params"), &params, &[]);
        let call_expr = if nt.expression {
            format!("{await_kw}{}({id}Params)", nt.function_name)
        } else {
            format!("{await_kw}{}(true, {id}Params)", nt.function_name)
        };
        emit_call_body(pb, ctx_var, id, nt, &call_expr, is_async);
    };

    match guard {
        Some(g) => {
            pb.open_block(format!("if ({g})"));
            emit_body(pb);
            pb.close_and_open("else");
            emit_cancelled(pb, workflow, ctx_var, id);
            pb.close_block();
        }
        None => emit_body(pb),
    }
}

/// A node whose type's outputs include a success/failure (or other control-flow) port
/// with successors: run the call, derive a `_success` flag, then lower exactly one of its
/// two regions depending on that flag, emitting CANCELLED for every node in the other.
pub fn emit_branching_node(
    pb: &mut ProcBuilder,
    ctx_var: &str,
    workflow: &Workflow,
    analysis: &Analysis,
    region: &BranchRegion,
    is_async: bool,
) {
    let id = &region.branch_node;
    let nt = workflow.node_type_for(id).expect("node type resolved for instance");
    let guard = guard::build_guard(&analysis.cfg, id, resolved_execute_when(workflow, id, nt), custom_expr(workflow, id).as_deref());
    let params = data_params(ctx_var, workflow, id, is_async);
    let await_kw = if is_async { "await " } else { "" };

    let run = |pb: &mut ProcBuilder| {
        emit_params_object(pb, &format!("{id}Params"), &params, &[]);
        let call_expr = format!("{await_kw}{}(true, {id}Params)", nt.function_name);
        emit_call_body(pb, ctx_var, id, nt, &call_expr, is_async);
        pb.line(format!("{id}_success = {id}Result.onFailure !== true && {id}Result.onSuccess !== false;"));
    };

    match guard {
        Some(g) => {
            pb.open_block(format!("if ({g})"));
            run(pb);
            pb.close_and_open("else");
            emit_cancelled(pb, workflow, ctx_var, id);
            pb.line(format!("{id}_success = false;"));
            pb.close_block();
        }
        None => run(pb),
    }

    let success_nodes = sorted_by_topo(analysis, &region.success_region);
    let failure_nodes = sorted_by_topo(analysis, &region.failure_region);

    pb.open_block(format!("if ({id}_success)"));
    for child in &success_nodes {
        emit_node(pb, ctx_var, workflow, analysis, child, is_async);
    }
    for child in &failure_nodes {
        emit_cancelled(pb, workflow, ctx_var, child);
    }
    pb.close_and_open("else");
    for child in &success_nodes {
        emit_cancelled(pb, workflow, ctx_var, child);
    }
    for child in &failure_nodes {
        emit_node(pb, ctx_var, workflow, analysis, child, is_async);
    }
    pb.close_block();
}

fn sorted_by_topo(analysis: &Analysis, ids: &[String]) -> Vec<String> {
    analysis.topo_order.iter().filter(|n| ids.contains(n)).cloned().collect()
}

/// A maximal run of non-branching nodes: emitted as sibling (not nested) guarded blocks,
/// each guarded by the accumulated conjunction of prior members' success flags, so nesting
/// depth never grows with chain length.
pub fn emit_chain(pb: &mut ProcBuilder, ctx_var: &str, workflow: &Workflow, cfg: &Cfg, chain: &Chain, is_async: bool) {
    for (i, id) in chain.nodes.iter().enumerate() {
        let nt = workflow.node_type_for(id).expect("node type resolved for instance");
        let cond = if i == 0 {
            guard::build_guard(cfg, id, resolved_execute_when(workflow, id, nt), custom_expr(workflow, id).as_deref())
        } else {
            guard::chain_guard(&chain.nodes, i)
        };
        let params = data_params(ctx_var, workflow, id, is_async);
        let await_kw = if is_async { "await " } else { "" };

        let emit_body = |pb: &mut ProcBuilder| {
            emit_params_object(pb, &format!("{id}Params"), &params, &[]);
            let call_expr = format!("{await_kw}{}(true, {id}Params)", nt.function_name);
            emit_call_body(pb, ctx_var, id, nt, &call_expr, is_async);
            pb.line(format!("{id}_success = {id}Result.onFailure !== true;"));
        };

        match cond {
            Some(g) => {
                pb.open_block(format!("if ({g})"));
                emit_body(pb);
                pb.close_and_open("else");
                emit_cancelled(pb, workflow, ctx_var, id);
                pb.line(format!("{id}_success = false;"));
                pb.close_block();
            }
            None => emit_body(pb),
        }
    }
}

/// A pull-execution node: registered as a memoized, parameterless executor rather than
/// inlined; a consumer's `getVariable` call triggers it on first access.
pub fn emit_pull_node(pb: &mut ProcBuilder, ctx_var: &str, workflow: &Workflow, id: &str, is_async: bool) {
    let nt = workflow.node_type_for(id).expect("node type resolved for instance");
    let effective_async = is_async || nt.is_async;
    let params = data_params(ctx_var, workflow, id, effective_async);
    let await_kw = if effective_async { "await " } else { "" };
    let async_kw = if effective_async { "async " } else { "" };

    pb.line(format!("let {id}Memo;"));
    pb.line(format!("{ctx_var}.registerPullExecutor(\"{id}\", {async_kw}() => {{"));
    pb.indent();
    pb.open_block(format!("if ({id}Memo !== undefined)"));
    pb.line(format!("return {id}Memo;"));
    pb.close_block();
    emit_params_object(pb, &format!("{id}Params"), &params, &[]);
    let call_expr = format!("{await_kw}{}(true, {id}Params)", nt.function_name);
    emit_call_body(pb, ctx_var, id, nt, &call_expr, effective_async);
    pb.line(format!("{id}Memo = {id}Idx;"));
    pb.line(format!("return {id}Memo;"));
    pb.dedent();
    pb.line("});");
}

/// A workflow or imported-workflow call: passes a bumped recursion counter and treats the
/// callee's returned record as the output set, including `onSuccess`/`onFailure`.
pub fn emit_workflow_call(pb: &mut ProcBuilder, ctx_var: &str, workflow: &Workflow, id: &str, is_async: bool) {
    let nt = workflow.node_type_for(id).expect("node type resolved for instance");
    let idx = emit_prologue(pb, ctx_var, id, &nt.name);
    let params = data_params(ctx_var, workflow, id, is_async);
    emit_params_object(pb, &format!("{id}Params"), &params, &[("__rd__", "__rd__ + 1".to_string())]);
    let await_kw = if is_async { "await " } else { "" };
    let result_var = format!("{id}Result");
    pb.line(format!("const {result_var} = {await_kw}{}(true, {id}Params);", nt.function_name));
    emit_status_event(pb, ctx_var, &nt.name, id, &idx, "SUCCEEDED");
    emit_output_sets(pb, ctx_var, nt, id, &idx, &result_var, is_async);
}

/// A `MAP_ITERATOR` node: inlines a `for` loop over its `items` input, invoking the
/// per-port-scoped child function once per element and accumulating `.processed` results.
pub fn emit_map_iterator(pb: &mut ProcBuilder, ctx_var: &str, workflow: &Workflow, analysis: &Analysis, id: &str, is_async: bool) {
    let nt = workflow.node_type_for(id).expect("node type resolved for instance");
    let idx = emit_prologue(pb, ctx_var, id, &nt.name);

    let params = data_params(ctx_var, workflow, id, is_async);
    let items_expr = params.iter().find(|(p, _)| p == "items").map(|(_, v)| v.clone()).unwrap_or_else(|| "[]".to_string());
    let execute_expr = params.iter().find(|(p, _)| p == "execute").map(|(_, v)| v.clone()).unwrap_or_else(|| "true".to_string());

    let result_var = format!("{id}Result");
    pb.open_block(format!("if (!{execute_expr})"));
    pb.line(format!("const {result_var} = {{ onSuccess: false, onFailure: false, results: [] }};"));
    pb.close_and_open("else");

    pb.line(format!("const {id}Results = [];"));
    pb.open_block(format!("for (const item of {items_expr})"));
    let scope_name = nt.scopes.first().cloned().unwrap_or_else(|| "iteration".to_string());
    let child_ctx = format!("{id}ItemCtx");
    pb.line(format!("const {child_ctx} = {ctx_var}.createScope(\"{id}\", {idx}, \"{scope_name}\");"));
    pb.line(format!(
        "{child_ctx}.setVariable({{ id: \"{id}\", portName: \"item\", executionIndex: {idx}, nodeTypeName: \"{}\" }}, item);",
        nt.name
    ));
    for child in workflow.children_of(id, &scope_name) {
        emit_node(pb, &child_ctx, workflow, analysis, child, is_async);
    }
    pb.line(format!(
        "const processed = {child_ctx}.getVariable({{ id: \"{id}\", portName: \"processed\", executionIndex: {idx}, nodeTypeName: \"{}\" }});",
        nt.name
    ));
    pb.line(format!("{ctx_var}.mergeScope({child_ctx});"));
    pb.line(format!("{id}Results.push(processed);"));
    pb.close_block();
    pb.line(format!("const {result_var} = {{ onSuccess: true, onFailure: false, results: {id}Results }};"));
    pb.close_block();

    emit_status_event(pb, ctx_var, &nt.name, id, &idx, "SUCCEEDED");
    emit_output_sets(pb, ctx_var, nt, id, &idx, &result_var, is_async);
}

/// Wraps a node-level scope (a scope whose children stay in the CFG but run inside a
/// dedicated child context): creates the child context, lowers the children into it, and
/// merges it back. Used for node types that open a `scopes` attribute scope without
/// per-port scoped outputs — e.g. a retry wrapper's body.
pub fn emit_node_level_scope(pb: &mut ProcBuilder, ctx_var: &str, workflow: &Workflow, analysis: &Analysis, id: &str, scope_name: &str, is_async: bool) {
    let idx = format!("{id}Idx");
    let child_ctx = format!("{id}Scope");
    pb.line(format!("const {child_ctx} = {ctx_var}.createScope(\"{id}\", {idx}, \"{scope_name}\");"));
    for child in workflow.children_of(id, scope_name) {
        emit_node(pb, &child_ctx, workflow, analysis, child, is_async);
    }
    pb.line(format!("{ctx_var}.mergeScope({child_ctx});"));
}

/// Top-level dispatcher used both by the emitter's main walk and recursively for branch
/// regions and scope bodies: resolves which strategy `id` needs and delegates.
pub fn emit_node(pb: &mut ProcBuilder, ctx_var: &str, workflow: &Workflow, analysis: &Analysis, id: &str, is_async: bool) {
    let Some(nt) = workflow.node_type_for(id) else { return };

    if let Some(region) = analysis.branch_regions.iter().find(|r| r.branch_node == id) {
        emit_branching_node(pb, ctx_var, workflow, analysis, region, is_async);
    } else {
        match nt.variant {
            NodeVariant::Workflow | NodeVariant::ImportedWorkflow => emit_workflow_call(pb, ctx_var, workflow, id, is_async),
            NodeVariant::MapIterator => emit_map_iterator(pb, ctx_var, workflow, analysis, id, is_async),
            NodeVariant::Function => {
                if workflow.instances.get(id).and_then(|i| i.config.pull_execution.as_ref()).is_some() {
                    emit_pull_node(pb, ctx_var, workflow, id, is_async);
                } else {
                    emit_regular_node(pb, ctx_var, workflow, &analysis.cfg, id, is_async);
                }
            }
        }
    }

    for scope_name in nt.scopes.clone() {
        if analysis.scope_classification.get(&scope_name) == Some(&ScopeKind::NodeLevel) {
            emit_node_level_scope(pb, ctx_var, workflow, analysis, id, &scope_name, is_async);
        }
    }
}
