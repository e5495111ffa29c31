//! The emitter: lowers a [`Workflow`] plus its [`Analysis`] into procedure text targeting
//! the execution-context abstraction (see `DESIGN.md`). The emitter never assumes a
//! concrete host runtime exists; it only emits syntactically valid calls against the
//! `ContextMethod` names below, the same way a text-accumulator diagram renderer emits
//! DOT/Mermaid text without assuming a viewer is present.
//!
//! `generate` is a pure function of `(workflow, analysis, options)`: same inputs always
//! produce byte-identical output, which is what lets a caller cache on a content hash
//! instead of re-emitting on every request.

pub mod builder;
pub mod guard;
pub mod lower;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::analyzer::{Analysis, ScopeKind};
use crate::ast::{Workflow, EXIT_NODE, MergeStrategy};
use crate::error::Result;

pub use builder::ProcBuilder;

/// How the generated procedure is exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    Esm,
    Cjs,
}

/// Configuration surface for [`generate`]/`compile`. Round-trips through YAML so the CLI's
/// `--config` flag can load it from a file the same way a graph definition loads from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateOptions {
    pub production: bool,
    pub async_forced: bool,
    pub module_format: ModuleFormat,
    pub external_runtime_path: Option<String>,
    pub external_node_types: HashMap<String, String>,
    pub bundle_mode: bool,
    pub strict_types: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            production: false,
            async_forced: false,
            module_format: ModuleFormat::Esm,
            external_runtime_path: None,
            external_node_types: HashMap::new(),
            bundle_mode: false,
            strict_types: false,
        }
    }
}

/// The shape of the execution-context interface the emitted code calls into. The core
/// never implements these; it only uses this enum to keep every generated call-site name
/// spelled the same way (see the crate-level `DESIGN.md` entry for this module).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMethod {
    AddExecution,
    SetVariable,
    GetVariable,
    SendStatusChangedEvent,
    SendLogErrorEvent,
    SendWorkflowCompletedEvent,
    RegisterPullExecutor,
    CreateScope,
    MergeScope,
    CheckAborted,
}

impl ContextMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextMethod::AddExecution => "addExecution",
            ContextMethod::SetVariable => "setVariable",
            ContextMethod::GetVariable => "getVariable",
            ContextMethod::SendStatusChangedEvent => "sendStatusChangedEvent",
            ContextMethod::SendLogErrorEvent => "sendLogErrorEvent",
            ContextMethod::SendWorkflowCompletedEvent => "sendWorkflowCompletedEvent",
            ContextMethod::RegisterPullExecutor => "registerPullExecutor",
            ContextMethod::CreateScope => "createScope",
            ContextMethod::MergeScope => "mergeScope",
            ContextMethod::CheckAborted => "checkAborted",
        }
    }
}

/// Embedded in emitted output so a runtime can assert compatibility with the context shape
/// this version of the emitter targets.
pub const CONTEXT_API_VERSION: &str = "1.0";

/// Recursion-depth ceiling enforced before any node runs (see the analyzer's matching
/// constant for the emitter/analyzer agreement on this number).
pub const MAX_RECURSION_DEPTH: u32 = crate::analyzer::MAX_RECURSION_DEPTH;

fn sanitize_ident(name: &str) -> String {
    name.chars().map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' }).collect()
}

fn nodes_in_any_region(analysis: &Analysis) -> std::collections::HashSet<String> {
    let mut out = std::collections::HashSet::new();
    for region in &analysis.branch_regions {
        out.extend(region.success_region.iter().cloned());
        out.extend(region.failure_region.iter().cloned());
    }
    out
}

fn per_port_scoped(workflow: &Workflow, analysis: &Analysis, id: &str) -> bool {
    workflow
        .instances
        .get(id)
        .and_then(|i| i.config.parent.as_ref())
        .map(|p| analysis.scope_classification.get(&p.scope) == Some(&ScopeKind::PerPort))
        .unwrap_or(false)
}

/// Pre-declare `let {id}Idx;` (and `{id}_success;` for branching nodes and chain members)
/// at function top so later sibling blocks can read values set inside an earlier
/// conditional block. See the module-level doc comment on `lower.rs`.
fn emit_prelude_declarations(pb: &mut ProcBuilder, workflow: &Workflow, analysis: &Analysis) {
    let mut idx_names: Vec<String> = workflow.instance_ids().into_iter().map(|id| format!("{id}Idx")).collect();
    idx_names.sort();
    idx_names.dedup();
    if !idx_names.is_empty() {
        pb.line(format!("let {};", idx_names.join(", ")));
    }

    let mut success_names: Vec<String> = Vec::new();
    for region in &analysis.branch_regions {
        success_names.push(format!("{}_success", region.branch_node));
    }
    for chain in &analysis.chains {
        for id in &chain.nodes {
            success_names.push(format!("{id}_success"));
        }
    }
    success_names.sort();
    success_names.dedup();
    if !success_names.is_empty() {
        pb.line(format!("let {};", success_names.join(", ")));
    }
}

fn emit_start_assignments(pb: &mut ProcBuilder, workflow: &Workflow) {
    pb.line("const StartIdx = ctx.addExecution(\"Start\");");
    pb.line("ctx.setVariable({ id: \"Start\", portName: \"execute\", executionIndex: StartIdx, nodeTypeName: \"Start\" }, execute);");
    let _ = workflow;
    pb.line("ctx.sendStatusChangedEvent({ nodeTypeName: \"Start\", id: \"Start\", executionIndex: StartIdx, status: \"SUCCEEDED\" });");
}

fn merge_expr(ctx_var: &str, workflow: &Workflow, sources: &[(String, String)], strategy: MergeStrategy, is_async: bool) -> String {
    let exprs: Vec<String> = sources
        .iter()
        .map(|(node, port)| lower::read_expr(ctx_var, workflow, node, port, is_async))
        .collect();
    match strategy {
        MergeStrategy::LogicalOr => exprs.join(" || "),
        MergeStrategy::NullishCoalesce => exprs.join(" ?? "),
    }
}

fn emit_exit(pb: &mut ProcBuilder, workflow: &Workflow, is_async: bool, production: bool) {
    let mut by_port: Vec<(String, Vec<(String, String)>, MergeStrategy)> = Vec::new();
    for conn in &workflow.connections {
        if conn.to.node != EXIT_NODE {
            continue;
        }
        let strategy = workflow
            .node_type_for(&conn.from.node)
            .and_then(|nt| nt.outputs.get(&conn.from.port))
            .and_then(|p| p.merge_strategy)
            .unwrap_or(if conn.from.port == "onSuccess" || conn.from.port == "onFailure" {
                MergeStrategy::LogicalOr
            } else {
                MergeStrategy::NullishCoalesce
            });
        if let Some(entry) = by_port.iter_mut().find(|(p, _, _)| *p == conn.to.port) {
            entry.1.push((conn.from.node.clone(), conn.from.port.clone()));
        } else {
            by_port.push((conn.to.port.clone(), vec![(conn.from.node.clone(), conn.from.port.clone())], strategy));
        }
    }

    pb.line("const result = {};");
    for (port, sources, strategy) in &by_port {
        let expr = merge_expr("ctx", workflow, sources, *strategy, is_async);
        pb.line(format!("result.{} = {};", sanitize_ident(port), expr));
        if !production {
            pb.line(format!(
                "ctx.setVariable({{ id: \"Exit\", portName: \"{port}\", executionIndex: StartIdx, nodeTypeName: \"Exit\" }}, result.{});",
                sanitize_ident(port)
            ));
        }
    }
    pb.line("ctx.sendStatusChangedEvent({ nodeTypeName: \"Exit\", id: \"Exit\", executionIndex: StartIdx, status: \"SUCCEEDED\" });");
    pb.line("ctx.sendWorkflowCompletedEvent({ executionIndex: StartIdx, status: \"SUCCEEDED\", result });");
    pb.line("return result;");
}

fn function_is_async(workflow: &Workflow, options: &GenerateOptions) -> bool {
    if options.async_forced || workflow.user_specified_async {
        return true;
    }
    workflow.instances.iter().any(|(_, inst)| workflow.node_types.get(&inst.type_name).map(|nt| nt.is_async).unwrap_or(false))
}

/// Lower `workflow` (with its already-computed `analysis`) into a complete procedure per
/// `options`. Recomputes nothing from `analysis` — the caller is expected to have just run
/// [`crate::analyzer::analyze`], matching the "derived analyses are never persisted"
/// lifecycle invariant.
#[tracing::instrument(skip(workflow, analysis, options), fields(workflow = %workflow.name))]
pub fn generate(workflow: &Workflow, analysis: &Analysis, options: &GenerateOptions) -> Result<String> {
    let is_async = function_is_async(workflow, options);
    let fn_name = sanitize_ident(&workflow.name);

    let mut pb = ProcBuilder::new();

    if matches!(options.module_format, ModuleFormat::Esm) {
        pb.line(format!(
            "export {}function {fn_name}(execute, params = {{}}) {{",
            if is_async { "async " } else { "" }
        ));
    } else {
        pb.line(format!("{}function {fn_name}(execute, params = {{}}) {{", if is_async { "async " } else { "" }));
    }
    pb.indent();

    pb.line(format!("// context API v{CONTEXT_API_VERSION}"));
    // __rd__ travels inside `params` (see emit_workflow_call), not as its own positional
    // argument — a positional parameter would silently reset to its default on every
    // nested workflow call instead of accumulating, defeating this guard.
    pb.line("const __rd__ = params.__rd__ ?? 0;");
    pb.open_block("if (__rd__ >= 1000)");
    pb.line("throw new Error(\"recursion depth exceeded\");");
    pb.close_block();

    let debug_expr = if options.production { "undefined" } else { "debuggerHandle" };
    pb.line(format!(
        "const ctx = createExecutionContext({{ async: {is_async}, abortSignal, debug: {debug_expr} }});"
    ));

    emit_start_assignments(&mut pb, workflow);
    emit_prelude_declarations(&mut pb, workflow, analysis);

    let region_members = nodes_in_any_region(analysis);
    let mut chain_head_of: HashMap<&str, &crate::analyzer::Chain> = HashMap::new();
    let mut chain_member: std::collections::HashSet<&str> = std::collections::HashSet::new();
    for chain in &analysis.chains {
        if let Some(head) = chain.nodes.first() {
            chain_head_of.insert(head.as_str(), chain);
        }
        for n in &chain.nodes {
            chain_member.insert(n.as_str());
        }
    }

    for id in &analysis.topo_order {
        if per_port_scoped(workflow, analysis, id) {
            continue;
        }
        if region_members.contains(id) {
            continue;
        }
        if let Some(chain) = chain_head_of.get(id.as_str()) {
            lower::emit_chain(&mut pb, "ctx", workflow, &analysis.cfg, chain, is_async);
            continue;
        }
        if chain_member.contains(id.as_str()) {
            continue; // non-head chain member, already emitted as part of its chain
        }
        lower::emit_node(&mut pb, "ctx", workflow, analysis, id, is_async);
    }

    emit_exit(&mut pb, workflow, is_async, options.production);

    pb.dedent();
    pb.line("}");

    if matches!(options.module_format, ModuleFormat::Cjs) {
        pb.line(format!("module.exports = {{ {fn_name} }};"));
    }

    Ok(pb.finish())
}
