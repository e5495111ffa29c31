//! The assembler: turns raw doc-comment text into [`crate::ast::NodeType`] and
//! [`crate::ast::Workflow`] values.
//!
//! A doc-comment block that carries `@input`/`@output`/`@step` lines declares a node
//! type, bound to the function immediately below it. A block that carries `@node`/
//! `@connect` lines declares a workflow body: the set of node instances and the edges
//! between their ports. A single source file can define any number of both, in any
//! order — the assembler gathers all node types first, then assembles every workflow
//! block against that full set so forward references resolve.

use std::collections::HashMap;

use crate::ast::{
    Connection, MapMacro, Macro, NodeInstance, NodeType, OrderedMap, PathMacro, Scope, Workflow,
};
use crate::error::{Diagnostic, DiagnosticCode};
use crate::parser::lifecycle::WorkflowOptions;
use crate::parser::macros as macro_parser;
use crate::parser::port::PortKind;
use crate::parser::{connect, fwimport, lifecycle, node as node_parser, port, position, scope};
use crate::token::{tokenize, TokenKind};

/// Resolves a host function's parameter/return types from its signature, letting the
/// assembler fill in [`crate::ast::PortDef::host_type`] when an annotation omits an
/// explicit type. Implemented against whatever introspection the host language offers;
/// [`NullSignatureProvider`] is the default when no such introspection is wired up.
pub trait HostSignatureProvider {
    fn resolve_param_type(&self, function_name: &str, param_name: &str) -> Option<String>;
    fn resolve_return_type(&self, function_name: &str) -> Option<String>;
    /// Whether the host function is declared `async`. Used to attach `is_async` when the
    /// annotation itself does not say.
    fn is_async_function(&self, function_name: &str) -> Option<bool>;
}

/// A signature provider with no host introspection: every lookup returns `None`. Ports
/// default to [`crate::ast::DataType::Any`] and `is_async` is left to the annotation.
pub struct NullSignatureProvider;

impl HostSignatureProvider for NullSignatureProvider {
    fn resolve_param_type(&self, _function_name: &str, _param_name: &str) -> Option<String> {
        None
    }
    fn resolve_return_type(&self, _function_name: &str) -> Option<String> {
        None
    }
    fn is_async_function(&self, _function_name: &str) -> Option<bool> {
        None
    }
}

/// One parsed doc-comment block, still unclassified.
struct RawBlock {
    /// The function name the block annotates (the first identifier-looking token on the
    /// non-comment line immediately following the block), if one was found.
    function_name: Option<String>,
    lines: Vec<String>,
}

/// Split `source` into a sequence of raw comment blocks paired with the function they sit
/// above. Recognizes both `/** ... */` and runs of `/// ...` lines, stripping the leading
/// `*`/`///` decoration so each element of `lines` is exactly the annotation body.
fn split_blocks(source: &str) -> Vec<RawBlock> {
    let mut blocks = Vec::new();
    let lines: Vec<&str> = source.lines().collect();
    let mut i = 0;

    while i < lines.len() {
        let trimmed = lines[i].trim_start();
        if trimmed.starts_with("/**") {
            let mut body = Vec::new();
            i += 1;
            while i < lines.len() && !lines[i].trim_start().starts_with("*/") {
                let stripped = lines[i].trim_start().trim_start_matches('*').trim();
                if !stripped.is_empty() {
                    body.push(stripped.to_string());
                }
                i += 1;
            }
            i += 1; // consume closing */
            let function_name = find_function_name(&lines, i);
            blocks.push(RawBlock { function_name, lines: body });
        } else if trimmed.starts_with("///") {
            let mut body = Vec::new();
            while i < lines.len() && lines[i].trim_start().starts_with("///") {
                let stripped = lines[i].trim_start().trim_start_matches('/').trim();
                if !stripped.is_empty() {
                    body.push(stripped.to_string());
                }
                i += 1;
            }
            let function_name = find_function_name(&lines, i);
            blocks.push(RawBlock { function_name, lines: body });
        } else {
            i += 1;
        }
    }

    blocks
}

/// Scan forward from `start` past blank lines and other attributes to find a line
/// introducing a function, returning its name.
fn find_function_name(lines: &[&str], start: usize) -> Option<String> {
    let mut i = start;
    while i < lines.len() {
        let trimmed = lines[i].trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("pub(") {
            i += 1;
            continue;
        }
        if let Some(rest) = trimmed
            .strip_prefix("pub async fn ")
            .or_else(|| trimmed.strip_prefix("async fn "))
            .or_else(|| trimmed.strip_prefix("pub fn "))
            .or_else(|| trimmed.strip_prefix("fn "))
        {
            let name: String = rest.chars().take_while(|c| c.is_alphanumeric() || *c == '_').collect();
            return if name.is_empty() { None } else { Some(name) };
        }
        return None;
    }
    None
}

/// The outcome of assembling an entire source file.
pub struct AssembledSource {
    pub node_types: OrderedMap<NodeType>,
    pub workflows: Vec<Workflow>,
    pub workflow_options: HashMap<String, WorkflowOptions>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Assemble every node type and workflow declared in `source`.
pub fn assemble(source: &str, provider: &dyn HostSignatureProvider) -> AssembledSource {
    let blocks = split_blocks(source);
    let mut diagnostics = Vec::new();
    let mut node_types = OrderedMap::new();
    let mut workflows = Vec::new();
    let mut workflow_options = HashMap::new();

    for block in &blocks {
        let is_node_type_block = block.lines.iter().any(|l| {
            l.starts_with("@input") || l.starts_with("@output") || l.starts_with("@step")
        });
        let is_workflow_block = block.lines.iter().any(|l| l.starts_with("@node") || l.starts_with("@connect"));

        if is_node_type_block && !is_workflow_block {
            if let Some(nt) = assemble_node_type(block, provider, &mut diagnostics) {
                node_types.insert(nt.name.clone(), nt);
            }
        } else if is_workflow_block {
            let (wf, opts) = assemble_workflow(block, &mut diagnostics);
            if let Some(name) = &block.function_name {
                workflow_options.insert(name.clone(), opts);
            }
            workflows.push(wf);
        }
    }

    AssembledSource { node_types, workflows, workflow_options, diagnostics }
}

/// Derive the PascalCase type name `@node` lines refer to from the annotated function's
/// name (`charge_card` -> `ChargeCard`, `computeLazy` -> `ComputeLazy`). The function name
/// itself is kept verbatim in [`NodeType::function_name`] as the call target.
fn pascal_case(ident: &str) -> String {
    ident
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

fn assemble_node_type(
    block: &RawBlock,
    provider: &dyn HostSignatureProvider,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<NodeType> {
    let function_name = block.function_name.clone()?;
    let type_name = pascal_case(&function_name);
    let mut nt = NodeType::new(&type_name, &function_name);

    for line in &block.lines {
        let Some(tokens) = tokenize(line) else {
            diagnostics.push(Diagnostic::error(DiagnosticCode::LexicalError, format!("unlexable annotation line: {line}")));
            continue;
        };
        let Some(head) = tokens.first() else { continue };
        let rest = &tokens[1..];

        match &head.kind {
            TokenKind::TagInput => {
                if let Some(pl) = port::parse(PortKind::Input, rest, diagnostics) {
                    let mut p = pl.port;
                    if p.host_type.is_none() {
                        p.host_type = provider.resolve_param_type(&function_name, &p.name);
                    }
                    if let Some(scope) = &p.scope {
                        if !nt.scopes.contains(scope) {
                            nt.scopes.push(scope.clone());
                        }
                    }
                    nt.inputs.insert(p.name.clone(), p);
                }
            }
            TokenKind::TagOutput => {
                if let Some(pl) = port::parse(PortKind::Output, rest, diagnostics) {
                    let p = pl.port;
                    if p.name == "onSuccess" {
                        nt.has_success_port = true;
                    }
                    if p.name == "onFailure" {
                        nt.has_failure_port = true;
                    }
                    if let Some(scope) = &p.scope {
                        if !nt.scopes.contains(scope) {
                            nt.scopes.push(scope.clone());
                        }
                    }
                    nt.outputs.insert(p.name.clone(), p);
                }
            }
            TokenKind::TagStep => {
                if let Some(pl) = port::parse(PortKind::Step, rest, diagnostics) {
                    let p = pl.port;
                    if p.name == "onSuccess" {
                        nt.has_success_port = true;
                    } else if p.name == "onFailure" {
                        nt.has_failure_port = true;
                    }
                    nt.outputs.insert(p.name.clone(), p);
                }
            }
            _ => {}
        }
    }

    if let Some(is_async) = provider.is_async_function(&function_name) {
        nt.is_async = is_async;
    }

    Some(nt)
}

fn assemble_workflow(block: &RawBlock, diagnostics: &mut Vec<Diagnostic>) -> (Workflow, WorkflowOptions) {
    let name = block.function_name.clone().unwrap_or_else(|| "anonymous".to_string());
    let mut wf = Workflow::new(name);
    let mut opts = WorkflowOptions::default();
    let mut parent_overrides: Vec<(String, String, String)> = Vec::new();

    for line in &block.lines {
        let Some(tokens) = tokenize(line) else {
            diagnostics.push(Diagnostic::error(DiagnosticCode::LexicalError, format!("unlexable annotation line: {line}")));
            continue;
        };
        let Some(head) = tokens.first() else { continue };
        let rest = &tokens[1..];

        match &head.kind {
            TokenKind::TagNode => {
                if let Some(nl) = node_parser::parse(rest, diagnostics) {
                    let mut inst = NodeInstance::new(nl.instance_id.clone(), nl.type_name);
                    inst.config = nl.config;
                    if let Some(parent) = &inst.config.parent {
                        parent_overrides.push((nl.instance_id.clone(), parent.id.clone(), parent.scope.clone()));
                    }
                    wf.instances.insert(nl.instance_id, inst);
                }
            }
            TokenKind::TagConnect => {
                if let Some(conn) = connect::parse(rest, diagnostics) {
                    wf.connections.push(conn);
                }
            }
            TokenKind::TagScope => {
                if let Some(s) = scope::parse(rest, diagnostics) {
                    wf.scopes.push(s);
                }
            }
            TokenKind::TagPosition => {
                if let Some(pl) = position::parse(rest, diagnostics) {
                    if let Some(inst) = wf.instances.get_mut(&pl.instance_id) {
                        inst.config.position = Some((pl.x, pl.y));
                    }
                }
            }
            TokenKind::TagPath => {
                if let Some(pm) = macro_parser::parse_path(rest, diagnostics) {
                    apply_path_macro(&mut wf, &pm);
                    wf.macros.push(Macro::Path(pm));
                }
            }
            TokenKind::TagMap => {
                // `@map <instance> <child> over <src>.<port> [as ...]` — the instance id
                // is the first token, the rest is delegated to the macro parser.
                if let Some((first, tail)) = rest.split_first() {
                    if let TokenKind::Ident(instance_id) = &first.kind {
                        if let Some(mm) = macro_parser::parse_map(instance_id, tail, diagnostics) {
                            apply_map_macro(&mut wf, &mm);
                            wf.macros.push(Macro::Map(mm));
                        }
                    }
                }
            }
            TokenKind::TagTrigger | TokenKind::TagCancelOn | TokenKind::TagRetries
            | TokenKind::TagTimeout | TokenKind::TagThrottle => {
                lifecycle::parse(&head.kind, rest, &mut opts, diagnostics);
            }
            TokenKind::TagFwImport => {
                if let Some(fi) = fwimport::parse(rest, diagnostics) {
                    // `alias` is the key this workflow's `@node` lines look up; `type_name`
                    // is the symbol the emitter calls in the generated workflow-call site.
                    let mut nt = NodeType::new(&fi.alias, &fi.type_name);
                    nt.variant = crate::ast::NodeVariant::ImportedWorkflow;
                    nt.import_source = Some(fi.source);
                    wf.node_types.insert(fi.alias, nt);
                }
            }
            _ => {}
        }
    }

    reconcile_scopes(&mut wf, &parent_overrides, diagnostics);
    (wf, opts)
}

/// Merge `parent:` attribute overrides into `wf.scopes`, deduplicating against any
/// explicit `@scope` child list and flagging contradictions.
fn reconcile_scopes(wf: &mut Workflow, overrides: &[(String, String, String)], diagnostics: &mut Vec<Diagnostic>) {
    for (child, parent_id, scope_name) in overrides {
        let scope = wf.scopes.iter_mut().find(|s| s.name == *scope_name);
        match scope {
            Some(s) => {
                if !s.children.contains(child) {
                    s.children.push(child.clone());
                }
            }
            None => {
                wf.scopes.push(Scope { name: scope_name.clone(), children: vec![child.clone()] });
            }
        }
        if !wf.instances.contains_key(parent_id) {
            diagnostics.push(
                Diagnostic::warning(
                    DiagnosticCode::IllegalScopeParent,
                    format!("'{child}' declares parent '{parent_id}' which is not a known instance"),
                )
                .with_suggestions(Vec::new()),
            );
        }
    }
}

/// Expand a `@path` macro into ordinary `Start`/`ok`/`fail` control-flow connections.
fn apply_path_macro(wf: &mut Workflow, pm: &PathMacro) {
    for window in pm.steps.windows(2) {
        let (from, to) = (&window[0], &window[1]);
        let out_port = match to.route {
            Some(crate::ast::Route::Fail) => "onFailure",
            _ => "onSuccess",
        };
        wf.connections.push(Connection {
            from: crate::ast::Endpoint::new(from.node.clone(), out_port),
            to: crate::ast::Endpoint::new(to.node.clone(), "execute"),
        });
    }
}

/// Expand a `@map` macro into the iterator-source connection plus the child's per-port
/// scope wiring.
fn apply_map_macro(wf: &mut Workflow, mm: &MapMacro) {
    wf.connections.push(Connection {
        from: crate::ast::Endpoint::new(mm.source_node.clone(), mm.source_port.clone()),
        to: crate::ast::Endpoint::new(mm.instance_id.clone(), "items"),
    });
    if let (Some(input_port), Some(output_port)) = (&mm.input_port, &mm.output_port) {
        wf.connections.push(Connection {
            from: crate::ast::Endpoint::scoped(mm.instance_id.clone(), "item", "iteration"),
            to: crate::ast::Endpoint::new(mm.child_id.clone(), input_port.clone()),
        });
        wf.connections.push(Connection {
            from: crate::ast::Endpoint::new(mm.child_id.clone(), output_port.clone()),
            to: crate::ast::Endpoint::scoped(mm.instance_id.clone(), "result", "iteration"),
        });
    }
    let scope = wf.scopes.iter_mut().find(|s| s.name == "iteration" );
    match scope {
        Some(s) if !s.children.contains(&mm.child_id) => s.children.push(mm.child_id.clone()),
        None => wf.scopes.push(Scope { name: "iteration".to_string(), children: vec![mm.child_id.clone()] }),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODE_TYPE_SRC: &str = r#"
/**
 * @input amount number
 * @output onSuccess
 * @output onFailure
 */
pub fn charge_card(amount: f64) {}
"#;

    const WORKFLOW_SRC: &str = r#"
/**
 * @node a ChargeCard
 * @node b SendReceipt
 * @connect a.onSuccess -> b.execute
 */
pub fn checkout() {}
"#;

    #[test]
    fn assembles_node_type_from_block() {
        let result = assemble(NODE_TYPE_SRC, &NullSignatureProvider);
        let nt = result.node_types.get("ChargeCard").unwrap();
        assert_eq!(nt.function_name, "charge_card");
        assert!(nt.inputs.contains_key("amount"));
        assert!(nt.has_success_port);
        assert!(nt.has_failure_port);
    }

    #[test]
    fn node_type_records_scope_from_scoped_ports() {
        let src = r#"
/**
 * @input items array
 * @output onSuccess
 * @output item number [scope:iteration]
 * @input processed number [scope:iteration]
 */
pub fn each() {}
"#;
        let result = assemble(src, &NullSignatureProvider);
        let nt = result.node_types.get("Each").unwrap();
        assert_eq!(nt.scopes, vec!["iteration".to_string()]);
        assert!(nt.opens_scope("iteration"));
    }

    #[test]
    fn pascal_case_handles_single_word_and_snake_case() {
        assert_eq!(pascal_case("charge_card"), "ChargeCard");
        assert_eq!(pascal_case("each"), "Each");
        assert_eq!(pascal_case("on_ok"), "OnOk");
    }

    #[test]
    fn assembles_workflow_instances_and_connections() {
        let result = assemble(WORKFLOW_SRC, &NullSignatureProvider);
        assert_eq!(result.workflows.len(), 1);
        let wf = &result.workflows[0];
        assert_eq!(wf.instances.len(), 2);
        assert_eq!(wf.connections.len(), 1);
    }

    #[test]
    fn path_macro_expands_to_connections() {
        let src = r#"
/**
 * @node a Step1
 * @node b Step2
 * @path a -> b
 */
pub fn flow() {}
"#;
        let result = assemble(src, &NullSignatureProvider);
        let wf = &result.workflows[0];
        assert_eq!(wf.connections.len(), 1);
        assert_eq!(wf.connections[0].from.port, "onSuccess");
    }

    #[test]
    fn scope_merges_parent_attribute() {
        let src = r#"
/**
 * @node loop Each
 * @node body DoWork [parent: loop.iteration]
 */
pub fn flow() {}
"#;
        let result = assemble(src, &NullSignatureProvider);
        let wf = &result.workflows[0];
        let scope = wf.scopes.iter().find(|s| s.name == "iteration").unwrap();
        assert_eq!(scope.children, vec!["body".to_string()]);
    }
}
