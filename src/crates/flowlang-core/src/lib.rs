//! `flowlang-core` — the annotation grammar/parser, graph analyzer, and code emitter for
//! visual dataflow workflows embedded in host source as doc-comment annotations.
//!
//! This crate is the compiler; it does not execute workflows, does not interpret the
//! host-language expressions carried inside port values, and does not perform structural
//! type inference of its own (see [`assembler::HostSignatureProvider`]). Its public
//! surface is the small set of functions in this module, mirroring the compile API a host
//! tool (an editor, a build plugin, the `flowlang` CLI) is expected to call: [`parse`],
//! [`validate`], [`generate`], [`compile`], [`generate_annotations`], and
//! [`generate_in_place`].

pub mod analyzer;
pub mod assembler;
pub mod ast;
pub mod emitter;
pub mod error;
pub mod parser;
pub mod reemit;
pub mod sugar;
pub mod token;
pub mod validator;

use std::collections::HashMap;

pub use analyzer::{analyze, Analysis};
pub use ast::Workflow;
pub use emitter::{generate as generate_from_analysis, GenerateOptions};
pub use error::{Diagnostic, DiagnosticCode, FlowError, Result, Severity};

use assembler::{AssembledSource, HostSignatureProvider, NullSignatureProvider};
use parser::lifecycle::WorkflowOptions;
use validator::UnannotatedFunctions;

/// The outcome of [`parse`]: every node type and workflow found in a host source file,
/// plus any diagnostics the assembler accumulated while reading it.
#[derive(Debug)]
pub struct ParseResult {
    pub workflows: Vec<Workflow>,
    pub node_types: ast::OrderedMap<ast::NodeType>,
    pub workflow_options: HashMap<String, WorkflowOptions>,
    pub warnings: Vec<Diagnostic>,
    pub errors: Vec<Diagnostic>,
}

/// Parse `source`, gathering every node-type and workflow doc-comment block it contains.
///
/// Uses [`NullSignatureProvider`] — no host-language type introspection — matching what a
/// caller with no signature adapter on hand gets by default; pass a concrete
/// [`HostSignatureProvider`] via [`parse_with_provider`] to resolve port host types from
/// function signatures instead.
#[tracing::instrument(skip(source))]
pub fn parse(source: &str) -> ParseResult {
    parse_with_provider(source, &NullSignatureProvider)
}

/// Like [`parse`], but resolving port host types and async-ness through `provider`.
#[tracing::instrument(skip(source, provider))]
pub fn parse_with_provider(source: &str, provider: &dyn HostSignatureProvider) -> ParseResult {
    let AssembledSource { node_types, mut workflows, workflow_options, diagnostics } =
        assembler::assemble(source, provider);

    // Every workflow body is assembled against its own node-type set, which so far holds
    // only `@fwImport`-declared types (assembled inline, scoped to that workflow). Merge
    // in the globally discovered node types here, without overwriting an `@fwImport`
    // entry of the same name — per the Open Question decision in `DESIGN.md`, the
    // importSource-bearing variant takes precedence over an inline type of the same name.
    for wf in &mut workflows {
        for (name, nt) in node_types.iter() {
            if !wf.node_types.contains_key(name) {
                wf.node_types.insert(name.to_string(), nt.clone());
            }
        }
    }

    // Fold the sugar engine's macro-freshness pass in on every parse, as the lifecycle
    // invariant in the AST's design notes requires ("stale macros dropped on every
    // assemble pass").
    for wf in &mut workflows {
        let macros = std::mem::take(&mut wf.macros);
        wf.macros = sugar::filter_stale(wf, macros);
    }

    let (errors, warnings): (Vec<_>, Vec<_>) = diagnostics.into_iter().partition(Diagnostic::is_error);
    ParseResult { workflows, node_types, workflow_options, warnings, errors }
}

/// Validate `workflow` against its own node types, returning every diagnostic the
/// validator finds (errors and warnings intermixed, in discovery order). `strict_types`
/// escalates an `OBJECT`-typed port mismatch from a warning to an error (see
/// `DESIGN.md`'s Open Question decision on the `strictTypes` default).
#[tracing::instrument(skip(workflow), fields(workflow = %workflow.name))]
pub fn validate(workflow: &Workflow) -> Vec<Diagnostic> {
    validate_opts(workflow, &UnannotatedFunctions::default(), false)
}

/// [`validate`] with an explicit set of unannotated host function names (for the
/// "function exists but has no nodeType annotation" hint) and `strict_types` control.
pub fn validate_opts(workflow: &Workflow, unannotated: &UnannotatedFunctions, strict_types: bool) -> Vec<Diagnostic> {
    validator::validate(workflow, unannotated, strict_types)
}

/// Analyze and lower `workflow` into procedure text per `options`. Re-runs [`analyze`]
/// from scratch — `Analysis` is never cached on `Workflow` (see the AST's Lifecycle
/// invariant) — so this is safe to call repeatedly as a workflow is edited.
#[tracing::instrument(skip(workflow, options), fields(workflow = %workflow.name))]
pub fn generate(workflow: &Workflow, options: &GenerateOptions) -> Result<String> {
    let analysis = analyze(workflow)?;
    emitter::generate(workflow, &analysis, options)
}

/// The outcome of [`compile`]: parse, validate, and generate every workflow found in a
/// source file in one call, the way a build-time plugin wants it.
#[derive(Debug)]
pub struct CompileOutput {
    pub generated: HashMap<String, String>,
    pub warnings: Vec<Diagnostic>,
    pub errors: Vec<Diagnostic>,
}

/// `compile(source) = parse ⨁ validate ⨁ generate` (§6.4): parse every workflow in
/// `source`, validate each, and generate code for those with no error-severity
/// diagnostic. A workflow that fails validation is skipped (its errors are still
/// returned) rather than aborting the whole compile — the same "one root cause, many
/// diagnostics, but compilation proceeds" posture the validator itself follows.
#[tracing::instrument(skip(source, options))]
pub fn compile(source: &str, options: &GenerateOptions) -> CompileOutput {
    let parsed = parse(source);
    let mut warnings = parsed.warnings;
    let mut errors = parsed.errors;
    let mut generated = HashMap::new();

    for wf in &parsed.workflows {
        let diags = validate(wf);
        let (mut wf_errors, mut wf_warnings): (Vec<_>, Vec<_>) = diags.into_iter().partition(Diagnostic::is_error);
        let has_errors = !wf_errors.is_empty();
        errors.append(&mut wf_errors);
        warnings.append(&mut wf_warnings);

        if has_errors {
            continue;
        }

        match generate(wf, options) {
            Ok(code) => {
                generated.insert(wf.name.clone(), code);
            }
            Err(FlowError::Cycle(nodes)) => {
                errors.push(Diagnostic::error(DiagnosticCode::Cycle, format!("cycle detected among nodes: {}", nodes.join(", "))));
            }
            Err(other) => {
                errors.push(Diagnostic::error(DiagnosticCode::UnreachableInstance, other.to_string()));
            }
        }
    }

    CompileOutput { generated, warnings, errors }
}

/// `generateAnnotations(workflow) -> string` (§6.4): regenerate the canonical
/// doc-annotation block for `workflow`, suitable for round-trip re-parsing.
pub fn generate_annotations(workflow: &Workflow) -> String {
    reemit::render(workflow, None)
}

/// The outcome of [`generate_in_place`].
#[derive(Debug, Clone)]
pub struct InPlaceResult {
    pub code: String,
    pub has_changes: bool,
}

/// `generateInPlace(source, workflow) -> {code, hasChanges}` (§6.4): replace the
/// doc-annotation block belonging to `workflow.name` inside `source` with its canonical
/// re-emission, leaving every other line (including non-generated host code) untouched.
pub fn generate_in_place(source: &str, workflow: &Workflow) -> InPlaceResult {
    reemit::replace_in_place(source, workflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = r#"
/**
 * @input amount number
 * @output onSuccess
 * @output onFailure
 */
pub fn charge_card(amount: f64) {}

/**
 * @input amount number
 * @output onSuccess
 * @output onFailure
 */
pub fn send_receipt(amount: f64) {}

/**
 * @node a ChargeCard
 * @node b SendReceipt
 * @connect Start.execute -> a.execute
 * @connect a.onSuccess -> b.execute
 * @connect a.amount -> b.amount
 * @connect b.onSuccess -> Exit.onSuccess
 */
pub fn checkout() {}
"#;

    #[test]
    fn parse_finds_node_types_and_workflow() {
        let result = parse(SRC);
        assert!(result.errors.is_empty());
        assert_eq!(result.node_types.len(), 2);
        assert_eq!(result.workflows.len(), 1);
    }

    #[test]
    fn compile_generates_code_for_valid_workflow() {
        let output = compile(SRC, &GenerateOptions::default());
        assert!(output.errors.is_empty(), "unexpected errors: {:?}", output.errors);
        assert!(output.generated.contains_key("checkout"));
        assert!(output.generated["checkout"].contains("export function checkout"));
    }

    #[test]
    fn compile_skips_generation_for_workflow_with_unknown_type() {
        let src = r#"
/**
 * @node a Missing
 * @connect Start.execute -> a.execute
 */
pub fn broken() {}
"#;
        let output = compile(src, &GenerateOptions::default());
        assert!(!output.errors.is_empty());
        assert!(!output.generated.contains_key("broken"));
    }

    #[test]
    fn compile_still_generates_code_despite_unconnected_required_port() {
        let src = r#"
/**
 * @input amount number
 * @output onSuccess
 */
pub fn charge_card(amount: f64) {}

/**
 * @node a ChargeCard
 * @connect Start.execute -> a.execute
 * @connect a.onSuccess -> Exit.onSuccess
 */
pub fn checkout() {}
"#;
        let output = compile(src, &GenerateOptions::default());
        assert!(output.generated.contains_key("checkout"), "unconnected required port must warn, not block generation");
        assert!(output.warnings.iter().any(|d| d.code == DiagnosticCode::RequiredPortUnconnected));
    }

    #[test]
    fn generate_annotations_round_trips_through_parse() {
        let parsed = parse(SRC);
        let wf = &parsed.workflows[0];
        let annotated = generate_annotations(wf);
        assert!(annotated.contains("@node a ChargeCard"));
        assert!(annotated.contains("@connect"));
    }
}
