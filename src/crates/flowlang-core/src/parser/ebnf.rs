//! Text-only EBNF rendering of the reflected grammar.
//!
//! Deliberately plain text: no HTML, no railroad diagrams. `flowlang grammar` pipes this
//! straight to stdout or a `.ebnf` file.

use super::{GrammarDef, Symbol};

/// Render a [`Symbol`] as EBNF surface syntax.
fn render_symbol(sym: &Symbol) -> String {
    match sym {
        Symbol::Literal(s) => format!("\"{}\"", s),
        Symbol::Ref(name) => name.clone(),
        Symbol::Repeat(inner) => format!("{{ {} }}", render_symbol(inner)),
        Symbol::Opt(inner) => format!("[ {} ]", render_symbol(inner)),
    }
}

/// Render a complete [`GrammarDef`] as a sequence of `name = alt1 | alt2 | ... ;` lines,
/// in the order productions were registered.
pub fn render(grammar: &GrammarDef) -> String {
    let mut out = String::new();
    for prod in &grammar.productions {
        let alts: Vec<String> = prod
            .alternatives
            .iter()
            .map(|alt| alt.0.iter().map(render_symbol).collect::<Vec<_>>().join(" "))
            .collect();
        out.push_str(&format!("{} = {} ;\n", prod.name, alts.join("\n    | ")));
    }
    out
}

/// Merge several grammar fragments (one per tag family) into a single definition,
/// preserving each fragment's internal production order and concatenating fragments in
/// the order given.
pub fn merge(fragments: Vec<GrammarDef>) -> GrammarDef {
    let mut merged = GrammarDef::new();
    for frag in fragments {
        merged.productions.extend(frag.productions);
    }
    merged
}

/// The full reflected grammar for the annotation language, gathered from every tag-family
/// parser. This is what `flowlang grammar` renders.
pub fn full_grammar() -> GrammarDef {
    merge(vec![
        super::port::grammar(),
        super::node::grammar(),
        super::connect::grammar(),
        super::scope::grammar(),
        super::macros::grammar(),
        super::position::grammar(),
        super::lifecycle::grammar(),
        super::fwimport::grammar(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nonempty_grammar() {
        let text = render(&full_grammar());
        assert!(text.contains("node_line"));
        assert!(text.contains("connect_line"));
        assert!(!text.contains("<"), "EBNF output should not contain HTML markup");
    }

    #[test]
    fn merge_preserves_fragment_order() {
        let g = merge(vec![super::super::port::grammar(), super::super::node::grammar()]);
        let names: Vec<&str> = g.productions.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names[0], "port_line");
        assert!(names.contains(&"node_line"));
    }
}
