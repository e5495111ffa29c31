//! `@map` and `@path` sugar macro parsing.
//!
//! These macros are pure authoring convenience: they expand to ordinary connections during
//! assembly and are re-derived from the resulting graph on every re-emission, so a stale
//! macro that no longer matches its expansion is dropped rather than trusted (see the
//! sugar engine's validation pass).

use super::{lit, r#ref, syntax_error, Alternative, Cursor, GrammarDef, Symbol};
use crate::ast::{MapMacro, PathMacro, PathStep, Route};
use crate::error::Diagnostic;
use crate::token::{Token, TokenKind};

/// `@path a -> b.ok -> c.fail -> d`
pub fn parse_path(tokens: &[Token], diagnostics: &mut Vec<Diagnostic>) -> Option<PathMacro> {
    let mut cur = Cursor::new(tokens);
    let mut steps = Vec::new();

    let first = cur.ident().or_else(|| {
        diagnostics.push(syntax_error(&cur, "expected a node id to start a @path"));
        None
    })?;
    steps.push(PathStep { node: first, route: None });

    while !cur.at_end() {
        if !cur.expect(&TokenKind::Arrow) {
            diagnostics.push(syntax_error(&cur, "expected '->' between @path steps"));
            return None;
        }
        let node = cur.ident().or_else(|| {
            diagnostics.push(syntax_error(&cur, "expected a node id after '->'"));
            None
        })?;
        let mut route = None;
        if cur.expect(&TokenKind::Dot) {
            route = match cur.advance().map(|t| t.kind.clone()) {
                Some(TokenKind::Ok) => Some(Route::Ok),
                Some(TokenKind::Fail) => Some(Route::Fail),
                _ => {
                    diagnostics.push(syntax_error(&cur, "expected 'ok' or 'fail' after '.'"));
                    None
                }
            };
        }
        steps.push(PathStep { node, route });
    }

    Some(PathMacro { steps })
}

/// `@map child over source.port [as input.output]`
pub fn parse_map(instance_id: &str, tokens: &[Token], diagnostics: &mut Vec<Diagnostic>) -> Option<MapMacro> {
    let mut cur = Cursor::new(tokens);
    let child_id = cur.ident().or_else(|| {
        diagnostics.push(syntax_error(&cur, "expected a child instance id"));
        None
    })?;

    if !cur.expect(&TokenKind::Over) {
        diagnostics.push(syntax_error(&cur, "expected 'over'"));
        return None;
    }

    let source_node = cur.ident().or_else(|| {
        diagnostics.push(syntax_error(&cur, "expected a source node id"));
        None
    })?;
    if !cur.expect(&TokenKind::Dot) {
        diagnostics.push(syntax_error(&cur, "expected '.' before source port"));
        return None;
    }
    let source_port = cur.ident().or_else(|| {
        diagnostics.push(syntax_error(&cur, "expected a source port name"));
        None
    })?;

    let mut input_port = None;
    let mut output_port = None;
    if let Some(TokenKind::As) = cur.peek().map(|t| t.kind.clone()) {
        cur.advance();
        input_port = cur.ident();
        if cur.expect(&TokenKind::Dot) {
            output_port = cur.ident();
        }
    }

    Some(MapMacro {
        instance_id: instance_id.to_string(),
        child_id,
        source_node,
        source_port,
        input_port,
        output_port,
    })
}

pub fn grammar() -> GrammarDef {
    GrammarDef::new()
        .with(
            "path_line",
            vec![Alternative(vec![
                lit("@path"),
                r#ref("ident"),
                Symbol::Repeat(Box::new(r#ref("path_step"))),
            ])],
        )
        .with(
            "path_step",
            vec![Alternative(vec![
                lit("->"),
                r#ref("ident"),
                Symbol::Opt(Box::new(r#ref("route_suffix"))),
            ])],
        )
        .with(
            "route_suffix",
            vec![Alternative(vec![lit("."), lit("ok|fail")])],
        )
        .with(
            "map_line",
            vec![Alternative(vec![
                lit("@map"),
                r#ref("ident"),
                lit("over"),
                r#ref("ident"),
                lit("."),
                r#ref("ident"),
                Symbol::Opt(Box::new(r#ref("as_clause"))),
            ])],
        )
        .with(
            "as_clause",
            vec![Alternative(vec![lit("as"), r#ref("ident"), lit("."), r#ref("ident")])],
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokenize;

    fn toks(line: &str) -> Vec<Token> {
        tokenize(line).unwrap()[1..].to_vec()
    }

    #[test]
    fn parses_simple_path() {
        let mut diags = Vec::new();
        let path = parse_path(&toks("@path a -> b -> c"), &mut diags).unwrap();
        assert_eq!(path.steps.len(), 3);
        assert_eq!(path.steps[0].node, "a");
        assert!(diags.is_empty());
    }

    #[test]
    fn parses_path_with_routes() {
        let mut diags = Vec::new();
        let path = parse_path(&toks("@path a -> b.ok -> c.fail"), &mut diags).unwrap();
        assert_eq!(path.steps[1].route, Some(Route::Ok));
        assert_eq!(path.steps[2].route, Some(Route::Fail));
    }

    #[test]
    fn parses_map_with_as_clause() {
        let mut diags = Vec::new();
        let m = parse_map("loop", &toks("@map body over items.list as item.result"), &mut diags).unwrap();
        assert_eq!(m.child_id, "body");
        assert_eq!(m.source_node, "items");
        assert_eq!(m.source_port, "list");
        assert_eq!(m.input_port.as_deref(), Some("item"));
        assert_eq!(m.output_port.as_deref(), Some("result"));
    }

    #[test]
    fn map_without_over_is_error() {
        let mut diags = Vec::new();
        assert!(parse_map("loop", &toks("@map body items.list"), &mut diags).is_none());
        assert!(!diags.is_empty());
    }
}
