//! `@connect` line parsing: `@connect a.out -> b.in` with an optional `over <scope>`
//! suffix for edges that cross into a per-port scope.

use super::{lit, r#ref, syntax_error, Alternative, Cursor, GrammarDef};
use crate::ast::{Connection, Endpoint};
use crate::error::Diagnostic;
use crate::token::{Token, TokenKind};

fn parse_endpoint(cur: &mut Cursor) -> Option<Endpoint> {
    let node = cur.ident()?;
    if !cur.expect(&TokenKind::Dot) {
        return None;
    }
    let port = cur.ident()?;
    Some(Endpoint::new(node, port))
}

pub fn parse(tokens: &[Token], diagnostics: &mut Vec<Diagnostic>) -> Option<Connection> {
    let mut cur = Cursor::new(tokens);
    let from = parse_endpoint(&mut cur).or_else(|| {
        diagnostics.push(syntax_error(&cur, "expected '<node>.<port>' as connection source"));
        None
    })?;
    if !cur.expect(&TokenKind::Arrow) {
        diagnostics.push(syntax_error(&cur, "expected '->'"));
        return None;
    }
    let mut to = parse_endpoint(&mut cur).or_else(|| {
        diagnostics.push(syntax_error(&cur, "expected '<node>.<port>' as connection target"));
        None
    })?;

    if let Some(TokenKind::Over) = cur.peek().map(|t| t.kind.clone()) {
        cur.advance();
        if let Some(scope) = cur.ident() {
            to.scope = Some(scope);
        }
    }

    Some(Connection { from, to })
}

pub fn grammar() -> GrammarDef {
    GrammarDef::new().with(
        "connect_line",
        vec![Alternative(vec![
            lit("@connect"),
            r#ref("endpoint"),
            lit("->"),
            r#ref("endpoint"),
            super::Symbol::Opt(Box::new(r#ref("over_clause"))),
        ])],
    ).with(
        "endpoint",
        vec![Alternative(vec![r#ref("ident"), lit("."), r#ref("ident")])],
    ).with(
        "over_clause",
        vec![Alternative(vec![lit("over"), r#ref("ident")])],
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
    fn parses_basic_connection() {
        let mut diags = Vec::new();
        let conn = parse(&toks("@connect a.result -> b.input"), &mut diags).unwrap();
        assert_eq!(conn.from.node, "a");
        assert_eq!(conn.from.port, "result");
        assert_eq!(conn.to.node, "b");
        assert_eq!(conn.to.port, "input");
        assert!(diags.is_empty());
    }

    #[test]
    fn parses_scoped_connection() {
        let mut diags = Vec::new();
        let conn = parse(&toks("@connect loop.item -> body.input over iteration"), &mut diags).unwrap();
        assert_eq!(conn.to.scope.as_deref(), Some("iteration"));
    }

    #[test]
    fn missing_arrow_reports_error() {
        let mut diags = Vec::new();
        assert!(parse(&toks("@connect a.result b.input"), &mut diags).is_none());
        assert!(!diags.is_empty());
    }
}
