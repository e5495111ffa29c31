//! `@scope` line parsing: `@scope <name> [<child>, <child>, ...]`.
//!
//! A `@scope` line is a convenience for declaring a scope's children in one place instead
//! of via repeated `parent:` attributes on each child's `@node` line; the assembler
//! reconciles both representations into the same [`crate::ast::Scope`] list.

use super::{lit, r#ref, syntax_error, Alternative, Cursor, GrammarDef, Symbol};
use crate::ast::Scope;
use crate::error::Diagnostic;
use crate::token::{Token, TokenKind};

pub fn parse(tokens: &[Token], diagnostics: &mut Vec<Diagnostic>) -> Option<Scope> {
    let mut cur = Cursor::new(tokens);
    let name = cur.ident().or_else(|| {
        diagnostics.push(syntax_error(&cur, "expected a scope name"));
        None
    })?;

    let mut children = Vec::new();
    if cur.expect(&TokenKind::LBracket) {
        loop {
            if cur.expect(&TokenKind::RBracket) {
                break;
            }
            if cur.at_end() {
                diagnostics.push(syntax_error(&cur, "unterminated child list"));
                break;
            }
            match cur.ident() {
                Some(id) => children.push(id),
                None => {
                    diagnostics.push(syntax_error(&cur, "expected a child instance id"));
                    break;
                }
            }
            cur.expect(&TokenKind::Comma);
        }
    }

    Some(Scope { name, children })
}

pub fn grammar() -> GrammarDef {
    GrammarDef::new().with(
        "scope_line",
        vec![Alternative(vec![
            lit("@scope"),
            r#ref("ident"),
            Symbol::Opt(Box::new(r#ref("child_list"))),
        ])],
    ).with(
        "child_list",
        vec![Alternative(vec![lit("["), r#ref("ident"), Symbol::Repeat(Box::new(r#ref("comma_ident"))), lit("]")])],
    ).with(
        "comma_ident",
        vec![Alternative(vec![lit(","), r#ref("ident")])],
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
    fn parses_scope_with_children() {
        let mut diags = Vec::new();
        let scope = parse(&toks("@scope iteration [body, accumulate]"), &mut diags).unwrap();
        assert_eq!(scope.name, "iteration");
        assert_eq!(scope.children, vec!["body".to_string(), "accumulate".to_string()]);
    }

    #[test]
    fn parses_empty_scope() {
        let mut diags = Vec::new();
        let scope = parse(&toks("@scope retryBody"), &mut diags).unwrap();
        assert!(scope.children.is_empty());
        assert!(diags.is_empty());
    }
}
