//! `@input`, `@output`, and `@step` line parsing.
//!
//! All three tags share a body grammar — a name, a type (defaulted for `@step`), and an
//! optional bracketed attribute list — so they're parsed by the same routine and
//! distinguished only by which tag head introduced the line.

use super::{lit, r#ref, resolve_data_type, syntax_error, Alternative, Cursor, GrammarDef, Symbol};
use crate::ast::{DataType, MergeStrategy, PortDef};
use crate::error::Diagnostic;
use crate::token::{Token, TokenKind};

/// Which of the three port tags introduced a parsed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Input,
    Output,
    Step,
}

/// The result of parsing a port declaration line.
#[derive(Debug, Clone)]
pub struct PortLine {
    pub kind: PortKind,
    pub port: PortDef,
}

/// Parse an `@input`/`@output`/`@step` line's token stream (the tag head already consumed
/// by the assembler's dispatch). Returns `None` with diagnostics appended on failure.
pub fn parse(kind: PortKind, tokens: &[Token], diagnostics: &mut Vec<Diagnostic>) -> Option<PortLine> {
    let mut cur = Cursor::new(tokens);
    let name = cur.ident().or_else(|| {
        diagnostics.push(syntax_error(&cur, "expected a port name"));
        None
    })?;

    let mut port = if matches!(kind, PortKind::Step) {
        PortDef::step(name)
    } else {
        PortDef::new(name, DataType::Any)
    };

    // Optional explicit type, only meaningful for input/output.
    if !matches!(kind, PortKind::Step) {
        if let Some(Token { kind: TokenKind::Ident(ty), .. }) = cur.peek() {
            let (data_type, host_type) = resolve_data_type(ty);
            cur.advance();
            port.data_type = data_type;
            port.host_type = host_type;
        }
    }

    // Optional bracketed attribute list: [optional, default="x", expr: true, hidden, ...]
    if cur.expect(&TokenKind::LBracket) {
        loop {
            if cur.expect(&TokenKind::RBracket) {
                break;
            }
            if cur.at_end() {
                diagnostics.push(syntax_error(&cur, "unterminated attribute list"));
                break;
            }
            match cur.advance().map(|t| t.kind.clone()) {
                Some(TokenKind::Ident(attr)) if attr == "optional" => port.optional = true,
                Some(TokenKind::Ident(attr)) if attr == "hidden" => port.hidden = true,
                Some(TokenKind::Ident(attr)) if attr == "failure" => port.failure = true,
                Some(TokenKind::Ident(attr)) if attr == "default" => {
                    if cur.expect(&TokenKind::Equals) {
                        if let Some(TokenKind::StringLit(s)) = cur.peek().map(|t| t.kind.clone()) {
                            cur.advance();
                            port.default = Some(s);
                        } else if let Some(TokenKind::IntLit(n)) = cur.peek().map(|t| t.kind.clone()) {
                            cur.advance();
                            port.default = Some(n.to_string());
                        }
                    }
                }
                Some(TokenKind::KwExpr) => {
                    if let Some(TokenKind::Ident(v)) = cur.peek().map(|t| t.kind.clone()) {
                        cur.advance();
                        port.expression = v == "true";
                    }
                }
                Some(TokenKind::KwScope) => {
                    if let Some(TokenKind::Ident(v)) = cur.peek().map(|t| t.kind.clone()) {
                        cur.advance();
                        port.scope = Some(v);
                    }
                }
                Some(TokenKind::KwOrder) => {
                    if let Some(TokenKind::IntLit(n)) = cur.peek().map(|t| t.kind.clone()) {
                        cur.advance();
                        port.order = Some(n);
                    }
                }
                Some(TokenKind::KwLabel) => {
                    if let Some(TokenKind::StringLit(s)) = cur.peek().map(|t| t.kind.clone()) {
                        cur.advance();
                        port.label = Some(s);
                    }
                }
                Some(TokenKind::KwPlacement) => {
                    if let Some(p) = cur.peek().map(|t| t.kind.clone()).as_ref().and_then(super::placement_from) {
                        cur.advance();
                        port.placement = Some(p);
                    }
                }
                Some(TokenKind::Ident(attr)) if attr == "merge" => {
                    if cur.expect(&TokenKind::Colon) {
                        if let Some(TokenKind::Ident(v)) = cur.peek().map(|t| t.kind.clone()) {
                            cur.advance();
                            port.merge_strategy = Some(if v == "or" {
                                MergeStrategy::LogicalOr
                            } else {
                                MergeStrategy::NullishCoalesce
                            });
                        }
                    }
                }
                _ => {
                    diagnostics.push(syntax_error(&cur, "unrecognized port attribute"));
                }
            }
            cur.expect(&TokenKind::Comma);
        }
    }

    Some(PortLine { kind, port })
}

/// Reflected grammar for the port-family tags.
pub fn grammar() -> GrammarDef {
    GrammarDef::new().with(
        "port_line",
        vec![Alternative(vec![
            lit("@input|@output|@step"),
            r#ref("ident"),
            Symbol::Opt(Box::new(r#ref("type"))),
            Symbol::Opt(Box::new(r#ref("attr_list"))),
        ])],
    ).with(
        "attr_list",
        vec![Alternative(vec![
            lit("["),
            r#ref("attr"),
            Symbol::Repeat(Box::new(r#ref("comma_attr"))),
            lit("]"),
        ])],
    ).with(
        "comma_attr",
        vec![Alternative(vec![lit(","), r#ref("attr")])],
    )
}
