//! Per-annotation-kind parsers.
//!
//! Each submodule owns exactly one tag family and exposes two things: a `parse` function
//! that turns a [`crate::token::Token`] stream into a typed line result, and a `grammar()`
//! function returning this submodule's corner of the reflected grammar (for `flowlang
//! grammar` and for the EBNF renderer in [`ebnf`]). Keeping the two side by side means the
//! reflected grammar can never drift from the parser that actually implements it — unlike
//! a hand-maintained grammar document kept next to, but not generated from, the code.

pub mod connect;
pub mod ebnf;
pub mod fwimport;
pub mod lifecycle;
pub mod macros;
pub mod node;
pub mod port;
pub mod position;
pub mod scope;

use crate::ast::{DataType, Placement};
use crate::error::{Diagnostic, DiagnosticCode};
use crate::token::{Token, TokenKind};

/// A symbol in a reflected grammar production: either a literal token kind (rendered as
/// its surface text) or a reference to another named production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    Literal(String),
    Ref(String),
    /// Zero-or-more repetition of the wrapped symbol.
    Repeat(Box<Symbol>),
    /// Optional occurrence of the wrapped symbol.
    Opt(Box<Symbol>),
}

/// One alternative (a sequence of symbols) in a production.
#[derive(Debug, Clone, Default)]
pub struct Alternative(pub Vec<Symbol>);

/// A named production: a set of alternatives.
#[derive(Debug, Clone)]
pub struct Production {
    pub name: String,
    pub alternatives: Vec<Alternative>,
}

/// A complete grammar fragment contributed by one tag family.
#[derive(Debug, Clone, Default)]
pub struct GrammarDef {
    pub productions: Vec<Production>,
}

impl GrammarDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, alternatives: Vec<Alternative>) -> Self {
        self.productions.push(Production { name: name.into(), alternatives });
        self
    }
}

pub(crate) fn lit(s: &str) -> Symbol {
    Symbol::Literal(s.to_string())
}

pub(crate) fn r#ref(s: &str) -> Symbol {
    Symbol::Ref(s.to_string())
}

/// Shared cursor helper used by every line parser: a thin, position-tracking wrapper
/// around a token slice.
pub(crate) struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    pub fn advance(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn column(&self) -> usize {
        self.tokens.get(self.pos).map(|t| t.column).unwrap_or(0)
    }

    /// Consume an identifier token, returning its text.
    pub fn ident(&mut self) -> Option<String> {
        match self.advance()?.kind.clone() {
            TokenKind::Ident(s) => Some(s),
            _ => None,
        }
    }

    pub fn expect(&mut self, kind: &TokenKind) -> bool {
        match self.peek() {
            Some(t) if std::mem::discriminant(&t.kind) == std::mem::discriminant(kind) => {
                self.advance();
                true
            }
            _ => false,
        }
    }
}

/// Parse a `Type` token (a bare identifier naming a [`DataType`] or custom host type) into
/// the resolved [`DataType`] plus, when the identifier did not name one of the built-ins,
/// the original host type string.
pub(crate) fn resolve_data_type(ident: &str) -> (DataType, Option<String>) {
    match ident {
        "string" => (DataType::String, None),
        "number" => (DataType::Number, None),
        "boolean" => (DataType::Boolean, None),
        "object" => (DataType::Object, None),
        "array" => (DataType::Array, None),
        "function" => (DataType::Function, None),
        "step" => (DataType::Step, None),
        "any" => (DataType::Any, None),
        other => (DataType::Any, Some(other.to_string())),
    }
}

pub(crate) fn placement_from(tok: &TokenKind) -> Option<Placement> {
    match tok {
        TokenKind::Top => Some(Placement::Top),
        TokenKind::Bottom => Some(Placement::Bottom),
        _ => None,
    }
}

/// Build an "unexpected token" syntax diagnostic at the cursor's current column.
pub(crate) fn syntax_error(cursor: &Cursor, message: impl Into<String>) -> Diagnostic {
    Diagnostic::error(DiagnosticCode::SyntaxError, message.into()).with_location(0, cursor.column())
}
