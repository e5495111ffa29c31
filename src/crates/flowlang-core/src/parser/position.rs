//! `@position` line parsing: `@position <id> <x> <y>`. Purely cosmetic — consumed into
//! [`crate::ast::InstanceConfig::position`] and never read by the analyzer or emitter.

use super::{lit, r#ref, syntax_error, Alternative, Cursor, GrammarDef};
use crate::error::Diagnostic;
use crate::token::{Token, TokenKind};

pub struct PositionLine {
    pub instance_id: String,
    pub x: i64,
    pub y: i64,
}

pub fn parse(tokens: &[Token], diagnostics: &mut Vec<Diagnostic>) -> Option<PositionLine> {
    let mut cur = Cursor::new(tokens);
    let instance_id = cur.ident().or_else(|| {
        diagnostics.push(syntax_error(&cur, "expected an instance id"));
        None
    })?;
    let x = match cur.advance().map(|t| t.kind.clone()) {
        Some(TokenKind::IntLit(n)) => n,
        _ => {
            diagnostics.push(syntax_error(&cur, "expected an integer x coordinate"));
            return None;
        }
    };
    let y = match cur.advance().map(|t| t.kind.clone()) {
        Some(TokenKind::IntLit(n)) => n,
        _ => {
            diagnostics.push(syntax_error(&cur, "expected an integer y coordinate"));
            return None;
        }
    };
    Some(PositionLine { instance_id, x, y })
}

pub fn grammar() -> GrammarDef {
    GrammarDef::new().with(
        "position_line",
        vec![Alternative(vec![lit("@position"), r#ref("ident"), r#ref("int"), r#ref("int")])],
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
    fn parses_position() {
        let mut diags = Vec::new();
        let p = parse(&toks("@position a 120 -40"), &mut diags).unwrap();
        assert_eq!(p.instance_id, "a");
        assert_eq!(p.x, 120);
        assert_eq!(p.y, -40);
        assert!(diags.is_empty());
    }
}
