//! `@fwImport` line parsing: `@fwImport <TypeName> as <Alias> from "<path>"`.
//!
//! Declares a node type backed by a workflow defined elsewhere, giving it
//! [`crate::ast::NodeVariant::ImportedWorkflow`] instead of `Function`. `type_name` is the
//! symbol the imported module exports (the emitter calls it exactly like a nested
//! workflow call); `alias` is the local name this workflow's `@node` lines reference it
//! by, so two `@fwImport` lines can pull in same-named types from different modules
//! without colliding.

use super::{lit, r#ref, syntax_error, Alternative, Cursor, GrammarDef};
use crate::error::Diagnostic;
use crate::token::{Token, TokenKind};

pub struct FwImportLine {
    pub type_name: String,
    pub alias: String,
    pub source: String,
}

pub fn parse(tokens: &[Token], diagnostics: &mut Vec<Diagnostic>) -> Option<FwImportLine> {
    let mut cur = Cursor::new(tokens);
    let type_name = cur.ident().or_else(|| {
        diagnostics.push(syntax_error(&cur, "expected a node type name"));
        None
    })?;
    if !cur.expect(&TokenKind::As) {
        diagnostics.push(syntax_error(&cur, "expected 'as'"));
        return None;
    }
    let alias = cur.ident().or_else(|| {
        diagnostics.push(syntax_error(&cur, "expected an alias after 'as'"));
        None
    })?;
    if !cur.expect(&TokenKind::From) {
        diagnostics.push(syntax_error(&cur, "expected 'from'"));
        return None;
    }
    let source = match cur.advance().map(|t| t.kind.clone()) {
        Some(TokenKind::StringLit(s)) => s,
        _ => {
            diagnostics.push(syntax_error(&cur, "expected a quoted import path"));
            return None;
        }
    };
    Some(FwImportLine { type_name, alias, source })
}

pub fn grammar() -> GrammarDef {
    GrammarDef::new().with(
        "fw_import_line",
        vec![Alternative(vec![
            lit("@fwImport"),
            r#ref("ident"),
            lit("as"),
            r#ref("ident"),
            lit("from"),
            r#ref("string"),
        ])],
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
    fn parses_fw_import() {
        let mut diags = Vec::new();
        let fi = parse(&toks("@fwImport Billing as MyBilling from \"./workflows/billing\""), &mut diags).unwrap();
        assert_eq!(fi.type_name, "Billing");
        assert_eq!(fi.alias, "MyBilling");
        assert_eq!(fi.source, "./workflows/billing");
        assert!(diags.is_empty());
    }

    #[test]
    fn missing_from_is_error() {
        let mut diags = Vec::new();
        assert!(parse(&toks("@fwImport Billing as MyBilling \"./workflows/billing\""), &mut diags).is_none());
    }

    #[test]
    fn missing_alias_is_error() {
        let mut diags = Vec::new();
        assert!(parse(&toks("@fwImport Billing from \"./workflows/billing\""), &mut diags).is_none());
    }
}
