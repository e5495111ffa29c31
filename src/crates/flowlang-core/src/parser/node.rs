//! `@node` line parsing: `@node <id> <TypeName> [attr, attr=...]`.

use super::{lit, r#ref, syntax_error, Alternative, Cursor, GrammarDef, Symbol};
use crate::ast::{ExecuteWhen, InstanceConfig, ParentRef};
use crate::error::Diagnostic;
use crate::token::{Token, TokenKind};

/// The result of parsing an `@node` line.
#[derive(Debug, Clone)]
pub struct NodeLine {
    pub instance_id: String,
    pub type_name: String,
    pub config: InstanceConfig,
}

pub fn parse(tokens: &[Token], diagnostics: &mut Vec<Diagnostic>) -> Option<NodeLine> {
    let mut cur = Cursor::new(tokens);
    let instance_id = cur.ident().or_else(|| {
        diagnostics.push(syntax_error(&cur, "expected an instance id"));
        None
    })?;
    let type_name = cur.ident().or_else(|| {
        diagnostics.push(syntax_error(&cur, "expected a node type name"));
        None
    })?;

    let mut config = InstanceConfig::default();

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
                Some(TokenKind::MinimizedKeyword) => config.minimized = true,
                Some(TokenKind::KwLabel) => {
                    if let Some(TokenKind::StringLit(s)) = cur.peek().map(|t| t.kind.clone()) {
                        cur.advance();
                        config.label = Some(s);
                    }
                }
                Some(TokenKind::KwColor) => {
                    if let Some(TokenKind::StringLit(s)) = cur.peek().map(|t| t.kind.clone()) {
                        cur.advance();
                        config.color = Some(s);
                    }
                }
                Some(TokenKind::KwIcon) => {
                    if let Some(TokenKind::StringLit(s)) = cur.peek().map(|t| t.kind.clone()) {
                        cur.advance();
                        config.icon = Some(s);
                    }
                }
                Some(TokenKind::KwTags) => {
                    if let Some(TokenKind::StringLit(s)) = cur.peek().map(|t| t.kind.clone()) {
                        cur.advance();
                        for pair in s.split(';') {
                            let mut parts = pair.splitn(2, '=');
                            if let Some(k) = parts.next() {
                                if !k.is_empty() {
                                    config.tags.push((k.to_string(), parts.next().map(str::to_string)));
                                }
                            }
                        }
                    }
                }
                Some(TokenKind::Ident(attr)) if attr == "executeWhen" => {
                    if cur.expect(&TokenKind::Colon) {
                        if let Some(TokenKind::Ident(v)) = cur.peek().map(|t| t.kind.clone()) {
                            cur.advance();
                            config.execute_when = Some(match v.as_str() {
                                "or" => ExecuteWhen::Disjunction,
                                "custom" => ExecuteWhen::Custom,
                                _ => ExecuteWhen::Conjunction,
                            });
                        }
                    }
                }
                Some(TokenKind::Ident(attr)) if attr == "when" => {
                    if cur.expect(&TokenKind::Colon) {
                        if let Some(TokenKind::StringLit(s)) = cur.peek().map(|t| t.kind.clone()) {
                            cur.advance();
                            config.custom_expression = Some(s);
                            config.execute_when = Some(ExecuteWhen::Custom);
                        }
                    }
                }
                Some(TokenKind::KwPullExecution) => {
                    if let Some(TokenKind::Ident(port)) = cur.peek().map(|t| t.kind.clone()) {
                        cur.advance();
                        config.pull_execution =
                            Some(crate::ast::PullExecution { trigger_port: port });
                    }
                }
                Some(TokenKind::Ident(attr)) if attr == "parent" => {
                    if cur.expect(&TokenKind::Colon) {
                        if let Some(id) = cur.ident() {
                            if cur.expect(&TokenKind::Dot) {
                                if let Some(scope) = cur.ident() {
                                    config.parent = Some(ParentRef { id, scope });
                                }
                            }
                        }
                    }
                }
                _ => {
                    diagnostics.push(syntax_error(&cur, "unrecognized node attribute"));
                }
            }
            cur.expect(&TokenKind::Comma);
        }
    }

    Some(NodeLine { instance_id, type_name, config })
}

pub fn grammar() -> GrammarDef {
    GrammarDef::new().with(
        "node_line",
        vec![Alternative(vec![
            lit("@node"),
            r#ref("ident"),
            r#ref("ident"),
            Symbol::Opt(Box::new(r#ref("attr_list"))),
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
    fn parses_plain_node() {
        let mut diags = Vec::new();
        let line = parse(&toks("@node a FetchUser"), &mut diags).unwrap();
        assert_eq!(line.instance_id, "a");
        assert_eq!(line.type_name, "FetchUser");
        assert!(diags.is_empty());
    }

    #[test]
    fn parses_node_with_parent_scope() {
        let mut diags = Vec::new();
        let line = parse(&toks("@node child Body [parent: loop.iteration]"), &mut diags).unwrap();
        let parent = line.config.parent.unwrap();
        assert_eq!(parent.id, "loop");
        assert_eq!(parent.scope, "iteration");
    }

    #[test]
    fn parses_custom_execute_when() {
        let mut diags = Vec::new();
        let line = parse(&toks("@node g Gate [when: \"a && !b\"]"), &mut diags).unwrap();
        assert_eq!(line.config.execute_when, Some(ExecuteWhen::Custom));
        assert_eq!(line.config.custom_expression.as_deref(), Some("a && !b"));
    }
}
