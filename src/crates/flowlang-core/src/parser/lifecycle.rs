//! Lifecycle/pull-execution attribute tags: `@trigger`, `@cancelOn`, `@retries`,
//! `@timeout`, `@throttle`.
//!
//! These are workflow-level options rather than node or port declarations; the assembler
//! attaches their parsed values to the enclosing `Workflow`'s option set (a side table
//! threaded through to the emitter, not modeled directly on [`crate::ast::Workflow`]
//! because none of them affect graph shape or analysis).

use super::{lit, r#ref, syntax_error, Alternative, Cursor, GrammarDef};
use crate::error::Diagnostic;
use crate::token::{Token, TokenKind};

#[derive(Debug, Clone, Default)]
pub struct WorkflowOptions {
    pub trigger_event: Option<String>,
    pub trigger_cron: Option<String>,
    pub cancel_on_event: Option<String>,
    pub cancel_on_match: Option<String>,
    pub retries: Option<i64>,
    pub timeout_ms: Option<i64>,
    pub throttle_limit: Option<i64>,
    pub throttle_period_ms: Option<i64>,
}

fn string_attr(cur: &mut Cursor) -> Option<String> {
    match cur.advance().map(|t| t.kind.clone()) {
        Some(TokenKind::StringLit(s)) => Some(s),
        _ => None,
    }
}

fn int_attr(cur: &mut Cursor) -> Option<i64> {
    match cur.advance().map(|t| t.kind.clone()) {
        Some(TokenKind::IntLit(n)) => Some(n),
        _ => None,
    }
}

/// Parse one lifecycle line, merging the result into `opts` in place. `tag` identifies
/// which tag head introduced the line (already consumed by the caller).
pub fn parse(tag: &TokenKind, tokens: &[Token], opts: &mut WorkflowOptions, diagnostics: &mut Vec<Diagnostic>) {
    let mut cur = Cursor::new(tokens);
    match tag {
        TokenKind::TagTrigger => loop {
            match cur.advance().map(|t| t.kind.clone()) {
                Some(TokenKind::AttrEvent) => opts.trigger_event = string_attr(&mut cur),
                Some(TokenKind::AttrCron) => opts.trigger_cron = string_attr(&mut cur),
                Some(_) => diagnostics.push(syntax_error(&cur, "unrecognized @trigger attribute")),
                None => break,
            }
            cur.expect(&TokenKind::Comma);
        },
        TokenKind::TagCancelOn => loop {
            match cur.advance().map(|t| t.kind.clone()) {
                Some(TokenKind::AttrEvent) => opts.cancel_on_event = string_attr(&mut cur),
                Some(TokenKind::AttrMatch) => opts.cancel_on_match = string_attr(&mut cur),
                Some(_) => diagnostics.push(syntax_error(&cur, "unrecognized @cancelOn attribute")),
                None => break,
            }
            cur.expect(&TokenKind::Comma);
        },
        TokenKind::TagRetries => {
            opts.retries = match cur.advance().map(|t| t.kind.clone()) {
                Some(TokenKind::IntLit(n)) => Some(n),
                _ => {
                    diagnostics.push(syntax_error(&cur, "expected an integer retry count"));
                    None
                }
            };
        }
        TokenKind::TagTimeout => loop {
            match cur.advance().map(|t| t.kind.clone()) {
                Some(TokenKind::AttrTimeout) => opts.timeout_ms = int_attr(&mut cur),
                Some(TokenKind::IntLit(n)) => opts.timeout_ms = Some(n),
                Some(_) => diagnostics.push(syntax_error(&cur, "unrecognized @timeout attribute")),
                None => break,
            }
            cur.expect(&TokenKind::Comma);
        },
        TokenKind::TagThrottle => loop {
            match cur.advance().map(|t| t.kind.clone()) {
                Some(TokenKind::AttrLimit) => opts.throttle_limit = int_attr(&mut cur),
                Some(TokenKind::AttrPeriod) => opts.throttle_period_ms = int_attr(&mut cur),
                Some(_) => diagnostics.push(syntax_error(&cur, "unrecognized @throttle attribute")),
                None => break,
            }
            cur.expect(&TokenKind::Comma);
        },
        _ => diagnostics.push(syntax_error(&cur, "not a lifecycle tag")),
    }
}

pub fn grammar() -> GrammarDef {
    GrammarDef::new()
        .with(
            "trigger_line",
            vec![Alternative(vec![lit("@trigger"), r#ref("event_or_cron_attrs")])],
        )
        .with(
            "cancel_on_line",
            vec![Alternative(vec![lit("@cancelOn"), r#ref("event_or_match_attrs")])],
        )
        .with("retries_line", vec![Alternative(vec![lit("@retries"), r#ref("int")])])
        .with("timeout_line", vec![Alternative(vec![lit("@timeout"), r#ref("int")])])
        .with(
            "throttle_line",
            vec![Alternative(vec![lit("@throttle"), r#ref("limit_period_attrs")])],
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokenize;

    fn line(s: &str) -> Vec<Token> {
        tokenize(s).unwrap()
    }

    #[test]
    fn parses_trigger_event_and_cron() {
        let mut opts = WorkflowOptions::default();
        let mut diags = Vec::new();
        let toks = line("@trigger event=\"order.created\"");
        parse(&toks[0].kind, &toks[1..], &mut opts, &mut diags);
        assert_eq!(opts.trigger_event.as_deref(), Some("order.created"));
        assert!(diags.is_empty());
    }

    #[test]
    fn parses_retries() {
        let mut opts = WorkflowOptions::default();
        let mut diags = Vec::new();
        let toks = line("@retries 3");
        parse(&toks[0].kind, &toks[1..], &mut opts, &mut diags);
        assert_eq!(opts.retries, Some(3));
    }

    #[test]
    fn parses_throttle() {
        let mut opts = WorkflowOptions::default();
        let mut diags = Vec::new();
        let toks = line("@throttle limit=10, period=60000");
        parse(&toks[0].kind, &toks[1..], &mut opts, &mut diags);
        assert_eq!(opts.throttle_limit, Some(10));
        assert_eq!(opts.throttle_period_ms, Some(60000));
    }
}
