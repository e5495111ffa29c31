//! Tokens and lexer for the annotation mini-language.
//!
//! The lexer partitions a single annotation line (the content after the leading `* ` has
//! already been stripped by the assembler) into a flat token stream. It never fails loudly:
//! on an unrecognized character it stops and returns an empty token list, recording the
//! offending byte offset so the caller can surface a diagnostic if it wants to.

/// A lexed token together with its column (1-based) in the source line.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub column: usize,
}

/// All token kinds the lexer recognizes.
///
/// Keyword-prefix tokens (`Scope`, `Order`, …) and attribute-value tokens (`Event`, `Cron`,
/// …) are kept distinct from plain `Ident` even though they lex from the same character
/// class, because several grammars resolve ambiguity between "identifier followed by `=`"
/// and "a specific attribute-value token" by alternation over these distinct kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Tag heads
    TagNode,
    TagConnect,
    TagInput,
    TagOutput,
    TagStep,
    TagScope,
    TagMap,
    TagPath,
    TagPosition,
    TagTrigger,
    TagCancelOn,
    TagRetries,
    TagTimeout,
    TagThrottle,
    TagLabel,
    TagFwImport,

    // Keyword prefixes (identifier immediately followed by `:`)
    KwLabel,
    KwExpr,
    KwPortOrder,
    KwPortLabel,
    KwPullExecution,
    KwSize,
    KwColor,
    KwIcon,
    KwTags,
    KwScope,
    KwOrder,
    KwPlacement,

    // Attribute-value tokens (identifier immediately followed by `=`)
    AttrEvent,
    AttrCron,
    AttrMatch,
    AttrTimeout,
    AttrLimit,
    AttrPeriod,

    MinimizedKeyword,
    Top,
    Bottom,
    Over,
    As,
    From,
    Ok,
    Fail,

    Arrow,   // ->
    Dot,     // .
    Comma,   // ,
    Colon,   // :
    Equals,  // =
    LBracket,
    RBracket,
    LParen,
    RParen,

    StringLit(String),
    IntLit(i64),
    Ident(String),
}

/// Lex a single annotation line into a token stream.
///
/// Returns `None` on a lexical error (an unrecognized character); the caller treats this
/// exactly like a parse failure and appends a diagnostic rather than raising.
pub fn tokenize(line: &str) -> Option<Vec<Token>> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        let col = i + 1;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        match c {
            '@' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let tag: String = chars[start + 1..i].iter().collect();
                let kind = match tag.as_str() {
                    "node" => TokenKind::TagNode,
                    "connect" => TokenKind::TagConnect,
                    "input" => TokenKind::TagInput,
                    "output" => TokenKind::TagOutput,
                    "step" => TokenKind::TagStep,
                    "scope" => TokenKind::TagScope,
                    "map" => TokenKind::TagMap,
                    "path" => TokenKind::TagPath,
                    "position" => TokenKind::TagPosition,
                    "trigger" => TokenKind::TagTrigger,
                    "cancelOn" => TokenKind::TagCancelOn,
                    "retries" => TokenKind::TagRetries,
                    "timeout" => TokenKind::TagTimeout,
                    "throttle" => TokenKind::TagThrottle,
                    "label" => TokenKind::TagLabel,
                    "fwImport" => TokenKind::TagFwImport,
                    _ => return None,
                };
                tokens.push(Token { kind, column: col });
            }
            '-' if i + 1 < chars.len() && chars[i + 1] == '>' => {
                tokens.push(Token { kind: TokenKind::Arrow, column: col });
                i += 2;
            }
            '.' => {
                tokens.push(Token { kind: TokenKind::Dot, column: col });
                i += 1;
            }
            ',' => {
                tokens.push(Token { kind: TokenKind::Comma, column: col });
                i += 1;
            }
            '[' => {
                tokens.push(Token { kind: TokenKind::LBracket, column: col });
                i += 1;
            }
            ']' => {
                tokens.push(Token { kind: TokenKind::RBracket, column: col });
                i += 1;
            }
            '(' => {
                tokens.push(Token { kind: TokenKind::LParen, column: col });
                i += 1;
            }
            ')' => {
                tokens.push(Token { kind: TokenKind::RParen, column: col });
                i += 1;
            }
            '"' => {
                let (lit, consumed) = lex_string(&chars[i..])?;
                tokens.push(Token { kind: TokenKind::StringLit(lit), column: col });
                i += consumed;
            }
            '-' | '0'..='9' => {
                let start = i;
                if c == '-' {
                    i += 1;
                }
                if i >= chars.len() || !chars[i].is_ascii_digit() {
                    return None;
                }
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value: i64 = text.parse().ok()?;
                tokens.push(Token { kind: TokenKind::IntLit(value), column: col });
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();

                // Peek past whitespace for a trailing `:` or `=` to resolve prefix tokens.
                let mut j = i;
                while j < chars.len() && chars[j] == ' ' {
                    j += 1;
                }
                let next = chars.get(j).copied();

                let kind = match (word.as_str(), next) {
                    ("label", Some(':')) => { i = j + 1; TokenKind::KwLabel }
                    ("expr", Some(':')) => { i = j + 1; TokenKind::KwExpr }
                    ("portOrder", Some(':')) => { i = j + 1; TokenKind::KwPortOrder }
                    ("portLabel", Some(':')) => { i = j + 1; TokenKind::KwPortLabel }
                    ("pullExecution", Some(':')) => { i = j + 1; TokenKind::KwPullExecution }
                    ("size", Some(':')) => { i = j + 1; TokenKind::KwSize }
                    ("color", Some(':')) => { i = j + 1; TokenKind::KwColor }
                    ("icon", Some(':')) => { i = j + 1; TokenKind::KwIcon }
                    ("tags", Some(':')) => { i = j + 1; TokenKind::KwTags }
                    ("scope", Some(':')) => { i = j + 1; TokenKind::KwScope }
                    ("order", Some(':')) => { i = j + 1; TokenKind::KwOrder }
                    ("placement", Some(':')) => { i = j + 1; TokenKind::KwPlacement }
                    ("event", Some('=')) => { i = j + 1; TokenKind::AttrEvent }
                    ("cron", Some('=')) => { i = j + 1; TokenKind::AttrCron }
                    ("match", Some('=')) => { i = j + 1; TokenKind::AttrMatch }
                    ("timeout", Some('=')) => { i = j + 1; TokenKind::AttrTimeout }
                    ("limit", Some('=')) => { i = j + 1; TokenKind::AttrLimit }
                    ("period", Some('=')) => { i = j + 1; TokenKind::AttrPeriod }
                    ("minimized", _) => TokenKind::MinimizedKeyword,
                    ("TOP", _) => TokenKind::Top,
                    ("BOTTOM", _) => TokenKind::Bottom,
                    ("over", _) => TokenKind::Over,
                    ("as", _) => TokenKind::As,
                    ("from", _) => TokenKind::From,
                    ("ok", _) => TokenKind::Ok,
                    ("fail", _) => TokenKind::Fail,
                    _ => TokenKind::Ident(word),
                };
                tokens.push(Token { kind, column: col });
            }
            ':' => {
                tokens.push(Token { kind: TokenKind::Colon, column: col });
                i += 1;
            }
            '=' => {
                tokens.push(Token { kind: TokenKind::Equals, column: col });
                i += 1;
            }
            _ => return None,
        }
    }

    Some(tokens)
}

/// Lex a double-quoted string literal starting at `chars[0] == '"'`.
///
/// Returns the *unescaped* content and the number of source characters consumed
/// (including both quotes). `\"` unescapes to `"`; `*\/` unescapes to `*/` — the latter
/// exists so a string value can embed the doc-comment close sequence without terminating
/// the enclosing comment block.
fn lex_string(chars: &[char]) -> Option<(String, usize)> {
    debug_assert_eq!(chars[0], '"');
    let mut out = String::new();
    let mut i = 1usize;
    while i < chars.len() {
        match chars[i] {
            '"' => return Some((out, i + 1)),
            '\\' if chars.get(i + 1) == Some(&'"') => {
                out.push('"');
                i += 2;
            }
            '*' if chars.get(i + 1) == Some(&'\\') && chars.get(i + 2) == Some(&'/') => {
                out.push_str("*/");
                i += 3;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    None // unterminated string
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_node_line() {
        let toks = tokenize("@node a MyType [label: \"Hi\"]").unwrap();
        assert!(matches!(toks[0].kind, TokenKind::TagNode));
        assert!(matches!(toks[1].kind, TokenKind::Ident(ref s) if s == "a"));
        assert!(matches!(toks[2].kind, TokenKind::Ident(ref s) if s == "MyType"));
        assert!(matches!(toks[3].kind, TokenKind::LBracket));
        assert!(matches!(toks[4].kind, TokenKind::KwLabel));
    }

    #[test]
    fn tokenizes_connect_arrow() {
        let toks = tokenize("@connect a.out -> b.in").unwrap();
        assert!(toks.iter().any(|t| matches!(t.kind, TokenKind::Arrow)));
    }

    #[test]
    fn string_unescapes_comment_close() {
        let toks = tokenize("@input x default=\"val*\\/ue\"").unwrap();
        let lit = toks.iter().find_map(|t| match &t.kind {
            TokenKind::StringLit(s) => Some(s.clone()),
            _ => None,
        });
        assert_eq!(lit.as_deref(), Some("val*/ue"));
    }

    #[test]
    fn negative_integer() {
        let toks = tokenize("@position a -5 10").unwrap();
        let ints: Vec<i64> = toks
            .iter()
            .filter_map(|t| match t.kind {
                TokenKind::IntLit(n) => Some(n),
                _ => None,
            })
            .collect();
        assert_eq!(ints, vec![-5, 10]);
    }

    #[test]
    fn unrecognized_character_yields_none() {
        assert!(tokenize("@node a % b").is_none());
    }

    #[test]
    fn attribute_value_token_vs_identifier() {
        let toks = tokenize("@trigger event=\"deploy\"").unwrap();
        assert!(matches!(toks[1].kind, TokenKind::AttrEvent));
    }

    #[test]
    fn plain_identifier_not_confused_with_keyword_prefix() {
        // "timeout" alone (not followed by `:` or `=`) is a plain identifier, e.g. a port
        // named `timeout` that is not immediately assigned.
        let toks = tokenize("@input timeout").unwrap();
        assert!(matches!(toks[1].kind, TokenKind::Ident(ref s) if s == "timeout"));
    }
}
