//! Markup-extension lexer: tokenizes `{Name arg, Prop=value}` text.

use crate::{Error, Result};
use super::ast::Span;

/// A token from the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub text: String,
}

/// Token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    LBrace,
    RBrace,
    Comma,
    Eq,
    /// Extension type name, directly after `{`.
    Name,
    /// Unquoted argument text, escapes already removed.
    Text,
    /// Quoted argument text, quotes and escapes removed.
    Quoted,
    Eof,
}

fn syntax_error(position: usize, message: impl Into<String>) -> Error {
    Error::SyntaxError { position, message: message.into() }
}

/// Tokenize a markup-extension expression.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        let expect_name = matches!(tokens.last(), Some(t) if t.kind == TokenKind::LBrace);
        let single = |kind| Token { kind, span: Span { start: pos, end: pos + 1 }, text: ch.to_string() };
        match ch {
            c if c.is_whitespace() => { chars.next(); }
            '{' => { chars.next(); tokens.push(single(TokenKind::LBrace)); }
            '}' => { chars.next(); tokens.push(single(TokenKind::RBrace)); }
            ',' => { chars.next(); tokens.push(single(TokenKind::Comma)); }
            '=' => { chars.next(); tokens.push(single(TokenKind::Eq)); }
            '\'' | '"' => {
                chars.next();
                let mut text = String::new();
                let end = loop {
                    match chars.next() {
                        None => return Err(syntax_error(pos, "unterminated quoted string")),
                        Some((p, '\\')) => match chars.next() {
                            Some((_, escaped)) => text.push(escaped),
                            None => return Err(syntax_error(p, "dangling escape character")),
                        },
                        Some((p, c)) if c == ch => break p + 1,
                        Some((_, c)) => text.push(c),
                    }
                };
                tokens.push(Token { kind: TokenKind::Quoted, span: Span { start: pos, end }, text });
            }
            _ if expect_name => {
                let mut end = pos;
                while let Some(&(p, c)) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '{' | '}' | ',' | '=') {
                        break;
                    }
                    end = p + c.len_utf8();
                    chars.next();
                }
                tokens.push(Token {
                    kind: TokenKind::Name,
                    span: Span { start: pos, end },
                    text: input[pos..end].to_string(),
                });
            }
            _ => tokens.push(bare_token(&mut chars, pos)?),
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span { start: input.len(), end: input.len() },
        text: String::new(),
    });
    Ok(tokens)
}

/// Unquoted argument text. Stops at an unescaped `,` `=` `{` `}` outside
/// square brackets. Inside brackets those characters are literal, but the
/// braces must balance before the closing `]`.
fn bare_token(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    start: usize,
) -> Result<Token> {
    let mut text = String::new();
    let mut end = start;
    let mut bracket_depth = 0usize;
    let mut bracket_start = start;
    let mut brace_depth = 0usize;

    while let Some(&(p, c)) = chars.peek() {
        match c {
            '\\' => {
                chars.next();
                match chars.next() {
                    Some((q, escaped)) => {
                        text.push(escaped);
                        end = q + escaped.len_utf8();
                    }
                    None => return Err(syntax_error(p, "dangling escape character")),
                }
                continue;
            }
            '[' => {
                if bracket_depth == 0 {
                    bracket_start = p;
                }
                bracket_depth += 1;
            }
            ']' if bracket_depth > 0 => {
                bracket_depth -= 1;
                if bracket_depth == 0 && brace_depth != 0 {
                    return Err(syntax_error(p, "unbalanced '{' inside brackets"));
                }
            }
            '{' if bracket_depth > 0 => brace_depth += 1,
            '}' if bracket_depth > 0 => {
                if brace_depth == 0 {
                    return Err(syntax_error(p, "unbalanced '}' inside brackets"));
                }
                brace_depth -= 1;
            }
            ',' | '=' | '{' | '}' => break,
            _ => {}
        }
        text.push(c);
        end = p + c.len_utf8();
        chars.next();
    }

    if bracket_depth > 0 {
        return Err(syntax_error(bracket_start, "unterminated '['"));
    }

    let trimmed = text.trim_end().len();
    text.truncate(trimmed);
    Ok(Token { kind: TokenKind::Text, span: Span { start, end }, text })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn texts(input: &str) -> Vec<String> {
        tokenize(input).unwrap().into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_simple_expression() {
        use TokenKind::*;
        assert_eq!(
            kinds("{Binding Path, Mode=OneWay}"),
            vec![LBrace, Name, Text, Comma, Text, Eq, Text, RBrace, Eof]
        );
    }

    #[test]
    fn test_bare_text_keeps_inner_spaces() {
        assert_eq!(texts("{Ext hello world , x}")[2], "hello world");
    }

    #[test]
    fn test_escapes_are_literal() {
        let toks = tokenize(r"{Ext a\{b\}c, 'q\'uote'}").unwrap();
        assert_eq!(toks[2].text, "a{b}c");
        assert_eq!(toks[4].kind, TokenKind::Quoted);
        assert_eq!(toks[4].text, "q'uote");
    }

    #[test]
    fn test_brackets_hide_separators() {
        let toks = tokenize("{Ext [a,b=c]}").unwrap();
        assert_eq!(toks[2].text, "[a,b=c]");
        assert_eq!(toks[3].kind, TokenKind::RBrace);
    }

    #[test]
    fn test_bracket_brace_balance() {
        assert!(tokenize("{Ext [{}]}").is_ok());
        assert!(tokenize("{Ext [{{}}]}").is_ok());
        assert!(matches!(tokenize("{Ext [{]}"), Err(Error::SyntaxError { position: 7, .. })));
        assert!(matches!(tokenize("{Ext [}]}"), Err(Error::SyntaxError { position: 6, .. })));
    }

    #[test]
    fn test_unterminated_quote() {
        assert!(matches!(tokenize("{Ext 'abc}"), Err(Error::SyntaxError { position: 5, .. })));
    }
}
