//! Recursive-descent markup-extension parser.
//!
//! ```text
//! Expr  := '{' Name (Arg (',' Arg)*)? '}'
//! Arg   := Text '=' Value | Value
//! Value := Expr | Text | Quoted
//! ```

use smallvec::SmallVec;

use crate::{Error, Result};
use super::ast::*;
use super::lexer::{Token, TokenKind};

/// Parse a complete expression; trailing tokens are an error.
pub fn parse_expression(tokens: &[Token]) -> Result<MarkupExpression> {
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr()?;
    if !parser.at(TokenKind::Eof) {
        return Err(parser.error("unexpected text after markup extension".into()));
    }
    Ok(expr)
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> &'t Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_kind_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map_or(TokenKind::Eof, |t| t.kind)
    }

    fn advance(&mut self) -> &'t Token {
        let tok = self.peek();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&'t Token> {
        let tok = self.peek();
        if tok.kind == kind {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected {:?}, got {:?} '{}'", kind, tok.kind, tok.text)))
        }
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, message: String) -> Error {
        Error::SyntaxError { position: self.peek().span.start, message }
    }

    fn parse_expr(&mut self) -> Result<MarkupExpression> {
        let open = self.expect(TokenKind::LBrace)?;
        if !self.at(TokenKind::Name) {
            return Err(self.error("expected markup extension name".into()));
        }
        let name = self.advance();

        let mut positional: SmallVec<[MarkupArg; 2]> = SmallVec::new();
        let mut named: Vec<(String, MarkupArg)> = Vec::new();

        if !self.at(TokenKind::RBrace) {
            loop {
                if self.at(TokenKind::Text) && self.peek_kind_at(1) == TokenKind::Eq {
                    let prop = self.advance();
                    self.advance();
                    let value = self.parse_value()?;
                    named.push((prop.text.clone(), value));
                } else {
                    if !named.is_empty() {
                        return Err(self.error("positional argument after named argument".into()));
                    }
                    positional.push(self.parse_value()?);
                }
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }

        let close = self.expect(TokenKind::RBrace)?;
        Ok(MarkupExpression {
            type_name: name.text.clone(),
            positional,
            named,
            span: Span { start: open.span.start, end: close.span.end },
        })
    }

    fn parse_value(&mut self) -> Result<MarkupArg> {
        match self.peek_kind() {
            TokenKind::LBrace => Ok(MarkupArg::Expression(Box::new(self.parse_expr()?))),
            TokenKind::Text | TokenKind::Quoted => Ok(MarkupArg::Text(self.advance().text.clone())),
            _ => {
                let tok = self.peek();
                Err(self.error(format!("expected argument value, got {:?} '{}'", tok.kind, tok.text)))
            }
        }
    }
}
