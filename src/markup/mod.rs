//! # Markup Extensions
//!
//! Parser for the inline `{Name pos, Prop=value}` expression syntax used in
//! attribute values. Pure functions: no schema lookups happen here; the
//! reader resolves names afterwards.

pub mod ast;
pub mod lexer;
pub mod parser;

use crate::Result;
pub use ast::{AttributeValue, MarkupArg, MarkupExpression, Span};

/// Parse a `{...}` expression.
pub fn parse(text: &str) -> Result<MarkupExpression> {
    let tokens = lexer::tokenize(text)?;
    parser::parse_expression(&tokens)
}

/// Classify an attribute value: a leading `{}` marks the rest as literal
/// text, any other leading `{` starts an expression.
pub fn parse_value(text: &str) -> Result<AttributeValue> {
    if let Some(rest) = text.strip_prefix("{}") {
        return Ok(AttributeValue::Literal(rest.to_string()));
    }
    if text.starts_with('{') {
        return parse(text).map(AttributeValue::Expression);
    }
    Ok(AttributeValue::Literal(text.to_string()))
}

/// Inverse of [`parse_value`] for literal text.
pub fn escape_literal(text: &str) -> String {
    if text.starts_with('{') {
        format!("{{}}{text}")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_positional_and_named() {
        let expr = parse("{Binding Path, Mode=OneWay, Source={StaticResource Key}}").unwrap();
        assert_eq!(expr.type_name, "Binding");
        assert_eq!(expr.positional.as_slice(), &[MarkupArg::text("Path")]);
        assert_eq!(expr.named.len(), 2);
        assert_eq!(expr.named[0], ("Mode".to_string(), MarkupArg::text("OneWay")));
        match &expr.named[1].1 {
            MarkupArg::Expression(inner) => {
                assert_eq!(inner.type_name, "StaticResource");
                assert_eq!(inner.positional.as_slice(), &[MarkupArg::text("Key")]);
            }
            other => panic!("expected nested expression, got {other:?}"),
        }
    }

    #[test]
    fn test_deep_nesting() {
        let expr = parse("{A {B {C {D x}}}}").unwrap();
        let mut depth = 0;
        let mut cur = &expr;
        while let Some(MarkupArg::Expression(inner)) = cur.positional.first() {
            cur = inner;
            depth += 1;
        }
        assert_eq!(depth, 3);
        assert_eq!(cur.type_name, "D");
    }

    #[test]
    fn test_no_arguments() {
        let expr = parse("{x:Null}").unwrap();
        assert_eq!(expr.prefix_and_name(), ("x", "Null"));
        assert!(expr.positional.is_empty() && expr.named.is_empty());
    }

    #[test]
    fn test_literal_escape() {
        assert_eq!(parse_value("{}{Hello}").unwrap(), AttributeValue::Literal("{Hello}".into()));
        assert_eq!(parse_value("plain").unwrap(), AttributeValue::Literal("plain".into()));
        assert_eq!(escape_literal("{Hello}"), "{}{Hello}");
        assert_eq!(escape_literal("Hello"), "Hello");
    }

    #[test]
    fn test_bracket_segments() {
        let ok = parse("{Ext [{}]}").unwrap();
        assert_eq!(ok.positional.as_slice(), &[MarkupArg::text("[{}]")]);
        let ok = parse("{Ext [{{}}]}").unwrap();
        assert_eq!(ok.positional.as_slice(), &[MarkupArg::text("[{{}}]")]);
        assert!(matches!(parse("{Ext [{]}"), Err(Error::SyntaxError { .. })));
        assert!(matches!(parse("{Ext [}]}"), Err(Error::SyntaxError { .. })));
    }

    #[test]
    fn test_unbalanced_braces() {
        assert!(matches!(parse("{Ext a"), Err(Error::SyntaxError { position: 6, .. })));
        assert!(matches!(parse("{Ext a}}"), Err(Error::SyntaxError { position: 7, .. })));
        assert!(matches!(parse("{Ext {B}"), Err(Error::SyntaxError { .. })));
        assert!(matches!(parse("{}"), Err(Error::SyntaxError { .. })));
    }

    #[test]
    fn test_positional_after_named_rejected() {
        assert!(matches!(parse("{Ext A=1, b}"), Err(Error::SyntaxError { .. })));
    }

    #[test]
    fn test_display_round_trip() {
        let src = "{Ext 'a, b', Prop={x:Null}, Other=plain}";
        let expr = parse(src).unwrap();
        let rendered = expr.to_string();
        assert_eq!(rendered, "{Ext 'a, b', Prop={x:Null}, Other=plain}");
        let again = parse(&rendered).unwrap();
        assert_eq!(again, expr);
    }
}
