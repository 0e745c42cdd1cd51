//! Markup-extension AST.

use std::fmt;

use smallvec::SmallVec;

/// Source span, byte offsets into the attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Parsed `{Name pos1, pos2, Prop=value}`.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkupExpression {
    /// Extension name as written, possibly prefixed (`x:Reference`).
    pub type_name: String,
    pub positional: SmallVec<[MarkupArg; 2]>,
    /// Named arguments in document order.
    pub named: Vec<(String, MarkupArg)>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkupArg {
    Text(String),
    Expression(Box<MarkupExpression>),
}

/// An attribute value after markup-extension detection.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Literal(String),
    Expression(MarkupExpression),
}

impl MarkupExpression {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            positional: SmallVec::new(),
            named: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn with_positional(mut self, arg: MarkupArg) -> Self {
        self.positional.push(arg);
        self
    }

    pub fn with_named(mut self, name: impl Into<String>, arg: MarkupArg) -> Self {
        self.named.push((name.into(), arg));
        self
    }

    /// `(prefix, local)` split of the type name.
    pub fn prefix_and_name(&self) -> (&str, &str) {
        match self.type_name.split_once(':') {
            Some((prefix, local)) => (prefix, local),
            None => ("", self.type_name.as_str()),
        }
    }
}

impl MarkupArg {
    pub fn text(s: impl Into<String>) -> Self {
        MarkupArg::Text(s.into())
    }
}

// ============================================================================
// Rendering back to markup
// ============================================================================

fn needs_quoting(text: &str) -> bool {
    text.is_empty()
        || text.starts_with(char::is_whitespace)
        || text.ends_with(char::is_whitespace)
        || text.contains(['{', '}', ',', '=', '\'', '"', '\\', '['])
}

fn write_text(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    if !needs_quoting(text) {
        return f.write_str(text);
    }
    f.write_str("'")?;
    for c in text.chars() {
        if c == '\'' || c == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{c}")?;
    }
    f.write_str("'")
}

impl fmt::Display for MarkupArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkupArg::Text(t) => write_text(f, t),
            MarkupArg::Expression(e) => write!(f, "{e}"),
        }
    }
}

impl fmt::Display for MarkupExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}", self.type_name)?;
        let mut first = true;
        for arg in &self.positional {
            f.write_str(if first { " " } else { ", " })?;
            first = false;
            write!(f, "{arg}")?;
        }
        for (name, arg) in &self.named {
            f.write_str(if first { " " } else { ", " })?;
            first = false;
            write!(f, "{name}={arg}")?;
        }
        f.write_str("}")
    }
}
