//! Type-name grammar used by `x:TypeArguments`, `{x:Type}` and factory
//! method owners.
//!
//! ```text
//! List     := Type (',' Type)*
//! Type     := QName ('(' List ')')?
//! QName    := (Ident ':')? Ident
//! ```

use std::fmt;

use crate::model::TypeRef;
use crate::schema::SchemaProvider;
use crate::{Error, Result};

/// Unresolved, possibly generic type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeNameExpr {
    pub prefix: String,
    pub name: String,
    pub args: Vec<TypeNameExpr>,
    /// Absolute offset of the name in the source document.
    pub position: usize,
}

impl fmt::Display for TypeNameExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.prefix.is_empty() {
            write!(f, "{}:", self.prefix)?;
        }
        f.write_str(&self.name)?;
        if !self.args.is_empty() {
            f.write_str("(")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{arg}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

/// Parse a comma-separated list of type names. `base` is the document
/// offset of `text`, used for error positions.
pub fn parse_type_list(text: &str, base: usize) -> Result<Vec<TypeNameExpr>> {
    let mut cursor = Cursor { text, pos: 0, base };
    let list = cursor.list()?;
    cursor.finish()?;
    Ok(list)
}

/// Parse exactly one type name.
pub fn parse_type_name(text: &str, base: usize) -> Result<TypeNameExpr> {
    let mut cursor = Cursor { text, pos: 0, base };
    let ty = cursor.type_name()?;
    cursor.finish()?;
    Ok(ty)
}

/// Resolve a parsed name. `namespace_of` maps a prefix to its URI.
pub fn resolve<S, F>(expr: &TypeNameExpr, schema: &S, namespace_of: &F) -> Result<TypeRef>
where
    S: SchemaProvider + ?Sized,
    F: Fn(&str) -> Option<String>,
{
    let args = expr
        .args
        .iter()
        .map(|a| resolve(a, schema, namespace_of))
        .collect::<Result<Vec<_>>>()?;
    let namespace = namespace_of(&expr.prefix).ok_or_else(|| Error::UnknownPrefix(expr.prefix.clone()))?;
    schema
        .resolve_element_type(&namespace, &expr.name, &args)
        .ok_or_else(|| Error::UnknownType { namespace, name: expr.to_string() })
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
    base: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
            self.pos += c.len_utf8();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::SyntaxError { position: self.base + self.pos, message: message.into() }
    }

    fn ident(&mut self) -> Result<&str> {
        self.skip_ws();
        let start = self.pos;
        while let Some(c) = self.peek().filter(|c| c.is_alphanumeric() || *c == '_') {
            self.pos += c.len_utf8();
        }
        if self.pos == start {
            return Err(self.error("expected type name"));
        }
        Ok(&self.text[start..self.pos])
    }

    fn type_name(&mut self) -> Result<TypeNameExpr> {
        self.skip_ws();
        let position = self.base + self.pos;
        let first = self.ident()?.to_string();
        let (prefix, name) = if self.peek() == Some(':') {
            self.pos += 1;
            (first, self.ident()?.to_string())
        } else {
            (String::new(), first)
        };
        let mut args = Vec::new();
        if self.eat('(') {
            args = self.list()?;
            if !self.eat(')') {
                return Err(self.error("expected ')' after type arguments"));
            }
        }
        Ok(TypeNameExpr { prefix, name, args, position })
    }

    fn list(&mut self) -> Result<Vec<TypeNameExpr>> {
        let mut items = vec![self.type_name()?];
        while self.eat(',') {
            items.push(self.type_name()?);
        }
        Ok(items)
    }

    fn finish(&mut self) -> Result<()> {
        self.skip_ws();
        match self.peek() {
            None => Ok(()),
            Some(c) => Err(self.error(format!("unexpected '{c}' in type name"))),
        }
    }
}
