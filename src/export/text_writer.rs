//! Structural nodes → markup text.
//!
//! Nodes are folded into a small element tree first; attribute vs property
//! element form is only known once a member's content is complete.

use std::borrow::Cow;

use quick_xml::escape::partial_escape;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::markup::{self, MarkupArg, MarkupExpression};
use crate::model::{Directive, MemberRef, TypeRef, Value, XAML_NAMESPACE};
use crate::nodes::{NamespaceDeclaration, XamlNode, XamlWriter};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextWriterSettings {
    pub indent: String,
    pub newline: String,
    /// Leave out the `<?xml ...?>` declaration.
    pub omit_declaration: bool,
}

impl Default for TextWriterSettings {
    fn default() -> Self {
        Self { indent: "  ".into(), newline: "\n".into(), omit_declaration: true }
    }
}

// ============================================================================
// Output tree
// ============================================================================

#[derive(Debug, Default)]
struct OutElement {
    name: String,
    attributes: Vec<(String, String)>,
    xmlns: Vec<(String, String)>,
    children: Vec<OutNode>,
}

#[derive(Debug)]
enum OutNode {
    Element(OutElement),
    Text(String),
}

/// A finished object: element form, plus attribute form when it is a
/// markup extension with text-only arguments.
#[derive(Debug)]
struct Built {
    element: OutElement,
    compact: Option<MarkupExpression>,
}

#[derive(Debug)]
enum Piece {
    Text(String),
    Object(Built),
}

#[derive(Debug)]
struct ObjectScope {
    ty: TypeRef,
    element: OutElement,
    positional: SmallVec<[MarkupArg; 2]>,
    named: Vec<(String, MarkupArg)>,
    compactable: bool,
}

#[derive(Debug)]
enum Scope {
    Object(ObjectScope),
    /// `GetObject`: items flow into the enclosing member.
    Existing(Vec<Piece>),
    Member { member: MemberRef, pieces: Vec<Piece>, xmlns: Vec<(String, String)> },
}

// ============================================================================
// Writer
// ============================================================================

pub struct XamlTextWriter {
    settings: TextWriterSettings,
    stack: Vec<Scope>,
    /// Bindings per open scope, innermost last.
    bindings: Vec<Vec<(String, String)>>,
    pending: Vec<NamespaceDeclaration>,
    root: Option<OutElement>,
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidNodeSequence(message.into())
}

impl XamlTextWriter {
    pub fn new(settings: TextWriterSettings) -> Self {
        Self { settings, stack: Vec::new(), bindings: Vec::new(), pending: Vec::new(), root: None }
    }

    /// Render the completed document.
    pub fn into_string(self) -> Result<String> {
        if !self.stack.is_empty() {
            return Err(invalid("document is incomplete"));
        }
        let root = self.root.ok_or_else(|| invalid("no root object was written"))?;
        let mut out = String::new();
        if !self.settings.omit_declaration {
            out.push_str(r#"<?xml version="1.0" encoding="utf-8"?>"#);
            out.push_str(&self.settings.newline);
        }
        render(&root, Some(0), &self.settings, &mut out);
        Ok(out)
    }

    // ------------------------------------------------------------------------
    // Names
    // ------------------------------------------------------------------------

    fn open_bindings(&mut self) -> Vec<(String, String)> {
        let decls: Vec<(String, String)> = self.pending.drain(..).map(|d| (d.prefix, d.namespace)).collect();
        self.bindings.push(decls.clone());
        decls
    }

    fn prefix_of(&self, namespace: &str) -> Result<String> {
        self.bindings
            .iter()
            .rev()
            .flat_map(|scope| scope.iter())
            .find(|(_, ns)| ns == namespace)
            .map(|(prefix, _)| prefix.clone())
            .ok_or_else(|| invalid(format!("no prefix declared for namespace '{namespace}'")))
    }

    fn qualified(&self, namespace: &str, local: &str) -> Result<String> {
        let prefix = self.prefix_of(namespace)?;
        Ok(if prefix.is_empty() { local.to_string() } else { format!("{prefix}:{local}") })
    }

    fn type_name(&self, ty: &TypeRef) -> Result<String> {
        self.qualified(ty.namespace(), ty.name())
    }

    fn type_text(&self, ty: &TypeRef) -> Result<String> {
        let mut text = self.type_name(ty)?;
        if !ty.type_args().is_empty() {
            let args = ty.type_args().iter().map(|a| self.type_text(a)).collect::<Result<Vec<_>>>()?;
            text = format!("{text}({})", args.join(", "));
        }
        Ok(text)
    }

    /// Attribute or property-element name of a member on `owner`.
    fn member_name(&self, owner: &TypeRef, member: &MemberRef, element: bool) -> Result<String> {
        if let Some(directive) = member.directive() {
            let name = match directive {
                Directive::PositionalParameters => Directive::Arguments.name(),
                other => other.name(),
            };
            return self.qualified(XAML_NAMESPACE, name);
        }
        if member.is_attachable() {
            let declaring = member
                .declaring_type()
                .ok_or_else(|| invalid(format!("attached member '{member}' has no owner")))?;
            return self.qualified(&declaring.namespace, &format!("{}.{}", declaring.name, member.name()));
        }
        if element {
            self.qualified(owner.namespace(), &format!("{}.{}", owner.name(), member.name()))
        } else {
            Ok(member.name().to_string())
        }
    }

    // ------------------------------------------------------------------------
    // Node handlers
    // ------------------------------------------------------------------------

    fn start_object(&mut self, ty: TypeRef) -> Result<()> {
        match self.stack.last() {
            Some(Scope::Member { .. }) => {}
            None if self.root.is_none() => {}
            None => return Err(invalid("second root object")),
            Some(_) => return Err(invalid(format!("object '{ty}' outside a member"))),
        }
        let xmlns = self.open_bindings();
        let mut element = OutElement { name: self.type_name(&ty)?, xmlns, ..Default::default() };
        if !ty.type_args().is_empty() {
            let args = ty.type_args().iter().map(|a| self.type_text(a)).collect::<Result<Vec<_>>>()?;
            element
                .attributes
                .push((self.qualified(XAML_NAMESPACE, "TypeArguments")?, args.join(", ")));
        }
        let compactable = ty.is_markup_extension() && ty.type_args().is_empty();
        self.stack.push(Scope::Object(ObjectScope {
            ty,
            element,
            positional: SmallVec::new(),
            named: Vec::new(),
            compactable,
        }));
        Ok(())
    }

    fn get_object(&mut self) -> Result<()> {
        if !matches!(self.stack.last(), Some(Scope::Member { .. })) {
            return Err(invalid("GetObject outside a member"));
        }
        self.bindings.push(Vec::new());
        self.stack.push(Scope::Existing(Vec::new()));
        Ok(())
    }

    fn end_object(&mut self) -> Result<()> {
        let built = match self.stack.pop() {
            Some(Scope::Object(object)) => finish_object(object),
            Some(Scope::Existing(pieces)) => {
                self.bindings.pop();
                return match self.stack.last_mut() {
                    Some(Scope::Member { pieces: outer, .. }) => {
                        outer.extend(pieces);
                        Ok(())
                    }
                    _ => Err(invalid("GetObject closed outside a member")),
                };
            }
            _ => return Err(invalid("EndObject without StartObject")),
        };
        self.bindings.pop();
        match self.stack.last_mut() {
            Some(Scope::Member { pieces, .. }) => {
                pieces.push(Piece::Object(built));
                Ok(())
            }
            None => {
                self.root = Some(built.element);
                Ok(())
            }
            Some(_) => Err(invalid("object closed outside a member")),
        }
    }

    fn start_member(&mut self, member: MemberRef) -> Result<()> {
        match self.stack.last() {
            Some(Scope::Object(_)) => {}
            Some(Scope::Existing(_)) if member.directive() == Some(Directive::Items) => {}
            _ => return Err(invalid(format!("member '{member}' outside an object"))),
        }
        let xmlns = self.open_bindings();
        self.stack.push(Scope::Member { member, pieces: Vec::new(), xmlns });
        Ok(())
    }

    fn value(&mut self, value: Value) -> Result<()> {
        let text = match value {
            Value::String(text) => text,
            v @ (Value::Int(_) | Value::Float(_) | Value::Bool(_)) => v.to_string(),
            other => return Err(invalid(format!("a {} value has no text form", other.type_name()))),
        };
        match self.stack.last_mut() {
            Some(Scope::Member { pieces, .. }) => {
                pieces.push(Piece::Text(text));
                Ok(())
            }
            _ => Err(invalid("value outside a member")),
        }
    }

    fn end_member(&mut self) -> Result<()> {
        let Some(Scope::Member { member, pieces, xmlns }) = self.stack.pop() else {
            return Err(invalid("EndMember without StartMember"));
        };
        self.bindings.pop();
        if pieces.is_empty() {
            return Err(invalid(format!("member '{member}' has no value")));
        }

        let object = match self.stack.last_mut() {
            Some(Scope::Existing(items)) => {
                items.extend(pieces);
                return Ok(());
            }
            Some(Scope::Object(object)) => object,
            _ => return Err(invalid("EndMember outside an object")),
        };
        let ty = object.ty.clone();
        let directive = member.directive();
        if directive.is_none() && !member.is_collection_valued() && pieces.len() > 1 {
            return Err(invalid(format!("two values in scalar member '{member}'")));
        }

        // markup-extension argument form
        if object.compactable {
            match (directive, pieces.as_slice()) {
                (Some(Directive::PositionalParameters), _) => {
                    for piece in &pieces {
                        match compact_arg(piece) {
                            Some(arg) => object.positional.push(arg),
                            None => object.compactable = false,
                        }
                    }
                }
                (None, [piece]) if xmlns.is_empty() && !member.is_attachable() => match compact_arg(piece) {
                    Some(arg) => object.named.push((member.name().to_string(), arg)),
                    None => object.compactable = false,
                },
                _ => object.compactable = false,
            }
        }

        let is_content = directive.is_none()
            && !member.is_attachable()
            && ty.content_property() == Some(member.name())
            && pieces.iter().all(|p| matches!(p, Piece::Text(_)));
        let inline = matches!(directive, Some(Directive::Items | Directive::Initialization)) || is_content;

        if inline {
            let object = self.object_mut()?;
            object.element.xmlns.extend(xmlns);
            for piece in pieces {
                match piece {
                    Piece::Text(text) => {
                        if needs_preserve(&text) && object.element.attribute("xml:space").is_none() {
                            object.element.attributes.push(("xml:space".into(), "preserve".into()));
                        }
                        if !text.is_empty() {
                            object.element.children.push(OutNode::Text(text));
                        }
                    }
                    Piece::Object(built) => object.element.children.push(OutNode::Element(built.element)),
                }
            }
            return Ok(());
        }

        let attribute_value = match pieces.as_slice() {
            [Piece::Text(text)] if xmlns.is_empty() && directive != Some(Directive::PositionalParameters) => {
                Some(markup::escape_literal(text))
            }
            [Piece::Object(Built { compact: Some(expr), .. })] if xmlns.is_empty() => Some(expr.to_string()),
            _ => None,
        };
        if let Some(value) = attribute_value {
            let name = self.member_name(&ty, &member, false)?;
            self.object_mut()?.element.attributes.push((name, value));
            return Ok(());
        }

        let mut property = OutElement { name: self.member_name(&ty, &member, true)?, xmlns, ..Default::default() };
        for piece in pieces {
            property.children.push(match piece {
                Piece::Text(text) => OutNode::Text(text),
                Piece::Object(built) => OutNode::Element(built.element),
            });
        }
        self.object_mut()?.element.children.push(OutNode::Element(property));
        Ok(())
    }

    fn object_mut(&mut self) -> Result<&mut ObjectScope> {
        match self.stack.last_mut() {
            Some(Scope::Object(object)) => Ok(object),
            _ => Err(invalid("member closed outside an object")),
        }
    }
}

impl XamlWriter for XamlTextWriter {
    fn write_node(&mut self, node: XamlNode) -> Result<()> {
        match node {
            XamlNode::NamespaceDeclaration(decl) => {
                self.pending.push(decl);
                Ok(())
            }
            XamlNode::StartObject(ty) => self.start_object(ty),
            XamlNode::GetObject => self.get_object(),
            XamlNode::EndObject => self.end_object(),
            XamlNode::StartMember(member) => self.start_member(member),
            XamlNode::EndMember => self.end_member(),
            XamlNode::Value(value) => self.value(value),
        }
    }

    fn close(&mut self) -> Result<()> {
        if !self.stack.is_empty() {
            return Err(invalid("document is incomplete"));
        }
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

impl OutElement {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }
}

fn compact_arg(piece: &Piece) -> Option<MarkupArg> {
    match piece {
        Piece::Text(text) => Some(MarkupArg::Text(text.clone())),
        Piece::Object(Built { compact: Some(expr), .. }) => Some(MarkupArg::Expression(Box::new(expr.clone()))),
        Piece::Object(_) => None,
    }
}

fn finish_object(object: ObjectScope) -> Built {
    let ObjectScope { ty: _, element, positional, named, compactable } = object;
    let compact = (compactable && element.xmlns.is_empty()).then(|| {
        let name = element.name.strip_suffix("Extension").unwrap_or(&element.name);
        let mut expr = MarkupExpression::new(name);
        expr.positional = positional;
        expr.named = named;
        expr
    });
    Built { element, compact }
}

/// Text the reader would not reproduce without `xml:space="preserve"`.
fn needs_preserve(text: &str) -> bool {
    let mut previous_space = true;
    for c in text.chars() {
        if c.is_whitespace() {
            if previous_space || c != ' ' {
                return true;
            }
            previous_space = true;
        } else {
            previous_space = false;
        }
    }
    previous_space && !text.is_empty()
}

fn attr_escape(value: &str) -> Cow<'_, str> {
    let escaped = partial_escape(value);
    if !escaped.contains(['"', '\n', '\r', '\t']) {
        return escaped;
    }
    let mut out = String::with_capacity(escaped.len() + 8);
    for c in escaped.chars() {
        match c {
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// `depth` is `None` for inline (mixed content) rendering.
fn render(element: &OutElement, depth: Option<usize>, settings: &TextWriterSettings, out: &mut String) {
    if let Some(depth) = depth {
        out.push_str(&settings.indent.repeat(depth));
    }
    out.push('<');
    out.push_str(&element.name);
    for (name, value) in &element.attributes {
        out.push_str(&format!(" {name}=\"{}\"", attr_escape(value)));
    }
    for (prefix, namespace) in &element.xmlns {
        let name = if prefix.is_empty() { "xmlns".to_string() } else { format!("xmlns:{prefix}") };
        out.push_str(&format!(" {name}=\"{}\"", attr_escape(namespace)));
    }
    if element.children.is_empty() {
        out.push_str(" />");
        return;
    }
    out.push('>');

    let mixed = element.children.iter().any(|c| matches!(c, OutNode::Text(_)));
    match depth {
        Some(depth) if !mixed => {
            for child in &element.children {
                if let OutNode::Element(child) = child {
                    out.push_str(&settings.newline);
                    render(child, Some(depth + 1), settings, out);
                }
            }
            out.push_str(&settings.newline);
            out.push_str(&settings.indent.repeat(depth));
        }
        _ => {
            for child in &element.children {
                match child {
                    OutNode::Text(text) => out.push_str(&partial_escape(text.as_str())),
                    OutNode::Element(child) => render(child, None, settings, out),
                }
            }
        }
    }
    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}
