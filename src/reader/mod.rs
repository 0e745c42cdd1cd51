//! # Text Reader
//!
//! Markup text → structural nodes.
//!
//! The document is parsed into an element tree (see [`xml`]), then walked
//! once to emit nodes into a [`NodeList`]. The resulting [`XamlXmlReader`]
//! is a cursor over that buffer, so bookmarks and subtrees never re-parse.
//!
//! ## Mapping
//!
//! | Markup | Nodes |
//! |--------|-------|
//! | `xmlns:p="uri"` | `NamespaceDeclaration` before the owning object/member |
//! | `<Type>` | `StartObject(Type)` … `EndObject` |
//! | `<Type.Member>` | `StartMember(Member)` … `EndMember` |
//! | `Member="text"` | `StartMember`, `Value`, `EndMember` |
//! | `Member="{Ext a, B=c}"` | `StartMember`, `StartObject(Ext)`, `_PositionalParameters`, `B`, `EndObject`, `EndMember` |
//! | element content | content property, `_Items`, or `_Initialization` |

pub mod type_args;
mod xml;

use serde::{Deserialize, Serialize};

use crate::markup::{self, AttributeValue, MarkupArg, MarkupExpression};
use crate::model::{Directive, MemberRef, TypeRef, Value, XAML_NAMESPACE, XML_NAMESPACE};
use crate::nodes::{Bookmark, NamespaceDeclaration, NodeList, NodeListReader, XamlNode, XamlReader};
use crate::schema::SchemaProvider;
use crate::{Error, Result};

use xml::{Content, Element, RawAttribute};

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    /// Keep text content verbatim, as if the root carried
    /// `xml:space="preserve"`.
    pub preserve_whitespace: bool,
}

// ============================================================================
// Public reader
// ============================================================================

/// Forward-only node reader over markup text.
pub struct XamlXmlReader {
    inner: NodeListReader<'static>,
}

impl XamlXmlReader {
    pub fn new<S: SchemaProvider + ?Sized>(text: &str, schema: &S, settings: &ReaderSettings) -> Result<Self> {
        let nodes = read_nodes(text, schema, settings)?;
        Ok(Self { inner: nodes.into_reader() })
    }

    pub fn bookmark(&self) -> Bookmark {
        self.inner.bookmark()
    }

    pub fn seek(&mut self, bookmark: Bookmark) -> Result<()> {
        self.inner.seek(bookmark)
    }
}

impl XamlReader for XamlXmlReader {
    fn read(&mut self) -> Result<bool> {
        self.inner.read()
    }

    fn current(&self) -> Option<&XamlNode> {
        self.inner.current()
    }

    fn is_eof(&self) -> bool {
        self.inner.is_eof()
    }
}

/// Parse markup text into a buffered node list.
pub fn read_nodes<S: SchemaProvider + ?Sized>(text: &str, schema: &S, settings: &ReaderSettings) -> Result<NodeList> {
    let root = xml::parse_document(text)?;
    let mut emitter = Emitter { schema, scopes: Vec::new(), out: NodeList::new() };
    emitter.object_element(&root, settings.preserve_whitespace)?;
    tracing::debug!(nodes = emitter.out.len(), root = %root.name.local, "read markup document");
    Ok(emitter.out)
}

// ============================================================================
// Emitter
// ============================================================================

/// One piece of element content after whitespace handling.
enum Part<'e> {
    Text(String),
    Object(&'e Element),
}

struct Emitter<'s, S: ?Sized> {
    schema: &'s S,
    /// Namespace bindings, innermost element last.
    scopes: Vec<Vec<(String, String)>>,
    out: NodeList,
}

impl<S: SchemaProvider + ?Sized> Emitter<'_, S> {
    // ------------------------------------------------------------------------
    // Namespaces
    // ------------------------------------------------------------------------

    fn lookup(&self, prefix: &str) -> Option<String> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE.to_string());
        }
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter())
            .find(|(p, _)| p == prefix)
            .map(|(_, ns)| ns.clone())
    }

    fn namespace_of(&self, prefix: &str) -> Result<String> {
        self.lookup(prefix).ok_or_else(|| Error::UnknownPrefix(prefix.to_string()))
    }

    /// Emit and bind the element's own `xmlns` attributes.
    fn open_scope(&mut self, element: &Element) {
        let mut scope = Vec::new();
        for attr in element.attributes.iter().filter(|a| a.name.is_xmlns()) {
            let decl = NamespaceDeclaration::new(attr.name.declared_prefix(), attr.value.clone());
            scope.push((decl.prefix.clone(), decl.namespace.clone()));
            self.out.push(XamlNode::NamespaceDeclaration(decl));
        }
        self.scopes.push(scope);
    }

    fn close_scope(&mut self) {
        self.scopes.pop();
    }

    fn is_xaml_prefix(&self, prefix: &str) -> bool {
        !prefix.is_empty() && self.lookup(prefix).as_deref() == Some(XAML_NAMESPACE)
    }

    // ------------------------------------------------------------------------
    // Objects
    // ------------------------------------------------------------------------

    fn element_type(&self, element: &Element) -> Result<TypeRef> {
        let namespace = self.namespace_of(&element.name.prefix)?;
        let type_args = match element
            .attributes
            .iter()
            .find(|a| a.name.local == "TypeArguments" && self.is_xaml_prefix(&a.name.prefix))
        {
            Some(attr) => type_args::parse_type_list(&attr.value, attr.offset)?
                .iter()
                .map(|expr| type_args::resolve(expr, self.schema, &|p: &str| self.lookup(p)))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        self.schema
            .resolve_element_type(&namespace, &element.name.local, &type_args)
            .ok_or_else(|| Error::UnknownType { namespace, name: element.name.local.clone() })
    }

    fn object_element(&mut self, element: &Element, preserve: bool) -> Result<()> {
        self.open_scope(element);
        let preserve = xml_space(element).unwrap_or(preserve);
        let ty = self.element_type(element)?;
        tracing::trace!(ty = %ty, offset = element.offset, "object element");

        self.out.push(XamlNode::StartObject(ty.clone()));
        for attr in &element.attributes {
            self.attribute(attr, &ty)?;
        }
        self.children(element, &ty, preserve)?;
        self.out.push(XamlNode::EndObject);

        self.close_scope();
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------------

    fn attribute(&mut self, attr: &RawAttribute, ty: &TypeRef) -> Result<()> {
        if attr.name.is_xmlns() || attr.name.prefix == "xml" {
            return Ok(());
        }
        let member = if self.is_xaml_prefix(&attr.name.prefix) {
            match Directive::from_markup_name(&attr.name.local) {
                Some(Directive::TypeArguments) => return Ok(()),
                Some(directive) => directive.member(),
                None => {
                    return Err(Error::UnknownMember {
                        type_name: XAML_NAMESPACE.to_string(),
                        member: attr.name.local.clone(),
                    });
                }
            }
        } else {
            self.member_named(ty, &attr.name.prefix, &attr.name.local)?
        };

        self.out.push(XamlNode::StartMember(member));
        self.text_value(&attr.value, attr.offset)?;
        self.out.push(XamlNode::EndMember);
        Ok(())
    }

    /// `Member` on `ty`, or `Owner.Member` as an attached member.
    fn member_named(&self, ty: &TypeRef, prefix: &str, local: &str) -> Result<MemberRef> {
        let Some((owner, name)) = local.split_once('.') else {
            return self.schema.resolve_member(ty, local).ok_or_else(|| Error::UnknownMember {
                type_name: ty.full_name(),
                member: local.to_string(),
            });
        };
        let namespace = self.namespace_of(prefix)?;
        if namespace == ty.namespace() && owner == ty.name() {
            if let Some(member) = self.schema.resolve_member(ty, name) {
                return Ok(member);
            }
        }
        let owner_ty = self
            .schema
            .resolve_element_type(&namespace, owner, &[])
            .ok_or_else(|| Error::UnknownType { namespace, name: owner.to_string() })?;
        self.schema
            .resolve_attachable(&owner_ty, name)
            .or_else(|| self.schema.resolve_member(&owner_ty, name))
            .ok_or_else(|| Error::UnknownMember { type_name: owner_ty.full_name(), member: name.to_string() })
    }

    fn text_value(&mut self, text: &str, offset: usize) -> Result<()> {
        match markup::parse_value(text).map_err(|e| shift(e, offset))? {
            AttributeValue::Literal(literal) => self.out.push(XamlNode::Value(Value::String(literal))),
            AttributeValue::Expression(expr) => self.expression(&expr, offset)?,
        }
        Ok(())
    }

    fn expression(&mut self, expr: &MarkupExpression, offset: usize) -> Result<()> {
        let (prefix, name) = expr.prefix_and_name();
        let namespace = self.namespace_of(prefix)?;
        let ty = self
            .schema
            .resolve_extension_type(&namespace, name)
            .ok_or_else(|| Error::UnknownType { namespace, name: name.to_string() })?;

        self.out.push(XamlNode::StartObject(ty.clone()));
        if !expr.positional.is_empty() {
            self.out.push(XamlNode::StartMember(Directive::PositionalParameters.member()));
            for arg in &expr.positional {
                self.markup_arg(arg, offset)?;
            }
            self.out.push(XamlNode::EndMember);
        }
        for (member_name, arg) in &expr.named {
            let member = self.schema.resolve_member(&ty, member_name).ok_or_else(|| Error::UnknownMember {
                type_name: ty.full_name(),
                member: member_name.clone(),
            })?;
            self.out.push(XamlNode::StartMember(member));
            self.markup_arg(arg, offset)?;
            self.out.push(XamlNode::EndMember);
        }
        self.out.push(XamlNode::EndObject);
        Ok(())
    }

    fn markup_arg(&mut self, arg: &MarkupArg, offset: usize) -> Result<()> {
        match arg {
            MarkupArg::Text(text) => {
                self.out.push(XamlNode::Value(Value::String(text.clone())));
                Ok(())
            }
            MarkupArg::Expression(inner) => self.expression(inner, offset),
        }
    }

    // ------------------------------------------------------------------------
    // Children
    // ------------------------------------------------------------------------

    fn is_property_element(&self, element: &Element) -> bool {
        element.name.local.contains('.')
            || (self.is_xaml_prefix(&element.name.prefix)
                && Directive::from_markup_name(&element.name.local).is_some())
    }

    fn children(&mut self, element: &Element, ty: &TypeRef, preserve: bool) -> Result<()> {
        let keep_blank = ty.has_text_syntax() && !element.has_element_children();
        let mut group: Vec<&Content> = Vec::new();
        for child in &element.children {
            match child {
                Content::Element(e) if self.is_property_element(e) => {
                    self.content(ty, &group, preserve, keep_blank)?;
                    group.clear();
                    self.property_element(e, ty, preserve)?;
                }
                other => group.push(other),
            }
        }
        self.content(ty, &group, preserve, keep_blank)
    }

    /// Route implicit content to the content property, `_Items`, or
    /// `_Initialization`.
    fn content(&mut self, ty: &TypeRef, group: &[&Content], preserve: bool, keep_blank: bool) -> Result<()> {
        let parts = normalize(group, preserve, keep_blank);
        if parts.is_empty() {
            return Ok(());
        }
        let member = if let Some(name) = ty.content_property() {
            self.schema.resolve_member(ty, name).ok_or_else(|| Error::UnknownMember {
                type_name: ty.full_name(),
                member: name.to_string(),
            })?
        } else if ty.is_collection() || ty.is_dictionary() {
            Directive::Items.member()
        } else if parts.iter().all(|p| matches!(p, Part::Text(_))) {
            Directive::Initialization.member()
        } else {
            let offset = group
                .iter()
                .find(|c| c.is_significant())
                .map_or(0, |c| c.offset());
            return Err(Error::SyntaxError {
                position: offset,
                message: format!("'{ty}' does not accept element content"),
            });
        };
        self.member_content(member, &parts, preserve)
    }

    fn property_element(&mut self, element: &Element, owner: &TypeRef, preserve: bool) -> Result<()> {
        if let Some(attr) = element.attributes.iter().find(|a| !a.name.is_xmlns()) {
            return Err(Error::SyntaxError {
                position: attr.offset,
                message: format!("property element '{}' cannot carry attributes", element.name.local),
            });
        }
        self.open_scope(element);
        let preserve = xml_space(element).unwrap_or(preserve);
        let member = if self.is_xaml_prefix(&element.name.prefix) {
            Directive::from_markup_name(&element.name.local)
                .map(Directive::member)
                .ok_or_else(|| Error::UnknownMember {
                    type_name: XAML_NAMESPACE.to_string(),
                    member: element.name.local.clone(),
                })?
        } else {
            self.member_named(owner, &element.name.prefix, &element.name.local)?
        };
        tracing::trace!(member = %member, offset = element.offset, "property element");

        let mut group = Vec::new();
        for child in &element.children {
            if let Content::Element(e) = child {
                if self.is_property_element(e) {
                    return Err(Error::SyntaxError {
                        position: e.offset,
                        message: format!("property element '{}' nested in a property element", e.name.local),
                    });
                }
            }
            group.push(child);
        }
        let parts = normalize(&group, preserve, false);
        self.member_content(member, &parts, preserve)?;
        self.close_scope();
        Ok(())
    }

    fn member_content(&mut self, member: MemberRef, parts: &[Part<'_>], preserve: bool) -> Result<()> {
        let wrap = self.needs_get_object(&member, parts)?;
        self.out.push(XamlNode::StartMember(member));
        if wrap {
            self.out.push(XamlNode::GetObject);
            self.out.push(XamlNode::StartMember(Directive::Items.member()));
        }
        for part in parts {
            match part {
                Part::Text(text) => self.out.push(XamlNode::Value(Value::String(text.clone()))),
                Part::Object(e) => self.object_element(e, preserve)?,
            }
        }
        if wrap {
            self.out.push(XamlNode::EndMember);
            self.out.push(XamlNode::EndObject);
        }
        self.out.push(XamlNode::EndMember);
        Ok(())
    }

    /// Collection-valued members receive items into the existing value
    /// unless the content is itself an instance of the member's type.
    fn needs_get_object(&mut self, member: &MemberRef, parts: &[Part<'_>]) -> Result<bool> {
        if !member.is_collection_valued() || parts.is_empty() {
            return Ok(false);
        }
        let Some(Part::Object(first)) = parts.iter().find(|p| matches!(p, Part::Object(_))) else {
            return Ok(true);
        };
        // resolve under the child's own namespace declarations
        let scope = first
            .attributes
            .iter()
            .filter(|a| a.name.is_xmlns())
            .map(|a| (a.name.declared_prefix().to_string(), a.value.clone()))
            .collect();
        self.scopes.push(scope);
        let child_ty = self.element_type(first);
        self.scopes.pop();
        Ok(self.schema.member_type(member) != Some(child_ty?))
    }
}

// ============================================================================
// Text handling
// ============================================================================

fn xml_space(element: &Element) -> Option<bool> {
    match element.attribute("xml", "space")?.value.as_str() {
        "preserve" => Some(true),
        "default" => Some(false),
        _ => None,
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Apply whitespace rules to one run of implicit content.
///
/// Runs collapse to a single space and are trimmed at element boundaries.
/// Whitespace-only text survives only when `keep_blank` (a text-initialized
/// type with no element children) or under `preserve`.
fn normalize<'e>(group: &[&'e Content], preserve: bool, keep_blank: bool) -> Vec<Part<'e>> {
    let mut parts = Vec::with_capacity(group.len());
    for content in group {
        match content {
            Content::Element(e) => parts.push(Part::Object(e)),
            Content::Text { text, .. } if preserve => {
                if !text.is_empty() {
                    parts.push(Part::Text(text.clone()));
                }
            }
            Content::Text { text, .. } => {
                let collapsed = collapse_whitespace(text);
                let trimmed = collapsed.trim();
                if !trimmed.is_empty() {
                    parts.push(Part::Text(trimmed.to_string()));
                } else if keep_blank && !text.is_empty() {
                    parts.push(Part::Text(text.clone()));
                }
            }
        }
    }
    parts
}

/// Rebase a syntax error position from attribute-relative to document.
fn shift(err: Error, offset: usize) -> Error {
    match err {
        Error::SyntaxError { position, message } => Error::SyntaxError { position: position + offset, message },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::NodeType;
    use crate::schema::testing::{self, NS};
    use pretty_assertions::assert_eq;

    fn read(text: &str) -> NodeList {
        read_nodes(text, &testing::schema(), &ReaderSettings::default()).unwrap()
    }

    fn types(list: &NodeList) -> Vec<NodeType> {
        list.iter().map(XamlNode::node_type).collect()
    }

    fn xmlns() -> String {
        format!(r#"xmlns="{NS}" xmlns:x="{XAML_NAMESPACE}""#)
    }

    #[test]
    fn test_attribute_becomes_member_triple() {
        let list = read(&format!(r#"<BigContainer Integer="123" {}/>"#, xmlns()));
        assert_eq!(
            types(&list),
            vec![
                NodeType::NamespaceDeclaration,
                NodeType::NamespaceDeclaration,
                NodeType::StartObject,
                NodeType::StartMember,
                NodeType::Value,
                NodeType::EndMember,
                NodeType::EndObject,
            ]
        );
        assert_eq!(list.nodes()[4].value(), Some(&Value::from("123")));
    }

    #[test]
    fn test_markup_extension_expands_to_object() {
        let list = read(&format!(r#"<BigContainer Text="{{Upper abc}}" {}/>"#, xmlns()));
        let names: Vec<String> = list
            .iter()
            .filter_map(|n| n.member().map(|m| m.name().to_string()))
            .collect();
        assert_eq!(names, vec!["Text", "_PositionalParameters"]);
        let ext = list.iter().filter_map(XamlNode::object_type).nth(1).unwrap();
        assert_eq!(ext.name(), "UpperExtension");
    }

    #[test]
    fn test_escaped_literal_attribute() {
        let list = read(&format!(r#"<BigContainer Text="{{}}{{literal}}" {}/>"#, xmlns()));
        assert!(list.iter().any(|n| n.value() == Some(&Value::from("{literal}"))));
    }

    #[test]
    fn test_type_arguments_resolved_after_later_xmlns() {
        let text = format!(
            r#"<List x:TypeArguments="s:Int32" xmlns:s="{XAML_NAMESPACE}" {}><s:Int32>4</s:Int32></List>"#,
            xmlns()
        );
        let list = read(&text);
        let root = list.iter().find_map(XamlNode::object_type).unwrap();
        assert_eq!(root.to_string(), "List(Int32)");
        assert!(list.iter().any(|n| n.member().is_some_and(|m| m.name() == "_Items")));
        assert!(list.iter().any(|n| n.member().is_some_and(|m| m.name() == "_Initialization")));
    }

    #[test]
    fn test_collection_property_element_uses_get_object() {
        let text = format!(
            r#"<Holder {}><Holder.Values><x:Double>1</x:Double></Holder.Values></Holder>"#,
            xmlns()
        );
        let list = read(&text);
        assert!(list.iter().any(|n| matches!(n, XamlNode::GetObject)));
    }

    #[test]
    fn test_whitespace_only_content_dropped() {
        let list = read(&format!("<DoubleCollection {}>\n   \n</DoubleCollection>", xmlns()));
        assert!(list.iter().all(|n| n.member().is_none()));
    }

    #[test]
    fn test_whitespace_kept_for_text_types() {
        let list = read(&format!("<x:String {}>   </x:String>", xmlns()));
        assert!(list.iter().any(|n| n.value() == Some(&Value::from("   "))));
    }

    #[test]
    fn test_text_runs_collapse() {
        let list = read(&format!("<x:String {}>  a \n\t b  </x:String>", xmlns()));
        assert!(list.iter().any(|n| n.value() == Some(&Value::from("a b"))));
    }

    #[test]
    fn test_xml_space_preserve() {
        let list = read(&format!(r#"<x:String xml:space="preserve" {}>  a  b </x:String>"#, xmlns()));
        assert!(list.iter().any(|n| n.value() == Some(&Value::from("  a  b "))));
    }

    #[test]
    fn test_attached_member_attribute() {
        let list = read(&format!(r#"<BigContainer Grid.Row="2" {}/>"#, xmlns()));
        let member = list.iter().find_map(XamlNode::member).unwrap();
        assert!(member.is_attachable());
        assert_eq!(member.qualified_name(), "Grid.Row");
    }

    #[test]
    fn test_brace_error_position_is_document_relative() {
        let text = format!(r#"<BigContainer Text="{{Upper [{{]}}" {}/>"#, xmlns());
        let value_start = text.find("{Upper").unwrap();
        let err = read_nodes(&text, &testing::schema(), &ReaderSettings::default()).unwrap_err();
        assert!(matches!(err, Error::SyntaxError { position, .. } if position == value_start + 9));
    }

    #[test]
    fn test_resolution_errors() {
        let schema = testing::schema();
        let settings = ReaderSettings::default();
        let unknown_type = read_nodes(&format!("<Nope {}/>", xmlns()), &schema, &settings);
        assert!(matches!(unknown_type, Err(Error::UnknownType { .. })));
        let unknown_member = read_nodes(&format!(r#"<BigContainer Nope="1" {}/>"#, xmlns()), &schema, &settings);
        assert!(matches!(unknown_member, Err(Error::UnknownMember { .. })));
        let unknown_prefix = read_nodes(&format!("<q:BigContainer {}/>", xmlns()), &schema, &settings);
        assert!(matches!(unknown_prefix, Err(Error::UnknownPrefix(p)) if p == "q"));
    }

    #[test]
    fn test_content_property_receives_children() {
        let text = format!("<BigContainer {}><MediumContainer Value=\"1\"/></BigContainer>", xmlns());
        let list = read(&text);
        let first_member = list.iter().find_map(XamlNode::member).unwrap();
        assert_eq!(first_member.name(), "Content");
    }
}
