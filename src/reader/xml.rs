//! Element tree built from quick-xml events.
//!
//! The reader needs two passes over an element's attributes (namespace
//! declarations first, then everything else), so the document is parsed
//! into a small owned tree before any node is emitted.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::{BytesStart, Event};

use crate::{Error, Result};

/// `prefix:local`, prefix empty when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawName {
    pub prefix: String,
    pub local: String,
}

impl RawName {
    fn parse(qname: &str) -> Self {
        match qname.split_once(':') {
            Some((prefix, local)) => Self { prefix: prefix.to_string(), local: local.to_string() },
            None => Self { prefix: String::new(), local: qname.to_string() },
        }
    }

    pub fn is_xmlns(&self) -> bool {
        self.prefix == "xmlns" || (self.prefix.is_empty() && self.local == "xmlns")
    }

    /// Prefix bound by an `xmlns` attribute.
    pub fn declared_prefix(&self) -> &str {
        if self.prefix == "xmlns" { &self.local } else { "" }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RawAttribute {
    pub name: RawName,
    pub value: String,
    /// Byte offset of the first character of the value.
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub name: RawName,
    pub attributes: Vec<RawAttribute>,
    pub children: Vec<Content>,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub(crate) enum Content {
    Element(Element),
    Text { text: String, offset: usize },
}

impl Content {
    pub fn offset(&self) -> usize {
        match self {
            Content::Element(e) => e.offset,
            Content::Text { offset, .. } => *offset,
        }
    }

    /// Element, or text with something besides whitespace.
    pub fn is_significant(&self) -> bool {
        match self {
            Content::Element(_) => true,
            Content::Text { text, .. } => !text.trim().is_empty(),
        }
    }
}

impl Element {
    pub fn attribute(&self, prefix: &str, local: &str) -> Option<&RawAttribute> {
        self.attributes
            .iter()
            .find(|a| a.name.prefix == prefix && a.name.local == local)
    }

    pub fn has_element_children(&self) -> bool {
        self.children.iter().any(|c| matches!(c, Content::Element(_)))
    }
}

fn syntax_error(position: u64, message: impl ToString) -> Error {
    Error::SyntaxError { position: position as usize, message: message.to_string() }
}

/// Parse `input` into its root element.
pub(crate) fn parse_document(input: &str) -> Result<Element> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut buf = Vec::new();

    loop {
        let start = reader.buffer_position();
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| syntax_error(reader.error_position(), e))?;
        let end = reader.buffer_position();
        match event {
            Event::Start(e) => {
                let element = element_from(&e, input, start, end)?;
                stack.push(element);
            }
            Event::Empty(e) => {
                let element = element_from(&e, input, start, end)?;
                attach(&mut stack, &mut root, element, start)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| syntax_error(start, "end tag without start tag"))?;
                attach(&mut stack, &mut root, element, start)?;
            }
            Event::Text(t) => {
                let text = t.decode().map_err(|e| syntax_error(start, e))?;
                push_text(&mut stack, &text, start)?;
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c).into_owned();
                push_text(&mut stack, &text, start)?;
            }
            Event::GeneralRef(r) => {
                let name = r.decode().map_err(|e| syntax_error(start, e))?;
                let text = resolve_reference(&name).ok_or_else(|| {
                    syntax_error(start, format!("unknown entity '&{name};'"))
                })?;
                push_text(&mut stack, &text, start)?;
            }
            Event::Eof => break,
            // comments, declarations, processing instructions, doctype
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(syntax_error(
            open.offset as u64,
            format!("element '{}' is not closed", open.name.local),
        ));
    }
    root.ok_or_else(|| syntax_error(0, "document has no root element"))
}

fn resolve_reference(name: &str) -> Option<Cow<'static, str>> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(|c| Cow::Owned(c.to_string()));
    }
    resolve_xml_entity(name).map(Cow::Borrowed)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element, at: u64) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(Content::Element(element));
        return Ok(());
    }
    if root.is_some() {
        return Err(syntax_error(at, "multiple root elements"));
    }
    *root = Some(element);
    Ok(())
}

fn push_text(stack: &mut [Element], text: &str, at: u64) -> Result<()> {
    let Some(parent) = stack.last_mut() else {
        if text.trim().is_empty() {
            return Ok(());
        }
        return Err(syntax_error(at, "text outside the root element"));
    };
    if let Some(Content::Text { text: prev, .. }) = parent.children.last_mut() {
        prev.push_str(text);
    } else {
        parent.children.push(Content::Text { text: text.to_string(), offset: at as usize });
    }
    Ok(())
}

fn element_from(e: &BytesStart<'_>, input: &str, start: u64, end: u64) -> Result<Element> {
    let tag = input.get(start as usize..end as usize).unwrap_or_default();
    let qname = String::from_utf8_lossy(e.name().as_ref()).into_owned();

    let mut attributes = Vec::new();
    // attributes come back in document order, so the raw text is walked once
    let mut cursor = 1 + qname.len();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| syntax_error(start, err))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| syntax_error(start, err))?
            .into_owned();
        let offset = match next_attribute(tag, cursor) {
            Some((name, value_start, next)) if name == key => {
                cursor = next;
                start as usize + value_start
            }
            _ => start as usize,
        };
        attributes.push(RawAttribute { name: RawName::parse(&key), value, offset });
    }

    Ok(Element {
        name: RawName::parse(&qname),
        attributes,
        children: Vec::new(),
        offset: start as usize,
    })
}

/// Scan the attribute starting at or after `from` in the raw tag text.
///
/// Returns its name, the offset just past the opening quote and the offset
/// just past the closing quote.
fn next_attribute(tag: &str, from: usize) -> Option<(&str, usize, usize)> {
    let rest = tag.get(from..)?;
    let name_start = from + (rest.len() - rest.trim_start().len());
    let rest = &tag[name_start..];
    let name_len = rest.find(|c: char| c == '=' || c.is_whitespace())?;
    let after = rest[name_len..].trim_start().strip_prefix('=')?.trim_start();
    let quote = after.chars().next().filter(|q| matches!(*q, '"' | '\''))?;
    let value_start = tag.len() - after.len() + 1;
    let close = tag[value_start..].find(quote)?;
    Some((&rest[..name_len], value_start, value_start + close + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_shape_and_offsets() {
        let input = r#"<A x:k="v" b='w'><B/>text<C></C></A>"#;
        let root = parse_document(input).unwrap();
        assert_eq!(root.name.local, "A");
        assert_eq!(root.attributes.len(), 2);
        assert_eq!(root.attributes[0].name.prefix, "x");
        assert_eq!(&input[root.attributes[0].offset..root.attributes[0].offset + 1], "v");
        assert_eq!(&input[root.attributes[1].offset..root.attributes[1].offset + 1], "w");
        assert_eq!(root.children.len(), 3);
        assert!(matches!(&root.children[1], Content::Text { text, .. } if text == "text"));
    }

    #[test]
    fn test_entities_merge_into_text() {
        let root = parse_document("<A>a &amp; b &#x41;</A>").unwrap();
        assert!(matches!(&root.children[..], [Content::Text { text, .. }] if text == "a & b A"));
    }

    #[test]
    fn test_xmlns_names() {
        assert!(RawName::parse("xmlns").is_xmlns());
        assert_eq!(RawName::parse("xmlns:x").declared_prefix(), "x");
        assert!(!RawName::parse("x:Key").is_xmlns());
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(parse_document("<A><B></A>"), Err(Error::SyntaxError { .. })));
        assert!(matches!(parse_document("<A/><B/>"), Err(Error::SyntaxError { .. })));
        assert!(matches!(parse_document(""), Err(Error::SyntaxError { .. })));
        assert!(matches!(parse_document("<A>"), Err(Error::SyntaxError { .. })));
    }

    #[test]
    fn test_offsets_ignore_lookalikes_inside_values() {
        let input = r#"<A a="x Text='y'"  Text = "{Bad" />"#;
        let root = parse_document(input).unwrap();
        assert_eq!(root.attributes[0].offset, input.find('x').unwrap());
        assert_eq!(root.attributes[1].offset, input.find('{').unwrap());
    }
}
