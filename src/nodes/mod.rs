//! # Structural Nodes
//!
//! The canonical node vocabulary every stage speaks:
//!
//! | Node | Meaning |
//! |------|---------|
//! | `NamespaceDeclaration` | prefix ↔ URI binding for the next object |
//! | `StartObject(type)` | begin constructing a new instance |
//! | `GetObject` | begin working on the current member's existing value |
//! | `EndObject` | finish the innermost object |
//! | `StartMember(member)` / `EndMember` | member (or directive) bracket |
//! | `Value(v)` | atomic payload inside a member |
//!
//! A balanced range starting at `StartObject`/`GetObject`/`StartMember` and
//! ending at its matching end node is itself a valid, replayable stream.

pub mod list;
pub mod subtree;

use serde::{Deserialize, Serialize};

use crate::model::{MemberRef, TypeRef, Value};
use crate::Result;

pub use list::{Bookmark, NodeList, NodeListReader, NodeListWriter};
pub use subtree::SubtreeReader;

// ============================================================================
// Node vocabulary
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespaceDeclaration {
    pub prefix: String,
    pub namespace: String,
}

impl NamespaceDeclaration {
    pub fn new(prefix: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), namespace: namespace.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum XamlNode {
    NamespaceDeclaration(NamespaceDeclaration),
    StartObject(TypeRef),
    GetObject,
    EndObject,
    StartMember(MemberRef),
    EndMember,
    Value(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    None,
    NamespaceDeclaration,
    StartObject,
    GetObject,
    EndObject,
    StartMember,
    EndMember,
    Value,
}

impl XamlNode {
    pub fn node_type(&self) -> NodeType {
        match self {
            XamlNode::NamespaceDeclaration(_) => NodeType::NamespaceDeclaration,
            XamlNode::StartObject(_) => NodeType::StartObject,
            XamlNode::GetObject => NodeType::GetObject,
            XamlNode::EndObject => NodeType::EndObject,
            XamlNode::StartMember(_) => NodeType::StartMember,
            XamlNode::EndMember => NodeType::EndMember,
            XamlNode::Value(_) => NodeType::Value,
        }
    }

    /// Opens a balanced range.
    pub fn is_start(&self) -> bool {
        matches!(self, XamlNode::StartObject(_) | XamlNode::GetObject | XamlNode::StartMember(_))
    }

    /// Closes a balanced range.
    pub fn is_end(&self) -> bool {
        matches!(self, XamlNode::EndObject | XamlNode::EndMember)
    }

    /// Change in nesting depth caused by this node.
    pub fn depth_delta(&self) -> isize {
        if self.is_start() {
            1
        } else if self.is_end() {
            -1
        } else {
            0
        }
    }

    pub fn object_type(&self) -> Option<&TypeRef> {
        match self {
            XamlNode::StartObject(t) => Some(t),
            _ => None,
        }
    }

    pub fn member(&self) -> Option<&MemberRef> {
        match self {
            XamlNode::StartMember(m) => Some(m),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            XamlNode::Value(v) => Some(v),
            _ => None,
        }
    }
}

// ============================================================================
// Reader / writer seams
// ============================================================================

/// Pull-based node source.
///
/// A fresh reader is positioned before the first node; each successful
/// [`read`](XamlReader::read) moves to the next node.
pub trait XamlReader {
    /// Advance to the next node. Returns `false` at end of stream.
    fn read(&mut self) -> Result<bool>;

    /// Node under the cursor, `None` before the first read or at end.
    fn current(&self) -> Option<&XamlNode>;

    fn is_eof(&self) -> bool;

    fn node_type(&self) -> NodeType {
        self.current().map_or(NodeType::None, XamlNode::node_type)
    }

    /// Advance past the current node and, for start nodes, its whole
    /// balanced range. Lands on the node following the range.
    fn skip(&mut self) -> Result<()> {
        subtree::skip(self)
    }

    /// Isolated reader over the current balanced range.
    ///
    /// The returned reader borrows this one exclusively; once it is
    /// exhausted this reader sits on the range's closing node.
    fn read_subtree(&mut self) -> SubtreeReader<'_, Self>
    where
        Self: Sized,
    {
        SubtreeReader::new(self)
    }
}

/// Push-based node sink.
pub trait XamlWriter {
    fn write_node(&mut self, node: XamlNode) -> Result<()>;

    /// Signal end of input. Writers may validate completeness here.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<R: XamlReader + ?Sized> XamlReader for &mut R {
    fn read(&mut self) -> Result<bool> { (**self).read() }
    fn current(&self) -> Option<&XamlNode> { (**self).current() }
    fn is_eof(&self) -> bool { (**self).is_eof() }
    fn skip(&mut self) -> Result<()> { (**self).skip() }
}

impl<W: XamlWriter + ?Sized> XamlWriter for &mut W {
    fn write_node(&mut self, node: XamlNode) -> Result<()> { (**self).write_node(node) }
    fn close(&mut self) -> Result<()> { (**self).close() }
}

/// Pump every remaining node of `reader` into `writer`.
///
/// Does not call [`XamlWriter::close`], so several readers can feed one
/// writer.
pub fn pump<R, W>(reader: &mut R, writer: &mut W) -> Result<usize>
where
    R: XamlReader + ?Sized,
    W: XamlWriter + ?Sized,
{
    let mut count = 0;
    while reader.read()? {
        if let Some(node) = reader.current() {
            writer.write_node(node.clone())?;
            count += 1;
        }
    }
    Ok(count)
}

/// Pump a whole document and close the writer.
pub fn transform<R, W>(reader: &mut R, writer: &mut W) -> Result<()>
where
    R: XamlReader + ?Sized,
    W: XamlWriter + ?Sized,
{
    let count = pump(reader, writer)?;
    tracing::debug!(nodes = count, "transform complete");
    writer.close()
}
