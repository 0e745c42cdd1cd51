//! Buffered node list with an index cursor.

use std::borrow::Cow;

use crate::{Error, Result};
use super::{XamlNode, XamlReader, XamlWriter};

/// Captured cursor position of a [`NodeListReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bookmark(usize);

/// An ordered, immutable-once-written sequence of nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeList {
    nodes: Vec<XamlNode>,
}

impl NodeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain a reader into a new list.
    pub fn from_reader<R: XamlReader + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut list = Self::new();
        super::pump(reader, &mut list.writer())?;
        Ok(list)
    }

    pub fn push(&mut self, node: XamlNode) {
        self.nodes.push(node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[XamlNode] {
        &self.nodes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, XamlNode> {
        self.nodes.iter()
    }

    pub fn reader(&self) -> NodeListReader<'_> {
        NodeListReader::new(Cow::Borrowed(&self.nodes))
    }

    pub fn into_reader(self) -> NodeListReader<'static> {
        NodeListReader::new(Cow::Owned(self.nodes))
    }

    pub fn writer(&mut self) -> NodeListWriter<'_> {
        NodeListWriter { list: self }
    }

    /// Index of the node closing the balanced range that opens at `start`.
    /// For a node that opens no range this is `start` itself.
    pub fn matching_end(&self, start: usize) -> Result<usize> {
        let first = self
            .nodes
            .get(start)
            .ok_or_else(|| Error::InvalidNodeSequence(format!("no node at index {start}")))?;
        if !first.is_start() {
            return Ok(start);
        }
        let mut depth = 0isize;
        for (i, node) in self.nodes.iter().enumerate().skip(start) {
            depth += node.depth_delta();
            if depth == 0 {
                return Ok(i);
            }
        }
        Err(Error::InvalidNodeSequence(format!("unbalanced range starting at index {start}")))
    }

    /// Copy of the balanced range starting at `start`.
    pub fn extract(&self, start: usize) -> Result<NodeList> {
        let end = self.matching_end(start)?;
        Ok(NodeList { nodes: self.nodes[start..=end].to_vec() })
    }
}

impl FromIterator<XamlNode> for NodeList {
    fn from_iter<I: IntoIterator<Item = XamlNode>>(iter: I) -> Self {
        Self { nodes: iter.into_iter().collect() }
    }
}

impl<'a> IntoIterator for &'a NodeList {
    type Item = &'a XamlNode;
    type IntoIter = std::slice::Iter<'a, XamlNode>;
    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Forward-only cursor over a node slice, restartable from a [`Bookmark`].
#[derive(Debug, Clone)]
pub struct NodeListReader<'a> {
    nodes: Cow<'a, [XamlNode]>,
    /// Number of reads performed; the current node is `nodes[next - 1]`.
    next: usize,
}

impl<'a> NodeListReader<'a> {
    pub fn new(nodes: Cow<'a, [XamlNode]>) -> Self {
        Self { nodes, next: 0 }
    }

    pub fn bookmark(&self) -> Bookmark {
        Bookmark(self.next)
    }

    pub fn seek(&mut self, bookmark: Bookmark) -> Result<()> {
        if bookmark.0 > self.nodes.len() + 1 {
            return Err(Error::InvalidNodeSequence(format!(
                "bookmark {} out of range for {} nodes",
                bookmark.0,
                self.nodes.len()
            )));
        }
        self.next = bookmark.0;
        Ok(())
    }

    /// Index of the current node in the underlying list.
    pub fn index(&self) -> Option<usize> {
        (self.next > 0 && self.next <= self.nodes.len()).then(|| self.next - 1)
    }

    pub fn remaining(&self) -> &[XamlNode] {
        &self.nodes[self.next.min(self.nodes.len())..]
    }
}

impl XamlReader for NodeListReader<'_> {
    fn read(&mut self) -> Result<bool> {
        if self.next <= self.nodes.len() {
            self.next += 1;
        }
        Ok(self.next <= self.nodes.len())
    }

    fn current(&self) -> Option<&XamlNode> {
        self.index().map(|i| &self.nodes[i])
    }

    fn is_eof(&self) -> bool {
        self.next > self.nodes.len()
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Appends written nodes to a [`NodeList`].
pub struct NodeListWriter<'a> {
    list: &'a mut NodeList,
}

impl XamlWriter for NodeListWriter<'_> {
    fn write_node(&mut self, node: XamlNode) -> Result<()> {
        self.list.push(node);
        Ok(())
    }
}

impl XamlWriter for NodeList {
    fn write_node(&mut self, node: XamlNode) -> Result<()> {
        self.push(node);
        Ok(())
    }
}
