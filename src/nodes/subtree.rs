//! Skip and subtree extraction over any [`XamlReader`].

use crate::{Error, Result};
use super::{XamlNode, XamlReader};

/// Advance past the current node and its balanced range.
///
/// Only a depth counter is kept; nothing is buffered.
pub fn skip<R: XamlReader + ?Sized>(reader: &mut R) -> Result<()> {
    let opens = reader.current().is_some_and(XamlNode::is_start);
    if opens {
        let mut depth = 0isize;
        loop {
            depth += reader.current().map_or(0, XamlNode::depth_delta);
            if depth == 0 {
                break;
            }
            if !reader.read()? {
                return Err(Error::InvalidNodeSequence("unbalanced range while skipping".into()));
            }
        }
    }
    reader.read()?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initial,
    Reading,
    Done,
}

/// Reader over one balanced range of a parent reader.
///
/// Holds the parent's cursor exclusively until dropped. The first
/// [`read`](XamlReader::read) yields the parent's current node; the last
/// yields the matching end node, after which the parent is left positioned
/// on that end node.
pub struct SubtreeReader<'r, R: XamlReader + ?Sized> {
    inner: &'r mut R,
    depth: isize,
    state: State,
}

impl<'r, R: XamlReader + ?Sized> SubtreeReader<'r, R> {
    pub fn new(inner: &'r mut R) -> Self {
        Self { inner, depth: 0, state: State::Initial }
    }
}

impl<R: XamlReader + ?Sized> XamlReader for SubtreeReader<'_, R> {
    fn read(&mut self) -> Result<bool> {
        match self.state {
            State::Done => Ok(false),
            State::Initial => match self.inner.current() {
                Some(node) => {
                    self.depth = node.depth_delta().max(0);
                    self.state = State::Reading;
                    Ok(true)
                }
                None => {
                    self.state = State::Done;
                    Ok(false)
                }
            },
            State::Reading => {
                if self.depth == 0 {
                    self.state = State::Done;
                    return Ok(false);
                }
                if !self.inner.read()? {
                    self.state = State::Done;
                    return Err(Error::InvalidNodeSequence("subtree ended before its closing node".into()));
                }
                self.depth += self.inner.current().map_or(0, XamlNode::depth_delta);
                Ok(true)
            }
        }
    }

    fn current(&self) -> Option<&XamlNode> {
        match self.state {
            State::Reading => self.inner.current(),
            _ => None,
        }
    }

    fn is_eof(&self) -> bool {
        self.state == State::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Directive, MemberRef, TypeName, TypeRef, Value, XamlMember, XamlType};
    use crate::nodes::{NodeList, NodeType, XamlWriter};

    fn sample() -> NodeList {
        let outer = TypeRef::new(XamlType::new("urn:t", "Outer"));
        let inner = TypeRef::new(XamlType::new("urn:t", "Inner"));
        let child = MemberRef::new(XamlMember::property(TypeName::new("urn:t", "Outer"), "Child"));
        let tag = MemberRef::new(XamlMember::property(TypeName::new("urn:t", "Outer"), "Tag"));
        vec![
            XamlNode::StartObject(outer),                 // 0
            XamlNode::StartMember(child),                 // 1
            XamlNode::StartObject(inner),                 // 2
            XamlNode::StartMember(Directive::Initialization.member()), // 3
            XamlNode::Value(Value::from("x")),            // 4
            XamlNode::EndMember,                          // 5
            XamlNode::EndObject,                          // 6
            XamlNode::EndMember,                          // 7
            XamlNode::StartMember(tag),                   // 8
            XamlNode::Value(Value::from("t")),            // 9
            XamlNode::EndMember,                          // 10
            XamlNode::EndObject,                          // 11
        ]
        .into_iter()
        .collect()
    }

    fn read_to(reader: &mut impl XamlReader, index: usize) {
        for _ in 0..=index {
            assert!(reader.read().unwrap());
        }
    }

    #[test]
    fn test_skip_start_object_lands_after_end() {
        let list = sample();
        let mut r = list.reader();
        read_to(&mut r, 2);
        r.skip().unwrap();
        assert_eq!(r.index(), Some(7));
        assert_eq!(r.node_type(), NodeType::EndMember);
    }

    #[test]
    fn test_skip_initialization_member_lands_on_end_object() {
        let list = sample();
        let mut r = list.reader();
        read_to(&mut r, 3);
        r.skip().unwrap();
        assert_eq!(r.node_type(), NodeType::EndObject);
    }

    #[test]
    fn test_skip_non_start_node_reads_one() {
        let list = sample();
        let mut r = list.reader();
        read_to(&mut r, 4);
        r.skip().unwrap();
        assert_eq!(r.index(), Some(5));
    }

    #[test]
    fn test_subtree_yields_balanced_range_and_parks_on_end() {
        let list = sample();
        let mut r = list.reader();
        read_to(&mut r, 1);
        let mut captured = NodeList::new();
        {
            let mut sub = r.read_subtree();
            while sub.read().unwrap() {
                captured.write_node(sub.current().unwrap().clone()).unwrap();
            }
            assert!(sub.is_eof());
            assert!(!sub.read().unwrap());
        }
        assert_eq!(captured, list.extract(1).unwrap());
        assert_eq!(r.index(), Some(7));
        assert!(r.read().unwrap());
        assert_eq!(r.index(), Some(8));
    }

    #[test]
    fn test_subtree_of_value_is_single_node() {
        let list = sample();
        let mut r = list.reader();
        read_to(&mut r, 9);
        let mut sub = r.read_subtree();
        assert!(sub.read().unwrap());
        assert_eq!(sub.node_type(), NodeType::Value);
        assert!(!sub.read().unwrap());
        drop(sub);
        assert_eq!(r.index(), Some(9));
    }

    #[test]
    fn test_skip_and_subtree_agree_everywhere() {
        let list = sample();
        for start in 0..list.len() {
            let mut a = list.reader();
            read_to(&mut a, start);
            a.skip().unwrap();

            let mut b = list.reader();
            read_to(&mut b, start);
            {
                let mut sub = b.read_subtree();
                while sub.read().unwrap() {}
            }
            b.read().unwrap();
            assert_eq!(a.index(), b.index(), "start {start}");
        }
    }

    #[test]
    fn test_bookmark_restart() {
        let list = sample();
        let mut r = list.reader();
        read_to(&mut r, 2);
        let mark = r.bookmark();
        r.skip().unwrap();
        r.seek(mark).unwrap();
        assert_eq!(r.index(), Some(2));
        assert_eq!(r.node_type(), NodeType::StartObject);
    }

    #[test]
    fn test_matching_end_and_unbalanced() {
        let list = sample();
        assert_eq!(list.matching_end(0).unwrap(), 11);
        assert_eq!(list.matching_end(8).unwrap(), 10);
        assert_eq!(list.matching_end(4).unwrap(), 4);
        let truncated: NodeList = list.nodes()[..5].iter().cloned().collect();
        assert!(truncated.matching_end(0).is_err());
    }
}
