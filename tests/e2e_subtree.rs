//! Skip and subtree extraction over buffered documents.

mod common;

use common::xmlns;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use xaml_rs::nodes::pump;
use xaml_rs::{
    Loader, NodeList, NodeType, ObjectWriter, ObjectWriterSettings, Value, XamlNode, XamlReader, XamlWriter,
};

fn document() -> NodeList {
    let text = format!(
        r#"<Holder {}>
  <Holder.Extra>
    <BigContainer Integer="3" Text="{{Upper q}}">
      <BigContainer.MediumContainer>
        <MediumContainer Value="9" />
      </BigContainer.MediumContainer>
    </BigContainer>
  </Holder.Extra>
  <Holder.Values>
    <x:Double>1.5</x:Double>
    <x:Double>2</x:Double>
  </Holder.Values>
</Holder>"#,
        xmlns()
    );
    Loader::with_schema(common::schema()).read_nodes(&text).unwrap()
}

/// What a live read loop does when it reaches `Holder.Extra`.
#[derive(Debug, Clone, Copy)]
enum AtExtra {
    Skip,
    Discard,
    Build,
}

/// Pump the document into one writer, handling `Holder.Extra` per `mode`.
fn load_live(list: &NodeList, mode: AtExtra) -> Value {
    let schema = common::schema();
    let mut writer = ObjectWriter::new(&schema, ObjectWriterSettings::default());
    let mut reader = list.reader();
    let mut advance = true;
    loop {
        if advance && !reader.read().unwrap() {
            break;
        }
        advance = true;
        if reader.is_eof() {
            break;
        }
        let at_extra = reader.current().and_then(XamlNode::member).is_some_and(|m| m.name() == "Extra");
        if at_extra {
            match mode {
                AtExtra::Skip => {
                    // skip already sits on the following node
                    reader.skip().unwrap();
                    advance = false;
                }
                AtExtra::Discard => {
                    let mut sub = reader.read_subtree();
                    while sub.read().unwrap() {}
                }
                AtExtra::Build => {
                    pump(&mut reader.read_subtree(), &mut writer).unwrap();
                }
            }
            continue;
        }
        writer.write_node(reader.current().cloned().unwrap()).unwrap();
    }
    writer.close().unwrap();
    writer.into_result().unwrap()
}

fn position_at(list: &NodeList, index: usize) -> xaml_rs::NodeListReader<'_> {
    let mut reader = list.reader();
    for _ in 0..=index {
        assert!(reader.read().unwrap());
    }
    reader
}

proptest! {
    #[test]
    fn prop_subtree_matches_extract(index in 0usize..64) {
        let list = document();
        let index = index % list.len();
        let mut reader = position_at(&list, index);

        let mut seen = Vec::new();
        {
            let mut sub = reader.read_subtree();
            while sub.read().unwrap() {
                seen.push(sub.current().cloned().unwrap());
            }
        }
        let expected = list.extract(index).unwrap();
        prop_assert_eq!(seen.as_slice(), expected.nodes());
        prop_assert_eq!(reader.index(), Some(list.matching_end(index).unwrap()));
    }

    #[test]
    fn prop_skip_lands_after_range(index in 0usize..64) {
        let list = document();
        let index = index % list.len();
        let mut reader = position_at(&list, index);
        reader.skip().unwrap();

        let after = list.matching_end(index).unwrap() + 1;
        if after < list.len() {
            prop_assert_eq!(reader.index(), Some(after));
        } else {
            prop_assert!(reader.is_eof());
        }
    }
}

#[test]
fn test_subtree_loads_independently() {
    let list = document();
    let start = list
        .iter()
        .position(|n| n.object_type().is_some_and(|t| t.name() == "BigContainer"))
        .unwrap();
    let mut reader = position_at(&list, start);

    let loader = Loader::with_schema(common::schema());
    let value = loader.load_nodes(&mut reader.read_subtree()).unwrap();
    let big = value.as_object().unwrap();
    assert_eq!(big.get("Integer"), Some(Value::Int(3)));
    assert_eq!(big.get("Text"), Some(Value::from("Q")));
    let medium = big.get("MediumContainer").unwrap();
    assert_eq!(medium.as_object().unwrap().get("Value"), Some(Value::Int(9)));

    // the parent cursor continues with the rest of Holder.Extra
    assert!(reader.read().unwrap());
    assert_eq!(reader.node_type(), NodeType::EndMember);
}

#[test]
fn test_skip_value_node_moves_one() {
    let list = document();
    let index = list.iter().position(|n| matches!(n, XamlNode::Value(_))).unwrap();
    let mut reader = position_at(&list, index);
    reader.skip().unwrap();
    assert_eq!(reader.index(), Some(index + 1));
}

#[test]
fn test_build_subtree_into_same_writer() {
    let list = document();
    let direct = Loader::with_schema(common::schema()).load_nodes(&mut list.reader()).unwrap();
    let built = load_live(&list, AtExtra::Build);
    assert!(built.deep_eq(&direct));

    let extra = built.as_object().unwrap().get("Extra").unwrap();
    assert_eq!(extra.as_object().unwrap().get("Text"), Some(Value::from("Q")));
}

#[test]
fn test_skip_and_discard_leave_rest_intact() {
    let list = document();
    for mode in [AtExtra::Skip, AtExtra::Discard] {
        let root = load_live(&list, mode);
        let holder = root.as_object().unwrap();
        assert_eq!(holder.get("Extra"), None, "{mode:?}");
        let values = holder.get("Values").unwrap();
        assert_eq!(values.as_object().unwrap().items(), vec![Value::Float(1.5), Value::Float(2.0)], "{mode:?}");
    }

    let skipped = load_live(&list, AtExtra::Skip);
    assert!(skipped.deep_eq(&load_live(&list, AtExtra::Discard)));
}
