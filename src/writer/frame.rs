//! Per-object construction state.

use hashbrown::HashSet;
use smallvec::SmallVec;

use crate::model::{MemberRef, TypeRef, Value};

/// Construction progress of one frame.
///
/// ```text
/// Created ──Arguments/FactoryMethod──▶ CollectingArguments
///    │                                      │
///    └──────first member / EndObject────────┴──▶ Initializing ──▶ SettingMembers ──▶ Finished
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum FrameState {
    Created,
    CollectingArguments,
    Initializing,
    SettingMembers,
    Finished,
}

/// A value that may still be waiting on a forward `x:Reference`.
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    Ready(Value),
    Deferred(String),
}

/// Payload arriving inside a member: raw text from a `Value` node, a typed
/// value, or an unresolved reference.
#[derive(Debug, Clone)]
pub(crate) enum Incoming {
    Text(String),
    Value(Value),
    Deferred(String),
}

impl Incoming {
    pub fn from_node_value(value: Value) -> Self {
        match value {
            Value::String(text) => Incoming::Text(text),
            other => Incoming::Value(other),
        }
    }

    /// Raw text or value, without conversion.
    pub fn into_slot(self) -> Slot {
        match self {
            Incoming::Text(text) => Slot::Ready(Value::String(text)),
            Incoming::Value(value) => Slot::Ready(value),
            Incoming::Deferred(name) => Slot::Deferred(name),
        }
    }
}

#[derive(Debug)]
pub(crate) struct MemberFrame {
    pub member: MemberRef,
    pub value_set: bool,
}

#[derive(Debug)]
pub(crate) struct Frame {
    pub state: FrameState,
    pub ty: TypeRef,
    pub instance: Option<Value>,
    /// Opened by `GetObject`: the instance already lives in the parent.
    pub existing: bool,
    pub ctor_args: SmallVec<[Value; 4]>,
    pub factory_method: Option<String>,
    pub init_text: Option<String>,
    pub key: Option<Slot>,
    pub name: Option<String>,
    pub set_members: HashSet<MemberRef>,
    pub member: Option<MemberFrame>,
    pub namespaces: Vec<(String, String)>,
}

impl Frame {
    pub fn new(ty: TypeRef, namespaces: Vec<(String, String)>) -> Self {
        Self {
            state: FrameState::Created,
            ty,
            instance: None,
            existing: false,
            ctor_args: SmallVec::new(),
            factory_method: None,
            init_text: None,
            key: None,
            name: None,
            set_members: HashSet::new(),
            member: None,
            namespaces,
        }
    }

    pub fn existing(ty: TypeRef, instance: Value) -> Self {
        Self {
            state: FrameState::SettingMembers,
            instance: Some(instance),
            existing: true,
            ..Self::new(ty, Vec::new())
        }
    }

    pub fn is_created(&self) -> bool {
        self.instance.is_some()
    }

    pub fn type_name(&self) -> String {
        self.ty.full_name()
    }
}
