//! Dynamic object instances.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::member::MemberRef;
use super::types::TypeRef;
use super::value::Value;
use crate::{Error, Result};

/// State of one dynamic instance.
#[derive(Debug, Clone)]
struct Object {
    ty: TypeRef,
    members: Vec<(MemberRef, Value)>,
    items: Vec<Value>,
    entries: Vec<(Value, Value)>,
}

impl Object {
    fn new(ty: TypeRef) -> Self {
        Self { ty, members: Vec::new(), items: Vec::new(), entries: Vec::new() }
    }
}

/// Shared handle to a dynamic object instance.
///
/// Clones alias the same instance; `==` is identity. Use
/// [`Value::deep_eq`] for structural comparison.
#[derive(Clone)]
pub struct ObjectRef(Arc<RwLock<Object>>);

impl ObjectRef {
    pub fn new(ty: TypeRef) -> Self {
        Self(Arc::new(RwLock::new(Object::new(ty))))
    }

    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn ty(&self) -> TypeRef {
        self.0.read().ty.clone()
    }

    // ========================================================================
    // Members
    // ========================================================================

    /// Set (or replace) a member value. Members keep first-set order.
    pub fn set(&self, member: &MemberRef, value: Value) {
        let mut obj = self.0.write();
        match obj.members.iter_mut().find(|(m, _)| m == member) {
            Some(slot) => slot.1 = value,
            None => obj.members.push((member.clone(), value)),
        }
    }

    pub fn get_member(&self, member: &MemberRef) -> Option<Value> {
        self.0
            .read()
            .members
            .iter()
            .find(|(m, _)| m == member)
            .map(|(_, v)| v.clone())
    }

    /// Lookup by markup name (`Width`, `Grid.Row`).
    pub fn get(&self, name: &str) -> Option<Value> {
        self.0
            .read()
            .members
            .iter()
            .find(|(m, _)| m.name() == name || m.qualified_name() == name)
            .map(|(_, v)| v.clone())
    }

    pub fn members(&self) -> Vec<(MemberRef, Value)> {
        self.0.read().members.clone()
    }

    // ========================================================================
    // Collection / dictionary content
    // ========================================================================

    pub fn push_item(&self, item: Value) {
        self.0.write().items.push(item);
    }

    pub fn items(&self) -> Vec<Value> {
        self.0.read().items.clone()
    }

    /// Insert a dictionary entry. Keys are unique.
    pub fn insert_entry(&self, key: Value, value: Value) -> Result<()> {
        let mut obj = self.0.write();
        if obj.entries.iter().any(|(k, _)| *k == key) {
            return Err(Error::Provider(format!(
                "key '{key}' is already present in {}",
                obj.ty
            )));
        }
        obj.entries.push((key, value));
        Ok(())
    }

    pub fn entry(&self, key: &Value) -> Option<Value> {
        self.0
            .read()
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.0.read().entries.clone()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObjectRef {
    // Only the shallow shape: graphs may be cyclic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let obj = self.0.read();
        let names: Vec<String> = obj.members.iter().map(|(m, _)| m.qualified_name()).collect();
        f.debug_struct("ObjectRef")
            .field("ty", &obj.ty.to_string())
            .field("members", &names)
            .field("items", &obj.items.len())
            .field("entries", &obj.entries.len())
            .finish()
    }
}
