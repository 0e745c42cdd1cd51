//! Universal value type flowing through the object writer.

use std::fmt;

use hashbrown::HashSet;

use super::object::ObjectRef;
use super::types::TypeRef;

/// A value produced by loading markup, or handed to the serializer.
///
/// Covers:
/// - Scalars: Bool, Int, Float, String
/// - Type values produced by `{x:Type}`
/// - Objects: shared, interior-mutable instances (`ObjectRef`)
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Type(TypeRef),
    Object(ObjectRef),
}

// ============================================================================
// Type checking
// ============================================================================

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Boolean",
            Value::Int(_) => "Int32",
            Value::Float(_) => "Double",
            Value::String(_) => "String",
            Value::Type(_) => "Type",
            Value::Object(_) => "Object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&TypeRef> {
        match self {
            Value::Type(t) => Some(t),
            _ => None,
        }
    }

    /// Observable structural equality.
    ///
    /// Objects are equal when their types are the same handle and their
    /// members, items and entries are pairwise `deep_eq`. Cycles are
    /// handled by assuming equality for object pairs already under
    /// comparison.
    pub fn deep_eq(&self, other: &Value) -> bool {
        let mut visiting = HashSet::new();
        deep_eq_inner(self, other, &mut visiting)
    }
}

fn deep_eq_inner(a: &Value, b: &Value, visiting: &mut HashSet<(usize, usize)>) -> bool {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => {
            if x.ptr_eq(y) || !visiting.insert((x.id(), y.id())) {
                return true;
            }
            if x.ty() != y.ty() {
                return false;
            }
            let (xm, ym) = (x.members(), y.members());
            if xm.len() != ym.len() {
                return false;
            }
            for (member, value) in &xm {
                match y.get_member(member) {
                    Some(other) if deep_eq_inner(value, &other, visiting) => {}
                    _ => return false,
                }
            }
            let (xi, yi) = (x.items(), y.items());
            if xi.len() != yi.len()
                || !xi.iter().zip(&yi).all(|(p, q)| deep_eq_inner(p, q, visiting))
            {
                return false;
            }
            let (xe, ye) = (x.entries(), y.entries());
            xe.len() == ye.len()
                && xe.iter().zip(&ye).all(|((k1, v1), (k2, v2))| {
                    deep_eq_inner(k1, k2, visiting) && deep_eq_inner(v1, v2, visiting)
                })
        }
        _ => a == b,
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<bool> for Value {
    fn from(v: bool) -> Self { Value::Bool(v) }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self { Value::Int(v as i64) }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self { Value::Int(v) }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self { Value::Float(v) }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self { Value::String(v.to_string()) }
}

impl From<String> for Value {
    fn from(v: String) -> Self { Value::String(v) }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self { Value::Object(v) }
}

impl From<TypeRef> for Value {
    fn from(v: TypeRef) -> Self { Value::Type(v) }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => f.write_str(s),
            Value::Type(t) => write!(f, "{t}"),
            Value::Object(o) => write!(f, "{}", o.ty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MemberRef, TypeName, XamlMember, XamlType};

    fn ty(name: &str) -> TypeRef {
        TypeRef::new(XamlType::new("urn:test", name))
    }

    #[test]
    fn test_scalar_equality() {
        assert_eq!(Value::from(3), Value::Int(3));
        assert_ne!(Value::from("3"), Value::Int(3));
        assert!(Value::Float(1.5).deep_eq(&Value::Float(1.5)));
    }

    #[test]
    fn test_object_equality_is_identity_but_deep_eq_is_structural() {
        let t = ty("Point");
        let x = MemberRef::new(XamlMember::property(TypeName::new("urn:test", "Point"), "X"));
        let a = ObjectRef::new(t.clone());
        let b = ObjectRef::new(t);
        a.set(&x, Value::Int(1));
        b.set(&x, Value::Int(1));
        let (va, vb) = (Value::Object(a), Value::Object(b.clone()));
        assert_ne!(va, vb);
        assert!(va.deep_eq(&vb));
        b.set(&x, Value::Int(2));
        assert!(!va.deep_eq(&vb));
    }

    #[test]
    fn test_deep_eq_handles_cycles() {
        let t = ty("Node");
        let next = MemberRef::new(XamlMember::property(TypeName::new("urn:test", "Node"), "Next"));
        let a = ObjectRef::new(t.clone());
        a.set(&next, Value::Object(a.clone()));
        let b = ObjectRef::new(t);
        b.set(&next, Value::Object(b.clone()));
        assert!(Value::Object(a).deep_eq(&Value::Object(b)));
    }

    #[test]
    fn test_display_booleans_use_xaml_casing() {
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::Float(42.5).to_string(), "42.5");
    }
}
