//! Type handles.
//!
//! A `TypeRef` is an opaque, cheaply cloneable handle handed out by a
//! [`SchemaProvider`](crate::schema::SchemaProvider). Two handles are equal
//! only when they point at the same underlying `XamlType`.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::access::AssemblyName;
use super::language::Intrinsic;

/// Namespace-qualified type name (no type arguments).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeName {
    pub namespace: String,
    pub name: String,
}

impl TypeName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), name: name.into() }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.name)
    }
}

/// Where a collection's item (or a dictionary's key/value) type comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeSlot {
    /// A concrete, non-generic type.
    Named(TypeName),
    /// The n-th type argument of the owning generic type.
    Argument(usize),
}

/// Structural kind of a type, as far as the writer cares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    #[default]
    Object,
    Collection { item: Option<TypeSlot> },
    Dictionary { key: Option<TypeSlot>, value: Option<TypeSlot> },
}

/// Resolved XAML type description.
#[derive(Debug, Clone)]
pub struct XamlType {
    name: String,
    namespace: String,
    assembly: Option<AssemblyName>,
    type_args: SmallVec<[TypeRef; 2]>,
    kind: TypeKind,
    intrinsic: Option<Intrinsic>,
    markup_extension: bool,
    nullable: bool,
    text_syntax: bool,
    content_property: Option<String>,
    requires_key_conversion: bool,
}

impl XamlType {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            assembly: None,
            type_args: SmallVec::new(),
            kind: TypeKind::Object,
            intrinsic: None,
            markup_extension: false,
            nullable: true,
            text_syntax: false,
            content_property: None,
            requires_key_conversion: false,
        }
    }

    pub fn with_assembly(mut self, assembly: Option<AssemblyName>) -> Self {
        self.assembly = assembly;
        self
    }

    pub fn with_type_args(mut self, args: impl IntoIterator<Item = TypeRef>) -> Self {
        self.type_args = args.into_iter().collect();
        self
    }

    pub fn with_kind(mut self, kind: TypeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_intrinsic(mut self, intrinsic: Option<Intrinsic>) -> Self {
        self.intrinsic = intrinsic;
        self
    }

    pub fn with_markup_extension(mut self, is_extension: bool) -> Self {
        self.markup_extension = is_extension;
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_text_syntax(mut self, text_syntax: bool) -> Self {
        self.text_syntax = text_syntax;
        self
    }

    pub fn with_content_property(mut self, name: Option<String>) -> Self {
        self.content_property = name;
        self
    }

    pub fn with_key_conversion(mut self, required: bool) -> Self {
        self.requires_key_conversion = required;
        self
    }
}

/// Identity-compared handle to a [`XamlType`].
#[derive(Clone)]
pub struct TypeRef(Arc<XamlType>);

impl TypeRef {
    pub fn new(ty: XamlType) -> Self {
        Self(Arc::new(ty))
    }

    /// Stable identity of the handle, valid while any clone is alive.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub fn name(&self) -> &str { &self.0.name }
    pub fn namespace(&self) -> &str { &self.0.namespace }
    pub fn assembly(&self) -> Option<&AssemblyName> { self.0.assembly.as_ref() }
    pub fn type_args(&self) -> &[TypeRef] { &self.0.type_args }
    pub fn kind(&self) -> &TypeKind { &self.0.kind }
    pub fn intrinsic(&self) -> Option<Intrinsic> { self.0.intrinsic }
    pub fn is_markup_extension(&self) -> bool { self.0.markup_extension }
    pub fn is_nullable(&self) -> bool { self.0.nullable }
    pub fn content_property(&self) -> Option<&str> { self.0.content_property.as_deref() }
    pub fn requires_key_conversion(&self) -> bool { self.0.requires_key_conversion }

    /// Whether text content can initialize an instance of this type.
    pub fn has_text_syntax(&self) -> bool { self.0.text_syntax }

    pub fn is_collection(&self) -> bool {
        matches!(self.0.kind, TypeKind::Collection { .. })
    }

    pub fn is_dictionary(&self) -> bool {
        matches!(self.0.kind, TypeKind::Dictionary { .. })
    }

    pub fn type_name(&self) -> TypeName {
        TypeName::new(self.namespace(), self.name())
    }

    /// Host-style full name, e.g. `Dictionary(String, Int32)`.
    pub fn full_name(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        if !self.type_args().is_empty() {
            f.write_str("(")?;
            for (i, arg) in self.type_args().iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{arg}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRef({{{}}}{})", self.namespace(), self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_equality() {
        let a = TypeRef::new(XamlType::new("urn:test", "Foo"));
        let b = TypeRef::new(XamlType::new("urn:test", "Foo"));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_generic_display() {
        let s = TypeRef::new(XamlType::new("urn:x", "String"));
        let i = TypeRef::new(XamlType::new("urn:x", "Int32"));
        let list = TypeRef::new(XamlType::new("urn:t", "List").with_type_args([i.clone()]));
        let dict = TypeRef::new(XamlType::new("urn:t", "Dictionary").with_type_args([s, list]));
        assert_eq!(dict.full_name(), "Dictionary(String, List(Int32))");
    }
}
