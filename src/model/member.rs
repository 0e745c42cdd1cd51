//! Member handles: properties, attached properties and directives.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::language::Directive;
use super::types::TypeName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Property,
    /// Attached member declared on another type (`Owner.Member`).
    Attachable,
    Directive(Directive),
}

/// What kind of value a member holds. Collection and dictionary members
/// receive items through add semantics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValueKind {
    #[default]
    Scalar,
    Collection,
    Dictionary,
}

#[derive(Debug, Clone)]
pub struct XamlMember {
    name: String,
    declaring_type: Option<TypeName>,
    value_type: Option<TypeName>,
    value_kind: ValueKind,
    kind: MemberKind,
}

impl XamlMember {
    pub fn property(declaring_type: TypeName, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaring_type: Some(declaring_type),
            value_type: None,
            value_kind: ValueKind::Scalar,
            kind: MemberKind::Property,
        }
    }

    pub fn attachable(declaring_type: TypeName, name: impl Into<String>) -> Self {
        Self { kind: MemberKind::Attachable, ..Self::property(declaring_type, name) }
    }

    pub fn directive(directive: Directive) -> Self {
        Self {
            name: directive.name().to_string(),
            declaring_type: None,
            value_type: None,
            value_kind: match directive {
                Directive::Items => ValueKind::Collection,
                _ => ValueKind::Scalar,
            },
            kind: MemberKind::Directive(directive),
        }
    }

    pub fn with_value_type(mut self, value_type: Option<TypeName>, value_kind: ValueKind) -> Self {
        self.value_type = value_type;
        self.value_kind = value_kind;
        self
    }
}

/// Identity-compared handle to a [`XamlMember`].
#[derive(Clone)]
pub struct MemberRef(Arc<XamlMember>);

impl MemberRef {
    pub fn new(member: XamlMember) -> Self {
        Self(Arc::new(member))
    }

    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub fn name(&self) -> &str { &self.0.name }
    pub fn declaring_type(&self) -> Option<&TypeName> { self.0.declaring_type.as_ref() }
    pub fn value_type(&self) -> Option<&TypeName> { self.0.value_type.as_ref() }
    pub fn value_kind(&self) -> ValueKind { self.0.value_kind }
    pub fn kind(&self) -> MemberKind { self.0.kind }

    pub fn directive(&self) -> Option<Directive> {
        match self.0.kind {
            MemberKind::Directive(d) => Some(d),
            _ => None,
        }
    }

    pub fn is_directive(&self) -> bool {
        self.directive().is_some()
    }

    pub fn is_attachable(&self) -> bool {
        self.0.kind == MemberKind::Attachable
    }

    /// True for ordinary (non-directive) members whose value is a collection
    /// or dictionary.
    pub fn is_collection_valued(&self) -> bool {
        !self.is_directive() && self.0.value_kind != ValueKind::Scalar
    }

    /// Name as written in markup: `Member`, `Owner.Member` or `x:Key`.
    pub fn qualified_name(&self) -> String {
        match (&self.0.kind, &self.0.declaring_type) {
            (MemberKind::Attachable, Some(owner)) => format!("{}.{}", owner.name, self.0.name),
            (MemberKind::Directive(_), _) => format!("x:{}", self.0.name),
            _ => self.0.name.clone(),
        }
    }
}

impl PartialEq for MemberRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for MemberRef {}

impl Hash for MemberRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

impl fmt::Debug for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemberRef({})", self.qualified_name())
    }
}
