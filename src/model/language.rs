//! XAML language vocabulary: namespaces, directives and intrinsic types.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use super::member::{MemberRef, XamlMember};

pub const XAML_NAMESPACE: &str = "http://schemas.microsoft.com/winfx/2006/xaml";
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Reserved members understood by the writer itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Directive {
    Arguments,
    FactoryMethod,
    Key,
    Name,
    TypeArguments,
    Uid,
    /// Implicit collection/dictionary content.
    Items,
    /// Implicit text initialization (`<x:Int32>5</x:Int32>`).
    Initialization,
    /// Positional arguments of a markup extension.
    PositionalParameters,
}

const ALL_DIRECTIVES: [Directive; 9] = [
    Directive::Arguments,
    Directive::FactoryMethod,
    Directive::Key,
    Directive::Name,
    Directive::TypeArguments,
    Directive::Uid,
    Directive::Items,
    Directive::Initialization,
    Directive::PositionalParameters,
];

static DIRECTIVE_MEMBERS: LazyLock<Vec<MemberRef>> = LazyLock::new(|| {
    ALL_DIRECTIVES
        .iter()
        .map(|d| MemberRef::new(XamlMember::directive(*d)))
        .collect()
});

impl Directive {
    pub fn name(self) -> &'static str {
        match self {
            Directive::Arguments => "Arguments",
            Directive::FactoryMethod => "FactoryMethod",
            Directive::Key => "Key",
            Directive::Name => "Name",
            Directive::TypeArguments => "TypeArguments",
            Directive::Uid => "Uid",
            Directive::Items => "_Items",
            Directive::Initialization => "_Initialization",
            Directive::PositionalParameters => "_PositionalParameters",
        }
    }

    /// Directive spelled in markup under the XAML namespace (`x:Key`).
    pub fn from_markup_name(name: &str) -> Option<Self> {
        ALL_DIRECTIVES
            .iter()
            .copied()
            .filter(|d| !d.is_implicit())
            .find(|d| d.name() == name)
    }

    /// Implicit directives never appear literally in markup.
    pub fn is_implicit(self) -> bool {
        matches!(
            self,
            Directive::Items | Directive::Initialization | Directive::PositionalParameters
        )
    }

    /// The process-wide member handle for this directive.
    pub fn member(self) -> MemberRef {
        let index = ALL_DIRECTIVES.iter().position(|d| *d == self).unwrap_or(0);
        DIRECTIVE_MEMBERS[index].clone()
    }
}

/// Built-in types of the XAML namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intrinsic {
    String,
    Int32,
    Double,
    Boolean,
    Object,
    Null,
    Reference,
    Type,
}

impl Intrinsic {
    pub const ALL: [Intrinsic; 8] = [
        Intrinsic::String,
        Intrinsic::Int32,
        Intrinsic::Double,
        Intrinsic::Boolean,
        Intrinsic::Object,
        Intrinsic::Null,
        Intrinsic::Reference,
        Intrinsic::Type,
    ];

    /// Type name inside the XAML namespace.
    pub fn type_name(self) -> &'static str {
        match self {
            Intrinsic::String => "String",
            Intrinsic::Int32 => "Int32",
            Intrinsic::Double => "Double",
            Intrinsic::Boolean => "Boolean",
            Intrinsic::Object => "Object",
            Intrinsic::Null => "NullExtension",
            Intrinsic::Reference => "ReferenceExtension",
            Intrinsic::Type => "TypeExtension",
        }
    }

    pub fn is_markup_extension(self) -> bool {
        matches!(self, Intrinsic::Null | Intrinsic::Reference | Intrinsic::Type)
    }

    /// Member holding the single positional argument, if any.
    pub fn argument_member(self) -> Option<&'static str> {
        match self {
            Intrinsic::Reference => Some("Name"),
            Intrinsic::Type => Some("TypeName"),
            _ => None,
        }
    }
}
