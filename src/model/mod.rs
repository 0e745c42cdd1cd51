//! # Object Model
//!
//! Clean DTOs shared by every stage of the pipeline.
//! These types cross every boundary: reader ↔ node stream ↔ writer ↔ schema.
//!
//! Design rule: handles (`TypeRef`, `MemberRef`) compare by identity, never
//! by name. A schema provider hands out one handle per resolved name.
//! This module is pure data: no I/O, no parsing.

pub mod language;
pub mod member;
pub mod object;
pub mod types;
pub mod value;

pub use language::{Directive, Intrinsic, XAML_NAMESPACE, XML_NAMESPACE};
pub use member::{MemberKind, MemberRef, ValueKind, XamlMember};
pub use object::ObjectRef;
pub use types::{TypeKind, TypeName, TypeRef, TypeSlot, XamlType};
pub use value::Value;
