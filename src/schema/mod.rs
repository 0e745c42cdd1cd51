//! # Schema Provider Trait
//!
//! This is THE contract between the pipeline and any type system.
//! The reader asks it to resolve names; the writer asks it to construct,
//! convert, and mutate instances.
//!
//! ## Implementations
//!
//! | Provider | Module | Description |
//! |----------|--------|-------------|
//! | `MemorySchema` | `memory` | Types registered at runtime through `TypeDef` builders |

pub mod memory;

#[cfg(test)]
pub(crate) mod testing;

use crate::model::*;
use crate::{Error, Result};

pub use memory::{MemberDef, MemorySchema, TypeDef};

/// Split a `clr-namespace:NS;assembly=A` URI into its assembly part.
pub fn assembly_of_namespace(namespace: &str) -> Option<&str> {
    let rest = namespace.strip_prefix("clr-namespace:")?;
    rest.split(';')
        .filter_map(|part| part.trim().strip_prefix("assembly="))
        .map(str::trim)
        .find(|a| !a.is_empty())
}

fn object_of<'v>(instance: &'v Value, what: &str) -> Result<&'v ObjectRef> {
    instance.as_object().ok_or_else(|| {
        Error::Provider(format!("cannot {what} on a {} value", instance.type_name()))
    })
}

// ============================================================================
// The Trait
// ============================================================================

/// Type resolution, construction and mutation services.
///
/// Handles returned by the `resolve_*` methods must be cached: resolving the
/// same name twice yields `==` handles.
pub trait SchemaProvider {
    // ========================================================================
    // Resolution
    // ========================================================================

    /// Resolve a (possibly generic) type. The XAML language namespace must
    /// resolve every [`Intrinsic`] by its type name.
    fn resolve_type(&self, namespace: &str, name: &str, type_args: &[TypeRef]) -> Option<TypeRef>;

    fn resolve_member(&self, owner: &TypeRef, name: &str) -> Option<MemberRef>;

    fn resolve_attachable(&self, owner: &TypeRef, name: &str) -> Option<MemberRef>;

    /// Prefix to use when serializing types from `namespace`.
    fn preferred_prefix(&self, _namespace: &str) -> Option<String> {
        None
    }

    /// Element-name lookup: `name`, then `nameExtension`.
    fn resolve_element_type(&self, namespace: &str, name: &str, type_args: &[TypeRef]) -> Option<TypeRef> {
        self.resolve_type(namespace, name, type_args)
            .or_else(|| self.resolve_type(namespace, &format!("{name}Extension"), type_args))
    }

    /// Markup-extension lookup: `nameExtension`, then `name`.
    fn resolve_extension_type(&self, namespace: &str, name: &str) -> Option<TypeRef> {
        self.resolve_type(namespace, &format!("{name}Extension"), &[])
            .or_else(|| self.resolve_type(namespace, name, &[]))
    }

    fn intrinsic(&self, intrinsic: Intrinsic) -> Option<TypeRef> {
        self.resolve_type(XAML_NAMESPACE, intrinsic.type_name(), &[])
    }

    fn resolve_slot(&self, owner: &TypeRef, slot: &TypeSlot) -> Option<TypeRef> {
        match slot {
            TypeSlot::Named(name) => self.resolve_type(&name.namespace, &name.name, &[]),
            TypeSlot::Argument(i) => owner.type_args().get(*i).cloned(),
        }
    }

    /// Item type of a collection, or value type of a dictionary.
    fn item_type(&self, collection: &TypeRef) -> Option<TypeRef> {
        match collection.kind() {
            TypeKind::Collection { item: Some(slot) } => self.resolve_slot(collection, slot),
            TypeKind::Dictionary { value: Some(slot), .. } => self.resolve_slot(collection, slot),
            _ => None,
        }
    }

    fn key_type(&self, dictionary: &TypeRef) -> Option<TypeRef> {
        match dictionary.kind() {
            TypeKind::Dictionary { key: Some(slot), .. } => self.resolve_slot(dictionary, slot),
            _ => None,
        }
    }

    fn member_type(&self, member: &MemberRef) -> Option<TypeRef> {
        member
            .value_type()
            .and_then(|t| self.resolve_type(&t.namespace, &t.name, &[]))
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Construct an instance from ordered constructor arguments.
    /// No matching overload is `MissingMethod`, several are `AmbiguousMatch`.
    fn create_instance(&self, ty: &TypeRef, args: Vec<Value>) -> Result<Value>;

    /// Invoke a static factory method declared on `owner`.
    fn invoke_factory(&self, owner: &TypeRef, method: &str, args: Vec<Value>) -> Result<Value>;

    /// Evaluate a custom markup extension instance.
    fn provide_value(&self, extension: &Value) -> Result<Value> {
        Ok(extension.clone())
    }

    // ========================================================================
    // Conversion
    // ========================================================================

    /// Convert text to an instance of `ty` using the type's converter.
    fn convert_from_text(&self, ty: &TypeRef, text: &str) -> Result<Value>;

    /// Text form of a value for serialization; `None` when the value needs
    /// object syntax.
    fn convert_to_text(&self, value: &Value) -> Option<String> {
        match value {
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_) => Some(value.to_string()),
            _ => None,
        }
    }

    /// Convert attribute or content text destined for `member`.
    fn convert_member_value(&self, member: &MemberRef, text: &str) -> Result<Value> {
        match self.member_type(member) {
            Some(ty) if ty.has_text_syntax() => self.convert_from_text(&ty, text),
            _ => Ok(Value::String(text.to_string())),
        }
    }

    /// Convert text content destined for a collection or dictionary.
    fn convert_item(&self, collection: &TypeRef, text: &str) -> Result<Value> {
        match self.item_type(collection) {
            Some(ty) if ty.has_text_syntax() => self.convert_from_text(&ty, text),
            _ => Ok(Value::String(text.to_string())),
        }
    }

    /// Convert a raw dictionary key to the dictionary's key type.
    /// Non-text keys pass through unchanged.
    fn convert_key(&self, dictionary: &TypeRef, key: Value) -> Result<Value> {
        match (&key, self.key_type(dictionary)) {
            (Value::String(text), Some(key_ty)) if key_ty.has_text_syntax() => {
                self.convert_from_text(&key_ty, text)
            }
            _ => Ok(key),
        }
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    fn set_value(&self, instance: &Value, member: &MemberRef, value: Value) -> Result<()> {
        object_of(instance, &format!("set member '{member}'"))?.set(member, value);
        Ok(())
    }

    fn get_value(&self, instance: &Value, member: &MemberRef) -> Result<Value> {
        Ok(object_of(instance, &format!("get member '{member}'"))?
            .get_member(member)
            .unwrap_or(Value::Null))
    }

    fn add(&self, collection: &Value, item: Value) -> Result<()> {
        object_of(collection, "add an item")?.push_item(item);
        Ok(())
    }

    fn add_to_dictionary(&self, dictionary: &Value, key: Value, value: Value) -> Result<()> {
        object_of(dictionary, "add an entry")?.insert_entry(key, value)
    }

    /// Set a member by name on an object instance.
    fn set_by_name(&self, instance: &Value, name: &str, value: Value) -> Result<()> {
        let obj = object_of(instance, &format!("set member '{name}'"))?;
        let ty = obj.ty();
        let member = self.resolve_member(&ty, name).ok_or_else(|| Error::UnknownMember {
            type_name: ty.full_name(),
            member: name.to_string(),
        })?;
        self.set_value(instance, &member, value)
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    /// Type to write for a value.
    fn type_of(&self, value: &Value) -> Option<TypeRef> {
        match value {
            Value::Object(o) => Some(o.ty()),
            Value::String(_) => self.intrinsic(Intrinsic::String),
            Value::Int(_) => self.intrinsic(Intrinsic::Int32),
            Value::Float(_) => self.intrinsic(Intrinsic::Double),
            Value::Bool(_) => self.intrinsic(Intrinsic::Boolean),
            Value::Null => self.intrinsic(Intrinsic::Null),
            Value::Type(_) => self.intrinsic(Intrinsic::Type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembly_of_namespace() {
        assert_eq!(
            assembly_of_namespace("clr-namespace:Test.Elements;assembly=XamlTestClasses"),
            Some("XamlTestClasses")
        );
        assert_eq!(assembly_of_namespace("clr-namespace:Test.Elements"), None);
        assert_eq!(assembly_of_namespace("http://example.com/ns"), None);
    }
}
