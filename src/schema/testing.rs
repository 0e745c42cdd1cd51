//! Fixture schema shared by unit tests.

use crate::model::*;
use crate::{Error, Result};
use super::{MemberDef, MemorySchema, SchemaProvider, TypeDef};

pub(crate) const NS: &str = "clr-namespace:Test.Elements;assembly=XamlTestClasses";

fn letter_key(text: &str) -> Result<Value> {
    match text.trim() {
        "A" => Ok(Value::Int(10)),
        "B" => Ok(Value::Int(11)),
        t => t.parse::<i64>().map(Value::Int).map_err(|_| Error::Conversion {
            target: "LetterKey".into(),
            text: text.to_string(),
        }),
    }
}

pub(crate) fn schema() -> MemorySchema {
    let x = XAML_NAMESPACE;
    MemorySchema::new()
        .with(
            TypeDef::new(NS, "BigContainer")
                .member(MemberDef::new("Integer").of_type(x, "Int32"))
                .member(MemberDef::new("Text").of_type(x, "String"))
                .member(MemberDef::new("Content"))
                .member(MemberDef::new("MediumContainer").of_type(NS, "MediumContainer"))
                .content_property("Content"),
        )
        .with(TypeDef::new(NS, "MediumContainer").member(MemberDef::new("Value").of_type(x, "Int32")))
        .with(
            TypeDef::new(NS, "DoubleCollection")
                .collection(Some(TypeSlot::Named(TypeName::new(x, "Double"))))
                .member(MemberDef::new("Flavor").of_type(x, "String")),
        )
        .with(TypeDef::new(NS, "LetterKey").converter(letter_key))
        .with(TypeDef::new(NS, "LetterDictionary").dictionary(
            Some(TypeSlot::Named(TypeName::new(NS, "LetterKey"))),
            None,
        ))
        .with(
            TypeDef::new(NS, "Holder")
                .member(MemberDef::new("Table").of_type(NS, "LetterDictionary"))
                .member(MemberDef::new("Values").of_type(NS, "DoubleCollection"))
                .member(MemberDef::new("Extra"))
                .member(MemberDef::new("Other")),
        )
        .with(
            TypeDef::new(NS, "Point")
                .non_nullable()
                .member(MemberDef::new("X").of_type(x, "Int32"))
                .member(MemberDef::new("Y").of_type(x, "Int32"))
                .constructor(0, |_, ty, _| Ok(Value::Object(ObjectRef::new(ty.clone()))))
                .constructor(2, |schema, ty, args| point(schema, ty, &args[0], &args[1]))
                .factory("Create", 2, |schema, args| {
                    let ty = schema.resolve_type(NS, "Point", &[]).ok_or_else(|| Error::Provider("no Point".into()))?;
                    point(schema, &ty, &args[0], &args[1])
                })
                .factory("Nothing", 0, |_, _| Ok(Value::Null)),
        )
        .with(TypeDef::new(NS, "List").generic(1).collection(Some(TypeSlot::Argument(0))))
        .with(
            TypeDef::new(NS, "Dictionary")
                .generic(2)
                .dictionary(Some(TypeSlot::Argument(0)), Some(TypeSlot::Argument(1)))
                .requires_key_conversion(),
        )
        .with(
            TypeDef::new(NS, "UpperExtension")
                .member(MemberDef::new("Text").of_type(x, "String"))
                .constructor(0, |_, ty, _| Ok(Value::Object(ObjectRef::new(ty.clone()))))
                .constructor(1, |schema, ty, args| {
                    let obj = Value::Object(ObjectRef::new(ty.clone()));
                    schema.set_by_name(&obj, "Text", args[0].clone())?;
                    Ok(obj)
                })
                .markup_extension(|_, obj| {
                    Ok(Value::String(
                        obj.get("Text").and_then(|v| v.as_str().map(str::to_uppercase)).unwrap_or_default(),
                    ))
                }),
        )
        .with(TypeDef::new(NS, "Grid").attachable(MemberDef::new("Row").of_type(x, "Int32")))
}

fn point(schema: &dyn SchemaProvider, ty: &TypeRef, x: &Value, y: &Value) -> Result<Value> {
    let int = schema.intrinsic(Intrinsic::Int32).ok_or_else(|| Error::Provider("no Int32".into()))?;
    let coerce = |v: &Value| match v {
        Value::String(s) => schema.convert_from_text(&int, s),
        other => Ok(other.clone()),
    };
    let obj = Value::Object(ObjectRef::new(ty.clone()));
    schema.set_by_name(&obj, "X", coerce(x)?)?;
    schema.set_by_name(&obj, "Y", coerce(y)?)?;
    Ok(obj)
}

pub(crate) fn ty(schema: &MemorySchema, name: &str) -> TypeRef {
    schema
        .resolve_type(NS, name, &[])
        .or_else(|| schema.resolve_type(XAML_NAMESPACE, name, &[]))
        .unwrap_or_else(|| panic!("fixture type {name}"))
}

pub(crate) fn member(schema: &MemorySchema, owner: &str, name: &str) -> MemberRef {
    let owner = ty(schema, owner);
    schema
        .resolve_member(&owner, name)
        .unwrap_or_else(|| panic!("fixture member {name}"))
}
