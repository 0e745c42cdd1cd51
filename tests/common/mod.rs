//! Shared fixture for the integration suites.

#![allow(dead_code)]

use parking_lot::Mutex;
use xaml_rs::{
    Error, MemberDef, MemberRef, MemorySchema, ObjectRef, Result, SchemaProvider, TypeDef, TypeName,
    TypeRef, TypeSlot, Value, XAML_NAMESPACE,
};

pub const NS: &str = "clr-namespace:Test.Elements;assembly=XamlTestClasses";
pub const OTHER_NS: &str = "clr-namespace:Test.Other;assembly=OtherClasses";

/// `xmlns` attributes binding the fixture namespace as default and `x:`.
pub fn xmlns() -> String {
    format!(r#"xmlns="{NS}" xmlns:x="{XAML_NAMESPACE}""#)
}

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

fn point(schema: &dyn SchemaProvider, ty: &TypeRef, x: &Value, y: &Value) -> Result<Value> {
    let obj = Value::Object(ObjectRef::new(ty.clone()));
    schema.set_by_name(&obj, "X", x.clone())?;
    schema.set_by_name(&obj, "Y", y.clone())?;
    Ok(obj)
}

pub fn schema() -> MemorySchema {
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
                }),
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
        .with(TypeDef::new(OTHER_NS, "Gadget").member(MemberDef::new("Label").of_type(x, "String")))
        .with(
            TypeDef::new(OTHER_NS, "Maker")
                .factory("Make", 0, |schema, _| gadget(schema, "made"))
                .factory("Either", 1, |_, args| Ok(args[0].clone()))
                .factory("Either", 1, |schema, args| gadget(schema, &args[0].to_string())),
        )
        .with(TypeDef::new(NS, "Broken").constructor(0, |_, _, _| Err(Error::Provider("boom".into()))))
}

fn gadget(schema: &dyn SchemaProvider, label: &str) -> Result<Value> {
    let ty = schema
        .resolve_type(OTHER_NS, "Gadget", &[])
        .ok_or_else(|| Error::Provider("no Gadget".into()))?;
    let obj = Value::Object(ObjectRef::new(ty));
    schema.set_by_name(&obj, "Label", Value::from(label))?;
    Ok(obj)
}

pub fn ty(schema: &MemorySchema, name: &str) -> TypeRef {
    schema
        .resolve_type(NS, name, &[])
        .or_else(|| schema.resolve_type(XAML_NAMESPACE, name, &[]))
        .unwrap_or_else(|| panic!("fixture type {name}"))
}

pub fn member(schema: &MemorySchema, owner: &str, name: &str) -> MemberRef {
    let owner = ty(schema, owner);
    schema
        .resolve_member(&owner, name)
        .unwrap_or_else(|| panic!("fixture member {name}"))
}

/// Provider wrapper recording every mutation the object writer performs.
pub struct RecordingSchema {
    inner: MemorySchema,
    log: Mutex<Vec<String>>,
    typed_keys: bool,
}

impl RecordingSchema {
    pub fn new(inner: MemorySchema) -> Self {
        Self { inner, log: Mutex::new(Vec::new()), typed_keys: false }
    }

    /// Dictionaries reject text keys, as a host dictionary with a typed key would.
    pub fn with_typed_keys(mut self) -> Self {
        self.typed_keys = true;
        self
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    fn record(&self, entry: String) {
        self.log.lock().push(entry);
    }
}

impl SchemaProvider for RecordingSchema {
    fn resolve_type(&self, namespace: &str, name: &str, type_args: &[TypeRef]) -> Option<TypeRef> {
        self.inner.resolve_type(namespace, name, type_args)
    }

    fn resolve_member(&self, owner: &TypeRef, name: &str) -> Option<MemberRef> {
        self.inner.resolve_member(owner, name)
    }

    fn resolve_attachable(&self, owner: &TypeRef, name: &str) -> Option<MemberRef> {
        self.inner.resolve_attachable(owner, name)
    }

    fn preferred_prefix(&self, namespace: &str) -> Option<String> {
        self.inner.preferred_prefix(namespace)
    }

    fn create_instance(&self, ty: &TypeRef, args: Vec<Value>) -> Result<Value> {
        self.record(format!("create {} ({} args)", ty.name(), args.len()));
        self.inner.create_instance(ty, args)
    }

    fn invoke_factory(&self, owner: &TypeRef, method: &str, args: Vec<Value>) -> Result<Value> {
        self.record(format!("factory {}.{method}", owner.name()));
        self.inner.invoke_factory(owner, method, args)
    }

    fn provide_value(&self, extension: &Value) -> Result<Value> {
        self.inner.provide_value(extension)
    }

    fn convert_from_text(&self, ty: &TypeRef, text: &str) -> Result<Value> {
        self.inner.convert_from_text(ty, text)
    }

    fn set_value(&self, instance: &Value, member: &MemberRef, value: Value) -> Result<()> {
        self.record(format!("set {}={value}", member.name()));
        self.inner.set_value(instance, member, value)
    }

    fn add(&self, collection: &Value, item: Value) -> Result<()> {
        self.record(format!("add {item}"));
        self.inner.add(collection, item)
    }

    fn add_to_dictionary(&self, dictionary: &Value, key: Value, value: Value) -> Result<()> {
        self.record(format!("entry {key}={value}"));
        if let (true, Value::String(text)) = (self.typed_keys, &key) {
            return Err(Error::Conversion { target: "key".into(), text: text.clone() });
        }
        self.inner.add_to_dictionary(dictionary, key, value)
    }
}
