//! In-memory schema provider.
//!
//! This is the reference implementation of `SchemaProvider`.
//! Types are registered at runtime as [`TypeDef`]s; resolved handles are
//! cached in HashMaps protected by RwLock so repeated lookups return the
//! same `TypeRef`/`MemberRef`.
//!
//! ## Limitations
//!
//! - **No inheritance**: members are looked up on the declaring definition
//!   only.
//! - **Arity-only overloads**: constructors and factory methods are
//!   selected by argument count. Two overloads with the same arity are
//!   ambiguous.
//! - **Handles live as long as the schema**: the caches are never evicted.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::access::AssemblyName;
use crate::model::*;
use crate::{Error, Result};
use super::{assembly_of_namespace, SchemaProvider};

pub type Converter = Arc<dyn Fn(&str) -> Result<Value> + Send + Sync>;
pub type Constructor = Arc<dyn Fn(&dyn SchemaProvider, &TypeRef, &[Value]) -> Result<Value> + Send + Sync>;
pub type FactoryMethod = Arc<dyn Fn(&dyn SchemaProvider, &[Value]) -> Result<Value> + Send + Sync>;
pub type ProvideValue = Arc<dyn Fn(&dyn SchemaProvider, &ObjectRef) -> Result<Value> + Send + Sync>;

// ============================================================================
// Definitions
// ============================================================================

/// Member declaration.
#[derive(Debug, Clone)]
pub struct MemberDef {
    name: String,
    value_type: Option<TypeName>,
}

impl MemberDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), value_type: None }
    }

    pub fn of_type(mut self, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        self.value_type = Some(TypeName::new(namespace, name));
        self
    }
}

/// Type declaration, built fluently and registered with [`MemorySchema::define`].
#[derive(Clone)]
pub struct TypeDef {
    namespace: String,
    name: String,
    assembly: Option<AssemblyName>,
    generic_arity: usize,
    kind: TypeKind,
    nullable: bool,
    content_property: Option<String>,
    requires_key_conversion: bool,
    intrinsic: Option<Intrinsic>,
    markup_extension: bool,
    members: Vec<MemberDef>,
    attachable: Vec<MemberDef>,
    constructors: Vec<(usize, Constructor)>,
    factories: Vec<(String, usize, FactoryMethod)>,
    converter: Option<Converter>,
    provide_value: Option<ProvideValue>,
}

impl TypeDef {
    /// New object type. A `clr-namespace:…;assembly=A` namespace sets the
    /// declaring assembly.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let assembly = assembly_of_namespace(&namespace).and_then(|a| AssemblyName::parse(a).ok());
        Self {
            namespace,
            name: name.into(),
            assembly,
            generic_arity: 0,
            kind: TypeKind::Object,
            nullable: true,
            content_property: None,
            requires_key_conversion: false,
            intrinsic: None,
            markup_extension: false,
            members: Vec::new(),
            attachable: Vec::new(),
            constructors: Vec::new(),
            factories: Vec::new(),
            converter: None,
            provide_value: None,
        }
    }

    pub fn assembly(mut self, assembly: AssemblyName) -> Self {
        self.assembly = Some(assembly);
        self
    }

    pub fn generic(mut self, arity: usize) -> Self {
        self.generic_arity = arity;
        self
    }

    pub fn collection(mut self, item: Option<TypeSlot>) -> Self {
        self.kind = TypeKind::Collection { item };
        self
    }

    pub fn dictionary(mut self, key: Option<TypeSlot>, value: Option<TypeSlot>) -> Self {
        self.kind = TypeKind::Dictionary { key, value };
        self
    }

    pub fn non_nullable(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn content_property(mut self, name: impl Into<String>) -> Self {
        self.content_property = Some(name.into());
        self
    }

    /// Keys must always be converted to the key type before insertion.
    pub fn requires_key_conversion(mut self) -> Self {
        self.requires_key_conversion = true;
        self
    }

    pub fn member(mut self, member: MemberDef) -> Self {
        self.members.push(member);
        self
    }

    pub fn attachable(mut self, member: MemberDef) -> Self {
        self.attachable.push(member);
        self
    }

    pub fn constructor<F>(mut self, arity: usize, f: F) -> Self
    where
        F: Fn(&dyn SchemaProvider, &TypeRef, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.constructors.push((arity, Arc::new(f)));
        self
    }

    pub fn factory<F>(mut self, name: impl Into<String>, arity: usize, f: F) -> Self
    where
        F: Fn(&dyn SchemaProvider, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.factories.push((name.into(), arity, Arc::new(f)));
        self
    }

    pub fn converter<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<Value> + Send + Sync + 'static,
    {
        self.converter = Some(Arc::new(f));
        self
    }

    /// Mark as a markup extension evaluated by `f`.
    pub fn markup_extension<F>(mut self, f: F) -> Self
    where
        F: Fn(&dyn SchemaProvider, &ObjectRef) -> Result<Value> + Send + Sync + 'static,
    {
        self.markup_extension = true;
        self.provide_value = Some(Arc::new(f));
        self
    }

    fn intrinsic(mut self, intrinsic: Intrinsic) -> Self {
        self.intrinsic = Some(intrinsic);
        self.markup_extension = intrinsic.is_markup_extension();
        self
    }

    fn to_xaml_type(&self, args: &[TypeRef]) -> XamlType {
        XamlType::new(self.namespace.clone(), self.name.clone())
            .with_assembly(self.assembly.clone())
            .with_type_args(args.iter().cloned())
            .with_kind(self.kind.clone())
            .with_intrinsic(self.intrinsic)
            .with_markup_extension(self.markup_extension)
            .with_nullable(self.nullable)
            .with_text_syntax(self.converter.is_some())
            .with_content_property(self.content_property.clone())
            .with_key_conversion(self.requires_key_conversion)
    }
}

// ============================================================================
// MemorySchema
// ============================================================================

type DefKey = (String, String, usize);
type HandleKey = (String, String, Vec<usize>);
type MemberKey = (usize, String, bool);

/// Runtime-populated schema.
#[derive(Clone)]
pub struct MemorySchema {
    inner: Arc<SchemaInner>,
}

struct SchemaInner {
    defs: RwLock<HashMap<DefKey, Arc<TypeDef>>>,
    handles: RwLock<HashMap<HandleKey, TypeRef>>,
    /// type handle id → definition
    by_handle: RwLock<HashMap<usize, Arc<TypeDef>>>,
    members: RwLock<HashMap<MemberKey, MemberRef>>,
    prefixes: RwLock<HashMap<String, String>>,
}

impl MemorySchema {
    /// Schema pre-populated with the XAML language types.
    pub fn new() -> Self {
        let schema = Self {
            inner: Arc::new(SchemaInner {
                defs: RwLock::new(HashMap::new()),
                handles: RwLock::new(HashMap::new()),
                by_handle: RwLock::new(HashMap::new()),
                members: RwLock::new(HashMap::new()),
                prefixes: RwLock::new(HashMap::new()),
            }),
        };
        schema.define_language_types();
        schema.with_prefix(XAML_NAMESPACE, "x")
    }

    /// Register (or replace) a type definition. Handles resolved before a
    /// replacement keep the old definition.
    pub fn define(&self, def: TypeDef) {
        let key = (def.namespace.clone(), def.name.clone(), def.generic_arity);
        tracing::trace!(namespace = %def.namespace, name = %def.name, "define type");
        self.inner.defs.write().insert(key, Arc::new(def));
    }

    pub fn with(self, def: TypeDef) -> Self {
        self.define(def);
        self
    }

    pub fn with_prefix(self, namespace: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.inner.prefixes.write().insert(namespace.into(), prefix.into());
        self
    }

    fn define_language_types(&self) {
        let ns = XAML_NAMESPACE;
        self.define(
            TypeDef::new(ns, Intrinsic::String.type_name())
                .intrinsic(Intrinsic::String)
                .converter(|s| Ok(Value::String(s.to_string()))),
        );
        self.define(
            TypeDef::new(ns, Intrinsic::Int32.type_name())
                .intrinsic(Intrinsic::Int32)
                .non_nullable()
                .converter(|s| {
                    s.trim().parse::<i32>().map(|i| Value::Int(i.into())).map_err(|_| Error::Conversion {
                        target: "Int32".into(),
                        text: s.to_string(),
                    })
                }),
        );
        self.define(
            TypeDef::new(ns, Intrinsic::Double.type_name())
                .intrinsic(Intrinsic::Double)
                .non_nullable()
                .converter(|s| {
                    s.trim().parse::<f64>().map(Value::Float).map_err(|_| Error::Conversion {
                        target: "Double".into(),
                        text: s.to_string(),
                    })
                }),
        );
        self.define(
            TypeDef::new(ns, Intrinsic::Boolean.type_name())
                .intrinsic(Intrinsic::Boolean)
                .non_nullable()
                .converter(|s| match s.trim() {
                    t if t.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
                    t if t.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
                    _ => Err(Error::Conversion { target: "Boolean".into(), text: s.to_string() }),
                }),
        );
        self.define(TypeDef::new(ns, Intrinsic::Object.type_name()).intrinsic(Intrinsic::Object));
        self.define(TypeDef::new(ns, Intrinsic::Null.type_name()).intrinsic(Intrinsic::Null));
        self.define(
            TypeDef::new(ns, Intrinsic::Reference.type_name())
                .intrinsic(Intrinsic::Reference)
                .member(MemberDef::new("Name").of_type(ns, "String")),
        );
        self.define(
            TypeDef::new(ns, Intrinsic::Type.type_name())
                .intrinsic(Intrinsic::Type)
                .member(MemberDef::new("TypeName").of_type(ns, "String")),
        );
    }

    fn def_of(&self, ty: &TypeRef) -> Result<Arc<TypeDef>> {
        self.inner
            .by_handle
            .read()
            .get(&ty.id())
            .cloned()
            .ok_or_else(|| Error::UnknownType {
                namespace: ty.namespace().to_string(),
                name: ty.full_name(),
            })
    }

    fn value_kind_of(&self, value_type: Option<&TypeName>) -> ValueKind {
        let Some(name) = value_type else {
            return ValueKind::Scalar;
        };
        let defs = self.inner.defs.read();
        match defs.get(&(name.namespace.clone(), name.name.clone(), 0)).map(|d| &d.kind) {
            Some(TypeKind::Collection { .. }) => ValueKind::Collection,
            Some(TypeKind::Dictionary { .. }) => ValueKind::Dictionary,
            _ => ValueKind::Scalar,
        }
    }

    fn member_handle(&self, owner: &TypeRef, name: &str, attachable: bool) -> Option<MemberRef> {
        let key = (owner.id(), name.to_string(), attachable);
        if let Some(m) = self.inner.members.read().get(&key) {
            return Some(m.clone());
        }
        let def = self.def_of(owner).ok()?;
        let decls = if attachable { &def.attachable } else { &def.members };
        let decl = decls.iter().find(|m| m.name == name)?;
        let base = if attachable {
            XamlMember::attachable(owner.type_name(), name)
        } else {
            XamlMember::property(owner.type_name(), name)
        };
        let member = MemberRef::new(
            base.with_value_type(decl.value_type.clone(), self.value_kind_of(decl.value_type.as_ref())),
        );
        let mut members = self.inner.members.write();
        Some(members.entry(key).or_insert(member).clone())
    }

    fn select<'d, T>(
        candidates: impl Iterator<Item = &'d T>,
        type_name: impl Fn() -> String,
        name: &str,
    ) -> Result<&'d T> {
        let matches: Vec<&T> = candidates.collect();
        match matches.as_slice() {
            [] => Err(Error::MissingMethod { type_name: type_name(), name: name.to_string() }),
            [one] => Ok(one),
            _ => Err(Error::AmbiguousMatch { type_name: type_name(), name: name.to_string() }),
        }
    }
}

impl Default for MemorySchema {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SchemaProvider impl
// ============================================================================

impl SchemaProvider for MemorySchema {
    fn resolve_type(&self, namespace: &str, name: &str, type_args: &[TypeRef]) -> Option<TypeRef> {
        let key: HandleKey = (
            namespace.to_string(),
            name.to_string(),
            type_args.iter().map(TypeRef::id).collect(),
        );
        if let Some(ty) = self.inner.handles.read().get(&key) {
            return Some(ty.clone());
        }
        let def = self
            .inner
            .defs
            .read()
            .get(&(namespace.to_string(), name.to_string(), type_args.len()))
            .cloned()?;
        let fresh = TypeRef::new(def.to_xaml_type(type_args));
        let ty = self.inner.handles.write().entry(key).or_insert(fresh).clone();
        self.inner.by_handle.write().entry(ty.id()).or_insert(def);
        tracing::trace!(namespace, name, ty = %ty, "resolved type");
        Some(ty)
    }

    fn resolve_member(&self, owner: &TypeRef, name: &str) -> Option<MemberRef> {
        self.member_handle(owner, name, false)
    }

    fn resolve_attachable(&self, owner: &TypeRef, name: &str) -> Option<MemberRef> {
        self.member_handle(owner, name, true)
    }

    fn preferred_prefix(&self, namespace: &str) -> Option<String> {
        self.inner.prefixes.read().get(namespace).cloned()
    }

    fn create_instance(&self, ty: &TypeRef, args: Vec<Value>) -> Result<Value> {
        let def = self.def_of(ty)?;

        if def.constructors.is_empty() {
            return match (def.intrinsic, args.len()) {
                (Some(Intrinsic::String), 0) => Ok(Value::String(String::new())),
                (Some(Intrinsic::Int32), 0) => Ok(Value::Int(0)),
                (Some(Intrinsic::Double), 0) => Ok(Value::Float(0.0)),
                (Some(Intrinsic::Boolean), 0) => Ok(Value::Bool(false)),
                (_, 0) => Ok(Value::Object(ObjectRef::new(ty.clone()))),
                (Some(intrinsic), 1) if intrinsic.argument_member().is_some() => {
                    let instance = Value::Object(ObjectRef::new(ty.clone()));
                    let member = intrinsic.argument_member().unwrap_or_default();
                    let arg = args.into_iter().next().unwrap_or(Value::Null);
                    self.set_by_name(&instance, member, arg)?;
                    Ok(instance)
                }
                (_, n) => Err(Error::MissingMethod {
                    type_name: ty.full_name(),
                    name: format!("constructor with {n} argument(s)"),
                }),
            };
        }

        let ctor_name = format!("constructor with {} argument(s)", args.len());
        let (_, ctor) = Self::select(
            def.constructors.iter().filter(|(arity, _)| *arity == args.len()),
            || ty.full_name(),
            &ctor_name,
        )?;
        ctor(self, ty, &args)
    }

    fn invoke_factory(&self, owner: &TypeRef, method: &str, args: Vec<Value>) -> Result<Value> {
        let def = self.def_of(owner)?;
        let (_, _, factory) = Self::select(
            def.factories
                .iter()
                .filter(|(name, arity, _)| name == method && *arity == args.len()),
            || owner.full_name(),
            method,
        )?;
        tracing::trace!(owner = %owner, method, args = args.len(), "invoke factory");
        factory(self, &args)
    }

    fn provide_value(&self, extension: &Value) -> Result<Value> {
        let Value::Object(obj) = extension else {
            return Ok(extension.clone());
        };
        let def = self.def_of(&obj.ty())?;
        match &def.provide_value {
            Some(provide) => provide(self, obj),
            None => Ok(extension.clone()),
        }
    }

    fn convert_from_text(&self, ty: &TypeRef, text: &str) -> Result<Value> {
        let def = self.def_of(ty)?;
        match &def.converter {
            Some(convert) => convert(text),
            None => Err(Error::Conversion { target: ty.full_name(), text: text.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "clr-namespace:Test;assembly=TestAsm";

    fn schema() -> MemorySchema {
        MemorySchema::new()
            .with(TypeDef::new(NS, "Widget").member(MemberDef::new("Size").of_type(XAML_NAMESPACE, "Int32")))
            .with(TypeDef::new(NS, "List").generic(1).collection(Some(TypeSlot::Argument(0))))
            .with(
                TypeDef::new(NS, "Pair")
                    .constructor(2, |schema, ty, args| {
                        let obj = Value::Object(ObjectRef::new(ty.clone()));
                        schema.set_by_name(&obj, "First", args[0].clone())?;
                        schema.set_by_name(&obj, "Second", args[1].clone())?;
                        Ok(obj)
                    })
                    .member(MemberDef::new("First"))
                    .member(MemberDef::new("Second"))
                    .factory("Make", 1, |_, args| Ok(args[0].clone()))
                    .factory("Make", 1, |_, args| Ok(args[0].clone())),
            )
    }

    #[test]
    fn test_handles_are_cached() {
        let s = schema();
        let a = s.resolve_type(NS, "Widget", &[]).unwrap();
        let b = s.resolve_type(NS, "Widget", &[]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.assembly().map(|a| a.name()), Some("TestAsm"));
        let m1 = s.resolve_member(&a, "Size").unwrap();
        let m2 = s.resolve_member(&a, "Size").unwrap();
        assert_eq!(m1, m2);
        assert!(s.resolve_member(&a, "Nope").is_none());
        assert!(s.resolve_type(NS, "Nope", &[]).is_none());
    }

    #[test]
    fn test_generic_handles_depend_on_arguments() {
        let s = schema();
        let int = s.intrinsic(Intrinsic::Int32).unwrap();
        let string = s.intrinsic(Intrinsic::String).unwrap();
        let li = s.resolve_type(NS, "List", &[int.clone()]).unwrap();
        let ls = s.resolve_type(NS, "List", &[string]).unwrap();
        assert_ne!(li, ls);
        assert_eq!(li, s.resolve_type(NS, "List", &[int.clone()]).unwrap());
        assert_eq!(s.item_type(&li), Some(int));
        assert!(s.resolve_type(NS, "List", &[]).is_none());
    }

    #[test]
    fn test_intrinsic_conversion() {
        let s = schema();
        let int = s.intrinsic(Intrinsic::Int32).unwrap();
        assert_eq!(s.convert_from_text(&int, " 42 ").unwrap(), Value::Int(42));
        assert!(matches!(s.convert_from_text(&int, "x"), Err(Error::Conversion { .. })));
        assert_eq!(s.convert_from_text(&int, "-2147483648").unwrap(), Value::Int(i64::from(i32::MIN)));
        assert!(matches!(s.convert_from_text(&int, "1099511627776"), Err(Error::Conversion { .. })));
        let widget = s.resolve_type(NS, "Widget", &[]).unwrap();
        let size = s.resolve_member(&widget, "Size").unwrap();
        assert_eq!(s.convert_member_value(&size, "7").unwrap(), Value::Int(7));
    }

    #[test]
    fn test_constructor_and_factory_selection() {
        let s = schema();
        let pair = s.resolve_type(NS, "Pair", &[]).unwrap();
        let made = s.create_instance(&pair, vec![Value::Int(1), Value::Int(2)]).unwrap();
        assert_eq!(made.as_object().unwrap().get("Second"), Some(Value::Int(2)));
        assert!(matches!(s.create_instance(&pair, vec![]), Err(Error::MissingMethod { .. })));
        assert!(matches!(
            s.invoke_factory(&pair, "Make", vec![Value::Int(1)]),
            Err(Error::AmbiguousMatch { .. })
        ));
        assert!(matches!(
            s.invoke_factory(&pair, "Other", vec![]),
            Err(Error::MissingMethod { .. })
        ));
    }

    #[test]
    fn test_reference_extension_positional_constructor() {
        let s = schema();
        let reference = s.intrinsic(Intrinsic::Reference).unwrap();
        assert!(reference.is_markup_extension());
        let ext = s.create_instance(&reference, vec![Value::from("target")]).unwrap();
        assert_eq!(ext.as_object().unwrap().get("Name"), Some(Value::from("target")));
    }
}
