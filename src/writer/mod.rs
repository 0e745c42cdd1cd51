//! # Object Graph Writer
//!
//! Consumes structural nodes and builds a live object graph through the
//! [`SchemaProvider`].
//!
//! Each `StartObject` pushes a [`Frame`](frame::Frame) that walks
//! `Created → CollectingArguments → Initializing → SettingMembers →
//! Finished`. Construction is deferred until the first ordinary member (or
//! `EndObject`), so `x:Arguments`, `x:FactoryMethod` and `_Initialization`
//! can be gathered first.
//!
//! Forward `{x:Reference}`s become fixups that replay once the whole
//! document has been written, ordered by when each referent was named.

mod fixup;
mod frame;

use std::mem;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::access::AccessLevel;
use crate::model::{Directive, Intrinsic, MemberRef, TypeRef, Value};
use crate::nodes::{XamlNode, XamlWriter};
use crate::reader::type_args;
use crate::schema::SchemaProvider;
use crate::{Error, Result};

use fixup::{Fixup, FixupTarget, NameScope};
use frame::{Frame, FrameState, Incoming, MemberFrame, Slot};

// ============================================================================
// Settings and events
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectWriterSettings {
    /// Insert dictionary keys as written unless the dictionary type
    /// demands conversion.
    pub prefer_unconverted_dictionary_keys: bool,
    pub skip_duplicate_property_check: bool,
    /// When set, only types this level allows may be constructed.
    pub access_level: Option<AccessLevel>,
}

/// Construction notifications delivered to a listener.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// Instance constructed, no member set yet.
    ObjectCreated { ty: TypeRef, instance: Value },
    /// All members set, instance about to be handed to its parent.
    MembersSet { ty: TypeRef, instance: Value },
}

type Listener<'s> = Box<dyn FnMut(LifecycleEvent) + 's>;

/// How keys are inserted into one dictionary instance under
/// prefer-unconverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyPolicy {
    Undecided,
    Raw,
    Convert,
}

// ============================================================================
// ObjectWriter
// ============================================================================

pub struct ObjectWriter<'s, S: SchemaProvider + ?Sized> {
    schema: &'s S,
    settings: ObjectWriterSettings,
    frames: Vec<Frame>,
    pending_namespaces: Vec<(String, String)>,
    names: NameScope,
    fixups: Vec<Fixup>,
    key_policies: HashMap<usize, KeyPolicy>,
    result: Option<Value>,
    listener: Option<Listener<'s>>,
}

impl<'s, S: SchemaProvider + ?Sized> ObjectWriter<'s, S> {
    pub fn new(schema: &'s S, settings: ObjectWriterSettings) -> Self {
        Self {
            schema,
            settings,
            frames: Vec::new(),
            pending_namespaces: Vec::new(),
            names: NameScope::default(),
            fixups: Vec::new(),
            key_policies: HashMap::new(),
            result: None,
            listener: None,
        }
    }

    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: FnMut(LifecycleEvent) + 's,
    {
        self.listener = Some(Box::new(listener));
        self
    }

    /// Root value, once the root object has been closed.
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn into_result(self) -> Result<Value> {
        if let Some(frame) = self.frames.last() {
            return Err(Error::InvalidNodeSequence(format!("object '{}' was never closed", frame.ty)));
        }
        self.result
            .ok_or_else(|| Error::InvalidNodeSequence("node stream contained no root object".into()))
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn emit(&mut self, event: LifecycleEvent) {
        if let Some(listener) = self.listener.as_mut() {
            listener(event);
        }
    }

    fn top(&mut self) -> Result<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| Error::InvalidNodeSequence("node outside any object".into()))
    }

    fn lookup_namespace(&self, prefix: &str) -> Option<String> {
        self.frames
            .iter()
            .rev()
            .flat_map(|f| f.namespaces.iter().rev())
            .chain(self.pending_namespaces.iter().rev())
            .find(|(p, _)| p == prefix)
            .map(|(_, ns)| ns.clone())
    }

    /// Resolve `p:Name` text against the namespaces in scope.
    fn resolve_type_name(&self, text: &str) -> Result<TypeRef> {
        let expr = type_args::parse_type_name(text, 0)?;
        type_args::resolve(&expr, self.schema, &|p: &str| self.lookup_namespace(p))
    }

    fn check_access(&self, ty: &TypeRef) -> Result<()> {
        match &self.settings.access_level {
            Some(level) if !level.allows(ty) => Err(Error::PermissionDenied {
                type_name: ty.full_name(),
                assembly: ty.assembly().map(ToString::to_string).unwrap_or_default(),
            }),
            _ => Ok(()),
        }
    }

    fn construct(&self, ty: &TypeRef, args: Vec<Value>) -> Result<Value> {
        self.check_access(ty)?;
        self.schema
            .create_instance(ty, args)
            .map_err(|e| Error::construction(ty.full_name(), e))
    }

    fn invoke_factory(&self, ty: &TypeRef, method: &str, args: Vec<Value>) -> Result<Value> {
        let (owner, name) = match method.rsplit_once('.') {
            Some((owner, name)) => (self.resolve_type_name(owner)?, name),
            None => (ty.clone(), method),
        };
        self.check_access(&owner)?;
        let value = self
            .schema
            .invoke_factory(&owner, name, args)
            .map_err(|e| Error::construction(ty.full_name(), e))?;
        if value.is_null() && !ty.is_nullable() {
            return Err(Error::InvalidReturn { type_name: ty.full_name(), method: method.to_string() });
        }
        Ok(value)
    }

    /// Construct the top frame's instance if that has not happened yet.
    fn ensure_created(&mut self) -> Result<()> {
        let frame = self.top()?;
        if frame.is_created() {
            return Ok(());
        }
        frame.state = FrameState::Initializing;
        let ty = frame.ty.clone();
        let args = mem::take(&mut frame.ctor_args).into_vec();
        let factory = frame.factory_method.take();
        let init_text = frame.init_text.take();
        self.check_access(&ty)?;

        let instance = if let Some(text) = init_text {
            self.schema
                .convert_from_text(&ty, &text)
                .map_err(|e| Error::construction(ty.full_name(), e))?
        } else if let Some(method) = factory {
            self.invoke_factory(&ty, &method, args)?
        } else {
            self.schema
                .create_instance(&ty, args)
                .map_err(|e| Error::construction(ty.full_name(), e))?
        };
        tracing::debug!(ty = %ty, depth = self.frames.len(), "object created");

        let frame = self.top()?;
        frame.instance = Some(instance.clone());
        frame.state = FrameState::SettingMembers;
        let name = frame.name.clone();
        self.emit(LifecycleEvent::ObjectCreated { ty: ty.clone(), instance: instance.clone() });
        if let Some(name) = name {
            if !ty.is_markup_extension() {
                self.names.register(&name, instance)?;
            }
        }
        Ok(())
    }

    /// Insert into a dictionary honoring the key-conversion mode.
    ///
    /// Under prefer-unconverted the first insert into a dictionary decides
    /// for the whole instance: a raw key the dictionary accepts keeps every
    /// later key raw, a raw key rejected as the wrong kind converts them all.
    fn insert_entry(&mut self, dictionary: &Value, ty: &TypeRef, key: Value, value: Value) -> Result<()> {
        let id = dictionary.as_object().map(|o| o.id()).unwrap_or_default();
        let policy = if !self.settings.prefer_unconverted_dictionary_keys || ty.requires_key_conversion() {
            KeyPolicy::Convert
        } else {
            self.key_policies.get(&id).copied().unwrap_or(KeyPolicy::Undecided)
        };

        match policy {
            KeyPolicy::Convert => {
                let key = self.schema.convert_key(ty, key)?;
                self.schema.add_to_dictionary(dictionary, key, value)
            }
            KeyPolicy::Raw => self.schema.add_to_dictionary(dictionary, key, value),
            KeyPolicy::Undecided => match self.schema.add_to_dictionary(dictionary, key.clone(), value.clone()) {
                Ok(()) => {
                    self.key_policies.insert(id, KeyPolicy::Raw);
                    Ok(())
                }
                Err(Error::Conversion { .. }) => {
                    tracing::debug!(dictionary = %ty, key = %key, "raw key rejected, converting keys");
                    self.key_policies.insert(id, KeyPolicy::Convert);
                    let key = self.schema.convert_key(ty, key)?;
                    self.schema.add_to_dictionary(dictionary, key, value)
                }
                Err(err) => Err(err),
            },
        }
    }

    // ------------------------------------------------------------------------
    // Node handlers
    // ------------------------------------------------------------------------

    fn start_object(&mut self, ty: TypeRef) -> Result<()> {
        match self.frames.last() {
            None if self.result.is_some() => {
                return Err(Error::InvalidNodeSequence(format!("second root object '{ty}'")));
            }
            Some(parent) if parent.member.is_none() => {
                return Err(Error::InvalidNodeSequence(format!(
                    "object '{ty}' written directly inside object '{}'",
                    parent.ty
                )));
            }
            _ => {}
        }
        let namespaces = mem::take(&mut self.pending_namespaces);
        tracing::trace!(ty = %ty, depth = self.frames.len(), "start object");
        self.frames.push(Frame::new(ty, namespaces));
        Ok(())
    }

    fn get_object(&mut self) -> Result<()> {
        let frame = self.top()?;
        let member = match &frame.member {
            Some(m) if !m.member.is_directive() => m.member.clone(),
            _ => return Err(Error::InvalidNodeSequence("GetObject outside a property member".into())),
        };
        let instance = frame
            .instance
            .clone()
            .ok_or_else(|| Error::InvalidNodeSequence("GetObject before the owner was created".into()))?;

        let mut current = self.schema.get_value(&instance, &member)?;
        if current.is_null() {
            let ty = self
                .schema
                .member_type(&member)
                .ok_or_else(|| Error::Provider(format!("member '{member}' has no type to create")))?;
            current = self.construct(&ty, Vec::new())?;
            self.schema.set_value(&instance, &member, current.clone())?;
        }
        if let Some(m) = self.top()?.member.as_mut() {
            m.value_set = true;
        }
        let ty = self
            .schema
            .type_of(&current)
            .ok_or_else(|| Error::Provider(format!("no type for the value of '{member}'")))?;
        tracing::trace!(member = %member, ty = %ty, "get object");
        self.frames.push(Frame::existing(ty, current));
        Ok(())
    }

    fn start_member(&mut self, member: MemberRef) -> Result<()> {
        let namespaces = mem::take(&mut self.pending_namespaces);
        let check_duplicates = !self.settings.skip_duplicate_property_check;
        let frame = self.top()?;
        frame.namespaces.extend(namespaces);
        if let Some(open) = &frame.member {
            return Err(Error::InvalidNodeSequence(format!(
                "member '{member}' opened inside member '{}'",
                open.member
            )));
        }

        let started = !frame.set_members.is_empty() || frame.is_created();
        let needs_instance = match member.directive() {
            Some(Directive::Arguments | Directive::PositionalParameters) => {
                if started {
                    return Err(Error::OrderingError {
                        type_name: frame.type_name(),
                        message: "ArgumentsOutOfOrder: constructor arguments follow member assignments".into(),
                    });
                }
                frame.state = FrameState::CollectingArguments;
                false
            }
            Some(Directive::FactoryMethod) => {
                if started {
                    return Err(Error::OrderingError {
                        type_name: frame.type_name(),
                        message: "FactoryMethodOutOfOrder: x:FactoryMethod follows member assignments".into(),
                    });
                }
                frame.state = FrameState::CollectingArguments;
                false
            }
            Some(Directive::Items) => true,
            Some(_) => false,
            None => {
                if !frame.set_members.insert(member.clone()) && check_duplicates {
                    return Err(Error::DuplicateMember {
                        type_name: frame.type_name(),
                        member: member.qualified_name(),
                    });
                }
                true
            }
        };
        frame.member = Some(MemberFrame { member, value_set: false });
        if needs_instance {
            self.ensure_created()?;
        }
        Ok(())
    }

    fn end_member(&mut self) -> Result<()> {
        let frame = self.top()?;
        frame
            .member
            .take()
            .map(|_| ())
            .ok_or_else(|| Error::InvalidNodeSequence("EndMember without StartMember".into()))
    }

    fn end_object(&mut self) -> Result<()> {
        let frame = self.top()?;
        if let Some(open) = &frame.member {
            return Err(Error::InvalidNodeSequence(format!(
                "object '{}' closed while member '{}' is open",
                frame.ty, open.member
            )));
        }
        if frame.existing {
            self.frames.pop();
            return Ok(());
        }

        self.ensure_created()?;
        let frame = self.top()?;
        let ty = frame.ty.clone();
        let instance = frame
            .instance
            .clone()
            .ok_or_else(|| Error::InvalidNodeSequence(format!("object '{ty}' has no instance")))?;
        self.emit(LifecycleEvent::MembersSet { ty: ty.clone(), instance: instance.clone() });
        let incoming = self.provide(&ty, instance)?;

        let Some(mut frame) = self.frames.pop() else {
            return Err(Error::InvalidNodeSequence("EndObject without StartObject".into()));
        };
        frame.state = FrameState::Finished;
        if ty.is_markup_extension() {
            if let (Some(name), Incoming::Value(value)) = (&frame.name, &incoming) {
                self.names.register(name, value.clone())?;
            }
        }
        tracing::trace!(ty = %ty, depth = self.frames.len(), "end object");

        if !self.frames.is_empty() {
            return self.deliver(incoming, frame.key);
        }
        let root = match incoming {
            Incoming::Value(value) => value,
            Incoming::Text(text) => Value::String(text),
            Incoming::Deferred(name) => return Err(Error::UnresolvedReference(name)),
        };
        self.result = Some(root);
        self.apply_fixups()
    }

    /// Evaluate a finished markup extension; other objects pass through.
    fn provide(&self, ty: &TypeRef, instance: Value) -> Result<Incoming> {
        if !ty.is_markup_extension() {
            return Ok(Incoming::Value(instance));
        }
        match ty.intrinsic() {
            Some(Intrinsic::Null) => Ok(Incoming::Value(Value::Null)),
            Some(Intrinsic::Reference) => {
                let name = self.argument_text(ty, &instance, Intrinsic::Reference)?;
                match self.names.lookup(&name) {
                    Some(value) => Ok(Incoming::Value(value)),
                    None => {
                        tracing::debug!(name = %name, "forward reference");
                        Ok(Incoming::Deferred(name))
                    }
                }
            }
            Some(Intrinsic::Type) => {
                let text = self.argument_text(ty, &instance, Intrinsic::Type)?;
                Ok(Incoming::Value(Value::Type(self.resolve_type_name(&text)?)))
            }
            _ => self
                .schema
                .provide_value(&instance)
                .map(Incoming::Value)
                .map_err(|e| Error::construction(ty.full_name(), e)),
        }
    }

    fn argument_text(&self, ty: &TypeRef, instance: &Value, intrinsic: Intrinsic) -> Result<String> {
        let name = intrinsic.argument_member().unwrap_or_default();
        let member = self.schema.resolve_member(ty, name).ok_or_else(|| Error::UnknownMember {
            type_name: ty.full_name(),
            member: name.to_string(),
        })?;
        match self.schema.get_value(instance, &member)? {
            Value::String(text) if !text.is_empty() => Ok(text),
            _ => Err(Error::Provider(format!("'{ty}' requires a {name}"))),
        }
    }

    // ------------------------------------------------------------------------
    // Delivery of member content
    // ------------------------------------------------------------------------

    /// Route a value or finished child into the current member.
    fn deliver(&mut self, incoming: Incoming, key: Option<Slot>) -> Result<()> {
        let frame = self.top()?;
        let member = frame
            .member
            .as_ref()
            .map(|m| m.member.clone())
            .ok_or_else(|| Error::InvalidNodeSequence(format!("value inside object '{}' outside a member", frame.ty)))?;

        match member.directive() {
            Some(Directive::Arguments | Directive::PositionalParameters) => {
                let arg = match incoming {
                    Incoming::Text(text) => Value::String(text),
                    Incoming::Value(value) => value,
                    Incoming::Deferred(name) => return Err(Error::UnresolvedReference(name)),
                };
                frame.ctor_args.push(arg);
            }
            Some(Directive::FactoryMethod) => frame.factory_method = Some(text_of(incoming, "x:FactoryMethod")?),
            Some(Directive::Initialization) => {
                let text = text_of(incoming, "_Initialization")?;
                match &mut frame.init_text {
                    Some(existing) => existing.push_str(&text),
                    None => frame.init_text = Some(text),
                }
            }
            Some(Directive::Key) => frame.key = Some(incoming.into_slot()),
            Some(Directive::Name) => {
                let name = text_of(incoming, "x:Name")?;
                match frame.instance.clone() {
                    Some(instance) if !frame.ty.is_markup_extension() => self.names.register(&name, instance)?,
                    _ => frame.name = Some(name),
                }
            }
            Some(Directive::Uid | Directive::TypeArguments) => {}
            Some(Directive::Items) => self.add_item(incoming, key)?,
            None => self.set_member(member, incoming)?,
        }
        Ok(())
    }

    fn set_member(&mut self, member: MemberRef, incoming: Incoming) -> Result<()> {
        let check_duplicates = !self.settings.skip_duplicate_property_check;
        let frame = self.top()?;
        let type_name = frame.type_name();
        let instance = frame
            .instance
            .clone()
            .ok_or_else(|| Error::InvalidNodeSequence(format!("member '{member}' set before construction")))?;
        if let Some(open) = frame.member.as_mut() {
            if open.value_set && check_duplicates {
                return Err(Error::DuplicateMember { type_name, member: member.qualified_name() });
            }
            open.value_set = true;
        }

        match incoming {
            Incoming::Text(text) => {
                let value = self.schema.convert_member_value(&member, &text)?;
                self.schema.set_value(&instance, &member, value)
            }
            Incoming::Value(value) => self.schema.set_value(&instance, &member, value),
            Incoming::Deferred(name) => {
                self.fixups.push(Fixup {
                    target: FixupTarget::Member { instance, member },
                    value: Slot::Deferred(name),
                });
                Ok(())
            }
        }
    }

    fn add_item(&mut self, incoming: Incoming, key: Option<Slot>) -> Result<()> {
        let frame = self.top()?;
        let ty = frame.ty.clone();
        let collection = frame
            .instance
            .clone()
            .ok_or_else(|| Error::InvalidNodeSequence(format!("item added to '{ty}' before construction")))?;

        if !ty.is_dictionary() {
            return match incoming {
                Incoming::Text(text) => {
                    let item = self.schema.convert_item(&ty, &text)?;
                    self.schema.add(&collection, item)
                }
                Incoming::Value(item) => self.schema.add(&collection, item),
                Incoming::Deferred(name) => {
                    self.fixups.push(Fixup {
                        target: FixupTarget::Item { collection },
                        value: Slot::Deferred(name),
                    });
                    Ok(())
                }
            };
        }

        let key = key.ok_or_else(|| Error::MissingKey { type_name: ty.full_name() })?;
        let value = match incoming {
            Incoming::Text(text) => Slot::Ready(self.schema.convert_item(&ty, &text)?),
            other => other.into_slot(),
        };
        match (key, value) {
            (Slot::Ready(key), Slot::Ready(value)) => self.insert_entry(&collection, &ty, key, value),
            (key, value) => {
                self.fixups.push(Fixup {
                    target: FixupTarget::Entry { dictionary: collection, ty, key },
                    value,
                });
                Ok(())
            }
        }
    }

    fn apply_fixups(&mut self) -> Result<()> {
        let fixups = mem::take(&mut self.fixups);
        if fixups.is_empty() {
            return Ok(());
        }
        tracing::debug!(count = fixups.len(), "replaying forward references");
        for fixup in fixup::order_by_availability(fixups, &self.names)? {
            let value = self.names.resolve(fixup.value)?;
            match fixup.target {
                FixupTarget::Member { instance, member } => self.schema.set_value(&instance, &member, value)?,
                FixupTarget::Item { collection } => self.schema.add(&collection, value)?,
                FixupTarget::Entry { dictionary, ty, key } => {
                    let key = self.names.resolve(key)?;
                    self.insert_entry(&dictionary, &ty, key, value)?;
                }
            }
        }
        Ok(())
    }
}

fn text_of(incoming: Incoming, what: &str) -> Result<String> {
    match incoming {
        Incoming::Text(text) => Ok(text),
        Incoming::Value(value @ (Value::Bool(_) | Value::Int(_) | Value::Float(_))) => Ok(value.to_string()),
        _ => Err(Error::InvalidNodeSequence(format!("{what} expects text"))),
    }
}

impl<S: SchemaProvider + ?Sized> XamlWriter for ObjectWriter<'_, S> {
    fn write_node(&mut self, node: XamlNode) -> Result<()> {
        match node {
            XamlNode::NamespaceDeclaration(decl) => {
                self.pending_namespaces.push((decl.prefix, decl.namespace));
                Ok(())
            }
            XamlNode::StartObject(ty) => self.start_object(ty),
            XamlNode::GetObject => self.get_object(),
            XamlNode::EndObject => self.end_object(),
            XamlNode::StartMember(member) => self.start_member(member),
            XamlNode::EndMember => self.end_member(),
            XamlNode::Value(value) => self.deliver(Incoming::from_node_value(value), None),
        }
    }

    fn close(&mut self) -> Result<()> {
        match self.frames.last() {
            Some(frame) => Err(Error::InvalidNodeSequence(format!("object '{}' was never closed", frame.ty))),
            None => Ok(()),
        }
    }
}
