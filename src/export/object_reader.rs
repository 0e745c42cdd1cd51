//! Object graph → structural nodes.

use hashbrown::{HashMap, HashSet};

use crate::model::{Directive, Intrinsic, ObjectRef, TypeRef, Value, XAML_NAMESPACE};
use crate::nodes::{Bookmark, NamespaceDeclaration, NodeList, NodeListReader, XamlNode, XamlReader};
use crate::schema::SchemaProvider;
use crate::{Error, Result};

/// Node reader over an existing object graph.
///
/// Objects reachable more than once are named `__ReferenceID{n}` where
/// first written and referenced with `x:Reference` afterwards, which also
/// covers cycles.
pub struct XamlObjectReader {
    inner: NodeListReader<'static>,
}

impl XamlObjectReader {
    pub fn new<S: SchemaProvider + ?Sized>(schema: &S, root: &Value) -> Result<Self> {
        let mut walker = Walker {
            schema,
            out: Vec::new(),
            prefixes: Vec::new(),
            names: shared_objects(root),
            written: HashSet::new(),
        };
        if let Some(ty) = schema.type_of(root).filter(|t| t.namespace() != XAML_NAMESPACE) {
            walker.prefixes.push((ty.namespace().to_string(), String::new()));
        }
        walker.object_form(root, None)?;

        let mut nodes: NodeList = walker
            .prefixes
            .iter()
            .map(|(ns, prefix)| XamlNode::NamespaceDeclaration(NamespaceDeclaration::new(prefix.clone(), ns.clone())))
            .collect();
        for node in walker.out {
            nodes.push(node);
        }
        tracing::debug!(nodes = nodes.len(), shared = walker.names.len(), "object graph read");
        Ok(Self { inner: nodes.into_reader() })
    }

    pub fn bookmark(&self) -> Bookmark {
        self.inner.bookmark()
    }

    pub fn seek(&mut self, bookmark: Bookmark) -> Result<()> {
        self.inner.seek(bookmark)
    }
}

impl XamlReader for XamlObjectReader {
    fn read(&mut self) -> Result<bool> {
        self.inner.read()
    }

    fn current(&self) -> Option<&XamlNode> {
        self.inner.current()
    }

    fn is_eof(&self) -> bool {
        self.inner.is_eof()
    }
}

/// Names for objects reached more than once, in first-visit order.
fn shared_objects(root: &Value) -> HashMap<usize, String> {
    fn visit(value: &Value, counts: &mut HashMap<usize, usize>, order: &mut Vec<usize>) {
        let Value::Object(obj) = value else {
            return;
        };
        let seen = counts.entry(obj.id()).or_insert(0);
        *seen += 1;
        if *seen > 1 {
            return;
        }
        order.push(obj.id());
        for (_, member_value) in obj.members() {
            visit(&member_value, counts, order);
        }
        for item in obj.items() {
            visit(&item, counts, order);
        }
        for (key, entry) in obj.entries() {
            visit(&key, counts, order);
            visit(&entry, counts, order);
        }
    }

    let mut counts = HashMap::new();
    let mut order = Vec::new();
    visit(root, &mut counts, &mut order);
    order
        .into_iter()
        .filter(|id| counts.get(id).is_some_and(|c| *c > 1))
        .enumerate()
        .map(|(n, id)| (id, format!("__ReferenceID{n}")))
        .collect()
}

struct Walker<'s, S: ?Sized> {
    schema: &'s S,
    out: Vec<XamlNode>,
    /// `(namespace, prefix)` in first-use order.
    prefixes: Vec<(String, String)>,
    names: HashMap<usize, String>,
    written: HashSet<usize>,
}

impl<S: SchemaProvider + ?Sized> Walker<'_, S> {
    fn prefix(&mut self, namespace: &str) -> String {
        if let Some((_, prefix)) = self.prefixes.iter().find(|(ns, _)| ns == namespace) {
            return prefix.clone();
        }
        let taken = |p: &str| self.prefixes.iter().any(|(_, q)| q == p);
        let preferred = self
            .schema
            .preferred_prefix(namespace)
            .or_else(|| (namespace == XAML_NAMESPACE).then(|| "x".to_string()));
        let prefix = match preferred {
            Some(p) if !taken(&p) => p,
            _ => (1..).map(|i| format!("ns{i}")).find(|p| !taken(p)).unwrap_or_default(),
        };
        self.prefixes.push((namespace.to_string(), prefix.clone()));
        prefix
    }

    fn use_type(&mut self, ty: &TypeRef) {
        self.prefix(ty.namespace());
        for arg in ty.type_args() {
            self.use_type(arg);
        }
    }

    /// `p:Name(p:Arg)` text understood by `{x:Type}`.
    fn type_text(&mut self, ty: &TypeRef) -> String {
        let prefix = self.prefix(ty.namespace());
        let mut text = if prefix.is_empty() { ty.name().to_string() } else { format!("{prefix}:{}", ty.name()) };
        if !ty.type_args().is_empty() {
            let args: Vec<String> = ty.type_args().iter().map(|a| self.type_text(a)).collect();
            text.push('(');
            text.push_str(&args.join(", "));
            text.push(')');
        }
        text
    }

    fn intrinsic(&self, intrinsic: Intrinsic) -> Result<TypeRef> {
        self.schema
            .intrinsic(intrinsic)
            .ok_or_else(|| Error::Provider(format!("schema has no {}", intrinsic.type_name())))
    }

    fn start(&mut self, ty: &TypeRef) {
        self.use_type(ty);
        if !ty.type_args().is_empty() {
            // written as x:TypeArguments
            self.prefix(XAML_NAMESPACE);
        }
        self.out.push(XamlNode::StartObject(ty.clone()));
    }

    fn directive(&mut self, directive: Directive, text: String) {
        self.out.push(XamlNode::StartMember(directive.member()));
        self.out.push(XamlNode::Value(Value::String(text)));
        self.out.push(XamlNode::EndMember);
    }

    fn key(&mut self, key: Option<&Value>) -> Result<()> {
        let Some(key) = key else {
            return Ok(());
        };
        self.prefix(XAML_NAMESPACE);
        self.out.push(XamlNode::StartMember(Directive::Key.member()));
        match key {
            Value::String(text) => self.out.push(XamlNode::Value(Value::String(text.clone()))),
            other => self.object_form(other, None)?,
        }
        self.out.push(XamlNode::EndMember);
        Ok(())
    }

    fn member_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::String(_) | Value::Int(_) | Value::Float(_) | Value::Bool(_) => {
                self.out.push(XamlNode::Value(value.clone()));
                Ok(())
            }
            other => self.object_form(other, None),
        }
    }

    /// Any value written as an object, optionally carrying a dictionary key.
    fn object_form(&mut self, value: &Value, key: Option<&Value>) -> Result<()> {
        match value {
            Value::Object(obj) => return self.object(obj, key),
            Value::Null => {
                let ty = self.intrinsic(Intrinsic::Null)?;
                self.start(&ty);
                self.key(key)?;
            }
            Value::Type(target) => {
                let ty = self.intrinsic(Intrinsic::Type)?;
                self.start(&ty);
                self.key(key)?;
                let text = self.type_text(target);
                self.directive(Directive::PositionalParameters, text);
            }
            scalar => {
                let ty = self
                    .schema
                    .type_of(scalar)
                    .ok_or_else(|| Error::Provider(format!("no type for {} value", scalar.type_name())))?;
                let text = self
                    .schema
                    .convert_to_text(scalar)
                    .ok_or_else(|| Error::Provider(format!("no text form for '{scalar}'")))?;
                self.start(&ty);
                self.key(key)?;
                if !text.is_empty() {
                    self.directive(Directive::Initialization, text);
                }
            }
        }
        self.out.push(XamlNode::EndObject);
        Ok(())
    }

    fn object(&mut self, obj: &ObjectRef, key: Option<&Value>) -> Result<()> {
        let name = self.names.get(&obj.id()).cloned();
        if let Some(name) = &name {
            if !self.written.insert(obj.id()) {
                let ty = self.intrinsic(Intrinsic::Reference)?;
                self.start(&ty);
                self.key(key)?;
                self.directive(Directive::PositionalParameters, name.clone());
                self.out.push(XamlNode::EndObject);
                return Ok(());
            }
        }

        self.start(&obj.ty());
        self.key(key)?;
        if let Some(name) = name {
            self.prefix(XAML_NAMESPACE);
            self.directive(Directive::Name, name);
        }
        for (member, value) in obj.members() {
            if let Some(owner) = member.declaring_type().filter(|_| member.is_attachable()) {
                self.prefix(&owner.namespace);
            }
            self.out.push(XamlNode::StartMember(member));
            self.member_value(&value)?;
            self.out.push(XamlNode::EndMember);
        }
        let items = obj.items();
        if !items.is_empty() {
            self.out.push(XamlNode::StartMember(Directive::Items.member()));
            for item in &items {
                self.object_form(item, None)?;
            }
            self.out.push(XamlNode::EndMember);
        }
        let entries = obj.entries();
        if !entries.is_empty() {
            self.out.push(XamlNode::StartMember(Directive::Items.member()));
            for (entry_key, entry) in &entries {
                self.object_form(entry, Some(entry_key))?;
            }
            self.out.push(XamlNode::EndMember);
        }
        self.out.push(XamlNode::EndObject);
        Ok(())
    }
}
