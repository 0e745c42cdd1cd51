//! # xaml-rs — Streaming XAML Reader/Writer Pipeline
//!
//! Markup text ↔ structural node stream ↔ live object graph.
//!
//! ## Design Principles
//!
//! 1. **Nodes are the lingua franca**: every stage speaks `XamlNode`; any
//!    balanced node range is independently replayable
//! 2. **Trait-first**: `SchemaProvider` is the contract between the pipeline
//!    and the host type system
//! 3. **Parser owns nothing**: `{Ext ...}` text → AST is a pure function
//! 4. **Explicit construction state**: the object writer is a frame state
//!    machine, not a pile of callbacks
//!
//! ## Quick Start
//!
//! ```rust
//! use xaml_rs::{Loader, MemorySchema, MemberDef, TypeDef, Value};
//!
//! # fn example() -> xaml_rs::Result<()> {
//! let ns = "clr-namespace:Demo;assembly=Demo";
//! let schema = MemorySchema::new()
//!     .with(TypeDef::new(ns, "Greeting").member(MemberDef::new("Text")));
//! let loader = Loader::with_schema(schema);
//!
//! let root = loader.load(r#"<Greeting Text="Hello" xmlns="clr-namespace:Demo;assembly=Demo" />"#)?;
//! assert_eq!(root.as_object().and_then(|o| o.get("Text")), Some(Value::from("Hello")));
//!
//! let text = loader.save(&root)?;
//! assert!(text.starts_with("<Greeting Text=\"Hello\""));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Pipeline Stages
//!
//! | Stage | Module | Direction |
//! |-------|--------|-----------|
//! | `XamlXmlReader` | `reader` | markup text → nodes |
//! | `ObjectWriter` | `writer` | nodes → object graph |
//! | `XamlObjectReader` | `export` | object graph → nodes |
//! | `XamlTextWriter` | `export` | nodes → markup text |

// ============================================================================
// Modules
// ============================================================================

pub mod access;
pub mod export;
pub mod markup;
pub mod model;
pub mod nodes;
pub mod reader;
pub mod schema;
pub mod writer;

use serde::{Deserialize, Serialize};

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Directive, Intrinsic, MemberRef, ObjectRef, TypeName, TypeRef, TypeSlot, Value,
    XAML_NAMESPACE,
};

// ============================================================================
// Re-exports: Nodes
// ============================================================================

pub use nodes::{
    NamespaceDeclaration, NodeList, NodeListReader, NodeType, SubtreeReader,
    XamlNode, XamlReader, XamlWriter, transform,
};

// ============================================================================
// Re-exports: Schema, Access
// ============================================================================

pub use access::{AccessGrant, AccessLevel, AssemblyName};
pub use schema::{MemberDef, MemorySchema, SchemaProvider, TypeDef};

// ============================================================================
// Re-exports: Pipeline stages
// ============================================================================

pub use export::{TextWriterSettings, XamlObjectReader, XamlTextWriter};
pub use reader::{ReaderSettings, XamlXmlReader};
pub use writer::{LifecycleEvent, ObjectWriter, ObjectWriterSettings};

// ============================================================================
// Configuration
// ============================================================================

/// Settings for every stage a [`Loader`] drives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub reader: ReaderSettings,
    pub writer: ObjectWriterSettings,
    pub text: TextWriterSettings,
}

impl LoaderConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

// ============================================================================
// Top-level Loader handle
// ============================================================================

/// The primary entry point. A `Loader` wraps a schema provider and drives
/// the reader/writer stages.
pub struct Loader<S: SchemaProvider> {
    schema: S,
    config: LoaderConfig,
}

impl<S: SchemaProvider> Loader<S> {
    pub fn with_schema(schema: S) -> Self {
        Self { schema, config: LoaderConfig::default() }
    }

    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Access the underlying schema (for advanced use).
    pub fn schema(&self) -> &S {
        &self.schema
    }

    /// Markup text → buffered node list.
    pub fn read_nodes(&self, text: &str) -> Result<NodeList> {
        reader::read_nodes(text, &self.schema, &self.config.reader)
    }

    /// Markup text → object graph.
    pub fn load(&self, text: &str) -> Result<Value> {
        let mut reader = XamlXmlReader::new(text, &self.schema, &self.config.reader)?;
        self.load_nodes(&mut reader)
    }

    /// Any node source → object graph.
    pub fn load_nodes<R: XamlReader + ?Sized>(&self, reader: &mut R) -> Result<Value> {
        let mut writer = ObjectWriter::new(&self.schema, self.config.writer.clone());
        transform(reader, &mut writer)?;
        writer.into_result()
    }

    /// Object graph → markup text.
    pub fn save(&self, value: &Value) -> Result<String> {
        let mut reader = XamlObjectReader::new(&self.schema, value)?;
        let mut writer = XamlTextWriter::new(self.config.text.clone());
        transform(&mut reader, &mut writer)?;
        writer.into_string()
    }
}

/// Loader over a fresh in-memory schema.
impl Loader<MemorySchema> {
    pub fn in_memory() -> Self {
        Self::with_schema(MemorySchema::new())
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("XAML syntax error at position {position}: {message}")]
    SyntaxError { position: usize, message: String },

    #[error("Ordering error on '{type_name}': {message}")]
    OrderingError { type_name: String, message: String },

    #[error("Ambiguous match for '{name}' on '{type_name}'")]
    AmbiguousMatch { type_name: String, name: String },

    #[error("Missing method '{name}' on '{type_name}'")]
    MissingMethod { type_name: String, name: String },

    #[error("Factory method '{method}' returned null for non-nullable type '{type_name}'")]
    InvalidReturn { type_name: String, method: String },

    #[error("Duplicate member '{member}' on '{type_name}'")]
    DuplicateMember { type_name: String, member: String },

    #[error("Name '{0}' is already registered in this namescope")]
    DuplicateName(String),

    #[error("Construction of '{type_name}' failed: {source}")]
    ConstructionFailed { type_name: String, source: Box<Error> },

    #[error("Permission denied: '{type_name}' from assembly '{assembly}' is not in the access level")]
    PermissionDenied { type_name: String, assembly: String },

    #[error("Unknown type '{name}' in namespace '{namespace}'")]
    UnknownType { namespace: String, name: String },

    #[error("Unknown member '{member}' on '{type_name}'")]
    UnknownMember { type_name: String, member: String },

    #[error("Unknown namespace prefix '{0}'")]
    UnknownPrefix(String),

    #[error("Unresolved reference to '{0}'")]
    UnresolvedReference(String),

    #[error("Dictionary item of '{type_name}' has no key")]
    MissingKey { type_name: String },

    #[error("Cannot convert '{text}' to {target}")]
    Conversion { target: String, text: String },

    #[error("Invalid node sequence: {0}")]
    InvalidNodeSequence(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a provider failure during construction of `type_name`.
    /// Method-resolution and permission errors surface unchanged.
    pub fn construction(type_name: impl Into<String>, err: Error) -> Error {
        match err {
            e @ (Error::MissingMethod { .. }
            | Error::AmbiguousMatch { .. }
            | Error::InvalidReturn { .. }
            | Error::PermissionDenied { .. }
            | Error::ConstructionFailed { .. }) => e,
            other => Error::ConstructionFailed { type_name: type_name.into(), source: Box::new(other) },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
