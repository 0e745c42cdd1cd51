//! Access levels gating which assemblies and types a loader may instantiate.
//!
//! An [`AccessLevel`] is a normalized set of grants:
//!
//! | Grant | Meaning |
//! |-------|---------|
//! | `Unrestricted` | every type of every assembly (top) |
//! | `Empty` | nothing (bottom) |
//! | `Assembly(a)` | every type declared in assembly `a` |
//! | `Type { a, t }` | the single type `t` of assembly `a` |
//!
//! A type grant is subsumed by the assembly grant of its declaring
//! assembly; normalization drops subsumed type grants so that equality is
//! plain set equality.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::TypeRef;
use crate::{Error, Result};

// ============================================================================
// AssemblyName
// ============================================================================

/// Parsed assembly display name: `Name, Version=1.0.0.0, Culture=neutral, PublicKeyToken=…`.
///
/// Comparison is case-insensitive on every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssemblyName {
    name: String,
    version: Option<String>,
    culture: Option<String>,
    public_key_token: Option<String>,
}

impl AssemblyName {
    pub fn parse(text: &str) -> Result<Self> {
        let mut parts = text.split(',').map(str::trim);
        let name = match parts.next() {
            Some(n) if !n.is_empty() && !n.contains('=') => n.to_string(),
            _ => return Err(Error::Config(format!("invalid assembly name '{text}'"))),
        };
        let mut parsed = Self { name, version: None, culture: None, public_key_token: None };
        for part in parts {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("invalid assembly name component '{part}'")))?;
            let value = Some(value.trim().to_string());
            match key.trim().to_ascii_lowercase().as_str() {
                "version" => parsed.version = value,
                "culture" => parsed.culture = value,
                "publickeytoken" => parsed.public_key_token = value,
                other => {
                    return Err(Error::Config(format!("unknown assembly name component '{other}'")));
                }
            }
        }
        Ok(parsed)
    }

    /// Simple name without version/culture/key.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn key(&self) -> [Option<String>; 4] {
        let lower = |s: &Option<String>| s.as_ref().map(|s| s.to_ascii_lowercase());
        [
            Some(self.name.to_ascii_lowercase()),
            lower(&self.version),
            lower(&self.culture),
            lower(&self.public_key_token),
        ]
    }
}

impl PartialEq for AssemblyName {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for AssemblyName {}

impl PartialOrd for AssemblyName {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AssemblyName {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

impl std::hash::Hash for AssemblyName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for AssemblyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(v) = &self.version {
            write!(f, ", Version={v}")?;
        }
        if let Some(c) = &self.culture {
            write!(f, ", Culture={c}")?;
        }
        if let Some(t) = &self.public_key_token {
            write!(f, ", PublicKeyToken={t}")?;
        }
        Ok(())
    }
}

impl FromStr for AssemblyName {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AssemblyName {
    type Error = Error;
    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl TryFrom<&str> for AssemblyName {
    type Error = Error;
    fn try_from(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<AssemblyName> for String {
    fn from(a: AssemblyName) -> String {
        a.to_string()
    }
}

// ============================================================================
// Grants
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccessGrant {
    Unrestricted,
    Empty,
    Assembly(AssemblyName),
    Type { assembly: AssemblyName, type_name: String },
}

/// Non-trivial grant stored in a normalized level.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Scope {
    Assembly(AssemblyName),
    Type(AssemblyName, String),
}

impl Scope {
    fn assembly(&self) -> &AssemblyName {
        match self {
            Scope::Assembly(a) | Scope::Type(a, _) => a,
        }
    }

    fn to_grant(&self) -> AccessGrant {
        match self {
            Scope::Assembly(a) => AccessGrant::Assembly(a.clone()),
            Scope::Type(a, t) => AccessGrant::Type { assembly: a.clone(), type_name: t.clone() },
        }
    }
}

// ============================================================================
// AccessLevel
// ============================================================================

/// Normalized permission value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<AccessGrant>", into = "Vec<AccessGrant>")]
pub struct AccessLevel {
    unrestricted: bool,
    scopes: BTreeSet<Scope>,
}

impl AccessLevel {
    pub fn unrestricted() -> Self {
        Self { unrestricted: true, scopes: BTreeSet::new() }
    }

    pub fn empty() -> Self {
        Self { unrestricted: false, scopes: BTreeSet::new() }
    }

    /// Access to every type of one assembly.
    pub fn assembly_access_to(assembly: impl Into<AssemblyName>) -> Self {
        Self::from_grant(AccessGrant::Assembly(assembly.into()))
    }

    /// Access to a single type.
    pub fn type_access_to(assembly: impl Into<AssemblyName>, type_name: impl Into<String>) -> Self {
        Self::from_grant(AccessGrant::Type {
            assembly: assembly.into(),
            type_name: type_name.into(),
        })
    }

    /// Access to a resolved type; `None` when the type has no declaring assembly.
    pub fn private_access_to(ty: &TypeRef) -> Option<Self> {
        ty.assembly()
            .map(|a| Self::type_access_to(a.clone(), ty.full_name()))
    }

    pub fn from_grant(grant: AccessGrant) -> Self {
        Self::from_grants([grant])
    }

    pub fn from_grants(grants: impl IntoIterator<Item = AccessGrant>) -> Self {
        let mut level = Self::empty();
        for grant in grants {
            match grant {
                AccessGrant::Unrestricted => level.unrestricted = true,
                AccessGrant::Empty => {}
                AccessGrant::Assembly(a) => {
                    level.scopes.insert(Scope::Assembly(a));
                }
                AccessGrant::Type { assembly, type_name } => {
                    level.scopes.insert(Scope::Type(assembly, type_name));
                }
            }
        }
        level.normalize()
    }

    fn normalize(mut self) -> Self {
        if self.unrestricted {
            self.scopes.clear();
            return self;
        }
        let assemblies: BTreeSet<AssemblyName> = self
            .scopes
            .iter()
            .filter_map(|s| match s {
                Scope::Assembly(a) => Some(a.clone()),
                Scope::Type(..) => None,
            })
            .collect();
        self.scopes.retain(|s| match s {
            Scope::Assembly(_) => true,
            Scope::Type(a, _) => !assemblies.contains(a),
        });
        self
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn is_unrestricted(&self) -> bool {
        self.unrestricted
    }

    pub fn is_empty(&self) -> bool {
        !self.unrestricted && self.scopes.is_empty()
    }

    /// Grants of the normalized form, in a stable order.
    pub fn grants(&self) -> Vec<AccessGrant> {
        if self.unrestricted {
            return vec![AccessGrant::Unrestricted];
        }
        if self.scopes.is_empty() {
            return vec![AccessGrant::Empty];
        }
        self.scopes.iter().map(Scope::to_grant).collect()
    }

    pub fn includes(&self, grant: &AccessGrant) -> bool {
        match grant {
            AccessGrant::Empty => true,
            AccessGrant::Unrestricted => self.unrestricted,
            AccessGrant::Assembly(a) => self.includes_scope(&Scope::Assembly(a.clone())),
            AccessGrant::Type { assembly, type_name } => {
                self.includes_scope(&Scope::Type(assembly.clone(), type_name.clone()))
            }
        }
    }

    fn includes_scope(&self, scope: &Scope) -> bool {
        self.unrestricted
            || self.scopes.contains(scope)
            || self.scopes.contains(&Scope::Assembly(scope.assembly().clone()))
    }

    /// Whether this level permits instantiating `ty`. Types without a
    /// declaring assembly are always allowed.
    pub fn allows(&self, ty: &TypeRef) -> bool {
        match ty.assembly() {
            None => true,
            Some(a) => self.includes_scope(&Scope::Type(a.clone(), ty.full_name())),
        }
    }

    pub fn is_subset_of(&self, other: &AccessLevel) -> bool {
        if other.unrestricted {
            return true;
        }
        if self.unrestricted {
            return false;
        }
        self.scopes.iter().all(|s| other.includes_scope(s))
    }

    // ========================================================================
    // Set algebra
    // ========================================================================

    pub fn union(&self, other: &AccessLevel) -> AccessLevel {
        Self {
            unrestricted: self.unrestricted || other.unrestricted,
            scopes: self.scopes.union(&other.scopes).cloned().collect(),
        }
        .normalize()
    }

    pub fn intersect(&self, other: &AccessLevel) -> AccessLevel {
        if self.unrestricted {
            return other.clone();
        }
        if other.unrestricted {
            return self.clone();
        }
        let scopes = self
            .scopes
            .iter()
            .filter(|s| other.includes_scope(s))
            .chain(other.scopes.iter().filter(|s| self.includes_scope(s)))
            .cloned()
            .collect();
        Self { unrestricted: false, scopes }.normalize()
    }
}

impl Default for AccessLevel {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Vec<AccessGrant>> for AccessLevel {
    fn from(grants: Vec<AccessGrant>) -> Self {
        Self::from_grants(grants)
    }
}

impl From<AccessLevel> for Vec<AccessGrant> {
    fn from(level: AccessLevel) -> Self {
        level.grants()
    }
}
