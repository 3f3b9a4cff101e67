//! Finders: resolve names and patterns against a [`Catalog`]
//!
//! The catalog is the reflection side of a host: it reports the types it
//! knows, their ancestry, the methods available on a type or object, and the
//! live instances of a type. Finders never fail on unknown names; they report
//! them in the `not_matched` half of a [`FinderResult`](crate::FinderResult).

pub mod method_finder;
pub mod object_finder;
pub mod pointcut_finder;
pub mod type_finder;

use crate::error::{Result, WeftError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use weft_types::{MethodName, MethodScope, ObjectRef, TargetRef, TypeName, Visibility};

pub use method_finder::{MethodFinder, MethodFinderResult, MethodOptions, MethodTarget};
pub use object_finder::ObjectFinder;
pub use pointcut_finder::{FoundPointcuts, NamedPointcuts, PointcutName, PointcutQuery};
pub use type_finder::{Lineage, TypeFinder};

/// A method as reported by a [`Catalog`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: MethodName,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub scope: MethodScope,
    /// The type that defines the method; `None` for singleton methods
    #[serde(default)]
    pub declared_in: Option<TypeName>,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<MethodName>, visibility: Visibility, scope: MethodScope) -> Self {
        Self {
            name: name.into(),
            visibility,
            scope,
            declared_in: None,
        }
    }

    pub fn declared_in(mut self, type_name: TypeName) -> Self {
        self.declared_in = Some(type_name);
        self
    }
}

/// Reflection over a host's types and objects
pub trait Catalog: Send + Sync {
    /// Every known type
    fn type_names(&self) -> Vec<TypeName>;

    /// Ancestors of `type_name`, nearest first, excluding the type itself
    fn ancestors(&self, type_name: &TypeName) -> Vec<TypeName>;

    /// Methods callable on `target`, inherited ones included
    ///
    /// For a type this covers its instance and class methods; for an object,
    /// the instance methods of its type plus its singleton methods.
    fn methods(&self, target: &TargetRef) -> Vec<MethodDescriptor>;

    /// Live instances of exactly `type_name`
    fn instances(&self, _type_name: &TypeName) -> Vec<ObjectRef> {
        Vec::new()
    }

    /// Types that have `type_name` among their ancestors
    fn descendents(&self, type_name: &TypeName) -> Vec<TypeName> {
        self.type_names()
            .into_iter()
            .filter(|candidate| self.ancestors(candidate).contains(type_name))
            .collect()
    }

    fn has_type(&self, type_name: &TypeName) -> bool {
        self.type_names().contains(type_name)
    }
}

/// A compiled regular expression compared by its source text
#[derive(Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(source: &str) -> Result<Self> {
        Regex::new(source)
            .map(Pattern)
            .map_err(|e| WeftError::invalid(format!("invalid pattern /{}/: {}", source, e)))
    }

    /// Parse `/source/` notation; `None` for plain names
    pub fn parse_delimited(text: &str) -> Option<Result<Self>> {
        text.strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
            .filter(|_| text.len() >= 2)
            .map(Pattern::new)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn regex(&self) -> &Regex {
        &self.0
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern(/{}/)", self.as_str())
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.as_str())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Pattern {}

impl Hash for Pattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl PartialOrd for Pattern {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pattern {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

/// Selects types
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeSelector {
    /// A type reference, taken as found without consulting the catalog
    Type(TypeName),
    /// An exact name, looked up in the catalog
    Name(String),
    /// A pattern applied segment by segment to qualified names
    Pattern(Pattern),
}

impl TypeSelector {
    /// Parse option text: `/.../` is a pattern, anything else a name
    pub fn parse(text: &str) -> Result<Self> {
        match Pattern::parse_delimited(text) {
            Some(pattern) => Ok(TypeSelector::Pattern(pattern?)),
            None => Ok(TypeSelector::Name(text.to_string())),
        }
    }
}

impl fmt::Display for TypeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSelector::Type(name) => write!(f, "{}", name),
            TypeSelector::Name(name) => f.write_str(name),
            TypeSelector::Pattern(pattern) => write!(f, "{}", pattern),
        }
    }
}

impl From<TypeName> for TypeSelector {
    fn from(name: TypeName) -> Self {
        TypeSelector::Type(name)
    }
}

/// Selects objects: one specific object, or the live instances of types
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectSelector {
    Object(ObjectRef),
    InstancesOf(TypeSelector),
}

impl fmt::Display for ObjectSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectSelector::Object(object) => write!(f, "{}", object),
            ObjectSelector::InstancesOf(selector) => write!(f, "instances of {}", selector),
        }
    }
}

impl From<ObjectRef> for ObjectSelector {
    fn from(object: ObjectRef) -> Self {
        ObjectSelector::Object(object)
    }
}

/// Selects methods (or attributes) by name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MethodSelector {
    /// Every eligible method
    All,
    Name(MethodName),
    Pattern(Pattern),
}

impl MethodSelector {
    /// Parse option text: `all`, `/.../`, or a literal name
    pub fn parse(text: &str) -> Result<Self> {
        if text == MethodName::ALL {
            return Ok(MethodSelector::All);
        }
        match Pattern::parse_delimited(text) {
            Some(pattern) => Ok(MethodSelector::Pattern(pattern?)),
            None => Ok(MethodSelector::Name(MethodName::new(text))),
        }
    }

    pub fn matches(&self, name: &MethodName) -> bool {
        match self {
            MethodSelector::All => true,
            MethodSelector::Name(literal) => literal == name,
            MethodSelector::Pattern(pattern) => pattern.is_match(name.as_str()),
        }
    }

    /// Name recorded when nothing matched this selector
    pub fn token(&self) -> MethodName {
        match self {
            MethodSelector::All => MethodName::all(),
            MethodSelector::Name(name) => name.clone(),
            MethodSelector::Pattern(pattern) => MethodName::new(pattern.to_string()),
        }
    }
}

impl fmt::Display for MethodSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

impl From<&str> for MethodSelector {
    fn from(name: &str) -> Self {
        if name == MethodName::ALL {
            MethodSelector::All
        } else {
            MethodSelector::Name(MethodName::new(name))
        }
    }
}

impl From<MethodName> for MethodSelector {
    fn from(name: MethodName) -> Self {
        MethodSelector::from(name.as_str())
    }
}

impl From<Pattern> for MethodSelector {
    fn from(pattern: Pattern) -> Self {
        MethodSelector::Pattern(pattern)
    }
}
