//! Shared types for weft
//!
//! This crate provides the identity types used across the weft crates:
//! type names, object handles, the type-or-object target union, method
//! names and the visibility/scope enums a method is described with.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Dynamic value passed as a parameter to, or returned from, an operation.
pub use serde_json::Value;

/// Namespace separator used in fully-qualified type names.
pub const NAMESPACE_SEPARATOR: &str = "::";

/// Fully-qualified type name, e.g. `Shop::Order`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(String);

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `::`-separated segments of the name.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(NAMESPACE_SEPARATOR)
    }

    /// The last segment, i.e. the name without its enclosing namespace.
    pub fn leaf(&self) -> &str {
        self.0
            .rsplit_once(NAMESPACE_SEPARATOR)
            .map(|(_, leaf)| leaf)
            .unwrap_or(&self.0)
    }

    /// The enclosing namespace, if the type is nested.
    pub fn parent(&self) -> Option<TypeName> {
        self.0
            .rsplit_once(NAMESPACE_SEPARATOR)
            .map(|(parent, _)| TypeName::new(parent))
    }

    pub fn is_top_level(&self) -> bool {
        !self.0.contains(NAMESPACE_SEPARATOR)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        TypeName::new(name)
    }
}

impl From<String> for TypeName {
    fn from(name: String) -> Self {
        TypeName(name)
    }
}

/// Object identifier, unique within the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

static OBJECT_COUNTER: AtomicU64 = AtomicU64::new(1);

impl ObjectId {
    /// Allocate a fresh identifier
    pub fn next() -> Self {
        Self(OBJECT_COUNTER.fetch_add(1, AtomicOrdering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a live object
///
/// Two handles are equal only when they name the same object; the type name
/// travels along for display and dispatch but plays no part in identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectRef {
    id: ObjectId,
    type_name: TypeName,
}

impl ObjectRef {
    pub fn new(id: ObjectId, type_name: TypeName) -> Self {
        Self { id, type_name }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn type_name(&self) -> &TypeName {
        &self.type_name
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ObjectRef {}

impl Hash for ObjectRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for ObjectRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjectRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<{}:{}>", self.type_name, self.id)
    }
}

/// The receiver an operation is defined on: a type, or one specific object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetRef {
    Type(TypeName),
    Object(ObjectRef),
}

impl TargetRef {
    /// The type itself, or the type of the object
    pub fn type_name(&self) -> &TypeName {
        match self {
            TargetRef::Type(name) => name,
            TargetRef::Object(object) => object.type_name(),
        }
    }

    pub fn as_type(&self) -> Option<&TypeName> {
        match self {
            TargetRef::Type(name) => Some(name),
            TargetRef::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            TargetRef::Type(_) => None,
            TargetRef::Object(object) => Some(object),
        }
    }

    pub fn is_type(&self) -> bool {
        matches!(self, TargetRef::Type(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, TargetRef::Object(_))
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetRef::Type(name) => write!(f, "{}", name),
            TargetRef::Object(object) => write!(f, "{}", object),
        }
    }
}

impl From<TypeName> for TargetRef {
    fn from(name: TypeName) -> Self {
        TargetRef::Type(name)
    }
}

impl From<ObjectRef> for TargetRef {
    fn from(object: ObjectRef) -> Self {
        TargetRef::Object(object)
    }
}

/// Method name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodName(String);

impl MethodName {
    /// Reserved name meaning "every eligible method"
    pub const ALL: &'static str = "all";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn all() -> Self {
        Self::new(Self::ALL)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_all(&self) -> bool {
        self.0 == Self::ALL
    }

    /// Attribute writers are named `attr=`
    pub fn is_writer(&self) -> bool {
        self.0.ends_with('=')
    }
}

impl fmt::Display for MethodName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MethodName {
    fn from(name: &str) -> Self {
        MethodName::new(name)
    }
}

impl From<String> for MethodName {
    fn from(name: String) -> Self {
        MethodName(name)
    }
}

/// Method visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
    /// The method could not be found
    Unknown,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
            Visibility::Unknown => "unknown",
        };
        f.write_str(text)
    }
}

/// Where a method is defined relative to its receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MethodScope {
    /// Called on instances of a type
    #[default]
    Instance,
    /// Called on the type itself
    Class,
    /// Defined on one specific object only
    Singleton,
}

impl MethodScope {
    /// Instance and singleton methods are both invoked on an object
    pub fn is_instance(&self) -> bool {
        !matches!(self, MethodScope::Class)
    }
}
