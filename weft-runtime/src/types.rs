//! Method bodies and the call record they receive
//!
//! A method body is an ordinary closure. It sees the receiver, the
//! arguments and the callback of one call through [`Call`], and can reach
//! back into the runtime to read object fields or invoke other methods.

use crate::error::RuntimeError;
use crate::runtime::Runtime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use weft_core::{Callback, MethodDescriptor};
use weft_types::{MethodName, ObjectRef, TargetRef, TypeName, Value};

/// The real implementation of a method
pub type MethodBody = Arc<dyn Fn(&Call<'_>) -> anyhow::Result<Value> + Send + Sync>;

/// Wrap a closure as a [`MethodBody`]
pub fn method<F>(body: F) -> MethodBody
where
    F: Fn(&Call<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    Arc::new(body)
}

/// Which accessor methods an attribute gets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeAccess {
    /// `name`
    Reader,
    /// `name=`
    Writer,
    /// Both
    #[default]
    Accessor,
}

impl AttributeAccess {
    pub fn has_reader(&self) -> bool {
        matches!(self, AttributeAccess::Reader | AttributeAccess::Accessor)
    }

    pub fn has_writer(&self) -> bool {
        matches!(self, AttributeAccess::Writer | AttributeAccess::Accessor)
    }
}

/// One invocation of a method body
pub struct Call<'a> {
    pub(crate) runtime: &'a Runtime,
    pub(crate) receiver: &'a TargetRef,
    pub(crate) method: &'a MethodName,
    pub(crate) parameters: &'a [Value],
    pub(crate) callback: Option<&'a Callback>,
}

impl<'a> Call<'a> {
    pub fn runtime(&self) -> &Runtime {
        self.runtime
    }

    /// The object, or the type for class methods
    pub fn receiver(&self) -> &TargetRef {
        self.receiver
    }

    /// The receiving object; an error inside class methods
    pub fn object(&self) -> Result<&ObjectRef, RuntimeError> {
        self.receiver
            .as_object()
            .ok_or_else(|| RuntimeError::NotAnObject {
                receiver: self.receiver.to_string(),
                method: self.method.clone(),
            })
    }

    pub fn method(&self) -> &MethodName {
        self.method
    }

    pub fn parameters(&self) -> &[Value] {
        self.parameters
    }

    /// The argument at `index`
    pub fn argument(&self, index: usize) -> Result<&Value, RuntimeError> {
        self.parameters
            .get(index)
            .ok_or_else(|| RuntimeError::MissingArgument {
                method: self.method.clone(),
                index,
            })
    }

    pub fn callback(&self) -> Option<&Callback> {
        self.callback
    }

    /// Call the callback passed with this invocation
    pub fn yield_to(&self, arguments: &[Value]) -> anyhow::Result<Value> {
        let callback = self.callback.ok_or_else(|| RuntimeError::NoCallback {
            method: self.method.clone(),
        })?;
        callback(arguments)
    }

    /// A field of the receiving object; `Null` when unset
    pub fn field(&self, name: &str) -> Result<Value, RuntimeError> {
        let object = self.object()?;
        Ok(self.runtime.field(object, name)?.unwrap_or(Value::Null))
    }

    pub fn set_field(&self, name: &str, value: Value) -> Result<(), RuntimeError> {
        let object = self.object()?;
        self.runtime.set_field(object, name, value)
    }
}

/// A defined method: what the catalog reports plus the body to run
#[derive(Clone)]
pub(crate) struct MethodDef {
    pub descriptor: MethodDescriptor,
    pub body: MethodBody,
}

/// Methods keyed by name and instance flag
pub(crate) type MethodTable = BTreeMap<(MethodName, bool), MethodDef>;

pub(crate) struct TypeDef {
    pub parent: Option<TypeName>,
    pub methods: MethodTable,
}

pub(crate) struct ObjectSlot {
    pub object: ObjectRef,
    pub fields: BTreeMap<String, Value>,
    pub singleton_methods: BTreeMap<MethodName, MethodDef>,
}

impl ObjectSlot {
    pub fn new(object: ObjectRef) -> Self {
        Self {
            object,
            fields: BTreeMap::new(),
            singleton_methods: BTreeMap::new(),
        }
    }
}
