//! Catalog manifests: types, methods and objects described in YAML
//!
//! ```yaml
//! types:
//!   - name: Watchful
//!     methods:
//!       - greet
//!       - name: secret
//!         visibility: private
//!     class_methods: [create]
//!     attributes:
//!       - name
//!       - name: id
//!         access: reader
//!   - name: Shop::Order
//!     parent: Watchful
//! objects:
//!   - type: Shop::Order
//!     singleton_methods: [expedite]
//! ```
//!
//! Methods loaded from a manifest have no behavior of their own and answer
//! `null`; a manifest exists to be matched against, not run.

use crate::error::{Result, RuntimeError};
use crate::runtime::Runtime;
use crate::types::AttributeAccess;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use weft_core::WeftConfig;
use weft_types::{ObjectRef, TypeName, Value, Visibility};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub types: Vec<TypeEntry>,
    #[serde(default)]
    pub objects: Vec<ObjectEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeEntry {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub methods: Vec<MethodEntry>,
    #[serde(default)]
    pub class_methods: Vec<MethodEntry>,
    #[serde(default)]
    pub attributes: Vec<AttributeEntry>,
}

/// A method given by name (public) or with its visibility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MethodEntry {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        visibility: Visibility,
    },
}

impl MethodEntry {
    pub fn name(&self) -> &str {
        match self {
            MethodEntry::Name(name) | MethodEntry::Detailed { name, .. } => name,
        }
    }

    pub fn visibility(&self) -> Visibility {
        match self {
            MethodEntry::Name(_) => Visibility::Public,
            MethodEntry::Detailed { visibility, .. } => *visibility,
        }
    }
}

/// An attribute given by name (reader and writer) or with its access
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeEntry {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        access: AttributeAccess,
    },
}

impl AttributeEntry {
    pub fn name(&self) -> &str {
        match self {
            AttributeEntry::Name(name) | AttributeEntry::Detailed { name, .. } => name,
        }
    }

    pub fn access(&self) -> AttributeAccess {
        match self {
            AttributeEntry::Name(_) => AttributeAccess::Accessor,
            AttributeEntry::Detailed { access, .. } => *access,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectEntry {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub singleton_methods: Vec<String>,
}

impl Manifest {
    /// Load a manifest from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| RuntimeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// A fresh runtime holding everything this manifest describes
    pub fn build(&self, config: WeftConfig) -> Result<Runtime> {
        let runtime = Runtime::with_config(config);
        self.load(&runtime)?;
        Ok(runtime)
    }

    /// Define the manifest's types in `runtime` and create its objects
    ///
    /// Types may be listed in any order; a parent is defined before its
    /// children. Returns the created objects in manifest order.
    pub fn load(&self, runtime: &Runtime) -> Result<Vec<ObjectRef>> {
        let mut pending: Vec<&TypeEntry> = self.types.iter().collect();
        while !pending.is_empty() {
            let (ready, blocked): (Vec<&TypeEntry>, Vec<&TypeEntry>) =
                pending.into_iter().partition(|entry| {
                    entry
                        .parent
                        .as_deref()
                        .map_or(true, |parent| runtime.has_type(&TypeName::new(parent)))
                });
            if ready.is_empty() {
                let entry = blocked[0];
                return Err(RuntimeError::Manifest(format!(
                    "type {} has unknown parent {}",
                    entry.name,
                    entry.parent.as_deref().unwrap_or_default()
                )));
            }
            for entry in ready {
                define(runtime, entry)?;
            }
            pending = blocked;
        }

        let mut objects = Vec::with_capacity(self.objects.len());
        for entry in &self.objects {
            let object = runtime.instantiate(entry.type_name.as_str())?;
            for name in &entry.singleton_methods {
                runtime.define_singleton_method(&object, name.as_str(), |_| Ok(Value::Null))?;
            }
            objects.push(object);
        }
        debug!(types = self.types.len(), objects = objects.len(), "manifest loaded");
        Ok(objects)
    }
}

fn define(runtime: &Runtime, entry: &TypeEntry) -> Result<()> {
    let name = runtime.define_type(entry.name.as_str(), entry.parent.as_deref())?;
    for method in &entry.methods {
        runtime.define_method(name.clone(), method.name(), method.visibility(), |_| Ok(Value::Null))?;
    }
    for method in &entry.class_methods {
        runtime.define_class_method(name.clone(), method.name(), method.visibility(), |_| {
            Ok(Value::Null)
        })?;
    }
    for attribute in &entry.attributes {
        runtime.define_attribute(name.clone(), attribute.name(), attribute.access())?;
    }
    Ok(())
}
