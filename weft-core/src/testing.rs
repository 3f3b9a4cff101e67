//! In-memory catalog and host for unit tests

use crate::chain::AdviceChain;
use crate::config::WeftConfig;
use crate::error::{Result, WeftError};
use crate::finders::{Catalog, MethodDescriptor};
use crate::join_point::{Context, JoinPoint};
use crate::registry::{AdviceRegistry, ChainKey};
use crate::weaving::{Operation, Weaver, Weaving};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use weft_types::{MethodScope, ObjectId, ObjectRef, TargetRef, TypeName, Value, Visibility};

#[derive(Debug, Default, Clone)]
pub(crate) struct StaticCatalog {
    parents: BTreeMap<TypeName, Option<TypeName>>,
    declared: BTreeMap<TypeName, Vec<MethodDescriptor>>,
    singletons: BTreeMap<ObjectId, Vec<MethodDescriptor>>,
    instances: BTreeMap<TypeName, Vec<ObjectRef>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, name: &str, parent: Option<&str>) -> Self {
        self.parents
            .insert(TypeName::new(name), parent.map(TypeName::new));
        self
    }

    pub fn with_method(self, type_name: &str, method: &str, visibility: Visibility) -> Self {
        self.declare(type_name, method, visibility, MethodScope::Instance)
    }

    pub fn with_class_method(self, type_name: &str, method: &str, visibility: Visibility) -> Self {
        self.declare(type_name, method, visibility, MethodScope::Class)
    }

    pub fn add_instance(&mut self, type_name: &str) -> ObjectRef {
        let object = ObjectRef::new(ObjectId::next(), TypeName::new(type_name));
        self.instances
            .entry(TypeName::new(type_name))
            .or_default()
            .push(object.clone());
        object
    }

    pub fn add_singleton_method(&mut self, object: &ObjectRef, method: &str) {
        self.singletons.entry(object.id()).or_default().push(MethodDescriptor::new(
            method,
            Visibility::Public,
            MethodScope::Singleton,
        ));
    }

    fn declare(
        mut self,
        type_name: &str,
        method: &str,
        visibility: Visibility,
        scope: MethodScope,
    ) -> Self {
        let owner = TypeName::new(type_name);
        self.declared
            .entry(owner.clone())
            .or_default()
            .push(MethodDescriptor::new(method, visibility, scope).declared_in(owner));
        self
    }

    fn lineage(&self, name: &TypeName) -> Vec<TypeName> {
        let mut lineage = vec![name.clone()];
        lineage.extend(self.ancestors(name));
        lineage
    }
}

impl Catalog for StaticCatalog {
    fn type_names(&self) -> Vec<TypeName> {
        self.parents.keys().cloned().collect()
    }

    fn ancestors(&self, type_name: &TypeName) -> Vec<TypeName> {
        let mut ancestors = Vec::new();
        let mut current = self.parents.get(type_name).cloned().flatten();
        while let Some(parent) = current {
            current = self.parents.get(&parent).cloned().flatten();
            ancestors.push(parent);
        }
        ancestors
    }

    fn methods(&self, target: &TargetRef) -> Vec<MethodDescriptor> {
        let mut seen = BTreeSet::new();
        let mut methods = Vec::new();

        if let TargetRef::Object(object) = target {
            for method in self.singletons.get(&object.id()).into_iter().flatten() {
                seen.insert((method.name.clone(), method.scope.is_instance()));
                methods.push(method.clone());
            }
        }

        for owner in self.lineage(target.type_name()) {
            for method in self.declared.get(&owner).into_iter().flatten() {
                if target.is_object() && method.scope == MethodScope::Class {
                    continue;
                }
                if seen.insert((method.name.clone(), method.scope.is_instance())) {
                    methods.push(method.clone());
                }
            }
        }
        methods
    }

    fn instances(&self, type_name: &TypeName) -> Vec<ObjectRef> {
        self.instances.get(type_name).cloned().unwrap_or_default()
    }
}

/// A host whose real operations answer `method(args)`
pub(crate) struct TestHost {
    catalog: StaticCatalog,
    registry: AdviceRegistry,
    config: WeftConfig,
    installed: Mutex<BTreeMap<ChainKey, AdviceChain>>,
    refused: BTreeSet<String>,
    retract_fails: bool,
}

impl TestHost {
    pub fn new(catalog: StaticCatalog) -> Self {
        Self {
            catalog,
            registry: AdviceRegistry::new(),
            config: WeftConfig::default(),
            installed: Mutex::new(BTreeMap::new()),
            refused: BTreeSet::new(),
            retract_fails: false,
        }
    }

    pub fn with_config(mut self, config: WeftConfig) -> Self {
        self.config = config;
        self
    }

    /// Fail to install interception for `method`
    pub fn refusing(mut self, method: &str) -> Self {
        self.refused.insert(method.to_string());
        self
    }

    /// Fail every retraction
    pub fn failing_retract(mut self) -> Self {
        self.retract_fails = true;
        self
    }

    /// Call `join_point` the way an intercepted call would arrive
    pub fn call(&self, join_point: &JoinPoint, parameters: Vec<Value>) -> anyhow::Result<Value> {
        let call = join_point.with_context(Context::new(join_point.target().clone(), parameters));
        let chain = self.installed.lock().get(&ChainKey::of(join_point)).cloned();
        match chain {
            Some(chain) => chain.call(&call),
            None => real_operation(&call),
        }
    }
}

fn real_operation(join_point: &JoinPoint) -> anyhow::Result<Value> {
    let arguments: Vec<String> = join_point
        .context()
        .map(|context| {
            context
                .parameters
                .iter()
                .map(|value| value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string()))
                .collect()
        })
        .unwrap_or_default();
    Ok(json!(format!("{}({})", join_point.method_name(), arguments.join(", "))))
}

impl Weaver for TestHost {
    fn install(&self, join_point: &JoinPoint, chain: &AdviceChain) -> Result<()> {
        if self.refused.contains(join_point.method_name().as_str()) {
            return Err(WeftError::weaving(join_point, "install refused"));
        }
        self.installed.lock().insert(ChainKey::of(join_point), chain.clone());
        Ok(())
    }

    fn retract(&self, join_point: &JoinPoint) -> Result<()> {
        if self.retract_fails {
            return Err(WeftError::weaving(join_point, "retract refused"));
        }
        self.installed.lock().remove(&ChainKey::of(join_point));
        Ok(())
    }

    fn terminal(&self, _join_point: &JoinPoint) -> Result<Operation> {
        Ok(Arc::new(real_operation))
    }
}

impl Weaving for TestHost {
    fn catalog(&self) -> &dyn Catalog {
        &self.catalog
    }

    fn weaver(&self) -> &dyn Weaver {
        self
    }

    fn registry(&self) -> &AdviceRegistry {
        &self.registry
    }

    fn config(&self) -> &WeftConfig {
        &self.config
    }
}
