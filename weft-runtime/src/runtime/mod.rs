//! Runtime coordinator for advised dispatch
//!
//! The runtime manages:
//! - Types (definition, ancestry, instance and class methods)
//! - Objects (instantiation, fields, singleton methods)
//! - Dispatch (looking up a method and running the advice chains around it)
//! - Weaving (installing and retracting the chains aspects register)

mod dispatch;
mod host;

use crate::error::{Result, RuntimeError};
use crate::types::{method, AttributeAccess, Call, MethodBody, MethodDef, ObjectSlot, TypeDef};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;
use weft_core::{
    AdviceChain, AdviceRegistry, Aspect, AspectSpec, Callback, ChainKey, Contract, ContractSpec, FoundPointcuts,
    JoinPoint, MethodDescriptor, NamedPointcuts, Pointcut, PointcutQuery, PointcutSpec, WeftConfig,
};
use weft_types::{MethodName, MethodScope, ObjectId, ObjectRef, TargetRef, TypeName, Value, Visibility};

pub(crate) struct RuntimeInner {
    types: RwLock<BTreeMap<TypeName, TypeDef>>,
    objects: RwLock<BTreeMap<ObjectId, ObjectSlot>>,
    /// Chains the weaver routes calls through, by join point
    installed: RwLock<HashMap<ChainKey, AdviceChain>>,
    registry: AdviceRegistry,
    named_pointcuts: NamedPointcuts,
    config: WeftConfig,
}

/// The main runtime coordinator
///
/// A cheap-to-clone handle: clones share the same types, objects and
/// advice. Methods are plain closures registered by name; calls go through
/// whatever advice chains aspects have installed for the receiver.
///
/// # Example
///
/// ```
/// use weft_core::{AdviceKind, AspectSpec};
/// use weft_runtime::{Runtime, Visibility};
/// use serde_json::json;
///
/// let runtime = Runtime::new();
/// runtime.define_type("Watchful", None).unwrap();
/// runtime
///     .define_method("Watchful", "greet", Visibility::Public, |call| {
///         Ok(json!(format!("Hello, {}", call.argument(0)?.as_str().unwrap_or("?"))))
///     })
///     .unwrap();
///
/// let aspect = runtime
///     .aspect(
///         AspectSpec::new(AdviceKind::AfterReturning)
///             .type_name("Watchful")
///             .method("greet")
///             .advice(|jp| {
///                 let context = jp.context_mut();
///                 let greeting = context.returned_value.take().unwrap_or_default();
///                 context.returned_value = Some(json!(format!("{}!", greeting.as_str().unwrap_or(""))));
///                 Ok(serde_json::Value::Null)
///             }),
///     )
///     .unwrap();
///
/// let watchful = runtime.instantiate("Watchful").unwrap();
/// assert_eq!(runtime.invoke(&watchful, "greet", vec![json!("Ada")]).unwrap(), json!("Hello, Ada!"));
///
/// aspect.unadvise().unwrap();
/// assert_eq!(runtime.invoke(&watchful, "greet", vec![json!("Ada")]).unwrap(), json!("Hello, Ada"));
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Create a new runtime with default configuration
    pub fn new() -> Self {
        Self::with_config(WeftConfig::default())
    }

    pub fn with_config(config: WeftConfig) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                types: RwLock::new(BTreeMap::new()),
                objects: RwLock::new(BTreeMap::new()),
                installed: RwLock::new(HashMap::new()),
                registry: AdviceRegistry::new(),
                named_pointcuts: NamedPointcuts::new(),
                config,
            }),
        }
    }

    pub fn config(&self) -> &WeftConfig {
        &self.inner.config
    }

    /// Advice chains registered against this runtime
    pub fn registry(&self) -> &AdviceRegistry {
        &self.inner.registry
    }

    /// Define a type, optionally inheriting from an existing one
    pub fn define_type(&self, name: impl Into<TypeName>, parent: Option<&str>) -> Result<TypeName> {
        let name = name.into();
        let parent = parent.map(TypeName::new);
        let mut types = self.inner.types.write();
        if types.contains_key(&name) {
            return Err(RuntimeError::DuplicateType(name));
        }
        if let Some(parent) = &parent {
            if !types.contains_key(parent) {
                return Err(RuntimeError::UnknownType(parent.clone()));
            }
        }
        debug!(type_name = %name, parent = ?parent, "defined type");
        types.insert(
            name.clone(),
            TypeDef {
                parent,
                methods: BTreeMap::new(),
            },
        );
        Ok(name)
    }

    pub fn has_type(&self, name: &TypeName) -> bool {
        self.inner.types.read().contains_key(name)
    }

    /// Define (or redefine) an instance method
    ///
    /// Redefining keeps any advice: installed chains look the body up at
    /// call time.
    pub fn define_method<F>(
        &self,
        type_name: impl Into<TypeName>,
        name: impl Into<MethodName>,
        visibility: Visibility,
        body: F,
    ) -> Result<()>
    where
        F: Fn(&Call<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.declare(type_name.into(), name.into(), visibility, MethodScope::Instance, method(body))
    }

    /// Define (or redefine) a method called on the type itself
    pub fn define_class_method<F>(
        &self,
        type_name: impl Into<TypeName>,
        name: impl Into<MethodName>,
        visibility: Visibility,
        body: F,
    ) -> Result<()>
    where
        F: Fn(&Call<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.declare(type_name.into(), name.into(), visibility, MethodScope::Class, method(body))
    }

    /// Define `name` and/or `name=` backed by the object field `name`
    pub fn define_attribute(&self, type_name: impl Into<TypeName>, name: &str, access: AttributeAccess) -> Result<()> {
        let type_name = type_name.into();
        if access.has_reader() {
            let field = name.to_string();
            self.declare(
                type_name.clone(),
                MethodName::new(name),
                Visibility::Public,
                MethodScope::Instance,
                method(move |call| Ok(call.field(&field)?)),
            )?;
        }
        if access.has_writer() {
            let field = name.to_string();
            self.declare(
                type_name,
                MethodName::new(format!("{}=", name)),
                Visibility::Public,
                MethodScope::Instance,
                method(move |call| {
                    let value = call.argument(0)?.clone();
                    call.set_field(&field, value.clone())?;
                    Ok(value)
                }),
            )?;
        }
        Ok(())
    }

    fn declare(
        &self,
        type_name: TypeName,
        name: MethodName,
        visibility: Visibility,
        scope: MethodScope,
        body: MethodBody,
    ) -> Result<()> {
        let mut types = self.inner.types.write();
        let definition = types
            .get_mut(&type_name)
            .ok_or_else(|| RuntimeError::UnknownType(type_name.clone()))?;
        debug!(type_name = %type_name, method = %name, %visibility, ?scope, "defined method");
        let descriptor = MethodDescriptor::new(name.clone(), visibility, scope).declared_in(type_name);
        definition
            .methods
            .insert((name, scope.is_instance()), MethodDef { descriptor, body });
        Ok(())
    }

    /// Create an object of `type_name`
    pub fn instantiate(&self, type_name: impl Into<TypeName>) -> Result<ObjectRef> {
        let type_name = type_name.into();
        if !self.has_type(&type_name) {
            return Err(RuntimeError::UnknownType(type_name));
        }
        let object = ObjectRef::new(ObjectId::next(), type_name);
        self.inner
            .objects
            .write()
            .insert(object.id(), ObjectSlot::new(object.clone()));
        debug!(object = %object, "instantiated");
        Ok(object)
    }

    /// Define a method on `object` alone; it shadows the type's method
    pub fn define_singleton_method<F>(&self, object: &ObjectRef, name: impl Into<MethodName>, body: F) -> Result<()>
    where
        F: Fn(&Call<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut objects = self.inner.objects.write();
        let slot = objects
            .get_mut(&object.id())
            .ok_or(RuntimeError::UnknownObject(object.id()))?;
        debug!(object = %object, method = %name, "defined singleton method");
        let descriptor = MethodDescriptor::new(name.clone(), Visibility::Public, MethodScope::Singleton);
        slot.singleton_methods.insert(
            name,
            MethodDef {
                descriptor,
                body: method(body),
            },
        );
        Ok(())
    }

    /// Live objects, oldest first
    pub fn objects(&self) -> Vec<ObjectRef> {
        self.inner
            .objects
            .read()
            .values()
            .map(|slot| slot.object.clone())
            .collect()
    }

    pub fn field(&self, object: &ObjectRef, name: &str) -> Result<Option<Value>> {
        let objects = self.inner.objects.read();
        let slot = objects
            .get(&object.id())
            .ok_or(RuntimeError::UnknownObject(object.id()))?;
        Ok(slot.fields.get(name).cloned())
    }

    pub fn set_field(&self, object: &ObjectRef, name: &str, value: Value) -> Result<()> {
        let mut objects = self.inner.objects.write();
        let slot = objects
            .get_mut(&object.id())
            .ok_or(RuntimeError::UnknownObject(object.id()))?;
        slot.fields.insert(name.to_string(), value);
        Ok(())
    }

    /// Call a public method on `object`
    pub fn invoke(
        &self,
        object: &ObjectRef,
        name: impl Into<MethodName>,
        parameters: Vec<Value>,
    ) -> anyhow::Result<Value> {
        self.dispatch(TargetRef::Object(object.clone()), name.into(), parameters, None, true)
    }

    /// Call a public method on `object`, passing a callback it can yield to
    pub fn invoke_with_callback(
        &self,
        object: &ObjectRef,
        name: impl Into<MethodName>,
        parameters: Vec<Value>,
        callback: Callback,
    ) -> anyhow::Result<Value> {
        self.dispatch(
            TargetRef::Object(object.clone()),
            name.into(),
            parameters,
            Some(callback),
            true,
        )
    }

    /// Call a public class method of `type_name`
    pub fn invoke_class(
        &self,
        type_name: impl Into<TypeName>,
        name: impl Into<MethodName>,
        parameters: Vec<Value>,
    ) -> anyhow::Result<Value> {
        self.dispatch(TargetRef::Type(type_name.into()), name.into(), parameters, None, true)
    }

    /// Call any method regardless of visibility, as a method body calling
    /// its own helpers would
    pub fn send(
        &self,
        receiver: &TargetRef,
        name: impl Into<MethodName>,
        parameters: Vec<Value>,
        callback: Option<Callback>,
    ) -> anyhow::Result<Value> {
        self.dispatch(receiver.clone(), name.into(), parameters, callback, false)
    }

    /// Resolve a pointcut against this runtime's types and objects
    pub fn pointcut(&self, spec: PointcutSpec) -> Result<Pointcut> {
        Ok(Pointcut::with_config(spec, self, &self.inner.config)?)
    }

    /// Create an aspect and advise every join point it matches
    pub fn aspect(&self, spec: AspectSpec) -> Result<Aspect> {
        Ok(Aspect::new(spec, Arc::new(self.clone()))?)
    }

    /// Install a precondition, postcondition or invariant
    pub fn contract(&self, spec: ContractSpec) -> Result<Contract> {
        Ok(spec.install(Arc::new(self.clone()))?)
    }

    /// Resolve `spec` and publish it on `type_name` as `name`
    pub fn define_pointcut(
        &self,
        type_name: impl Into<TypeName>,
        name: &str,
        spec: PointcutSpec,
    ) -> Result<Pointcut> {
        let type_name = type_name.into();
        if !self.has_type(&type_name) {
            return Err(RuntimeError::UnknownType(type_name));
        }
        let pointcut = self.pointcut(spec)?;
        self.inner
            .named_pointcuts
            .define(type_name, name, pointcut.clone());
        Ok(pointcut)
    }

    /// Pointcuts published on the types `query` selects
    pub fn find_pointcuts(&self, query: &PointcutQuery) -> Result<FoundPointcuts> {
        Ok(self.inner.named_pointcuts.find(self, query)?)
    }

    pub fn named_pointcuts(&self) -> &NamedPointcuts {
        &self.inner.named_pointcuts
    }

    /// Whether calls of `join_point` currently go through a chain
    pub fn is_intercepted(&self, join_point: &JoinPoint) -> bool {
        self.inner
            .installed
            .read()
            .contains_key(&ChainKey::of(join_point))
    }

    fn lineage(&self, name: &TypeName) -> Vec<TypeName> {
        lineage_in(&self.inner.types.read(), name)
    }
}

/// `name` followed by its ancestors, nearest first
fn lineage_in(types: &BTreeMap<TypeName, TypeDef>, name: &TypeName) -> Vec<TypeName> {
    let mut lineage = Vec::new();
    let mut current = types.contains_key(name).then(|| name.clone());
    while let Some(type_name) = current {
        current = types.get(&type_name).and_then(|def| def.parent.clone());
        lineage.push(type_name);
    }
    lineage
}
