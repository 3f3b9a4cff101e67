//! The runtime as a weft host: reflection, interception and weaving

use super::{lineage_in, Runtime};
use crate::error::RuntimeError;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;
use weft_core::{
    AdviceChain, AdviceRegistry, Catalog, ChainKey, JoinPoint, MethodDescriptor, Operation, Weaver, Weaving,
    WeftConfig, WeftError,
};
use weft_types::{ObjectRef, TargetRef, TypeName, Value};

impl Catalog for Runtime {
    fn type_names(&self) -> Vec<TypeName> {
        self.inner.types.read().keys().cloned().collect()
    }

    fn ancestors(&self, type_name: &TypeName) -> Vec<TypeName> {
        self.lineage(type_name).into_iter().skip(1).collect()
    }

    fn methods(&self, target: &TargetRef) -> Vec<MethodDescriptor> {
        let mut seen = BTreeSet::new();
        let mut methods = Vec::new();

        if let TargetRef::Object(object) = target {
            let objects = self.inner.objects.read();
            let singletons = objects
                .get(&object.id())
                .into_iter()
                .flat_map(|slot| slot.singleton_methods.values());
            for singleton in singletons {
                seen.insert((singleton.descriptor.name.clone(), true));
                methods.push(singleton.descriptor.clone());
            }
        }

        let types = self.inner.types.read();
        for owner in lineage_in(&types, target.type_name()) {
            let Some(definition) = types.get(&owner) else {
                continue;
            };
            for ((name, is_instance), method) in &definition.methods {
                if target.is_object() && !is_instance {
                    continue;
                }
                if seen.insert((name.clone(), *is_instance)) {
                    methods.push(method.descriptor.clone());
                }
            }
        }
        methods
    }

    fn instances(&self, type_name: &TypeName) -> Vec<ObjectRef> {
        self.inner
            .objects
            .read()
            .values()
            .filter(|slot| slot.object.type_name() == type_name)
            .map(|slot| slot.object.clone())
            .collect()
    }

    fn has_type(&self, type_name: &TypeName) -> bool {
        Runtime::has_type(self, type_name)
    }
}

impl Weaver for Runtime {
    fn install(&self, join_point: &JoinPoint, chain: &AdviceChain) -> weft_core::Result<()> {
        if !join_point.exists(self) {
            return Err(WeftError::weaving(join_point, "method is not defined"));
        }
        self.inner
            .installed
            .write()
            .insert(ChainKey::of(join_point), chain.clone());
        debug!(join_point = %join_point, depth = chain.len(), "installed advice chain");
        Ok(())
    }

    fn retract(&self, join_point: &JoinPoint) -> weft_core::Result<()> {
        if self
            .inner
            .installed
            .write()
            .remove(&ChainKey::of(join_point))
            .is_some()
        {
            debug!(join_point = %join_point, "retracted advice chain");
        }
        Ok(())
    }

    fn terminal(&self, join_point: &JoinPoint) -> weft_core::Result<Operation> {
        if !join_point.exists(self) {
            return Err(WeftError::weaving(join_point, "method is not defined"));
        }
        let runtime = Arc::downgrade(&self.inner);
        Ok(Arc::new(move |join_point: &JoinPoint| -> anyhow::Result<Value> {
            let inner = runtime.upgrade().ok_or(RuntimeError::Detached)?;
            Runtime { inner }.continue_after(join_point)
        }))
    }
}

impl Weaving for Runtime {
    fn catalog(&self) -> &dyn Catalog {
        self
    }

    fn weaver(&self) -> &dyn Weaver {
        self
    }

    fn registry(&self) -> &AdviceRegistry {
        &self.inner.registry
    }

    fn config(&self) -> &WeftConfig {
        &self.inner.config
    }
}
