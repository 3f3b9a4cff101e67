//! Method lookup and advised dispatch
//!
//! A call passes through layers, outermost first: the receiving object
//! (when the receiver is an object), then each type from the receiver's own
//! type up to the type that defines the method. Every layer with an
//! installed chain runs it; the terminal of a chain continues with the next
//! layer, and the last layer runs the method body.

use super::Runtime;
use crate::error::{Result, RuntimeError};
use crate::types::{Call, MethodBody};
use weft_core::{Callback, ChainKey, Context, JoinPoint};
use weft_types::{MethodName, TargetRef, Value, Visibility};

/// How one call of a method on one receiver is carried out
pub(crate) struct Plan {
    layers: Vec<ChainKey>,
    visibility: Visibility,
    body: MethodBody,
}

impl Runtime {
    pub(crate) fn plan(&self, receiver: &TargetRef, method: &MethodName, is_instance: bool) -> Result<Plan> {
        let unknown = || RuntimeError::UnknownMethod {
            receiver: receiver.to_string(),
            method: method.clone(),
        };
        let mut layers = Vec::new();

        match receiver {
            TargetRef::Object(object) => {
                if !is_instance {
                    return Err(unknown());
                }
                let objects = self.inner.objects.read();
                let slot = objects
                    .get(&object.id())
                    .ok_or(RuntimeError::UnknownObject(object.id()))?;
                layers.push(ChainKey::new(receiver.clone(), method.clone(), true));
                if let Some(singleton) = slot.singleton_methods.get(method) {
                    return Ok(Plan {
                        layers,
                        visibility: singleton.descriptor.visibility,
                        body: singleton.body.clone(),
                    });
                }
            }
            TargetRef::Type(_) if is_instance => return Err(unknown()),
            TargetRef::Type(_) => {}
        }

        let types = self.inner.types.read();
        let mut current = Some(receiver.type_name().clone());
        while let Some(type_name) = current {
            let definition = types
                .get(&type_name)
                .ok_or_else(|| RuntimeError::UnknownType(type_name.clone()))?;
            layers.push(ChainKey::new(
                TargetRef::Type(type_name.clone()),
                method.clone(),
                is_instance,
            ));
            if let Some(found) = definition.methods.get(&(method.clone(), is_instance)) {
                return Ok(Plan {
                    layers,
                    visibility: found.descriptor.visibility,
                    body: found.body.clone(),
                });
            }
            current = definition.parent.clone();
        }
        Err(unknown())
    }

    pub(crate) fn dispatch(
        &self,
        receiver: TargetRef,
        method: MethodName,
        parameters: Vec<Value>,
        callback: Option<Callback>,
        public_only: bool,
    ) -> anyhow::Result<Value> {
        let plan = self.plan(&receiver, &method, receiver.is_object())?;
        if public_only && plan.visibility != Visibility::Public {
            return Err(RuntimeError::NotPublic {
                receiver: receiver.to_string(),
                method,
                visibility: plan.visibility,
            }
            .into());
        }
        let context = Context::new(receiver, parameters).with_callback(callback);
        self.run_from(&plan, 0, &method, context)
    }

    /// Carry on below the layer of `join_point`; the terminal of its chain
    pub(crate) fn continue_after(&self, join_point: &JoinPoint) -> anyhow::Result<Value> {
        let (receiver, parameters, callback) = match join_point.context() {
            Some(context) => (
                context.advised_object.clone(),
                context.parameters.clone(),
                context.callback.clone(),
            ),
            None => (join_point.target().clone(), Vec::new(), None),
        };
        let method = join_point.method_name();
        let plan = self.plan(&receiver, method, join_point.is_instance_method())?;
        let key = ChainKey::of(join_point);
        let next = plan
            .layers
            .iter()
            .position(|layer| *layer == key)
            .map_or(plan.layers.len(), |index| index + 1);
        let context = Context::new(receiver, parameters).with_callback(callback);
        self.run_from(&plan, next, method, context)
    }

    fn run_from(&self, plan: &Plan, start: usize, method: &MethodName, context: Context) -> anyhow::Result<Value> {
        let chain = {
            let installed = self.inner.installed.read();
            plan.layers
                .iter()
                .skip(start)
                .find_map(|layer| installed.get(layer).cloned())
        };

        match chain {
            Some(chain) => {
                let join_point = chain.join_point().with_context(context);
                chain.call(&join_point)
            }
            None => {
                let call = Call {
                    runtime: self,
                    receiver: &context.advised_object,
                    method,
                    parameters: &context.parameters,
                    callback: context.callback.as_ref(),
                };
                (plan.body)(&call)
            }
        }
    }
}
