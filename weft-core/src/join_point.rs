//! Join points and the per-invocation context they carry
//!
//! A [`JoinPoint`] names one operation on a type or on one specific object.
//! Its identity is the target, the method name and whether the method is an
//! instance method; visibility is descriptive only. While a call travels
//! through an advice chain each layer works on a fresh join point built with
//! [`JoinPoint::make_current_context_join_point`], so the join points held by
//! pointcuts and registries are never mutated.

use crate::advice::{AdviceKind, Callback};
use crate::error::{Result, WeftError};
use crate::finders::Catalog;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use weft_types::{MethodName, ObjectId, ObjectRef, TargetRef, TypeName, Value, Visibility};

/// Invokes the next-inner layer of an advice chain
pub type Continuation = Arc<dyn Fn(&JoinPoint) -> anyhow::Result<Value> + Send + Sync>;

/// Mutable record of one invocation
///
/// The context handed the raised error owns it. A clone carries an error
/// with the same message, so only the owner re-raises the original type.
pub struct Context {
    /// The kind of advice currently running, if any
    pub advice_kind: Option<AdviceKind>,
    /// Receiver of the call: the object, or the type for class methods
    pub advised_object: TargetRef,
    /// Call arguments
    pub parameters: Vec<Value>,
    /// Block passed with the call
    pub callback: Option<Callback>,
    /// Next-inner layer; only set for around advice
    pub proceed: Option<Continuation>,
    /// Value returned by the wrapped call, once known
    pub returned_value: Option<Value>,
    raised_error: Option<anyhow::Error>,
}

impl Context {
    pub fn new(advised_object: TargetRef, parameters: Vec<Value>) -> Self {
        Self {
            advice_kind: None,
            advised_object,
            parameters,
            callback: None,
            proceed: None,
            returned_value: None,
            raised_error: None,
        }
    }

    pub fn with_callback(mut self, callback: Option<Callback>) -> Self {
        self.callback = callback;
        self
    }

    /// The error raised by the wrapped call, if any
    pub fn raised_error(&self) -> Option<&anyhow::Error> {
        self.raised_error.as_ref()
    }

    /// Replace the error that will be re-raised
    pub fn set_raised_error(&mut self, error: anyhow::Error) {
        self.raised_error = Some(error);
    }

    /// Suppress the error; the call then returns `returned_value`
    pub fn clear_raised_error(&mut self) {
        self.raised_error = None;
    }

    pub fn take_raised_error(&mut self) -> Option<anyhow::Error> {
        self.raised_error.take()
    }

    pub fn can_proceed(&self) -> bool {
        self.proceed.is_some()
    }

    fn sort_key(&self) -> (Option<AdviceKind>, &TargetRef, String, String, String) {
        (
            self.advice_kind,
            &self.advised_object,
            Value::Array(self.parameters.clone()).to_string(),
            self.returned_value
                .as_ref()
                .map(Value::to_string)
                .unwrap_or_default(),
            self.raised_error()
                .map(|e| format!("{:#}", e))
                .unwrap_or_default(),
        )
    }
}

impl Clone for Context {
    fn clone(&self) -> Self {
        Self {
            advice_kind: self.advice_kind,
            advised_object: self.advised_object.clone(),
            parameters: self.parameters.clone(),
            callback: self.callback.clone(),
            proceed: self.proceed.clone(),
            returned_value: self.returned_value.clone(),
            raised_error: self
                .raised_error
                .as_ref()
                .map(|error| anyhow::anyhow!("{:#}", error)),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("advice_kind", &self.advice_kind)
            .field("advised_object", &self.advised_object)
            .field("parameters", &self.parameters)
            .field("callback", &self.callback.is_some())
            .field("proceed", &self.proceed.is_some())
            .field("returned_value", &self.returned_value)
            .field("raised_error", &self.raised_error().map(|e| e.to_string()))
            .finish()
    }
}

/// Fields to replace when deriving a new context
///
/// Unset fields are copied from the current context.
#[derive(Default)]
pub struct ContextOverrides {
    advice_kind: Option<AdviceKind>,
    advised_object: Option<TargetRef>,
    parameters: Option<Vec<Value>>,
    callback: Option<Option<Callback>>,
    proceed: Option<Option<Continuation>>,
    returned_value: Option<Option<Value>>,
    raised_error: Option<Option<anyhow::Error>>,
}

impl ContextOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advice_kind(mut self, kind: AdviceKind) -> Self {
        self.advice_kind = Some(kind);
        self
    }

    pub fn advised_object(mut self, target: TargetRef) -> Self {
        self.advised_object = Some(target);
        self
    }

    pub fn parameters(mut self, parameters: Vec<Value>) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn callback(mut self, callback: Option<Callback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn proceed(mut self, proceed: Option<Continuation>) -> Self {
        self.proceed = Some(proceed);
        self
    }

    pub fn returned_value(mut self, value: Option<Value>) -> Self {
        self.returned_value = Some(value);
        self
    }

    pub fn raised_error(mut self, error: Option<anyhow::Error>) -> Self {
        self.raised_error = Some(error);
        self
    }

    fn apply(self, context: &mut Context) {
        if let Some(kind) = self.advice_kind {
            context.advice_kind = Some(kind);
        }
        if let Some(target) = self.advised_object {
            context.advised_object = target;
        }
        if let Some(parameters) = self.parameters {
            context.parameters = parameters;
        }
        if let Some(callback) = self.callback {
            context.callback = callback;
        }
        if let Some(proceed) = self.proceed {
            context.proceed = proceed;
        }
        if let Some(value) = self.returned_value {
            context.returned_value = value;
        }
        if let Some(error) = self.raised_error {
            context.raised_error = error;
        }
    }
}

/// One operation on a type or on a single object
#[derive(Clone)]
pub struct JoinPoint {
    target: TargetRef,
    method_name: MethodName,
    is_instance_method: bool,
    visibility: Visibility,
    context: Option<Context>,
}

/// Builder for [`JoinPoint`]; exactly one of type or object is required
#[derive(Debug, Clone)]
pub struct JoinPointBuilder {
    type_name: Option<TypeName>,
    object: Option<ObjectRef>,
    method_name: Option<MethodName>,
    is_instance_method: bool,
    visibility: Visibility,
}

impl JoinPointBuilder {
    pub fn type_name(mut self, name: impl Into<TypeName>) -> Self {
        self.type_name = Some(name.into());
        self
    }

    pub fn object(mut self, object: ObjectRef) -> Self {
        self.object = Some(object);
        self
    }

    pub fn method(mut self, name: impl Into<MethodName>) -> Self {
        self.method_name = Some(name.into());
        self
    }

    /// Select the class-level method of the same name
    pub fn class_method(mut self) -> Self {
        self.is_instance_method = false;
        self
    }

    pub fn instance_method(mut self, is_instance_method: bool) -> Self {
        self.is_instance_method = is_instance_method;
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn build(self) -> Result<JoinPoint> {
        let target = match (self.type_name, self.object) {
            (Some(name), None) => TargetRef::Type(name),
            (None, Some(object)) => TargetRef::Object(object),
            (Some(_), Some(_)) => {
                return Err(WeftError::invalid(
                    "a join point takes a type or an object, not both",
                ))
            }
            (None, None) => {
                return Err(WeftError::invalid("a join point requires a type or an object"))
            }
        };
        let method_name = self
            .method_name
            .ok_or_else(|| WeftError::invalid("a join point requires a method name"))?;
        Ok(JoinPoint {
            target,
            method_name,
            is_instance_method: self.is_instance_method,
            visibility: self.visibility,
            context: None,
        })
    }
}

impl JoinPoint {
    pub fn builder() -> JoinPointBuilder {
        JoinPointBuilder {
            type_name: None,
            object: None,
            method_name: None,
            is_instance_method: true,
            visibility: Visibility::Unknown,
        }
    }

    /// Join point for an operation on `target`
    pub fn new(target: TargetRef, method_name: impl Into<MethodName>, is_instance_method: bool) -> Self {
        Self {
            target,
            method_name: method_name.into(),
            is_instance_method,
            visibility: Visibility::Unknown,
            context: None,
        }
    }

    pub fn for_type(type_name: impl Into<TypeName>, method_name: impl Into<MethodName>) -> Self {
        Self::new(TargetRef::Type(type_name.into()), method_name, true)
    }

    pub fn for_object(object: ObjectRef, method_name: impl Into<MethodName>) -> Self {
        Self::new(TargetRef::Object(object), method_name, true)
    }

    pub fn target(&self) -> &TargetRef {
        &self.target
    }

    pub fn target_type(&self) -> Option<&TypeName> {
        self.target.as_type()
    }

    pub fn target_object(&self) -> Option<&ObjectRef> {
        self.target.as_object()
    }

    /// The type the method is looked up on, including for object targets
    pub fn type_name(&self) -> &TypeName {
        self.target.type_name()
    }

    pub fn method_name(&self) -> &MethodName {
        &self.method_name
    }

    pub fn is_instance_method(&self) -> bool {
        self.is_instance_method
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }

    /// The current context, created empty if absent
    pub fn context_mut(&mut self) -> &mut Context {
        let target = self.target.clone();
        self.context
            .get_or_insert_with(|| Context::new(target, Vec::new()))
    }

    /// A copy of this join point carrying `context`
    pub fn with_context(&self, context: Context) -> JoinPoint {
        JoinPoint {
            context: Some(context),
            ..self.without_context()
        }
    }

    /// A copy of this join point with no context attached
    pub fn without_context(&self) -> JoinPoint {
        JoinPoint {
            target: self.target.clone(),
            method_name: self.method_name.clone(),
            is_instance_method: self.is_instance_method,
            visibility: self.visibility,
            context: None,
        }
    }

    /// Look up the method's visibility; `Unknown` if it is not defined
    pub fn resolve_visibility(&self, catalog: &dyn Catalog) -> Visibility {
        catalog
            .methods(&self.target)
            .into_iter()
            .find(|m| m.name == self.method_name && m.scope.is_instance() == self.is_instance_method)
            .map(|m| m.visibility)
            .unwrap_or(Visibility::Unknown)
    }

    /// A copy with the visibility looked up in `catalog`
    pub fn with_resolved_visibility(mut self, catalog: &dyn Catalog) -> JoinPoint {
        self.visibility = self.resolve_visibility(catalog);
        self
    }

    /// Whether the method is currently defined for the target
    pub fn exists(&self, catalog: &dyn Catalog) -> bool {
        self.resolve_visibility(catalog) != Visibility::Unknown
    }

    /// Invoke the next-inner layer with the current arguments
    pub fn proceed(&self) -> anyhow::Result<Value> {
        self.proceed_with(None, None)
    }

    /// Invoke the next-inner layer, optionally replacing the arguments
    /// and callback for that one call
    pub fn proceed_with(
        &self,
        parameters: Option<Vec<Value>>,
        callback: Option<Callback>,
    ) -> anyhow::Result<Value> {
        let continuation = self
            .context
            .as_ref()
            .and_then(|context| context.proceed.clone())
            .ok_or_else(|| WeftError::NoContinuation {
                join_point: self.to_string(),
            })?;

        let mut overrides = ContextOverrides::new().proceed(None);
        if let Some(parameters) = parameters {
            overrides = overrides.parameters(parameters);
        }
        if callback.is_some() {
            overrides = overrides.callback(callback);
        }
        let inner = self.make_current_context_join_point(overrides);
        continuation(&inner)
    }

    /// A new join point with the same identity and a context derived from
    /// this one's
    pub fn make_current_context_join_point(&self, overrides: ContextOverrides) -> JoinPoint {
        let mut context = self
            .context
            .clone()
            .unwrap_or_else(|| Context::new(self.target.clone(), Vec::new()));
        overrides.apply(&mut context);
        self.with_context(context)
    }

    fn object_id(&self) -> Option<ObjectId> {
        self.target.as_object().map(ObjectRef::id)
    }
}

impl fmt::Display for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = if self.is_instance_method { "#" } else { "." };
        write!(f, "{}{}{}", self.target, separator, self.method_name)
    }
}

impl fmt::Debug for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinPoint")
            .field("target", &self.target)
            .field("method_name", &self.method_name)
            .field("is_instance_method", &self.is_instance_method)
            .field("visibility", &self.visibility)
            .field("context", &self.context)
            .finish()
    }
}

impl PartialEq for JoinPoint {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for JoinPoint {}

impl Hash for JoinPoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.target.hash(state);
        self.method_name.hash(state);
        self.is_instance_method.hash(state);
    }
}

impl PartialOrd for JoinPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for JoinPoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.object_id()
            .cmp(&other.object_id())
            .then_with(|| self.is_instance_method.cmp(&other.is_instance_method))
            .then_with(|| self.target.as_type().cmp(&other.target.as_type()))
            .then_with(|| self.method_name.cmp(&other.method_name))
            .then_with(|| match (&self.context, &other.context) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => a.sort_key().cmp(&b.sort_key()),
            })
    }
}
