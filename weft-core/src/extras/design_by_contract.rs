//! Design by contract on top of aspects
//!
//! A precondition is checked by `before` advice, a postcondition by
//! `after_returning` advice, and an invariant by `around` advice that checks
//! before and after the call. A failed check raises [`ContractError`].
//!
//! ```ignore
//! let contract = ContractSpec::precondition(PointcutSpec::new().type_name("Account").method("withdraw"))
//!     .message("amount must be given")
//!     .check(|jp| jp.context().is_some_and(|c| !c.parameters.is_empty()))
//!     .install(weaving)?;
//! ```

use crate::advice::AdviceKind;
use crate::aspect::{Aspect, AspectSpec};
use crate::error::{Result, WeftError};
use crate::join_point::JoinPoint;
use crate::pointcut::{Pointcut, PointcutSpec};
use crate::weaving::Weaving;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use weft_types::Value;

const NO_MESSAGE: &str = "(no error message)";

/// A contract check that failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("precondition failure: {0}")]
    Precondition(String),

    #[error("postcondition failure: {0}")]
    Postcondition(String),

    #[error("invariant failure (before invocation): {0}")]
    InvariantBefore(String),

    #[error("invariant failure (after invocation): {0}")]
    InvariantAfter(String),
}

/// Decides whether a call satisfies the contract
pub type Condition = Arc<dyn Fn(&JoinPoint) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractKind {
    Precondition,
    Postcondition,
    Invariant,
}

impl ContractKind {
    fn advice_kind(self) -> AdviceKind {
        match self {
            ContractKind::Precondition => AdviceKind::Before,
            ContractKind::Postcondition => AdviceKind::AfterReturning,
            ContractKind::Invariant => AdviceKind::Around,
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContractKind::Precondition => "precondition",
            ContractKind::Postcondition => "postcondition",
            ContractKind::Invariant => "invariant",
        })
    }
}

/// Everything needed to install a [`Contract`]
#[derive(Clone)]
pub struct ContractSpec {
    kind: ContractKind,
    targets: AspectSpec,
    message: Option<String>,
    condition: Option<Condition>,
}

impl ContractSpec {
    pub fn new(kind: ContractKind, pointcut: PointcutSpec) -> Self {
        Self {
            kind,
            targets: AspectSpec::new(kind.advice_kind()).pointcut(pointcut),
            message: None,
            condition: None,
        }
    }

    pub fn precondition(pointcut: PointcutSpec) -> Self {
        Self::new(ContractKind::Precondition, pointcut)
    }

    pub fn postcondition(pointcut: PointcutSpec) -> Self {
        Self::new(ContractKind::Postcondition, pointcut)
    }

    pub fn invariant(pointcut: PointcutSpec) -> Self {
        Self::new(ContractKind::Invariant, pointcut)
    }

    /// Also check the join points of an already resolved pointcut
    pub fn resolved_pointcut(mut self, pointcut: Pointcut) -> Self {
        self.targets = self.targets.resolved_pointcut(pointcut);
        self
    }

    /// Text carried by the [`ContractError`] raised on failure
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn check<F>(mut self, condition: F) -> Self
    where
        F: Fn(&JoinPoint) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    pub fn kind(&self) -> ContractKind {
        self.kind
    }

    /// Advise the selected join points with the check
    ///
    /// With contracts disabled in the configuration nothing is advised and
    /// the returned contract is inactive.
    pub fn install(self, weaving: Arc<dyn Weaving>) -> Result<Contract> {
        let condition = self
            .condition
            .ok_or_else(|| WeftError::invalid(format!("a {} requires a condition", self.kind)))?;
        if !weaving.config().contracts_enabled {
            debug!(kind = %self.kind, "contracts disabled; not installed");
            return Ok(Contract {
                kind: self.kind,
                aspect: None,
            });
        }

        let message = self.message.unwrap_or_else(|| NO_MESSAGE.to_string());
        let targets = match self.kind {
            ContractKind::Precondition => self.targets.advice(move |jp| {
                require(&condition, jp, || ContractError::Precondition(message.clone()))?;
                Ok(Value::Null)
            }),
            ContractKind::Postcondition => self.targets.advice(move |jp| {
                require(&condition, jp, || ContractError::Postcondition(message.clone()))?;
                Ok(Value::Null)
            }),
            ContractKind::Invariant => self.targets.advice(move |jp| {
                require(&condition, jp, || ContractError::InvariantBefore(message.clone()))?;
                let value = jp.proceed()?;
                require(&condition, jp, || ContractError::InvariantAfter(message.clone()))?;
                Ok(value)
            }),
        };

        let aspect = Aspect::new(targets, weaving)?;
        debug!(kind = %self.kind, aspect = %aspect.id(), "contract installed");
        Ok(Contract {
            kind: self.kind,
            aspect: Some(aspect),
        })
    }
}

fn require(condition: &Condition, jp: &JoinPoint, failure: impl FnOnce() -> ContractError) -> anyhow::Result<()> {
    if condition(jp) {
        Ok(())
    } else {
        Err(failure().into())
    }
}

/// An installed contract
#[derive(Debug)]
pub struct Contract {
    kind: ContractKind,
    aspect: Option<Aspect>,
}

impl Contract {
    pub fn kind(&self) -> ContractKind {
        self.kind
    }

    /// The aspect performing the check; `None` when contracts are disabled
    pub fn aspect(&self) -> Option<&Aspect> {
        self.aspect.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.aspect.as_ref().is_some_and(Aspect::is_advised)
    }

    /// Remove the check; returns the number of join points it left
    pub fn unadvise(&self) -> Result<usize> {
        match &self.aspect {
            Some(aspect) => aspect.unadvise(),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WeftConfig;
    use crate::testing::{StaticCatalog, TestHost};
    use serde_json::json;
    use std::sync::atomic::{AtomicI64, Ordering};
    use weft_types::Visibility;

    fn catalog() -> StaticCatalog {
        StaticCatalog::new()
            .with_type("PreCond", None)
            .with_method("PreCond", "action", Visibility::Public)
            .with_type("PostCond", None)
            .with_method("PostCond", "action", Visibility::Public)
            .with_type("InvarCond", None)
            .with_method("InvarCond", "good_action", Visibility::Public)
            .with_method("InvarCond", "bad_action", Visibility::Public)
    }

    fn host() -> Arc<TestHost> {
        Arc::new(TestHost::new(catalog()))
    }

    fn action(type_name: &str) -> PointcutSpec {
        PointcutSpec::new().type_name(type_name).method("action")
    }

    fn has_arguments(jp: &JoinPoint) -> bool {
        jp.context().is_some_and(|context| !context.parameters.is_empty())
    }

    fn contract_error(error: &anyhow::Error) -> Option<&ContractError> {
        error.downcast_ref::<ContractError>()
    }

    #[test]
    fn test_precondition_raises_when_not_satisfied() {
        let host = host();
        ContractSpec::precondition(action("PreCond"))
            .message("Must pass more than one argument.")
            .check(has_arguments)
            .install(host.clone())
            .unwrap();

        let jp = JoinPoint::for_type("PreCond", "action");
        let err = host.call(&jp, vec![]).unwrap_err();
        assert_eq!(
            contract_error(&err),
            Some(&ContractError::Precondition("Must pass more than one argument.".into()))
        );
        assert_eq!(host.call(&jp, vec![json!("a1")]).unwrap(), json!("action(a1)"));
    }

    #[test]
    fn test_postcondition_raises_when_not_satisfied() {
        let host = host();
        ContractSpec::postcondition(action("PostCond"))
            .check(|jp| {
                let parameters = jp.context().map(|context| context.parameters.as_slice()).unwrap_or(&[]);
                parameters.first().and_then(Value::as_str).is_some_and(|first| !first.is_empty())
            })
            .install(host.clone())
            .unwrap();

        let jp = JoinPoint::for_type("PostCond", "action");
        let err = host.call(&jp, vec![]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ContractError>().map(ToString::to_string),
            Some("postcondition failure: (no error message)".to_string())
        );
        assert!(contract_error(&host.call(&jp, vec![json!("")]).unwrap_err()).is_some());
        assert_eq!(host.call(&jp, vec![json!("a1")]).unwrap(), json!("action(a1)"));
    }

    #[test]
    fn test_invariant_is_checked_around_the_call() {
        let host = host();
        let invar = Arc::new(AtomicI64::new(0));

        let observed = Arc::clone(&invar);
        ContractSpec::invariant(PointcutSpec::new().type_name("InvarCond").method("/action$/"))
            .message("Must not change the invar value.")
            .check(move |_| observed.load(Ordering::SeqCst) == 0)
            .install(host.clone())
            .unwrap();

        let mutate = Arc::clone(&invar);
        Aspect::new(
            AspectSpec::new(AdviceKind::Before)
                .type_name("InvarCond")
                .method("bad_action")
                .advice(move |_| {
                    mutate.store(1, Ordering::SeqCst);
                    Ok(Value::Null)
                }),
            host.clone(),
        )
        .unwrap();

        let good = JoinPoint::for_type("InvarCond", "good_action");
        assert_eq!(host.call(&good, vec![]).unwrap(), json!("good_action()"));

        let bad = JoinPoint::for_type("InvarCond", "bad_action");
        let err = host.call(&bad, vec![]).unwrap_err();
        assert_eq!(
            contract_error(&err),
            Some(&ContractError::InvariantAfter("Must not change the invar value.".into()))
        );

        let err = host.call(&good, vec![]).unwrap_err();
        assert!(matches!(contract_error(&err), Some(ContractError::InvariantBefore(_))));
    }

    #[test]
    fn test_disabled_contracts_install_nothing() {
        let config = WeftConfig {
            contracts_enabled: false,
            ..WeftConfig::default()
        };
        let host = Arc::new(TestHost::new(catalog()).with_config(config));
        let contract = ContractSpec::precondition(action("PreCond"))
            .check(has_arguments)
            .install(host.clone())
            .unwrap();

        assert!(!contract.is_active());
        assert!(contract.aspect().is_none());
        assert!(host.registry().is_empty());
        let jp = JoinPoint::for_type("PreCond", "action");
        assert_eq!(host.call(&jp, vec![]).unwrap(), json!("action()"));
    }

    #[test]
    fn test_unadvise_removes_the_check() {
        let host = host();
        let contract = ContractSpec::precondition(action("PreCond"))
            .check(has_arguments)
            .install(host.clone())
            .unwrap();
        assert!(contract.is_active());
        assert_eq!(contract.kind(), ContractKind::Precondition);

        assert_eq!(contract.unadvise().unwrap(), 1);
        let jp = JoinPoint::for_type("PreCond", "action");
        assert_eq!(host.call(&jp, vec![]).unwrap(), json!("action()"));
    }

    #[test]
    fn test_condition_is_required() {
        let err = ContractSpec::invariant(action("PreCond")).install(host()).unwrap_err();
        assert!(matches!(err, WeftError::InvalidSpecification(message) if message.contains("invariant")));
    }
}
