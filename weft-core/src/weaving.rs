//! Collaborator traits for hosts that intercept calls

use crate::chain::AdviceChain;
use crate::config::WeftConfig;
use crate::error::Result;
use crate::finders::Catalog;
use crate::join_point::JoinPoint;
use crate::registry::AdviceRegistry;
use std::sync::Arc;
use weft_types::Value;

/// The real operation behind a join point
///
/// Reads the receiver, arguments and callback from the join point's context.
pub type Operation = Arc<dyn Fn(&JoinPoint) -> anyhow::Result<Value> + Send + Sync>;

/// Installs and retracts interception of calls
pub trait Weaver: Send + Sync {
    /// Route calls of `join_point` through `chain`, replacing any earlier chain
    fn install(&self, join_point: &JoinPoint, chain: &AdviceChain) -> Result<()>;

    /// Restore direct calls of `join_point`
    fn retract(&self, join_point: &JoinPoint) -> Result<()>;

    /// The callable that performs the un-advised operation
    fn terminal(&self, join_point: &JoinPoint) -> Result<Operation>;
}

/// Everything an aspect needs to advise a host
pub trait Weaving: Send + Sync {
    fn catalog(&self) -> &dyn Catalog;
    fn weaver(&self) -> &dyn Weaver;
    fn registry(&self) -> &AdviceRegistry;
    fn config(&self) -> &WeftConfig;
}
