//! # weft-core
//!
//! Pointcut matching and advice-chain composition.
//!
//! This crate resolves declarative pointcut specifications into concrete
//! join points through a host-supplied [`Catalog`], and keeps, per join
//! point, the ordered chain of advice that runs around the real operation.
//! Intercepting calls is left to a host implementing [`Weaver`].

pub mod advice;
pub mod aspect;
pub mod chain;
pub mod config;
pub mod error;
pub mod extras;
pub mod finder_result;
pub mod finders;
pub mod join_point;
pub mod pointcut;
pub mod registry;
pub mod weaving;

#[cfg(test)]
mod testing;

pub use advice::{advice, callback, Advice, AdviceKind, AspectId, Callback, ErrorFilter, ErrorMatcher};
pub use aspect::{Aspect, AspectSpec};
pub use chain::{AdviceChain, AdviceChainNode, AdviceEntry};
pub use config::{ConfigError, WeftConfig};
pub use error::{AdviceFailure, Result, WeftError};
pub use extras::{Contract, ContractError, ContractKind, ContractSpec};
pub use finder_result::FinderResult;
pub use finders::method_finder::MethodOption;
pub use finders::{
    Catalog, FoundPointcuts, MethodDescriptor, MethodSelector, NamedPointcuts, ObjectSelector, Pattern,
    PointcutName, PointcutQuery, TypeSelector,
};
pub use join_point::{Context, ContextOverrides, Continuation, JoinPoint, JoinPointBuilder};
pub use pointcut::{all_of, any_of, AttributeOption, OptionValue, Pointcut, PointcutOptions, PointcutSpec};
pub use registry::{AdviceRegistry, ChainKey};
pub use weaving::{Operation, Weaver, Weaving};
