//! Error types for weft-core

use crate::advice::AdviceKind;
use crate::config::ConfigError;
use std::fmt;
use thiserror::Error;
use weft_types::{MethodName, TargetRef};

/// Errors raised while building pointcuts and aspects or driving a chain
#[derive(Debug, Error)]
pub enum WeftError {
    /// Malformed or self-contradictory options
    #[error("Invalid specification: {0}")]
    InvalidSpecification(String),

    /// `proceed` was called outside of around advice
    #[error("proceed requires a continuation, which only around advice has (join point: {join_point})")]
    NoContinuation { join_point: String },

    /// The weaver could not install or retract interception
    #[error("Cannot weave {join_point}: {reason}")]
    Weaving { join_point: String, reason: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl WeftError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        WeftError::InvalidSpecification(message.into())
    }

    /// Weaving failure for `join_point`
    pub fn weaving(join_point: impl fmt::Display, reason: impl fmt::Display) -> Self {
        WeftError::Weaving {
            join_point: join_point.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type using WeftError
pub type Result<T> = std::result::Result<T, WeftError>;

/// Context attached to an error raised by an advice body
///
/// The original error stays underneath, so callers can still match it with
/// `anyhow::Error::downcast_ref` or `is`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdviceFailure {
    pub kind: AdviceKind,
    pub target: TargetRef,
    pub method: MethodName,
    pub is_instance_method: bool,
}

impl fmt::Display for AdviceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = if self.is_instance_method { "#" } else { "." };
        write!(
            f,
            "Exception raised while executing \"{}\" advice for \"{}{}{}\"",
            self.kind, self.target, separator, self.method
        )
    }
}

/// Attach advice context unless an inner advice already did
pub(crate) fn wrap_advice_error(error: anyhow::Error, failure: AdviceFailure) -> anyhow::Error {
    if error.downcast_ref::<AdviceFailure>().is_some() {
        error
    } else {
        error.context(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_types::TypeName;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    fn failure(kind: AdviceKind) -> AdviceFailure {
        AdviceFailure {
            kind,
            target: TargetRef::Type(TypeName::new("Watchful")),
            method: MethodName::new("greet"),
            is_instance_method: true,
        }
    }

    #[test]
    fn test_wrapped_error_keeps_original_type() {
        let wrapped = wrap_advice_error(anyhow::Error::new(Boom), failure(AdviceKind::Before));
        assert!(wrapped.is::<Boom>());
        assert_eq!(
            format!("{:#}", wrapped),
            "Exception raised while executing \"before\" advice for \"Watchful#greet\": boom"
        );
    }

    #[test]
    fn test_wrapping_is_not_repeated() {
        let once = wrap_advice_error(anyhow::Error::new(Boom), failure(AdviceKind::Before));
        let twice = wrap_advice_error(once, failure(AdviceKind::Around));
        assert_eq!(twice.chain().count(), 2);
        assert_eq!(twice.downcast_ref::<AdviceFailure>().unwrap().kind, AdviceKind::Before);
    }

    #[test]
    fn test_class_method_separator() {
        let mut f = failure(AdviceKind::After);
        f.is_instance_method = false;
        assert!(f.to_string().ends_with("\"Watchful.greet\""));
    }
}
