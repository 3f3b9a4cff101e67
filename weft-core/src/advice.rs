//! Advice kinds, advice callables and exception filters

use crate::error::{Result, WeftError};
use crate::join_point::JoinPoint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;
use weft_types::Value;

/// The five kinds of advice, declared in composition priority order
///
/// A lower priority value wraps a higher one: all `around` advice is
/// outermost, `after_raising` sits closest to the real call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdviceKind {
    Around,
    Before,
    After,
    AfterReturning,
    AfterRaising,
}

impl AdviceKind {
    /// Every kind, outermost first
    pub const ALL: [AdviceKind; 5] = [
        AdviceKind::Around,
        AdviceKind::Before,
        AdviceKind::After,
        AdviceKind::AfterReturning,
        AdviceKind::AfterRaising,
    ];

    pub fn priority(&self) -> usize {
        match self {
            AdviceKind::Around => 0,
            AdviceKind::Before => 1,
            AdviceKind::After => 2,
            AdviceKind::AfterReturning => 3,
            AdviceKind::AfterRaising => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdviceKind::Around => "around",
            AdviceKind::Before => "before",
            AdviceKind::After => "after",
            AdviceKind::AfterReturning => "after_returning",
            AdviceKind::AfterRaising => "after_raising",
        }
    }

    /// Sort kinds outermost first, dropping duplicates
    pub fn sort_by_priority(kinds: &[AdviceKind]) -> Vec<AdviceKind> {
        let mut sorted = kinds.to_vec();
        sorted.sort_by_key(AdviceKind::priority);
        sorted.dedup();
        sorted
    }
}

impl fmt::Display for AdviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdviceKind {
    type Err = WeftError;

    fn from_str(s: &str) -> Result<Self> {
        AdviceKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| WeftError::invalid(format!("unknown advice kind \"{}\"", s)))
    }
}

/// Identifies whoever added a piece of advice, so it can be removed later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AspectId(pub Uuid);

impl AspectId {
    /// Create a new unique id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AspectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AspectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "aspect:{}", &self.0.to_string()[..8])
    }
}

/// An advice body
///
/// It receives the join point carrying the current [`Context`](crate::Context).
/// Only the return value of `around` advice is observed by the caller; the
/// other kinds change the outcome through the context.
pub type Advice = Arc<dyn Fn(&mut JoinPoint) -> anyhow::Result<Value> + Send + Sync>;

/// The block passed along with a call, if any
pub type Callback = Arc<dyn Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync>;

/// Wrap a closure as [`Advice`]
pub fn advice<F>(body: F) -> Advice
where
    F: Fn(&mut JoinPoint) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    Arc::new(body)
}

/// Wrap a closure as a [`Callback`]
pub fn callback<F>(body: F) -> Callback
where
    F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    Arc::new(body)
}

/// One accepted error type for `after_raising` advice
#[derive(Clone, Copy)]
pub struct ErrorMatcher {
    name: &'static str,
    test: fn(&anyhow::Error) -> bool,
}

fn is_error_of<E>(error: &anyhow::Error) -> bool
where
    E: fmt::Display + fmt::Debug + Send + Sync + 'static,
{
    error.is::<E>()
}

impl ErrorMatcher {
    /// Accept errors of type `E`, wherever they sit in the context chain
    pub fn of<E>() -> Self
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self {
            name: std::any::type_name::<E>(),
            test: is_error_of::<E>,
        }
    }

    /// Accept errors for which `test` returns true
    pub fn new(name: &'static str, test: fn(&anyhow::Error) -> bool) -> Self {
        Self { name, test }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn matches(&self, error: &anyhow::Error) -> bool {
        (self.test)(error)
    }
}

impl fmt::Debug for ErrorMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ErrorMatcher").field(&self.name).finish()
    }
}

/// The errors an `after_raising` advice reacts to; empty means all
#[derive(Debug, Clone, Default)]
pub struct ErrorFilter {
    matchers: Vec<ErrorMatcher>,
}

impl ErrorFilter {
    /// A filter accepting every error
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with(mut self, matcher: ErrorMatcher) -> Self {
        self.matchers.push(matcher);
        self
    }

    pub fn is_unrestricted(&self) -> bool {
        self.matchers.is_empty()
    }

    pub fn matchers(&self) -> &[ErrorMatcher] {
        &self.matchers
    }

    pub fn accepts(&self, error: &anyhow::Error) -> bool {
        self.matchers.is_empty() || self.matchers.iter().any(|m| m.matches(error))
    }
}
