//! Advice chains: the ordered interceptors registered for one join point
//!
//! A chain is an immutable singly linked list ending in a terminal node that
//! performs the real operation. Adding or removing advice builds a new list;
//! a traversal that already holds the old head keeps a consistent view.
//!
//! Interceptors are kept sorted by [`AdviceKind::priority`], outermost first.
//! Within a kind the most recently added advice is outermost.

use crate::advice::{Advice, AdviceKind, AspectId, ErrorFilter};
use crate::error::{wrap_advice_error, AdviceFailure};
use crate::join_point::{ContextOverrides, Continuation, JoinPoint};
use crate::weaving::Operation;
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use weft_types::Value;

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// One piece of advice as stored in a chain
#[derive(Clone)]
pub struct AdviceEntry {
    kind: AdviceKind,
    advice: Advice,
    owner: AspectId,
    sequence: u64,
    filter: ErrorFilter,
}

impl AdviceEntry {
    pub fn new(kind: AdviceKind, owner: AspectId, advice: Advice) -> Self {
        Self {
            kind,
            advice,
            owner,
            sequence: NEXT_SEQUENCE.fetch_add(1, Ordering::SeqCst),
            filter: ErrorFilter::any(),
        }
    }

    /// Restrict the errors `after_raising` advice reacts to
    pub fn with_filter(mut self, filter: ErrorFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn kind(&self) -> AdviceKind {
        self.kind
    }

    pub fn owner(&self) -> AspectId {
        self.owner
    }

    /// Insertion order across all chains
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn filter(&self) -> &ErrorFilter {
        &self.filter
    }

    fn sort_key(&self) -> (usize, Reverse<u64>) {
        (self.kind.priority(), Reverse(self.sequence))
    }
}

impl fmt::Debug for AdviceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdviceEntry")
            .field("kind", &self.kind)
            .field("owner", &self.owner)
            .field("sequence", &self.sequence)
            .field("filter", &self.filter)
            .finish()
    }
}

/// A node in an advice chain
pub enum AdviceChainNode {
    Interceptor {
        entry: AdviceEntry,
        next: Arc<AdviceChainNode>,
    },
    Terminal {
        join_point: JoinPoint,
        operation: Operation,
    },
}

impl AdviceChainNode {
    /// Run this node and everything inside it for one call
    pub fn call(&self, join_point: &JoinPoint) -> anyhow::Result<Value> {
        match self {
            AdviceChainNode::Terminal { operation, .. } => operation(join_point),
            AdviceChainNode::Interceptor { entry, next } => match entry.kind {
                AdviceKind::Around => around(entry, next, join_point),
                AdviceKind::Before => before(entry, next, join_point),
                AdviceKind::After => match next.call(join_point) {
                    Ok(value) => after_returning(entry, join_point, value),
                    Err(error) => after_raising(entry, join_point, error),
                },
                AdviceKind::AfterReturning => {
                    let value = next.call(join_point)?;
                    after_returning(entry, join_point, value)
                }
                AdviceKind::AfterRaising => match next.call(join_point) {
                    Ok(value) => Ok(value),
                    Err(error) if !entry.filter.accepts(&error) => Err(error),
                    Err(error) => after_raising(entry, join_point, error),
                },
            },
        }
    }
}

fn failure(entry: &AdviceEntry, join_point: &JoinPoint) -> AdviceFailure {
    AdviceFailure {
        kind: entry.kind,
        target: join_point.target().clone(),
        method: join_point.method_name().clone(),
        is_instance_method: join_point.is_instance_method(),
    }
}

fn invoke(entry: &AdviceEntry, current: &mut JoinPoint) -> anyhow::Result<Value> {
    (entry.advice)(current).map_err(|error| wrap_advice_error(error, failure(entry, current)))
}

/// Address and text of the innermost error
fn error_identity(error: &anyhow::Error) -> (usize, String) {
    let root = error.root_cause();
    let address = (root as *const (dyn std::error::Error + 'static)).cast::<()>() as usize;
    (address, root.to_string())
}

fn before(entry: &AdviceEntry, next: &Arc<AdviceChainNode>, join_point: &JoinPoint) -> anyhow::Result<Value> {
    let mut current = join_point.make_current_context_join_point(
        ContextOverrides::new()
            .advice_kind(AdviceKind::Before)
            .proceed(None),
    );
    invoke(entry, &mut current)?;
    next.call(&current)
}

fn around(entry: &AdviceEntry, next: &Arc<AdviceChainNode>, join_point: &JoinPoint) -> anyhow::Result<Value> {
    // Errors coming back through proceed belong to the wrapped call
    let passed_through: Arc<Mutex<Option<(usize, String)>>> = Arc::new(Mutex::new(None));
    let continuation: Continuation = {
        let next = Arc::clone(next);
        let passed_through = Arc::clone(&passed_through);
        Arc::new(move |inner: &JoinPoint| {
            next.call(inner).map_err(|error| {
                *passed_through.lock() = Some(error_identity(&error));
                error
            })
        })
    };

    let mut current = join_point.make_current_context_join_point(
        ContextOverrides::new()
            .advice_kind(AdviceKind::Around)
            .proceed(Some(continuation)),
    );
    (entry.advice)(&mut current).map_err(|error| {
        if passed_through.lock().as_ref() == Some(&error_identity(&error)) {
            error
        } else {
            wrap_advice_error(error, failure(entry, &current))
        }
    })
}

fn after_returning(entry: &AdviceEntry, join_point: &JoinPoint, value: Value) -> anyhow::Result<Value> {
    let mut current = join_point.make_current_context_join_point(
        ContextOverrides::new()
            .advice_kind(entry.kind)
            .proceed(None)
            .returned_value(Some(value)),
    );
    invoke(entry, &mut current)?;
    Ok(current
        .context_mut()
        .returned_value
        .take()
        .unwrap_or(Value::Null))
}

fn after_raising(entry: &AdviceEntry, join_point: &JoinPoint, error: anyhow::Error) -> anyhow::Result<Value> {
    let mut current = join_point.make_current_context_join_point(
        ContextOverrides::new()
            .advice_kind(entry.kind)
            .proceed(None)
            .raised_error(Some(error)),
    );
    invoke(entry, &mut current)?;
    let context = current.context_mut();
    match context.take_raised_error() {
        Some(error) => Err(error),
        None => Ok(context.returned_value.take().unwrap_or(Value::Null)),
    }
}

/// The advice registered for one join point, ending in the real operation
#[derive(Clone)]
pub struct AdviceChain {
    join_point: JoinPoint,
    head: Arc<AdviceChainNode>,
    terminal: Arc<AdviceChainNode>,
}

impl AdviceChain {
    /// A chain with no advice that calls `operation` directly
    pub fn new(join_point: JoinPoint, operation: Operation) -> Self {
        let join_point = join_point.without_context();
        let terminal = Arc::new(AdviceChainNode::Terminal {
            join_point: join_point.clone(),
            operation,
        });
        Self {
            join_point,
            head: Arc::clone(&terminal),
            terminal,
        }
    }

    pub fn head(&self) -> &Arc<AdviceChainNode> {
        &self.head
    }

    /// The join point this chain belongs to
    pub fn join_point(&self) -> &JoinPoint {
        &self.join_point
    }

    pub fn call(&self, join_point: &JoinPoint) -> anyhow::Result<Value> {
        self.head.call(join_point)
    }

    /// Interceptors, outermost first
    pub fn entries(&self) -> Entries<'_> {
        Entries {
            node: Some(self.head.as_ref()),
        }
    }

    pub fn kinds(&self) -> Vec<AdviceKind> {
        self.entries().map(AdviceEntry::kind).collect()
    }

    pub fn owners(&self) -> BTreeSet<AspectId> {
        self.entries().map(AdviceEntry::owner).collect()
    }

    /// Number of interceptors
    pub fn len(&self) -> usize {
        self.entries().count()
    }

    /// True when only the terminal node remains
    pub fn is_empty(&self) -> bool {
        matches!(self.head.as_ref(), AdviceChainNode::Terminal { .. })
    }

    /// A new chain with `entry` added in its priority position
    pub fn with_entry(&self, entry: AdviceEntry) -> AdviceChain {
        let mut entries: Vec<AdviceEntry> = self.entries().cloned().collect();
        entries.push(entry);
        entries.sort_by_key(AdviceEntry::sort_key);
        self.rebuild(entries)
    }

    /// A new chain without the advice added by `owner`
    pub fn without_owner(&self, owner: AspectId) -> AdviceChain {
        let survivors: Vec<AdviceEntry> = self
            .entries()
            .filter(|entry| entry.owner != owner)
            .cloned()
            .collect();
        self.rebuild(survivors)
    }

    fn rebuild(&self, entries: Vec<AdviceEntry>) -> AdviceChain {
        let head = entries
            .into_iter()
            .rev()
            .fold(Arc::clone(&self.terminal), |next, entry| {
                Arc::new(AdviceChainNode::Interceptor { entry, next })
            });
        AdviceChain {
            join_point: self.join_point.clone(),
            head,
            terminal: Arc::clone(&self.terminal),
        }
    }
}

impl fmt::Debug for AdviceChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdviceChain")
            .field("join_point", &self.join_point().to_string())
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// Iterator over the interceptors of a chain
pub struct Entries<'a> {
    node: Option<&'a AdviceChainNode>,
}

impl<'a> Iterator for Entries<'a> {
    type Item = &'a AdviceEntry;

    fn next(&mut self) -> Option<Self::Item> {
        match self.node? {
            AdviceChainNode::Interceptor { entry, next } => {
                self.node = Some(next.as_ref());
                Some(entry)
            }
            AdviceChainNode::Terminal { .. } => {
                self.node = None;
                None
            }
        }
    }
}
