//! Process-wide table of advice chains
//!
//! One slot per (target, method, instance flag). A slot is created by the
//! first `advise`, replaced by every later `advise`/`unadvise`, and dropped
//! once its last advice is removed. Mutations of a slot hold the slot's
//! write lock for the whole read-rebuild-install sequence, so concurrent
//! callers never lose each other's advice.

use crate::advice::AspectId;
use crate::chain::{AdviceChain, AdviceEntry};
use crate::error::Result;
use crate::join_point::JoinPoint;
use crate::weaving::Weaver;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;
use weft_types::{MethodName, TargetRef};

/// Registry key for a join point
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainKey {
    pub target: TargetRef,
    pub method_name: MethodName,
    pub is_instance_method: bool,
}

impl ChainKey {
    pub fn new(target: TargetRef, method_name: MethodName, is_instance_method: bool) -> Self {
        Self {
            target,
            method_name,
            is_instance_method,
        }
    }

    pub fn of(join_point: &JoinPoint) -> Self {
        Self::new(
            join_point.target().clone(),
            join_point.method_name().clone(),
            join_point.is_instance_method(),
        )
    }
}

/// Advice chains by join point
#[derive(Default)]
pub struct AdviceRegistry {
    chains: DashMap<ChainKey, AdviceChain>,
}

impl AdviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `entry` to the chain for `join_point` and install the result
    pub fn advise(&self, join_point: &JoinPoint, entry: AdviceEntry, weaver: &dyn Weaver) -> Result<AdviceChain> {
        let kind = entry.kind();
        let owner = entry.owner();
        let chain = match self.chains.entry(ChainKey::of(join_point)) {
            Entry::Occupied(mut slot) => {
                let chain = slot.get().with_entry(entry);
                weaver.install(join_point, &chain)?;
                slot.insert(chain.clone());
                chain
            }
            Entry::Vacant(slot) => {
                let operation = weaver.terminal(join_point)?;
                let chain = AdviceChain::new(join_point.clone(), operation).with_entry(entry);
                weaver.install(join_point, &chain)?;
                slot.insert(chain.clone());
                chain
            }
        };
        debug!(join_point = %join_point, %kind, %owner, depth = chain.len(), "advised");
        Ok(chain)
    }

    /// Remove everything `owner` added for `join_point`
    ///
    /// Returns true if the owner had advice there. When no advice remains the
    /// weaver retracts interception and the slot is dropped.
    pub fn unadvise(&self, owner: AspectId, join_point: &JoinPoint, weaver: &dyn Weaver) -> Result<bool> {
        let Entry::Occupied(mut slot) = self.chains.entry(ChainKey::of(join_point)) else {
            return Ok(false);
        };
        if !slot.get().owners().contains(&owner) {
            return Ok(false);
        }

        let chain = slot.get().without_owner(owner);
        if chain.is_empty() {
            weaver.retract(join_point)?;
            slot.remove();
            debug!(join_point = %join_point, %owner, "unadvised; interception retracted");
        } else {
            weaver.install(join_point, &chain)?;
            debug!(join_point = %join_point, %owner, depth = chain.len(), "unadvised");
            slot.insert(chain);
        }
        Ok(true)
    }

    /// The current chain for `join_point`, if it is advised
    pub fn chain(&self, join_point: &JoinPoint) -> Option<AdviceChain> {
        self.chain_for(&ChainKey::of(join_point))
    }

    pub fn chain_for(&self, key: &ChainKey) -> Option<AdviceChain> {
        self.chains.get(key).map(|chain| chain.value().clone())
    }

    pub fn is_advised(&self, join_point: &JoinPoint) -> bool {
        self.chains.contains_key(&ChainKey::of(join_point))
    }

    /// Advised join points, in sorted order
    pub fn join_points(&self) -> Vec<JoinPoint> {
        let mut join_points: Vec<JoinPoint> = self
            .chains
            .iter()
            .map(|chain| chain.value().join_point().clone())
            .collect();
        join_points.sort();
        join_points
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::{advice, AdviceKind};
    use crate::error::WeftError;
    use crate::join_point::Context;
    use crate::weaving::Operation;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;
    use weft_types::{TypeName, Value};

    /// Records install/retract calls instead of intercepting anything
    #[derive(Default)]
    struct RecordingWeaver {
        events: Mutex<Vec<String>>,
    }

    impl Weaver for RecordingWeaver {
        fn install(&self, join_point: &JoinPoint, chain: &AdviceChain) -> Result<()> {
            self.events
                .lock()
                .push(format!("install {} x{}", join_point, chain.len()));
            Ok(())
        }

        fn retract(&self, join_point: &JoinPoint) -> Result<()> {
            self.events.lock().push(format!("retract {}", join_point));
            Ok(())
        }

        fn terminal(&self, join_point: &JoinPoint) -> Result<Operation> {
            if join_point.method_name().as_str() == "missing" {
                return Err(WeftError::weaving(join_point, "no such method"));
            }
            Ok(Arc::new(|_: &JoinPoint| -> anyhow::Result<Value> { Ok(json!("real")) }))
        }
    }

    fn entry(kind: AdviceKind, owner: AspectId) -> AdviceEntry {
        AdviceEntry::new(kind, owner, advice(|_| Ok(Value::Null)))
    }

    #[test]
    fn test_advise_then_unadvise_retracts() {
        let registry = AdviceRegistry::new();
        let weaver = RecordingWeaver::default();
        let jp = JoinPoint::for_type("Watchful", "greet");
        let owner = AspectId::new();

        registry.advise(&jp, entry(AdviceKind::Before, owner), &weaver).unwrap();
        assert!(registry.is_advised(&jp));
        assert!(registry.unadvise(owner, &jp, &weaver).unwrap());
        assert!(!registry.is_advised(&jp));
        assert!(registry.is_empty());

        assert_eq!(
            *weaver.events.lock(),
            vec!["install Watchful#greet x1", "retract Watchful#greet"]
        );
    }

    #[test]
    fn test_unadvise_keeps_other_owners() {
        let registry = AdviceRegistry::new();
        let weaver = RecordingWeaver::default();
        let jp = JoinPoint::for_type("Watchful", "greet");
        let first = AspectId::new();
        let second = AspectId::new();

        registry.advise(&jp, entry(AdviceKind::After, first), &weaver).unwrap();
        registry.advise(&jp, entry(AdviceKind::Before, second), &weaver).unwrap();
        registry.unadvise(first, &jp, &weaver).unwrap();

        let chain = registry.chain(&jp).unwrap();
        assert_eq!(chain.kinds(), vec![AdviceKind::Before]);
        assert!(!registry.unadvise(first, &jp, &weaver).unwrap());
    }

    #[test]
    fn test_chain_calls_terminal() {
        let registry = AdviceRegistry::new();
        let weaver = RecordingWeaver::default();
        let jp = JoinPoint::for_type("Watchful", "greet");
        let chain = registry
            .advise(&jp, entry(AdviceKind::Before, AspectId::new()), &weaver)
            .unwrap();
        let call = jp.with_context(Context::new(TargetRef::Type(TypeName::new("Watchful")), vec![]));
        assert_eq!(chain.call(&call).unwrap(), json!("real"));
    }

    #[test]
    fn test_terminal_failure_leaves_no_slot() {
        let registry = AdviceRegistry::new();
        let weaver = RecordingWeaver::default();
        let jp = JoinPoint::for_type("Watchful", "missing");
        let err = registry
            .advise(&jp, entry(AdviceKind::Before, AspectId::new()), &weaver)
            .unwrap_err();
        assert!(matches!(err, WeftError::Weaving { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_advise_keeps_every_entry() {
        let registry = Arc::new(AdviceRegistry::new());
        let weaver = Arc::new(RecordingWeaver::default());
        let jp = JoinPoint::for_type("Watchful", "greet");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let weaver = Arc::clone(&weaver);
                let jp = jp.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        registry
                            .advise(&jp, entry(AdviceKind::Before, AspectId::new()), weaver.as_ref())
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.chain(&jp).unwrap().len(), 200);
    }
}
