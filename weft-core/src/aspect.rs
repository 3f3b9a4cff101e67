//! Aspects: advice attached to every join point a set of pointcuts selects
//!
//! An [`AspectSpec`] says which kinds of advice to run, the advice itself and
//! where to run it: pointcut specifications, already-resolved pointcuts,
//! explicit join points, or inline type/object/method selectors. Building an
//! [`Aspect`] validates the specification, resolves it and advises every
//! matched join point; [`Aspect::unadvise`] removes it again.

use crate::advice::{Advice, AdviceKind, AspectId, ErrorFilter, ErrorMatcher};
use crate::chain::AdviceEntry;
use crate::error::{Result, WeftError};
use crate::finders::method_finder::MethodOption;
use crate::finders::{MethodSelector, TypeSelector};
use crate::join_point::JoinPoint;
use crate::pointcut::composition::any_of;
use crate::pointcut::options::canonical_key;
use crate::pointcut::{AttributeOption, Pointcut, PointcutOptions, PointcutSpec};
use crate::weaving::Weaving;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use weft_types::ObjectRef;

/// Aspect-level option keys and their synonyms
pub const ASPECT_KEY_SYNONYMS: &[(&str, &[&str])] = &[
    ("pointcuts", &["pointcut", "pointcuts", "within_pointcut", "within_pointcuts"]),
    (
        "ignore_no_matching_join_points",
        &["ignore_no_matching_join_points", "ignore_no_jps"],
    ),
];

/// Everything needed to build an [`Aspect`]
#[derive(Clone, Default)]
pub struct AspectSpec {
    kinds: BTreeSet<AdviceKind>,
    advice: Option<Advice>,
    exceptions: ErrorFilter,
    pointcut_specs: Vec<PointcutSpec>,
    pointcuts: Vec<Pointcut>,
    inline: PointcutSpec,
    exclusions: PointcutSpec,
    ignore_no_matching_join_points: bool,
}

impl AspectSpec {
    pub fn new(kind: AdviceKind) -> Self {
        Self::default().kind(kind)
    }

    pub fn kind(mut self, kind: AdviceKind) -> Self {
        self.kinds.insert(kind);
        self
    }

    pub fn advice<F>(mut self, body: F) -> Self
    where
        F: Fn(&mut JoinPoint) -> anyhow::Result<weft_types::Value> + Send + Sync + 'static,
    {
        self.advice = Some(Arc::new(body));
        self
    }

    pub fn with_advice(mut self, advice: Advice) -> Self {
        self.advice = Some(advice);
        self
    }

    /// React only to errors of type `E` (`after_raising` only)
    pub fn exception<E>(mut self) -> Self
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.exceptions = self.exceptions.with(ErrorMatcher::of::<E>());
        self
    }

    pub fn exceptions(mut self, filter: ErrorFilter) -> Self {
        self.exceptions = filter;
        self
    }

    pub fn pointcut(mut self, spec: PointcutSpec) -> Self {
        self.pointcut_specs.push(spec);
        self
    }

    pub fn resolved_pointcut(mut self, pointcut: Pointcut) -> Self {
        self.pointcuts.push(pointcut);
        self
    }

    pub fn join_point(mut self, join_point: JoinPoint) -> Self {
        self.inline = self.inline.join_point(join_point);
        self
    }

    pub fn type_name(mut self, name: &str) -> Self {
        self.inline = self.inline.type_name(name);
        self
    }

    pub fn type_selector(mut self, selector: impl Into<TypeSelector>) -> Self {
        self.inline = self.inline.type_selector(selector);
        self
    }

    pub fn object(mut self, object: ObjectRef) -> Self {
        self.inline = self.inline.object(object);
        self
    }

    pub fn instances_of(mut self, selector: impl Into<TypeSelector>) -> Self {
        self.inline = self.inline.instances_of(selector);
        self
    }

    pub fn method(mut self, selector: impl Into<MethodSelector>) -> Self {
        self.inline = self.inline.method(selector);
        self
    }

    pub fn attribute(mut self, selector: impl Into<MethodSelector>) -> Self {
        self.inline = self.inline.attribute(selector);
        self
    }

    pub fn method_option(mut self, option: MethodOption) -> Self {
        self.inline = self.inline.method_option(option);
        self
    }

    pub fn attribute_option(mut self, option: AttributeOption) -> Self {
        self.inline = self.inline.attribute_option(option);
        self
    }

    pub fn exclude_type_name(mut self, name: &str) -> Self {
        self.exclusions = self.exclusions.exclude_type_name(name);
        self
    }

    pub fn exclude_object(mut self, object: ObjectRef) -> Self {
        self.exclusions = self.exclusions.exclude_object(object);
        self
    }

    pub fn exclude_method(mut self, selector: impl Into<MethodSelector>) -> Self {
        self.exclusions = self.exclusions.exclude_method(selector);
        self
    }

    pub fn exclude_join_point(mut self, join_point: JoinPoint) -> Self {
        self.exclusions = self.exclusions.exclude_join_point(join_point);
        self
    }

    pub fn exclude_pointcut(mut self, pointcut: &Pointcut) -> Self {
        self.exclusions = self.exclusions.exclude_pointcut(pointcut);
        self
    }

    /// Do not warn when nothing matches
    pub fn ignore_no_matching_join_points(mut self, ignore: bool) -> Self {
        self.ignore_no_matching_join_points = ignore;
        self
    }

    pub fn kinds(&self) -> &BTreeSet<AdviceKind> {
        &self.kinds
    }

    /// Build a specification from an option map
    ///
    /// Advice kinds are keys with the value `true`; `pointcut(s)` takes
    /// nested pointcut maps; every other key is a pointcut key applied
    /// inline, with `exclude_*` keys applying to every pointcut.
    pub fn from_options(options: &PointcutOptions, advice: Advice) -> Result<AspectSpec> {
        let mut spec = AspectSpec::default().with_advice(advice);
        let mut inline = PointcutOptions::new();
        let mut exclusions = PointcutOptions::new();

        for (key, value) in options {
            if let Ok(kind) = key.parse::<AdviceKind>() {
                if value.flag(key)? {
                    spec.kinds.insert(kind);
                }
                continue;
            }
            match aspect_key(key) {
                Some("pointcuts") => {
                    for nested in value.maps(key)? {
                        spec.pointcut_specs.push(PointcutSpec::from_options(nested)?);
                    }
                }
                Some(_) => spec.ignore_no_matching_join_points = value.flag(key)?,
                None => {
                    let canonical = canonical_key(key)
                        .ok_or_else(|| WeftError::invalid(format!("unknown option \"{}\"", key)))?;
                    let target = if canonical.starts_with("exclude_") {
                        &mut exclusions
                    } else {
                        &mut inline
                    };
                    target.insert(key.clone(), value.clone());
                }
            }
        }

        spec.inline = PointcutSpec::from_options(&inline)?;
        spec.exclusions = PointcutSpec::from_options(&exclusions)?;
        Ok(spec)
    }

    /// Reject contradictory or incomplete specifications
    pub fn validate(&self) -> Result<()> {
        let has = |kind| self.kinds.contains(&kind);

        if self.kinds.is_empty() {
            return Err(WeftError::invalid("at least one kind of advice is required"));
        }
        if has(AdviceKind::Around) && self.kinds.len() > 1 {
            return Err(WeftError::invalid(
                "around advice cannot be combined with other kinds of advice",
            ));
        }
        if has(AdviceKind::After) && (has(AdviceKind::AfterReturning) || has(AdviceKind::AfterRaising)) {
            return Err(WeftError::invalid(
                "after advice cannot be combined with after_returning or after_raising",
            ));
        }
        if has(AdviceKind::AfterReturning) && has(AdviceKind::AfterRaising) {
            return Err(WeftError::invalid(
                "after_returning and after_raising advice cannot be combined",
            ));
        }
        if !self.exceptions.is_unrestricted() && !has(AdviceKind::AfterRaising) {
            return Err(WeftError::invalid("exceptions can only be given for after_raising advice"));
        }
        let has_pointcuts = !(self.pointcut_specs.is_empty() && self.pointcuts.is_empty());
        if has_pointcuts && self.inline.has_targets() {
            return Err(WeftError::invalid(
                "pointcuts cannot be combined with types or objects",
            ));
        }
        if !has_pointcuts && self.inline.is_empty() {
            return Err(WeftError::invalid(
                "a pointcut, join point, type or object is required",
            ));
        }
        if self.advice.is_none() {
            return Err(WeftError::invalid("no advice was given"));
        }
        self.inline.validate()?;
        self.exclusions.validate()?;
        for spec in &self.pointcut_specs {
            spec.validate()?;
        }
        Ok(())
    }

    fn resolve(&self, weaving: &dyn Weaving) -> Result<Pointcut> {
        let catalog = weaving.catalog();
        let config = weaving.config();
        let no_exclusions = self.exclusions == PointcutSpec::default();
        let mut resolved = Vec::new();

        if !self.inline.is_empty() {
            let spec = self.inline.union(&self.exclusions);
            resolved.push(Pointcut::with_config(spec, catalog, config)?);
        }
        for spec in &self.pointcut_specs {
            resolved.push(Pointcut::with_config(spec.union(&self.exclusions), catalog, config)?);
        }
        for pointcut in &self.pointcuts {
            if no_exclusions {
                resolved.push(pointcut.clone());
                continue;
            }
            let mut spec = self.exclusions.clone();
            spec.join_points = pointcut.join_points_matched().clone();
            resolved.push(Pointcut::with_config(spec, catalog, config)?);
        }

        Ok(any_of(&resolved))
    }
}

impl fmt::Debug for AspectSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AspectSpec")
            .field("kinds", &self.kinds)
            .field("advice", &self.advice.is_some())
            .field("exceptions", &self.exceptions)
            .field("pointcut_specs", &self.pointcut_specs)
            .field("pointcuts", &self.pointcuts.len())
            .field("inline", &self.inline)
            .field("exclusions", &self.exclusions)
            .finish()
    }
}

fn aspect_key(key: &str) -> Option<&'static str> {
    ASPECT_KEY_SYNONYMS
        .iter()
        .find(|(_, synonyms)| synonyms.contains(&key))
        .map(|(canonical, _)| *canonical)
}

/// Advice installed on every join point of a pointcut
pub struct Aspect {
    id: AspectId,
    kinds: Vec<AdviceKind>,
    pointcut: Pointcut,
    weaving: Arc<dyn Weaving>,
    advised: AtomicBool,
}

impl Aspect {
    /// Validate `spec`, resolve it and advise every matched join point
    ///
    /// If advising any join point fails, whatever this aspect had already
    /// installed is removed before the error is returned.
    pub fn new(spec: AspectSpec, weaving: Arc<dyn Weaving>) -> Result<Aspect> {
        spec.validate()?;
        let advice = spec
            .advice
            .clone()
            .ok_or_else(|| WeftError::invalid("no advice was given"))?;
        let pointcut = spec.resolve(weaving.as_ref())?;

        let kinds: Vec<AdviceKind> = spec.kinds.iter().copied().collect();
        let aspect = Aspect {
            id: AspectId::new(),
            kinds: AdviceKind::sort_by_priority(&kinds),
            pointcut,
            weaving,
            advised: AtomicBool::new(true),
        };

        if aspect.pointcut.join_points_matched().is_empty() {
            if !spec.ignore_no_matching_join_points && aspect.weaving.config().warn_on_unmatched {
                warn!(
                    aspect = %aspect.id,
                    not_matched = aspect.pointcut.join_points_not_matched().len(),
                    "no join points matched; the aspect has no effect"
                );
            }
            return Ok(aspect);
        }

        if let Err(error) = aspect.advise_all(&advice, &spec.exceptions) {
            if let Err(rollback) = aspect.unadvise() {
                warn!(aspect = %aspect.id, error = %rollback, "rollback after a failed advise did not complete");
            }
            return Err(error);
        }
        debug!(
            aspect = %aspect.id,
            join_points = aspect.pointcut.join_points_matched().len(),
            kinds = ?aspect.kinds,
            "aspect advised"
        );
        Ok(aspect)
    }

    fn advise_all(&self, advice: &Advice, exceptions: &ErrorFilter) -> Result<()> {
        let registry = self.weaving.registry();
        let weaver = self.weaving.weaver();
        for join_point in self.pointcut.join_points_matched() {
            for kind in self.kinds.iter().rev() {
                let mut entry = AdviceEntry::new(*kind, self.id, Arc::clone(advice));
                if *kind == AdviceKind::AfterRaising {
                    entry = entry.with_filter(exceptions.clone());
                }
                registry.advise(join_point, entry, weaver)?;
            }
        }
        Ok(())
    }

    /// Remove this aspect's advice from every join point
    ///
    /// Returns the number of join points it was removed from; a second call
    /// removes nothing.
    pub fn unadvise(&self) -> Result<usize> {
        if !self.advised.swap(false, Ordering::SeqCst) {
            return Ok(0);
        }
        let registry = self.weaving.registry();
        let weaver = self.weaving.weaver();
        let mut removed = 0;
        for join_point in self.pointcut.join_points_matched() {
            if registry.unadvise(self.id, join_point, weaver)? {
                removed += 1;
            }
        }
        debug!(aspect = %self.id, removed, "aspect unadvised");
        Ok(removed)
    }

    pub fn id(&self) -> AspectId {
        self.id
    }

    /// Advice kinds, outermost first
    pub fn kinds(&self) -> &[AdviceKind] {
        &self.kinds
    }

    pub fn pointcut(&self) -> &Pointcut {
        &self.pointcut
    }

    pub fn join_points_matched(&self) -> &BTreeSet<JoinPoint> {
        self.pointcut.join_points_matched()
    }

    pub fn join_points_not_matched(&self) -> &BTreeSet<JoinPoint> {
        self.pointcut.join_points_not_matched()
    }

    pub fn is_advised(&self) -> bool {
        self.advised.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aspect")
            .field("id", &self.id)
            .field("kinds", &self.kinds)
            .field("join_points", &self.pointcut.join_points_matched().len())
            .field("advised", &self.is_advised())
            .finish()
    }
}
