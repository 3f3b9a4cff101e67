//! Pointcuts: declarative queries resolved into concrete join points
//!
//! A [`Pointcut`] is computed once, at construction, from a
//! [`PointcutSpec`] and a [`Catalog`]:
//!
//! 1. types are found by name or namespace-aware pattern, optionally with
//!    their ancestors or descendents, and excluded types are subtracted;
//! 2. objects are taken literally or as the live instances of types, minus
//!    excluded objects and objects of excluded types;
//! 3. methods (and expanded attributes) are searched on every candidate,
//!    yielding one matched join point per method found and one not-matched
//!    join point per requested name on a target where nothing was found;
//! 4. explicit join points are split by whether their method exists;
//! 5. excluded join points, pointcuts, methods, types and objects are
//!    removed from the matches. Exclusion never adds anything to the
//!    not-matched side.

pub mod attributes;
pub mod composition;
pub mod options;
pub mod spec;

pub use composition::{all_of, any_of};
pub use options::{OptionValue, PointcutOptions};
pub use spec::{AttributeOption, PointcutSpec};

use crate::config::WeftConfig;
use crate::error::Result;
use crate::finder_result::FinderResult;
use crate::finders::{Catalog, Lineage, MethodFinder, MethodSelector, ObjectFinder, TypeFinder, TypeSelector};
use crate::join_point::JoinPoint;
use std::collections::BTreeSet;
use tracing::debug;
use weft_types::{TargetRef, TypeName};

/// A resolved query over join points
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pointcut {
    specification: PointcutSpec,
    candidate_types: FinderResult<TypeName, String>,
    candidate_types_excluded: FinderResult<TypeName, String>,
    candidate_objects: FinderResult<TargetRef, String>,
    join_points_matched: BTreeSet<JoinPoint>,
    join_points_not_matched: BTreeSet<JoinPoint>,
}

impl Pointcut {
    /// Resolve `spec` against `catalog` with the default configuration
    pub fn new(spec: PointcutSpec, catalog: &dyn Catalog) -> Result<Pointcut> {
        Self::with_config(spec, catalog, &WeftConfig::default())
    }

    pub fn with_config(spec: PointcutSpec, catalog: &dyn Catalog, config: &WeftConfig) -> Result<Pointcut> {
        spec.validate()?;
        let specification = spec.normalized();
        let mut pointcut = Resolver {
            catalog,
            config,
            spec: &specification,
        }
        .resolve()?;
        pointcut.specification = specification;
        Ok(pointcut)
    }

    /// The pointcut that matches nothing
    pub fn empty() -> Pointcut {
        Pointcut::default()
    }

    pub fn specification(&self) -> &PointcutSpec {
        &self.specification
    }

    pub fn candidate_types(&self) -> &FinderResult<TypeName, String> {
        &self.candidate_types
    }

    pub fn candidate_types_excluded(&self) -> &FinderResult<TypeName, String> {
        &self.candidate_types_excluded
    }

    pub fn candidate_objects(&self) -> &FinderResult<TargetRef, String> {
        &self.candidate_objects
    }

    pub fn join_points_matched(&self) -> &BTreeSet<JoinPoint> {
        &self.join_points_matched
    }

    pub fn join_points_not_matched(&self) -> &BTreeSet<JoinPoint> {
        &self.join_points_not_matched
    }

    /// True when nothing was matched and nothing is reported missing
    pub fn is_empty(&self) -> bool {
        self.join_points_matched.is_empty() && self.join_points_not_matched.is_empty()
    }
}

struct Resolver<'a> {
    catalog: &'a dyn Catalog,
    config: &'a WeftConfig,
    spec: &'a PointcutSpec,
}

impl Resolver<'_> {
    fn resolve(&self) -> Result<Pointcut> {
        let spec = self.spec;
        let types = TypeFinder::new(self.catalog);
        let find_types = |exact: &BTreeSet<TypeSelector>,
                          ancestors: &BTreeSet<TypeSelector>,
                          descendents: &BTreeSet<TypeSelector>| {
            types
                .find(exact, Lineage::Exact)
                .union(&types.find(ancestors, Lineage::WithAncestors))
                .union(&types.find(descendents, Lineage::WithDescendents))
        };

        let candidate_types_excluded = find_types(
            &spec.exclude_types,
            &spec.exclude_types_and_ancestors,
            &spec.exclude_types_and_descendents,
        );
        let candidate_types = find_types(
            &spec.types,
            &spec.types_and_ancestors,
            &spec.types_and_descendents,
        )
        .difference(&candidate_types_excluded);

        let candidate_objects = self.candidate_objects(&candidate_types_excluded);

        let mut matched = BTreeSet::new();
        let mut not_matched = BTreeSet::new();
        self.find_method_join_points(&candidate_types, &candidate_objects, &mut matched, &mut not_matched)?;

        for join_point in &spec.join_points {
            if join_point.exists(self.catalog) {
                matched.insert(join_point.clone().with_resolved_visibility(self.catalog));
            } else {
                not_matched.insert(join_point.clone());
            }
        }

        let excluded = self.excluded_join_points()?;
        let excluded_objects = ObjectFinder::new(self.catalog).find(&spec.exclude_objects);
        matched.retain(|join_point| {
            !(excluded.contains(join_point)
                || spec
                    .exclude_methods
                    .iter()
                    .any(|selector| selector.matches(join_point.method_name()))
                || candidate_types_excluded
                    .matched()
                    .contains_key(join_point.type_name())
                || excluded_objects.matched().contains_key(join_point.target()))
        });

        debug!(
            matched = matched.len(),
            not_matched = not_matched.len(),
            "pointcut resolved"
        );

        Ok(Pointcut {
            specification: PointcutSpec::default(),
            candidate_types,
            candidate_types_excluded,
            candidate_objects,
            join_points_matched: matched,
            join_points_not_matched: not_matched,
        })
    }

    fn candidate_objects(
        &self,
        excluded_types: &FinderResult<TypeName, String>,
    ) -> FinderResult<TargetRef, String> {
        let objects = ObjectFinder::new(self.catalog);
        let mut excluded = objects.find(&self.spec.exclude_objects);
        let found = objects.find(&self.spec.objects);
        for target in found.matched_keys() {
            if excluded_types.matched().contains_key(target.type_name()) {
                excluded.insert_matched(target.clone(), []);
            }
        }
        found.difference(&excluded)
    }

    fn find_method_join_points(
        &self,
        candidate_types: &FinderResult<TypeName, String>,
        candidate_objects: &FinderResult<TargetRef, String>,
        matched: &mut BTreeSet<JoinPoint>,
        not_matched: &mut BTreeSet<JoinPoint>,
    ) -> Result<()> {
        let spec = self.spec;
        let selectors: BTreeSet<MethodSelector> = spec
            .methods
            .iter()
            .cloned()
            .chain(attributes::expand(&spec.attributes, &spec.attribute_options)?)
            .collect();
        if selectors.is_empty() {
            return Ok(());
        }

        let targets: Vec<TargetRef> = candidate_types
            .matched_keys()
            .cloned()
            .map(TargetRef::Type)
            .chain(candidate_objects.matched_keys().cloned())
            .collect();
        if targets.is_empty() {
            return Ok(());
        }

        let options = spec.effective_method_options()?;
        let found = MethodFinder::new(self.catalog, self.config)?.find(
            &targets,
            &selectors,
            &spec.exclude_methods,
            &options,
        );

        for (key, names) in found.matched() {
            for name in names {
                matched.insert(
                    JoinPoint::new(key.target.clone(), name.clone(), key.is_instance_method)
                        .with_resolved_visibility(self.catalog),
                );
            }
        }
        for (key, names) in found.not_matched() {
            for name in names {
                not_matched.insert(JoinPoint::new(key.target.clone(), name.clone(), key.is_instance_method));
            }
        }
        Ok(())
    }

    fn excluded_join_points(&self) -> Result<BTreeSet<JoinPoint>> {
        let mut excluded = self.spec.exclude_join_points.clone();
        for spec in &self.spec.exclude_pointcuts {
            let pointcut = Pointcut::with_config(spec.clone(), self.catalog, self.config)?;
            excluded.extend(pointcut.join_points_matched);
        }
        Ok(excluded)
    }
}
