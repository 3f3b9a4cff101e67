//! The normalized pointcut specification

use super::Pointcut;
use crate::error::{Result, WeftError};
use crate::finders::method_finder::MethodOption;
use crate::finders::{MethodOptions, MethodSelector, ObjectSelector, TypeSelector};
use crate::join_point::JoinPoint;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use weft_types::ObjectRef;

/// Options accepted for attributes
///
/// `readers` or `writers` alone keep one half of the expansion; any method
/// option applies to the attribute methods as it would to other methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeOption {
    Readers,
    Writers,
    Method(MethodOption),
}

impl FromStr for AttributeOption {
    type Err = WeftError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "reader" | "readers" => Ok(AttributeOption::Readers),
            "writer" | "writers" => Ok(AttributeOption::Writers),
            other => other
                .parse::<MethodOption>()
                .map(AttributeOption::Method)
                .map_err(|_| WeftError::invalid(format!("unknown attribute option \"{}\"", other))),
        }
    }
}

impl fmt::Display for AttributeOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeOption::Readers => f.write_str("readers"),
            AttributeOption::Writers => f.write_str("writers"),
            AttributeOption::Method(option) => write!(f, "{}", option),
        }
    }
}

/// What a [`Pointcut`] selects, with every synonym already resolved
///
/// Built either field by field with the builder methods or from an option
/// map with [`PointcutSpec::from_options`](super::options). Resolution
/// happens in [`Pointcut::new`].
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct PointcutSpec {
    pub types: BTreeSet<TypeSelector>,
    pub types_and_ancestors: BTreeSet<TypeSelector>,
    pub types_and_descendents: BTreeSet<TypeSelector>,
    pub objects: BTreeSet<ObjectSelector>,
    pub join_points: BTreeSet<JoinPoint>,
    pub methods: BTreeSet<MethodSelector>,
    pub attributes: BTreeSet<MethodSelector>,
    pub method_options: BTreeSet<MethodOption>,
    pub attribute_options: BTreeSet<AttributeOption>,
    pub exclude_types: BTreeSet<TypeSelector>,
    pub exclude_types_and_ancestors: BTreeSet<TypeSelector>,
    pub exclude_types_and_descendents: BTreeSet<TypeSelector>,
    pub exclude_objects: BTreeSet<ObjectSelector>,
    pub exclude_methods: BTreeSet<MethodSelector>,
    pub exclude_join_points: BTreeSet<JoinPoint>,
    /// Resolved alongside this specification; their matches are removed
    pub exclude_pointcuts: BTreeSet<PointcutSpec>,
}

impl PointcutSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a type by exact name
    pub fn type_name(mut self, name: &str) -> Self {
        self.types.insert(TypeSelector::Name(name.to_string()));
        self
    }

    pub fn type_selector(mut self, selector: impl Into<TypeSelector>) -> Self {
        self.types.insert(selector.into());
        self
    }

    pub fn type_and_ancestors(mut self, selector: impl Into<TypeSelector>) -> Self {
        self.types_and_ancestors.insert(selector.into());
        self
    }

    pub fn type_and_descendents(mut self, selector: impl Into<TypeSelector>) -> Self {
        self.types_and_descendents.insert(selector.into());
        self
    }

    pub fn object(mut self, object: ObjectRef) -> Self {
        self.objects.insert(ObjectSelector::Object(object));
        self
    }

    /// Select the live instances of the matching types
    pub fn instances_of(mut self, selector: impl Into<TypeSelector>) -> Self {
        self.objects.insert(ObjectSelector::InstancesOf(selector.into()));
        self
    }

    pub fn join_point(mut self, join_point: JoinPoint) -> Self {
        self.join_points.insert(join_point.without_context());
        self
    }

    pub fn method(mut self, selector: impl Into<MethodSelector>) -> Self {
        self.methods.insert(selector.into());
        self
    }

    pub fn attribute(mut self, selector: impl Into<MethodSelector>) -> Self {
        self.attributes.insert(selector.into());
        self
    }

    pub fn method_option(mut self, option: MethodOption) -> Self {
        self.method_options.insert(option);
        self
    }

    pub fn attribute_option(mut self, option: AttributeOption) -> Self {
        self.attribute_options.insert(option);
        self
    }

    pub fn exclude_type(mut self, selector: impl Into<TypeSelector>) -> Self {
        self.exclude_types.insert(selector.into());
        self
    }

    pub fn exclude_type_name(self, name: &str) -> Self {
        self.exclude_type(TypeSelector::Name(name.to_string()))
    }

    pub fn exclude_type_and_ancestors(mut self, selector: impl Into<TypeSelector>) -> Self {
        self.exclude_types_and_ancestors.insert(selector.into());
        self
    }

    pub fn exclude_type_and_descendents(mut self, selector: impl Into<TypeSelector>) -> Self {
        self.exclude_types_and_descendents.insert(selector.into());
        self
    }

    pub fn exclude_object(mut self, object: ObjectRef) -> Self {
        self.exclude_objects.insert(ObjectSelector::Object(object));
        self
    }

    pub fn exclude_method(mut self, selector: impl Into<MethodSelector>) -> Self {
        self.exclude_methods.insert(selector.into());
        self
    }

    pub fn exclude_join_point(mut self, join_point: JoinPoint) -> Self {
        self.exclude_join_points.insert(join_point.without_context());
        self
    }

    /// Exclude whatever `pointcut` matched when it was resolved
    pub fn exclude_pointcut(mut self, pointcut: &Pointcut) -> Self {
        self.exclude_join_points
            .extend(pointcut.join_points_matched().iter().map(JoinPoint::without_context));
        self
    }

    /// Exclude whatever `spec` matches when this specification is resolved
    pub fn exclude_pointcut_spec(mut self, spec: PointcutSpec) -> Self {
        self.exclude_pointcuts.insert(spec);
        self
    }

    /// Whether any type or object is selected
    pub fn has_targets(&self) -> bool {
        !(self.types.is_empty()
            && self.types_and_ancestors.is_empty()
            && self.types_and_descendents.is_empty()
            && self.objects.is_empty())
    }

    /// Whether nothing at all is selected
    pub fn is_empty(&self) -> bool {
        !self.has_targets() && self.join_points.is_empty()
    }

    /// Reject self-contradictory specifications
    pub fn validate(&self) -> Result<()> {
        if self.attributes.contains(&MethodSelector::All) {
            return Err(WeftError::invalid("\"all\" is not supported for attributes"));
        }
        self.effective_method_options()?;
        for excluded in &self.exclude_pointcuts {
            excluded.validate()?;
        }
        Ok(())
    }

    /// Fill in defaults: with targets but neither methods nor attributes,
    /// every method is selected
    pub fn normalized(mut self) -> Self {
        if self.methods.is_empty() && self.attributes.is_empty() && self.has_targets() {
            self.methods.insert(MethodSelector::All);
        }
        self
    }

    /// Method options combined with the method options given for attributes
    pub fn effective_method_options(&self) -> Result<MethodOptions> {
        let from_attributes = self.attribute_options.iter().filter_map(|option| match option {
            AttributeOption::Method(option) => Some(option),
            _ => None,
        });
        MethodOptions::from_options(self.method_options.iter().chain(from_attributes))
    }

    /// Field-wise union
    pub fn union(&self, other: &PointcutSpec) -> PointcutSpec {
        self.combine(other, SetOp::Union)
    }

    /// Field-wise intersection
    pub fn intersection(&self, other: &PointcutSpec) -> PointcutSpec {
        self.combine(other, SetOp::Intersection)
    }

    fn combine(&self, other: &PointcutSpec, op: SetOp) -> PointcutSpec {
        PointcutSpec {
            types: op.apply(&self.types, &other.types),
            types_and_ancestors: op.apply(&self.types_and_ancestors, &other.types_and_ancestors),
            types_and_descendents: op.apply(&self.types_and_descendents, &other.types_and_descendents),
            objects: op.apply(&self.objects, &other.objects),
            join_points: op.apply(&self.join_points, &other.join_points),
            methods: op.apply(&self.methods, &other.methods),
            attributes: op.apply(&self.attributes, &other.attributes),
            method_options: op.apply(&self.method_options, &other.method_options),
            attribute_options: op.apply(&self.attribute_options, &other.attribute_options),
            exclude_types: op.apply(&self.exclude_types, &other.exclude_types),
            exclude_types_and_ancestors: op.apply(
                &self.exclude_types_and_ancestors,
                &other.exclude_types_and_ancestors,
            ),
            exclude_types_and_descendents: op.apply(
                &self.exclude_types_and_descendents,
                &other.exclude_types_and_descendents,
            ),
            exclude_objects: op.apply(&self.exclude_objects, &other.exclude_objects),
            exclude_methods: op.apply(&self.exclude_methods, &other.exclude_methods),
            exclude_join_points: op.apply(&self.exclude_join_points, &other.exclude_join_points),
            exclude_pointcuts: op.apply(&self.exclude_pointcuts, &other.exclude_pointcuts),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum SetOp {
    Union,
    Intersection,
}

impl SetOp {
    fn apply<T: Ord + Clone>(self, a: &BTreeSet<T>, b: &BTreeSet<T>) -> BTreeSet<T> {
        match self {
            SetOp::Union => a.union(b).cloned().collect(),
            SetOp::Intersection => a.intersection(b).cloned().collect(),
        }
    }
}
