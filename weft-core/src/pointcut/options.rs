//! Option maps and their synonyms
//!
//! Pointcuts are usually written as loosely keyed maps (`type:`, `within_types:`,
//! `calling:` ...). This module folds every accepted key into the canonical
//! field of [`PointcutSpec`] before any matching happens.

use super::spec::{AttributeOption, PointcutSpec};
use crate::error::{Result, WeftError};
use crate::finders::method_finder::MethodOption;
use crate::finders::{MethodSelector, ObjectSelector, TypeSelector};
use crate::join_point::JoinPoint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use weft_types::{MethodName, TypeName};

/// Canonical pointcut keys and every key accepted for them
pub const KEY_SYNONYMS: &[(&str, &[&str])] = &[
    (
        "types",
        &[
            "type", "types", "within_type", "within_types", "for_type", "for_types", "on_type",
            "on_types", "in_type", "in_types",
        ],
    ),
    ("types_and_ancestors", &["type_and_ancestors", "types_and_ancestors"]),
    ("types_and_descendents", &["type_and_descendents", "types_and_descendents"]),
    (
        "objects",
        &[
            "object", "objects", "for_object", "for_objects", "on_object", "on_objects",
            "in_object", "in_objects", "within_object", "within_objects",
        ],
    ),
    ("join_points", &["join_point", "join_points"]),
    (
        "methods",
        &[
            "method",
            "methods",
            "within_method",
            "within_methods",
            "calling",
            "invoking",
            "invocations_of",
            "calls_to",
            "sending_message_to",
            "sending_messages_to",
        ],
    ),
    ("attributes", &["attribute", "attributes"]),
    (
        "method_options",
        &["method_option", "method_options", "options", "restricting_methods_to"],
    ),
    ("attribute_options", &["attribute_option", "attribute_options"]),
    ("exclude_types", &["exclude_type", "exclude_types"]),
    (
        "exclude_types_and_ancestors",
        &["exclude_type_and_ancestors", "exclude_types_and_ancestors"],
    ),
    (
        "exclude_types_and_descendents",
        &["exclude_type_and_descendents", "exclude_types_and_descendents"],
    ),
    ("exclude_objects", &["exclude_object", "exclude_objects"]),
    ("exclude_methods", &["exclude_method", "exclude_methods"]),
    ("exclude_join_points", &["exclude_join_point", "exclude_join_points"]),
    ("exclude_pointcuts", &["exclude_pointcut", "exclude_pointcuts"]),
];

/// The canonical key for `key`, if it is a pointcut key at all
pub fn canonical_key(key: &str) -> Option<&'static str> {
    KEY_SYNONYMS
        .iter()
        .find(|(_, synonyms)| synonyms.contains(&key))
        .map(|(canonical, _)| *canonical)
}

/// A value in an option map: text, a flag, a list, or a nested map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Flag(bool),
    Text(String),
    List(Vec<OptionValue>),
    Map(PointcutOptions),
}

/// Options as written in YAML or JSON, keyed by any accepted synonym
pub type PointcutOptions = BTreeMap<String, OptionValue>;

impl OptionValue {
    /// The value as a list of strings; a single string is a list of one
    pub fn strings(&self, key: &str) -> Result<Vec<&str>> {
        match self {
            OptionValue::Text(text) => Ok(vec![text.as_str()]),
            OptionValue::List(items) => items.iter().try_fold(Vec::new(), |mut all, item| {
                all.extend(item.strings(key)?);
                Ok(all)
            }),
            OptionValue::Flag(_) | OptionValue::Map(_) => Err(WeftError::invalid(format!(
                "option \"{}\" takes names or /patterns/",
                key
            ))),
        }
    }

    /// The value as a list of nested option maps
    pub fn maps(&self, key: &str) -> Result<Vec<&PointcutOptions>> {
        match self {
            OptionValue::Map(map) => Ok(vec![map]),
            OptionValue::List(items) => items.iter().try_fold(Vec::new(), |mut all, item| {
                all.extend(item.maps(key)?);
                Ok(all)
            }),
            OptionValue::Flag(_) | OptionValue::Text(_) => Err(WeftError::invalid(format!(
                "option \"{}\" takes pointcut specifications",
                key
            ))),
        }
    }

    pub fn flag(&self, key: &str) -> Result<bool> {
        match self {
            OptionValue::Flag(flag) => Ok(*flag),
            _ => Err(WeftError::invalid(format!("option \"{}\" takes true or false", key))),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(text: &str) -> Self {
        OptionValue::Text(text.to_string())
    }
}

impl<T: Into<OptionValue>> From<Vec<T>> for OptionValue {
    fn from(items: Vec<T>) -> Self {
        OptionValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// Parse `Type#method` (instance method) or `Type.method` (class method)
pub fn parse_join_point(text: &str) -> Result<JoinPoint> {
    let (type_name, method, is_instance_method) = if let Some((type_name, method)) = text.split_once('#') {
        (type_name, method, true)
    } else if let Some((type_name, method)) = text.rsplit_once('.') {
        (type_name, method, false)
    } else {
        return Err(WeftError::invalid(format!(
            "join point \"{}\" must be written Type#method or Type.method",
            text
        )));
    };
    if type_name.is_empty() || method.is_empty() {
        return Err(WeftError::invalid(format!("incomplete join point \"{}\"", text)));
    }
    JoinPoint::builder()
        .type_name(TypeName::new(type_name))
        .method(MethodName::new(method))
        .instance_method(is_instance_method)
        .build()
}

impl PointcutSpec {
    /// Build a specification from an option map
    ///
    /// Every key must be a known synonym. String values written `/.../` are
    /// regular expressions. Objects are given by type name or pattern and
    /// stand for the live instances of the matching types.
    pub fn from_options(options: &PointcutOptions) -> Result<PointcutSpec> {
        let mut spec = PointcutSpec::default();

        for (key, value) in options {
            let canonical = canonical_key(key)
                .ok_or_else(|| WeftError::invalid(format!("unknown option \"{}\"", key)))?;
            debug!(key = %key, canonical, "pointcut option");
            spec.apply(canonical, key, value)?;
        }

        spec.validate()?;
        Ok(spec)
    }

    fn apply(&mut self, canonical: &str, key: &str, value: &OptionValue) -> Result<()> {
        if canonical == "exclude_pointcuts" {
            for nested in value.maps(key)? {
                self.exclude_pointcuts.insert(PointcutSpec::from_options(nested)?);
            }
            return Ok(());
        }

        for text in value.strings(key)? {
            match canonical {
                "types" => {
                    self.types.insert(TypeSelector::parse(text)?);
                }
                "types_and_ancestors" => {
                    self.types_and_ancestors.insert(TypeSelector::parse(text)?);
                }
                "types_and_descendents" => {
                    self.types_and_descendents.insert(TypeSelector::parse(text)?);
                }
                "objects" => {
                    self.objects
                        .insert(ObjectSelector::InstancesOf(TypeSelector::parse(text)?));
                }
                "join_points" => {
                    self.join_points.insert(parse_join_point(text)?);
                }
                "methods" => {
                    self.methods.insert(MethodSelector::parse(text)?);
                }
                "attributes" => {
                    self.attributes.insert(MethodSelector::parse(text)?);
                }
                "method_options" => {
                    self.method_options.insert(text.parse::<MethodOption>()?);
                }
                "attribute_options" => {
                    self.attribute_options.insert(text.parse::<AttributeOption>()?);
                }
                "exclude_types" => {
                    self.exclude_types.insert(TypeSelector::parse(text)?);
                }
                "exclude_types_and_ancestors" => {
                    self.exclude_types_and_ancestors.insert(TypeSelector::parse(text)?);
                }
                "exclude_types_and_descendents" => {
                    self.exclude_types_and_descendents.insert(TypeSelector::parse(text)?);
                }
                "exclude_objects" => {
                    self.exclude_objects
                        .insert(ObjectSelector::InstancesOf(TypeSelector::parse(text)?));
                }
                "exclude_methods" => {
                    self.exclude_methods.insert(MethodSelector::parse(text)?);
                }
                "exclude_join_points" => {
                    self.exclude_join_points.insert(parse_join_point(text)?);
                }
                other => {
                    return Err(WeftError::invalid(format!("unknown option \"{}\"", other)));
                }
            }
        }
        Ok(())
    }
}
