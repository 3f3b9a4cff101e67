//! Method lookup on types and objects, filtered by method options

use super::{Catalog, MethodDescriptor, MethodSelector};
use crate::config::WeftConfig;
use crate::error::{Result, WeftError};
use crate::finder_result::FinderResult;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use weft_types::{MethodName, MethodScope, TargetRef, Visibility};

/// Options restricting which methods a search considers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodOption {
    Public,
    Protected,
    Private,
    Instance,
    Class,
    Singleton,
    ExcludeAncestorMethods,
    IncludeSystemMethods,
}

/// Canonical option names and the synonyms accepted for them
pub const METHOD_OPTION_SYNONYMS: &[(MethodOption, &[&str])] = &[
    (MethodOption::Public, &["public", "public_methods"]),
    (MethodOption::Protected, &["protected", "protected_methods"]),
    (MethodOption::Private, &["private", "private_methods"]),
    (MethodOption::Instance, &["instance", "instance_methods"]),
    (MethodOption::Class, &["class", "class_methods"]),
    (MethodOption::Singleton, &["singleton", "singleton_methods"]),
    (
        MethodOption::ExcludeAncestorMethods,
        &[
            "exclude_ancestor_methods",
            "exclude_ancestors",
            "exclude_ancestors_methods",
            "suppress_ancestors",
            "suppress_ancestor_methods",
            "suppress_ancestors_methods",
        ],
    ),
    (
        MethodOption::IncludeSystemMethods,
        &["include_system_methods", "include_all_system_methods"],
    ),
];

impl FromStr for MethodOption {
    type Err = WeftError;

    fn from_str(s: &str) -> Result<Self> {
        METHOD_OPTION_SYNONYMS
            .iter()
            .find(|(_, names)| names.contains(&s))
            .map(|(option, _)| *option)
            .ok_or_else(|| WeftError::invalid(format!("unknown method option \"{}\"", s)))
    }
}

impl fmt::Display for MethodOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = METHOD_OPTION_SYNONYMS
            .iter()
            .find(|(option, _)| option == self)
            .map(|(_, names)| names[0])
            .unwrap_or("?");
        f.write_str(name)
    }
}

/// Method options after defaults and validation
///
/// Without a visibility option only public methods are found; without a
/// scope option only instance methods are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodOptions {
    visibilities: BTreeSet<Visibility>,
    instance: bool,
    class: bool,
    singleton: bool,
    exclude_ancestor_methods: bool,
    include_system_methods: bool,
}

impl Default for MethodOptions {
    fn default() -> Self {
        Self {
            visibilities: BTreeSet::from([Visibility::Public]),
            instance: true,
            class: false,
            singleton: false,
            exclude_ancestor_methods: false,
            include_system_methods: false,
        }
    }
}

impl MethodOptions {
    pub fn from_options<'a>(options: impl IntoIterator<Item = &'a MethodOption>) -> Result<Self> {
        let options: BTreeSet<MethodOption> = options.into_iter().copied().collect();
        let has = |option| options.contains(&option);

        if has(MethodOption::Singleton)
            && (has(MethodOption::Class)
                || has(MethodOption::Public)
                || has(MethodOption::Protected)
                || has(MethodOption::Private))
        {
            return Err(WeftError::invalid(
                "the singleton method option cannot be combined with class, public, protected or private",
            ));
        }

        let mut visibilities = BTreeSet::new();
        for (option, visibility) in [
            (MethodOption::Public, Visibility::Public),
            (MethodOption::Protected, Visibility::Protected),
            (MethodOption::Private, Visibility::Private),
        ] {
            if has(option) {
                visibilities.insert(visibility);
            }
        }
        if visibilities.is_empty() {
            visibilities.insert(Visibility::Public);
        }

        let class = has(MethodOption::Class);
        let singleton = has(MethodOption::Singleton);
        Ok(Self {
            visibilities,
            instance: has(MethodOption::Instance) || !(class || singleton),
            class,
            singleton,
            exclude_ancestor_methods: has(MethodOption::ExcludeAncestorMethods),
            include_system_methods: has(MethodOption::IncludeSystemMethods),
        })
    }

    pub fn includes_system_methods(&self) -> bool {
        self.include_system_methods
    }

    /// Instance flags of the join points a search on `target` can yield
    fn scopes_for(&self, target: &TargetRef) -> Vec<bool> {
        let mut scopes = Vec::new();
        if self.singleton {
            scopes.push(target.is_object());
            return scopes;
        }
        if self.instance {
            scopes.push(true);
        }
        if self.class && target.is_type() {
            scopes.push(false);
        }
        scopes
    }

    fn accepts(&self, target: &TargetRef, method: &MethodDescriptor) -> bool {
        if self.exclude_ancestor_methods && !declared_on(target, method) {
            return false;
        }
        if self.singleton {
            return match target {
                TargetRef::Type(_) => method.scope == MethodScope::Class,
                TargetRef::Object(_) => method.scope == MethodScope::Singleton,
            };
        }
        let scope_ok = match (target, method.scope) {
            (_, MethodScope::Instance) => self.instance,
            (TargetRef::Object(_), MethodScope::Singleton) => self.instance,
            (TargetRef::Type(_), MethodScope::Class) => self.class,
            _ => false,
        };
        scope_ok && self.visibilities.contains(&method.visibility)
    }
}

fn declared_on(target: &TargetRef, method: &MethodDescriptor) -> bool {
    match &method.declared_in {
        None => true,
        Some(owner) => owner == target.type_name(),
    }
}

/// Key of a method search result: the target and the kind of method found
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodTarget {
    pub target: TargetRef,
    pub is_instance_method: bool,
}

impl fmt::Display for MethodTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_instance_method { "instance" } else { "class" };
        write!(f, "{} ({} methods)", self.target, kind)
    }
}

pub type MethodFinderResult = FinderResult<MethodTarget, MethodName>;

/// Finds methods on types and objects
pub struct MethodFinder<'a> {
    catalog: &'a dyn Catalog,
    ignored: Vec<Regex>,
}

impl<'a> MethodFinder<'a> {
    pub fn new(catalog: &'a dyn Catalog, config: &WeftConfig) -> Result<Self> {
        Ok(Self {
            catalog,
            ignored: config.ignored_methods()?,
        })
    }

    /// Search `targets` for methods selected by `methods`, minus `exclude`
    ///
    /// Targets with no method at all matching the selectors are reported as
    /// not matched, with the requested names. A target whose matches are all
    /// excluded appears in neither half.
    pub fn find<'t>(
        &self,
        targets: impl IntoIterator<Item = &'t TargetRef>,
        methods: &BTreeSet<MethodSelector>,
        exclude: &BTreeSet<MethodSelector>,
        options: &MethodOptions,
    ) -> MethodFinderResult {
        let mut result = MethodFinderResult::new();
        if exclude.contains(&MethodSelector::All) {
            return result;
        }
        let tokens: Vec<MethodName> = methods.iter().map(MethodSelector::token).collect();

        for target in targets {
            let mut found: BTreeMap<bool, BTreeSet<MethodName>> = BTreeMap::new();
            for method in self.catalog.methods(target) {
                if !options.accepts(target, &method)
                    || !methods.iter().any(|selector| selector.matches(&method.name))
                    || (!options.include_system_methods && self.is_ignored(&method.name))
                {
                    continue;
                }
                found
                    .entry(method.scope.is_instance())
                    .or_default()
                    .insert(method.name);
            }

            if found.is_empty() {
                debug!(target = %target, "no methods matched");
                for is_instance_method in options.scopes_for(target) {
                    let key = MethodTarget {
                        target: target.clone(),
                        is_instance_method,
                    };
                    result.insert_not_matched(key, tokens.iter().cloned());
                }
                continue;
            }

            for (is_instance_method, mut names) in found {
                names.retain(|name| !exclude.iter().any(|selector| selector.matches(name)));
                if names.is_empty() {
                    continue;
                }
                let key = MethodTarget {
                    target: target.clone(),
                    is_instance_method,
                };
                result.insert_matched(key, names);
            }
        }

        result
    }

    fn is_ignored(&self, name: &MethodName) -> bool {
        self.ignored.iter().any(|pattern| pattern.is_match(name.as_str()))
    }
}
