//! Named pointcuts declared on types, and lookup by type and name
//!
//! A type can publish pointcuts under names of its own choosing so that
//! aspects written elsewhere reuse them instead of repeating the query.
//! [`NamedPointcuts::find`] selects types the way the type finder does and
//! then filters their pointcuts by exact name or pattern.

use super::{Catalog, Lineage, Pattern, TypeFinder, TypeSelector};
use crate::error::{Result, WeftError};
use crate::finder_result::FinderResult;
use crate::pointcut::Pointcut;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;
use weft_types::TypeName;

/// Selects pointcut names
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum PointcutName {
    Name(String),
    Pattern(Pattern),
}

impl PointcutName {
    /// Parse option text: `/.../` is a pattern, anything else a name
    pub fn parse(text: &str) -> Result<Self> {
        match Pattern::parse_delimited(text) {
            Some(pattern) => Ok(PointcutName::Pattern(pattern?)),
            None => Ok(PointcutName::Name(text.to_string())),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            PointcutName::Name(literal) => literal == name,
            PointcutName::Pattern(pattern) => pattern.is_match(name),
        }
    }
}

impl fmt::Display for PointcutName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointcutName::Name(name) => f.write_str(name),
            PointcutName::Pattern(pattern) => write!(f, "{}", pattern),
        }
    }
}

impl From<&str> for PointcutName {
    fn from(name: &str) -> Self {
        PointcutName::Name(name.to_string())
    }
}

/// Which named pointcuts to look for
#[derive(Debug, Clone, Default)]
pub struct PointcutQuery {
    types: Vec<TypeSelector>,
    lineage: Lineage,
    names: Vec<PointcutName>,
}

impl PointcutQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn type_name(mut self, name: &str) -> Self {
        self.types.push(TypeSelector::Name(name.to_string()));
        self
    }

    pub fn type_selector(mut self, selector: impl Into<TypeSelector>) -> Self {
        self.types.push(selector.into());
        self
    }

    /// Search the named types and everything derived from them
    pub fn with_descendents(mut self) -> Self {
        self.lineage = Lineage::WithDescendents;
        self
    }

    pub fn with_ancestors(mut self) -> Self {
        self.lineage = Lineage::WithAncestors;
        self
    }

    /// Restrict to pointcuts with a matching name; without any, all match
    pub fn named(mut self, name: impl Into<PointcutName>) -> Self {
        self.names.push(name.into());
        self
    }

    fn accepts(&self, name: &str) -> bool {
        self.names.is_empty() || self.names.iter().any(|selector| selector.matches(name))
    }
}

/// Pointcuts found by [`NamedPointcuts::find`]
///
/// Matched keys are the types that declare at least one selected pointcut,
/// mapped to the selected names. Not-matched keys are type selectors that
/// found no type.
#[derive(Debug, Clone, Default)]
pub struct FoundPointcuts {
    result: FinderResult<TypeName, String>,
    pointcuts: BTreeMap<(TypeName, String), Pointcut>,
}

impl FoundPointcuts {
    pub fn result(&self) -> &FinderResult<TypeName, String> {
        &self.result
    }

    pub fn get(&self, type_name: &TypeName, name: &str) -> Option<&Pointcut> {
        self.pointcuts.get(&(type_name.clone(), name.to_string()))
    }

    /// Every pointcut found, ordered by type then name
    pub fn pointcuts(&self) -> impl Iterator<Item = &Pointcut> {
        self.pointcuts.values()
    }

    pub fn len(&self) -> usize {
        self.pointcuts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pointcuts.is_empty()
    }
}

/// Pointcuts published by types under a name
#[derive(Debug, Default)]
pub struct NamedPointcuts {
    table: RwLock<BTreeMap<TypeName, BTreeMap<String, Pointcut>>>,
}

impl NamedPointcuts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `pointcut` as `name` on `type_name`, returning any pointcut
    /// it replaces
    pub fn define(&self, type_name: TypeName, name: impl Into<String>, pointcut: Pointcut) -> Option<Pointcut> {
        let name = name.into();
        debug!(type_name = %type_name, name = %name, "defined named pointcut");
        self.table
            .write()
            .entry(type_name)
            .or_default()
            .insert(name, pointcut)
    }

    pub fn remove(&self, type_name: &TypeName, name: &str) -> Option<Pointcut> {
        let mut table = self.table.write();
        let removed = table.get_mut(type_name)?.remove(name);
        if table.get(type_name).is_some_and(BTreeMap::is_empty) {
            table.remove(type_name);
        }
        removed
    }

    pub fn get(&self, type_name: &TypeName, name: &str) -> Option<Pointcut> {
        self.table.read().get(type_name)?.get(name).cloned()
    }

    /// Find the pointcuts `query` selects among the types of `catalog`
    pub fn find(&self, catalog: &dyn Catalog, query: &PointcutQuery) -> Result<FoundPointcuts> {
        if query.types.is_empty() {
            return Err(WeftError::invalid("finding named pointcuts requires at least one type"));
        }

        let types = TypeFinder::new(catalog).find(&query.types, query.lineage);
        let mut found = FoundPointcuts::default();
        for (key, values) in types.not_matched() {
            found.result.insert_not_matched(key.clone(), values.iter().cloned());
        }

        let table = self.table.read();
        for type_name in types.matched_keys() {
            let Some(declared) = table.get(type_name) else {
                continue;
            };
            for (name, pointcut) in declared.iter().filter(|(name, _)| query.accepts(name)) {
                found.result.insert_matched(type_name.clone(), [name.clone()]);
                found
                    .pointcuts
                    .insert((type_name.clone(), name.clone()), pointcut.clone());
            }
        }
        debug!(found = found.len(), "named pointcut search");
        Ok(found)
    }
}
