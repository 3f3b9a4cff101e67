//! Type lookup by exact name or namespace-aware pattern
//!
//! A pattern is split on `::` and each piece is matched against the
//! corresponding segment of a qualified type name, so `/Shop::Ord/` finds
//! `Shop::Order` but never `ShopOrder` or `Shop::Billing::Order`. The first
//! piece is anchored on the right, the last on the left and inner pieces on
//! both sides; a pattern without `::` is tried against top-level types only.

use super::{Catalog, Pattern, TypeSelector};
use crate::finder_result::FinderResult;
use regex::Regex;
use std::collections::BTreeSet;
use tracing::debug;
use weft_types::{TypeName, NAMESPACE_SEPARATOR};

/// Whether found types are extended through the inheritance relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lineage {
    #[default]
    Exact,
    WithAncestors,
    WithDescendents,
}

/// Resolves [`TypeSelector`]s against a catalog
pub struct TypeFinder<'a> {
    catalog: &'a dyn Catalog,
}

impl<'a> TypeFinder<'a> {
    pub fn new(catalog: &'a dyn Catalog) -> Self {
        Self { catalog }
    }

    /// Find every type selected by `selectors`
    ///
    /// Matched types map to an empty set. Names and patterns that found
    /// nothing are recorded as not-matched keys.
    pub fn find<'s>(
        &self,
        selectors: impl IntoIterator<Item = &'s TypeSelector>,
        lineage: Lineage,
    ) -> FinderResult<TypeName, String> {
        let known: BTreeSet<TypeName> = self.catalog.type_names().into_iter().collect();
        let mut result = FinderResult::new();

        for selector in selectors {
            let found: Vec<TypeName> = match selector {
                TypeSelector::Type(name) => vec![name.clone()],
                TypeSelector::Name(name) => {
                    let name = TypeName::new(name.trim());
                    if known.contains(&name) {
                        vec![name]
                    } else {
                        Vec::new()
                    }
                }
                TypeSelector::Pattern(pattern) => match_namespaced(pattern, &known),
            };

            if found.is_empty() {
                debug!(selector = %selector, "no types matched");
                result.insert_not_matched(TypeName::new(selector.to_string()), []);
                continue;
            }

            for name in found {
                for related in self.extend(&name, lineage) {
                    result.insert_matched(related, []);
                }
                result.insert_matched(name, []);
            }
        }

        result
    }

    fn extend(&self, name: &TypeName, lineage: Lineage) -> Vec<TypeName> {
        match lineage {
            Lineage::Exact => Vec::new(),
            Lineage::WithAncestors => self.catalog.ancestors(name),
            Lineage::WithDescendents => self.catalog.descendents(name),
        }
    }
}

fn match_namespaced(pattern: &Pattern, known: &BTreeSet<TypeName>) -> Vec<TypeName> {
    let pieces: Vec<&str> = pattern.as_str().split(NAMESPACE_SEPARATOR).collect();
    let last = pieces.len() - 1;
    let anchored: Result<Vec<Regex>, regex::Error> = pieces
        .iter()
        .enumerate()
        .filter(|(_, piece)| !piece.is_empty())
        .map(|(index, piece)| {
            let left = if index == 0 { "" } else { "^" };
            let right = if index == last { "" } else { "$" };
            Regex::new(&format!("{}(?:{}){}", left, piece, right))
        })
        .collect();

    // A piece that is not a regex on its own (e.g. a group spanning `::`)
    let anchored = match anchored {
        Ok(anchored) if !anchored.is_empty() => anchored,
        _ => return Vec::new(),
    };

    known
        .iter()
        .filter(|name| {
            let segments: Vec<&str> = name.segments().collect();
            segments.len() == anchored.len()
                && segments
                    .iter()
                    .zip(anchored.iter())
                    .all(|(segment, regex)| regex.is_match(segment))
        })
        .cloned()
        .collect()
}
