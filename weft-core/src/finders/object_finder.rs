//! Object lookup: literal references, or the live instances of types

use super::{Catalog, Lineage, ObjectSelector, TypeFinder, TypeSelector};
use crate::finder_result::FinderResult;
use weft_types::TargetRef;

/// Resolves [`ObjectSelector`]s against a catalog
///
/// Matched keys are always object targets. A type selector that yields no
/// live instance is reported as a not-matched type target.
pub struct ObjectFinder<'a> {
    catalog: &'a dyn Catalog,
}

impl<'a> ObjectFinder<'a> {
    pub fn new(catalog: &'a dyn Catalog) -> Self {
        Self { catalog }
    }

    pub fn find<'s>(
        &self,
        selectors: impl IntoIterator<Item = &'s ObjectSelector>,
    ) -> FinderResult<TargetRef, String> {
        let types = TypeFinder::new(self.catalog);
        let mut result = FinderResult::new();

        for selector in selectors {
            match selector {
                ObjectSelector::Object(object) => {
                    result.insert_matched(TargetRef::Object(object.clone()), []);
                }
                ObjectSelector::InstancesOf(type_selector) => {
                    let found = types.find(std::iter::once(type_selector), Lineage::Exact);
                    let instances: Vec<_> = found
                        .matched_keys()
                        .flat_map(|name| self.catalog.instances(name))
                        .collect();
                    if instances.is_empty() {
                        result.insert_not_matched(not_matched_key(type_selector), []);
                    }
                    for object in instances {
                        result.insert_matched(TargetRef::Object(object), []);
                    }
                }
            }
        }

        result
    }
}

fn not_matched_key(selector: &TypeSelector) -> TargetRef {
    TargetRef::Type(selector.to_string().into())
}
