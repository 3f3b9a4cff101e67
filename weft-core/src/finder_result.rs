//! Matched / not-matched bookkeeping shared by every finder
//!
//! A [`FinderResult`] records, per search key, the items that were found
//! and, separately, the requested items that resolved to nothing. Results
//! from different searches are combined with [`FinderResult::union`],
//! [`FinderResult::intersection`] and [`FinderResult::difference`].
//!
//! A value is never both matched and not matched under the same key: adding
//! a match removes it from the not-matched side, and a not-matched key whose
//! values are all matched disappears.

use std::collections::{BTreeMap, BTreeSet};

/// Result of a finder query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinderResult<K: Ord, V: Ord> {
    matched: BTreeMap<K, BTreeSet<V>>,
    not_matched: BTreeMap<K, BTreeSet<V>>,
}

impl<K: Ord, V: Ord> Default for FinderResult<K, V> {
    fn default() -> Self {
        Self {
            matched: BTreeMap::new(),
            not_matched: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone, V: Ord + Clone> FinderResult<K, V> {
    /// Create an empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Matched keys and the items found for them
    pub fn matched(&self) -> &BTreeMap<K, BTreeSet<V>> {
        &self.matched
    }

    /// Keys for which nothing was found, with the items requested for them
    pub fn not_matched(&self) -> &BTreeMap<K, BTreeSet<V>> {
        &self.not_matched
    }

    pub fn matched_keys(&self) -> impl Iterator<Item = &K> {
        self.matched.keys()
    }

    pub fn not_matched_keys(&self) -> impl Iterator<Item = &K> {
        self.not_matched.keys()
    }

    /// True when nothing was matched
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }

    /// True when nothing was matched and nothing is reported as missing
    pub fn is_blank(&self) -> bool {
        self.matched.is_empty() && self.not_matched.is_empty()
    }

    /// Record a match for `key`
    pub fn insert_matched(&mut self, key: K, values: impl IntoIterator<Item = V>) {
        self.matched.entry(key.clone()).or_default().extend(values);
        self.purge_key(&key);
    }

    /// Record that `key` yielded nothing for the given requested items
    pub fn insert_not_matched(&mut self, key: K, values: impl IntoIterator<Item = V>) {
        self.not_matched.entry(key.clone()).or_default().extend(values);
        self.purge_key(&key);
    }

    /// Merge another result into this one
    pub fn append(&mut self, other: FinderResult<K, V>) {
        for (key, values) in other.matched {
            self.matched.entry(key).or_default().extend(values);
        }
        for (key, values) in other.not_matched {
            self.not_matched.entry(key).or_default().extend(values);
        }
        self.purge();
    }

    /// Union of two results
    pub fn union(&self, other: &FinderResult<K, V>) -> FinderResult<K, V> {
        let mut result = FinderResult {
            matched: map_union(&self.matched, &other.matched),
            not_matched: map_union(&self.not_matched, &other.not_matched),
        };
        result.purge();
        result
    }

    /// Intersection of two results: keys present on both sides, with the
    /// items common to both
    pub fn intersection(&self, other: &FinderResult<K, V>) -> FinderResult<K, V> {
        FinderResult {
            matched: map_intersection(&self.matched, &other.matched),
            not_matched: map_intersection(&self.not_matched, &other.not_matched),
        }
    }

    /// Remove everything `other` reports
    ///
    /// A key whose item set in `other` is empty is removed entirely;
    /// otherwise only the listed items are removed from it.
    pub fn difference(&self, other: &FinderResult<K, V>) -> FinderResult<K, V> {
        FinderResult {
            matched: map_difference(&self.matched, &other.matched),
            not_matched: map_difference(&self.not_matched, &other.not_matched),
        }
    }

    fn purge(&mut self) {
        let keys: Vec<K> = self
            .not_matched
            .keys()
            .filter(|key| self.matched.contains_key(*key))
            .cloned()
            .collect();
        for key in keys {
            self.purge_key(&key);
        }
    }

    fn purge_key(&mut self, key: &K) {
        let Some(found) = self.matched.get(key) else {
            return;
        };
        if let Some(missing) = self.not_matched.get_mut(key) {
            missing.retain(|value| !found.contains(value));
            if missing.is_empty() {
                self.not_matched.remove(key);
            }
        }
    }
}

fn map_union<K: Ord + Clone, V: Ord + Clone>(
    left: &BTreeMap<K, BTreeSet<V>>,
    right: &BTreeMap<K, BTreeSet<V>>,
) -> BTreeMap<K, BTreeSet<V>> {
    let mut result = left.clone();
    for (key, values) in right {
        result
            .entry(key.clone())
            .or_default()
            .extend(values.iter().cloned());
    }
    result
}

fn map_intersection<K: Ord + Clone, V: Ord + Clone>(
    left: &BTreeMap<K, BTreeSet<V>>,
    right: &BTreeMap<K, BTreeSet<V>>,
) -> BTreeMap<K, BTreeSet<V>> {
    left.iter()
        .filter_map(|(key, values)| {
            right.get(key).map(|other| {
                (
                    key.clone(),
                    values.intersection(other).cloned().collect::<BTreeSet<V>>(),
                )
            })
        })
        .collect()
}

fn map_difference<K: Ord + Clone, V: Ord + Clone>(
    left: &BTreeMap<K, BTreeSet<V>>,
    right: &BTreeMap<K, BTreeSet<V>>,
) -> BTreeMap<K, BTreeSet<V>> {
    left.iter()
        .filter_map(|(key, values)| match right.get(key) {
            None => Some((key.clone(), values.clone())),
            Some(removed) if removed.is_empty() => None,
            Some(removed) => {
                let remaining: BTreeSet<V> = values.difference(removed).cloned().collect();
                (!remaining.is_empty()).then(|| (key.clone(), remaining))
            }
        })
        .collect()
}
