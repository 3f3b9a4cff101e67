//! `or` and `and` over resolved pointcuts
//!
//! Both operations work on the already-resolved parts, so composing never
//! consults a catalog. `or` unions everything and drops not-matched join
//! points that the other side matched; `and` intersects everything.

use super::Pointcut;
use std::collections::BTreeSet;

impl Pointcut {
    /// Join points selected by either pointcut
    pub fn or(&self, other: &Pointcut) -> Pointcut {
        let join_points_matched: BTreeSet<_> = self
            .join_points_matched
            .union(&other.join_points_matched)
            .cloned()
            .collect();
        let join_points_not_matched = self
            .join_points_not_matched
            .union(&other.join_points_not_matched)
            .filter(|join_point| !join_points_matched.contains(*join_point))
            .cloned()
            .collect();

        Pointcut {
            specification: self.specification.union(&other.specification),
            candidate_types: self.candidate_types.union(&other.candidate_types),
            candidate_types_excluded: self
                .candidate_types_excluded
                .union(&other.candidate_types_excluded),
            candidate_objects: self.candidate_objects.union(&other.candidate_objects),
            join_points_matched,
            join_points_not_matched,
        }
    }

    /// Join points selected by both pointcuts
    pub fn and(&self, other: &Pointcut) -> Pointcut {
        Pointcut {
            specification: self.specification.intersection(&other.specification),
            candidate_types: self.candidate_types.intersection(&other.candidate_types),
            candidate_types_excluded: self
                .candidate_types_excluded
                .intersection(&other.candidate_types_excluded),
            candidate_objects: self.candidate_objects.intersection(&other.candidate_objects),
            join_points_matched: self
                .join_points_matched
                .intersection(&other.join_points_matched)
                .cloned()
                .collect(),
            join_points_not_matched: self
                .join_points_not_matched
                .intersection(&other.join_points_not_matched)
                .cloned()
                .collect(),
        }
    }
}

/// `or` over any number of pointcuts; the empty pointcut for none
pub fn any_of<'a>(pointcuts: impl IntoIterator<Item = &'a Pointcut>) -> Pointcut {
    pointcuts
        .into_iter()
        .fold(Pointcut::empty(), |acc, pointcut| acc.or(pointcut))
}

/// `and` over one or more pointcuts; `None` for none
pub fn all_of<'a>(pointcuts: impl IntoIterator<Item = &'a Pointcut>) -> Option<Pointcut> {
    let mut pointcuts = pointcuts.into_iter();
    let first = pointcuts.next()?.clone();
    Some(pointcuts.fold(first, |acc, pointcut| acc.and(pointcut)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finders::{Pattern, TypeSelector};
    use crate::join_point::JoinPoint;
    use crate::pointcut::PointcutSpec;
    use crate::testing::StaticCatalog;
    use weft_types::Visibility;

    struct Fixture {
        catalog: StaticCatalog,
    }

    impl Fixture {
        fn new() -> Self {
            let mut catalog = StaticCatalog::new()
                .with_type("Watchful", None)
                .with_type("Account", None)
                .with_type("Ledger", None)
                .with_method("Watchful", "greet", Visibility::Public)
                .with_method("Watchful", "wave", Visibility::Public)
                .with_method("Account", "deposit", Visibility::Public)
                .with_method("Account", "withdraw", Visibility::Public)
                .with_method("Ledger", "post", Visibility::Public);
            catalog.add_instance("Account");
            catalog.add_instance("Ledger");
            Self { catalog }
        }

        fn pointcut(&self, spec: PointcutSpec) -> Pointcut {
            Pointcut::new(spec, &self.catalog).unwrap()
        }

        fn by_type(&self) -> Vec<Pointcut> {
            vec![
                self.pointcut(PointcutSpec::new().type_name("Watchful").method("greet")),
                self.pointcut(PointcutSpec::new().type_name("Watchful").method("wave").method("nope")),
                self.pointcut(
                    PointcutSpec::new()
                        .type_selector(TypeSelector::Pattern(Pattern::new("^A").unwrap()))
                        .method("deposit"),
                ),
                self.pointcut(PointcutSpec::new().type_name("Account").method("nope")),
            ]
        }

        fn by_object(&self) -> Vec<Pointcut> {
            vec![
                self.pointcut(PointcutSpec::new().instances_of(TypeSelector::Name("Account".into()))),
                self.pointcut(
                    PointcutSpec::new()
                        .instances_of(TypeSelector::Name("Account".into()))
                        .method("deposit"),
                ),
                self.pointcut(PointcutSpec::new().instances_of(TypeSelector::Name("Ledger".into()))),
            ]
        }
    }

    #[test]
    fn test_self_composition_is_identity() {
        let fixture = Fixture::new();
        for p in fixture.by_type().iter().chain(fixture.by_object().iter()) {
            assert_eq!(&p.or(p), p);
            assert_eq!(&p.and(p), p);
        }
    }

    #[test]
    fn test_composition_is_commutative_and_associative() {
        let fixture = Fixture::new();
        for group in [fixture.by_type(), fixture.by_object()] {
            for a in &group {
                for b in &group {
                    assert_eq!(a.or(b), b.or(a));
                    assert_eq!(a.and(b), b.and(a));
                    for c in &group {
                        assert_eq!(a.or(b).or(c), a.or(&b.or(c)));
                        assert_eq!(a.and(b).and(c), a.and(&b.and(c)));
                    }
                }
            }
        }
    }

    #[test]
    fn test_empty_is_identity_for_or_and_absorbing_for_and() {
        let fixture = Fixture::new();
        let empty = Pointcut::empty();
        for p in fixture.by_type() {
            assert_eq!(p.or(&empty), p);
            assert_eq!(p.and(&empty), empty);
        }
    }

    #[test]
    fn test_or_drops_not_matched_that_the_other_side_matched() {
        let fixture = Fixture::new();
        let missing = fixture.pointcut(
            PointcutSpec::new()
                .join_point(JoinPoint::for_type("Watchful", "greet"))
                .join_point(JoinPoint::for_type("Watchful", "fly")),
        );
        let fly = JoinPoint::for_type("Watchful", "fly");
        assert!(missing.join_points_not_matched().contains(&fly));

        let still_missing = missing.or(&Pointcut::empty());
        assert!(still_missing.join_points_not_matched().contains(&fly));

        let later = StaticCatalog::new()
            .with_type("Watchful", None)
            .with_method("Watchful", "fly", Visibility::Public);
        let flying = Pointcut::new(PointcutSpec::new().type_name("Watchful").method("fly"), &later).unwrap();
        let combined = missing.or(&flying);
        assert!(combined.join_points_matched().contains(&fly));
        assert!(combined.join_points_not_matched().is_empty());
        assert_eq!(combined.join_points_matched().len(), 2);
    }

    #[test]
    fn test_any_of_and_all_of() {
        let fixture = Fixture::new();
        let pointcuts = fixture.by_type();
        let union = any_of(&pointcuts);
        assert_eq!(union.join_points_matched().len(), 3);
        assert_eq!(all_of(&pointcuts[..1]), Some(pointcuts[0].clone()));
        assert!(all_of(&[]).is_none());
        assert!(any_of(&[]).is_empty());
    }
}
