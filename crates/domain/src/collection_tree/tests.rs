use std::collections::{HashMap, HashSet};

use inheritor_core::AppError;
use proptest::prelude::*;

use super::{CollectionForest, TreeError};
use crate::{CollectionId, CollectionRecord};

fn record(id: &str, parent_id: Option<&str>) -> CollectionRecord {
    CollectionRecord::new(id, format!("name-{id}"), parent_id.map(ToOwned::to_owned))
        .unwrap_or_else(|_| unreachable!())
}

fn id(value: &str) -> CollectionId {
    CollectionId::new(value).unwrap_or_else(|_| unreachable!())
}

fn ids<'a>(nodes: impl IntoIterator<Item = &'a super::CollectionNode>) -> Vec<&'a str> {
    nodes.into_iter().map(|node| node.id().as_str()).collect()
}

#[test]
fn build_nests_children_in_listing_order() {
    let build = CollectionForest::build(vec![
        record("root", None),
        record("b", Some("root")),
        record("a", Some("root")),
        record("b1", Some("b")),
        record("other", None),
    ]);

    assert!(build.errors.is_empty());
    assert_eq!(ids(build.forest.roots()), vec!["root", "other"]);
    let root = &build.forest.roots()[0];
    assert_eq!(ids(root.children()), vec!["b", "a"]);
    assert_eq!(root.children()[0].children()[0].depth(), 2);
    assert_eq!(build.forest.len(), 5);
}

#[test]
fn children_listed_before_parent_are_still_attached() {
    let build = CollectionForest::build(vec![record("child", Some("root")), record("root", None)]);

    assert!(build.errors.is_empty());
    assert_eq!(ids(build.forest.roots()), vec!["root"]);
    assert_eq!(ids(build.forest.roots()[0].children()), vec!["child"]);
}

#[test]
fn duplicate_ids_keep_first_occurrence() {
    let build = CollectionForest::build(vec![
        CollectionRecord::new("a", "first", None).unwrap_or_else(|_| unreachable!()),
        CollectionRecord::new("a", "second", None).unwrap_or_else(|_| unreachable!()),
    ]);

    assert_eq!(build.errors, vec![TreeError::DuplicateId { id: id("a") }]);
    assert_eq!(build.forest.len(), 1);
    assert_eq!(build.forest.roots()[0].name(), "first");
}

#[test]
fn orphan_parent_becomes_root_with_one_diagnostic() {
    let build = CollectionForest::build(vec![
        record("root", None),
        record("lost", Some("missing")),
        record("lost-child", Some("lost")),
    ]);

    assert_eq!(
        build.errors,
        vec![TreeError::OrphanParent {
            id: id("lost"),
            parent_id: id("missing"),
        }]
    );
    assert_eq!(ids(build.forest.roots()), vec!["root", "lost"]);
    assert_eq!(build.forest.roots()[1].depth(), 0);
    assert_eq!(ids(build.forest.roots()[1].children()), vec!["lost-child"]);
}

#[test]
fn cycle_is_excluded_and_reported_with_all_members() {
    let build = CollectionForest::build(vec![
        record("root", None),
        record("A", Some("C")),
        record("B", Some("A")),
        record("C", Some("B")),
        record("leaf", Some("root")),
    ]);

    assert_eq!(
        build.errors,
        vec![TreeError::CycleDetected {
            ids: vec![id("A"), id("B"), id("C")],
        }]
    );
    for member in ["A", "B", "C"] {
        assert!(build.forest.find(&id(member)).is_none());
    }
    assert_eq!(ids(build.forest.iter()), vec!["root", "leaf"]);
}

#[test]
fn self_parent_is_a_cycle_of_one() {
    let build = CollectionForest::build(vec![record("loop", Some("loop"))]);

    assert_eq!(
        build.errors,
        vec![TreeError::CycleDetected {
            ids: vec![id("loop")],
        }]
    );
    assert!(build.forest.is_empty());
}

#[test]
fn records_below_a_cycle_are_excluded_and_reported() {
    let build = CollectionForest::build(vec![
        record("D", Some("A")),
        record("A", Some("B")),
        record("B", Some("A")),
        record("E", Some("D")),
    ]);

    assert!(build.forest.is_empty());
    assert!(build.errors.contains(&TreeError::CycleDetected {
        ids: vec![id("A"), id("B")],
    }));
    assert!(build.errors.contains(&TreeError::CycleDescendant {
        id: id("D"),
        cycle_member: id("A"),
    }));
    assert!(build.errors.contains(&TreeError::CycleDescendant {
        id: id("E"),
        cycle_member: id("A"),
    }));
    assert_eq!(build.errors.len(), 3);
}

#[test]
fn descendants_are_pre_order_and_exclude_root() {
    let build = CollectionForest::build(vec![
        record("root", None),
        record("a", Some("root")),
        record("b", Some("root")),
        record("a1", Some("a")),
        record("a2", Some("a")),
        record("a1x", Some("a1")),
        record("unrelated", None),
    ]);

    let descendants = build.forest.descendants_of(&id("root"));
    assert!(descendants.is_ok());
    assert_eq!(
        ids(descendants.unwrap_or_default()),
        vec!["a", "a1", "a1x", "a2", "b"]
    );
}

#[test]
fn descendants_of_leaf_is_empty() {
    let build = CollectionForest::build(vec![record("root", None), record("leaf", Some("root"))]);

    let descendants = build.forest.descendants_of(&id("leaf"));
    assert!(descendants.is_ok());
    assert!(descendants.unwrap_or_default().is_empty());
}

#[test]
fn descendants_of_unknown_root_is_not_found() {
    let build = CollectionForest::build(vec![record("root", None)]);

    let result = build.forest.descendants_of(&id("ghost"));
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[test]
fn descendants_of_cycle_member_is_not_found() {
    let build = CollectionForest::build(vec![record("A", Some("B")), record("B", Some("A"))]);

    let result = build.forest.descendants_of(&id("A"));
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[test]
fn find_by_name_matches_exact_display_name() {
    let build = CollectionForest::build(vec![record("root", None), record("child", Some("root"))]);

    let found = build.forest.find_by_name("name-child");
    assert_eq!(found.map(|node| node.id().as_str()), Some("child"));
    assert!(build.forest.find_by_name("name-chi").is_none());
}

#[test]
fn tree_errors_render_readable_messages() {
    let message = TreeError::CycleDetected {
        ids: vec![id("A"), id("B")],
    }
    .to_string();
    assert_eq!(message, "parent cycle between collections [A, B] excluded");
}

fn chain(length: usize) -> Vec<CollectionRecord> {
    (0..length)
        .map(|index| {
            let parent = index.checked_sub(1).map(|parent| format!("n{parent}"));
            CollectionRecord::new(format!("n{index}"), format!("level {index}"), parent)
                .unwrap_or_else(|_| unreachable!())
        })
        .collect()
}

#[test]
fn deep_chain_builds_walks_and_drops() {
    let length = 100_000;
    let build = CollectionForest::build(chain(length));

    assert!(build.errors.is_empty());
    assert_eq!(build.forest.roots().len(), 1);
    assert_eq!(build.forest.len(), length);
    let deepest = build.forest.find(&id("n99999"));
    assert_eq!(deepest.map(|node| node.depth()), Some(length - 1));

    let descendants = build.forest.descendants_of(&id("n0"));
    assert!(descendants.is_ok());
    let descendants = descendants.unwrap_or_default();
    assert_eq!(descendants.len(), length - 1);
    assert_eq!(descendants.first().map(|node| node.id().as_str()), Some("n1"));

    drop(descendants);
    drop(build);
}

#[test]
fn deep_chain_listed_leaf_first_builds() {
    let length = 100_000;
    let mut listing = chain(length);
    listing.reverse();

    let build = CollectionForest::build(listing);

    assert!(build.errors.is_empty());
    assert_eq!(ids(build.forest.roots()), vec!["n0"]);
    assert_eq!(build.forest.len(), length);
}

/// Listings where record `i` may only point at a record with a smaller index
/// are acyclic by construction; records are then shuffled.
fn acyclic_listing() -> impl Strategy<Value = Vec<CollectionRecord>> {
    (1_usize..40)
        .prop_flat_map(|size| {
            let parents = (0..size)
                .map(|index| {
                    if index == 0 {
                        Just(None::<usize>).boxed()
                    } else {
                        proptest::option::of(0..index).boxed()
                    }
                })
                .collect::<Vec<_>>();
            (parents, Just((0..size).collect::<Vec<usize>>()).prop_shuffle())
        })
        .prop_map(|(parents, order)| {
            order
                .into_iter()
                .map(|index| {
                    CollectionRecord::new(
                        format!("c{index}"),
                        format!("collection {index}"),
                        parents[index].map(|parent: usize| format!("c{parent}")),
                    )
                    .unwrap_or_else(|_| unreachable!())
                })
                .collect()
        })
}

fn chain_reaches(
    parent_by_id: &HashMap<String, Option<String>>,
    start: &str,
    root: &str,
) -> bool {
    let mut cursor = parent_by_id.get(start).cloned().flatten();
    while let Some(current) = cursor {
        if current == root {
            return true;
        }
        cursor = parent_by_id.get(&current).cloned().flatten();
    }
    false
}

proptest! {
    #[test]
    fn descendants_match_parent_chains(
        listing in acyclic_listing(),
        pick in any::<prop::sample::Index>(),
    ) {
        let parent_by_id: HashMap<String, Option<String>> = listing
            .iter()
            .map(|record| {
                (
                    record.id().as_str().to_owned(),
                    record.parent_id().map(|parent| parent.as_str().to_owned()),
                )
            })
            .collect();
        let root = listing[pick.index(listing.len())].id().clone();

        let build = CollectionForest::build(listing.clone());
        prop_assert!(build.errors.is_empty());
        prop_assert_eq!(build.forest.len(), listing.len());

        let descendants = build.forest.descendants_of(&root).unwrap_or_default();
        let resolved: Vec<&str> = descendants.iter().map(|node| node.id().as_str()).collect();
        let unique: HashSet<&str> = resolved.iter().copied().collect();
        prop_assert_eq!(unique.len(), resolved.len());

        let expected: HashSet<&str> = listing
            .iter()
            .map(|record| record.id().as_str())
            .filter(|candidate| chain_reaches(&parent_by_id, candidate, root.as_str()))
            .collect();
        prop_assert_eq!(unique, expected);
    }
}
