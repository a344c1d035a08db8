use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::{CollectionId, CollectionRecord};

mod descendants;

pub use descendants::PreOrder;

/// A collection placed in the tree, owning its children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionNode {
    record: CollectionRecord,
    depth: usize,
    children: Vec<CollectionNode>,
}

impl CollectionNode {
    /// Returns the underlying listing record.
    #[must_use]
    pub fn record(&self) -> &CollectionRecord {
        &self.record
    }

    /// Returns the collection identifier.
    #[must_use]
    pub fn id(&self) -> &CollectionId {
        self.record.id()
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.record.name()
    }

    /// Returns the distance from the root of this node's tree; roots are at 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns direct children in listing order.
    #[must_use]
    pub fn children(&self) -> &[CollectionNode] {
        &self.children
    }
}

impl Drop for CollectionNode {
    // Flattens the subtree first; the derived drop recurses once per level.
    fn drop(&mut self) {
        let mut detached = std::mem::take(&mut self.children);
        while let Some(mut node) = detached.pop() {
            detached.append(&mut node.children);
        }
    }
}

/// Anomaly found while building the forest. None of them is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeError {
    /// A later record reused an id; the first occurrence was kept.
    DuplicateId {
        /// Repeated identifier.
        id: CollectionId,
    },
    /// The parent id is unknown; the record was placed as a root.
    OrphanParent {
        /// Record placed as a root.
        id: CollectionId,
        /// Parent identifier missing from the listing.
        parent_id: CollectionId,
    },
    /// Parent chains form a loop; all participants were excluded.
    CycleDetected {
        /// Participating identifiers in listing order.
        ids: Vec<CollectionId>,
    },
    /// The record hangs below a cycle and was excluded with it.
    CycleDescendant {
        /// Excluded record.
        id: CollectionId,
        /// One member of the cycle the record descends from.
        cycle_member: CollectionId,
    },
}

impl Display for TreeError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateId { id } => {
                write!(formatter, "duplicate collection id '{id}' ignored")
            }
            Self::OrphanParent { id, parent_id } => write!(
                formatter,
                "collection '{id}' references unknown parent '{parent_id}' and was placed as a root"
            ),
            Self::CycleDetected { ids } => {
                let ids: Vec<&str> = ids.iter().map(CollectionId::as_str).collect();
                write!(
                    formatter,
                    "parent cycle between collections [{}] excluded",
                    ids.join(", ")
                )
            }
            Self::CycleDescendant { id, cycle_member } => write!(
                formatter,
                "collection '{id}' descends from cyclic collection '{cycle_member}' and was excluded"
            ),
        }
    }
}

/// Result of building a forest: the valid portion plus every anomaly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeBuild {
    /// Best-effort forest of all well-formed records.
    pub forest: CollectionForest,
    /// Anomalies in detection order.
    pub errors: Vec<TreeError>,
}

/// Rooted forest of collections built once per run from a flat listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionForest {
    roots: Vec<CollectionNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Pending,
    Tree,
    Cycle,
    BelowCycle(usize),
}

impl CollectionForest {
    /// Builds a forest from a flat listing.
    ///
    /// Roots and children keep their listing order. Duplicate ids, unknown
    /// parents and cycles are reported in [`TreeBuild::errors`] and never
    /// abort the build.
    pub fn build(records: impl IntoIterator<Item = CollectionRecord>) -> TreeBuild {
        let mut errors = Vec::new();
        let mut accepted: Vec<CollectionRecord> = Vec::new();
        let mut index_of: HashMap<CollectionId, usize> = HashMap::new();

        for record in records {
            if index_of.contains_key(record.id()) {
                errors.push(TreeError::DuplicateId {
                    id: record.id().clone(),
                });
                continue;
            }
            index_of.insert(record.id().clone(), accepted.len());
            accepted.push(record);
        }

        let parent_of: Vec<Option<usize>> = accepted
            .iter()
            .map(|record| {
                let parent_id = record.parent_id()?;
                let parent = index_of.get(parent_id).copied();
                if parent.is_none() {
                    errors.push(TreeError::OrphanParent {
                        id: record.id().clone(),
                        parent_id: parent_id.clone(),
                    });
                }
                parent
            })
            .collect();

        let placement = classify(&accepted, &parent_of, &mut errors);

        let mut children_of: Vec<Vec<usize>> = vec![Vec::new(); accepted.len()];
        let mut root_indexes = Vec::new();
        for (index, parent) in parent_of.iter().enumerate() {
            if placement[index] != Placement::Tree {
                continue;
            }
            match parent {
                Some(parent) => children_of[*parent].push(index),
                None => root_indexes.push(index),
            }
        }

        let roots = assemble(accepted, &root_indexes, &children_of);

        TreeBuild {
            forest: Self { roots },
            errors,
        }
    }

    /// Returns root nodes in listing order.
    #[must_use]
    pub fn roots(&self) -> &[CollectionNode] {
        &self.roots
    }

    /// Iterates every node in depth-first pre-order.
    #[must_use]
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder::new(&self.roots)
    }

    /// Returns the number of nodes in the forest.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Returns whether the forest holds no node.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Finds a node by id.
    #[must_use]
    pub fn find(&self, id: &CollectionId) -> Option<&CollectionNode> {
        self.iter().find(|node| node.id() == id)
    }

    /// Finds the first node, in pre-order, with the exact display name.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&CollectionNode> {
        self.iter().find(|node| node.name() == name)
    }
}

fn classify(
    records: &[CollectionRecord],
    parent_of: &[Option<usize>],
    errors: &mut Vec<TreeError>,
) -> Vec<Placement> {
    let mut placement = vec![Placement::Pending; records.len()];

    for start in 0..records.len() {
        if placement[start] != Placement::Pending {
            continue;
        }

        let mut path: Vec<usize> = Vec::new();
        let mut position: HashMap<usize, usize> = HashMap::new();
        let mut cursor = Some(start);

        let resolved = loop {
            let Some(current) = cursor else {
                break Placement::Tree;
            };
            match placement[current] {
                Placement::Tree => break Placement::Tree,
                Placement::Cycle => break Placement::BelowCycle(current),
                Placement::BelowCycle(member) => break Placement::BelowCycle(member),
                Placement::Pending => {}
            }
            if let Some(&at) = position.get(&current) {
                let mut members = path.split_off(at);
                members.sort_unstable();
                for &member in &members {
                    placement[member] = Placement::Cycle;
                }
                errors.push(TreeError::CycleDetected {
                    ids: members
                        .iter()
                        .map(|&member| records[member].id().clone())
                        .collect(),
                });
                break Placement::BelowCycle(members[0]);
            }
            position.insert(current, path.len());
            path.push(current);
            cursor = parent_of[current];
        };

        for index in path {
            placement[index] = resolved;
            if let Placement::BelowCycle(member) = resolved {
                errors.push(TreeError::CycleDescendant {
                    id: records[index].id().clone(),
                    cycle_member: records[member].id().clone(),
                });
            }
        }
    }

    placement
}

// Nodes are built bottom-up in reverse pre-order so deep chains never
// recurse.
fn assemble(
    records: Vec<CollectionRecord>,
    root_indexes: &[usize],
    children_of: &[Vec<usize>],
) -> Vec<CollectionNode> {
    let mut order: Vec<(usize, usize)> = Vec::with_capacity(records.len());
    let mut pending: Vec<(usize, usize)> =
        root_indexes.iter().rev().map(|&index| (index, 0)).collect();
    while let Some((index, depth)) = pending.pop() {
        order.push((index, depth));
        pending.extend(children_of[index].iter().rev().map(|&child| (child, depth + 1)));
    }

    let mut slots: Vec<Option<CollectionRecord>> = records.into_iter().map(Some).collect();
    let mut built: Vec<Option<CollectionNode>> =
        std::iter::repeat_with(|| None).take(slots.len()).collect();
    for &(index, depth) in order.iter().rev() {
        let Some(record) = slots[index].take() else {
            continue;
        };
        let children = children_of[index]
            .iter()
            .filter_map(|&child| built[child].take())
            .collect();
        built[index] = Some(CollectionNode {
            record,
            depth,
            children,
        });
    }

    root_indexes
        .iter()
        .filter_map(|&index| built[index].take())
        .collect()
}

#[cfg(test)]
mod tests;
