use inheritor_core::{AppError, AppResult};

use super::{CollectionForest, CollectionNode};
use crate::CollectionId;

/// Depth-first pre-order walk over a set of sibling subtrees.
#[derive(Debug, Clone)]
pub struct PreOrder<'a> {
    stack: Vec<&'a CollectionNode>,
}

impl<'a> PreOrder<'a> {
    pub(super) fn new(siblings: &'a [CollectionNode]) -> Self {
        Self {
            stack: siblings.iter().rev().collect(),
        }
    }
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a CollectionNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().iter().rev());
        Some(node)
    }
}

impl CollectionForest {
    /// Returns every transitive descendant of `root_id` in pre-order,
    /// excluding the root itself.
    ///
    /// The order matches the visual tree order and is the order in which
    /// permissions get applied.
    pub fn descendants_of(&self, root_id: &CollectionId) -> AppResult<Vec<&CollectionNode>> {
        let root = self.find(root_id).ok_or_else(|| {
            AppError::NotFound(format!(
                "collection '{root_id}' is not part of the collection tree"
            ))
        })?;

        Ok(PreOrder::new(root.children()).collect())
    }
}
