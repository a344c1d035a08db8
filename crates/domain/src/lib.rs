//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod collection;
mod collection_tree;
mod permission;

pub use collection::{CollectionId, CollectionRecord, NESTED_NAME_SEPARATOR};
pub use collection_tree::{CollectionForest, CollectionNode, PreOrder, TreeBuild, TreeError};
pub use permission::{PermissionEntry, PermissionSnapshot, SubjectKind};
