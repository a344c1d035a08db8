use std::collections::HashSet;
use std::str::FromStr;

use inheritor_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::CollectionId;

/// Kind of subject an access grant targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    /// Organization group.
    Group,
    /// Individual organization member.
    User,
}

impl SubjectKind {
    /// Returns a stable transport value for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::User => "user",
        }
    }
}

impl FromStr for SubjectKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "group" => Ok(Self::Group),
            "user" => Ok(Self::User),
            _ => Err(AppError::Validation(format!(
                "unknown subject kind '{value}'"
            ))),
        }
    }
}

/// One access grant held by a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionEntry {
    subject_id: NonEmptyString,
    subject_kind: SubjectKind,
    read_only: bool,
    hide_passwords: bool,
    manage: bool,
}

impl PermissionEntry {
    /// Creates a validated permission entry.
    pub fn new(
        subject_id: impl Into<String>,
        subject_kind: SubjectKind,
        read_only: bool,
        hide_passwords: bool,
        manage: bool,
    ) -> AppResult<Self> {
        Ok(Self {
            subject_id: NonEmptyString::new(subject_id)?,
            subject_kind,
            read_only,
            hide_passwords,
            manage,
        })
    }

    /// Returns the group or user identifier.
    #[must_use]
    pub fn subject_id(&self) -> &str {
        self.subject_id.as_str()
    }

    /// Returns whether the subject is a group or a user.
    #[must_use]
    pub fn subject_kind(&self) -> SubjectKind {
        self.subject_kind
    }

    /// Returns whether the subject can only read items.
    #[must_use]
    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Returns whether passwords are hidden from the subject.
    #[must_use]
    pub fn hide_passwords(&self) -> bool {
        self.hide_passwords
    }

    /// Returns whether the subject can manage the collection.
    #[must_use]
    pub fn manage(&self) -> bool {
        self.manage
    }
}

/// Access entries captured from one collection.
///
/// Entry order is the order the backend returned and is kept so that
/// application is reproducible; it carries no meaning otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSnapshot {
    source_collection_id: CollectionId,
    entries: Vec<PermissionEntry>,
}

impl PermissionSnapshot {
    /// Captures a snapshot from the entries of a source collection.
    #[must_use]
    pub fn new(source_collection_id: CollectionId, entries: Vec<PermissionEntry>) -> Self {
        Self {
            source_collection_id,
            entries,
        }
    }

    /// Returns the collection the snapshot was captured from.
    #[must_use]
    pub fn source_collection_id(&self) -> &CollectionId {
        &self.source_collection_id
    }

    /// Returns all entries in capture order.
    #[must_use]
    pub fn entries(&self) -> &[PermissionEntry] {
        &self.entries
    }

    /// Returns group entries in capture order.
    pub fn groups(&self) -> impl Iterator<Item = &PermissionEntry> {
        self.entries_of(SubjectKind::Group)
    }

    /// Returns user entries in capture order.
    pub fn users(&self) -> impl Iterator<Item = &PermissionEntry> {
        self.entries_of(SubjectKind::User)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the snapshot grants nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns whether both snapshots grant the same set of entries,
    /// regardless of order or source collection.
    #[must_use]
    pub fn is_equivalent_to(&self, other: &Self) -> bool {
        let left: HashSet<&PermissionEntry> = self.entries.iter().collect();
        let right: HashSet<&PermissionEntry> = other.entries.iter().collect();
        left == right
    }

    fn entries_of(&self, kind: SubjectKind) -> impl Iterator<Item = &PermissionEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.subject_kind() == kind)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{PermissionEntry, PermissionSnapshot, SubjectKind};
    use crate::CollectionId;

    fn entry(subject_id: &str, kind: SubjectKind, read_only: bool) -> PermissionEntry {
        PermissionEntry::new(subject_id, kind, read_only, false, false)
            .unwrap_or_else(|_| unreachable!())
    }

    fn collection_id(value: &str) -> CollectionId {
        CollectionId::new(value).unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn entries_are_structurally_equal() {
        assert_eq!(
            entry("g1", SubjectKind::Group, true),
            entry("g1", SubjectKind::Group, true)
        );
        assert_ne!(
            entry("g1", SubjectKind::Group, true),
            entry("g1", SubjectKind::User, true)
        );
        assert_ne!(
            entry("g1", SubjectKind::Group, true),
            entry("g1", SubjectKind::Group, false)
        );
    }

    #[test]
    fn blank_subject_is_rejected() {
        let result = PermissionEntry::new("  ", SubjectKind::User, false, false, false);
        assert!(result.is_err());
    }

    #[test]
    fn subject_kind_roundtrip_transport_value() {
        let restored = SubjectKind::from_str(SubjectKind::Group.as_str());
        assert_eq!(restored.ok(), Some(SubjectKind::Group));
        assert!(SubjectKind::from_str("role").is_err());
    }

    #[test]
    fn snapshot_splits_groups_and_users_in_order() {
        let snapshot = PermissionSnapshot::new(
            collection_id("root"),
            vec![
                entry("u1", SubjectKind::User, false),
                entry("g1", SubjectKind::Group, true),
                entry("u2", SubjectKind::User, true),
            ],
        );

        let users: Vec<&str> = snapshot.users().map(PermissionEntry::subject_id).collect();
        let groups: Vec<&str> = snapshot.groups().map(PermissionEntry::subject_id).collect();
        assert_eq!(users, vec!["u1", "u2"]);
        assert_eq!(groups, vec!["g1"]);
        assert_eq!(snapshot.len(), 3);
    }

    #[test]
    fn snapshots_with_reordered_entries_are_equivalent() {
        let first = PermissionSnapshot::new(
            collection_id("a"),
            vec![
                entry("g1", SubjectKind::Group, true),
                entry("u1", SubjectKind::User, false),
            ],
        );
        let second = PermissionSnapshot::new(
            collection_id("b"),
            vec![
                entry("u1", SubjectKind::User, false),
                entry("g1", SubjectKind::Group, true),
            ],
        );
        let third = PermissionSnapshot::new(
            collection_id("c"),
            vec![entry("g1", SubjectKind::Group, true)],
        );

        assert!(first.is_equivalent_to(&second));
        assert!(!first.is_equivalent_to(&third));
        assert_ne!(first, second);
    }

    #[test]
    fn snapshot_serializes_subject_kind_in_snake_case() {
        let snapshot = PermissionSnapshot::new(
            collection_id("root"),
            vec![entry("g1", SubjectKind::Group, true)],
        );
        let value = serde_json::to_value(&snapshot).unwrap_or_default();
        assert_eq!(value["source_collection_id"], "root");
        assert_eq!(value["entries"][0]["subject_kind"], "group");
    }
}
