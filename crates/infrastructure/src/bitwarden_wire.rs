//! JSON shapes shared by the `bw` CLI and the `bw serve` REST API.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use inheritor_core::{AppError, AppResult};
use inheritor_domain::{CollectionRecord, PermissionEntry, SubjectKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lowercased fragments that identify an authentication failure in `bw`
/// output.
const AUTH_FAILURE_MARKERS: [&str; 7] = [
    "you are not logged in",
    "vault is locked",
    "invalid master password",
    "username or password is incorrect",
    "session key is invalid",
    "client_id or client_secret is incorrect",
    "unauthorized",
];

/// One item of an org-collection listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CollectionListing {
    pub(crate) id: String,
    pub(crate) name: String,
}

/// A full org-collection as returned by `get` and accepted by `edit`.
///
/// Fields the engine does not touch are carried through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrgCollection {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) groups: Vec<AccessSelection>,
    #[serde(default)]
    pub(crate) users: Vec<AccessSelection>,
    #[serde(flatten)]
    pub(crate) other: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccessSelection {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) read_only: bool,
    #[serde(default)]
    pub(crate) hide_passwords: bool,
    #[serde(default)]
    pub(crate) manage: bool,
}

impl AccessSelection {
    fn from_entry(entry: &PermissionEntry) -> Self {
        Self {
            id: entry.subject_id().to_owned(),
            read_only: entry.read_only(),
            hide_passwords: entry.hide_passwords(),
            manage: entry.manage(),
        }
    }

    fn to_entry(&self, subject_kind: SubjectKind) -> AppResult<PermissionEntry> {
        PermissionEntry::new(
            self.id.clone(),
            subject_kind,
            self.read_only,
            self.hide_passwords,
            self.manage,
        )
    }
}

impl OrgCollection {
    /// Grants in wire order: groups first, then users.
    pub(crate) fn permission_entries(&self) -> AppResult<Vec<PermissionEntry>> {
        let groups = self
            .groups
            .iter()
            .map(|selection| selection.to_entry(SubjectKind::Group));
        let users = self
            .users
            .iter()
            .map(|selection| selection.to_entry(SubjectKind::User));

        groups.chain(users).collect()
    }

    /// Overwrites both grant lists; subjects absent from `entries` lose access.
    pub(crate) fn replace_permissions(&mut self, entries: &[PermissionEntry]) {
        self.groups = selections_of(entries, SubjectKind::Group);
        self.users = selections_of(entries, SubjectKind::User);
    }

    /// Serializes the object the way `bw encode` would before `bw edit`.
    pub(crate) fn encode(&self) -> AppResult<String> {
        let json = serde_json::to_string(self).map_err(|error| {
            AppError::Internal(format!(
                "failed to serialize collection '{}': {error}",
                self.id
            ))
        })?;
        Ok(STANDARD.encode(json))
    }
}

fn selections_of(entries: &[PermissionEntry], subject_kind: SubjectKind) -> Vec<AccessSelection> {
    entries
        .iter()
        .filter(|entry| entry.subject_kind() == subject_kind)
        .map(AccessSelection::from_entry)
        .collect()
}

/// Derives parent links from the `/`-separated names of a listing.
pub(crate) fn collection_records(
    listing: Vec<CollectionListing>,
) -> AppResult<Vec<CollectionRecord>> {
    CollectionRecord::from_nested_names(listing.into_iter().map(|item| (item.id, item.name)))
}

/// Authentication state reported by `bw status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultStatus {
    /// No account is logged in.
    Unauthenticated,
    /// Logged in, but the vault needs the master password.
    Locked,
    /// The session can read and write vault data.
    Unlocked,
}

impl VaultStatus {
    /// Returns the wire value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StatusPayload {
    pub(crate) status: VaultStatus,
}

/// An organization visible to the current session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VaultOrganization {
    /// Organization id, as used by `BW_ORGANIZATION_ID`.
    pub id: String,
    /// Display name.
    pub name: String,
}

pub(crate) fn mentions_auth_failure(message: &str) -> bool {
    let lowered = message.to_lowercase();
    AUTH_FAILURE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

pub(crate) fn mentions_not_found(message: &str) -> bool {
    message.to_lowercase().contains("not found")
}
