use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use inheritor_core::{AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Separator the vault uses to express nesting inside collection names.
pub const NESTED_NAME_SEPARATOR: char = '/';

/// Opaque collection identifier assigned by the vault.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(NonEmptyString);

impl CollectionId {
    /// Creates a validated collection identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        Ok(Self(NonEmptyString::new(value)?))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for CollectionId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// One collection as returned by a listing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRecord {
    id: CollectionId,
    name: String,
    parent_id: Option<CollectionId>,
}

impl CollectionRecord {
    /// Creates a validated collection record.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        parent_id: Option<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            id: CollectionId::new(id)?,
            name: name.into(),
            parent_id: parent_id.map(CollectionId::new).transpose()?,
        })
    }

    /// Builds records from `(id, name)` pairs whose nesting is encoded in the
    /// name, e.g. `Team/Ops/Prod`.
    ///
    /// The parent of a record is the collection named by the longest proper
    /// `/`-prefix of its name that exists in the listing. When several
    /// collections share a name, the first one listed wins.
    pub fn from_nested_names<I, S, T>(listing: I) -> AppResult<Vec<Self>>
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        let entries = listing
            .into_iter()
            .map(|(id, name)| Ok((CollectionId::new(id)?, name.into())))
            .collect::<AppResult<Vec<(CollectionId, String)>>>()?;

        let mut id_by_name: HashMap<&str, &CollectionId> = HashMap::new();
        for (id, name) in &entries {
            id_by_name.entry(name.as_str()).or_insert(id);
        }

        let parents: Vec<Option<CollectionId>> = entries
            .iter()
            .map(|(_, name)| {
                let mut candidate = name.as_str();
                while let Some((prefix, _)) = candidate.rsplit_once(NESTED_NAME_SEPARATOR) {
                    if let Some(parent_id) = id_by_name.get(prefix) {
                        return Some((*parent_id).clone());
                    }
                    candidate = prefix;
                }
                None
            })
            .collect();

        Ok(entries
            .into_iter()
            .zip(parents)
            .map(|((id, name), parent_id)| Self {
                id,
                name,
                parent_id,
            })
            .collect())
    }

    /// Returns the collection identifier.
    #[must_use]
    pub fn id(&self) -> &CollectionId {
        &self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the parent identifier, absent for roots.
    #[must_use]
    pub fn parent_id(&self) -> Option<&CollectionId> {
        self.parent_id.as_ref()
    }
}
