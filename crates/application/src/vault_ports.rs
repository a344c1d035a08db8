use async_trait::async_trait;
use inheritor_core::AppResult;
use inheritor_domain::{CollectionId, CollectionRecord, PermissionEntry};

/// Port for the vault holding the collections of one organization.
///
/// Implementations own their session or subprocess lifecycle; services only
/// borrow them for the duration of a run.
#[async_trait]
pub trait VaultClient: Send + Sync {
    /// Lists every collection visible to the session.
    async fn list_collections(&self) -> AppResult<Vec<CollectionRecord>>;

    /// Returns the group and user grants of a collection in backend order.
    async fn get_permissions(
        &self,
        collection_id: &CollectionId,
    ) -> AppResult<Vec<PermissionEntry>>;

    /// Replaces every grant of a collection with `entries`.
    ///
    /// Subjects absent from `entries` lose their access. Backends that only
    /// accept whole objects read the collection first, so one call here may
    /// cost two backend calls; pacing applies between port calls only.
    async fn set_permissions(
        &self,
        collection_id: &CollectionId,
        entries: &[PermissionEntry],
    ) -> AppResult<()>;
}
