use std::sync::Arc;

use async_trait::async_trait;
use inheritor_application::VaultClient;
use inheritor_core::AppResult;
use inheritor_domain::{CollectionId, CollectionRecord, PermissionEntry};
use tracing::debug;

use crate::bitwarden_wire::{CollectionListing, OrgCollection, collection_records};
use crate::bw_cli::BwCli;

/// Vault client that shells out to `bw` for every operation.
#[derive(Clone)]
pub struct BwCliVaultClient {
    cli: Arc<BwCli>,
    organization_id: String,
}

impl BwCliVaultClient {
    /// Creates a client scoped to one organization.
    #[must_use]
    pub fn new(cli: Arc<BwCli>, organization_id: impl Into<String>) -> Self {
        Self {
            cli,
            organization_id: organization_id.into(),
        }
    }

    async fn fetch_collection(&self, collection_id: &CollectionId) -> AppResult<OrgCollection> {
        self.cli
            .run_json(&[
                "get",
                "org-collection",
                collection_id.as_str(),
                "--organizationid",
                self.organization_id.as_str(),
            ])
            .await
    }
}

#[async_trait]
impl VaultClient for BwCliVaultClient {
    async fn list_collections(&self) -> AppResult<Vec<CollectionRecord>> {
        let listing = self
            .cli
            .run_json::<Vec<CollectionListing>>(&[
                "list",
                "org-collections",
                "--organizationid",
                self.organization_id.as_str(),
            ])
            .await?;
        collection_records(listing)
    }

    async fn get_permissions(
        &self,
        collection_id: &CollectionId,
    ) -> AppResult<Vec<PermissionEntry>> {
        self.fetch_collection(collection_id).await?.permission_entries()
    }

    async fn set_permissions(
        &self,
        collection_id: &CollectionId,
        entries: &[PermissionEntry],
    ) -> AppResult<()> {
        let mut collection = self.fetch_collection(collection_id).await?;
        collection.replace_permissions(entries);
        let encoded = collection.encode()?;

        self.cli
            .run(&[
                "edit",
                "org-collection",
                collection_id.as_str(),
                "--organizationid",
                self.organization_id.as_str(),
                encoded.as_str(),
            ])
            .await?;
        debug!(collection_id = %collection_id, entries = entries.len(), "collection edited");
        Ok(())
    }
}
