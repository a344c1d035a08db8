use std::time::Duration;

use async_trait::async_trait;
use inheritor_application::VaultClient;
use inheritor_core::{AppError, AppResult};
use inheritor_domain::{CollectionId, CollectionRecord, PermissionEntry};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::bitwarden_wire::{
    CollectionListing, OrgCollection, StatusPayload, VaultOrganization, VaultStatus,
    collection_records, mentions_auth_failure, mentions_not_found,
};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Vault client talking to a local `bw serve` instance.
#[derive(Clone)]
pub struct BwServeVaultClient {
    http_client: reqwest::Client,
    base_url: Url,
    organization_id: String,
}

/// Response envelope used by every `bw serve` endpoint.
#[derive(Debug, Deserialize)]
struct ServeEnvelope {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ServeList<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ServeTemplate<T> {
    template: T,
}

impl BwServeVaultClient {
    /// Creates a client for the server at `base_url`, scoped to one
    /// organization.
    pub fn new(
        http_client: reqwest::Client,
        base_url: &str,
        organization_id: impl Into<String>,
    ) -> AppResult<Self> {
        let base_url = Url::parse(base_url).map_err(|error| {
            AppError::Validation(format!("invalid bw serve url '{base_url}': {error}"))
        })?;

        Ok(Self {
            http_client,
            base_url,
            organization_id: organization_id.into(),
        })
    }

    /// Reads the session state exposed by `GET /status`.
    pub async fn status(&self) -> AppResult<VaultStatus> {
        let url = self.endpoint("status", false)?;
        let data = self.send(self.http_client.get(url)).await?;
        let template = decode_data::<ServeTemplate<StatusPayload>>(data)?;
        Ok(template.template.status)
    }

    /// Lists the organizations the served session belongs to.
    pub async fn list_organizations(&self) -> AppResult<Vec<VaultOrganization>> {
        let url = self.endpoint("list/object/organizations", false)?;
        let data = self.send(self.http_client.get(url)).await?;
        let listing = decode_data::<ServeList<VaultOrganization>>(data)?;
        Ok(listing.data)
    }

    /// Polls `GET /status` until the server answers and reports an unlocked
    /// vault, or the timeout expires.
    pub async fn wait_until_ready(&self, timeout: Duration) -> AppResult<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let last_error = match self.status().await {
                Ok(VaultStatus::Unlocked) => {
                    info!(base_url = %self.base_url, "bw serve is ready");
                    return Ok(());
                }
                Ok(status) => AppError::Auth(format!(
                    "bw serve reports the vault as {}",
                    status.as_str()
                )),
                Err(error) => error,
            };

            if last_error.is_auth() || tokio::time::Instant::now() >= deadline {
                return Err(last_error);
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    fn endpoint(&self, path: &str, scoped: bool) -> AppResult<Url> {
        let mut url = self.base_url.join(path).map_err(|error| {
            AppError::Internal(format!("failed to build bw serve url '{path}': {error}"))
        })?;
        if scoped {
            url.query_pairs_mut()
                .append_pair("organizationId", self.organization_id.as_str());
        }
        Ok(url)
    }

    fn collection_endpoint(&self, collection_id: &CollectionId) -> AppResult<Url> {
        let mut url = self.endpoint("object/org-collection", true)?;
        url.path_segments_mut()
            .map_err(|()| AppError::Internal("bw serve url cannot be a base".to_owned()))?
            .push(collection_id.as_str());
        Ok(url)
    }

    async fn fetch_collection(&self, collection_id: &CollectionId) -> AppResult<OrgCollection> {
        let url = self.collection_endpoint(collection_id)?;
        let data = self.send(self.http_client.get(url)).await?;
        decode_data(data)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> AppResult<Option<Value>> {
        let response = request.send().await.map_err(|error| {
            AppError::Transport(format!("bw serve request failed: {error}"))
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|error| {
            AppError::Transport(format!("failed to read bw serve response: {error}"))
        })?;

        let envelope = serde_json::from_str::<ServeEnvelope>(&body).ok();
        match envelope {
            Some(envelope) if status.is_success() && envelope.success => Ok(envelope.data),
            Some(envelope) => {
                let message = envelope.message.unwrap_or_else(|| body.clone());
                Err(classify_response(status, &message))
            }
            None if status.is_success() => Err(AppError::Transport(format!(
                "bw serve returned an unreadable body: {body}"
            ))),
            None => Err(classify_response(status, &body)),
        }
    }
}

fn decode_data<T>(data: Option<Value>) -> AppResult<T>
where
    T: DeserializeOwned,
{
    let data = data.ok_or_else(|| {
        AppError::Transport("bw serve response is missing its data".to_owned())
    })?;
    serde_json::from_value(data).map_err(|error| {
        AppError::Transport(format!("bw serve returned unexpected data: {error}"))
    })
}

/// Maps a failed `bw serve` response onto engine error kinds.
fn classify_response(status: StatusCode, message: &str) -> AppError {
    let detail = format!("bw serve responded {status}: {message}");
    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || mentions_auth_failure(message)
    {
        AppError::Auth(detail)
    } else if status == StatusCode::NOT_FOUND || mentions_not_found(message) {
        AppError::NotFound(detail)
    } else if status.is_client_error() {
        AppError::Validation(detail)
    } else {
        AppError::Transport(detail)
    }
}

#[async_trait]
impl VaultClient for BwServeVaultClient {
    async fn list_collections(&self) -> AppResult<Vec<CollectionRecord>> {
        let url = self.endpoint("list/object/org-collections", true)?;
        let data = self.send(self.http_client.get(url)).await?;
        let listing = decode_data::<ServeList<CollectionListing>>(data)?;
        collection_records(listing.data)
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

        let url = self.collection_endpoint(collection_id)?;
        self.send(self.http_client.put(url).json(&collection)).await?;
        debug!(collection_id = %collection_id, entries = entries.len(), "collection updated");
        Ok(())
    }
}
