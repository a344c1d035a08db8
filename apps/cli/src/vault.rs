use std::sync::Arc;

use inheritor_application::VaultClient;
use inheritor_core::{AppError, AppResult};
use inheritor_infrastructure::{BwCli, BwCliVaultClient, BwServeVaultClient};
use tokio::process::Child;
use tracing::info;

use crate::config::{InheritorConfig, VaultBackend};

/// Vault client for one organization plus the `bw serve` process backing
/// it, when this binary started one.
pub(crate) struct ConnectedVault {
    pub(crate) client: Arc<dyn VaultClient>,
    _server: Option<Child>,
}

/// Prepares the `bw` CLI: server selection, then login or unlock unless a
/// session key was supplied.
pub(crate) async fn open_session(config: &InheritorConfig) -> AppResult<Arc<BwCli>> {
    let cli = Arc::new(BwCli::new(
        config.bw_executable.as_str(),
        config.command_timeout,
    ));

    if let Some(session) = config.session.clone() {
        cli.set_session(session).await;
    } else if let Some(server_url) = config.server_url.as_deref() {
        cli.configure_server(server_url).await?;
    }

    cli.ensure_session(config.login.as_ref()).await?;
    Ok(cli)
}

pub(crate) async fn connect(
    config: &InheritorConfig,
    cli: Arc<BwCli>,
) -> AppResult<ConnectedVault> {
    let organization_id = config.require_organization_id()?;

    match config.backend {
        VaultBackend::Cli => {
            info!(organization_id, "using bw cli backend");
            Ok(ConnectedVault {
                client: Arc::new(BwCliVaultClient::new(cli, organization_id)),
                _server: None,
            })
        }
        VaultBackend::Rest => {
            let server = if config.serve_spawn {
                Some(
                    cli.spawn_server(config.serve_host.as_str(), config.serve_port)
                        .await?,
                )
            } else {
                None
            };

            let http_client = reqwest::Client::builder()
                .timeout(config.command_timeout)
                .build()
                .map_err(|error| {
                    AppError::Internal(format!("failed to build HTTP client: {error}"))
                })?;
            let base_url = config.serve_base_url();
            let client = BwServeVaultClient::new(http_client, base_url.as_str(), organization_id)?;
            client.wait_until_ready(config.command_timeout).await?;

            info!(organization_id, base_url = %base_url, "using bw serve backend");
            Ok(ConnectedVault {
                client: Arc::new(client),
                _server: server,
            })
        }
    }
}
