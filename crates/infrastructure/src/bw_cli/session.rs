use std::process::Stdio;

use inheritor_core::{
    ApiKeyCredentials, AppError, AppResult, SessionKey, VaultCredentials, VaultLogin,
};
use tokio::process::{Child, Command};
use tracing::info;

use super::BwCli;
use crate::bitwarden_wire::{StatusPayload, VaultOrganization, VaultStatus};

/// Child-only variable carrying the master password, so it never shows up
/// in the process argument list.
const PASSWORD_ENV: &str = "INHERITOR_BW_PASSWORD";

/// Variables `bw login --apikey` reads the key from.
const CLIENT_ID_ENV: &str = "BW_CLIENTID";
const CLIENT_SECRET_ENV: &str = "BW_CLIENTSECRET";

impl BwCli {
    /// Reports whether the CLI is logged in and unlocked.
    pub async fn status(&self) -> AppResult<VaultStatus> {
        let payload = self.run_json::<StatusPayload>(&["status"]).await?;
        Ok(payload.status)
    }

    /// Points the CLI at a self-hosted server.
    ///
    /// `bw` refuses to switch servers while logged in, so an active login is
    /// ended first. Nothing happens when the server is already configured.
    pub async fn configure_server(&self, server_url: &str) -> AppResult<()> {
        let current = self.run(&["config", "server"]).await?;
        if same_server(current.trim(), server_url) {
            return Ok(());
        }

        if self.status().await? != VaultStatus::Unauthenticated {
            self.run(&["logout"]).await?;
        }
        self.run(&["config", "server", server_url]).await?;
        info!(server_url, "configured bw server");
        Ok(())
    }

    /// Logs in and keeps the returned session key.
    pub async fn login(&self, credentials: &VaultCredentials) -> AppResult<SessionKey> {
        let output = self
            .run_with_env(
                &[
                    "login",
                    credentials.username(),
                    "--raw",
                    "--passwordenv",
                    PASSWORD_ENV,
                ],
                &[(PASSWORD_ENV, credentials.password())],
            )
            .await?;
        self.store_session(output).await
    }

    /// Logs in with a personal API key. The vault stays locked afterwards.
    pub async fn login_api_key(&self, api_key: &ApiKeyCredentials) -> AppResult<()> {
        self.run_with_env(
            &["login", "--apikey"],
            &[
                (CLIENT_ID_ENV, api_key.client_id()),
                (CLIENT_SECRET_ENV, api_key.client_secret()),
            ],
        )
        .await?;
        info!(client_id = api_key.client_id(), "logged in with api key");
        Ok(())
    }

    /// Unlocks an already logged-in vault and keeps the returned session key.
    pub async fn unlock(&self, master_password: &str) -> AppResult<SessionKey> {
        let output = self
            .run_with_env(
                &["unlock", "--raw", "--passwordenv", PASSWORD_ENV],
                &[(PASSWORD_ENV, master_password)],
            )
            .await?;
        self.store_session(output).await
    }

    /// Brings the CLI to the unlocked state, logging in or unlocking with
    /// the configured login when needed.
    pub async fn ensure_session(&self, login: Option<&VaultLogin>) -> AppResult<()> {
        let status = self.status().await?;
        info!(status = status.as_str(), "bw session status");

        match (status, login) {
            (VaultStatus::Unlocked, _) => Ok(()),
            (VaultStatus::Locked, Some(login)) => {
                self.unlock(login.master_password()).await.map(drop)
            }
            (VaultStatus::Unauthenticated, Some(VaultLogin::Password(credentials))) => {
                self.login(credentials).await.map(drop)
            }
            (VaultStatus::Unauthenticated, Some(VaultLogin::ApiKey(api_key))) => {
                self.login_api_key(api_key).await?;
                self.unlock(api_key.master_password()).await.map(drop)
            }
            (VaultStatus::Locked | VaultStatus::Unauthenticated, None) => {
                Err(AppError::Auth(format!(
                    "bw vault is {} and no credentials are configured; set BW_SESSION, \
                     BW_USERNAME and BW_PASSWORD, or BW_CLIENTID, BW_CLIENTSECRET and \
                     BW_PASSWORD",
                    status.as_str()
                )))
            }
        }
    }

    /// Lists the organizations the session belongs to.
    pub async fn list_organizations(&self) -> AppResult<Vec<VaultOrganization>> {
        self.run_json(&["list", "organizations"]).await
    }

    /// Starts `bw serve` bound to `hostname:port`.
    ///
    /// The server is killed when the returned child is dropped.
    pub async fn spawn_server(&self, hostname: &str, port: u16) -> AppResult<Child> {
        let port = port.to_string();
        let mut command = Command::new(self.executable());
        command
            .args(["serve", "--hostname", hostname, "--port", port.as_str()])
            .env("BW_NOINTERACTION", "true")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(session) = self.session().await {
            command.env("BW_SESSION", session.expose());
        }

        let child = command.spawn().map_err(|error| {
            AppError::Transport(format!(
                "failed to start '{} serve': {error}",
                self.executable().display()
            ))
        })?;
        info!(hostname, port = port.as_str(), "started bw serve");
        Ok(child)
    }

    async fn store_session(&self, output: String) -> AppResult<SessionKey> {
        let session = SessionKey::new(output)
            .map_err(|_| AppError::Auth("bw returned an empty session key".to_owned()))?;
        self.set_session(session.clone()).await;
        Ok(session)
    }
}

fn same_server(current: &str, wanted: &str) -> bool {
    current.trim_end_matches('/') == wanted.trim_end_matches('/')
}
