//! Bitwarden adapters for application ports.

#![forbid(unsafe_code)]

mod bitwarden_wire;
mod bw_cli;
mod bw_cli_vault_client;
mod bw_serve_vault_client;

pub use bitwarden_wire::{VaultOrganization, VaultStatus};
pub use bw_cli::BwCli;
pub use bw_cli_vault_client::BwCliVaultClient;
pub use bw_serve_vault_client::BwServeVaultClient;
