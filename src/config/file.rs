//! Optional `[broker]`/`[auth]` TOML config file layer, sitting between
//! `clap`'s defaults and the values actually passed on the command line or
//! through the environment.

use std::path::Path;

use serde::Deserialize;

use super::Cli;

#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub broker: BrokerSection,
    #[serde(default)]
    pub auth: AuthSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct BrokerSection {
    pub output_dir: Option<String>,
    pub viewport_size: Option<String>,
    pub user_agent: Option<String>,
    pub proxy_server: Option<String>,
    pub proxy_bypass: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthSection {
    pub server_base_url: Option<String>,
    pub azure_tenant_id: Option<String>,
    pub azure_client_id: Option<String>,
    pub azure_key_vault_url: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let parsed: FileConfig = toml::from_str(&raw)?;
        Ok(parsed)
    }

    /// Fill any CLI fields that were left at their clap/env default with the
    /// value from the file layer. CLI flags and environment variables always
    /// win; the file only covers what neither supplied.
    pub fn merge_into(self, cli: &mut Cli) {
        if cli.output_dir == std::path::PathBuf::from("./broker-data") {
            if let Some(dir) = self.broker.output_dir {
                cli.output_dir = dir.into();
            }
        }
        if cli.viewport_size.is_none() {
            cli.viewport_size = self.broker.viewport_size;
        }
        if cli.user_agent.is_none() {
            cli.user_agent = self.broker.user_agent;
        }
        if cli.proxy_server.is_none() {
            cli.proxy_server = self.broker.proxy_server;
        }
        if cli.proxy_bypass.is_none() {
            cli.proxy_bypass = self.broker.proxy_bypass;
        }
        if cli.server_base_url.is_none() {
            cli.server_base_url = self.auth.server_base_url;
        }
        if cli.azure_tenant_id.is_none() {
            cli.azure_tenant_id = self.auth.azure_tenant_id;
        }
        if cli.azure_client_id.is_none() {
            cli.azure_client_id = self.auth.azure_client_id;
        }
        if cli.azure_key_vault_url.is_none() {
            cli.azure_key_vault_url = self.auth.azure_key_vault_url;
        }
    }
}
