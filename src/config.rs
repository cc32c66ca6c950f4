use crate::data_sources::{InvalidAddressError, parse_address};
use crate::rpc_source::ConnectError;
use alloy_primitives::Address;
use anyhow::{Context, Result};
use dotenv::dotenv;
use reqwest::Url;
use std::{collections::HashSet, fs, path::Path, time::Duration};

pub const PROJECT_ID_VAR: &str = "INFURA_PROJECT_ID";
pub const RPC_URL_VAR: &str = "ETHERPULSE_RPC_URL";
pub const NETWORK_VAR: &str = "ETHERPULSE_NETWORK";

/// Value shipped in the sample `.env`; treated the same as an unset key.
pub const PROJECT_ID_PLACEHOLDER: &str = "YOUR_INFURA_PROJECT_ID_HERE";

pub const DEFAULT_NETWORK: &str = "mainnet";

/// Upper bound on any single JSON-RPC request, handshake included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

///
/// Config
///
/// Where to find the ledger. A full `rpc_url` wins over the Infura project id.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub project_id: Option<String>,
    pub rpc_url: Option<String>,
    pub network: String,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_id: None,
            rpc_url: None,
            network: DEFAULT_NETWORK.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl Config {
    /// Read `.env` if present, then the process environment.
    pub fn from_env() -> Self {
        dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            project_id: non_empty(PROJECT_ID_VAR),
            rpc_url: non_empty(RPC_URL_VAR),
            network: non_empty(NETWORK_VAR).unwrap_or_else(|| DEFAULT_NETWORK.to_string()),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = Some(rpc_url.into());
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Resolve the JSON-RPC endpoint, or explain why there is none.
    pub fn endpoint(&self) -> Result<Url, ConnectError> {
        if let Some(rpc_url) = &self.rpc_url {
            return Url::parse(rpc_url.trim()).map_err(|e| {
                ConnectError::Configuration(format!("{RPC_URL_VAR} is not a valid URL: {e}"))
            });
        }

        match self.project_id.as_deref().map(str::trim) {
            None | Some("") | Some(PROJECT_ID_PLACEHOLDER) => Err(ConnectError::Configuration(
                format!("{PROJECT_ID_VAR} is not configured"),
            )),
            Some(project_id) => {
                let url = format!("https://{}.infura.io/v3/{}", self.network, project_id);
                Url::parse(&url).map_err(|e| {
                    ConnectError::Configuration(format!("cannot build endpoint URL: {e}"))
                })
            }
        }
    }
}

/// Parse a baseline of already-known senders: one address per line, blank lines and
/// `#` comments ignored.
pub fn parse_known_senders(contents: &str) -> Result<HashSet<Address>, InvalidAddressError> {
    contents
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(parse_address)
        .collect()
}

pub fn load_known_senders(path: &Path) -> Result<HashSet<Address>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_known_senders(&contents).with_context(|| format!("Bad address in {}", path.display()))
}
