use crate::config::Config;
use crate::data_sources::{FetchError, LedgerSource};
use crate::types::{Block, BlockTransactions, Transaction};
use alloy_primitives::{
    Address,
    aliases::{BlockHash, BlockNumber, TxHash},
};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use std::{
    fmt::Display,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use thiserror::Error;
use tracing::{debug, info};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure to obtain a usable connection. Either way the scan never starts.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("network error: {0}")]
    Network(String),
}

/// Build a client for the configured endpoint and check that it answers.
///
/// A missing or placeholder credential fails before anything touches the network. A node
/// that accepts the connection but does not answer within `config.request_timeout` is a
/// network error.
pub async fn connect(config: &Config) -> Result<RpcLedgerSource, ConnectError> {
    let endpoint = config.endpoint()?;
    let source = RpcLedgerSource::new(endpoint, config.request_timeout)?;

    let client_version = source
        .handshake()
        .await
        .map_err(|e| ConnectError::Network(format!("no answer from {source}: {e}")))?;
    info!("Connected to {} ({})", source, client_version);

    Ok(source)
}

/// RpcLedgerSource
///
/// A LedgerSource backed by an Ethereum JSON-RPC 2.0 endpoint over HTTP.
///
/// No retries happen here; a failed call is reported to the caller as is.
#[derive(Debug)]
pub struct RpcLedgerSource {
    endpoint: Url,
    http_client: Client,
    next_id: AtomicU64,
}

impl Display for RpcLedgerSource {
    // Infura keys live in the path, so only the host is ever shown.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RpcLedgerSource({})",
            self.endpoint.host_str().unwrap_or("<no host>")
        )
    }
}

impl RpcLedgerSource {
    pub fn new(endpoint: Url, request_timeout: Duration) -> Result<Self, ConnectError> {
        let http_client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(request_timeout))
            .timeout(request_timeout)
            .build()
            .map_err(|e| ConnectError::Network(format!("cannot build HTTP client: {e}")))?;
        Ok(Self::with_client(http_client, endpoint))
    }

    pub fn with_client(http_client: Client, endpoint: Url) -> Self {
        Self {
            endpoint,
            http_client,
            next_id: AtomicU64::new(1),
        }
    }

    /// Ask the node for its client version, proving the endpoint speaks JSON-RPC.
    pub async fn handshake(&self) -> Result<String, FetchError> {
        let result = self.request("web3_clientVersion", json!([])).await?;
        serde_json::from_value(result).map_err(|e| FetchError::Decode(e.to_string()))
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, FetchError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!("-> {} #{}", method, id);

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Transport(format!("HTTP {status}")));
        }

        let envelope: RpcResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        if let Some(error) = envelope.error {
            return Err(FetchError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(envelope.result.unwrap_or(Value::Null))
    }
}

impl LedgerSource for RpcLedgerSource {
    async fn latest_block_height(&self) -> Result<BlockNumber, FetchError> {
        let result = self.request("eth_blockNumber", json!([])).await?;
        let quantity = result
            .as_str()
            .ok_or_else(|| FetchError::Decode(format!("expected a hex quantity, got {result}")))?;
        parse_quantity(quantity)
    }

    async fn get_block(
        &self,
        height: BlockNumber,
        include_transactions: bool,
    ) -> Result<Block, FetchError> {
        let result = self
            .request(
                "eth_getBlockByNumber",
                json!([format!("{height:#x}"), include_transactions]),
            )
            .await?;
        if result.is_null() {
            return Err(FetchError::MissingBlock(height));
        }

        let block: RpcBlock =
            serde_json::from_value(result).map_err(|e| FetchError::Decode(e.to_string()))?;
        block.into_block(height, include_transactions)
    }
}

/// Parse a JSON-RPC hex quantity such as `0x3e8`.
pub fn parse_quantity(quantity: &str) -> Result<u64, FetchError> {
    let digits = quantity
        .strip_prefix("0x")
        .ok_or_else(|| FetchError::Decode(format!("quantity `{quantity}` lacks 0x prefix")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| FetchError::Decode(format!("quantity `{quantity}`: {e}")))
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct RpcBlock {
    // null for pending blocks
    number: Option<String>,
    hash: Option<BlockHash>,
    #[serde(default)]
    transactions: Vec<RpcBlockTransaction>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RpcBlockTransaction {
    Full(RpcTransaction),
    Hash(TxHash),
}

#[derive(Deserialize)]
struct RpcTransaction {
    hash: TxHash,
    from: Address,
    #[serde(default)]
    to: Option<Address>,
}

impl RpcBlock {
    fn into_block(
        self,
        requested: BlockNumber,
        include_transactions: bool,
    ) -> Result<Block, FetchError> {
        let number = match self.number.as_deref() {
            Some(quantity) => parse_quantity(quantity)?,
            None => requested,
        };

        let transactions = if include_transactions {
            let full = self
                .transactions
                .into_iter()
                .map(|tx| match tx {
                    RpcBlockTransaction::Full(tx) => Ok(Transaction::new(tx.hash, tx.from, tx.to)),
                    RpcBlockTransaction::Hash(hash) => Err(FetchError::Decode(format!(
                        "block {number} returned bare hash {hash} where a full transaction was requested"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            BlockTransactions::Full(full)
        } else {
            let hashes = self
                .transactions
                .into_iter()
                .map(|tx| match tx {
                    RpcBlockTransaction::Full(tx) => tx.hash,
                    RpcBlockTransaction::Hash(hash) => hash,
                })
                .collect();
            BlockTransactions::Hashes(hashes)
        };

        Ok(Block::new(number, self.hash, transactions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const FULL_BLOCK: &str = r#"{
        "number": "0x3e8",
        "hash": "0x88e96d4537bea4d9c05d12549907b32561d3bf31f45aae734cdc119f13406cb6",
        "transactions": [
            {
                "hash": "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060",
                "from": "0xa7d9ddbe1f17865597fbd27ec712455208b6b76d",
                "to": "0xdac17f958d2ee523a2206206994597c13d831ec7",
                "value": "0x0"
            },
            {
                "hash": "0x6c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060",
                "from": "0xa7d9ddbe1f17865597fbd27ec712455208b6b76d",
                "to": null
            }
        ]
    }"#;

    #[test]
    fn quantities_must_be_prefixed_hex() {
        assert_eq!(parse_quantity("0x3e8").unwrap(), 1000);
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert!(matches!(parse_quantity("1000"), Err(FetchError::Decode(_))));
        assert!(matches!(parse_quantity("0xnope"), Err(FetchError::Decode(_))));
    }

    #[test]
    fn full_block_decodes_recipients_and_creations() {
        let block: RpcBlock = serde_json::from_str(FULL_BLOCK).unwrap();
        let block = block.into_block(1000, true).unwrap();
        assert_eq!(block.number, 1000);

        let BlockTransactions::Full(txs) = &block.transactions else {
            panic!("expected full transactions");
        };
        assert_eq!(txs.len(), 2);
        assert_eq!(
            txs[0].to,
            Some(address!("0xdAC17F958D2ee523a2206206994597C13D831ec7"))
        );
        assert_eq!(txs[1].to, None);
    }

    #[test]
    fn hash_only_block_decodes_to_hashes() {
        let json = r#"{
            "number": "0x1",
            "hash": null,
            "transactions": ["0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060"]
        }"#;
        let block: RpcBlock = serde_json::from_str(json).unwrap();
        let block = block.into_block(1, false).unwrap();
        assert!(matches!(block.transactions, BlockTransactions::Hashes(ref h) if h.len() == 1));
    }

    #[test]
    fn bare_hash_in_full_request_is_a_decode_error() {
        let json = r#"{
            "number": "0x1",
            "transactions": ["0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060"]
        }"#;
        let block: RpcBlock = serde_json::from_str(json).unwrap();
        assert!(matches!(block.into_block(1, true), Err(FetchError::Decode(_))));
    }

    #[test]
    fn pending_block_takes_requested_height() {
        let json = r#"{ "number": null, "hash": null, "transactions": [] }"#;
        let block: RpcBlock = serde_json::from_str(json).unwrap();
        assert_eq!(block.into_block(77, true).unwrap().number, 77);
    }

    #[test]
    fn display_hides_the_credential() {
        let url = Url::parse("https://mainnet.infura.io/v3/secretkey").unwrap();
        let source = RpcLedgerSource::with_client(Client::new(), url);
        let shown = source.to_string();
        assert!(shown.contains("mainnet.infura.io"));
        assert!(!shown.contains("secretkey"));
    }
}
