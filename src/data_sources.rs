use crate::types::*;
use alloy_primitives::{Address, aliases::BlockNumber};
use std::{future::Future, str::FromStr, time::Duration};
use thiserror::Error;

/// LedgerSource
///
/// Read-only access to a ledger: the chain head, blocks by height, and address
/// canonicalization.
///
/// Every call may fail transiently; callers decide whether a failure is fatal.
pub trait LedgerSource {
    fn latest_block_height(&self) -> impl Future<Output = Result<BlockNumber, FetchError>> + Send;

    fn get_block(
        &self,
        height: BlockNumber,
        include_transactions: bool,
    ) -> impl Future<Output = Result<Block, FetchError>> + Send;

    fn to_canonical_address(&self, raw: &str) -> Result<Address, InvalidAddressError> {
        parse_address(raw)
    }
}

/// Failure to read something from the ledger.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("block {0} not found")]
    MissingBlock(BlockNumber),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("`{input}` is not a valid address: {reason}")]
pub struct InvalidAddressError {
    pub input: String,
    pub reason: String,
}

/// Parse a 20-byte hex address, with or without `0x`, in any letter case.
///
/// The returned `Address` compares by raw bytes and displays in checksummed form, so two
/// inputs that differ only in case parse to equal values.
pub fn parse_address(raw: &str) -> Result<Address, InvalidAddressError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InvalidAddressError {
            input: raw.to_string(),
            reason: "empty input".to_string(),
        });
    }
    Address::from_str(trimmed).map_err(|e| InvalidAddressError {
        input: raw.to_string(),
        reason: e.to_string(),
    })
}
