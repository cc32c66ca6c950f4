#![allow(dead_code)]

use alloy_primitives::{Address, B256, BlockNumber};
use etherpulse::data_sources::{FetchError, LedgerSource};
use etherpulse::types::{Block, BlockTransactions, Transaction};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory ledger. Heights without an explicit block are empty blocks.
#[derive(Default)]
pub struct MemoryLedger {
    pub latest: BlockNumber,
    blocks: HashMap<BlockNumber, Block>,
    failing: HashSet<BlockNumber>,
    stalled: HashSet<BlockNumber>,
    latest_fails: bool,
    head_stalls: bool,
    calls: AtomicUsize,
}

impl MemoryLedger {
    pub fn new(latest: BlockNumber) -> Self {
        Self {
            latest,
            ..Default::default()
        }
    }

    /// Add a block holding one transaction per `(from, to)` pair.
    pub fn with_block(mut self, height: BlockNumber, txs: &[(Address, Option<Address>)]) -> Self {
        let txs = txs
            .iter()
            .enumerate()
            .map(|(i, (from, to))| {
                Transaction::new(B256::with_last_byte(i as u8), *from, *to)
            })
            .collect();
        self.blocks
            .insert(height, Block::new(height, None, BlockTransactions::Full(txs)));
        self
    }

    pub fn failing_at(mut self, height: BlockNumber) -> Self {
        self.failing.insert(height);
        self
    }

    pub fn stalled_at(mut self, height: BlockNumber) -> Self {
        self.stalled.insert(height);
        self
    }

    /// The head lookup never completes.
    pub fn stalled_head(mut self) -> Self {
        self.head_stalls = true;
        self
    }

    pub fn with_unreachable_head(mut self) -> Self {
        self.latest_fails = true;
        self
    }

    /// Number of calls made against the ledger so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LedgerSource for MemoryLedger {
    async fn latest_block_height(&self) -> Result<BlockNumber, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.head_stalls {
            std::future::pending::<()>().await;
        }
        if self.latest_fails {
            return Err(FetchError::Transport("connection refused".to_string()));
        }
        Ok(self.latest)
    }

    async fn get_block(
        &self,
        height: BlockNumber,
        _include_transactions: bool,
    ) -> Result<Block, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.stalled.contains(&height) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(&height) {
            return Err(FetchError::Transport("connection reset by peer".to_string()));
        }
        Ok(self
            .blocks
            .get(&height)
            .cloned()
            .unwrap_or_else(|| Block::new(height, None, BlockTransactions::Full(Vec::new()))))
    }
}
