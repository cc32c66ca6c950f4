use alloy_primitives::{
    Address,
    aliases::{BlockHash, BlockNumber, TxHash},
};
use std::{
    fmt::{Debug, Display},
    ops::RangeInclusive,
};

///
/// Transaction
///
/// A single transaction as seen by the scanner. `to` is `None` for contract creations.
///
#[derive(Clone, PartialEq, Eq)]
pub struct Transaction {
    pub hash: TxHash,
    pub from: Address,
    pub to: Option<Address>,
}

impl Transaction {
    pub fn new(hash: TxHash, from: Address, to: Option<Address>) -> Self {
        Self { hash, from, to }
    }

    pub fn is_directed_at(&self, target: &Address) -> bool {
        self.to.as_ref() == Some(target)
    }
}

impl Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.to {
            Some(to) => write!(
                f,
                "Transaction {{ hash: {}, from: {}, to: {} }}",
                self.hash, self.from, to
            ),
            None => write!(
                f,
                "Transaction {{ hash: {}, from: {}, to: <contract creation> }}",
                self.hash, self.from
            ),
        }
    }
}

///
/// BlockTransactions
///
/// A block either carries full transaction bodies or only their hashes, depending on
/// what was asked of the ledger.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockTransactions {
    Full(Vec<Transaction>),
    Hashes(Vec<TxHash>),
}

impl BlockTransactions {
    pub fn len(&self) -> usize {
        match self {
            BlockTransactions::Full(txs) => txs.len(),
            BlockTransactions::Hashes(hashes) => hashes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

///
/// Block
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub number: BlockNumber,
    pub hash: Option<BlockHash>,
    pub transactions: BlockTransactions,
}

impl Block {
    pub fn new(number: BlockNumber, hash: Option<BlockHash>, transactions: BlockTransactions) -> Self {
        Self {
            number,
            hash,
            transactions,
        }
    }

    /// Transactions in this block whose recipient is `target`.
    ///
    /// A hash-only block yields nothing since there is no recipient to compare.
    pub fn transactions_to<'a>(
        &'a self,
        target: &'a Address,
    ) -> impl Iterator<Item = &'a Transaction> + 'a {
        let full: &[Transaction] = match &self.transactions {
            BlockTransactions::Full(txs) => txs,
            BlockTransactions::Hashes(_) => &[],
        };
        full.iter().filter(move |tx| tx.is_directed_at(target))
    }
}

///
/// ScanWindow
///
/// The inclusive range of block heights `[start, end]` that a scan walks.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    pub start: BlockNumber,
    pub end: BlockNumber,
}

impl ScanWindow {
    /// The `num_blocks` most recent blocks ending at `latest`.
    ///
    /// Returns `None` for an empty window or one that would start below genesis (height 0).
    pub fn ending_at(latest: BlockNumber, num_blocks: u64) -> Option<Self> {
        if num_blocks == 0 {
            return None;
        }
        let start = latest.checked_sub(num_blocks - 1)?;
        Some(Self { start, end: latest })
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn heights(&self) -> RangeInclusive<BlockNumber> {
        self.start..=self.end
    }
}

impl Display for ScanWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

///
/// SkippedBlock
///
/// A height the scan could not fetch, and why.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBlock {
    pub height: BlockNumber,
    pub reason: String,
}

impl Display for SkippedBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "block {}: {}", self.height, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{B256, address};

    #[test]
    fn window_covers_requested_number_of_blocks() {
        let window = ScanWindow::ending_at(1000, 3).unwrap();
        assert_eq!(window.start, 998);
        assert_eq!(window.end, 1000);
        assert_eq!(window.len(), 3);
        assert_eq!(window.heights().count(), 3);
    }

    #[test]
    fn single_block_window_starts_at_latest() {
        let window = ScanWindow::ending_at(42, 1).unwrap();
        assert_eq!(window.start, window.end);
    }

    #[test]
    fn window_may_reach_genesis_but_not_below() {
        assert_eq!(
            ScanWindow::ending_at(9, 10),
            Some(ScanWindow { start: 0, end: 9 })
        );
        assert_eq!(ScanWindow::ending_at(9, 11), None);
        assert_eq!(ScanWindow::ending_at(9, 0), None);
    }

    #[test]
    fn window_at_the_top_of_the_height_range() {
        let window = ScanWindow::ending_at(u64::MAX, 3).unwrap();
        assert_eq!(window.start, u64::MAX - 2);
        assert_eq!(window.len(), 3);

        let everything = ScanWindow::ending_at(u64::MAX, u64::MAX).unwrap();
        assert_eq!(everything.start, 1);
        assert_eq!(everything.len(), u64::MAX);
    }

    #[test]
    fn contract_creation_is_never_directed_at_anything() {
        let target = address!("0x1111111111111111111111111111111111111111");
        let creation = Transaction::new(B256::ZERO, target, None);
        assert!(!creation.is_directed_at(&target));
    }

    #[test]
    fn hash_only_block_has_no_matching_transactions() {
        let target = address!("0x1111111111111111111111111111111111111111");
        let block = Block::new(7, None, BlockTransactions::Hashes(vec![B256::ZERO]));
        assert_eq!(block.transactions_to(&target).count(), 0);
        assert_eq!(block.transactions.len(), 1);
    }
}
