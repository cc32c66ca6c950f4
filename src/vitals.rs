use crate::{data_sources::*, summary::VitalsReport, types::*};
use alloy_primitives::{Address, BlockNumber};
use futures::stream::{self, StreamExt};
use std::{collections::HashSet, time::Duration};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fatal failures of a scan. Nothing has been aggregated when one of these is returned.
#[derive(Debug, Error)]
pub enum VitalsError {
    #[error("invalid target address: {0}")]
    InvalidTarget(#[from] InvalidAddressError),
    #[error("scan depth must be a positive number of blocks, got {0}")]
    InvalidWindow(i64),
    #[error("cannot scan {num_blocks} blocks back from height {latest}: the window would start below genesis")]
    WindowUnderflow { latest: BlockNumber, num_blocks: u64 },
    #[error("failed to read the latest block height: {0}")]
    LatestHeight(#[source] FetchError),
    #[error("scan cancelled before the window was known")]
    Cancelled,
}

///
/// ScanOptions
///
/// `concurrency` is the number of block fetches in flight at once; 1 walks the window
/// strictly in order. `known_senders` is the baseline that decides who counts as new.
///
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub concurrency: usize,
    pub fetch_timeout: Duration,
    pub known_senders: HashSet<Address>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            known_senders: HashSet::new(),
        }
    }
}

/// What happened to one height of the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockEvent {
    Scanned { height: BlockNumber, matched: usize },
    Skipped { height: BlockNumber, reason: String },
}

/// ScanObserver
///
/// Hook for progress reporting. `on_window` fires once before the first fetch,
/// `on_block` once per processed height whether it was scanned or skipped.
pub trait ScanObserver {
    fn on_window(&self, _target: &Address, _window: &ScanWindow) {}

    fn on_block(&self, event: &BlockEvent);
}

impl ScanObserver for () {
    fn on_block(&self, _event: &BlockEvent) {}
}

impl<F> ScanObserver for F
where
    F: Fn(&BlockEvent),
{
    fn on_block(&self, event: &BlockEvent) {
        self(event)
    }
}

///
/// SenderAccumulator
///
/// Running totals over the blocks seen so far. Accumulation is a count plus a set, so
/// the result does not depend on the order blocks arrive in.
///
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderAccumulator {
    total_transactions: u64,
    unique_senders: HashSet<Address>,
}

impl SenderAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in every transaction of `block` sent to `target`. Returns how many matched.
    pub fn absorb_block(&mut self, block: &Block, target: &Address) -> usize {
        let mut matched = 0;
        for tx in block.transactions_to(target) {
            self.total_transactions += 1;
            self.unique_senders.insert(tx.from);
            matched += 1;
        }
        matched
    }

    pub fn total_transactions(&self) -> u64 {
        self.total_transactions
    }

    pub fn unique_senders(&self) -> &HashSet<Address> {
        &self.unique_senders
    }
}

/// Scan the `num_blocks` most recent blocks for transactions sent to `target_raw`.
///
/// A block that fails to load, or takes longer than `options.fetch_timeout`, is recorded
/// in the report and skipped. Cancelling `cancel` stops the scan and returns what has
/// been aggregated so far with `cancelled` set; cancelling while the chain head is still
/// being looked up fails with `VitalsError::Cancelled`. The head lookup is bounded by
/// `options.fetch_timeout` as well.
pub async fn scan_vitals<S, O>(
    source: &S,
    target_raw: &str,
    num_blocks: i64,
    options: &ScanOptions,
    observer: &O,
    cancel: &CancellationToken,
) -> Result<VitalsReport, VitalsError>
where
    S: LedgerSource,
    O: ScanObserver + ?Sized,
{
    let target = source.to_canonical_address(target_raw)?;
    let num_blocks = u64::try_from(num_blocks)
        .ok()
        .filter(|n| *n > 0)
        .ok_or(VitalsError::InvalidWindow(num_blocks))?;

    // Cancelling here is fatal: there is no window yet, so no partial report to give.
    let head = tokio::time::timeout(options.fetch_timeout, source.latest_block_height());
    let latest = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(VitalsError::Cancelled),
        outcome = head => match outcome {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(options.fetch_timeout)),
        },
    }
    .map_err(VitalsError::LatestHeight)?;
    let window = ScanWindow::ending_at(latest, num_blocks)
        .ok_or(VitalsError::WindowUnderflow { latest, num_blocks })?;

    info!(
        "Scanning {} blocks ({}) for transactions to {}",
        num_blocks, window, target
    );
    observer.on_window(&target, &window);

    let fetch_timeout = options.fetch_timeout;
    let fetches = stream::iter(window.heights())
        .map(move |height| async move {
            let fetch = source.get_block(height, true);
            let outcome = match tokio::time::timeout(fetch_timeout, fetch).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout(fetch_timeout)),
            };
            (height, outcome)
        })
        .buffer_unordered(options.concurrency.max(1));
    tokio::pin!(fetches);

    let mut acc = SenderAccumulator::new();
    let mut skipped: Vec<SkippedBlock> = Vec::new();
    let mut blocks_scanned: u64 = 0;
    let mut cancelled = false;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                cancelled = true;
                break;
            }
            next = fetches.next() => next,
        };
        let Some((height, outcome)) = next else {
            break;
        };

        match outcome {
            Ok(block) => {
                let matched = acc.absorb_block(&block, &target);
                blocks_scanned += 1;
                debug!("Block {}: {} matching transactions", height, matched);
                observer.on_block(&BlockEvent::Scanned { height, matched });
            }
            Err(err) => {
                debug!("Skipping block {}: {}", height, err);
                let reason = err.to_string();
                observer.on_block(&BlockEvent::Skipped {
                    height,
                    reason: reason.clone(),
                });
                skipped.push(SkippedBlock { height, reason });
            }
        }
    }

    if cancelled {
        warn!(
            "Scan cancelled after {} of {} blocks",
            blocks_scanned + skipped.len() as u64,
            window.len()
        );
    }

    skipped.sort_by_key(|s| s.height);

    Ok(VitalsReport::from_accumulator(
        target,
        window,
        acc,
        &options.known_senders,
        blocks_scanned,
        skipped,
        cancelled,
    ))
}
