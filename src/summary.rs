use crate::theme::Theme;
use crate::types::{ScanWindow, SkippedBlock};
use crate::vitals::SenderAccumulator;
use alloy_primitives::Address;
use std::collections::HashSet;
use std::fmt::Display;

/// HealthTier
///
/// Qualitative reading of the vitality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTier {
    Excellent,
    Stable,
    NeedsObservation,
}

impl HealthTier {
    pub fn from_vitality(vitality_score: f64) -> Self {
        if vitality_score > 80.0 {
            HealthTier::Excellent
        } else if vitality_score > 50.0 {
            HealthTier::Stable
        } else {
            HealthTier::NeedsObservation
        }
    }

    pub fn diagnosis(&self) -> &'static str {
        match self {
            HealthTier::Excellent => {
                "Excellent health. The contract shows fast growth and regeneration."
            }
            HealthTier::Stable => "Stable condition. A healthy inflow of new users is observed.",
            HealthTier::NeedsObservation => {
                "Needs observation. Activity is carried by a mature user base; new user inflow is limited."
            }
        }
    }
}

/// VitalsReport
///
/// The finished result of one scan. Built once from the accumulator after the scan loop
/// ends and never mutated afterwards.
///
/// `pulse_rate` divides by the requested window length, not by `blocks_scanned`, so a
/// skipped block still counts as a block with no activity. Callers that care can compare
/// `blocks_scanned` against `blocks_requested`.
#[derive(Debug, Clone, PartialEq)]
pub struct VitalsReport {
    pub target: Address,
    pub window: ScanWindow,
    pub blocks_requested: u64,
    pub blocks_scanned: u64,
    pub total_transactions: u64,
    pub unique_senders: usize,
    pub new_senders: usize,
    pub pulse_rate: f64,
    pub vitality_score: f64,
    pub skipped: Vec<SkippedBlock>,
    pub cancelled: bool,
}

impl VitalsReport {
    pub fn from_accumulator(
        target: Address,
        window: ScanWindow,
        acc: SenderAccumulator,
        known_senders: &HashSet<Address>,
        blocks_scanned: u64,
        skipped: Vec<SkippedBlock>,
        cancelled: bool,
    ) -> Self {
        let unique_senders = acc.unique_senders().len();
        // With an empty baseline every sender is new and the score is 100 whenever there
        // was any activity at all.
        let new_senders = acc.unique_senders().difference(known_senders).count();
        let vitality_score = if unique_senders > 0 {
            new_senders as f64 / unique_senders as f64 * 100.0
        } else {
            0.0
        };
        let blocks_requested = window.len();
        let pulse_rate = acc.total_transactions() as f64 / blocks_requested as f64;

        Self {
            target,
            window,
            blocks_requested,
            blocks_scanned,
            total_transactions: acc.total_transactions(),
            unique_senders,
            new_senders,
            pulse_rate,
            vitality_score,
            skipped,
            cancelled,
        }
    }

    pub fn tier(&self) -> HealthTier {
        HealthTier::from_vitality(self.vitality_score)
    }

    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.skipped.is_empty()
    }
}

impl Display for VitalsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&Theme::plain().render_report(self))
    }
}
