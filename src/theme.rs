use crate::summary::{HealthTier, VitalsReport};
use colored::{Color, Colorize};
use std::fmt::Write;
use std::io::IsTerminal;

const RULE_WIDTH: usize = 50;

/// Semantic role of a piece of output; the theme maps each to a color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Header,
    Accent,
    Good,
    Info,
    Warning,
    Fail,
}

impl Tone {
    fn color(self) -> Color {
        match self {
            Tone::Header => Color::BrightMagenta,
            Tone::Accent => Color::BrightCyan,
            Tone::Good => Color::BrightGreen,
            Tone::Info => Color::BrightBlue,
            Tone::Warning => Color::BrightYellow,
            Tone::Fail => Color::BrightRed,
        }
    }
}

///
/// Theme
///
/// Pure value-to-string styling. Holds no state beyond whether color is wanted.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub use_color: bool,
}

impl Theme {
    /// Color only when stdout is a terminal and `NO_COLOR` is unset.
    pub fn detect() -> Self {
        let no_color = std::env::var_os("NO_COLOR").is_some();
        Self {
            use_color: std::io::stdout().is_terminal() && !no_color,
        }
    }

    pub fn plain() -> Self {
        Self { use_color: false }
    }

    pub fn paint(&self, text: &str, tone: Tone) -> String {
        if self.use_color {
            text.color(tone.color()).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn strong(&self, text: &str, tone: Tone) -> String {
        if self.use_color {
            text.color(tone.color()).bold().to_string()
        } else {
            text.to_string()
        }
    }

    pub fn title(&self, text: &str) -> String {
        if self.use_color {
            text.color(Tone::Header.color()).bold().underline().to_string()
        } else {
            text.to_string()
        }
    }

    pub fn rule(&self) -> String {
        "-".repeat(RULE_WIDTH)
    }

    pub fn tier_tone(tier: HealthTier) -> Tone {
        match tier {
            HealthTier::Excellent => Tone::Good,
            HealthTier::Stable => Tone::Accent,
            HealthTier::NeedsObservation => Tone::Info,
        }
    }

    pub fn render_report(&self, report: &VitalsReport) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_report(&mut out, report);
        out
    }

    fn write_report(&self, out: &mut String, report: &VitalsReport) -> std::fmt::Result {
        writeln!(out, "{}", self.strong("EtherPulse diagnostic report", Tone::Header))?;
        writeln!(out, "{}", self.rule())?;
        writeln!(
            out,
            "Target: {}",
            self.paint(&report.target.to_string(), Tone::Accent)
        )?;
        writeln!(
            out,
            "Window: {} blocks ({})",
            report.blocks_requested, report.window
        )?;
        writeln!(
            out,
            "Blocks scanned: {} of {}",
            report.blocks_scanned, report.blocks_requested
        )?;
        writeln!(
            out,
            "Total transactions: {}",
            self.strong(&report.total_transactions.to_string(), Tone::Good)
        )?;
        writeln!(
            out,
            "Unique senders: {}",
            self.strong(&report.unique_senders.to_string(), Tone::Good)
        )?;
        writeln!(
            out,
            "New senders: {}",
            self.strong(&report.new_senders.to_string(), Tone::Good)
        )?;
        writeln!(
            out,
            "Pulse rate (tx/block): {}",
            self.strong(&format!("{:.2}", report.pulse_rate), Tone::Accent)
        )?;

        writeln!(out)?;
        writeln!(out, "{}", self.title("Key health indicator"))?;
        writeln!(
            out,
            "{} {}",
            self.paint("Vitality score:", Tone::Warning),
            self.strong(&format!("{:.2}%", report.vitality_score), Tone::Warning)
        )?;
        writeln!(
            out,
            "   {}",
            self.paint("(share of new senders among all active senders)", Tone::Warning)
        )?;
        writeln!(out, "{}", self.rule())?;

        let tier = report.tier();
        writeln!(
            out,
            "{}",
            self.paint(
                &format!("DIAGNOSIS: {}", tier.diagnosis()),
                Self::tier_tone(tier)
            )
        )?;

        if !report.skipped.is_empty() {
            writeln!(out)?;
            writeln!(
                out,
                "{}",
                self.paint(
                    &format!("Skipped blocks ({}):", report.skipped.len()),
                    Tone::Warning
                )
            )?;
            for skipped in &report.skipped {
                writeln!(out, "  {}", skipped)?;
            }
        }

        if report.cancelled {
            writeln!(out)?;
            writeln!(
                out,
                "{}",
                self.paint(
                    "Scan interrupted: figures cover only the blocks processed before the interrupt.",
                    Tone::Fail
                )
            )?;
        }
        Ok(())
    }
}
