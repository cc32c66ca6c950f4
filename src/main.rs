use alloy_primitives::Address;
use anyhow::{Context, Result};
use clap::Parser;
use etherpulse::{
    config::*,
    rpc_source::*,
    theme::{Theme, Tone},
    types::ScanWindow,
    vitals::*,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::{collections::HashSet, path::PathBuf, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// EtherPulse: vital signs of a smart contract over its most recent blocks.
#[derive(Parser, Debug)]
#[command(name = "etherpulse", version)]
struct Args {
    /// Address of the contract to examine.
    contract: String,
    /// Scan depth in blocks, counted back from the chain head.
    #[arg(short = 'b', long, default_value = "1000", allow_negative_numbers = true)]
    blocks: i64,
    /// Number of blocks fetched concurrently.
    #[arg(short = 'c', long, default_value = "1")]
    concurrency: usize,
    /// Per-request timeout in seconds, for the handshake and every block fetch.
    #[arg(short = 't', long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,
    /// File of already-known sender addresses, one per line.
    #[arg(long)]
    known_senders: Option<PathBuf>,
    /// JSON-RPC endpoint to use instead of the one built from the environment.
    #[arg(long)]
    rpc_url: Option<String>,
    /// Do not draw a progress bar.
    #[arg(long)]
    no_progress: bool,
}

/// Draws the progress bar and prints skipped blocks above it.
struct ProgressObserver {
    bar: ProgressBar,
    theme: Theme,
}

impl ProgressObserver {
    fn new(bar: ProgressBar, theme: Theme) -> Self {
        let style = ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.set_message(theme.paint("Recording cardiogram", Tone::Info));
        Self { bar, theme }
    }

    fn say(&self, line: String) {
        if self.bar.is_hidden() {
            println!("{}", line);
        } else {
            self.bar.println(line);
        }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ScanObserver for ProgressObserver {
    fn on_window(&self, target: &Address, window: &ScanWindow) {
        self.say(String::new());
        self.say(self.theme.strong("Starting EtherPulse monitor...", Tone::Header));
        self.say(format!(
            "TARGET: {}",
            self.theme.paint(&target.to_string(), Tone::Accent)
        ));
        self.say(format!(
            "DEPTH: {}",
            self.theme.paint(
                &format!("{} blocks ({} to {})", window.len(), window.start, window.end),
                Tone::Accent
            )
        ));
        self.bar.set_length(window.len());
    }

    fn on_block(&self, event: &BlockEvent) {
        if let BlockEvent::Skipped { height, reason } = event {
            self.say(
                self.theme
                    .paint(&format!("Interference on block {height}: {reason}"), Tone::Warning),
            );
        }
        self.bar.inc(1);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let theme = Theme::detect();

    let mut config = Config::from_env().with_request_timeout(Duration::from_secs(args.timeout));
    if let Some(rpc_url) = &args.rpc_url {
        config = config.with_rpc_url(rpc_url.clone());
    }

    let known_senders = match &args.known_senders {
        Some(path) => {
            let known = load_known_senders(path)?;
            info!("Loaded {} known senders from {}", known.len(), path.display());
            known
        }
        None => HashSet::new(),
    };

    let source = match connect(&config).await {
        Ok(source) => source,
        Err(err) => {
            println!("{}", theme.paint(&err.to_string(), Tone::Fail));
            if let ConnectError::Configuration(_) = err {
                println!(
                    "Create a {} file with your key, formatted as {}=\"abcdef1234567890\", or pass --rpc-url.",
                    theme.strong(".env", Tone::Accent),
                    PROJECT_ID_VAR
                );
            }
            return Err(anyhow::Error::new(err).context("No connection to the Ethereum network"));
        }
    };
    println!(
        "{}",
        theme.paint("Connected to the network. Monitor is ready.", Tone::Good)
    );

    let options = ScanOptions {
        concurrency: args.concurrency,
        fetch_timeout: Duration::from_secs(args.timeout),
        known_senders,
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, reporting partial results");
            interrupt.cancel();
        }
    });

    let bar = if args.no_progress {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(0)
    };
    let observer = ProgressObserver::new(bar, theme);
    let report = scan_vitals(
        &source,
        &args.contract,
        args.blocks,
        &options,
        &observer,
        &cancel,
    )
    .await;
    observer.finish();

    let report = report.context("Vitals scan failed")?;
    println!();
    print!("{}", theme.render_report(&report));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const USDT: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";

    #[test]
    fn command_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults_match_the_documented_scan() {
        let args = Args::try_parse_from(["etherpulse", USDT]).unwrap();
        assert_eq!(args.contract, USDT);
        assert_eq!(args.blocks, 1000);
        assert_eq!(args.concurrency, 1);
        assert_eq!(args.timeout, 30);
        assert!(args.known_senders.is_none());
        assert!(args.rpc_url.is_none());
        assert!(!args.no_progress);
    }

    #[test]
    fn negative_depth_reaches_the_scanner() {
        let args = Args::try_parse_from(["etherpulse", USDT, "-b", "-5"]).unwrap();
        assert_eq!(args.blocks, -5);

        let args = Args::try_parse_from(["etherpulse", USDT, "--blocks", "0"]).unwrap();
        assert_eq!(args.blocks, 0);
    }

    #[test]
    fn contract_is_required() {
        let err = Args::try_parse_from(["etherpulse"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(Args::try_parse_from(["etherpulse", USDT, "-t", "0"]).is_err());
    }

    #[test]
    fn remaining_flags_parse() {
        let args = Args::try_parse_from([
            "etherpulse",
            USDT,
            "-c",
            "8",
            "-t",
            "5",
            "--known-senders",
            "known.txt",
            "--rpc-url",
            "http://localhost:8545",
            "--no-progress",
        ])
        .unwrap();
        assert_eq!(args.concurrency, 8);
        assert_eq!(args.timeout, 5);
        assert_eq!(args.known_senders, Some(PathBuf::from("known.txt")));
        assert_eq!(args.rpc_url.as_deref(), Some("http://localhost:8545"));
        assert!(args.no_progress);
    }
}
