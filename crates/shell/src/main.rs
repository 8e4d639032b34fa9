//! devtools-shell - drive a devtools relay from JSON lines.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Duration, Instant};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use shell::{Output, Session};
use ui::{FilePreferences, RelayConfig};

/// devtools-shell - headless devtools shell relay
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Origin the shell is served from
    #[arg(long, default_value = "http://localhost:3000")]
    origin: String,

    /// Page loaded in the target frame
    #[arg(long, default_value = "http://localhost:3001")]
    target_url: String,

    /// Start on the target's not-found page
    #[arg(long)]
    not_found: bool,

    /// Preferences file
    #[arg(long, default_value = "devtools-shell.json")]
    prefs: PathBuf,

    /// Console history capacity (0 keeps nothing)
    #[arg(long, default_value = "10000")]
    history_capacity: usize,

    /// Keep every console entry, ignoring --history-capacity
    #[arg(long)]
    unbounded_history: bool,

    /// Refuse to open devtools windows
    #[arg(long)]
    block_popups: bool,

    /// Clock tick in milliseconds
    #[arg(long, default_value = "10")]
    tick_ms: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn relay_config(&self) -> RelayConfig {
        let capacity = (!self.unbounded_history).then_some(self.history_capacity);
        RelayConfig::new()
            .with_origin(&self.origin)
            .with_target_url(&self.target_url)
            .with_not_found(self.not_found)
            .with_history_capacity(capacity)
            .with_state_logging(self.verbose)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Stdout carries the surface reports, so logs go to stderr
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("devtools-shell v{}", shell::VERSION);

    let prefs = FilePreferences::open(&args.prefs)
        .with_context(|| format!("opening preferences {}", args.prefs.display()))?;
    let mut session = Session::new(args.relay_config(), Box::new(prefs), Output::Stdout, args.block_popups)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut interval = tokio::time::interval(Duration::from_millis(args.tick_ms.max(1)));
    let mut last_tick = Instant::now();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if let Err(e) = session.apply_line(&line) {
                            warn!(error = %e, line = %line, "instruction failed");
                        }
                    }
                    None => break,
                }
            }
            now = interval.tick() => {
                session.tick(now.duration_since(last_tick));
                last_tick = now;
            }
        }
    }

    session.settle();
    info!("input closed, shell stopped");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default() {
        let args = Args::parse_from(["devtools-shell"]);
        assert_eq!(args.origin, "http://localhost:3000");
        assert_eq!(args.history_capacity, 10_000);
        assert_eq!(args.relay_config().history_capacity, Some(10_000));
        assert!(!args.block_popups);
        assert!(!args.verbose);
    }

    #[test]
    fn test_args_to_config() {
        let args = Args::parse_from([
            "devtools-shell",
            "--origin",
            "https://shell.dev",
            "--target-url",
            "https://app.dev",
            "--not-found",
            "--history-capacity",
            "0",
        ]);
        let config = args.relay_config();
        assert_eq!(config.origin, "https://shell.dev");
        assert_eq!(config.initial_target_url(), "https://app.dev/404");
        assert_eq!(config.history_capacity, Some(0));
    }

    #[test]
    fn test_args_unbounded_history() {
        let args = Args::parse_from(["devtools-shell", "--unbounded-history", "--history-capacity", "5"]);
        assert_eq!(args.relay_config().history_capacity, None);
    }

    #[test]
    fn test_args_verbose() {
        let args = Args::parse_from(["devtools-shell", "-v"]);
        assert!(args.verbose);
        assert!(args.relay_config().log_state_changes);
    }
}
