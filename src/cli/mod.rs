//! CLI interface for crytrack
//!
//! Provides subcommands for:
//! - `watch`: Stream live prices into a sorted board
//! - `baseline`: Look up 24h reference prices
//! - `symbols`: List selectable pairs
//! - `config`: Show configuration

mod baseline;
mod watch;

pub use baseline::BaselineArgs;
pub use watch::WatchArgs;

use crate::config::Config;
use crate::feed::SelectionSet;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "crytrack")]
#[command(about = "Live Binance prices with 24h change")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream live prices into a sorted board
    Watch(WatchArgs),
    /// Look up 24h reference prices
    Baseline(BaselineArgs),
    /// List selectable pairs
    Symbols,
    /// Show configuration
    Config,
}

/// Selection from the command line, falling back to the configured symbols
pub(crate) fn resolve_selection(
    symbols: &[String],
    config: &Config,
) -> anyhow::Result<SelectionSet> {
    let raw: &[String] = if symbols.is_empty() {
        &config.feed.symbols
    } else {
        symbols
    };
    let selection = SelectionSet::parse(raw)?;
    if selection.is_empty() {
        anyhow::bail!("No symbols selected");
    }
    Ok(selection)
}
