use clap::Parser;
use crytrack::board::AVAILABLE_SYMBOLS;
use crytrack::cli::{Cli, Commands};
use crytrack::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        Config::default()
    });

    // Initialize telemetry
    let _telemetry = crytrack::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Watch(args) => {
            tracing::info!("Starting live watch");
            args.execute(&config).await?;
        }
        Commands::Baseline(args) => {
            args.execute(&config).await?;
        }
        Commands::Symbols => {
            for symbol in AVAILABLE_SYMBOLS {
                println!("{symbol}");
            }
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("  Stream: {}", config.feed.ws_url);
            println!("  REST: {}", config.feed.rest_url);
            println!("  Symbols: {}", config.feed.symbols.join(", "));
            println!(
                "  Reconnect delay: {}ms, ack timeout: {}ms",
                config.feed.reconnect_delay_ms, config.feed.subscribe_ack_timeout_ms
            );
            println!(
                "  Board: every {}ms, sorted by {:?}",
                config.board.throttle_interval_ms, config.board.sort_by
            );
            println!(
                "  Logging: {} ({:?})",
                config.telemetry.log_level, config.telemetry.log_format
            );
        }
    }

    Ok(())
}
