//! Baseline command implementation

use crate::baseline::BinanceRestClient;
use crate::config::Config;
use clap::Args;

#[derive(Args, Debug)]
pub struct BaselineArgs {
    /// Symbols to look up (comma separated); defaults to the configured list
    #[arg(value_delimiter = ',')]
    pub symbols: Vec<String>,
}

impl BaselineArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let selection = super::resolve_selection(&self.symbols, config)?;
        let client =
            BinanceRestClient::new(config.feed.rest_url.as_str(), config.feed.request_timeout())?;

        for symbol in &selection {
            match client.fetch_open_price(symbol).await {
                Ok(price) => println!("{:<10} {}", symbol, price),
                Err(e) => println!("{:<10} unavailable ({})", symbol, e),
            }
        }

        Ok(())
    }
}
