//! For Command Line Interface for blockscribe_archiver

use std::time::Duration;

use blockscribe_archive::{
    archiver::{PAGE_LIMIT, START_BLOCK},
    blockcypher::BLOCKCYPHER_BTC_MAIN,
    pacing::PacingPolicy,
    retry::Bounded,
    store::ARCHIVE_DIR,
    ArchiverConfig, BlockCypherConfig,
};
use clap::Parser;
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct AppArgs {
    /// Block hash to start walking back from
    #[clap(short, long, default_value_t = String::from(START_BLOCK))]
    pub start_block: String,
    /// Chain endpoint of the BlockCypher API
    #[clap(short, long, default_value_t = Url::parse(BLOCKCYPHER_BTC_MAIN).expect("Couldn't read url"))]
    pub api_url: Url,
    /// BlockCypher API token
    #[clap(short, long)]
    pub token: Option<String>,
    /// Directory to write blocks/<hash> and txs/<txid> into
    #[clap(short, long, default_value_t = String::from(ARCHIVE_DIR))]
    pub data_dir: String,
    /// Transaction ids requested per block page
    #[clap(long, default_value_t = PAGE_LIMIT, value_parser = clap::value_parser!(u64).range(1..))]
    pub page_limit: u64,
    /// Iterations between long cooldowns
    #[clap(long, default_value_t = 200, value_parser = clap::value_parser!(u64).range(1..))]
    pub cooldown_every: u64,
    /// Length of the long cooldown, in seconds
    #[clap(long, default_value_t = 3610)]
    pub cooldown_secs: u64,
    /// Short pause on iterations that are a multiple of this
    #[clap(long, default_value_t = 3, value_parser = clap::value_parser!(u64).range(1..))]
    pub pause_every: u64,
    /// Length of the short pause, in seconds
    #[clap(long, default_value_t = 10)]
    pub pause_secs: u64,
    /// Give up on a transaction after this many failed fetches (default: never)
    #[clap(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_tx_attempts: Option<u32>,
    /// Wait after a failed transaction fetch, in milliseconds (with --max-tx-attempts)
    #[clap(long, default_value_t = 0)]
    pub retry_backoff_ms: u64,
    /// Timeout for each API request, in seconds
    #[clap(long)]
    pub http_timeout_secs: Option<u64>,
}

impl AppArgs {
    pub fn archiver_config(&self) -> ArchiverConfig {
        ArchiverConfig {
            start_block: self.start_block.clone(),
            page_limit: self.page_limit,
            pacing: PacingPolicy {
                cooldown_every: self.cooldown_every,
                cooldown: Duration::from_secs(self.cooldown_secs),
                pause_every: self.pause_every,
                pause: Duration::from_secs(self.pause_secs),
            },
        }
    }

    pub fn source_config(&self) -> BlockCypherConfig {
        BlockCypherConfig {
            url: self.api_url.clone(),
            token: self.token.clone(),
            timeout_secs: self.http_timeout_secs,
        }
    }

    /// None keeps retrying failed transactions forever.
    pub fn bounded_retry(&self) -> Option<Bounded> {
        self.max_tx_attempts.map(|max_attempts| Bounded {
            max_attempts,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        })
    }
}
