//! Data source backed by the BlockCypher REST API.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::source::{BlockOverview, DataSource, SourceError, TransactionDetails};

/// Bitcoin mainnet endpoint.
pub const BLOCKCYPHER_BTC_MAIN: &str = "https://api.blockcypher.com/v1/btc/main/";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlockCypherConfig {
    /// Chain endpoint, e.g. `https://api.blockcypher.com/v1/btc/main/`.
    pub url: Url,
    /// API token, raises the rate limit when present.
    pub token: Option<String>,
    /// Per request timeout. None keeps the reqwest default (no timeout).
    pub timeout_secs: Option<u64>,
}

impl Default for BlockCypherConfig {
    fn default() -> Self {
        Self {
            url: Url::parse(BLOCKCYPHER_BTC_MAIN).expect("Constant url is valid"),
            token: None,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlockCypher {
    client: Client,
    /// Always ends with `/` so that relative joins append to the chain path.
    base: Url,
    token: Option<String>,
}

impl BlockCypher {
    pub fn new(config: BlockCypherConfig) -> Result<Self, SourceError> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let mut base = config.url;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client: builder.build()?,
            base,
            token: config.token,
        })
    }

    /// Url for one page of a block: `blocks/<hash>?txstart=<offset>&limit=<limit>`.
    pub fn block_url(&self, hash: &str, offset: u64, limit: u64) -> Result<Url, SourceError> {
        let mut url = self.base.join(&format!("blocks/{hash}"))?;
        url.query_pairs_mut()
            .append_pair("txstart", &offset.to_string())
            .append_pair("limit", &limit.to_string());
        self.with_token(url)
    }

    /// Url for a transaction: `txs/<txid>`.
    pub fn transaction_url(&self, txid: &str) -> Result<Url, SourceError> {
        let url = self.base.join(&format!("txs/{txid}"))?;
        self.with_token(url)
    }

    fn with_token(&self, mut url: Url) -> Result<Url, SourceError> {
        if let Some(token) = &self.token {
            url.query_pairs_mut().append_pair("token", token);
        }
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, SourceError> {
        // Path only, the query may hold the token.
        let location = url.path().to_string();
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited { url: location });
        }
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SourceError::Remote {
                url: location,
                status: status.as_u16(),
                message: error_message(&body).unwrap_or(body),
            });
        }
        if let Some(message) = error_message(&body) {
            return Err(SourceError::Remote {
                url: location,
                status: status.as_u16(),
                message,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl DataSource for BlockCypher {
    async fn block_overview(
        &self,
        hash: &str,
        offset: u64,
        limit: u64,
    ) -> Result<BlockOverview, SourceError> {
        let url = self.block_url(hash, offset, limit)?;
        self.get(url).await
    }

    async fn transaction_details(&self, txid: &str) -> Result<TransactionDetails, SourceError> {
        let url = self.transaction_url(txid)?;
        self.get(url).await
    }
}

/// Extracts the message from an error body of the form `{"error": "..."}`.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("error")? {
        Value::String(message) => Some(message.to_owned()),
        other => Some(other.to_string()),
    }
}
