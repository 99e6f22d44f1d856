//! Records returned by a block explorer and the trait used to request them.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Reqwest error {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("Url error {0}")]
    UrlError(#[from] url::ParseError),
    #[error("serde_json error {0}")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("Rate limited by {url}")]
    RateLimited { url: String },
    #[error("Request to {url} failed with status {status}: {message}")]
    Remote {
        url: String,
        status: u16,
        message: String,
    },
}

/// One page of a block: header fields plus a window of its transaction ids.
///
/// Fields that the archiver does not act on are kept in `extra` so that the
/// archived file holds the full response.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct BlockOverview {
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    /// Total number of transactions in the block (not in this page).
    pub n_tx: u64,
    pub prev_block: String,
    /// Transaction ids for the requested offset and limit.
    #[serde(default)]
    pub txids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_time: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single transaction as returned by the explorer.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TransactionDetails {
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Remote provider of block pages and transactions.
///
/// Errors are transient from the point of view of the archiver: the same call
/// is made again on a later iteration.
#[async_trait]
pub trait DataSource {
    /// Requests block `hash` with transaction ids starting at `offset`, at most `limit` of them.
    async fn block_overview(
        &self,
        hash: &str,
        offset: u64,
        limit: u64,
    ) -> Result<BlockOverview, SourceError>;

    /// Requests the full details of one transaction.
    async fn transaction_details(&self, txid: &str) -> Result<TransactionDetails, SourceError>;
}
