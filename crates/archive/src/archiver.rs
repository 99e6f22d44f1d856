//! Walks backwards from a block, archiving each block page and its transactions.
//!
//! Every iteration does one unit of work:
//! - Pending transaction ids: fetch and store the most recently queued one.
//! - Queue empty: fetch and store the next page of the current block. The page
//! replaces the queue. Once a page reaches the end of the block, the walk
//! moves on to the parent block.
//!
//! Failures never end the walk. A failed transaction is handed to the
//! [`RetryPolicy`] and a failed page is requested again on the next visit.
use std::collections::HashMap;

use log::{debug, error, info, warn};
use thiserror::Error;

use crate::{
    pacing::{Pacer, PacingPolicy},
    retry::{RetryDecision, RetryPolicy, Unbounded},
    source::{BlockOverview, DataSource, SourceError},
    store::{Store, StoreError},
};

/// Block the walk starts from when none is given.
pub const START_BLOCK: &str = "0000000000000000001c9bb1ea94a9d7fd726069652d7454531b447e58310505";

/// Number of transaction ids requested per block page.
pub const PAGE_LIMIT: u64 = 500;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Source error {0}")]
    SourceError(#[from] SourceError),
    #[error("Store error {0}")]
    StoreError(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiverConfig {
    pub start_block: String,
    pub page_limit: u64,
    pub pacing: PacingPolicy,
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            start_block: START_BLOCK.to_string(),
            page_limit: PAGE_LIMIT,
            pacing: PacingPolicy::default(),
        }
    }
}

/// The outcome of one iteration.
#[derive(Debug)]
pub enum Step {
    /// Transaction fetched and stored.
    Archived { txid: String },
    /// Transaction failed and is back on top of the queue.
    Requeued {
        txid: String,
        attempts: u32,
        error: ArchiveError,
    },
    /// Transaction failed and the retry policy gave up on it.
    Abandoned {
        txid: String,
        attempts: u32,
        error: ArchiveError,
    },
    /// Block page fetched and stored, its ids now queued.
    ///
    /// `parent` is set when the page reached the end of the block and the walk
    /// moved on to that block.
    Page {
        hash: String,
        start: u64,
        n_tx: u64,
        queued: usize,
        parent: Option<String>,
    },
    /// Block page failed, state unchanged.
    PageFailed {
        hash: String,
        start: u64,
        error: ArchiveError,
    },
}

impl Step {
    /// True if the unit of work completed.
    pub fn is_success(&self) -> bool {
        matches!(self, Step::Archived { .. } | Step::Page { .. })
    }
}

/// In-memory state of the walk. Nothing is persisted, a new archiver starts
/// again from its configured block.
#[derive(Debug)]
pub struct Archiver<S, T, R = Unbounded> {
    source: S,
    store: T,
    retry: R,
    page_limit: u64,
    /// Block whose next page is requested when the queue is empty.
    block: String,
    /// Used as a stack: the last id pushed is fetched first.
    pending: Vec<String>,
    n_tx: u64,
    /// Transactions resolved (archived or abandoned) for the current page sequence.
    processed: u64,
    attempts: HashMap<String, u32>,
    /// Popped id whose fetch has not finished.
    in_flight: Option<String>,
    abandoned: u64,
    pacer: Pacer,
}

impl<S, T> Archiver<S, T>
where
    S: DataSource,
    T: Store,
{
    /// Creates an archiver that retries failed transactions forever.
    ///
    /// A `page_limit` of zero is raised to one.
    pub fn new(source: S, store: T, config: ArchiverConfig) -> Self {
        Self {
            source,
            store,
            retry: Unbounded,
            page_limit: config.page_limit.max(1),
            block: config.start_block,
            pending: vec![],
            n_tx: 0,
            processed: 0,
            attempts: HashMap::new(),
            in_flight: None,
            abandoned: 0,
            pacer: Pacer::new(config.pacing),
        }
    }
}

impl<S, T, R> Archiver<S, T, R>
where
    S: DataSource,
    T: Store,
    R: RetryPolicy,
{
    /// Replaces the retry policy for failed transaction fetches.
    pub fn with_retry<P: RetryPolicy>(self, retry: P) -> Archiver<S, T, P> {
        Archiver {
            source: self.source,
            store: self.store,
            retry,
            page_limit: self.page_limit,
            block: self.block,
            pending: self.pending,
            n_tx: self.n_tx,
            processed: self.processed,
            attempts: self.attempts,
            in_flight: self.in_flight,
            abandoned: self.abandoned,
            pacer: self.pacer,
        }
    }

    /// Hash used for the next block page request.
    pub fn current_block(&self) -> &str {
        &self.block
    }

    /// Queued transaction ids, the last element is fetched next.
    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    /// Transaction count of the most recently fetched block page.
    pub fn n_tx(&self) -> u64 {
        self.n_tx
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn page_limit(&self) -> u64 {
        self.page_limit
    }

    /// Number of transaction ids dropped by the retry policy. The ids are in the error log.
    pub fn abandoned(&self) -> u64 {
        self.abandoned
    }

    /// Transaction taken off the queue whose fetch was interrupted.
    ///
    /// Only set while a step is running, or after a step was cancelled mid-fetch.
    /// The next step puts it back on the queue.
    pub fn in_flight(&self) -> Option<&str> {
        self.in_flight.as_deref()
    }

    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    /// Archives forever. Only ends when the task is dropped.
    pub async fn run(&mut self) {
        info!("Starting walk from block {}", self.block);
        loop {
            self.tick().await;
        }
    }

    /// One iteration followed by its pacing pause.
    pub async fn tick(&mut self) -> Step {
        let step = self.step().await;
        self.pacer.pace().await;
        step
    }

    /// One iteration without pacing.
    pub async fn step(&mut self) -> Step {
        if let Some(txid) = self.in_flight.take() {
            // Left over from a cancelled step.
            self.pending.push(txid);
        }
        match self.pending.pop() {
            Some(txid) => self.archive_transaction(txid).await,
            None => self.archive_block_page().await,
        }
    }

    async fn archive_transaction(&mut self, txid: String) -> Step {
        self.in_flight = Some(txid.clone());
        let result = self.fetch_transaction(&txid).await;
        self.in_flight = None;
        let error = match result {
            Ok(()) => {
                self.attempts.remove(&txid);
                self.processed += 1;
                debug!("Archived transaction {txid}");
                return Step::Archived { txid };
            }
            Err(e) => e,
        };
        let attempts = self.attempts.entry(txid.clone()).or_insert(0);
        *attempts = attempts.saturating_add(1);
        let attempts = *attempts;

        match self.retry.on_failure(attempts) {
            RetryDecision::Retry { delay } => {
                warn!("Transaction {txid} failed (attempt {attempts}), will retry: {error}");
                self.pending.push(txid.clone());
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Step::Requeued {
                    txid,
                    attempts,
                    error,
                }
            }
            RetryDecision::GiveUp => {
                error!("Abandoning transaction {txid} after {attempts} attempts: {error}");
                self.attempts.remove(&txid);
                // Counted so that the next page offset stays aligned with the block.
                self.processed += 1;
                self.abandoned += 1;
                Step::Abandoned {
                    txid,
                    attempts,
                    error,
                }
            }
        }
    }

    async fn fetch_transaction(&self, txid: &str) -> Result<(), ArchiveError> {
        let tx = self.source.transaction_details(txid).await?;
        self.store.put_transaction(txid, &tx)?;
        Ok(())
    }

    async fn archive_block_page(&mut self) -> Step {
        if self.processed == self.n_tx {
            // Start of a new page sequence (new block, or the first request).
            self.processed = 0;
        }
        let start = self.processed;
        let hash = self.block.clone();

        let block = match self.fetch_block_page(&hash, start).await {
            Ok(block) => block,
            Err(error) => {
                warn!("Block {hash} page at {start} failed, will retry: {error}");
                return Step::PageFailed { hash, start, error };
            }
        };
        self.n_tx = block.n_tx;
        self.pending = block.txids;
        let queued = self.pending.len();
        info!(
            "Archived block {hash} page at {start}: {queued} of {} transactions queued",
            self.n_tx
        );

        let parent = if start.saturating_add(self.page_limit) >= self.n_tx {
            info!("Walk moving to parent block {}", block.prev_block);
            self.block = block.prev_block;
            Some(self.block.clone())
        } else {
            None
        };
        Step::Page {
            hash,
            start,
            n_tx: self.n_tx,
            queued,
            parent,
        }
    }

    async fn fetch_block_page(&self, hash: &str, start: u64) -> Result<BlockOverview, ArchiveError> {
        let block = self
            .source
            .block_overview(hash, start, self.page_limit)
            .await?;
        self.store.put_block(hash, &block)?;
        Ok(block)
    }
}
