use anyhow::Result;
use blockscribe_archive::{
    retry::RetryPolicy, Archiver, BlockCypher, DataSource, FileStore, Store,
};
use clap::Parser;
use log::info;

use crate::cli::AppArgs;

mod cli;

/// Walk a blockchain backwards and archive it.
///
/// Starts at a block and, for each block, stores every page of the block
/// and every transaction it lists, then continues with the parent block.
/// Requests are paced for the public API rate limit. The walk runs until
/// interrupted; progress is not saved, a restart begins at the start block.
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = AppArgs::parse();

    let source = BlockCypher::new(args.source_config())?;
    let store = FileStore::new(&args.data_dir);
    store.prepare()?;
    let archiver = Archiver::new(source, store, args.archiver_config());

    match args.bounded_retry() {
        Some(retry) => walk_until_interrupted(archiver.with_retry(retry)).await,
        None => walk_until_interrupted(archiver).await,
    }
}

async fn walk_until_interrupted<S, T, R>(mut archiver: Archiver<S, T, R>) -> Result<()>
where
    S: DataSource,
    T: Store,
    R: RetryPolicy,
{
    tokio::select! {
        _ = archiver.run() => {}
        signal = tokio::signal::ctrl_c() => signal?,
    }
    let in_flight = usize::from(archiver.in_flight().is_some());
    info!(
        "Interrupted at block {} ({} of {} transactions resolved, {} pending, {} abandoned)",
        archiver.current_block(),
        archiver.processed(),
        archiver.n_tx(),
        archiver.pending().len() + in_flight,
        archiver.abandoned()
    );
    Ok(())
}
