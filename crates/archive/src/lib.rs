//! Archives a blockchain to local JSON files by walking from a block to its
//! ancestors through a block explorer API.
pub mod archiver;
pub mod blockcypher;
pub mod pacing;
pub mod retry;
pub mod source;
pub mod store;

pub use archiver::{ArchiveError, Archiver, ArchiverConfig, Step};
pub use blockcypher::{BlockCypher, BlockCypherConfig};
pub use source::{BlockOverview, DataSource, SourceError, TransactionDetails};
pub use store::{FileStore, Store, StoreError};
