//! Writes archived blocks and transactions to local files.
use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::Serialize;
use thiserror::Error;

use crate::source::{BlockOverview, TransactionDetails};

/// Default archive root, relative to the working directory.
pub static ARCHIVE_DIR: &str = "blockchain";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error {0}")]
    IoError(#[from] io::Error),
    #[error("serde_json error {0}")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("File {filename} could not be created {source}")]
    FileCreate {
        source: io::Error,
        filename: PathBuf,
    },
    #[error("Name {0:?} cannot be used as a file name")]
    InvalidName(String),
}

/// Destination for archived records.
pub trait Store {
    /// Saves a block page under the hash it was requested with, replacing any earlier page.
    fn put_block(&self, hash: &str, block: &BlockOverview) -> Result<(), StoreError>;
    /// Saves a transaction under its id.
    fn put_transaction(&self, txid: &str, tx: &TransactionDetails) -> Result<(), StoreError>;
}

/// Stores each record as a JSON file: `<root>/blocks/<hash>` and `<root>/txs/<txid>`.
#[derive(Debug, Clone)]
pub struct FileStore {
    names: ArchiveFileNames,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            names: ArchiveFileNames::new(root),
        }
    }

    pub fn names(&self) -> &ArchiveFileNames {
        &self.names
    }

    /// Creates the archive directories if absent.
    pub fn prepare(&self) -> Result<(), StoreError> {
        fs::create_dir_all(self.names.blocks_dir())?;
        fs::create_dir_all(self.names.txs_dir())?;
        Ok(())
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new(ARCHIVE_DIR)
    }
}

impl Store for FileStore {
    fn put_block(&self, hash: &str, block: &BlockOverview) -> Result<(), StoreError> {
        let filename = self.names.block(hash)?;
        write_json(&filename, block)
    }

    fn put_transaction(&self, txid: &str, tx: &TransactionDetails) -> Result<(), StoreError> {
        let filename = self.names.transaction(txid)?;
        write_json(&filename, tx)
    }
}

/// Serializes before touching the file so that a failure leaves no partial file.
fn write_json<T: Serialize>(filename: &Path, value: &T) -> Result<(), StoreError> {
    let data = serde_json::to_string(value)?;
    if let Some(dir) = filename.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut file = File::create(filename).map_err(|e| StoreError::FileCreate {
        source: e,
        filename: filename.to_owned(),
    })?;
    file.write_all(data.as_bytes())?;
    Ok(())
}

/// Helper for consistent archive file and directory names.
#[derive(Debug, Clone)]
pub struct ArchiveFileNames {
    root: PathBuf,
}

impl ArchiveFileNames {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
    pub fn root(&self) -> &Path {
        &self.root
    }
    pub fn blocks_dir(&self) -> PathBuf {
        self.root.join("blocks")
    }
    pub fn txs_dir(&self) -> PathBuf {
        self.root.join("txs")
    }
    pub fn block(&self, hash: &str) -> Result<PathBuf, StoreError> {
        Ok(self.blocks_dir().join(checked_name(hash)?))
    }
    pub fn transaction(&self, txid: &str) -> Result<PathBuf, StoreError> {
        Ok(self.txs_dir().join(checked_name(txid)?))
    }
}

/// Hashes come from the remote API and are used as file names verbatim.
fn checked_name(name: &str) -> Result<&str, StoreError> {
    let escapes = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if escapes {
        return Err(StoreError::InvalidName(name.to_owned()));
    }
    Ok(name)
}
