//! Storage abstractions: `FilterRepository` and `BlockHeaderRepository`.
//!
//! Concrete persistent (SQL or otherwise) backends are out of scope — these
//! are trait interfaces only, plus one in-memory reference implementation
//! (`storage::memory`) used for tests and local/dev runs. Both traits are
//! safe for single-writer / many-reader concurrent use: the synchronizer is
//! the sole writer for headers, the protocol engine's filter monitor the
//! sole writer for filters.

pub mod memory;

use async_trait::async_trait;

use crate::bip157::{FilterEntry, FilterKey};
use crate::types::{BlockHeader, Hash};

pub const MAX_BLOCK_LOCATORS_PER_MSG: usize = 500;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("no headers stored")]
    NoHeaders,
    #[error("block not found: {0}")]
    BlockNotFound(String),
    #[error("filter not found")]
    FilterNotFound,
    #[error("filter conflict: existing entry for this key has different bytes")]
    FilterConflict,
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait FilterRepository: Send + Sync {
    /// Idempotent: inserting the same `(key, bytes)` pair twice succeeds;
    /// inserting a different payload under an existing key fails with
    /// `FilterConflict`.
    async fn put(&self, entry: FilterEntry) -> StorageResult<()>;
    async fn get(&self, key: &FilterKey) -> StorageResult<FilterEntry>;
}

#[async_trait]
pub trait BlockHeaderRepository: Send + Sync {
    /// The header with the largest height. Ties are impossible in
    /// practice since the synchronizer only ever writes strictly
    /// consecutive heights.
    async fn chain_tip(&self) -> StorageResult<BlockHeader>;
    async fn get_by_hash(&self, hash: &Hash) -> StorageResult<BlockHeader>;
    async fn get_hash_by_height(&self, height: u32) -> StorageResult<Hash>;
    /// Writes in the given order. An already-present hash is tolerated
    /// silently (callers log a warning; the store itself does not error).
    async fn write(&self, headers: Vec<BlockHeader>) -> StorageResult<()>;
    /// A Bitcoin-style block locator ending at the tip: the tip itself,
    /// then decrementing by 1 for the first ten entries, then doubling the
    /// step, capped at `MAX_BLOCK_LOCATORS_PER_MSG`. Callers substitute the
    /// network's genesis hash when the store is empty — that substitution
    /// is not this trait's responsibility.
    async fn latest_locator(&self) -> StorageResult<Vec<Hash>>;
    /// Walks back via `prev_block_hash` from `hash` until height 1;
    /// returns `false` if any ancestor is missing. Terminates because
    /// height strictly decreases on each step.
    async fn has_all_ancestors(&self, hash: &Hash) -> bool;
}
