//! In-memory reference implementation of the storage traits: the only
//! concrete storage backend in scope, used for tests and local/dev runs.
//! Grounded in the teacher's `Database`/`Tree` trait-based abstraction and
//! the upstream Go implementation's `repository/inmemory` semantics.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::warn;

use crate::bip157::{FilterEntry, FilterKey};
use crate::storage::{
    BlockHeaderRepository, FilterRepository, StorageError, StorageResult,
    MAX_BLOCK_LOCATORS_PER_MSG,
};
use crate::types::{BlockHeader, Hash};

#[derive(Default)]
pub struct MemoryFilterStore {
    entries: RwLock<HashMap<FilterKey, FilterEntry>>,
}

impl MemoryFilterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FilterRepository for MemoryFilterStore {
    async fn put(&self, entry: FilterEntry) -> StorageResult<()> {
        let mut entries = self.entries.write().unwrap();
        match entries.get(&entry.key) {
            Some(existing) if existing.nbytes == entry.nbytes => Ok(()),
            Some(_) => Err(StorageError::FilterConflict),
            None => {
                entries.insert(entry.key, entry);
                Ok(())
            }
        }
    }

    async fn get(&self, key: &FilterKey) -> StorageResult<FilterEntry> {
        self.entries
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or(StorageError::FilterNotFound)
    }
}

#[derive(Default)]
pub struct MemoryHeaderStore {
    by_hash: RwLock<HashMap<Hash, BlockHeader>>,
    by_height: RwLock<HashMap<u32, Hash>>,
    tip_height: RwLock<Option<u32>>,
}

impl MemoryHeaderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlockHeaderRepository for MemoryHeaderStore {
    async fn chain_tip(&self) -> StorageResult<BlockHeader> {
        let height = self.tip_height.read().unwrap().ok_or(StorageError::NoHeaders)?;
        let hash = *self
            .by_height
            .read()
            .unwrap()
            .get(&height)
            .expect("tip height always indexed");
        self.get_by_hash(&hash).await
    }

    async fn get_by_hash(&self, hash: &Hash) -> StorageResult<BlockHeader> {
        self.by_hash
            .read()
            .unwrap()
            .get(hash)
            .cloned()
            .ok_or_else(|| StorageError::BlockNotFound(crate::types::hash_to_hex(hash)))
    }

    async fn get_hash_by_height(&self, height: u32) -> StorageResult<Hash> {
        self.by_height
            .read()
            .unwrap()
            .get(&height)
            .copied()
            .ok_or(StorageError::NoHeaders)
    }

    async fn write(&self, headers: Vec<BlockHeader>) -> StorageResult<()> {
        let mut by_hash = self.by_hash.write().unwrap();
        let mut by_height = self.by_height.write().unwrap();
        let mut tip_height = self.tip_height.write().unwrap();

        for header in headers {
            let hash = header.hash();
            if by_hash.contains_key(&hash) {
                warn!(height = header.height, "header already present, skipping");
                continue;
            }
            by_height.insert(header.height, hash);
            by_hash.insert(hash, header.clone());
            *tip_height = Some(tip_height.map_or(header.height, |h| h.max(header.height)));
        }
        Ok(())
    }

    async fn latest_locator(&self) -> StorageResult<Vec<Hash>> {
        let tip = self.chain_tip().await?;
        let by_height = self.by_height.read().unwrap();

        let mut locators = Vec::new();
        let mut step: i64 = 1;
        let mut height: i64 = tip.height as i64;
        let mut index = 0usize;

        while height > 0 {
            if let Some(hash) = by_height.get(&(height as u32)) {
                locators.push(*hash);
            }
            if locators.len() >= MAX_BLOCK_LOCATORS_PER_MSG {
                break;
            }
            if index >= 10 {
                step *= 2;
            }
            height -= step;
            index += 1;
        }
        Ok(locators)
    }

    async fn has_all_ancestors(&self, hash: &Hash) -> bool {
        let by_hash = self.by_hash.read().unwrap();
        let mut current = match by_hash.get(hash) {
            Some(header) => header.clone(),
            None => return false,
        };
        while current.height > 1 {
            match by_hash.get(&current.prev_block_hash) {
                Some(parent) => current = parent.clone(),
                None => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bip157::FilterType;

    fn header(height: u32, prev: Hash) -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_block_hash: prev,
            merkle_root: [0u8; 32],
            timestamp: 0,
            height,
            proof: vec![],
        }
    }

    #[tokio::test]
    async fn filter_put_is_idempotent() {
        let store = MemoryFilterStore::new();
        let key = FilterKey::new([1u8; 32], FilterType::Regular);
        let entry = FilterEntry {
            key,
            nbytes: vec![1, 2, 3],
        };
        store.put(entry.clone()).await.unwrap();
        store.put(entry.clone()).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), entry);
    }

    #[tokio::test]
    async fn filter_put_conflict_is_rejected() {
        let store = MemoryFilterStore::new();
        let key = FilterKey::new([1u8; 32], FilterType::Regular);
        store
            .put(FilterEntry {
                key,
                nbytes: vec![1],
            })
            .await
            .unwrap();
        let result = store
            .put(FilterEntry {
                key,
                nbytes: vec![2],
            })
            .await;
        assert!(matches!(result, Err(StorageError::FilterConflict)));
    }

    #[tokio::test]
    async fn chain_tip_tracks_highest_height() {
        let store = MemoryHeaderStore::new();
        let genesis_hash = [0u8; 32];
        let h1 = header(1, genesis_hash);
        let h1_hash = h1.hash();
        let h2 = header(2, h1_hash);
        store.write(vec![h1.clone(), h2.clone()]).await.unwrap();
        assert_eq!(store.chain_tip().await.unwrap().height, 2);
    }

    #[tokio::test]
    async fn has_all_ancestors_detects_gap() {
        let store = MemoryHeaderStore::new();
        let genesis_hash = [0u8; 32];
        let h1 = header(1, genesis_hash);
        let h1_hash = h1.hash();
        let h2 = header(2, h1_hash);
        let h2_hash = h2.hash();
        let h3 = header(3, h2_hash);
        store.write(vec![h1, h3.clone()]).await.unwrap(); // h2 missing
        assert!(!store.has_all_ancestors(&h3.hash()).await);

        let store2 = MemoryHeaderStore::new();
        store2.write(vec![h2, h3.clone()]).await.unwrap();
        assert!(store2.has_all_ancestors(&h3.hash()).await);
    }

    #[tokio::test]
    async fn locator_shape_matches_decrement_then_double() {
        let store = MemoryHeaderStore::new();
        let mut prev = [0u8; 32];
        let mut headers = Vec::new();
        for height in 1..=100u32 {
            let h = header(height, prev);
            prev = h.hash();
            headers.push(h);
        }
        store.write(headers).await.unwrap();
        let locator = store.latest_locator().await.unwrap();

        // First ten entries decrement by one (heights 100..=91), matching
        // the hashes stored at those heights.
        let by_height = store.by_height.read().unwrap();
        for (i, hash) in locator.iter().take(10).enumerate() {
            assert_eq!(*hash, *by_height.get(&(100 - i as u32)).unwrap());
        }
        assert!(locator.len() <= MAX_BLOCK_LOCATORS_PER_MSG);
    }
}
