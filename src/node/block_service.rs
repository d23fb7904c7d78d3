//! Block service (C4): out-of-band HTTP fetch for full blocks, used only
//! by the scanner when a filter match needs the actual transactions.
//! Grounded in the original implementation's `esploraBlockService`
//! (`pkg/blockservice/service.go`): `GET {base}/block/{hex_hash}/raw`.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::codec::Decode;
use crate::types::{hash_to_hex, Block, Hash};

#[derive(thiserror::Error, Debug)]
pub enum BlockServiceError {
    #[error("block not found: {0}")]
    BlockNotFound(String),
    #[error("transport error: {0}")]
    TransportError(String),
}

pub type BlockServiceResult<T> = Result<T, BlockServiceError>;

#[async_trait]
pub trait BlockService: Send + Sync {
    async fn get_block(&self, hash: &Hash) -> BlockServiceResult<Block>;
}

/// HTTP implementation backed by `reqwest`. `base_url` has no trailing
/// slash, e.g. `http://localhost:3001`.
pub struct HttpBlockService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBlockService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client builds with a fixed timeout");
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl BlockService for HttpBlockService {
    async fn get_block(&self, hash: &Hash) -> BlockServiceResult<Block> {
        let url = format!("{}/block/{}/raw", self.base_url, hash_to_hex(hash));
        debug!(url = %url, "fetching block");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BlockServiceError::TransportError(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(BlockServiceError::BlockNotFound(hash_to_hex(hash)));
        }
        let bytes = response
            .error_for_status()
            .map_err(|e| BlockServiceError::TransportError(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| BlockServiceError::TransportError(e.to_string()))?;

        Block::decode(&mut std::io::Cursor::new(bytes.as_ref()))
            .map_err(|e| BlockServiceError::TransportError(e.to_string()))
    }
}

/// In-memory test double, keyed by block hash. Mirrors the upstream
/// implementation's test fixtures (`pkg/testutil/testutil.go`).
#[cfg(any(test, feature = "test-support"))]
pub struct MockBlockService {
    blocks: std::sync::RwLock<std::collections::HashMap<Hash, Block>>,
}

#[cfg(any(test, feature = "test-support"))]
impl MockBlockService {
    pub fn new() -> Self {
        Self {
            blocks: std::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }

    pub fn insert(&self, block: Block) {
        self.blocks.write().unwrap().insert(block.header.hash(), block);
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for MockBlockService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl BlockService for MockBlockService {
    async fn get_block(&self, hash: &Hash) -> BlockServiceResult<Block> {
        self.blocks
            .read()
            .unwrap()
            .get(hash)
            .cloned()
            .ok_or_else(|| BlockServiceError::BlockNotFound(hash_to_hex(hash)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BlockHeader;

    fn block(height: u32) -> Block {
        Block {
            header: BlockHeader {
                version: 1,
                prev_block_hash: [0u8; 32],
                merkle_root: [0u8; 32],
                timestamp: 0,
                height,
                proof: vec![],
            },
            transactions: vec![],
        }
    }

    #[tokio::test]
    async fn mock_returns_not_found_for_unknown_hash() {
        let service = MockBlockService::new();
        let result = service.get_block(&[1u8; 32]).await;
        assert!(matches!(result, Err(BlockServiceError::BlockNotFound(_))));
    }

    #[tokio::test]
    async fn mock_returns_inserted_block() {
        let service = MockBlockService::new();
        let b = block(5);
        let hash = b.header.hash();
        service.insert(b.clone());
        let fetched = service.get_block(&hash).await.unwrap();
        assert_eq!(fetched, b);
    }
}
