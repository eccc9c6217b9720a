use async_trait::async_trait;
use tracing::debug;

use super::{JsonRpcClient, RpcError};
use crate::celocli::NodeCandidates;

/// Current height of the monitored chain
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainHeightSource: Send + Sync {
    async fn current_block(&self) -> Result<u64, RpcError>;
}

/// Reads `eth_blockNumber` from the configured node, falling back once
pub struct JsonRpcChainHeight {
    client: JsonRpcClient,
    nodes: NodeCandidates,
}

impl JsonRpcChainHeight {
    pub fn new(client: JsonRpcClient, nodes: NodeCandidates) -> Self {
        Self { client, nodes }
    }
}

#[async_trait]
impl ChainHeightSource for JsonRpcChainHeight {
    async fn current_block(&self) -> Result<u64, RpcError> {
        let (height, node) = self
            .nodes
            .try_each("eth_blockNumber", |node| async move {
                self.client.block_number(&node).await
            })
            .await?;
        debug!(node = %node, block = height.number, "Read chain height");
        Ok(height.number)
    }
}
