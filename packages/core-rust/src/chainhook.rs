//! Chainhook webhook payload decoding.
//!
//! Only the parts of the envelope the pipeline consumes are modeled:
//! applied and rolled-back blocks, their transactions, and each
//! transaction's operation list. Unknown fields are ignored.

use serde::Deserialize;
use serde_json::Value;

use crate::event::ChainEvent;
use crate::operation::Operation;

/// Errors from decoding a Chainhook payload.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("malformed chainhook payload: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("block at index {block_index} has an empty transaction hash")]
    MissingTransactionHash { block_index: u64 },
    #[error("payload contains neither apply nor rollback blocks")]
    Empty,
}

/// Top-level webhook envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainhookPayload {
    #[serde(default)]
    pub apply: Vec<BlockEvent>,
    #[serde(default)]
    pub rollback: Vec<BlockEvent>,
    #[serde(default)]
    pub chainhook: Option<ChainhookInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainhookInfo {
    pub uuid: String,
    #[serde(default)]
    pub is_streaming_blocks: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockIdentifier {
    pub index: u64,
    #[serde(default)]
    pub hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockEvent {
    pub block_identifier: BlockIdentifier,
    #[serde(default)]
    pub transactions: Vec<TransactionEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionIdentifier {
    pub hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionEvent {
    pub transaction_identifier: TransactionIdentifier,
    #[serde(default)]
    pub operations: Vec<Value>,
    #[serde(default)]
    pub metadata: Value,
}

impl ChainhookPayload {
    /// Decodes a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Parse`] for invalid JSON or a wrong envelope shape.
    pub fn from_slice(body: &[u8]) -> Result<Self, PayloadError> {
        Ok(serde_json::from_slice(body)?)
    }

    /// # Errors
    ///
    /// Returns [`PayloadError::Parse`] when the value is not an envelope.
    pub fn from_value(value: Value) -> Result<Self, PayloadError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Number of transactions inside rolled-back blocks.
    #[must_use]
    pub fn rollback_transaction_count(&self) -> usize {
        self.rollback.iter().map(|b| b.transactions.len()).sum()
    }

    /// Flattens applied blocks into one [`ChainEvent`] per transaction.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Empty`] when there is nothing to apply or roll
    /// back, and [`PayloadError::MissingTransactionHash`] for a transaction
    /// with a blank hash.
    pub fn applied_events(&self) -> Result<Vec<ChainEvent>, PayloadError> {
        if self.apply.is_empty() && self.rollback.is_empty() {
            return Err(PayloadError::Empty);
        }

        let uuid = self.chainhook.as_ref().map(|c| c.uuid.clone());
        let mut events = Vec::new();
        for block in &self.apply {
            for tx in &block.transactions {
                let hash = tx.transaction_identifier.hash.trim();
                if hash.is_empty() {
                    return Err(PayloadError::MissingTransactionHash {
                        block_index: block.block_identifier.index,
                    });
                }
                events.push(ChainEvent {
                    event_id: hash.to_string(),
                    block_height: block.block_identifier.index,
                    block_hash: block.block_identifier.hash.clone(),
                    tx_id: hash.to_string(),
                    chainhook_uuid: uuid.clone(),
                    operations: tx.operations.iter().cloned().map(Operation::new).collect(),
                });
            }
        }
        Ok(events)
    }
}
