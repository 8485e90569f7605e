//! Queued events and the chain events extracted from indexer payloads.

use serde::{Deserialize, Serialize};

use crate::operation::Operation;

/// Event type reported for transactions that carry no typed operation.
pub const UNTYPED_EVENT: &str = "transaction";

/// A payload waiting in the batcher queue, stamped at enqueue time.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEvent<T> {
    pub payload: T,
    pub enqueued_at_ms: u64,
}

impl<T> QueuedEvent<T> {
    #[must_use]
    pub fn new(payload: T, enqueued_at_ms: u64) -> Self {
        Self {
            payload,
            enqueued_at_ms,
        }
    }
}

/// One applied transaction together with the operations it carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainEvent {
    /// Stable identifier, the transaction hash.
    pub event_id: String,
    pub block_height: u64,
    pub block_hash: String,
    pub tx_id: String,
    /// Identifier of the predicate that produced this event.
    pub chainhook_uuid: Option<String>,
    pub operations: Vec<Operation>,
}

impl ChainEvent {
    /// Type of the first typed operation, or [`UNTYPED_EVENT`].
    #[must_use]
    pub fn event_type(&self) -> &str {
        self.operations
            .iter()
            .find_map(Operation::op_type)
            .unwrap_or(UNTYPED_EVENT)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn event(ops: Vec<serde_json::Value>) -> ChainEvent {
        ChainEvent {
            event_id: "0xabc".to_string(),
            block_height: 10,
            block_hash: "0xblock".to_string(),
            tx_id: "0xabc".to_string(),
            chainhook_uuid: None,
            operations: ops.into_iter().map(Operation::new).collect(),
        }
    }

    #[test]
    fn event_type_uses_first_typed_operation() {
        let ev = event(vec![json!({ "amount": 1 }), json!({ "type": "badge_mint" })]);
        assert_eq!(ev.event_type(), "badge_mint");
    }

    #[test]
    fn event_type_falls_back_when_untyped() {
        assert_eq!(event(vec![]).event_type(), UNTYPED_EVENT);
    }

    #[test]
    fn queued_event_keeps_timestamp() {
        let queued = QueuedEvent::new("payload", 42);
        assert_eq!(queued.enqueued_at_ms, 42);
        assert_eq!(queued.payload, "payload");
    }
}
