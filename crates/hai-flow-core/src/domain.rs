use std::fmt::Debug;
use std::hash::Hash;

use alloy::primitives::{B256, U256};
use serde::{Deserialize, Serialize};

use crate::state_machine::StepStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimestampMs(pub u64);

/// Identifier of a step inside one sequence. Implemented by the per-flow
/// key enums (`MintBridgeStep`, `StakeStep`, ...).
pub trait StepKey: Copy + Eq + Ord + Hash + Debug + Send + Sync + 'static {
    fn as_str(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKindTag {
    Transaction,
    Delivery,
}

/// Balance of one token before and after a step, computed from the snapshot
/// taken when the plan was built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    pub symbol: String,
    pub current: U256,
    pub after: U256,
}

impl Projection {
    pub fn credit(symbol: impl Into<String>, current: U256, amount: U256) -> Self {
        Self {
            symbol: symbol.into(),
            current,
            after: current.saturating_add(amount),
        }
    }

    pub fn debit(symbol: impl Into<String>, current: U256, amount: U256) -> Self {
        Self {
            symbol: symbol.into(),
            current,
            after: current.saturating_sub(amount),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered { observed: U256, attempts: u32 },
    TimedOut { last_observed: Option<U256>, attempts: u32 },
    Cancelled,
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReceipt {
    pub tx_hash: Option<B256>,
    pub block_number: Option<u64>,
    pub delivery: Option<DeliveryOutcome>,
}

impl StepReceipt {
    pub fn from_tx(tx_hash: B256, block_number: Option<u64>) -> Self {
        Self {
            tx_hash: Some(tx_hash),
            block_number,
            delivery: None,
        }
    }
}

/// Read-only view of a step for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepView<K> {
    pub index: usize,
    pub key: K,
    pub label: String,
    pub kind: StepKindTag,
    pub status: StepStatus,
    pub projection: Option<Projection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub event_seq: u64,
    pub step_key: String,
    pub state_before: StepStatus,
    pub state_after: StepStatus,
    pub reason: String,
    pub outcome: Option<String>,
    pub recorded_at_ms: TimestampMs,
}
