use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("user rejected request: {0}")]
    UserRejected(String),
    #[error("transaction reverted: {0}")]
    Reverted(String),
    #[error("port not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("policy violation: {0}")]
    Policy(String),
}

/// One contract call a step submits through the connected wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub description: String,
}

impl ContractCall {
    pub fn new(to: Address, data: Bytes, description: impl Into<String>) -> Self {
        Self {
            to,
            data,
            value: U256::ZERO,
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub success: bool,
}

/// Wallet + node boundary. Every transaction step ends in `send_transaction`
/// followed by `wait_for_receipt`.
#[async_trait]
pub trait ChainPort: Send + Sync {
    async fn chain_id(&self) -> Result<u64, PortError>;

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, PortError>;

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, PortError>;

    async fn send_transaction(&self, from: Address, call: &ContractCall)
        -> Result<B256, PortError>;

    /// `NotFound` when the hash is unknown or no receipt appears in time.
    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TxReceipt, PortError>;

    async fn send_and_confirm(
        &self,
        from: Address,
        call: &ContractCall,
    ) -> Result<TxReceipt, PortError> {
        let tx_hash = self.send_transaction(from, call).await?;
        let receipt = self.wait_for_receipt(tx_hash).await?;
        if !receipt.success {
            return Err(PortError::Reverted(format!(
                "{} reverted in {tx_hash}",
                call.description
            )));
        }
        Ok(receipt)
    }
}

/// Read-side data (balances, positions) that must be re-queried after a
/// step lands.
#[async_trait]
pub trait ReadModelPort: Send + Sync {
    async fn refresh(&self) -> Result<(), PortError>;
}

/// Remembers a submitted-but-unconfirmed transaction across restarts.
pub trait PendingTxPort: Send + Sync {
    fn remember(&self, tx_hash: B256, owner: Address) -> Result<(), PortError>;
    fn load(&self, owner: Address) -> Result<Option<B256>, PortError>;
    fn clear(&self, owner: Address) -> Result<(), PortError>;
}

pub trait ClockPort: Send + Sync {
    fn now_ms(&self) -> Result<u64, PortError>;
}
