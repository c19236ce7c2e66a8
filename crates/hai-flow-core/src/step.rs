use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::{Projection, StepKey, StepKindTag, StepReceipt};
use crate::poller::DeliveryWatch;
use crate::ports::{ChainPort, ContractCall, PendingTxPort, PortError};

#[async_trait]
pub trait StepOperation: Send + Sync {
    async fn run(&self) -> Result<StepReceipt, PortError>;
}

/// Adapts an async closure into a step operation.
pub struct FnOperation<F>(F);

pub fn from_fn<F, Fut>(f: F) -> FnOperation<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<StepReceipt, PortError>> + Send + 'static,
{
    FnOperation(f)
}

#[async_trait]
impl<F, Fut> StepOperation for FnOperation<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<StepReceipt, PortError>> + Send + 'static,
{
    async fn run(&self) -> Result<StepReceipt, PortError> {
        (self.0)().await
    }
}

/// Submits one contract call and waits for its receipt.
pub struct CallOperation {
    chain: Arc<dyn ChainPort>,
    from: Address,
    call: ContractCall,
    pending: Option<Arc<dyn PendingTxPort>>,
}

impl CallOperation {
    pub fn new(chain: Arc<dyn ChainPort>, from: Address, call: ContractCall) -> Self {
        Self {
            chain,
            from,
            call,
            pending: None,
        }
    }

    /// Persist the hash between submission and confirmation, and resume
    /// waiting on a remembered hash instead of submitting again.
    pub fn remembering(mut self, store: Arc<dyn PendingTxPort>) -> Self {
        self.pending = Some(store);
        self
    }

    pub fn call(&self) -> &ContractCall {
        &self.call
    }
}

#[async_trait]
impl StepOperation for CallOperation {
    async fn run(&self) -> Result<StepReceipt, PortError> {
        let Some(store) = self.pending.as_ref() else {
            let receipt = self.chain.send_and_confirm(self.from, &self.call).await?;
            info!(tx_hash = %receipt.tx_hash, call = %self.call.description, "transaction confirmed");
            return Ok(StepReceipt::from_tx(receipt.tx_hash, receipt.block_number));
        };

        let (tx_hash, resumed) = match store.load(self.from)? {
            Some(hash) => {
                info!(tx_hash = %hash, call = %self.call.description, "resuming remembered transaction");
                (hash, true)
            }
            None => {
                let hash = self.chain.send_transaction(self.from, &self.call).await?;
                store.remember(hash, self.from)?;
                (hash, false)
            }
        };
        let receipt = match self.chain.wait_for_receipt(tx_hash).await {
            Ok(receipt) => receipt,
            // A remembered hash that never lands was dropped or replaced;
            // forget it so the next attempt submits again.
            Err(PortError::NotFound(reason)) if resumed => {
                warn!(%tx_hash, call = %self.call.description, %reason, "remembered transaction not found, clearing");
                store.clear(self.from)?;
                return Err(PortError::NotFound(reason));
            }
            Err(e) => return Err(e),
        };
        store.clear(self.from)?;
        if !receipt.success {
            return Err(PortError::Reverted(format!(
                "{} reverted in {tx_hash}",
                self.call.description
            )));
        }
        info!(%tx_hash, call = %self.call.description, "transaction confirmed");
        Ok(StepReceipt::from_tx(receipt.tx_hash, receipt.block_number))
    }
}

#[derive(Clone)]
pub enum StepKind {
    Transaction(Arc<dyn StepOperation>),
    Delivery(Arc<DeliveryWatch>),
}

impl StepKind {
    pub fn tag(&self) -> StepKindTag {
        match self {
            Self::Transaction(_) => StepKindTag::Transaction,
            Self::Delivery(_) => StepKindTag::Delivery,
        }
    }
}

#[derive(Clone)]
pub struct Step<K> {
    pub key: K,
    pub label: String,
    pub kind: StepKind,
    pub projection: Option<Projection>,
}

impl<K: StepKey> fmt::Debug for Step<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("kind", &self.kind.tag())
            .field("projection", &self.projection)
            .finish()
    }
}

impl<K: StepKey> Step<K> {
    pub fn transaction(
        key: K,
        label: impl Into<String>,
        operation: impl StepOperation + 'static,
    ) -> Self {
        Self {
            key,
            label: label.into(),
            kind: StepKind::Transaction(Arc::new(operation)),
            projection: None,
        }
    }

    pub fn delivery(key: K, label: impl Into<String>, watch: Arc<DeliveryWatch>) -> Self {
        Self {
            key,
            label: label.into(),
            kind: StepKind::Delivery(watch),
            projection: None,
        }
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }
}

/// Collects steps in declaration order and checks the list is runnable.
pub struct PlanBuilder<K> {
    steps: Vec<Step<K>>,
}

impl<K: StepKey> Default for PlanBuilder<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: StepKey> PlanBuilder<K> {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn push(&mut self, step: Step<K>) -> &mut Self {
        self.steps.push(step);
        self
    }

    pub fn push_if(&mut self, condition: bool, make: impl FnOnce() -> Step<K>) -> &mut Self {
        if condition {
            self.steps.push(make());
        }
        self
    }

    /// Adds the step only for a present, non-zero amount.
    pub fn push_amount(
        &mut self,
        amount: Option<U256>,
        make: impl FnOnce(U256) -> Step<K>,
    ) -> &mut Self {
        if let Some(amount) = nonzero(amount) {
            self.steps.push(make(amount));
        }
        self
    }

    pub fn build(self) -> Result<Vec<Step<K>>, PortError> {
        validate_steps(&self.steps)?;
        Ok(self.steps)
    }
}

pub fn nonzero(amount: Option<U256>) -> Option<U256> {
    amount.filter(|a| !a.is_zero())
}

pub fn validate_steps<K: StepKey>(steps: &[Step<K>]) -> Result<(), PortError> {
    let mut seen = BTreeSet::new();
    for (index, step) in steps.iter().enumerate() {
        if !seen.insert(step.key) {
            return Err(PortError::Validation(format!(
                "duplicate step key {}",
                step.key.as_str()
            )));
        }
        if let StepKind::Delivery(_) = step.kind {
            let follows_transaction = index
                .checked_sub(1)
                .and_then(|prev| steps.get(prev))
                .is_some_and(|prev| matches!(prev.kind, StepKind::Transaction(_)));
            if !follows_transaction {
                return Err(PortError::Validation(format!(
                    "delivery step {} must follow a transaction step",
                    step.key.as_str()
                )));
            }
        }
    }
    Ok(())
}
