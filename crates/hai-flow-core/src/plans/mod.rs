//! Declarative plans for the multi-step flows.
//!
//! A plan names the amounts and targets of each sub-operation. Building it
//! against a `FlowSnapshot` yields the step list: zero or absent amounts
//! contribute nothing, and approvals appear only where the snapshot does not
//! show a sufficient allowance.

pub mod auction;
pub mod mint_bridge;
pub mod proxy;
pub mod stake;

use std::sync::Arc;

use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, Bytes, U256};

use crate::calldata::{encode, IERC20};
use crate::domain::StepKey;
use crate::poller::DeliveryPoller;
use crate::ports::{ChainPort, ContractCall, PendingTxPort, PortError, ReadModelPort};
use crate::snapshot::{FlowSnapshot, SnapshotRequest};
use crate::step::{CallOperation, Step};

pub use auction::{AuctionContracts, AuctionPlan, AuctionStep};
pub use mint_bridge::{BridgeRoute, MintBridgeContracts, MintBridgePlan, MintBridgeStep};
pub use proxy::{ProxyPlan, ProxyStep};
pub use stake::{StakeContracts, StakePlan, StakeStep};

/// Everything a plan needs from its environment.
#[derive(Clone)]
pub struct FlowContext {
    pub chain: Arc<dyn ChainPort>,
    pub owner: Address,
    pub poller: DeliveryPoller,
    pub read_model: Option<Arc<dyn ReadModelPort>>,
    pub pending_tx: Option<Arc<dyn PendingTxPort>>,
}

impl FlowContext {
    pub fn new(chain: Arc<dyn ChainPort>, owner: Address) -> Self {
        Self {
            chain,
            owner,
            poller: DeliveryPoller::default(),
            read_model: None,
            pending_tx: None,
        }
    }

    pub fn with_poller(mut self, poller: DeliveryPoller) -> Self {
        self.poller = poller;
        self
    }

    pub fn with_read_model(mut self, read_model: Arc<dyn ReadModelPort>) -> Self {
        self.read_model = Some(read_model);
        self
    }

    pub fn with_pending_tx(mut self, store: Arc<dyn PendingTxPort>) -> Self {
        self.pending_tx = Some(store);
        self
    }
}

pub trait Plan {
    type Key: StepKey;

    /// Operation name used for the account lock and logs.
    fn name(&self) -> &'static str;

    fn snapshot_request(&self) -> SnapshotRequest;

    fn build_steps(
        &self,
        ctx: &FlowContext,
        snapshot: &FlowSnapshot,
    ) -> Result<Vec<Step<Self::Key>>, PortError>;
}

/// Captures the snapshot once and lays out the steps from it.
pub async fn prepare<P: Plan>(
    plan: &P,
    ctx: &FlowContext,
) -> Result<(Vec<Step<P::Key>>, FlowSnapshot), PortError> {
    let snapshot =
        FlowSnapshot::capture(ctx.chain.as_ref(), ctx.owner, &plan.snapshot_request()).await;
    let steps = plan.build_steps(ctx, &snapshot)?;
    Ok((steps, snapshot))
}

pub fn format_amount(amount: U256) -> String {
    let formatted = format_ether(amount);
    match formatted.split_once('.') {
        Some((whole, frac)) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                whole.to_owned()
            } else {
                format!("{whole}.{frac}")
            }
        }
        None => formatted,
    }
}

fn call_step<K: StepKey>(
    ctx: &FlowContext,
    key: K,
    label: String,
    to: Address,
    data: Bytes,
) -> Step<K> {
    let call = ContractCall::new(to, data, label.clone());
    Step::transaction(key, label, CallOperation::new(Arc::clone(&ctx.chain), ctx.owner, call))
}

fn approve_step<K: StepKey>(
    ctx: &FlowContext,
    key: K,
    symbol: &str,
    token: Address,
    spender: Address,
    amount: U256,
) -> Step<K> {
    call_step(
        ctx,
        key,
        format!("Approve {} {symbol}", format_amount(amount)),
        token,
        encode(&IERC20::approveCall { spender, amount }),
    )
}
