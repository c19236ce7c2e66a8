use std::collections::BTreeMap;

use alloy::primitives::{Address, U256};
use tracing::warn;

use crate::ports::ChainPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalState {
    /// Not read yet, or the read failed.
    Unknown,
    Insufficient { allowance: U256 },
    Sufficient { allowance: U256 },
}

/// What a plan needs read before it can lay out its steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotRequest {
    pub allowances: Vec<(Address, Address)>,
    pub balances: Vec<Address>,
}

/// Allowances and balances captured once, when the plan is built. Steps are
/// derived from this and never from live state, so the step list does not
/// reshuffle while the flow runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowSnapshot {
    allowances: BTreeMap<(Address, Address), U256>,
    balances: BTreeMap<Address, U256>,
}

impl FlowSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_allowance(mut self, token: Address, spender: Address, allowance: U256) -> Self {
        self.allowances.insert((token, spender), allowance);
        self
    }

    pub fn with_balance(mut self, token: Address, balance: U256) -> Self {
        self.balances.insert(token, balance);
        self
    }

    pub async fn capture(chain: &dyn ChainPort, owner: Address, request: &SnapshotRequest) -> Self {
        let mut snapshot = Self::default();
        for &(token, spender) in &request.allowances {
            match chain.allowance(token, owner, spender).await {
                Ok(value) => {
                    snapshot.allowances.insert((token, spender), value);
                }
                Err(e) => {
                    warn!(%token, %spender, error = %e, "allowance read failed; treating as unknown")
                }
            }
        }
        for &token in &request.balances {
            match chain.balance_of(token, owner).await {
                Ok(value) => {
                    snapshot.balances.insert(token, value);
                }
                Err(e) => warn!(%token, error = %e, "balance read failed; projecting from zero"),
            }
        }
        snapshot
    }

    pub fn approval_state(&self, token: Address, spender: Address, amount: U256) -> ApprovalState {
        match self.allowances.get(&(token, spender)) {
            None => ApprovalState::Unknown,
            Some(&allowance) if allowance >= amount => ApprovalState::Sufficient { allowance },
            Some(&allowance) => ApprovalState::Insufficient { allowance },
        }
    }

    /// Unknown counts as needing approval.
    pub fn needs_approval(&self, token: Address, spender: Address, amount: U256) -> bool {
        !matches!(
            self.approval_state(token, spender, amount),
            ApprovalState::Sufficient { .. }
        )
    }

    pub fn balance(&self, token: Address) -> U256 {
        self.balances.get(&token).copied().unwrap_or(U256::ZERO)
    }
}
