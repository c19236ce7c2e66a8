use alloy::primitives::{Address, U256};

use super::{approve_step, call_step, format_amount, FlowContext, Plan};
use crate::calldata::{encode, IStakingManager};
use crate::domain::{Projection, StepKey};
use crate::ports::PortError;
use crate::snapshot::{FlowSnapshot, SnapshotRequest};
use crate::step::{nonzero, PlanBuilder, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StakeStep {
    ApproveStake,
    Stake,
    InitiateWithdrawal,
    ClaimRewards,
}

impl StepKey for StakeStep {
    fn as_str(&self) -> &'static str {
        match self {
            Self::ApproveStake => "approve_stake",
            Self::Stake => "stake",
            Self::InitiateWithdrawal => "initiate_withdrawal",
            Self::ClaimRewards => "claim_rewards",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeContracts {
    pub staking_token: Address,
    pub staked_token: Address,
    pub staking_manager: Address,
    pub staking_symbol: String,
    pub staked_symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakePlan {
    pub contracts: StakeContracts,
    pub stake_wei: Option<U256>,
    pub unstake_wei: Option<U256>,
    pub claim_rewards: bool,
}

impl Plan for StakePlan {
    type Key = StakeStep;

    fn name(&self) -> &'static str {
        "stake"
    }

    fn snapshot_request(&self) -> SnapshotRequest {
        let c = &self.contracts;
        let allowances = match nonzero(self.stake_wei) {
            Some(_) => vec![(c.staking_token, c.staking_manager)],
            None => Vec::new(),
        };
        SnapshotRequest {
            allowances,
            balances: vec![c.staked_token],
        }
    }

    fn build_steps(
        &self,
        ctx: &FlowContext,
        snapshot: &FlowSnapshot,
    ) -> Result<Vec<Step<StakeStep>>, PortError> {
        let c = &self.contracts;
        let sym = c.staked_symbol.as_str();
        let mut staked = snapshot.balance(c.staked_token);
        let mut plan = PlanBuilder::new();

        if let Some(amount) = nonzero(self.stake_wei) {
            plan.push_if(
                snapshot.needs_approval(c.staking_token, c.staking_manager, amount),
                || {
                    approve_step(
                        ctx,
                        StakeStep::ApproveStake,
                        &c.staking_symbol,
                        c.staking_token,
                        c.staking_manager,
                        amount,
                    )
                },
            );
            let data = encode(&IStakingManager::stakeCall {
                account: ctx.owner,
                amount,
            });
            let label = format!("Stake {} {}", format_amount(amount), c.staking_symbol);
            plan.push(
                call_step(ctx, StakeStep::Stake, label, c.staking_manager, data)
                    .with_projection(Projection::credit(sym, staked, amount)),
            );
            staked = staked.saturating_add(amount);
        }

        if let Some(amount) = nonzero(self.unstake_wei) {
            if amount > staked {
                return Err(PortError::Validation(format!(
                    "cannot unstake {amount}: projected {sym} balance is {staked}"
                )));
            }
            let data = encode(&IStakingManager::initiateWithdrawalCall { amount });
            let label = format!("Initiate withdrawal of {} {sym}", format_amount(amount));
            plan.push(
                call_step(ctx, StakeStep::InitiateWithdrawal, label, c.staking_manager, data)
                    .with_projection(Projection::debit(sym, staked, amount)),
            );
        }

        plan.push_if(self.claim_rewards, || {
            let data = encode(&IStakingManager::getRewardCall { account: ctx.owner });
            call_step(
                ctx,
                StakeStep::ClaimRewards,
                "Claim staking rewards".to_owned(),
                c.staking_manager,
                data,
            )
        });

        plan.build()
    }
}
