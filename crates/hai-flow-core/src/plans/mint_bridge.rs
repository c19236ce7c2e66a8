use std::sync::Arc;

use alloy::primitives::{Address, U256};

use super::{approve_step, call_step, format_amount, FlowContext, Plan};
use crate::calldata::{encode, IWrappedToken};
use crate::domain::{Projection, StepKey};
use crate::poller::{DeliveryWatch, TokenBalanceSource};
use crate::ports::{ChainPort, PortError};
use crate::snapshot::{FlowSnapshot, SnapshotRequest};
use crate::step::{nonzero, PlanBuilder, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MintBridgeStep {
    ApproveBase,
    Mint,
    ApproveV1,
    Migrate,
    Bridge,
    Delivery,
}

impl StepKey for MintBridgeStep {
    fn as_str(&self) -> &'static str {
        match self {
            Self::ApproveBase => "approve_base",
            Self::Mint => "mint",
            Self::ApproveV1 => "approve_v1",
            Self::Migrate => "migrate",
            Self::Bridge => "bridge",
            Self::Delivery => "delivery",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintBridgeContracts {
    pub base_token: Address,
    pub v1_token: Address,
    pub wrapped_token: Address,
    pub base_symbol: String,
    pub wrapped_symbol: String,
}

/// Where bridged tokens land and how to observe their arrival.
#[derive(Clone)]
pub struct BridgeRoute {
    pub destination_eid: u32,
    pub recipient: Address,
    pub destination_chain: Arc<dyn ChainPort>,
    pub destination_token: Address,
}

/// Wrap the base token (and/or migrate a v1 position) into the wrapped
/// token, then optionally bridge it.
#[derive(Clone)]
pub struct MintBridgePlan {
    pub contracts: MintBridgeContracts,
    pub deposit_base_wei: Option<U256>,
    pub migrate_v1_wei: Option<U256>,
    /// Defaults to everything minted by this plan when a route is set.
    pub bridge_amount: Option<U256>,
    pub route: Option<BridgeRoute>,
}

impl MintBridgePlan {
    fn minted(&self) -> U256 {
        nonzero(self.deposit_base_wei)
            .unwrap_or_default()
            .saturating_add(nonzero(self.migrate_v1_wei).unwrap_or_default())
    }

    fn bridged(&self) -> Option<U256> {
        self.route.as_ref()?;
        nonzero(self.bridge_amount).or_else(|| nonzero(Some(self.minted())))
    }
}

impl Plan for MintBridgePlan {
    type Key = MintBridgeStep;

    fn name(&self) -> &'static str {
        "mint_bridge"
    }

    fn snapshot_request(&self) -> SnapshotRequest {
        let c = &self.contracts;
        let mut allowances = Vec::new();
        if nonzero(self.deposit_base_wei).is_some() {
            allowances.push((c.base_token, c.wrapped_token));
        }
        if nonzero(self.migrate_v1_wei).is_some() {
            allowances.push((c.v1_token, c.wrapped_token));
        }
        SnapshotRequest {
            allowances,
            balances: vec![c.wrapped_token],
        }
    }

    fn build_steps(
        &self,
        ctx: &FlowContext,
        snapshot: &FlowSnapshot,
    ) -> Result<Vec<Step<MintBridgeStep>>, PortError> {
        let c = &self.contracts;
        let sym = c.wrapped_symbol.as_str();
        let mut wrapped_balance = snapshot.balance(c.wrapped_token);
        let mut plan = PlanBuilder::new();

        if let Some(amount) = nonzero(self.deposit_base_wei) {
            plan.push_if(
                snapshot.needs_approval(c.base_token, c.wrapped_token, amount),
                || {
                    approve_step(
                        ctx,
                        MintBridgeStep::ApproveBase,
                        &c.base_symbol,
                        c.base_token,
                        c.wrapped_token,
                        amount,
                    )
                },
            );
            let data = encode(&IWrappedToken::depositForCall {
                account: ctx.owner,
                amount,
            });
            let label = format!("Mint {} {sym}", format_amount(amount));
            plan.push(
                call_step(ctx, MintBridgeStep::Mint, label, c.wrapped_token, data)
                    .with_projection(Projection::credit(sym, wrapped_balance, amount)),
            );
            wrapped_balance = wrapped_balance.saturating_add(amount);
        }

        if let Some(amount) = nonzero(self.migrate_v1_wei) {
            plan.push_if(
                snapshot.needs_approval(c.v1_token, c.wrapped_token, amount),
                || {
                    approve_step(
                        ctx,
                        MintBridgeStep::ApproveV1,
                        &format!("v1 {sym}"),
                        c.v1_token,
                        c.wrapped_token,
                        amount,
                    )
                },
            );
            let data = encode(&IWrappedToken::migrateV1Call { amount });
            let label = format!("Migrate {} v1 {sym}", format_amount(amount));
            plan.push(
                call_step(ctx, MintBridgeStep::Migrate, label, c.wrapped_token, data)
                    .with_projection(Projection::credit(sym, wrapped_balance, amount)),
            );
            wrapped_balance = wrapped_balance.saturating_add(amount);
        }

        if let (Some(route), Some(amount)) = (self.route.as_ref(), self.bridged()) {
            if amount > wrapped_balance {
                return Err(PortError::Validation(format!(
                    "bridge amount {amount} exceeds projected {sym} balance {wrapped_balance}"
                )));
            }
            let data = encode(&IWrappedToken::bridgeCall {
                dstEid: route.destination_eid,
                recipient: route.recipient,
                amount,
            });
            let label = format!("Bridge {} {sym}", format_amount(amount));
            plan.push(
                call_step(ctx, MintBridgeStep::Bridge, label, c.wrapped_token, data)
                    .with_projection(Projection::debit(sym, wrapped_balance, amount)),
            );

            let source = TokenBalanceSource::new(
                Arc::clone(&route.destination_chain),
                route.destination_token,
                route.recipient,
            );
            let watch = DeliveryWatch::new(Arc::new(source), ctx.poller);
            plan.push(Step::delivery(
                MintBridgeStep::Delivery,
                format!("Wait for {} {sym} on destination", format_amount(amount)),
                Arc::new(watch),
            ));
        }

        plan.build()
    }
}
