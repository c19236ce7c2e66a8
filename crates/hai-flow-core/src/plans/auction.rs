use alloy::primitives::{Address, U256};

use super::{approve_step, call_step, format_amount, FlowContext, Plan};
use crate::calldata::{encode, IAuctionHouse, ICollateralJoin};
use crate::domain::{Projection, StepKey};
use crate::ports::PortError;
use crate::snapshot::{FlowSnapshot, SnapshotRequest};
use crate::step::{nonzero, PlanBuilder, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AuctionStep {
    ApproveCoin,
    Bid,
    Settle,
    ClaimCollateral,
}

impl StepKey for AuctionStep {
    fn as_str(&self) -> &'static str {
        match self {
            Self::ApproveCoin => "approve_coin",
            Self::Bid => "bid",
            Self::Settle => "settle",
            Self::ClaimCollateral => "claim_collateral",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionContracts {
    pub coin: Address,
    pub auction_house: Address,
    pub collateral_join: Address,
    pub coin_symbol: String,
    pub collateral_symbol: String,
}

/// Bid on a collateral auction, settle it, and pull the won collateral out
/// of the join adapter. Any subset may be present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionPlan {
    pub contracts: AuctionContracts,
    pub auction_id: U256,
    pub bid_wei: Option<U256>,
    pub settle: bool,
    pub claim_collateral_wei: Option<U256>,
}

impl Plan for AuctionPlan {
    type Key = AuctionStep;

    fn name(&self) -> &'static str {
        "auction"
    }

    fn snapshot_request(&self) -> SnapshotRequest {
        let c = &self.contracts;
        let allowances = match nonzero(self.bid_wei) {
            Some(_) => vec![(c.coin, c.auction_house)],
            None => Vec::new(),
        };
        SnapshotRequest {
            allowances,
            balances: vec![c.coin],
        }
    }

    fn build_steps(
        &self,
        ctx: &FlowContext,
        snapshot: &FlowSnapshot,
    ) -> Result<Vec<Step<AuctionStep>>, PortError> {
        let c = &self.contracts;
        let id = self.auction_id;
        let mut plan = PlanBuilder::new();

        if let Some(bid) = nonzero(self.bid_wei) {
            plan.push_if(snapshot.needs_approval(c.coin, c.auction_house, bid), || {
                approve_step(
                    ctx,
                    AuctionStep::ApproveCoin,
                    &c.coin_symbol,
                    c.coin,
                    c.auction_house,
                    bid,
                )
            });
            let data = encode(&IAuctionHouse::buyCollateralCall { auctionId: id, bid });
            let label = format!("Bid {} {} on auction #{id}", format_amount(bid), c.coin_symbol);
            plan.push(
                call_step(ctx, AuctionStep::Bid, label, c.auction_house, data).with_projection(
                    Projection::debit(&c.coin_symbol, snapshot.balance(c.coin), bid),
                ),
            );
        }

        plan.push_if(self.settle, || {
            let data = encode(&IAuctionHouse::settleAuctionCall { auctionId: id });
            call_step(
                ctx,
                AuctionStep::Settle,
                format!("Settle auction #{id}"),
                c.auction_house,
                data,
            )
        });

        plan.push_amount(self.claim_collateral_wei, |amount| {
            let data = encode(&ICollateralJoin::exitCall {
                account: ctx.owner,
                amount,
            });
            let label = format!("Claim {} {}", format_amount(amount), c.collateral_symbol);
            call_step(ctx, AuctionStep::ClaimCollateral, label, c.collateral_join, data)
        });

        plan.build()
    }
}
