//! Runs one flow end to end: builds the plan, opens the session, and walks
//! the steps, reporting each on stdout.

use std::sync::Arc;
use std::time::Duration;

use eyre::{Result, WrapErr};
use tracing::{info, warn};

use hai_flow_adapters::{
    ExplorerLinks, FlowAdapterConfig, MemoryChainAdapter, PendingTxStore, RpcChainAdapter,
    StakingReadModel, SubgraphClient, SystemClockAdapter,
};
use hai_flow_core::plans::format_amount;
use hai_flow_core::{
    AccountLocks, AuctionPlan, BridgeRoute, ChainPort, ClockPort, DeliveryOutcome, FlowContext,
    FlowSession, MintBridgePlan, Plan, ProxyPlan, SequencerError, StakePlan, StepKey, StepOutcome,
    StepView,
};

use crate::cli::Command;
use crate::contracts::ContractBook;

const DEMO_BRIDGE_DELAY: Duration = Duration::from_secs(8);

pub struct Wizard {
    config: FlowAdapterConfig,
    contracts: ContractBook,
    source: Arc<dyn ChainPort>,
    destination: Option<Arc<dyn ChainPort>>,
    links: ExplorerLinks,
    locks: AccountLocks,
    clock: Arc<dyn ClockPort>,
    pending_tx: Arc<PendingTxStore>,
}

impl Wizard {
    pub fn from_config(config: FlowAdapterConfig) -> Result<Self> {
        let links = ExplorerLinks::from_config(&config);
        let pending_tx = Arc::new(PendingTxStore::new(config.pending_tx_path.clone()));

        let (contracts, source, destination) = if config.rpc_url.is_some() {
            let path = config
                .contracts_path
                .as_deref()
                .ok_or_else(|| eyre::eyre!("HAI_FLOW_CONTRACTS is required with an rpc url"))?;
            let contracts = ContractBook::load(path)?;
            let source: Arc<dyn ChainPort> = Arc::new(RpcChainAdapter::with_config(&config)?);
            let destination = match config.destination_rpc_url.as_ref() {
                Some(url) => {
                    Some(Arc::new(RpcChainAdapter::new(url.clone(), &config)?) as Arc<dyn ChainPort>)
                }
                None => None,
            };
            info!(rpc = config.rpc_url.as_deref(), "using json-rpc chain");
            (contracts, source, destination)
        } else {
            eyre::ensure!(
                !config.strict_runtime_required(),
                "production profile requires HAI_FLOW_RPC_URL"
            );
            let contracts = ContractBook::demo();
            let source = MemoryChainAdapter::new(10);
            let destination = MemoryChainAdapter::new(252);
            source.link_bridge(
                contracts.wrapped_token,
                Arc::clone(&destination),
                contracts.destination_token,
                DEMO_BRIDGE_DELAY,
            )?;
            warn!("no rpc url configured; running against the in-memory demo ledger");
            (
                contracts,
                source as Arc<dyn ChainPort>,
                Some(destination as Arc<dyn ChainPort>),
            )
        };

        Ok(Self {
            config,
            contracts,
            source,
            destination,
            links,
            locks: AccountLocks::new(),
            clock: Arc::new(SystemClockAdapter),
            pending_tx,
        })
    }

    fn context(&self) -> FlowContext {
        FlowContext::new(Arc::clone(&self.source), self.contracts.account)
            .with_poller(self.config.delivery_poller())
            .with_pending_tx(self.pending_tx.clone())
    }

    pub async fn run(&self, command: Command) -> Result<()> {
        let c = &self.contracts;
        match command {
            Command::MintBridge {
                deposit_wei,
                migrate_wei,
                bridge_wei,
                no_bridge,
            } => {
                let route = match (no_bridge, self.destination.as_ref()) {
                    (true, _) => None,
                    (false, Some(chain)) => Some(BridgeRoute {
                        destination_eid: c.destination_eid,
                        recipient: c.account,
                        destination_chain: Arc::clone(chain),
                        destination_token: c.destination_token,
                    }),
                    (false, None) => eyre::bail!(
                        "bridging needs HAI_FLOW_DESTINATION_RPC_URL; pass --no-bridge to only mint"
                    ),
                };
                let plan = MintBridgePlan {
                    contracts: c.mint_bridge(),
                    deposit_base_wei: Some(deposit_wei),
                    migrate_v1_wei: migrate_wei,
                    bridge_amount: bridge_wei,
                    route,
                };
                self.drive(&plan, self.context()).await
            }
            Command::Stake {
                stake_wei,
                unstake_wei,
                claim_rewards,
            } => {
                let mut ctx = self.context();
                let read_model = match self.config.subgraph_url.as_ref() {
                    Some(url) => {
                        let client = SubgraphClient::new(url.clone(), &self.config)?;
                        let model = Arc::new(StakingReadModel::new(client, c.account));
                        ctx = ctx.with_read_model(model.clone());
                        Some(model)
                    }
                    None => None,
                };
                let plan = StakePlan {
                    contracts: c.stake(),
                    stake_wei,
                    unstake_wei,
                    claim_rewards,
                };
                self.drive(&plan, ctx).await?;
                if let Some(position) = read_model.and_then(|m| m.position()) {
                    println!(
                        "staked: {} stKITE, pending withdrawal: {} stKITE",
                        format_amount(position.staked),
                        format_amount(position.pending_withdrawal)
                    );
                }
                Ok(())
            }
            Command::Auction {
                auction_id,
                bid_wei,
                settle,
                claim_wei,
            } => {
                let plan = AuctionPlan {
                    contracts: c.auction(),
                    auction_id,
                    bid_wei,
                    settle,
                    claim_collateral_wei: claim_wei,
                };
                self.drive(&plan, self.context()).await
            }
            Command::Proxy => {
                let plan = ProxyPlan {
                    registry: c.proxy_registry,
                    existing_proxy: c.existing_proxy,
                };
                self.drive(&plan, self.context()).await
            }
        }
    }

    async fn drive<P: Plan>(&self, plan: &P, ctx: FlowContext) -> Result<()> {
        let session = FlowSession::open(plan, &ctx, &self.locks, Arc::clone(&self.clock))
            .await
            .wrap_err_with(|| format!("failed to prepare {} flow", plan.name()))?;
        let seq = Arc::clone(session.sequencer());

        if seq.is_empty() {
            println!("{}: nothing to do", plan.name());
            session.close();
            return Ok(());
        }
        println!("{} ({} steps)", plan.name(), seq.len());
        for view in seq.steps() {
            println!("  {}", describe(&view));
        }

        while let Some(view) = seq.current_step() {
            println!("-> {}", view.label);
            match seq.run_current_step().await {
                Ok(outcome) => self.report(&outcome),
                Err(SequencerError::Step { step, source }) => {
                    if let Some(status) = seq.last_status() {
                        println!("   {}: {}", status.title(), status.detail());
                    }
                    session.close();
                    return Err(eyre::Report::new(source)
                        .wrap_err(format!("step {step} failed; rerun to retry")));
                }
                Err(e) => {
                    session.close();
                    return Err(e.into());
                }
            }
        }
        println!("{} complete", plan.name());
        session.close();
        Ok(())
    }

    fn report<K: StepKey>(&self, outcome: &StepOutcome<K>) {
        if let Some(hash) = outcome.receipt.tx_hash {
            println!("   confirmed: {}", self.links.tx_url(hash));
            if outcome.delivery.is_some() {
                println!("   bridge:    {}", self.links.bridge_message_url(hash));
            }
        }
        match &outcome.delivery {
            Some(DeliveryOutcome::Delivered { observed, attempts }) => println!(
                "   delivered after {attempts} polls (balance {})",
                format_amount(*observed)
            ),
            Some(DeliveryOutcome::TimedOut { attempts, .. }) => println!(
                "   not observed after {attempts} polls; the transfer may still be in transit"
            ),
            Some(DeliveryOutcome::Cancelled) | None => {}
        }
    }
}

fn describe<K: StepKey>(view: &StepView<K>) -> String {
    let mut line = format!("{}. {}", view.index + 1, view.label);
    if let Some(p) = &view.projection {
        line.push_str(&format!(
            "  [{} {} -> {}]",
            p.symbol,
            format_amount(p.current),
            format_amount(p.after)
        ));
    }
    line
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;

    use super::*;

    fn demo_config(name: &str) -> FlowAdapterConfig {
        FlowAdapterConfig {
            pending_tx_path: std::env::temp_dir().join(format!(
                "hai-flow-wizard-{name}-{}.json",
                std::process::id()
            )),
            ..FlowAdapterConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn demo_mint_and_bridge_runs_to_completion() {
        let wizard = Wizard::from_config(demo_config("bridge")).expect("demo wizard");
        wizard
            .run(Command::MintBridge {
                deposit_wei: U256::from(1_000_000_000_000_000_000u128),
                migrate_wei: None,
                bridge_wei: None,
                no_bridge: false,
            })
            .await
            .expect("flow completes");
        assert!(!wizard.locks.is_locked(wizard.contracts.account));
    }

    #[tokio::test]
    async fn production_profile_needs_an_rpc_url() {
        let config = FlowAdapterConfig {
            runtime_profile: hai_flow_adapters::RuntimeProfile::Production,
            ..demo_config("prod")
        };
        assert!(Wizard::from_config(config).is_err());
    }

    #[tokio::test]
    async fn invalid_plan_is_reported_before_any_step() {
        let wizard = Wizard::from_config(demo_config("unstake")).expect("demo wizard");
        let err = wizard
            .run(Command::Stake {
                stake_wei: None,
                unstake_wei: Some(U256::from(5u64)),
                claim_rewards: false,
            })
            .await
            .expect_err("nothing staked");
        assert!(format!("{err:#}").contains("cannot unstake"));
    }
}
