mod common;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use alloy::sol_types::SolCall;

use common::{owner_address, temp_path, TestClock};
use hai_flow_adapters::{MemoryChainAdapter, PendingTxStore};
use hai_flow_core::calldata::{encode, IProxyRegistry, IWrappedToken};
use hai_flow_core::{
    AccountLocks, BridgeRoute, ChainPort, DeliveryOutcome, DeliveryPoller, FlowContext,
    FlowSession, MintBridgeContracts, MintBridgePlan, MintBridgeStep, PendingTxPort, PortError,
    ProxyPlan, ProxyStep, Sequencer, SequencerError,
};

const BASE: u8 = 0xb1;
const WRAPPED: u8 = 0xc1;
const DEST_TOKEN: u8 = 0xd1;

fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

fn plan(destination: Arc<MemoryChainAdapter>, deposit: u64) -> MintBridgePlan {
    MintBridgePlan {
        contracts: MintBridgeContracts {
            base_token: addr(BASE),
            v1_token: addr(0xb2),
            wrapped_token: addr(WRAPPED),
            base_symbol: "KITE".to_owned(),
            wrapped_symbol: "haiKITE".to_owned(),
        },
        deposit_base_wei: Some(U256::from(deposit)),
        migrate_v1_wei: None,
        bridge_amount: None,
        route: Some(BridgeRoute {
            destination_eid: 30_110,
            recipient: owner_address(),
            destination_chain: destination,
            destination_token: addr(DEST_TOKEN),
        }),
    }
}

fn poller() -> DeliveryPoller {
    DeliveryPoller::new(Duration::from_secs(5), Duration::from_secs(600))
}

#[tokio::test(start_paused = true)]
async fn mint_and_bridge_lands_on_the_destination_ledger() {
    let source = MemoryChainAdapter::new(10);
    let destination = MemoryChainAdapter::new(252);
    source
        .link_bridge(
            addr(WRAPPED),
            Arc::clone(&destination),
            addr(DEST_TOKEN),
            Duration::from_secs(42),
        )
        .expect("link bridge");
    destination
        .set_balance(addr(DEST_TOKEN), owner_address(), U256::from(5u64))
        .expect("seed destination");

    let ctx = FlowContext::new(source.clone(), owner_address()).with_poller(poller());
    let locks = AccountLocks::new();
    let session = FlowSession::open(
        &plan(Arc::clone(&destination), 1_000),
        &ctx,
        &locks,
        Arc::new(TestClock::default()),
    )
    .await
    .expect("open");
    let seq = Arc::clone(session.sequencer());
    assert_eq!(
        seq.keys(),
        vec![
            MintBridgeStep::ApproveBase,
            MintBridgeStep::Mint,
            MintBridgeStep::Bridge,
            MintBridgeStep::Delivery
        ]
    );

    let outcomes = seq.run_to_completion().await.expect("flow completes");

    assert_eq!(outcomes.len(), 3);
    assert_eq!(
        outcomes[2].delivery,
        Some(DeliveryOutcome::Delivered {
            observed: U256::from(1_005u64),
            attempts: 9
        })
    );
    assert!(seq.done().values().all(|d| *d));
    assert_eq!(seq.done().len(), 4);

    assert_eq!(
        source
            .allowance(addr(BASE), owner_address(), addr(WRAPPED))
            .await
            .expect("allowance"),
        U256::from(1_000u64)
    );
    assert_eq!(
        source
            .balance_of(addr(WRAPPED), owner_address())
            .await
            .expect("wrapped balance"),
        U256::ZERO
    );
    let sent = source.sent().expect("sent");
    assert_eq!(sent.len(), 3);
    assert_eq!(
        sent[2].call.data[..4],
        IWrappedToken::bridgeCall::SELECTOR
    );

    session.close();
}

#[tokio::test(start_paused = true)]
async fn rejected_mint_is_retried_without_losing_the_approval() {
    let source = MemoryChainAdapter::new(10);
    let destination = MemoryChainAdapter::new(252);
    let ctx = FlowContext::new(source.clone(), owner_address()).with_poller(poller());
    let mut no_route = plan(destination, 1_000);
    no_route.route = None;

    let (steps, _) = hai_flow_core::prepare(&no_route, &ctx).await.expect("plan");
    let seq = Sequencer::new(steps, Arc::new(TestClock::default())).expect("sequencer");

    seq.run_current_step().await.expect("approve");
    source
        .fail_next(PortError::UserRejected("User denied transaction signature".to_owned()))
        .expect("script failure");
    let err = seq.run_current_step().await.expect_err("mint rejected");
    assert!(matches!(err, SequencerError::Step { step: "mint", .. }));
    assert!(seq.is_done(MintBridgeStep::ApproveBase));
    assert!(!seq.is_done(MintBridgeStep::Mint));

    seq.run_current_step().await.expect("mint retried");
    assert!(seq.is_complete());
    assert_eq!(
        source
            .balance_of(addr(WRAPPED), owner_address())
            .await
            .expect("balance"),
        U256::from(1_000u64)
    );
}

#[tokio::test]
async fn proxy_creation_resumes_a_remembered_hash() {
    let chain = MemoryChainAdapter::new(10);
    let path = temp_path("proxy-resume");
    let store = Arc::new(PendingTxStore::new(&path));

    let submitted = chain
        .send_transaction(
            owner_address(),
            &hai_flow_core::ContractCall::new(
                addr(0xee),
                encode(&IProxyRegistry::buildCall {}),
                "Create proxy",
            ),
        )
        .await
        .expect("earlier submission");
    store
        .remember(submitted, owner_address())
        .expect("remembered before restart");

    let ctx = FlowContext::new(chain.clone(), owner_address()).with_pending_tx(store.clone());
    let (steps, _) = hai_flow_core::prepare(
        &ProxyPlan {
            registry: addr(0xee),
            existing_proxy: None,
        },
        &ctx,
    )
    .await
    .expect("plan");
    let seq = Sequencer::new(steps, Arc::new(TestClock::default())).expect("sequencer");

    let outcome = seq.run_current_step().await.expect("resumed");

    assert_eq!(outcome.key, ProxyStep::Build);
    assert_eq!(outcome.receipt.tx_hash, Some(submitted));
    assert_eq!(chain.sent().expect("sent").len(), 1, "no second submission");
    assert_eq!(store.load(owner_address()).expect("load"), None);
    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn dropped_remembered_hash_is_cleared_and_resubmitted() {
    let chain = MemoryChainAdapter::new(10);
    let path = temp_path("proxy-dropped");
    let store = Arc::new(PendingTxStore::new(&path));
    let dropped = B256::repeat_byte(0xde);
    store
        .remember(dropped, owner_address())
        .expect("remembered before restart");

    let ctx = FlowContext::new(chain.clone(), owner_address()).with_pending_tx(store.clone());
    let (steps, _) = hai_flow_core::prepare(
        &ProxyPlan {
            registry: addr(0xee),
            existing_proxy: None,
        },
        &ctx,
    )
    .await
    .expect("plan");
    let seq = Sequencer::new(steps, Arc::new(TestClock::default())).expect("sequencer");

    let err = seq.run_current_step().await.expect_err("dropped hash has no receipt");
    assert!(matches!(
        err,
        SequencerError::Step {
            step: "build_proxy",
            source: PortError::NotFound(_),
        }
    ));
    assert_eq!(store.load(owner_address()).expect("load"), None);
    assert!(chain.sent().expect("sent").is_empty());

    let outcome = seq.run_current_step().await.expect("fresh submission");
    let sent = chain.sent().expect("sent");
    assert_eq!(sent.len(), 1);
    assert_eq!(outcome.receipt.tx_hash, Some(sent[0].tx_hash));
    assert_ne!(sent[0].tx_hash, dropped);
    assert!(seq.is_complete());
    assert_eq!(store.load(owner_address()).expect("load"), None);
    let _ = fs::remove_file(&path);
}
