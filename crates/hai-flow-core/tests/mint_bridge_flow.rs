mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{addr, clock, fast_poller, owner, wei, MockChain};
use hai_flow_core::{
    AccountLocks, BridgeRoute, DeliveryOutcome, FlowContext, FlowSession, MintBridgeContracts,
    MintBridgePlan, MintBridgeStep, PortError, SequencerError, StepStatus,
};

const DEST_TOKEN: u8 = 0xd1;

fn plan(destination: Arc<MockChain>) -> MintBridgePlan {
    MintBridgePlan {
        contracts: MintBridgeContracts {
            base_token: addr(0xb1),
            v1_token: addr(0xb2),
            wrapped_token: addr(0xc1),
            base_symbol: "KITE".to_owned(),
            wrapped_symbol: "haiKITE".to_owned(),
        },
        deposit_base_wei: Some(wei(1_000)),
        migrate_v1_wei: None,
        bridge_amount: None,
        route: Some(BridgeRoute {
            destination_eid: 30_110,
            recipient: owner(),
            destination_chain: destination,
            destination_token: addr(DEST_TOKEN),
        }),
    }
}

#[tokio::test(start_paused = true)]
async fn approve_mint_bridge_then_observe_delivery() {
    let source = MockChain::new();
    let destination = MockChain::new();
    let locks = AccountLocks::new();
    let ctx = FlowContext::new(source.clone(), owner()).with_poller(fast_poller());

    let session = FlowSession::open(&plan(destination.clone()), &ctx, &locks, clock())
        .await
        .expect("session opens");
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

    seq.run_current_step().await.expect("approve");
    seq.run_current_step().await.expect("mint");
    assert_eq!(seq.current_index(), 2);

    let credit = tokio::spawn({
        let destination = destination.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(6_500)).await;
            destination.set_balance(addr(DEST_TOKEN), owner(), wei(1_000));
        }
    });

    let outcome = seq.run_current_step().await.expect("bridge and delivery");
    credit.await.expect("credit task");

    assert_eq!(outcome.key, MintBridgeStep::Bridge);
    assert!(outcome.complete);
    assert!(matches!(
        outcome.delivery,
        Some(DeliveryOutcome::Delivered { observed, .. }) if observed == wei(1_000)
    ));
    let done = seq.done();
    assert_eq!(done.len(), 4);
    assert!(done.values().all(|d| *d));
    assert!(seq
        .steps()
        .iter()
        .all(|s| s.status == StepStatus::Done));
    assert_eq!(source.sent().len(), 3);
    assert!(destination.sent().is_empty());

    session.close();
    drop(seq);
    assert!(!locks.is_locked(owner()));
}

#[tokio::test(start_paused = true)]
async fn rejected_bridge_can_be_retried() {
    let source = MockChain::new();
    source.set_allowance(addr(0xb1), owner(), addr(0xc1), wei(1_000));
    let destination = MockChain::new();
    let locks = AccountLocks::new();
    let ctx = FlowContext::new(source.clone(), owner()).with_poller(fast_poller());

    let session = FlowSession::open(&plan(destination.clone()), &ctx, &locks, clock())
        .await
        .expect("session opens");
    let seq = session.sequencer();
    seq.run_current_step().await.expect("mint");

    source.fail_next_send(PortError::UserRejected("User denied transaction".to_owned()));
    let err = seq.run_current_step().await.expect_err("bridge rejected");
    assert!(matches!(err, SequencerError::Step { step: "bridge", .. }));
    assert_eq!(seq.current_index(), 1);
    assert!(!seq.is_done(MintBridgeStep::Delivery));

    destination.set_balance(addr(DEST_TOKEN), owner(), wei(50));
    let credit = tokio::spawn({
        let destination = destination.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(2_500)).await;
            destination.set_balance(addr(DEST_TOKEN), owner(), wei(1_050));
        }
    });
    let outcome = seq.run_current_step().await.expect("retry succeeds");
    credit.await.expect("credit task");
    assert!(outcome.delivery.is_some_and(|d| d.is_delivered()));
    assert!(seq.is_complete());
}
