mod common;

use std::time::Duration;

use common::{fast_poller, wei, ScriptedSource};
use hai_flow_core::{
    CloseSignal, DeliveryOutcome, DeliveryPoller, DeliveryWatch, FlowScope, PollSample, PortError,
};

#[tokio::test(start_paused = true)]
async fn delivery_is_reported_once_value_exceeds_baseline() {
    let source = ScriptedSource::of(&[100, 100, 150]);
    let mut samples = Vec::new();

    let outcome = fast_poller()
        .wait(
            wei(100),
            source.as_ref(),
            &CloseSignal::never(),
            &mut |s: &PollSample| samples.push(s.clone()),
        )
        .await;

    assert_eq!(
        outcome,
        DeliveryOutcome::Delivered {
            observed: wei(150),
            attempts: 3
        }
    );
    assert_eq!(samples.len(), 3);
    assert_eq!(samples[0].elapsed, Duration::from_secs(1));
    assert_eq!(samples[2].observed, Some(wei(150)));
}

#[tokio::test(start_paused = true)]
async fn equal_or_lower_values_never_count_as_delivery() {
    let source = ScriptedSource::of(&[100, 90, 100]);
    let started = tokio::time::Instant::now();

    let outcome = fast_poller()
        .wait(
            wei(100),
            source.as_ref(),
            &CloseSignal::never(),
            &mut |_: &PollSample| {},
        )
        .await;

    match outcome {
        DeliveryOutcome::TimedOut {
            last_observed,
            attempts,
        } => {
            assert_eq!(last_observed, Some(wei(100)));
            assert!(attempts >= 9, "polled until the deadline, got {attempts}");
            assert!(started.elapsed() >= Duration::from_secs(10));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn read_errors_are_skipped_not_fatal() {
    let source = ScriptedSource::new(vec![
        Err(PortError::Transport("rpc down".to_owned())),
        Err(PortError::Transport("rpc down".to_owned())),
        Ok(wei(11)),
    ]);
    let mut samples = Vec::new();

    let outcome = fast_poller()
        .wait(
            wei(10),
            source.as_ref(),
            &CloseSignal::never(),
            &mut |s: &PollSample| samples.push(s.clone()),
        )
        .await;

    assert_eq!(
        outcome,
        DeliveryOutcome::Delivered {
            observed: wei(11),
            attempts: 3
        }
    );
    assert_eq!(samples[0].observed, None);
    assert_eq!(samples[1].observed, None);
}

#[tokio::test(start_paused = true)]
async fn closing_the_scope_stops_polling() {
    let scope = FlowScope::new();
    let close = scope.signal();
    let source = ScriptedSource::of(&[1]);
    let mut samples = Vec::new();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        scope.close();
    });

    let poller = DeliveryPoller::new(Duration::from_secs(1), Duration::from_secs(600));
    let outcome = poller
        .wait(
            wei(1),
            source.as_ref(),
            &close,
            &mut |s: &PollSample| samples.push(s.clone()),
        )
        .await;

    assert_eq!(outcome, DeliveryOutcome::Cancelled);
    assert_eq!(samples.len(), 2);

    // No further samples arrive after cancellation.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(samples.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn already_closed_scope_cancels_before_first_sample() {
    let scope = FlowScope::new();
    scope.close();
    let mut count = 0u32;

    let outcome = fast_poller()
        .wait(
            wei(0),
            ScriptedSource::of(&[5]).as_ref(),
            &scope.signal(),
            &mut |_: &PollSample| count += 1,
        )
        .await;

    assert_eq!(outcome, DeliveryOutcome::Cancelled);
    assert_eq!(count, 0);
}

#[tokio::test(start_paused = true)]
async fn watch_captures_missing_baseline_on_wait() {
    let watch = DeliveryWatch::new(ScriptedSource::of(&[40, 40, 41]), fast_poller());
    assert_eq!(watch.baseline(), None);

    let outcome = watch
        .wait(&CloseSignal::never(), &mut |_: &PollSample| {})
        .await
        .expect("baseline read succeeds");

    assert_eq!(watch.baseline(), Some(wei(40)));
    assert!(outcome.is_delivered());
}

#[tokio::test(start_paused = true)]
async fn watch_propagates_baseline_read_failure() {
    let source = ScriptedSource::new(vec![Err(PortError::Transport("rpc down".to_owned()))]);
    let watch = DeliveryWatch::new(source, fast_poller());

    let err = watch
        .wait(&CloseSignal::never(), &mut |_: &PollSample| {})
        .await
        .expect_err("no baseline");
    assert!(matches!(err, PortError::Transport(_)));
    assert_eq!(watch.baseline(), None);
}

#[test]
fn default_poller_uses_five_second_interval_and_ten_minute_timeout() {
    let poller = DeliveryPoller::default();
    assert_eq!(poller.interval, Duration::from_millis(5_000));
    assert_eq!(poller.timeout, Duration::from_millis(600_000));
}
