//! Drives an ordered list of steps one confirmed action at a time.
//!
//! The step list is fixed at construction. `run_current_step` executes the
//! step under the cursor; a step is marked done only after its operation
//! returns `Ok`, and a failed attempt leaves the cursor and the done map
//! exactly as they were so the same step can be retried. A transaction step
//! followed by a delivery step captures the delivery baseline before it
//! submits and then waits for delivery within the same call.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::close::CloseSignal;
use crate::domain::{DeliveryOutcome, StepKey, StepReceipt, StepView, TimestampMs, TransitionRecord};
use crate::lock::AccountLockGuard;
use crate::poller::{DeliveryWatch, PollSample};
use crate::ports::{ClockPort, PortError, ReadModelPort};
use crate::state_machine::{step_transition, StateTransition, StepAction, StepStatus};
use crate::status::StatusMessage;
use crate::step::{validate_steps, Step, StepKind, StepOperation};

#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("sequence already complete")]
    AlreadyComplete,
    #[error("step {0} is already in flight")]
    StepInFlight(&'static str),
    #[error("flow closed")]
    Closed,
    #[error("step {step} failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: PortError,
    },
    #[error(transparent)]
    Port(#[from] PortError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome<K> {
    pub key: K,
    pub receipt: StepReceipt,
    /// Set when the step handed off to a delivery wait.
    pub delivery: Option<DeliveryOutcome>,
    pub complete: bool,
}

#[derive(Debug)]
struct SequenceState<K> {
    current_index: usize,
    statuses: Vec<StepStatus>,
    done: BTreeMap<K, bool>,
    pending: bool,
    complete: bool,
    last_status: Option<StatusMessage>,
    last_sample: Option<PollSample>,
    delivery_outcome: Option<DeliveryOutcome>,
    receipts: BTreeMap<K, StepReceipt>,
    log: Vec<TransitionRecord>,
}

pub struct Sequencer<K: StepKey> {
    steps: Vec<Step<K>>,
    state: Mutex<SequenceState<K>>,
    clock: Arc<dyn ClockPort>,
    read_models: Vec<Arc<dyn ReadModelPort>>,
    close: CloseSignal,
    _account_lock: Option<AccountLockGuard>,
}

impl<K: StepKey> Sequencer<K> {
    pub fn new(steps: Vec<Step<K>>, clock: Arc<dyn ClockPort>) -> Result<Self, SequencerError> {
        validate_steps(&steps)?;
        let state = SequenceState {
            current_index: 0,
            statuses: vec![StepStatus::Waiting; steps.len()],
            done: BTreeMap::new(),
            pending: false,
            complete: steps.is_empty(),
            last_status: None,
            last_sample: None,
            delivery_outcome: None,
            receipts: BTreeMap::new(),
            log: Vec::new(),
        };
        Ok(Self {
            steps,
            state: Mutex::new(state),
            clock,
            read_models: Vec::new(),
            close: CloseSignal::never(),
            _account_lock: None,
        })
    }

    /// Re-queried after every successful step.
    pub fn with_read_model(mut self, read_model: Arc<dyn ReadModelPort>) -> Self {
        self.read_models.push(read_model);
        self
    }

    pub fn with_close_signal(mut self, close: CloseSignal) -> Self {
        self.close = close;
        self
    }

    /// Held for the sequencer's lifetime.
    pub fn with_account_lock(mut self, guard: AccountLockGuard) -> Self {
        self._account_lock = Some(guard);
        self
    }

    fn state(&self) -> MutexGuard<'_, SequenceState<K>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn keys(&self) -> Vec<K> {
        self.steps.iter().map(|s| s.key).collect()
    }

    pub fn current_index(&self) -> usize {
        self.state().current_index
    }

    pub fn is_pending(&self) -> bool {
        self.state().pending
    }

    pub fn is_complete(&self) -> bool {
        self.state().complete
    }

    pub fn done(&self) -> BTreeMap<K, bool> {
        self.state().done.clone()
    }

    pub fn is_done(&self, key: K) -> bool {
        self.state().done.get(&key).copied().unwrap_or(false)
    }

    pub fn last_status(&self) -> Option<StatusMessage> {
        self.state().last_status.clone()
    }

    pub fn last_sample(&self) -> Option<PollSample> {
        self.state().last_sample.clone()
    }

    pub fn delivery_outcome(&self) -> Option<DeliveryOutcome> {
        self.state().delivery_outcome.clone()
    }

    pub fn receipt(&self, key: K) -> Option<StepReceipt> {
        self.state().receipts.get(&key).cloned()
    }

    pub fn transition_log(&self) -> Vec<TransitionRecord> {
        self.state().log.clone()
    }

    pub fn steps(&self) -> Vec<StepView<K>> {
        let state = self.state();
        self.steps
            .iter()
            .enumerate()
            .map(|(index, step)| view(index, step, state.statuses[index]))
            .collect()
    }

    pub fn current_step(&self) -> Option<StepView<K>> {
        let state = self.state();
        if state.complete {
            return None;
        }
        let index = state.current_index;
        self.steps
            .get(index)
            .map(|step| view(index, step, state.statuses[index]))
    }

    pub async fn run_current_step(&self) -> Result<StepOutcome<K>, SequencerError> {
        let index = self.begin()?;
        match &self.steps[index].kind {
            StepKind::Transaction(op) => self.run_transaction(index, Arc::clone(op)).await,
            StepKind::Delivery(watch) => self.await_delivery(index, Arc::clone(watch)).await,
        }
    }

    /// Runs every remaining step in order, stopping at the first failure.
    pub async fn run_to_completion(&self) -> Result<Vec<StepOutcome<K>>, SequencerError> {
        let mut outcomes = Vec::new();
        while !self.is_complete() {
            outcomes.push(self.run_current_step().await?);
        }
        Ok(outcomes)
    }

    fn begin(&self) -> Result<usize, SequencerError> {
        if self.close.is_closed() {
            return Err(SequencerError::Closed);
        }
        let mut state = self.state();
        if state.complete {
            return Err(SequencerError::AlreadyComplete);
        }
        let index = state.current_index;
        let key = self.steps[index].key;
        if state.pending {
            return Err(SequencerError::StepInFlight(key.as_str()));
        }
        let (to, transition) = step_transition(state.statuses[index], StepAction::Start)?;
        state.statuses[index] = to;
        state.pending = true;
        state.last_status = None;
        self.record(&mut state, key, &transition, None);
        debug!(step = key.as_str(), index, "step started");
        Ok(index)
    }

    async fn run_transaction(
        &self,
        index: usize,
        op: Arc<dyn StepOperation>,
    ) -> Result<StepOutcome<K>, SequencerError> {
        let key = self.steps[index].key;
        let delivery = self.delivery_after(index);

        let result = async {
            if let Some(watch) = delivery.as_ref() {
                watch.capture_baseline().await?;
            }
            op.run().await
        }
        .await;

        if self.close.is_closed() {
            debug!(step = key.as_str(), "flow closed while step was in flight");
            return Err(SequencerError::Closed);
        }

        let receipt = match result {
            Ok(receipt) => receipt,
            Err(e) => {
                self.fail(index, &e)?;
                return Err(SequencerError::Step {
                    step: key.as_str(),
                    source: e,
                });
            }
        };

        self.succeed(index, receipt.clone(), None)?;
        self.refresh_read_models().await;
        if self.close.is_closed() {
            return Err(SequencerError::Closed);
        }
        let complete = self.advance(index, delivery.is_some())?;
        info!(step = key.as_str(), index, complete, "step done");

        let mut outcome = StepOutcome {
            key,
            receipt,
            delivery: None,
            complete,
        };
        if let (Some(watch), false) = (delivery, complete) {
            let delivered = self.await_delivery(index + 1, watch).await?;
            outcome.delivery = delivered.delivery;
            outcome.complete = delivered.complete;
        }
        Ok(outcome)
    }

    async fn await_delivery(
        &self,
        index: usize,
        watch: Arc<DeliveryWatch>,
    ) -> Result<StepOutcome<K>, SequencerError> {
        let key = self.steps[index].key;
        let mut observer = |sample: &PollSample| {
            self.state().last_sample = Some(sample.clone());
        };
        let result = watch.wait(&self.close, &mut observer).await;

        if self.close.is_closed() {
            return Err(SequencerError::Closed);
        }

        let outcome = match result {
            Ok(DeliveryOutcome::Cancelled) => return Err(SequencerError::Closed),
            Ok(outcome) => outcome,
            Err(e) => {
                self.fail(index, &e)?;
                return Err(SequencerError::Step {
                    step: key.as_str(),
                    source: e,
                });
            }
        };
        if let DeliveryOutcome::TimedOut { attempts, .. } = &outcome {
            warn!(step = key.as_str(), attempts, "delivery not observed before timeout");
        }

        let receipt = StepReceipt {
            delivery: Some(outcome.clone()),
            ..StepReceipt::default()
        };
        self.succeed(index, receipt.clone(), Some(outcome.clone()))?;
        self.refresh_read_models().await;
        if self.close.is_closed() {
            return Err(SequencerError::Closed);
        }
        let complete = self.advance(index, false)?;
        info!(step = key.as_str(), delivered = outcome.is_delivered(), complete, "delivery step done");
        Ok(StepOutcome {
            key,
            receipt,
            delivery: Some(outcome),
            complete,
        })
    }

    fn delivery_after(&self, index: usize) -> Option<Arc<DeliveryWatch>> {
        match self.steps.get(index + 1).map(|s| &s.kind) {
            Some(StepKind::Delivery(watch)) => Some(Arc::clone(watch)),
            _ => None,
        }
    }

    fn succeed(
        &self,
        index: usize,
        receipt: StepReceipt,
        delivery: Option<DeliveryOutcome>,
    ) -> Result<(), SequencerError> {
        let key = self.steps[index].key;
        let mut state = self.state();
        let (to, transition) = step_transition(state.statuses[index], StepAction::Succeed)?;
        state.statuses[index] = to;
        state.done.insert(key, true);
        let outcome = match (&receipt.tx_hash, &delivery) {
            (Some(hash), _) => Some(format!("tx:{hash}")),
            (None, Some(DeliveryOutcome::Delivered { observed, .. })) => {
                Some(format!("delivered:{observed}"))
            }
            (None, Some(DeliveryOutcome::TimedOut { .. })) => Some("timed_out".to_owned()),
            _ => None,
        };
        state.receipts.insert(key, receipt);
        if delivery.is_some() {
            state.delivery_outcome = delivery;
        }
        self.record(&mut state, key, &transition, outcome);
        Ok(())
    }

    fn fail(&self, index: usize, err: &PortError) -> Result<(), SequencerError> {
        let key = self.steps[index].key;
        let mut state = self.state();
        let (to, transition) = step_transition(state.statuses[index], StepAction::Fail)?;
        state.statuses[index] = to;
        state.pending = false;
        let status = StatusMessage::from_error(err);
        warn!(step = key.as_str(), error = %err, status = status.title(), "step failed");
        state.last_status = Some(status);
        self.record(&mut state, key, &transition, Some(err.to_string()));
        Ok(())
    }

    /// Moves the cursor past `index`. With `chain_delivery` the next step is
    /// started immediately and `pending` stays set.
    fn advance(&self, index: usize, chain_delivery: bool) -> Result<bool, SequencerError> {
        let mut state = self.state();
        let next = index + 1;
        state.current_index = next;
        if next >= self.steps.len() {
            state.complete = true;
            state.pending = false;
            return Ok(true);
        }
        if chain_delivery {
            let key = self.steps[next].key;
            let (to, transition) = step_transition(state.statuses[next], StepAction::Start)?;
            state.statuses[next] = to;
            self.record(&mut state, key, &transition, None);
        } else {
            state.pending = false;
        }
        Ok(false)
    }

    async fn refresh_read_models(&self) {
        for read_model in &self.read_models {
            if let Err(e) = read_model.refresh().await {
                warn!(error = %e, "read model refresh failed");
            }
        }
    }

    fn record(
        &self,
        state: &mut SequenceState<K>,
        key: K,
        transition: &StateTransition,
        outcome: Option<String>,
    ) {
        let recorded_at_ms = match self.clock.now_ms() {
            Ok(ms) => TimestampMs(ms),
            Err(e) => {
                warn!(step = key.as_str(), error = %e, "clock read failed, recording timestamp 0");
                TimestampMs(0)
            }
        };
        let event_seq = state.log.last().map(|r| r.event_seq + 1).unwrap_or(1);
        state.log.push(TransitionRecord {
            event_seq,
            step_key: key.as_str().to_owned(),
            state_before: transition.from,
            state_after: transition.to,
            reason: transition.reason.to_owned(),
            outcome,
            recorded_at_ms,
        });
    }
}

fn view<K: StepKey>(index: usize, step: &Step<K>, status: StepStatus) -> StepView<K> {
    StepView {
        index,
        key: step.key,
        label: step.label.clone(),
        kind: step.kind.tag(),
        status,
        projection: step.projection.clone(),
    }
}
