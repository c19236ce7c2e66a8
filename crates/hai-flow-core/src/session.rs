use std::sync::Arc;

use tracing::info;

use crate::close::FlowScope;
use crate::domain::StepKey;
use crate::lock::AccountLocks;
use crate::plans::{prepare, FlowContext, Plan};
use crate::ports::ClockPort;
use crate::sequencer::{Sequencer, SequencerError};
use crate::snapshot::FlowSnapshot;

/// One open flow: the account lock, the snapshot the steps were built
/// from, and the sequencer. Closing the session stops any delivery wait and
/// discards late results; transactions already submitted are not recalled.
pub struct FlowSession<K: StepKey> {
    scope: FlowScope,
    sequencer: Arc<Sequencer<K>>,
    snapshot: FlowSnapshot,
}

impl<K: StepKey> FlowSession<K> {
    pub async fn open<P>(
        plan: &P,
        ctx: &FlowContext,
        locks: &AccountLocks,
        clock: Arc<dyn ClockPort>,
    ) -> Result<Self, SequencerError>
    where
        P: Plan<Key = K>,
    {
        let guard = locks.try_acquire(ctx.owner, plan.name())?;
        let (steps, snapshot) = prepare(plan, ctx).await?;
        let scope = FlowScope::new();
        let mut sequencer = Sequencer::new(steps, clock)?
            .with_close_signal(scope.signal())
            .with_account_lock(guard);
        if let Some(read_model) = ctx.read_model.as_ref() {
            sequencer = sequencer.with_read_model(Arc::clone(read_model));
        }
        info!(
            flow = plan.name(),
            owner = %ctx.owner,
            steps = sequencer.len(),
            "flow opened"
        );
        Ok(Self {
            scope,
            sequencer: Arc::new(sequencer),
            snapshot,
        })
    }

    pub fn sequencer(&self) -> &Arc<Sequencer<K>> {
        &self.sequencer
    }

    pub fn snapshot(&self) -> &FlowSnapshot {
        &self.snapshot
    }

    /// Stops any delivery wait and discards late results. The account lock
    /// belongs to the sequencer and is released once the last clone of
    /// `sequencer()` is dropped.
    pub fn close(self) {
        self.scope.close();
        info!(complete = self.sequencer.is_complete(), "flow closed");
    }
}
