//! Bounded polling for out-of-band arrivals (bridged balances).
//!
//! There is no push notification for cross-chain delivery, so the poller
//! samples a `BalanceSource` on a fixed interval until the observed value
//! rises above the baseline captured before the triggering transaction, the
//! timeout elapses, or the owning scope closes. The three endings are
//! reported as distinct `DeliveryOutcome` variants.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::close::CloseSignal;
use crate::domain::DeliveryOutcome;
use crate::ports::{ChainPort, PortError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5_000);
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_millis(600_000);

#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn observe(&self) -> Result<U256, PortError>;
}

/// `balanceOf(owner)` on a token, read through any chain port.
pub struct TokenBalanceSource {
    chain: Arc<dyn ChainPort>,
    token: Address,
    owner: Address,
}

impl TokenBalanceSource {
    pub fn new(chain: Arc<dyn ChainPort>, token: Address, owner: Address) -> Self {
        Self {
            chain,
            token,
            owner,
        }
    }
}

#[async_trait]
impl BalanceSource for TokenBalanceSource {
    async fn observe(&self) -> Result<U256, PortError> {
        self.chain.balance_of(self.token, self.owner).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSample {
    pub attempt: u32,
    pub observed: Option<U256>,
    pub elapsed: Duration,
}

/// Receives every completed sample. Never called once the scope is closed.
pub trait PollObserver: Send {
    fn on_sample(&mut self, sample: &PollSample);
}

impl<F> PollObserver for F
where
    F: FnMut(&PollSample) + Send,
{
    fn on_sample(&mut self, sample: &PollSample) {
        self(sample)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPoller {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for DeliveryPoller {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }
}

impl DeliveryPoller {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Samples `source` every interval (first sample one interval after the
    /// call) until it exceeds `baseline`.
    pub async fn wait<S>(
        &self,
        baseline: U256,
        source: &S,
        close: &CloseSignal,
        observer: &mut dyn PollObserver,
    ) -> DeliveryOutcome
    where
        S: BalanceSource + ?Sized,
    {
        let start = Instant::now();
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);
        let mut ticker = interval_at(start + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut close = close.clone();
        let mut attempts = 0u32;
        let mut last_observed = None;

        debug!(
            %baseline,
            interval_ms = self.interval.as_millis() as u64,
            timeout_ms = self.timeout.as_millis() as u64,
            "delivery poll started"
        );

        loop {
            tokio::select! {
                biased;
                _ = close.closed() => {
                    debug!(attempts, "delivery poll cancelled");
                    return DeliveryOutcome::Cancelled;
                }
                _ = ticker.tick() => {
                    if close.is_closed() {
                        return DeliveryOutcome::Cancelled;
                    }
                    attempts = attempts.saturating_add(1);
                    let observed = match source.observe().await {
                        Ok(value) => Some(value),
                        Err(e) => {
                            warn!(attempt = attempts, error = %e, "delivery poll read failed");
                            None
                        }
                    };
                    // The read may have outlived the scope; drop the tick if so.
                    if close.is_closed() {
                        return DeliveryOutcome::Cancelled;
                    }
                    let sample = PollSample {
                        attempt: attempts,
                        observed,
                        elapsed: start.elapsed(),
                    };
                    observer.on_sample(&sample);
                    if let Some(value) = observed {
                        last_observed = Some(value);
                        if value > baseline {
                            info!(%baseline, observed = %value, attempts, "delivery observed");
                            return DeliveryOutcome::Delivered { observed: value, attempts };
                        }
                    }
                }
                _ = &mut deadline => {
                    warn!(attempts, timeout_ms = self.timeout.as_millis() as u64, "delivery poll timed out");
                    return DeliveryOutcome::TimedOut { last_observed, attempts };
                }
            }
        }
    }
}

/// Delivery stage attached to a sequence: which balance to watch and the
/// baseline captured right before the triggering step.
pub struct DeliveryWatch {
    source: Arc<dyn BalanceSource>,
    poller: DeliveryPoller,
    baseline: Mutex<Option<U256>>,
}

impl DeliveryWatch {
    pub fn new(source: Arc<dyn BalanceSource>, poller: DeliveryPoller) -> Self {
        Self {
            source,
            poller,
            baseline: Mutex::new(None),
        }
    }

    pub fn poller(&self) -> DeliveryPoller {
        self.poller
    }

    pub fn baseline(&self) -> Option<U256> {
        *self.baseline.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn capture_baseline(&self) -> Result<U256, PortError> {
        let value = self.source.observe().await?;
        *self.baseline.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
        debug!(baseline = %value, "delivery baseline captured");
        Ok(value)
    }

    pub async fn wait(
        &self,
        close: &CloseSignal,
        observer: &mut dyn PollObserver,
    ) -> Result<DeliveryOutcome, PortError> {
        let baseline = match self.baseline() {
            Some(value) => value,
            None => self.capture_baseline().await?,
        };
        Ok(self
            .poller
            .wait(baseline, self.source.as_ref(), close, observer)
            .await)
    }
}
