#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;

use hai_flow_core::{
    BalanceSource, ChainPort, ClockPort, ContractCall, DeliveryPoller, PortError, StepKey,
    TxReceipt,
};

#[derive(Debug, Default)]
pub struct TestClock {
    now: AtomicU64,
}

impl ClockPort for TestClock {
    fn now_ms(&self) -> Result<u64, PortError> {
        Ok(self.now.fetch_add(1, Ordering::SeqCst) + 1_739_750_400_000)
    }
}

pub fn clock() -> Arc<dyn ClockPort> {
    Arc::new(TestClock::default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    A,
    B,
    C,
}

impl StepKey for Key {
    fn as_str(&self) -> &'static str {
        match self {
            Key::A => "a",
            Key::B => "b",
            Key::C => "c",
        }
    }
}

#[derive(Debug, Default)]
struct ChainState {
    balances: BTreeMap<(Address, Address), U256>,
    allowances: BTreeMap<(Address, Address, Address), U256>,
    allowance_reads_fail: bool,
    failures: VecDeque<PortError>,
    sent: Vec<(Address, ContractCall)>,
    nonce: u8,
}

/// Chain double: balances and allowances are whatever the test sets.
#[derive(Debug, Default)]
pub struct MockChain {
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_balance(&self, token: Address, owner: Address, value: U256) {
        self.state
            .lock()
            .expect("chain lock")
            .balances
            .insert((token, owner), value);
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, value: U256) {
        self.state
            .lock()
            .expect("chain lock")
            .allowances
            .insert((token, owner, spender), value);
    }

    pub fn fail_allowance_reads(&self) {
        self.state.lock().expect("chain lock").allowance_reads_fail = true;
    }

    pub fn fail_next_send(&self, err: PortError) {
        self.state
            .lock()
            .expect("chain lock")
            .failures
            .push_back(err);
    }

    pub fn sent(&self) -> Vec<(Address, ContractCall)> {
        self.state.lock().expect("chain lock").sent.clone()
    }
}

#[async_trait]
impl ChainPort for MockChain {
    async fn chain_id(&self) -> Result<u64, PortError> {
        Ok(10)
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, PortError> {
        let g = self.state.lock().expect("chain lock");
        Ok(g.balances.get(&(token, owner)).copied().unwrap_or_default())
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, PortError> {
        let g = self.state.lock().expect("chain lock");
        if g.allowance_reads_fail {
            return Err(PortError::Transport("allowance read failed".to_owned()));
        }
        Ok(g.allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn send_transaction(
        &self,
        from: Address,
        call: &ContractCall,
    ) -> Result<B256, PortError> {
        let mut g = self.state.lock().expect("chain lock");
        if let Some(err) = g.failures.pop_front() {
            return Err(err);
        }
        g.nonce += 1;
        g.sent.push((from, call.clone()));
        Ok(B256::with_last_byte(g.nonce))
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TxReceipt, PortError> {
        Ok(TxReceipt {
            tx_hash,
            block_number: Some(100),
            success: true,
        })
    }
}

/// Returns queued values in order, then repeats the last one.
#[derive(Debug)]
pub struct ScriptedSource {
    values: Mutex<VecDeque<Result<U256, PortError>>>,
    last: Mutex<U256>,
}

impl ScriptedSource {
    pub fn new(values: Vec<Result<U256, PortError>>) -> Arc<Self> {
        Arc::new(Self {
            values: Mutex::new(values.into()),
            last: Mutex::new(U256::ZERO),
        })
    }

    pub fn of(values: &[u64]) -> Arc<Self> {
        Self::new(values.iter().map(|v| Ok(U256::from(*v))).collect())
    }
}

#[async_trait]
impl BalanceSource for ScriptedSource {
    async fn observe(&self) -> Result<U256, PortError> {
        let next = self.values.lock().expect("values lock").pop_front();
        match next {
            Some(Ok(value)) => {
                *self.last.lock().expect("last lock") = value;
                Ok(value)
            }
            Some(Err(e)) => Err(e),
            None => Ok(*self.last.lock().expect("last lock")),
        }
    }
}

pub fn fast_poller() -> DeliveryPoller {
    DeliveryPoller::new(Duration::from_secs(1), Duration::from_secs(10))
}

pub fn owner() -> Address {
    "0x1000000000000000000000000000000000000001"
        .parse()
        .expect("valid owner address")
}

pub fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

pub fn wei(value: u64) -> U256 {
    U256::from(value)
}
