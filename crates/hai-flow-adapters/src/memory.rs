//! Deterministic in-process ledger for demos and tests.
//!
//! Understands the handful of calls the flows submit: `approve` sets an
//! allowance, `depositFor`/`migrateV1` credit the called token, and `bridge`
//! debits the sender and, when a route is registered, credits the
//! destination ledger after a delay.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use alloy::primitives::{keccak256, Address, B256, U256};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use hai_flow_core::calldata::decode_call;
use hai_flow_core::calldata::IERC20::IERC20Calls;
use hai_flow_core::calldata::IWrappedToken::IWrappedTokenCalls;
use hai_flow_core::{ChainPort, ContractCall, PortError, TxReceipt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTx {
    pub tx_hash: B256,
    pub from: Address,
    pub call: ContractCall,
}

#[derive(Clone)]
struct BridgeLink {
    destination: Arc<MemoryChainAdapter>,
    destination_token: Address,
    delay: Duration,
}

#[derive(Default)]
struct Ledger {
    balances: BTreeMap<(Address, Address), U256>,
    allowances: BTreeMap<(Address, Address, Address), U256>,
    receipts: BTreeMap<B256, TxReceipt>,
    sent: Vec<SentTx>,
    failures: VecDeque<PortError>,
    bridges: BTreeMap<Address, BridgeLink>,
    nonce: u64,
    block: u64,
}

impl Ledger {
    fn credit(&mut self, token: Address, owner: Address, amount: U256) {
        let entry = self.balances.entry((token, owner)).or_default();
        *entry = entry.saturating_add(amount);
    }

    fn debit(&mut self, token: Address, owner: Address, amount: U256) -> Result<(), PortError> {
        let entry = self.balances.entry((token, owner)).or_default();
        if *entry < amount {
            return Err(PortError::Reverted(format!(
                "insufficient balance: have {entry}, need {amount}"
            )));
        }
        *entry -= amount;
        Ok(())
    }
}

pub struct MemoryChainAdapter {
    chain_id: u64,
    ledger: Mutex<Ledger>,
}

impl MemoryChainAdapter {
    pub fn new(chain_id: u64) -> Arc<Self> {
        Arc::new(Self {
            chain_id,
            ledger: Mutex::new(Ledger::default()),
        })
    }

    fn ledger(&self) -> Result<MutexGuard<'_, Ledger>, PortError> {
        self.ledger
            .lock()
            .map_err(|e| PortError::Transport(format!("ledger lock poisoned: {e}")))
    }

    pub fn set_balance(&self, token: Address, owner: Address, value: U256) -> Result<(), PortError> {
        self.ledger()?.balances.insert((token, owner), value);
        Ok(())
    }

    pub fn credit(&self, token: Address, owner: Address, amount: U256) -> Result<(), PortError> {
        self.ledger()?.credit(token, owner, amount);
        Ok(())
    }

    pub fn set_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
        value: U256,
    ) -> Result<(), PortError> {
        self.ledger()?
            .allowances
            .insert((token, owner, spender), value);
        Ok(())
    }

    /// `bridge(...)` calls on `token` land on `destination` after `delay`.
    pub fn link_bridge(
        &self,
        token: Address,
        destination: Arc<MemoryChainAdapter>,
        destination_token: Address,
        delay: Duration,
    ) -> Result<(), PortError> {
        self.ledger()?.bridges.insert(
            token,
            BridgeLink {
                destination,
                destination_token,
                delay,
            },
        );
        Ok(())
    }

    /// The next submission fails with `err` instead of executing.
    pub fn fail_next(&self, err: PortError) -> Result<(), PortError> {
        self.ledger()?.failures.push_back(err);
        Ok(())
    }

    pub fn sent(&self) -> Result<Vec<SentTx>, PortError> {
        Ok(self.ledger()?.sent.clone())
    }

    fn apply(
        &self,
        ledger: &mut Ledger,
        from: Address,
        call: &ContractCall,
    ) -> Result<Option<(BridgeLink, Address, U256)>, PortError> {
        if call.data.is_empty() {
            return Ok(None);
        }
        if let Some(IERC20Calls::approve(c)) = decode_call::<IERC20Calls>(&call.data)? {
            ledger
                .allowances
                .insert((call.to, from, c.spender), c.amount);
            return Ok(None);
        }
        match decode_call::<IWrappedTokenCalls>(&call.data)? {
            Some(IWrappedTokenCalls::depositFor(c)) => ledger.credit(call.to, c.account, c.amount),
            Some(IWrappedTokenCalls::migrateV1(c)) => ledger.credit(call.to, from, c.amount),
            Some(IWrappedTokenCalls::bridge(c)) => {
                ledger.debit(call.to, from, c.amount)?;
                if let Some(link) = ledger.bridges.get(&call.to) {
                    return Ok(Some((link.clone(), c.recipient, c.amount)));
                }
            }
            None => {}
        }
        Ok(None)
    }
}

#[async_trait]
impl ChainPort for MemoryChainAdapter {
    async fn chain_id(&self) -> Result<u64, PortError> {
        Ok(self.chain_id)
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, PortError> {
        Ok(self
            .ledger()?
            .balances
            .get(&(token, owner))
            .copied()
            .unwrap_or_default())
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, PortError> {
        Ok(self
            .ledger()?
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn send_transaction(
        &self,
        from: Address,
        call: &ContractCall,
    ) -> Result<B256, PortError> {
        let (tx_hash, bridged) = {
            let mut ledger = self.ledger()?;
            if let Some(err) = ledger.failures.pop_front() {
                debug!(error = %err, "scripted submission failure");
                return Err(err);
            }
            ledger.nonce += 1;
            let mut seed = self.chain_id.to_be_bytes().to_vec();
            seed.extend_from_slice(&ledger.nonce.to_be_bytes());
            let tx_hash = keccak256(seed);

            let (success, bridged) = match self.apply(&mut ledger, from, call) {
                Ok(bridged) => (true, bridged),
                Err(e) => {
                    debug!(error = %e, "call reverted in memory ledger");
                    (false, None)
                }
            };
            ledger.block += 1;
            let block_number = Some(ledger.block);
            ledger.receipts.insert(
                tx_hash,
                TxReceipt {
                    tx_hash,
                    block_number,
                    success,
                },
            );
            ledger.sent.push(SentTx {
                tx_hash,
                from,
                call: call.clone(),
            });
            (tx_hash, bridged)
        };

        if let Some((link, recipient, amount)) = bridged {
            info!(%tx_hash, %recipient, %amount, delay_ms = link.delay.as_millis() as u64, "bridge message queued");
            tokio::spawn(async move {
                tokio::time::sleep(link.delay).await;
                if let Err(e) = link.destination.credit(link.destination_token, recipient, amount) {
                    warn!(error = %e, "bridge delivery failed");
                }
            });
        }
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TxReceipt, PortError> {
        self.ledger()?
            .receipts
            .get(&tx_hash)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("receipt {tx_hash}")))
    }
}
