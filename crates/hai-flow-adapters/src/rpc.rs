use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, info};

use hai_flow_core::calldata::{abi_error, encode, IERC20};
use hai_flow_core::{classify_provider_error, ChainPort, ContractCall, PortError, TxReceipt};

use crate::FlowAdapterConfig;

/// Chain access over JSON-RPC. Reads go to the node; transactions go to the
/// wallet proxy when one is configured, otherwise to the node (which must
/// then manage the sender's key).
#[derive(Debug)]
pub struct RpcChainAdapter {
    client: reqwest::Client,
    rpc_url: String,
    wallet_url: Option<String>,
    receipt_poll: Duration,
    receipt_timeout: Duration,
    next_id: AtomicU64,
}

impl RpcChainAdapter {
    pub fn new(rpc_url: impl Into<String>, config: &FlowAdapterConfig) -> Result<Self, PortError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| PortError::Transport(format!("failed to initialize rpc client: {e}")))?;
        Ok(Self {
            client,
            rpc_url: rpc_url.into(),
            wallet_url: config.wallet_proxy_url.clone(),
            receipt_poll: Duration::from_millis(config.receipt_poll_interval_ms),
            receipt_timeout: Duration::from_millis(config.receipt_timeout_ms),
            next_id: AtomicU64::new(1),
        })
    }

    /// Adapter for the configured source chain.
    pub fn with_config(config: &FlowAdapterConfig) -> Result<Self, PortError> {
        match config.rpc_url.as_ref() {
            Some(url) => Self::new(url.clone(), config),
            None if config.strict_runtime_required() => Err(PortError::Policy(
                "rpc url not configured in production runtime profile".to_owned(),
            )),
            None => Err(PortError::NotImplemented("rpc url not configured")),
        }
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    async fn request(&self, url: &str, method: &str, params: Value) -> Result<Value, PortError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, "rpc request");
        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("rpc request {method} failed: {e}")))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| PortError::Transport(format!("rpc json decode failed: {e}")))?;
        if !status.is_success() {
            return Err(PortError::Transport(format!("rpc status {status}: {body}")));
        }
        if let Some(err) = body.get("error") {
            let code = err.get("code").and_then(Value::as_i64);
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(classify_provider_error(code, message));
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| PortError::Transport(format!("rpc {method} missing result")))
    }

    async fn eth_call(&self, to: Address, data: Bytes) -> Result<Bytes, PortError> {
        let result = self
            .request(
                &self.rpc_url,
                "eth_call",
                json!([{ "to": to, "data": data }, "latest"]),
            )
            .await?;
        let raw = result
            .as_str()
            .ok_or_else(|| PortError::Transport("eth_call must return hex data".to_owned()))?;
        raw.parse()
            .map_err(|e| PortError::Validation(format!("invalid eth_call result: {e}")))
    }
}

#[async_trait]
impl ChainPort for RpcChainAdapter {
    async fn chain_id(&self) -> Result<u64, PortError> {
        let result = self
            .request(&self.rpc_url, "eth_chainId", json!([]))
            .await?;
        json_quantity_to_u64(&result)
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, PortError> {
        let out = self
            .eth_call(token, encode(&IERC20::balanceOfCall { owner }))
            .await?;
        IERC20::balanceOfCall::abi_decode_returns(&out, true)
            .map(|r| r.balance)
            .map_err(abi_error)
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, PortError> {
        let out = self
            .eth_call(token, encode(&IERC20::allowanceCall { owner, spender }))
            .await?;
        IERC20::allowanceCall::abi_decode_returns(&out, true)
            .map(|r| r.remaining)
            .map_err(abi_error)
    }

    async fn send_transaction(
        &self,
        from: Address,
        call: &ContractCall,
    ) -> Result<B256, PortError> {
        let url = self.wallet_url.as_deref().unwrap_or(&self.rpc_url);
        let tx = json!({
            "from": from,
            "to": call.to,
            "data": call.data,
            "value": call.value,
        });
        let result = self
            .request(url, "eth_sendTransaction", json!([tx]))
            .await?;
        let hash = result.as_str().ok_or_else(|| {
            PortError::Transport("eth_sendTransaction must return hash".to_owned())
        })?;
        let parsed: B256 = hash
            .parse()
            .map_err(|e| PortError::Validation(format!("invalid tx hash: {e}")))?;
        info!(tx_hash = %parsed, call = %call.description, "transaction submitted");
        Ok(parsed)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TxReceipt, PortError> {
        let deadline = Instant::now() + self.receipt_timeout;
        loop {
            let result = self
                .request(&self.rpc_url, "eth_getTransactionReceipt", json!([tx_hash]))
                .await?;
            if !result.is_null() {
                return parse_receipt(tx_hash, &result);
            }
            if Instant::now() >= deadline {
                return Err(PortError::NotFound(format!(
                    "no receipt for {tx_hash} within {} ms",
                    self.receipt_timeout.as_millis()
                )));
            }
            tokio::time::sleep(self.receipt_poll).await;
        }
    }
}

fn parse_receipt(tx_hash: B256, value: &Value) -> Result<TxReceipt, PortError> {
    let status = value
        .get("status")
        .ok_or_else(|| PortError::Transport("receipt missing status".to_owned()))?;
    let block_number = match value.get("blockNumber") {
        Some(Value::Null) | None => None,
        Some(n) => Some(json_quantity_to_u64(n)?),
    };
    Ok(TxReceipt {
        tx_hash,
        block_number,
        success: json_quantity_to_u64(status)? == 1,
    })
}

fn json_quantity_to_u64(value: &Value) -> Result<u64, PortError> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    let s = value
        .as_str()
        .ok_or_else(|| PortError::Validation("quantity must be string or number".to_owned()))?;
    parse_quantity(s)
}

fn parse_quantity(raw: &str) -> Result<u64, PortError> {
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
            .map_err(|e| PortError::Validation(format!("invalid hex quantity {raw}: {e}")))
    } else {
        raw.parse()
            .map_err(|e| PortError::Validation(format!("invalid quantity {raw}: {e}")))
    }
}
