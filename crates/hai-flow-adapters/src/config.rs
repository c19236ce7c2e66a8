use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use hai_flow_core::DeliveryPoller;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeProfile {
    /// Falls back to the in-memory ledger when no RPC endpoint is set.
    #[default]
    Development,
    Production,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowAdapterConfig {
    pub runtime_profile: RuntimeProfile,
    pub rpc_url: Option<String>,
    pub destination_rpc_url: Option<String>,
    /// JSON-RPC endpoint that holds the user's keys; `eth_sendTransaction`
    /// goes here instead of `rpc_url` when set.
    pub wallet_proxy_url: Option<String>,
    pub subgraph_url: Option<String>,
    pub request_timeout_ms: u64,
    pub receipt_poll_interval_ms: u64,
    pub receipt_timeout_ms: u64,
    pub delivery_poll_interval_ms: u64,
    pub delivery_timeout_ms: u64,
    pub explorer_base_url: String,
    pub bridge_explorer_base_url: String,
    pub pending_tx_path: PathBuf,
    /// JSON file with the flow contract addresses.
    pub contracts_path: Option<PathBuf>,
}

impl Default for FlowAdapterConfig {
    fn default() -> Self {
        Self {
            runtime_profile: RuntimeProfile::Development,
            rpc_url: None,
            destination_rpc_url: None,
            wallet_proxy_url: None,
            subgraph_url: None,
            request_timeout_ms: 15_000,
            receipt_poll_interval_ms: 1_000,
            receipt_timeout_ms: 300_000,
            delivery_poll_interval_ms: 5_000,
            delivery_timeout_ms: 600_000,
            explorer_base_url: "https://optimistic.etherscan.io".to_owned(),
            bridge_explorer_base_url: "https://layerzeroscan.com".to_owned(),
            pending_tx_path: PathBuf::from("hai-flow-pending-tx.json"),
            contracts_path: None,
        }
    }
}

impl FlowAdapterConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the config from `HAI_FLOW_*` variables. Unparseable values are
    /// logged and the default is kept.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        let text = |var: &str| lookup(var).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        if let Some(raw) = text("HAI_FLOW_PROFILE") {
            match parse_profile(&raw) {
                Ok(profile) => cfg.runtime_profile = profile,
                Err(e) => warn!(error = %e, "ignoring config value"),
            }
        }
        cfg.rpc_url = text("HAI_FLOW_RPC_URL");
        cfg.destination_rpc_url = text("HAI_FLOW_DESTINATION_RPC_URL");
        cfg.wallet_proxy_url = text("HAI_FLOW_WALLET_PROXY_URL");
        cfg.subgraph_url = text("HAI_FLOW_SUBGRAPH_URL");
        if let Some(url) = text("HAI_FLOW_EXPLORER_URL") {
            cfg.explorer_base_url = url;
        }
        if let Some(url) = text("HAI_FLOW_BRIDGE_EXPLORER_URL") {
            cfg.bridge_explorer_base_url = url;
        }
        if let Some(path) = text("HAI_FLOW_PENDING_TX_PATH") {
            cfg.pending_tx_path = PathBuf::from(path);
        }
        cfg.contracts_path = text("HAI_FLOW_CONTRACTS").map(PathBuf::from);

        let millis = [
            ("HAI_FLOW_REQUEST_TIMEOUT_MS", &mut cfg.request_timeout_ms),
            ("HAI_FLOW_RECEIPT_POLL_MS", &mut cfg.receipt_poll_interval_ms),
            ("HAI_FLOW_RECEIPT_TIMEOUT_MS", &mut cfg.receipt_timeout_ms),
            ("HAI_FLOW_POLL_INTERVAL_MS", &mut cfg.delivery_poll_interval_ms),
            ("HAI_FLOW_DELIVERY_TIMEOUT_MS", &mut cfg.delivery_timeout_ms),
        ];
        for (var, slot) in millis {
            if let Some(raw) = text(var) {
                match parse_millis(var, &raw) {
                    Ok(value) => *slot = value,
                    Err(e) => warn!(error = %e, default = *slot, "ignoring config value"),
                }
            }
        }
        cfg
    }

    pub fn strict_runtime_required(&self) -> bool {
        self.runtime_profile == RuntimeProfile::Production
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn delivery_poller(&self) -> DeliveryPoller {
        DeliveryPoller::new(
            Duration::from_millis(self.delivery_poll_interval_ms),
            Duration::from_millis(self.delivery_timeout_ms),
        )
    }
}

fn parse_profile(raw: &str) -> Result<RuntimeProfile, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "development" | "dev" => Ok(RuntimeProfile::Development),
        "production" | "prod" => Ok(RuntimeProfile::Production),
        _ => Err(ConfigError::Invalid {
            var: "HAI_FLOW_PROFILE",
            value: raw.to_owned(),
            reason: "expected development or production".to_owned(),
        }),
    }
}

fn parse_millis(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        var,
        value: raw.to_owned(),
        reason,
    };
    let value: u64 = raw.parse().map_err(|e| invalid(format!("{e}")))?;
    if value == 0 {
        return Err(invalid("must be greater than zero".to_owned()));
    }
    Ok(value)
}
