use alloy::primitives::{Address, B256};

use crate::FlowAdapterConfig;

/// Links shown next to a confirmed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorerLinks {
    explorer_base: String,
    bridge_base: String,
}

impl ExplorerLinks {
    pub fn new(explorer_base: impl Into<String>, bridge_base: impl Into<String>) -> Self {
        Self {
            explorer_base: explorer_base.into().trim_end_matches('/').to_owned(),
            bridge_base: bridge_base.into().trim_end_matches('/').to_owned(),
        }
    }

    pub fn from_config(config: &FlowAdapterConfig) -> Self {
        Self::new(
            config.explorer_base_url.clone(),
            config.bridge_explorer_base_url.clone(),
        )
    }

    pub fn tx_url(&self, tx_hash: B256) -> String {
        format!("{}/tx/{tx_hash}", self.explorer_base)
    }

    pub fn address_url(&self, address: Address) -> String {
        format!("{}/address/{address}", self.explorer_base)
    }

    /// Cross-chain message page for the bridge transaction on the source chain.
    pub fn bridge_message_url(&self, tx_hash: B256) -> String {
        format!("{}/tx/{tx_hash}", self.bridge_base)
    }
}
