use std::sync::{Mutex, PoisonError};

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use hai_flow_core::{PortError, ReadModelPort};

use crate::FlowAdapterConfig;

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// Minimal GraphQL-over-HTTP client for the protocol subgraph.
#[derive(Debug, Clone)]
pub struct SubgraphClient {
    client: reqwest::Client,
    url: String,
}

impl SubgraphClient {
    pub fn new(url: impl Into<String>, config: &FlowAdapterConfig) -> Result<Self, PortError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                PortError::Transport(format!("failed to initialize subgraph client: {e}"))
            })?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T, PortError> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("subgraph request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PortError::Transport(format!("subgraph status {status}")));
        }
        let body: GraphQlResponse<T> = response
            .json()
            .await
            .map_err(|e| PortError::Transport(format!("subgraph json decode failed: {e}")))?;
        if !body.errors.is_empty() {
            let messages: Vec<_> = body.errors.into_iter().map(|e| e.message).collect();
            return Err(PortError::Transport(format!(
                "subgraph returned errors: {}",
                messages.join("; ")
            )));
        }
        body.data
            .ok_or_else(|| PortError::NotFound("subgraph response has no data".to_owned()))
    }
}

const STAKING_POSITION_QUERY: &str = "query StakingPosition($id: ID!) { \
     stakingPosition(id: $id) { totalStaked pendingWithdrawal { amount } } }";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StakingPosition {
    pub staked: U256,
    pub pending_withdrawal: U256,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionData {
    staking_position: Option<RawPosition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPosition {
    total_staked: String,
    pending_withdrawal: Option<RawWithdrawal>,
}

#[derive(Debug, Deserialize)]
struct RawWithdrawal {
    amount: String,
}

/// Staking position of one account, re-queried after every confirmed step.
#[derive(Debug)]
pub struct StakingReadModel {
    client: SubgraphClient,
    account: Address,
    position: Mutex<Option<StakingPosition>>,
}

impl StakingReadModel {
    pub fn new(client: SubgraphClient, account: Address) -> Self {
        Self {
            client,
            account,
            position: Mutex::new(None),
        }
    }

    /// Last refreshed position; `None` until the first refresh succeeds.
    pub fn position(&self) -> Option<StakingPosition> {
        self.position
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ReadModelPort for StakingReadModel {
    async fn refresh(&self) -> Result<(), PortError> {
        let id = self.account.to_string().to_lowercase();
        let data: PositionData = self
            .client
            .query(STAKING_POSITION_QUERY, json!({ "id": id }))
            .await?;
        let position = match data.staking_position {
            Some(raw) => StakingPosition {
                staked: parse_amount(&raw.total_staked)?,
                pending_withdrawal: match raw.pending_withdrawal {
                    Some(w) => parse_amount(&w.amount)?,
                    None => U256::ZERO,
                },
            },
            None => StakingPosition::default(),
        };
        debug!(account = %self.account, staked = %position.staked, "staking position refreshed");
        *self.position.lock().unwrap_or_else(PoisonError::into_inner) = Some(position);
        Ok(())
    }
}

fn parse_amount(raw: &str) -> Result<U256, PortError> {
    U256::from_str_radix(raw, 10)
        .map_err(|e| PortError::Validation(format!("invalid subgraph amount {raw:?}: {e}")))
}
