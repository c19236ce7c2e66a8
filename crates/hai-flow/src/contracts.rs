//! Contract addresses for the flows, loaded from JSON or the demo fixture.

use std::path::Path;

use alloy::primitives::Address;
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};

use hai_flow_core::{AuctionContracts, MintBridgeContracts, StakeContracts};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractBook {
    pub account: Address,
    pub base_token: Address,
    pub v1_token: Address,
    pub wrapped_token: Address,
    pub destination_token: Address,
    pub destination_eid: u32,
    pub staking_token: Address,
    pub staked_token: Address,
    pub staking_manager: Address,
    pub coin: Address,
    pub auction_house: Address,
    pub collateral_join: Address,
    pub proxy_registry: Address,
    #[serde(default)]
    pub existing_proxy: Option<Address>,
}

impl ContractBook {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path)
            .wrap_err_with(|| format!("failed to read contract book {}", path.display()))?;
        serde_json::from_slice(&raw).wrap_err("invalid contract book")
    }

    /// Fixed addresses for the in-memory ledger.
    pub fn demo() -> Self {
        Self {
            account: Address::repeat_byte(0x10),
            base_token: Address::repeat_byte(0xb1),
            v1_token: Address::repeat_byte(0xb2),
            wrapped_token: Address::repeat_byte(0xc1),
            destination_token: Address::repeat_byte(0xd1),
            destination_eid: 30_110,
            staking_token: Address::repeat_byte(0x51),
            staked_token: Address::repeat_byte(0x52),
            staking_manager: Address::repeat_byte(0x53),
            coin: Address::repeat_byte(0xa1),
            auction_house: Address::repeat_byte(0xa2),
            collateral_join: Address::repeat_byte(0xa3),
            proxy_registry: Address::repeat_byte(0xee),
            existing_proxy: None,
        }
    }

    pub fn mint_bridge(&self) -> MintBridgeContracts {
        MintBridgeContracts {
            base_token: self.base_token,
            v1_token: self.v1_token,
            wrapped_token: self.wrapped_token,
            base_symbol: "KITE".to_owned(),
            wrapped_symbol: "haiKITE".to_owned(),
        }
    }

    pub fn stake(&self) -> StakeContracts {
        StakeContracts {
            staking_token: self.staking_token,
            staked_token: self.staked_token,
            staking_manager: self.staking_manager,
            staking_symbol: "KITE".to_owned(),
            staked_symbol: "stKITE".to_owned(),
        }
    }

    pub fn auction(&self) -> AuctionContracts {
        AuctionContracts {
            coin: self.coin,
            auction_house: self.auction_house,
            collateral_join: self.collateral_join,
            coin_symbol: "HAI".to_owned(),
            collateral_symbol: "WETH".to_owned(),
        }
    }
}
