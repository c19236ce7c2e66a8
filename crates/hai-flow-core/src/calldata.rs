//! Solidity interfaces for the calls the flows submit and the reads they make.

use alloy::primitives::Bytes;
use alloy::sol;
use alloy::sol_types::{SolCall, SolInterface};

use crate::ports::PortError;

sol! {
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256 balance);
        function allowance(address owner, address spender) external view returns (uint256 remaining);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    /// Wrapped token that mints from the base token, migrates v1 balances
    /// and burns into a cross-chain message.
    interface IWrappedToken {
        function depositFor(address account, uint256 amount) external returns (bool);
        function migrateV1(uint256 amount) external;
        function bridge(uint32 dstEid, address recipient, uint256 amount) external payable;
    }

    interface IStakingManager {
        function stake(address account, uint256 amount) external;
        function initiateWithdrawal(uint256 amount) external;
        function getReward(address account) external;
    }

    interface IAuctionHouse {
        function buyCollateral(uint256 auctionId, uint256 bid) external;
        function settleAuction(uint256 auctionId) external;
    }

    interface ICollateralJoin {
        function exit(address account, uint256 amount) external;
    }

    interface IProxyRegistry {
        function build() external returns (address proxy);
    }
}

pub fn encode<C: SolCall>(call: &C) -> Bytes {
    Bytes::from(call.abi_encode())
}

pub fn abi_error(err: alloy::sol_types::Error) -> PortError {
    PortError::Validation(format!("abi decoding failed: {err}"))
}

/// Decodes calldata against interface `I`. Selectors `I` does not declare
/// yield `None`; a declared selector with malformed arguments is an error.
pub fn decode_call<I: SolInterface>(data: &[u8]) -> Result<Option<I>, PortError> {
    let selector: [u8; 4] = data
        .get(..4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| {
            PortError::Validation(format!("malformed calldata of {} bytes", data.len()))
        })?;
    if !I::valid_selector(selector) {
        return Ok(None);
    }
    I::abi_decode(data, true).map(Some).map_err(abi_error)
}
