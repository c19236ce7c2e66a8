//! Command-line interface for the flow driver.

use alloy::primitives::U256;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run multi-step mint, bridge, stake and auction flows",
    after_help = "Without HAI_FLOW_RPC_URL the flows run against an in-memory demo ledger."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Mint the wrapped token from the base token, then bridge it.
    MintBridge {
        /// Base token to deposit, in wei.
        #[arg(value_parser = parse_wei)]
        deposit_wei: U256,

        /// v1 tokens to migrate, in wei.
        #[arg(long = "migrate", value_parser = parse_wei)]
        migrate_wei: Option<U256>,

        /// Amount to bridge. Defaults to everything minted.
        #[arg(long = "bridge", value_parser = parse_wei, conflicts_with = "no_bridge")]
        bridge_wei: Option<U256>,

        /// Mint only.
        #[arg(long)]
        no_bridge: bool,
    },

    /// Stake, start a withdrawal, or claim rewards.
    Stake {
        #[arg(long = "stake", value_parser = parse_wei)]
        stake_wei: Option<U256>,

        #[arg(long = "unstake", value_parser = parse_wei)]
        unstake_wei: Option<U256>,

        #[arg(long = "claim")]
        claim_rewards: bool,
    },

    /// Bid on, settle, and claim collateral from an auction.
    Auction {
        #[arg(value_parser = parse_wei)]
        auction_id: U256,

        #[arg(long = "bid", value_parser = parse_wei)]
        bid_wei: Option<U256>,

        #[arg(long)]
        settle: bool,

        /// Collateral to withdraw from the join adapter, in wei.
        #[arg(long = "claim", value_parser = parse_wei)]
        claim_wei: Option<U256>,
    },

    /// Create the account proxy if it does not exist yet.
    Proxy,
}

fn parse_wei(raw: &str) -> Result<U256, String> {
    U256::from_str_radix(raw, 10).map_err(|e| format!("invalid amount {raw:?}: {e}"))
}
