pub mod clock;
pub mod config;
pub mod explorer;
pub mod memory;
pub mod pending_tx;
pub mod rpc;
pub mod subgraph;

pub use clock::SystemClockAdapter;
pub use config::{ConfigError, FlowAdapterConfig, RuntimeProfile};
pub use explorer::ExplorerLinks;
pub use memory::{MemoryChainAdapter, SentTx};
pub use pending_tx::PendingTxStore;
pub use rpc::RpcChainAdapter;
pub use subgraph::{StakingPosition, StakingReadModel, SubgraphClient};
