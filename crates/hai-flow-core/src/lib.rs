pub mod calldata;
pub mod close;
pub mod domain;
pub mod lock;
pub mod plans;
pub mod poller;
pub mod ports;
pub mod sequencer;
pub mod session;
pub mod snapshot;
pub mod state_machine;
pub mod status;
pub mod step;

pub use close::{CloseSignal, FlowScope};
pub use domain::{
    DeliveryOutcome, Projection, StepKey, StepKindTag, StepReceipt, StepView, TimestampMs,
    TransitionRecord,
};
pub use lock::{AccountLockGuard, AccountLocks};
pub use plans::{
    prepare, AuctionContracts, AuctionPlan, AuctionStep, BridgeRoute, FlowContext,
    MintBridgeContracts, MintBridgePlan, MintBridgeStep, Plan, ProxyPlan, ProxyStep,
    StakeContracts, StakePlan, StakeStep,
};
pub use poller::{
    BalanceSource, DeliveryPoller, DeliveryWatch, PollObserver, PollSample, TokenBalanceSource,
};
pub use ports::{
    ChainPort, ClockPort, ContractCall, PendingTxPort, PortError, ReadModelPort, TxReceipt,
};
pub use sequencer::{Sequencer, SequencerError, StepOutcome};
pub use session::FlowSession;
pub use snapshot::{ApprovalState, FlowSnapshot, SnapshotRequest};
pub use state_machine::{step_transition, StateTransition, StepAction, StepStatus};
pub use status::{classify_provider_error, StatusMessage};
pub use step::{from_fn, CallOperation, FnOperation, PlanBuilder, Step, StepKind, StepOperation};
