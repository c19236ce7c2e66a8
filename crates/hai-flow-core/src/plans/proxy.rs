use std::sync::Arc;

use alloy::primitives::Address;

use super::{FlowContext, Plan};
use crate::calldata::{encode, IProxyRegistry};
use crate::domain::StepKey;
use crate::ports::{ContractCall, PortError};
use crate::snapshot::{FlowSnapshot, SnapshotRequest};
use crate::step::{CallOperation, PlanBuilder, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProxyStep {
    Build,
}

impl StepKey for ProxyStep {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "build_proxy",
        }
    }
}

/// Deploys the per-user proxy through the registry. The submitted hash is
/// remembered so a restart resumes waiting rather than deploying twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyPlan {
    pub registry: Address,
    pub existing_proxy: Option<Address>,
}

impl Plan for ProxyPlan {
    type Key = ProxyStep;

    fn name(&self) -> &'static str {
        "proxy"
    }

    fn snapshot_request(&self) -> SnapshotRequest {
        SnapshotRequest::default()
    }

    fn build_steps(
        &self,
        ctx: &FlowContext,
        _snapshot: &FlowSnapshot,
    ) -> Result<Vec<Step<ProxyStep>>, PortError> {
        let mut plan = PlanBuilder::new();
        plan.push_if(self.existing_proxy.is_none(), || {
            let data = encode(&IProxyRegistry::buildCall {});
            let call = ContractCall::new(self.registry, data, "Create proxy");
            let mut op = CallOperation::new(Arc::clone(&ctx.chain), ctx.owner, call);
            if let Some(store) = ctx.pending_tx.as_ref() {
                op = op.remembering(Arc::clone(store));
            }
            Step::transaction(ProxyStep::Build, "Create proxy", op)
        });
        plan.build()
    }
}
