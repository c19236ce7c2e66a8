use serde::{Deserialize, Serialize};

use crate::ports::PortError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Waiting,
    InFlight,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    Start,
    Succeed,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub from: StepStatus,
    pub to: StepStatus,
    pub reason: &'static str,
}

pub fn step_transition(
    status: StepStatus,
    action: StepAction,
) -> Result<(StepStatus, StateTransition), PortError> {
    let (to, reason) = match (status, action) {
        (StepStatus::Waiting, StepAction::Start) => (StepStatus::InFlight, "step_started"),
        (StepStatus::InFlight, StepAction::Succeed) => (StepStatus::Done, "step_succeeded"),
        // A failed attempt returns to Waiting so the same step can be retried.
        (StepStatus::InFlight, StepAction::Fail) => (StepStatus::Waiting, "step_failed"),
        _ => {
            return Err(PortError::Validation(format!(
                "illegal step transition: {status:?} + {action:?}"
            )))
        }
    };
    Ok((
        to,
        StateTransition {
            from: status,
            to,
            reason,
        },
    ))
}
