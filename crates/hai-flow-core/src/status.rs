//! User-facing status text for failed steps.

use serde::{Deserialize, Serialize};

use crate::ports::PortError;

/// EIP-1193 `userRejectedRequest`.
pub const USER_REJECTED_CODE: i64 = 4001;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusMessage {
    Rejected { detail: String },
    Failed { detail: String },
}

impl StatusMessage {
    pub fn from_error(err: &PortError) -> Self {
        match err {
            PortError::UserRejected(detail) => Self::Rejected {
                detail: detail.clone(),
            },
            other => Self::Failed {
                detail: other.to_string(),
            },
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Rejected { .. } => "Transaction Rejected",
            Self::Failed { .. } => "Transaction Failed",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::Rejected { detail } | Self::Failed { detail } => detail,
        }
    }
}

/// Maps a provider error (JSON-RPC code plus message) onto the port taxonomy.
pub fn classify_provider_error(code: Option<i64>, message: &str) -> PortError {
    let lower = message.to_ascii_lowercase();
    if code == Some(USER_REJECTED_CODE)
        || lower.contains("action_rejected")
        || lower.contains("user rejected")
        || lower.contains("user denied")
    {
        return PortError::UserRejected(message.to_owned());
    }
    if lower.contains("revert")
        || lower.contains("gas required exceeds")
        || lower.contains("cannot estimate gas")
        || code == Some(3)
    {
        return PortError::Reverted(message.to_owned());
    }
    PortError::Transport(match code {
        Some(code) => format!("provider error {code}: {message}"),
        None => message.to_owned(),
    })
}
