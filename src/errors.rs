//! Typed error hierarchy for the agent.
//!
//! - `StatusError`: a status push to the coordinator failed
//! - `OrchestratorError`: the lifecycle cannot continue
//!
//! Every variant is fatal to the run; [`OrchestratorError::exit_code`] maps it
//! to the process exit code `main` terminates with.

use std::time::Duration;

use thiserror::Error;
use tgo_common::{Phase, ReplyCode};

use crate::exit_codes;

/// Errors from pushing a status message to the coordinator.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("Cannot marshal status message: {0}")]
    Marshal(#[source] serde_json::Error),

    #[error("Cannot post status message to {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Bad HTTP response code: {status}")]
    BadHttpStatus { status: u16 },

    #[error("Coordinator rejected status {label}: {code} ({status})")]
    Rejected {
        label: String,
        code: ReplyCode,
        status: String,
    },

    #[error("Unreadable status reply: {0}")]
    InvalidReply(#[source] serde_json::Error),
}

impl StatusError {
    pub fn exit_code(&self) -> i32 {
        match self {
            StatusError::Marshal(_) => exit_codes::MARSHAL,
            StatusError::Transport { .. } => exit_codes::TRANSPORT,
            StatusError::BadHttpStatus { .. } => exit_codes::BAD_HTTP_STATUS,
            StatusError::Rejected { .. } | StatusError::InvalidReply(_) => exit_codes::REJECTED,
        }
    }

    /// Only an unreachable coordinator is worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, StatusError::Transport { .. })
    }
}

/// Errors that stop the lifecycle.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Phase {phase} has not completed in {}s, giving up", .after.as_secs())]
    PhaseTimeout { phase: Phase, after: Duration },

    #[error("No command from the coordinator in {}s, giving up", .after.as_secs())]
    CommandTimeout { after: Duration },

    #[error("Command channel closed before the coordinator sent a command")]
    CommandChannelClosed,

    #[error("Phase unit {phase} exited without signalling completion")]
    UnitVanished { phase: Phase },

    #[error("Phase unit {phase} was cancelled")]
    Cancelled { phase: Phase },

    #[error("Cannot listen for commands on port {port}: {source}")]
    Listener {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Status(#[from] StatusError),
}

impl OrchestratorError {
    pub fn exit_code(&self) -> i32 {
        match self {
            OrchestratorError::PhaseTimeout { .. }
            | OrchestratorError::CommandTimeout { .. }
            | OrchestratorError::Cancelled { .. } => exit_codes::TIMEOUT,
            OrchestratorError::Status(e) => e.exit_code(),
            OrchestratorError::CommandChannelClosed
            | OrchestratorError::UnitVanished { .. }
            | OrchestratorError::Listener { .. } => exit_codes::STARTUP,
        }
    }
}
