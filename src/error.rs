//! Error types for the dispatch engine.

use tonic::{Code, Status};

use crate::codec::CodecError;

/// Result type for dispatcher operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Rejection raised by a command handler.
///
/// Returning `Err(CommandRejected)` from a handler has the same effect as
/// calling [`CommandContext::fail`](crate::CommandContext::fail).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("command rejected: {reason}")]
pub struct CommandRejected {
    pub reason: String,
}

impl CommandRejected {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Result type for command handlers.
///
/// Handlers reject with `Err(CommandRejected::new(..).into())` and may
/// propagate codec errors from effect or forward declarations with `?`.
pub type CommandResult<T> = std::result::Result<T, DispatchError>;

/// Errors surfaced to the driver by `handle_command` / `handle_event`.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No handler registered for the command in the active behavior.
    #[error("unknown command: {command} on {service}")]
    UnknownCommand { service: String, command: String },

    /// No event handler registered for the event discriminator in the active behavior.
    #[error("unknown event: {event_type} on {service}")]
    UnknownEvent { service: String, event_type: String },

    /// No entity registered under the service name.
    #[error("unknown entity service: {0}")]
    UnknownEntity(String),

    /// Payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The business handler declared a failure. State is left untouched.
    #[error("{0}")]
    Rejected(#[from] CommandRejected),

    /// An engine invariant was violated (sequence gap, unsupported operation).
    #[error("defect: {0}")]
    Defect(String),
}

impl DispatchError {
    /// Returns true for the soft, caller-visible rejection outcome.
    pub fn is_declared_failure(&self) -> bool {
        matches!(self, DispatchError::Rejected(_))
    }

    /// Returns the declared failure reason, if this is a rejection.
    pub fn rejection_reason(&self) -> Option<&str> {
        match self {
            DispatchError::Rejected(r) => Some(&r.reason),
            _ => None,
        }
    }

    /// gRPC status code the driver should report for this error.
    pub fn code(&self) -> Code {
        match self {
            DispatchError::UnknownCommand { .. } => Code::Unimplemented,
            DispatchError::UnknownEvent { .. } => Code::Internal,
            DispatchError::UnknownEntity(_) => Code::NotFound,
            DispatchError::Codec(_) => Code::InvalidArgument,
            DispatchError::Rejected(_) => Code::FailedPrecondition,
            DispatchError::Defect(_) => Code::Internal,
        }
    }
}

impl From<DispatchError> for Status {
    fn from(err: DispatchError) -> Self {
        let message = match &err {
            DispatchError::Rejected(r) => r.reason.clone(),
            other => other.to_string(),
        };
        Status::new(err.code(), message)
    }
}
