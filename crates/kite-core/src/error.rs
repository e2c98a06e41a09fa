use thiserror::Error;

use crate::state::InvocationId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message}")]
pub struct SchemaError {
    pub path: String,
    pub message: String,
}

impl SchemaError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("schema validation failed: {0}")]
    SchemaValidation(#[from] SchemaError),
    #[error("duplicate response for invocation {0}")]
    DuplicateResponse(InvocationId),
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("invalid registration for {name}: {reason}")]
    Registration { name: String, reason: String },
    #[error("action {name} failed: {message}")]
    Handler { name: String, message: String },
    #[error("stale state update {seq} (last applied {last_applied})")]
    StaleState { seq: u64, last_applied: u64 },
    #[error("invalid approval transition for invocation {0}")]
    InvalidTransition(InvocationId),
    #[error("session has ended")]
    SessionEnded,
}

impl ProtocolError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::SchemaValidation(_) => "schema_validation",
            Self::DuplicateResponse(_) => "duplicate_response",
            Self::UnknownAction(_) => "unknown_action",
            Self::Registration { .. } => "registration",
            Self::Handler { .. } => "handler",
            Self::StaleState { .. } => "stale_state",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::SessionEnded => "session_ended",
        }
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Failure reported by a local action handler. Relayed to the agent as an
/// error result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<SchemaError> for HandlerError {
    fn from(err: SchemaError) -> Self {
        Self(err.to_string())
    }
}
