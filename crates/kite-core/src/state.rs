use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::error::SchemaError;

pub const DEFAULT_THEME_COLOR: &str = "#6366f1";
pub const DEFAULT_LOG_CAPACITY: usize = 2_000;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvocationId(pub String);

impl InvocationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InvocationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for InvocationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The state object shared with the agent. Always a JSON object; the same
/// representation is used locally and on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharedState(Map<String, Value>);

impl SharedState {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(SchemaError::new(
                "$",
                format!("expected an object, got {}", json_type_label(&other)),
            )),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn with_field(mut self, field: impl Into<String>, value: Value) -> Self {
        self.0.insert(field.into(), value);
        self
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

pub fn json_type_label(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApprovalStatus {
    InProgress,
    Executing,
    Complete,
}

impl ApprovalStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::InProgress => "inProgress",
            Self::Executing => "executing",
            Self::Complete => "complete",
        }
    }

    pub fn next(self) -> Option<Self> {
        match self {
            Self::InProgress => Some(Self::Executing),
            Self::Executing => Some(Self::Complete),
            Self::Complete => None,
        }
    }
}

/// Ambient display parameters owned by the host and handed to renderers and
/// handlers explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayParams {
    pub theme_color: String,
}

impl Default for DisplayParams {
    fn default() -> Self {
        Self {
            theme_color: DEFAULT_THEME_COLOR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Active,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    SchemaValidation,
    StaleState,
    Transport,
    UnknownAction,
    Handler,
    Registration,
}

impl NoticeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::SchemaValidation => "schema-validation",
            Self::StaleState => "stale-state",
            Self::Transport => "transport",
            Self::UnknownAction => "unknown-action",
            Self::Handler => "handler",
            Self::Registration => "registration",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: Arc<str>,
    pub invocation: Option<InvocationId>,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<Arc<str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            invocation: None,
        }
    }

    pub fn for_invocation(mut self, id: InvocationId) -> Self {
        self.invocation = Some(id);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    Host,
    Agent,
    Session,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub seq: u64,
    pub level: LogLevel,
    pub ts_ms: Option<u64>,
    pub source: LogSource,
    pub context: Option<String>,
    pub message: String,
    pub invocation: Option<InvocationId>,
}

impl LogEntry {
    pub fn new(level: LogLevel, source: LogSource, message: impl Into<String>) -> Self {
        Self {
            seq: 0,
            level,
            ts_ms: None,
            source,
            context: None,
            message: message.into(),
            invocation: None,
        }
    }

    pub fn context(mut self, context: &str) -> Self {
        self.context = Some(context.to_string());
        self
    }

    pub fn invocation(mut self, id: &InvocationId) -> Self {
        self.invocation = Some(id.clone());
        self
    }
}

#[derive(Debug, Clone)]
pub struct LogBuffer {
    cap: usize,
    next_seq: u64,
    buf: VecDeque<LogEntry>,
}

impl LogBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            next_seq: 1,
            buf: VecDeque::with_capacity(cap.max(1)),
        }
    }

    pub fn append(&mut self, mut entry: LogEntry) {
        entry.seq = self.next_seq;
        self.next_seq += 1;

        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.buf.iter()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn shared_state_rejects_non_object_values() {
        let err = SharedState::from_value(json!(["P1"])).unwrap_err();
        assert_eq!(err.path, "$");
        assert!(err.message.contains("array"));
    }

    #[test]
    fn approval_status_only_moves_forward() {
        assert_eq!(
            ApprovalStatus::InProgress.next(),
            Some(ApprovalStatus::Executing)
        );
        assert_eq!(
            ApprovalStatus::Executing.next(),
            Some(ApprovalStatus::Complete)
        );
        assert_eq!(ApprovalStatus::Complete.next(), None);
    }

    #[test]
    fn log_buffer_drops_oldest_entries_at_capacity() {
        let mut logs = LogBuffer::new(2);
        for message in ["a", "b", "c"] {
            logs.append(LogEntry::new(LogLevel::Info, LogSource::Session, message));
        }
        let kept: Vec<(u64, &str)> = logs
            .iter()
            .map(|entry| (entry.seq, entry.message.as_str()))
            .collect();
        assert_eq!(kept, vec![(2, "b"), (3, "c")]);
    }
}
