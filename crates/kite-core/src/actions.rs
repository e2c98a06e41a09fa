use serde_json::Value;

use crate::action_registry::ActionDescriptor;
use crate::action_registry::Availability;
use crate::action_registry::RegistrationHandle;
use crate::state::DisplayParams;
use crate::state::InvocationId;
use crate::state::SharedState;

#[derive(Debug, Clone)]
pub enum SessionAction {
    User(UserAction),
    Agent(AgentEvent),
    Host(HostAction),
}

#[derive(Debug, Clone)]
pub enum UserAction {
    SendMessage(String),
    SetState(SharedState),
    Respond {
        invocation_id: InvocationId,
        decision: Value,
    },
    EndSession,
}

/// Agent-issued request to run a named action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionInvocation {
    pub id: InvocationId,
    pub name: String,
    pub args: Value,
}

impl ActionInvocation {
    pub fn new(id: impl Into<InvocationId>, name: &str, args: Value) -> Self {
        Self {
            id: id.into(),
            name: name.to_string(),
            args,
        }
    }
}

#[derive(Debug, Clone)]
pub enum AgentEvent {
    StateSnapshot {
        seq: Option<u64>,
        state: Value,
    },
    ActionInvoked(ActionInvocation),
    /// Result of an action the agent executed itself (plain renders and
    /// remote actions).
    ToolResult {
        invocation_id: InvocationId,
        result: Value,
    },
    AssistantText(String),
}

#[derive(Debug, Clone)]
pub enum HostAction {
    Register {
        descriptor: ActionDescriptor,
        deps: Vec<String>,
    },
    Unregister(RegistrationHandle),
    SetAvailability {
        name: String,
        availability: Availability,
    },
    SetDisplay(DisplayParams),
    MountState(SharedState),
    SettleInvocation {
        invocation_id: InvocationId,
        result: Value,
    },
    TransportFailed(String),
}
