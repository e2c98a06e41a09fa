//! JSON shapes exchanged with the agent. The byte encoding is the
//! transport's business; these are what the scripted transport and the
//! simulated agent speak.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use kite_core::ActionInvocation;
use kite_core::ActionResult;
use kite_core::AgentEvent;
use kite_core::CapabilitySpec;
use kite_core::SessionEffect;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    StateSnapshot {
        #[serde(default)]
        seq: Option<u64>,
        state: Value,
    },
    ToolCall {
        id: String,
        name: String,
        #[serde(default)]
        args: Value,
    },
    ToolResult {
        id: String,
        result: Value,
    },
    Text {
        text: String,
    },
}

impl From<InboundMessage> for AgentEvent {
    fn from(message: InboundMessage) -> Self {
        match message {
            InboundMessage::StateSnapshot { seq, state } => AgentEvent::StateSnapshot { seq, state },
            InboundMessage::ToolCall { id, name, args } => {
                AgentEvent::ActionInvoked(ActionInvocation::new(id, &name, args))
            }
            InboundMessage::ToolResult { id, result } => AgentEvent::ToolResult {
                invocation_id: id.into(),
                result,
            },
            InboundMessage::Text { text } => AgentEvent::AssistantText(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    UserMessage {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<String>,
    },
    StateSync {
        state: Value,
    },
    Capabilities {
        actions: Vec<CapabilitySpec>,
    },
    ActionResult {
        id: String,
        result: ActionResult,
    },
}

impl OutboundMessage {
    /// The wire message for an effect, if the effect leaves the client.
    pub fn from_effect(effect: &SessionEffect) -> Option<Self> {
        match effect {
            SessionEffect::SendUserMessage { message, context } => Some(Self::UserMessage {
                text: message.clone(),
                context: context.clone(),
            }),
            SessionEffect::SyncState(state) => Some(Self::StateSync {
                state: state.to_value(),
            }),
            SessionEffect::AdvertiseCapabilities(actions) => Some(Self::Capabilities {
                actions: actions.clone(),
            }),
            SessionEffect::SendActionResult {
                invocation_id,
                result,
            } => Some(Self::ActionResult {
                id: invocation_id.to_string(),
                result: result.clone(),
            }),
            SessionEffect::Render { .. }
            | SessionEffect::Discard { .. }
            | SessionEffect::RequestFrame
            | SessionEffect::Notice(_)
            | SessionEffect::AssistantText(_) => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::UserMessage { .. } => "user_message",
            Self::StateSync { .. } => "state_sync",
            Self::Capabilities { .. } => "capabilities",
            Self::ActionResult { .. } => "action_result",
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn tool_call_without_args_decodes_to_null_args() {
        let message: InboundMessage =
            serde_json::from_str(r#"{"type":"tool_call","id":"call-1","name":"go_to_moon"}"#).unwrap();
        match AgentEvent::from(message) {
            AgentEvent::ActionInvoked(invocation) => {
                assert_eq!(invocation.id.as_str(), "call-1");
                assert_eq!(invocation.name, "go_to_moon");
                assert_eq!(invocation.args, Value::Null);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn action_result_wire_shape() {
        let message = OutboundMessage::from_effect(&SessionEffect::SendActionResult {
            invocation_id: "call-2".into(),
            result: ActionResult::ok(json!("approved")),
        })
        .unwrap();
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "type": "action_result",
                "id": "call-2",
                "result": { "status": "ok", "value": "approved" }
            })
        );
        assert!(OutboundMessage::from_effect(&SessionEffect::RequestFrame).is_none());
    }
}
