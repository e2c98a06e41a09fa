//! In-process stand-in for the proverbs agent: deterministic keyword routing
//! over the same tools and replies the real agent exposes.

use std::collections::BTreeMap;
use std::collections::VecDeque;

use serde_json::json;
use serde_json::Value;

use kite_core::catalog;
use kite_core::ActionResult;
use kite_core::SharedState;

use crate::contracts::InboundMessage;
use crate::contracts::OutboundMessage;
use crate::error::TransportResult;
use crate::transport::AgentTransport;

const PROVERB_POOL: &[&str] = &[
    "Still waters run deep.",
    "Many hands make light work.",
    "The early bird catches the worm.",
    "A smooth sea never made a skilled sailor.",
    "Fall seven times, stand up eight.",
];

pub const MOON_REQUESTED: &str =
    "Mission control requested. Awaiting human approval for the lunar launch.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Weather { location: String },
    Theme { color: String },
    Moon,
    AddProverb,
    RemoveProverb,
    ListProverbs,
    Chat,
}

impl Intent {
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("moon") {
            Self::Moon
        } else if lower.contains("weather") {
            let location = lower
                .rfind(" in ")
                .map(|idx| lower[idx + 4..].to_string())
                .unwrap_or_default();
            Self::Weather {
                location: trim_punctuation(&location).to_string(),
            }
        } else if lower.contains("theme") || lower.contains("color") {
            let color = text.split_whitespace().last().unwrap_or_default();
            Self::Theme {
                color: trim_punctuation(color).to_string(),
            }
        } else if lower.contains("add") {
            Self::AddProverb
        } else if lower.contains("remove") || lower.contains("delete") {
            Self::RemoveProverb
        } else if lower.contains("proverb") {
            Self::ListProverbs
        } else {
            Self::Chat
        }
    }
}

fn trim_punctuation(value: &str) -> &str {
    value.trim().trim_end_matches(['?', '!', '.', ','])
}

/// `"  new york "` becomes `"New York"`.
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_alpha = false;
    for ch in value.trim().chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

pub fn weather_summary(location: &str) -> String {
    let normalized = title_case(location);
    let normalized = if normalized.is_empty() {
        "the requested location".to_string()
    } else {
        normalized
    };
    format!(
        "The weather in {normalized} is mild with a light breeze. \
         Skies are mostly clear\u{2014}perfect for planning something fun."
    )
}

pub fn proverbs_updated(count: usize) -> String {
    format!("Proverbs updated. Tracking {count} item(s).")
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingCall {
    Theme { color: String },
    Moon,
}

#[derive(Debug, Default)]
pub struct SimulatedAgent {
    outbox: VecDeque<InboundMessage>,
    proverbs: Vec<String>,
    capabilities: Vec<String>,
    pending: BTreeMap<String, PendingCall>,
    next_call: u64,
    next_seq: u64,
    received: Vec<OutboundMessage>,
}

impl SimulatedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn proverbs(&self) -> &[String] {
        &self.proverbs
    }

    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    pub fn received(&self) -> &[OutboundMessage] {
        &self.received
    }

    fn handle(&mut self, message: &OutboundMessage) {
        match message {
            OutboundMessage::UserMessage { text, context } => {
                if let Some(items) = context
                    .as_deref()
                    .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
                    .and_then(read_proverbs)
                {
                    self.proverbs = items;
                }
                self.respond_to(text);
            }
            OutboundMessage::StateSync { state } => {
                if let Some(items) = read_proverbs(state.clone()) {
                    self.proverbs = items;
                }
            }
            OutboundMessage::Capabilities { actions } => {
                self.capabilities = actions.iter().map(|action| action.name.clone()).collect();
            }
            OutboundMessage::ActionResult { id, result } => self.on_result(id, result),
        }
    }

    fn respond_to(&mut self, text: &str) {
        match Intent::classify(text) {
            Intent::Weather { location } => {
                let id = self.call(catalog::GET_WEATHER, json!({ "location": location }));
                let summary = weather_summary(&location);
                self.push(InboundMessage::ToolResult {
                    id,
                    result: json!(summary),
                });
                self.say(summary);
            }
            Intent::Theme { color } => {
                let id = self.call(catalog::SET_THEME_COLOR, json!({ "themeColor": color }));
                self.pending.insert(id, PendingCall::Theme { color });
            }
            Intent::Moon => {
                let id = self.call(catalog::GO_TO_MOON, json!({}));
                self.pending.insert(id, PendingCall::Moon);
                self.say(MOON_REQUESTED);
            }
            Intent::AddProverb => {
                let next = PROVERB_POOL
                    .iter()
                    .find(|candidate| !self.proverbs.iter().any(|p| p == *candidate))
                    .map(|candidate| candidate.to_string())
                    .unwrap_or_else(|| format!("Proverb #{}", self.proverbs.len() + 1));
                let mut items = self.proverbs.clone();
                items.push(next.clone());
                self.replace_proverbs(items);
                self.say(format!("Added \"{next}\" to your proverbs."));
            }
            Intent::RemoveProverb => {
                let mut items = self.proverbs.clone();
                match items.pop() {
                    Some(removed) => {
                        self.replace_proverbs(items);
                        self.say(format!("Removed \"{removed}\"."));
                    }
                    None => self.say("There are no proverbs to remove."),
                }
            }
            Intent::ListProverbs => {
                if self.proverbs.is_empty() {
                    self.say("You have no proverbs yet.");
                } else {
                    let lines: Vec<String> = self
                        .proverbs
                        .iter()
                        .enumerate()
                        .map(|(idx, item)| format!("{}. {item}", idx + 1))
                        .collect();
                    self.say(format!("Your proverbs:\n{}", lines.join("\n")));
                }
            }
            Intent::Chat => self.say(
                "I can manage your proverbs, check the weather, change the theme color, \
                 or plan a trip to the moon.",
            ),
        }
    }

    fn on_result(&mut self, id: &str, result: &ActionResult) {
        let Some(pending) = self.pending.remove(id) else {
            tracing::debug!(invocation = id, "result for a call the agent does not track");
            return;
        };
        let reply = match (pending, result) {
            (PendingCall::Theme { color }, ActionResult::Ok { .. }) => {
                format!("Theme color set to {color}.")
            }
            (PendingCall::Theme { .. }, ActionResult::Error { message, .. }) => {
                format!("I couldn't change the theme color: {message}")
            }
            (PendingCall::Moon, ActionResult::Ok { value }) => {
                if value.as_str() == Some(catalog::DECISION_APPROVED) {
                    "Liftoff! The crew is on its way to the moon.".to_string()
                } else {
                    "Understood. The launch is cancelled and the crew stays home.".to_string()
                }
            }
            (PendingCall::Moon, ActionResult::Error { message, .. }) => {
                format!("The moon mission could not start: {message}")
            }
        };
        self.say(reply);
    }

    fn replace_proverbs(&mut self, items: Vec<String>) {
        let count = items.len();
        let id = self.call(catalog::UPDATE_PROVERBS, json!({ "proverbs": items }));
        self.next_seq += 1;
        self.push(InboundMessage::StateSnapshot {
            seq: Some(self.next_seq),
            state: json!({ "proverbs": items }),
        });
        self.push(InboundMessage::ToolResult {
            id,
            result: json!(proverbs_updated(count)),
        });
        self.proverbs = items;
    }

    fn call(&mut self, name: &str, args: Value) -> String {
        self.next_call += 1;
        let id = format!("call-{}", self.next_call);
        self.push(InboundMessage::ToolCall {
            id: id.clone(),
            name: name.to_string(),
            args,
        });
        id
    }

    fn say(&mut self, text: impl Into<String>) {
        self.push(InboundMessage::Text { text: text.into() });
    }

    fn push(&mut self, message: InboundMessage) {
        self.outbox.push_back(message);
    }
}

fn read_proverbs(state: Value) -> Option<Vec<String>> {
    let state = SharedState::from_value(state).ok()?;
    state.get(catalog::PROVERBS_FIELD)?;
    Some(catalog::proverbs(&state))
}

impl AgentTransport for SimulatedAgent {
    fn send(&mut self, message: OutboundMessage) -> TransportResult<()> {
        self.handle(&message);
        self.received.push(message);
        Ok(())
    }

    fn poll(&mut self) -> TransportResult<Option<InboundMessage>> {
        Ok(self.outbox.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn drain(agent: &mut SimulatedAgent) -> Vec<InboundMessage> {
        std::iter::from_fn(|| agent.poll().unwrap()).collect()
    }

    fn user(text: &str, items: &[&str]) -> OutboundMessage {
        OutboundMessage::UserMessage {
            text: text.to_string(),
            context: Some(json!({ "proverbs": items }).to_string()),
        }
    }

    #[test]
    fn weather_location_is_title_cased() {
        assert_eq!(title_case("  san francisco "), "San Francisco");
        assert_eq!(
            weather_summary(""),
            "The weather in the requested location is mild with a light breeze. \
             Skies are mostly clear\u{2014}perfect for planning something fun."
        );
        assert_eq!(
            Intent::classify("Get the weather in san francisco?"),
            Intent::Weather {
                location: "san francisco".to_string()
            }
        );
    }

    #[test]
    fn adding_a_proverb_sends_full_list_and_snapshot() {
        let mut agent = SimulatedAgent::new();
        agent.send(user("Add a proverb about AI.", &["P1"])).unwrap();

        let messages = drain(&mut agent);
        assert_eq!(
            messages[0],
            InboundMessage::ToolCall {
                id: "call-1".to_string(),
                name: catalog::UPDATE_PROVERBS.to_string(),
                args: json!({ "proverbs": ["P1", PROVERB_POOL[0]] }),
            }
        );
        assert_eq!(
            messages[1],
            InboundMessage::StateSnapshot {
                seq: Some(1),
                state: json!({ "proverbs": ["P1", PROVERB_POOL[0]] }),
            }
        );
        assert_eq!(
            messages[2],
            InboundMessage::ToolResult {
                id: "call-1".to_string(),
                result: json!("Proverbs updated. Tracking 2 item(s)."),
            }
        );
        assert_eq!(agent.proverbs().len(), 2);
    }

    #[test]
    fn moon_reply_follows_the_decision() {
        let mut agent = SimulatedAgent::new();
        agent.send(user("Go to the moon", &[])).unwrap();
        let messages = drain(&mut agent);
        assert_eq!(
            messages[1],
            InboundMessage::Text {
                text: MOON_REQUESTED.to_string()
            }
        );

        agent
            .send(OutboundMessage::ActionResult {
                id: "call-1".to_string(),
                result: ActionResult::ok(json!("rejected")),
            })
            .unwrap();
        assert_eq!(
            drain(&mut agent),
            vec![InboundMessage::Text {
                text: "Understood. The launch is cancelled and the crew stays home.".to_string()
            }]
        );

        // A second result for the same call is not answered.
        agent
            .send(OutboundMessage::ActionResult {
                id: "call-1".to_string(),
                result: ActionResult::ok(json!("approved")),
            })
            .unwrap();
        assert!(drain(&mut agent).is_empty());
    }

    #[test]
    fn removing_from_empty_list_only_replies() {
        let mut agent = SimulatedAgent::new();
        agent.send(user("Remove one proverb", &[])).unwrap();
        assert_eq!(
            drain(&mut agent),
            vec![InboundMessage::Text {
                text: "There are no proverbs to remove.".to_string()
            }]
        );
    }
}
