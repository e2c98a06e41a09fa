use serde::Deserialize;
use serde::Serialize;

use crate::error::ProtocolError;
use crate::error::ProtocolResult;
use crate::error::SchemaError;
use crate::schema::ActionArgs;
use crate::schema::StateSchema;
use crate::state::SharedState;

/// Maps a state field onto the argument of a remote tool, so the field can be
/// updated as soon as the agent calls the tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictedField {
    pub field: String,
    pub tool: String,
    pub tool_argument: String,
}

impl PredictedField {
    pub fn new(field: &str, tool: &str, tool_argument: &str) -> Self {
        Self {
            field: field.to_string(),
            tool: tool.to_string(),
            tool_argument: tool_argument.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateOrigin {
    Initial,
    Local,
    Agent { seq: Option<u64> },
    Predicted { tool: String },
}

impl StateOrigin {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Local => "local",
            Self::Agent { .. } => "agent",
            Self::Predicted { .. } => "predicted",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub state: SharedState,
    pub origin: StateOrigin,
    pub revision: u64,
}

impl StateChange {
    /// Local writes are mirrored to the agent; agent-originated ones are not
    /// echoed back.
    pub fn needs_sync(&self) -> bool {
        matches!(self.origin, StateOrigin::Initial | StateOrigin::Local)
    }
}

/// Single local mutation authority for the shared state.
#[derive(Debug, Clone)]
pub struct StateStore {
    schema: StateSchema,
    current: SharedState,
    predictions: Vec<PredictedField>,
    last_remote_seq: Option<u64>,
    agent_seeded: bool,
    revision: u64,
}

impl StateStore {
    pub fn new(schema: StateSchema, initial: SharedState) -> Result<Self, SchemaError> {
        schema.validate(&initial)?;
        Ok(Self {
            schema,
            current: initial,
            predictions: Vec::new(),
            last_remote_seq: None,
            agent_seeded: false,
            revision: 0,
        })
    }

    pub fn with_predictions(mut self, predictions: Vec<PredictedField>) -> Self {
        self.predictions = predictions;
        self
    }

    pub fn get(&self) -> &SharedState {
        &self.current
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn last_remote_seq(&self) -> Option<u64> {
        self.last_remote_seq
    }

    pub fn agent_seeded(&self) -> bool {
        self.agent_seeded
    }

    pub fn set(&mut self, state: SharedState) -> Result<StateChange, SchemaError> {
        self.replace(state, StateOrigin::Local)
    }

    pub fn update<F>(&mut self, updater: F) -> Result<StateChange, SchemaError>
    where
        F: FnOnce(&SharedState) -> SharedState,
    {
        let next = updater(&self.current);
        self.set(next)
    }

    /// Applies an agent-pushed snapshot. The snapshot replaces the local value
    /// wholesale; sequenced snapshots older than the last applied one are
    /// dropped.
    pub fn apply_remote(
        &mut self,
        seq: Option<u64>,
        state: SharedState,
    ) -> ProtocolResult<StateChange> {
        if let (Some(seq), Some(last_applied)) = (seq, self.last_remote_seq) {
            if seq <= last_applied {
                return Err(ProtocolError::StaleState { seq, last_applied });
            }
        }
        let change = self.replace(state, StateOrigin::Agent { seq })?;
        if seq.is_some() {
            self.last_remote_seq = seq;
        }
        self.agent_seeded = true;
        Ok(change)
    }

    /// Re-applies a host-supplied initial value. Ignored once the agent has
    /// written the state.
    pub fn remount(&mut self, initial: SharedState) -> Result<Option<StateChange>, SchemaError> {
        if self.agent_seeded {
            return Ok(None);
        }
        self.replace(initial, StateOrigin::Initial).map(Some)
    }

    pub fn predict(&mut self, tool: &str, args: &ActionArgs) -> ProtocolResult<Option<StateChange>> {
        let mut next = self.current.clone();
        let mut touched = false;
        for prediction in self.predictions.iter().filter(|p| p.tool == tool) {
            if let Some(value) = args.get(&prediction.tool_argument) {
                next = next.with_field(prediction.field.clone(), value.clone());
                touched = true;
            }
        }
        if !touched {
            return Ok(None);
        }
        let change = self.replace(
            next,
            StateOrigin::Predicted {
                tool: tool.to_string(),
            },
        )?;
        self.agent_seeded = true;
        Ok(Some(change))
    }

    fn replace(&mut self, state: SharedState, origin: StateOrigin) -> Result<StateChange, SchemaError> {
        self.schema.validate(&state)?;
        self.current = state;
        self.revision = self.revision.saturating_add(1);
        Ok(StateChange {
            state: self.current.clone(),
            origin,
            revision: self.revision,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::schema::validate_args;
    use crate::schema::ParamSpec;
    use crate::schema::SemanticType;

    fn proverbs(items: &[&str]) -> SharedState {
        SharedState::from_value(json!({ "proverbs": items })).unwrap()
    }

    fn store(items: &[&str]) -> StateStore {
        let schema = StateSchema::default().field("proverbs", SemanticType::StringArray, "");
        StateStore::new(schema, proverbs(items))
            .unwrap()
            .with_predictions(vec![PredictedField::new(
                "proverbs",
                "update_proverbs",
                "proverbs",
            )])
    }

    #[test]
    fn agent_snapshot_replaces_local_value() {
        let mut store = store(&["P1"]);
        let change = store.apply_remote(Some(1), proverbs(&["P1", "P2"])).unwrap();
        assert!(!change.needs_sync());
        assert_eq!(store.get(), &proverbs(&["P1", "P2"]));
    }

    #[test]
    fn older_sequenced_snapshot_is_dropped() {
        let mut store = store(&["P1"]);
        store.apply_remote(Some(5), proverbs(&["new"])).unwrap();
        let err = store.apply_remote(Some(4), proverbs(&["old"])).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::StaleState {
                seq: 4,
                last_applied: 5
            }
        );
        assert_eq!(store.get(), &proverbs(&["new"]));
    }

    #[test]
    fn invalid_snapshot_keeps_previous_state() {
        let mut store = store(&["P1"]);
        let bad = SharedState::from_value(json!({ "proverbs": "P2" })).unwrap();
        let err = store.apply_remote(Some(1), bad).unwrap_err();
        assert_eq!(err.code(), "schema_validation");
        assert_eq!(store.get(), &proverbs(&["P1"]));
        assert_eq!(store.last_remote_seq(), None);
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn update_runs_against_previous_state() {
        let mut store = store(&["P1"]);
        let change = store
            .update(|prev| {
                let mut items: Vec<String> = prev
                    .get("proverbs")
                    .and_then(|value| serde_json::from_value(value.clone()).ok())
                    .unwrap_or_default();
                items.push("P2".to_string());
                prev.clone().with_field("proverbs", json!(items))
            })
            .unwrap();
        assert!(change.needs_sync());
        assert_eq!(change.state, proverbs(&["P1", "P2"]));
    }

    #[test]
    fn remount_is_ignored_after_agent_push() {
        let mut store = store(&["P1"]);
        assert!(store.remount(proverbs(&["P0"])).unwrap().is_some());
        store.apply_remote(None, proverbs(&["A"])).unwrap();
        assert!(store.remount(proverbs(&["P0"])).unwrap().is_none());
        assert_eq!(store.get(), &proverbs(&["A"]));
    }

    #[test]
    fn predicted_field_follows_tool_argument() {
        let mut store = store(&["P1"]);
        let params = vec![ParamSpec::required("proverbs", SemanticType::StringArray)];
        let args = validate_args(&params, &json!({ "proverbs": ["P1", "P3"] })).unwrap();

        let change = store.predict("update_proverbs", &args).unwrap().unwrap();
        assert_eq!(
            change.origin,
            StateOrigin::Predicted {
                tool: "update_proverbs".to_string()
            }
        );
        assert_eq!(store.get(), &proverbs(&["P1", "P3"]));
        assert!(store.predict("get_weather", &args).unwrap().is_none());
    }
}
