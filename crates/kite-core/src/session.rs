use std::collections::BTreeMap;
use std::collections::VecDeque;

use serde_json::Value;

use crate::action_registry::ActionRegistry;
use crate::action_registry::CapabilitySpec;
use crate::approval::ApprovalMachine;
use crate::config::Config;
use crate::error::SchemaError;
use crate::render::RenderDispatcher;
use crate::render::View;
use crate::schema::ActionArgs;
use crate::schema::StateSchema;
use crate::state::ApprovalStatus;
use crate::state::DisplayParams;
use crate::state::InvocationId;
use crate::state::LogBuffer;
use crate::state::SessionPhase;
use crate::state::SharedState;
use crate::store::PredictedField;
use crate::store::StateStore;

#[derive(Debug, Clone, PartialEq)]
pub enum InvocationKind {
    /// Generative UI only; the agent executes the action and reports the
    /// result itself.
    Render { result: Option<Value> },
    Approval(ApprovalMachine),
}

/// An invocation that has been accepted and is not resolved yet.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRecord {
    pub id: InvocationId,
    pub action: String,
    pub args: ActionArgs,
    pub arrival: u64,
    pub generation: u64,
    pub kind: InvocationKind,
}

impl InvocationRecord {
    pub fn approval_status(&self) -> Option<ApprovalStatus> {
        match &self.kind {
            InvocationKind::Approval(machine) => Some(machine.status()),
            InvocationKind::Render { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub config: Config,
    pub phase: SessionPhase,
    pub store: StateStore,
    pub registry: ActionRegistry,
    pub dispatcher: RenderDispatcher,
    pub display: DisplayParams,
    pub invocations: BTreeMap<InvocationId, InvocationRecord>,
    pub logs: LogBuffer,
    pub(crate) archived: VecDeque<InvocationId>,
    pub(crate) advertised: Vec<CapabilitySpec>,
    pub(crate) next_arrival: u64,
}

impl Session {
    pub fn new(config: Config, schema: StateSchema, initial: SharedState) -> Result<Self, SchemaError> {
        let store = StateStore::new(schema, initial)?;
        let display = DisplayParams {
            theme_color: config.display.theme_color.clone(),
        };
        let logs = LogBuffer::new(config.session.log_capacity);
        Ok(Self {
            config,
            phase: SessionPhase::Active,
            store,
            registry: ActionRegistry::default(),
            dispatcher: RenderDispatcher::default(),
            display,
            invocations: BTreeMap::new(),
            logs,
            archived: VecDeque::new(),
            advertised: Vec::new(),
            next_arrival: 1,
        })
    }

    pub fn with_predictions(mut self, predictions: Vec<PredictedField>) -> Self {
        self.store = self.store.with_predictions(predictions);
        self
    }

    pub fn state(&self) -> &SharedState {
        self.store.get()
    }

    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    pub fn invocation(&self, id: &InvocationId) -> Option<&InvocationRecord> {
        self.invocations.get(id)
    }

    pub fn approval_status(&self, id: &InvocationId) -> Option<ApprovalStatus> {
        self.invocation(id).and_then(InvocationRecord::approval_status)
    }

    pub fn live_view(&self, id: &InvocationId) -> Option<&View> {
        self.dispatcher.live(id)
    }

    /// Unresolved invocations in arrival order.
    pub fn pending(&self) -> Vec<&InvocationRecord> {
        let mut pending: Vec<&InvocationRecord> = self.invocations.values().collect();
        pending.sort_by_key(|record| record.arrival);
        pending
    }

    pub fn is_archived(&self, id: &InvocationId) -> bool {
        self.archived.contains(id)
    }

    pub fn advertised(&self) -> &[CapabilitySpec] {
        &self.advertised
    }

    /// Oldest ids drop out once `archive_capacity` is reached.
    pub(crate) fn remember_archived(&mut self, id: InvocationId) {
        let cap = self.config.session.archive_capacity.max(1);
        if self.archived.len() == cap {
            self.archived.pop_front();
        }
        self.archived.push_back(id);
    }
}
