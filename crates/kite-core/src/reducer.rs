use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use super::action_registry::ActionBinding;
use super::action_registry::ActionDescriptor;
use super::action_registry::Availability;
use super::action_registry::CapabilitySpec;
use super::action_registry::HandlerContext;
use super::action_registry::RegisterOutcome;
use super::action_registry::RegistrationHandle;
use super::action_registry::SettleMode;
use super::actions::ActionInvocation;
use super::actions::AgentEvent;
use super::actions::HostAction;
use super::actions::SessionAction;
use super::actions::UserAction;
use super::approval::ApprovalMachine;
use super::approval::Responder;
use super::catalog;
use super::config::Config;
use super::error::ProtocolError;
use super::error::ProtocolResult;
use super::render::RenderContext;
use super::render::View;
use super::schema::validate_args;
use super::session::InvocationKind;
use super::session::InvocationRecord;
use super::session::Session;
use super::state::ApprovalStatus;
use super::state::InvocationId;
use super::state::LogEntry;
use super::state::LogLevel;
use super::state::LogSource;
use super::state::Notice;
use super::state::NoticeKind;
use super::state::SessionPhase;
use super::state::SharedState;
use super::store::StateChange;

/// Result relayed to the agent for an invocation the client executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionResult {
    Ok { value: Value },
    Error { code: String, message: String },
}

impl ActionResult {
    pub fn ok(value: Value) -> Self {
        Self::Ok { value }
    }

    pub fn error(err: &ProtocolError) -> Self {
        Self::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    SendUserMessage {
        message: String,
        context: Option<String>,
    },
    SyncState(SharedState),
    AdvertiseCapabilities(Vec<CapabilitySpec>),
    SendActionResult {
        invocation_id: InvocationId,
        result: ActionResult,
    },
    Render {
        invocation_id: InvocationId,
        action: String,
        view: View,
    },
    Discard {
        invocation_id: InvocationId,
    },
    RequestFrame,
    Notice(Notice),
    AssistantText(String),
}

impl SessionEffect {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SendUserMessage { .. } => "send_user_message",
            Self::SyncState(_) => "sync_state",
            Self::AdvertiseCapabilities(_) => "advertise_capabilities",
            Self::SendActionResult { .. } => "send_action_result",
            Self::Render { .. } => "render",
            Self::Discard { .. } => "discard",
            Self::RequestFrame => "request_frame",
            Self::Notice(_) => "notice",
            Self::AssistantText(_) => "assistant_text",
        }
    }
}

impl Session {
    /// A session over the proverbs application: its schema, predictions,
    /// initial state and built-in actions, with `actions.enable` applied.
    pub fn proverbs(config: Config) -> ProtocolResult<Self> {
        let enable = config.actions.enable.clone();
        let mut session = Session::new(config, catalog::proverbs_schema(), catalog::initial_state())?
            .with_predictions(catalog::proverbs_predictions());
        for descriptor in catalog::builtin_actions() {
            session.registry.register(descriptor, Vec::new())?;
        }
        for name in enable {
            session.registry.set_availability(&name, Availability::Enabled)?;
        }
        Ok(session)
    }

    /// Opening handshake: the capability list and the initial state.
    pub fn start(&mut self) -> Vec<SessionEffect> {
        let mut effects = Vec::new();
        self.advertised = self.registry.capabilities();
        effects.push(SessionEffect::AdvertiseCapabilities(self.advertised.clone()));
        effects.push(SessionEffect::SyncState(self.store.get().clone()));
        effects.push(SessionEffect::RequestFrame);
        tracing::info!(
            agent = %self.config.session.agent_name,
            capabilities = self.advertised.len(),
            "session started"
        );
        push_log(
            self,
            LogEntry::new(LogLevel::Info, LogSource::Session, "session started").context("lifecycle"),
        );
        effects
    }

    pub fn register(
        &mut self,
        descriptor: ActionDescriptor,
        deps: Vec<String>,
    ) -> ProtocolResult<(RegistrationHandle, Vec<SessionEffect>)> {
        let (handle, outcome) = self.registry.register(descriptor, deps)?;
        let mut effects = Vec::new();
        if outcome != RegisterOutcome::Unchanged {
            tracing::debug!(action = handle.name(), generation = handle.generation(), ?outcome, "action registered");
            rerender_live(self, Some(handle.name()), &mut effects);
            advertise_if_changed(self, &mut effects);
        }
        Ok((handle, effects))
    }

    /// Functional update of the shared state; see [`crate::store::StateStore::update`].
    pub fn update_state<F>(&mut self, updater: F) -> Vec<SessionEffect>
    where
        F: FnOnce(&SharedState) -> SharedState,
    {
        if !self.is_active() {
            return Vec::new();
        }
        let mut effects = Vec::new();
        match self.store.update(updater) {
            Ok(change) => state_changed(self, change, &mut effects),
            Err(err) => effects.push(notice(self, NoticeKind::SchemaValidation, err.to_string(), None)),
        }
        effects
    }
}

pub fn reduce(session: &mut Session, action: SessionAction) -> Vec<SessionEffect> {
    if session.phase == SessionPhase::Ended {
        tracing::debug!(?action, "session ended; action ignored");
        return Vec::new();
    }
    match action {
        SessionAction::User(user) => reduce_user(session, user),
        SessionAction::Agent(event) => reduce_agent(session, event),
        SessionAction::Host(host) => reduce_host(session, host),
    }
}

fn reduce_user(session: &mut Session, action: UserAction) -> Vec<SessionEffect> {
    match action {
        UserAction::SendMessage(message) => {
            let message = message.trim().to_string();
            if message.is_empty() {
                return Vec::new();
            }
            let context = serde_json::to_string(session.store.get()).ok();
            vec![SessionEffect::SendUserMessage { message, context }]
        }
        UserAction::SetState(state) => {
            let mut effects = Vec::new();
            match session.store.set(state) {
                Ok(change) => state_changed(session, change, &mut effects),
                Err(err) => {
                    effects.push(notice(session, NoticeKind::SchemaValidation, err.to_string(), None))
                }
            }
            effects
        }
        UserAction::Respond {
            invocation_id,
            decision,
        } => respond(session, invocation_id, decision),
        UserAction::EndSession => end_session(session),
    }
}

fn reduce_agent(session: &mut Session, event: AgentEvent) -> Vec<SessionEffect> {
    match event {
        AgentEvent::StateSnapshot { seq, state } => {
            let applied = SharedState::from_value(state)
                .map_err(ProtocolError::from)
                .and_then(|state| session.store.apply_remote(seq, state));
            match applied {
                Ok(change) => {
                    tracing::debug!(?seq, revision = change.revision, "agent state applied");
                    let mut effects = Vec::new();
                    state_changed(session, change, &mut effects);
                    effects
                }
                Err(err @ ProtocolError::StaleState { .. }) => {
                    vec![notice(session, NoticeKind::StaleState, err.to_string(), None)]
                }
                Err(err) => vec![notice(session, NoticeKind::SchemaValidation, err.to_string(), None)],
            }
        }
        AgentEvent::ActionInvoked(invocation) => dispatch_invocation(session, invocation),
        AgentEvent::ToolResult {
            invocation_id,
            result,
        } => tool_result(session, invocation_id, result),
        AgentEvent::AssistantText(text) => {
            if text.trim().is_empty() {
                return Vec::new();
            }
            vec![SessionEffect::AssistantText(text), SessionEffect::RequestFrame]
        }
    }
}

fn reduce_host(session: &mut Session, action: HostAction) -> Vec<SessionEffect> {
    match action {
        HostAction::Register { descriptor, deps } => match session.register(descriptor, deps) {
            Ok((_, effects)) => effects,
            Err(err) => vec![notice(session, NoticeKind::Registration, err.to_string(), None)],
        },
        HostAction::Unregister(handle) => {
            let mut effects = Vec::new();
            if session.registry.unregister(&handle) {
                tracing::debug!(action = handle.name(), "action unregistered");
                advertise_if_changed(session, &mut effects);
            }
            effects
        }
        HostAction::SetAvailability { name, availability } => {
            let mut effects = Vec::new();
            match session.registry.set_availability(&name, availability) {
                Ok(true) => {
                    push_log(
                        session,
                        LogEntry::new(
                            LogLevel::Info,
                            LogSource::Host,
                            format!("{name} is now {}", availability.label()),
                        )
                        .context("registry"),
                    );
                    advertise_if_changed(session, &mut effects);
                }
                Ok(false) => {}
                Err(err) => effects.push(notice(session, NoticeKind::Registration, err.to_string(), None)),
            }
            effects
        }
        HostAction::SetDisplay(display) => {
            if session.display == display {
                return Vec::new();
            }
            session.display = display;
            let mut effects = Vec::new();
            rerender_live(session, None, &mut effects);
            effects.push(SessionEffect::RequestFrame);
            effects
        }
        HostAction::MountState(initial) => {
            let mut effects = Vec::new();
            match session.store.remount(initial) {
                Ok(Some(change)) => state_changed(session, change, &mut effects),
                Ok(None) => {
                    tracing::debug!("initial state remount ignored after agent write");
                }
                Err(err) => {
                    effects.push(notice(session, NoticeKind::SchemaValidation, err.to_string(), None))
                }
            }
            effects
        }
        HostAction::SettleInvocation {
            invocation_id,
            result,
        } => settle(session, invocation_id, result),
        HostAction::TransportFailed(message) => {
            vec![notice(session, NoticeKind::Transport, message, None)]
        }
    }
}

fn dispatch_invocation(session: &mut Session, invocation: ActionInvocation) -> Vec<SessionEffect> {
    let ActionInvocation { id, name, args } = invocation;
    let mut effects = Vec::new();

    if session.invocations.contains_key(&id) {
        tracing::debug!(invocation = %id, "duplicate invocation; re-rendering");
        push_render(session, &id, &mut effects);
        return effects;
    }
    if session.is_archived(&id) {
        tracing::debug!(invocation = %id, "invocation already resolved; ignored");
        return effects;
    }

    push_log(
        session,
        LogEntry::new(LogLevel::Info, LogSource::Agent, format!("invoked {name}"))
            .context("dispatch")
            .invocation(&id),
    );

    let Some(descriptor) = session.registry.resolve(&name).map(Arc::clone) else {
        let err = ProtocolError::UnknownAction(name);
        effects.push(notice(session, NoticeKind::UnknownAction, err.to_string(), Some(&id)));
        relay(session, id, ActionResult::error(&err), &mut effects);
        return effects;
    };

    let args = match validate_args(&descriptor.parameters, &args) {
        Ok(args) => args,
        Err(err) => {
            let err = ProtocolError::from(err);
            effects.push(notice(session, NoticeKind::SchemaValidation, err.to_string(), Some(&id)));
            if matches!(descriptor.binding, ActionBinding::Remote) {
                // The agent runs remote actions itself; there is nothing to relay.
                session.remember_archived(id);
            } else {
                relay(session, id, ActionResult::error(&err), &mut effects);
            }
            return effects;
        }
    };

    match &descriptor.binding {
        ActionBinding::Remote => {
            match session.store.predict(&name, &args) {
                Ok(Some(change)) => state_changed(session, change, &mut effects),
                Ok(None) => {}
                Err(err) => {
                    effects.push(notice(session, NoticeKind::SchemaValidation, err.to_string(), Some(&id)))
                }
            }
            session.remember_archived(id);
        }
        ActionBinding::Handler(handler) => {
            let display_before = session.display.clone();
            let mut ctx = HandlerContext::new(&mut session.display, &mut session.store);
            let outcome = handler.handle(&args, &mut ctx);
            let changes = ctx.into_changes();

            for change in changes {
                state_changed(session, change, &mut effects);
            }
            if session.display != display_before {
                rerender_live(session, None, &mut effects);
                effects.push(SessionEffect::RequestFrame);
            }
            let result = match outcome {
                Ok(value) => ActionResult::ok(value.unwrap_or(Value::Null)),
                Err(err) => {
                    let err = ProtocolError::Handler {
                        name: name.clone(),
                        message: err.to_string(),
                    };
                    effects.push(notice(session, NoticeKind::Handler, err.to_string(), Some(&id)));
                    ActionResult::error(&err)
                }
            };
            relay(session, id, result, &mut effects);
        }
        ActionBinding::Render(_) | ActionBinding::RenderAndWait { .. } => {
            let kind = if descriptor.requires_approval() {
                InvocationKind::Approval(ApprovalMachine::new(id.clone()))
            } else {
                InvocationKind::Render { result: None }
            };
            let arrival = session.next_arrival;
            session.next_arrival += 1;
            let generation = session.registry.generation(&name).unwrap_or_default();
            session.invocations.insert(
                id.clone(),
                InvocationRecord {
                    id: id.clone(),
                    action: name,
                    args,
                    arrival,
                    generation,
                    kind,
                },
            );
            push_render(session, &id, &mut effects);
        }
    }
    effects
}

fn respond(session: &mut Session, id: InvocationId, decision: Value) -> Vec<SessionEffect> {
    let mut effects = Vec::new();
    let Some(record) = session.invocations.get_mut(&id) else {
        tracing::debug!(invocation = %id, "response for unknown or resolved invocation ignored");
        return effects;
    };
    let InvocationKind::Approval(machine) = &mut record.kind else {
        tracing::debug!(invocation = %id, "response for an invocation without approval ignored");
        return effects;
    };
    if let Err(err) = machine.respond(decision.clone()) {
        tracing::debug!(invocation = %id, %err, "response ignored");
        return effects;
    }
    let action = record.action.clone();
    push_log(
        session,
        LogEntry::new(LogLevel::Info, LogSource::Host, format!("decision {decision} for {action}"))
            .context("approval")
            .invocation(&id),
    );
    push_render(session, &id, &mut effects);

    let settle_mode = match session.registry.get(&action).map(|d| &d.binding) {
        Some(ActionBinding::RenderAndWait { settle, .. }) => *settle,
        _ => SettleMode::Immediate,
    };
    if settle_mode == SettleMode::Immediate {
        effects.extend(settle(session, id, decision));
    }
    effects
}

fn settle(session: &mut Session, id: InvocationId, result: Value) -> Vec<SessionEffect> {
    let mut effects = Vec::new();
    let Some(InvocationRecord {
        kind: InvocationKind::Approval(machine),
        ..
    }) = session.invocations.get_mut(&id)
    else {
        tracing::debug!(invocation = %id, "settle for unknown invocation ignored");
        return effects;
    };
    if let Err(err) = machine.settle(result.clone()) {
        tracing::debug!(invocation = %id, %err, "settle ignored");
        return effects;
    }
    push_render(session, &id, &mut effects);
    relay(session, id, ActionResult::ok(result), &mut effects);
    effects
}

fn tool_result(session: &mut Session, id: InvocationId, result: Value) -> Vec<SessionEffect> {
    let mut effects = Vec::new();
    match session.invocations.get_mut(&id) {
        Some(InvocationRecord {
            kind: InvocationKind::Render { result: slot },
            ..
        }) => {
            *slot = Some(result);
        }
        Some(_) => {
            tracing::debug!(invocation = %id, "agent result for approval-gated invocation ignored");
            return effects;
        }
        None => {
            tracing::debug!(invocation = %id, "agent result for untracked invocation");
            return effects;
        }
    }
    push_render(session, &id, &mut effects);
    archive(session, &id);
    effects.push(SessionEffect::RequestFrame);
    effects
}

fn end_session(session: &mut Session) -> Vec<SessionEffect> {
    let mut effects = Vec::new();
    let pending: Vec<InvocationId> = session.pending().into_iter().map(|record| record.id.clone()).collect();
    for id in pending {
        tracing::debug!(invocation = %id, "pending invocation discarded");
        archive(session, &id);
        effects.push(SessionEffect::Discard { invocation_id: id });
    }
    session.dispatcher.clear();
    session.phase = SessionPhase::Ended;
    tracing::info!(discarded = effects.len(), "session ended");
    push_log(
        session,
        LogEntry::new(LogLevel::Info, LogSource::Session, "session ended").context("lifecycle"),
    );
    effects.push(SessionEffect::RequestFrame);
    effects
}

fn render_view(session: &mut Session, id: &InvocationId) -> Option<(String, View)> {
    let record = session.invocations.get_mut(id)?;
    let generation = session.registry.generation(&record.action)?;
    if record.generation != generation {
        tracing::debug!(
            invocation = %id,
            from = record.generation,
            to = generation,
            "in-flight invocation routed to replacement descriptor"
        );
        record.generation = generation;
    }
    let record = session.invocations.get(id)?;
    let descriptor = session.registry.get(&record.action)?;
    let renderer = descriptor.binding.renderer()?;
    let (status, responder, decision, result) = match &record.kind {
        InvocationKind::Render { result } => (None, None, None, result.as_ref()),
        InvocationKind::Approval(machine) => {
            let responder = (machine.status() == ApprovalStatus::InProgress)
                .then(|| Responder::new(record.id.clone()));
            (Some(machine.status()), responder, machine.decision(), machine.result())
        }
    };
    let ctx = RenderContext {
        invocation_id: &record.id,
        action: &record.action,
        args: &record.args,
        status,
        responder,
        decision,
        result,
        display: &session.display,
    };
    let outcome = session.dispatcher.render(&**renderer, &ctx);
    Some((record.action.clone(), outcome.view))
}

fn push_render(session: &mut Session, id: &InvocationId, effects: &mut Vec<SessionEffect>) {
    match render_view(session, id) {
        Some((action, view)) => effects.push(SessionEffect::Render {
            invocation_id: id.clone(),
            action,
            view,
        }),
        None => tracing::debug!(invocation = %id, "no live renderer; render skipped"),
    }
}

/// Re-renders live invocations whose view depends on something that changed,
/// limited to `action` when given.
fn rerender_live(session: &mut Session, action: Option<&str>, effects: &mut Vec<SessionEffect>) {
    let ids: Vec<InvocationId> = session
        .pending()
        .into_iter()
        .filter(|record| action.map_or(true, |name| record.action == name))
        .map(|record| record.id.clone())
        .collect();
    for id in ids {
        let before = session.dispatcher.live(&id).cloned();
        if let Some((action, view)) = render_view(session, &id) {
            if before.as_ref() != Some(&view) {
                effects.push(SessionEffect::Render {
                    invocation_id: id,
                    action,
                    view,
                });
            }
        }
    }
}

fn relay(session: &mut Session, id: InvocationId, result: ActionResult, effects: &mut Vec<SessionEffect>) {
    tracing::debug!(invocation = %id, ok = result.is_ok(), "relaying action result");
    archive(session, &id);
    effects.push(SessionEffect::SendActionResult {
        invocation_id: id,
        result,
    });
}

fn archive(session: &mut Session, id: &InvocationId) {
    session.invocations.remove(id);
    session.dispatcher.retire(id);
    session.remember_archived(id.clone());
}

fn state_changed(session: &mut Session, change: StateChange, effects: &mut Vec<SessionEffect>) {
    push_log(
        session,
        LogEntry::new(
            LogLevel::Debug,
            LogSource::Session,
            format!("state revision {} ({})", change.revision, change.origin.label()),
        )
        .context("state"),
    );
    effects.push(SessionEffect::RequestFrame);
    if change.needs_sync() {
        effects.push(SessionEffect::SyncState(change.state));
    }
}

fn advertise_if_changed(session: &mut Session, effects: &mut Vec<SessionEffect>) {
    let capabilities = session.registry.capabilities();
    if capabilities != session.advertised {
        session.advertised = capabilities.clone();
        effects.push(SessionEffect::AdvertiseCapabilities(capabilities));
    }
}

fn notice(
    session: &mut Session,
    kind: NoticeKind,
    message: impl Into<String>,
    invocation: Option<&InvocationId>,
) -> SessionEffect {
    let message = message.into();
    tracing::warn!(kind = kind.label(), invocation = ?invocation, "{message}");
    let mut entry = LogEntry::new(LogLevel::Warn, LogSource::Session, message.clone()).context(kind.label());
    let mut notice = Notice::new(kind, message);
    if let Some(id) = invocation {
        entry = entry.invocation(id);
        notice = notice.for_invocation(id.clone());
    }
    push_log(session, entry);
    SessionEffect::Notice(notice)
}

fn push_log(session: &mut Session, mut entry: LogEntry) {
    entry.ts_ms = u64::try_from(chrono::Utc::now().timestamp_millis()).ok();
    session.logs.append(entry);
}

#[cfg(test)]
mod tests;
