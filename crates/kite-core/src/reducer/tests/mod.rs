pub(super) use serde_json::json;
pub(super) use serde_json::Value;

pub(super) use super::reduce;
pub(super) use super::ActionResult;
pub(super) use super::SessionEffect;
pub(super) use crate::action_registry::ActionDescriptor;
pub(super) use crate::action_registry::Availability;
pub(super) use crate::action_registry::HandlerContext;
pub(super) use crate::action_registry::HandlerResult;
pub(super) use crate::action_registry::SettleMode;
pub(super) use crate::actions::ActionInvocation;
pub(super) use crate::actions::AgentEvent;
pub(super) use crate::actions::HostAction;
pub(super) use crate::actions::SessionAction;
pub(super) use crate::actions::UserAction;
pub(super) use crate::catalog;
pub(super) use crate::config::Config;
pub(super) use crate::render::RenderContext;
pub(super) use crate::render::View;
pub(super) use crate::schema::ActionArgs;
pub(super) use crate::schema::ParamSpec;
pub(super) use crate::schema::SemanticType;
pub(super) use crate::session::Session;
pub(super) use crate::state::ApprovalStatus;
pub(super) use crate::state::DisplayParams;
pub(super) use crate::state::InvocationId;
pub(super) use crate::state::NoticeKind;
pub(super) use crate::state::SharedState;

mod registry_replace;
mod state_sync;

fn session() -> Session {
    let mut session = Session::proverbs(Config::default()).unwrap();
    session.start();
    session
}

fn session_with(enable: &[&str]) -> Session {
    let mut config = Config::default();
    config.actions.enable = enable.iter().map(|name| name.to_string()).collect();
    let mut session = Session::proverbs(config).unwrap();
    session.start();
    session
}

fn run_user(session: &mut Session, action: UserAction) -> Vec<SessionEffect> {
    reduce(session, SessionAction::User(action))
}

fn run_agent(session: &mut Session, event: AgentEvent) -> Vec<SessionEffect> {
    reduce(session, SessionAction::Agent(event))
}

fn run_host(session: &mut Session, action: HostAction) -> Vec<SessionEffect> {
    reduce(session, SessionAction::Host(action))
}

fn invoke(session: &mut Session, id: &str, name: &str, args: Value) -> Vec<SessionEffect> {
    run_agent(
        session,
        AgentEvent::ActionInvoked(ActionInvocation::new(id, name, args)),
    )
}

fn snapshot(session: &mut Session, seq: Option<u64>, state: Value) -> Vec<SessionEffect> {
    run_agent(session, AgentEvent::StateSnapshot { seq, state })
}

fn respond(session: &mut Session, id: &str, decision: &str) -> Vec<SessionEffect> {
    run_user(
        session,
        UserAction::Respond {
            invocation_id: id.into(),
            decision: json!(decision),
        },
    )
}

fn results(effects: &[SessionEffect]) -> Vec<(&str, &ActionResult)> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            SessionEffect::SendActionResult {
                invocation_id,
                result,
            } => Some((invocation_id.as_str(), result)),
            _ => None,
        })
        .collect()
}

fn renders(effects: &[SessionEffect]) -> Vec<&View> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            SessionEffect::Render { view, .. } => Some(view),
            _ => None,
        })
        .collect()
}

fn notices(effects: &[SessionEffect]) -> Vec<NoticeKind> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            SessionEffect::Notice(notice) => Some(notice.kind),
            _ => None,
        })
        .collect()
}

fn synced(effects: &[SessionEffect]) -> Vec<&SharedState> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            SessionEffect::SyncState(state) => Some(state),
            _ => None,
        })
        .collect()
}

fn error_code(result: &ActionResult) -> Option<&str> {
    match result {
        ActionResult::Error { code, .. } => Some(code.as_str()),
        ActionResult::Ok { .. } => None,
    }
}
