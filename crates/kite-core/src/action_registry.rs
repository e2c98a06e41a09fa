use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::HandlerError;
use crate::error::ProtocolError;
use crate::error::ProtocolResult;
use crate::error::SchemaError;
use crate::render::ActionRenderer;
use crate::schema::ActionArgs;
use crate::schema::ParamSpec;
use crate::state::DisplayParams;
use crate::state::SharedState;
use crate::store::StateChange;
use crate::store::StateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Enabled,
    Disabled,
    Remote,
}

impl Availability {
    pub fn label(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Remote => "remote",
        }
    }

    pub fn is_advertised(self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// What a handler may touch: the host's display parameters and the shared
/// state, the latter only through the store.
pub struct HandlerContext<'a> {
    pub display: &'a mut DisplayParams,
    store: &'a mut StateStore,
    changes: Vec<StateChange>,
}

impl<'a> HandlerContext<'a> {
    pub fn new(display: &'a mut DisplayParams, store: &'a mut StateStore) -> Self {
        Self {
            display,
            store,
            changes: Vec::new(),
        }
    }

    pub fn state(&self) -> &SharedState {
        self.store.get()
    }

    pub fn set_state(&mut self, state: SharedState) -> Result<(), SchemaError> {
        let change = self.store.set(state)?;
        self.changes.push(change);
        Ok(())
    }

    pub fn into_changes(self) -> Vec<StateChange> {
        self.changes
    }
}

pub type HandlerResult = Result<Option<Value>, HandlerError>;

pub trait ActionHandler: Send + Sync {
    fn handle(&self, args: &ActionArgs, ctx: &mut HandlerContext<'_>) -> HandlerResult;
}

impl<F> ActionHandler for F
where
    F: Fn(&ActionArgs, &mut HandlerContext<'_>) -> HandlerResult + Send + Sync,
{
    fn handle(&self, args: &ActionArgs, ctx: &mut HandlerContext<'_>) -> HandlerResult {
        self(args, ctx)
    }
}

/// When an approval-gated invocation reaches `complete` after the human
/// responded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettleMode {
    /// No side effect: complete right after `executing`, relaying the
    /// decision.
    #[default]
    Immediate,
    /// The host runs a side effect and reports back with the result.
    Host,
}

#[derive(Clone)]
pub enum ActionBinding {
    Handler(Arc<dyn ActionHandler>),
    Render(Arc<dyn ActionRenderer>),
    RenderAndWait {
        renderer: Arc<dyn ActionRenderer>,
        settle: SettleMode,
    },
    /// Executed entirely by the agent.
    Remote,
}

impl ActionBinding {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Handler(_) => "handler",
            Self::Render(_) => "render",
            Self::RenderAndWait { .. } => "render_and_wait",
            Self::Remote => "remote",
        }
    }

    pub fn renderer(&self) -> Option<&Arc<dyn ActionRenderer>> {
        match self {
            Self::Render(renderer) | Self::RenderAndWait { renderer, .. } => Some(renderer),
            Self::Handler(_) | Self::Remote => None,
        }
    }
}

impl fmt::Debug for ActionBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RenderAndWait { settle, .. } => f
                .debug_struct("RenderAndWait")
                .field("settle", settle)
                .finish_non_exhaustive(),
            other => f.write_str(other.label()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActionDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
    pub availability: Availability,
    pub binding: ActionBinding,
}

impl ActionDescriptor {
    fn new(name: &str, description: &str, availability: Availability, binding: ActionBinding) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Vec::new(),
            availability,
            binding,
        }
    }

    pub fn handler(name: &str, description: &str, handler: impl ActionHandler + 'static) -> Self {
        Self::new(
            name,
            description,
            Availability::Enabled,
            ActionBinding::Handler(Arc::new(handler)),
        )
    }

    pub fn render(name: &str, description: &str, renderer: impl ActionRenderer + 'static) -> Self {
        Self::new(
            name,
            description,
            Availability::Enabled,
            ActionBinding::Render(Arc::new(renderer)),
        )
    }

    pub fn render_and_wait(
        name: &str,
        description: &str,
        renderer: impl ActionRenderer + 'static,
    ) -> Self {
        Self::new(
            name,
            description,
            Availability::Enabled,
            ActionBinding::RenderAndWait {
                renderer: Arc::new(renderer),
                settle: SettleMode::Immediate,
            },
        )
    }

    pub fn remote(name: &str, description: &str) -> Self {
        Self::new(name, description, Availability::Remote, ActionBinding::Remote)
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn available(mut self, availability: Availability) -> Self {
        self.availability = availability;
        self
    }

    pub fn settle(mut self, mode: SettleMode) -> Self {
        if let ActionBinding::RenderAndWait { settle, .. } = &mut self.binding {
            *settle = mode;
        }
        self
    }

    pub fn requires_approval(&self) -> bool {
        matches!(self.binding, ActionBinding::RenderAndWait { .. })
    }

    pub fn capability(&self) -> CapabilitySpec {
        CapabilitySpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
            availability: self.availability,
        }
    }

    fn validate(&self) -> ProtocolResult<()> {
        let reason = if self.name.trim().is_empty() {
            Some("name must not be empty")
        } else if matches!(self.availability, Availability::Remote)
            != matches!(self.binding, ActionBinding::Remote)
        {
            Some("remote availability requires a remote binding and vice versa")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(ProtocolError::Registration {
                name: self.name.clone(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Advertised view of a descriptor, the part the agent gets to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
    pub availability: Availability,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistrationHandle {
    name: String,
    generation: u64,
}

impl RegistrationHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Added,
    Replaced,
    Unchanged,
}

#[derive(Debug, Clone)]
struct Registration {
    descriptor: Arc<ActionDescriptor>,
    generation: u64,
    deps: Vec<String>,
}

/// Live descriptors keyed by name, kept in registration order.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    entries: Vec<Registration>,
    next_generation: u64,
}

impl ActionRegistry {
    /// Registers `descriptor`, replacing any live descriptor with the same
    /// name in place. Re-registering with an identical dependency list keeps
    /// the live registration.
    pub fn register(
        &mut self,
        descriptor: ActionDescriptor,
        deps: Vec<String>,
    ) -> ProtocolResult<(RegistrationHandle, RegisterOutcome)> {
        descriptor.validate()?;
        if let Some(entry) = self
            .entries
            .iter()
            .find(|entry| entry.descriptor.name == descriptor.name)
        {
            if entry.deps == deps {
                let handle = RegistrationHandle {
                    name: descriptor.name,
                    generation: entry.generation,
                };
                return Ok((handle, RegisterOutcome::Unchanged));
            }
        }

        let generation = self.bump_generation();
        let handle = RegistrationHandle {
            name: descriptor.name.clone(),
            generation,
        };
        let registration = Registration {
            descriptor: Arc::new(descriptor),
            generation,
            deps,
        };
        match self.position(&handle.name) {
            Some(idx) => {
                self.entries[idx] = registration;
                Ok((handle, RegisterOutcome::Replaced))
            }
            None => {
                self.entries.push(registration);
                Ok((handle, RegisterOutcome::Added))
            }
        }
    }

    /// Removes the registration `handle` refers to. Handles superseded by a
    /// later registration are ignored.
    pub fn unregister(&mut self, handle: &RegistrationHandle) -> bool {
        match self.position(&handle.name) {
            Some(idx) if self.entries[idx].generation == handle.generation => {
                self.entries.remove(idx);
                true
            }
            _ => false,
        }
    }

    pub fn set_availability(&mut self, name: &str, availability: Availability) -> ProtocolResult<bool> {
        let Some(idx) = self.position(name) else {
            return Err(ProtocolError::UnknownAction(name.to_string()));
        };
        if self.entries[idx].descriptor.availability == availability {
            return Ok(false);
        }
        let mut descriptor = ActionDescriptor::clone(&self.entries[idx].descriptor);
        descriptor.availability = availability;
        descriptor.validate()?;
        let generation = self.bump_generation();
        let entry = &mut self.entries[idx];
        entry.descriptor = Arc::new(descriptor);
        entry.generation = generation;
        Ok(true)
    }

    /// Any registered descriptor, advertised or not.
    pub fn get(&self, name: &str) -> Option<&Arc<ActionDescriptor>> {
        self.entries
            .iter()
            .find(|entry| entry.descriptor.name == name)
            .map(|entry| &entry.descriptor)
    }

    /// The descriptor an agent invocation routes to. Disabled descriptors
    /// are invisible here.
    pub fn resolve(&self, name: &str) -> Option<&Arc<ActionDescriptor>> {
        self.get(name)
            .filter(|descriptor| descriptor.availability.is_advertised())
    }

    pub fn generation(&self, name: &str) -> Option<u64> {
        self.position(name).map(|idx| self.entries[idx].generation)
    }

    pub fn capabilities(&self) -> Vec<CapabilitySpec> {
        self.entries
            .iter()
            .filter(|entry| entry.descriptor.availability.is_advertised())
            .map(|entry| entry.descriptor.capability())
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|entry| entry.descriptor.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.descriptor.name == name)
    }

    fn bump_generation(&mut self) -> u64 {
        self.next_generation = self.next_generation.saturating_add(1);
        self.next_generation
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::render::RenderContext;
    use crate::render::View;
    use crate::schema::SemanticType;

    fn noop(_: &ActionArgs, _: &mut HandlerContext<'_>) -> HandlerResult {
        Ok(None)
    }

    fn card(_: &RenderContext<'_>) -> View {
        View::new("card", "card")
    }

    #[test]
    fn registering_same_name_replaces_in_place() {
        let mut registry = ActionRegistry::default();
        registry
            .register(ActionDescriptor::handler("a", "first", noop), vec![])
            .unwrap();
        let (old, _) = registry
            .register(ActionDescriptor::render("b", "v1", card), vec!["red".into()])
            .unwrap();
        let (new, outcome) = registry
            .register(ActionDescriptor::render("b", "v2", card), vec!["blue".into()])
            .unwrap();

        assert_eq!(outcome, RegisterOutcome::Replaced);
        assert_eq!(registry.names(), vec!["a", "b"]);
        assert_eq!(registry.get("b").map(|d| d.description.as_str()), Some("v2"));
        assert!(new.generation() > old.generation());
    }

    #[test]
    fn unchanged_dependencies_keep_live_registration() {
        let mut registry = ActionRegistry::default();
        let (first, _) = registry
            .register(ActionDescriptor::render("b", "v1", card), vec!["red".into()])
            .unwrap();
        let (second, outcome) = registry
            .register(ActionDescriptor::render("b", "v2", card), vec!["red".into()])
            .unwrap();
        assert_eq!(outcome, RegisterOutcome::Unchanged);
        assert_eq!(first, second);
        assert_eq!(registry.get("b").map(|d| d.description.as_str()), Some("v1"));
    }

    #[test]
    fn stale_handle_does_not_unregister_replacement() {
        let mut registry = ActionRegistry::default();
        let (old, _) = registry
            .register(ActionDescriptor::render("b", "v1", card), vec!["1".into()])
            .unwrap();
        let (new, _) = registry
            .register(ActionDescriptor::render("b", "v2", card), vec!["2".into()])
            .unwrap();

        assert!(!registry.unregister(&old));
        assert_eq!(registry.len(), 1);
        assert!(registry.unregister(&new));
        assert!(registry.is_empty());
    }

    #[test]
    fn disabled_descriptors_are_withheld() {
        let mut registry = ActionRegistry::default();
        registry
            .register(
                ActionDescriptor::render("get_weather", "weather", card)
                    .param(ParamSpec::required("location", SemanticType::String))
                    .available(Availability::Disabled),
                vec![],
            )
            .unwrap();
        registry
            .register(ActionDescriptor::remote("update_proverbs", "write"), vec![])
            .unwrap();

        let names: Vec<String> = registry
            .capabilities()
            .into_iter()
            .map(|capability| capability.name)
            .collect();
        assert_eq!(names, vec!["update_proverbs".to_string()]);
        assert!(registry.resolve("get_weather").is_none());
        assert!(registry.get("get_weather").is_some());

        assert!(registry
            .set_availability("get_weather", Availability::Enabled)
            .unwrap());
        assert!(registry.resolve("get_weather").is_some());
    }

    #[test]
    fn remote_availability_requires_remote_binding() {
        let mut registry = ActionRegistry::default();
        let err = registry
            .register(
                ActionDescriptor::handler("a", "a", noop).available(Availability::Remote),
                vec![],
            )
            .unwrap_err();
        assert_eq!(err.code(), "registration");

        registry
            .register(ActionDescriptor::handler("a", "a", noop), vec![])
            .unwrap();
        assert!(registry.set_availability("a", Availability::Remote).is_err());
        assert_eq!(registry.get("a").map(|d| d.availability), Some(Availability::Enabled));
    }
}
