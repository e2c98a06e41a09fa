use kite_core::reduce;
use kite_core::AgentEvent;
use kite_core::HostAction;
use kite_core::PersistedSessionEvent;
use kite_core::Session;
use kite_core::SessionAction;
use kite_core::SessionEffect;
use kite_core::SessionEventStore;

use crate::contracts::OutboundMessage;
use crate::error::TransportResult;
use crate::transport::AgentTransport;

/// Upper bound on inbound messages drained per step, so a chatty transport
/// cannot starve the host.
pub const MAX_INBOUND_PER_STEP: usize = 256;

/// Feeds actions into a [`Session`], forwards outbound effects to the
/// transport and hands the local ones (renders, notices, frames) back to the
/// host.
pub struct SessionDriver<T> {
    session: Session,
    transport: T,
    journal: Option<SessionEventStore>,
}

impl<T: AgentTransport> SessionDriver<T> {
    pub fn new(session: Session, transport: T) -> Self {
        Self {
            session,
            transport,
            journal: None,
        }
    }

    pub fn with_journal(mut self, journal: SessionEventStore) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_parts(self) -> (Session, T) {
        (self.session, self.transport)
    }

    pub fn start(&mut self) -> TransportResult<Vec<SessionEffect>> {
        let capabilities = self
            .session
            .registry
            .capabilities()
            .into_iter()
            .map(|capability| capability.name)
            .collect();
        self.record(PersistedSessionEvent::SessionStarted {
            agent: self.session.config.session.agent_name.clone(),
            capabilities,
        });
        let effects = self.session.start();
        self.deliver(effects)
    }

    /// Reduces one action and delivers its effects. A transport failure is
    /// recorded in the session as a notice and returned; the session stays
    /// usable.
    pub fn dispatch(&mut self, action: SessionAction) -> TransportResult<Vec<SessionEffect>> {
        if let Some(event) = PersistedSessionEvent::from_action(&action, &self.session) {
            self.record(event);
        }
        let effects = reduce(&mut self.session, action);
        self.deliver(effects)
    }

    /// Drains queued inbound messages into the session.
    pub fn pump(&mut self) -> TransportResult<Vec<SessionEffect>> {
        let mut local = Vec::new();
        for _ in 0..MAX_INBOUND_PER_STEP {
            let message = match self.transport.poll() {
                Ok(Some(message)) => message,
                Ok(None) => return Ok(local),
                Err(err) => {
                    self.transport_failed(&err.to_string());
                    return Err(err);
                }
            };
            let event = AgentEvent::from(message);
            local.extend(self.dispatch(SessionAction::Agent(event))?);
        }
        tracing::debug!(limit = MAX_INBOUND_PER_STEP, "inbound drain limit reached");
        Ok(local)
    }

    /// `dispatch` followed by `pump`.
    pub fn step(&mut self, action: SessionAction) -> TransportResult<Vec<SessionEffect>> {
        let mut local = self.dispatch(action)?;
        local.extend(self.pump()?);
        Ok(local)
    }

    fn deliver(&mut self, effects: Vec<SessionEffect>) -> TransportResult<Vec<SessionEffect>> {
        let mut local = Vec::new();
        for effect in effects {
            if let Some(event) = PersistedSessionEvent::from_effect(&effect) {
                self.record(event);
            }
            match OutboundMessage::from_effect(&effect) {
                Some(message) => {
                    tracing::debug!(kind = message.label(), "sending to agent");
                    if let Err(err) = self.transport.send(message) {
                        self.transport_failed(&err.to_string());
                        return Err(err);
                    }
                }
                None => local.push(effect),
            }
        }
        Ok(local)
    }

    fn transport_failed(&mut self, message: &str) {
        let effects = reduce(
            &mut self.session,
            SessionAction::Host(HostAction::TransportFailed(message.to_string())),
        );
        for effect in &effects {
            if let Some(event) = PersistedSessionEvent::from_effect(effect) {
                self.record(event);
            }
        }
    }

    fn record(&mut self, event: PersistedSessionEvent) {
        let Some(journal) = self.journal.as_mut() else {
            return;
        };
        if let Err(err) = journal.append(event) {
            tracing::warn!(%err, path = %journal.path().display(), "journal append failed");
        }
    }
}
