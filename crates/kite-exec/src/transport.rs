use std::collections::VecDeque;
use std::path::Path;

use crate::contracts::InboundMessage;
use crate::contracts::OutboundMessage;
use crate::error::TransportError;
use crate::error::TransportResult;

/// Chat transport to the agent runtime. `poll` never blocks; `Ok(None)`
/// means nothing is queued right now.
pub trait AgentTransport {
    fn send(&mut self, message: OutboundMessage) -> TransportResult<()>;
    fn poll(&mut self) -> TransportResult<Option<InboundMessage>>;
}

impl<T: AgentTransport + ?Sized> AgentTransport for Box<T> {
    fn send(&mut self, message: OutboundMessage) -> TransportResult<()> {
        (**self).send(message)
    }

    fn poll(&mut self) -> TransportResult<Option<InboundMessage>> {
        (**self).poll()
    }
}

/// Replays a fixed list of inbound messages and records everything sent.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    inbound: VecDeque<InboundMessage>,
    sent: Vec<OutboundMessage>,
    closed: bool,
}

impl ScriptedTransport {
    pub fn new(inbound: impl IntoIterator<Item = InboundMessage>) -> Self {
        Self {
            inbound: inbound.into_iter().collect(),
            sent: Vec::new(),
            closed: false,
        }
    }

    /// One JSON message per line; blank lines and `#` comments are skipped.
    pub fn from_jsonl(input: &str) -> TransportResult<Self> {
        let mut inbound = Vec::new();
        for (idx, line) in input.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let message: InboundMessage = serde_json::from_str(line).map_err(|source| TransportError::Malformed {
                line: idx + 1,
                source,
            })?;
            inbound.push(message);
        }
        Ok(Self::new(inbound))
    }

    pub fn open(path: impl AsRef<Path>) -> TransportResult<Self> {
        let input = std::fs::read_to_string(path)?;
        Self::from_jsonl(&input)
    }

    pub fn sent(&self) -> &[OutboundMessage] {
        &self.sent
    }

    pub fn remaining(&self) -> usize {
        self.inbound.len()
    }

    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl AgentTransport for ScriptedTransport {
    fn send(&mut self, message: OutboundMessage) -> TransportResult<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        tracing::debug!(kind = message.label(), "scripted send");
        self.sent.push(message);
        Ok(())
    }

    fn poll(&mut self) -> TransportResult<Option<InboundMessage>> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.inbound.pop_front())
    }
}
