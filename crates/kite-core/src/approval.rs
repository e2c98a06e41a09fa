use serde_json::Value;

use crate::actions::SessionAction;
use crate::actions::UserAction;
use crate::error::ProtocolError;
use crate::error::ProtocolResult;
use crate::state::ApprovalStatus;
use crate::state::InvocationId;

/// Lifecycle of one approval-gated invocation:
/// `inProgress -> executing -> complete`, one step at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalMachine {
    invocation_id: InvocationId,
    status: ApprovalStatus,
    decision: Option<Value>,
    result: Option<Value>,
    history: Vec<ApprovalStatus>,
}

impl ApprovalMachine {
    pub fn new(invocation_id: InvocationId) -> Self {
        Self {
            invocation_id,
            status: ApprovalStatus::InProgress,
            decision: None,
            result: None,
            history: vec![ApprovalStatus::InProgress],
        }
    }

    pub fn invocation_id(&self) -> &InvocationId {
        &self.invocation_id
    }

    pub fn status(&self) -> ApprovalStatus {
        self.status
    }

    pub fn decision(&self) -> Option<&Value> {
        self.decision.as_ref()
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn history(&self) -> &[ApprovalStatus] {
        &self.history
    }

    pub fn is_complete(&self) -> bool {
        self.status == ApprovalStatus::Complete
    }

    /// Accepts the human decision. Only the first call counts.
    pub fn respond(&mut self, decision: Value) -> ProtocolResult<ApprovalStatus> {
        if self.status != ApprovalStatus::InProgress {
            return Err(ProtocolError::DuplicateResponse(self.invocation_id.clone()));
        }
        self.decision = Some(decision);
        self.advance(ApprovalStatus::Executing);
        Ok(self.status)
    }

    /// Marks the side effect implied by the decision as finished.
    pub fn settle(&mut self, result: Value) -> ProtocolResult<ApprovalStatus> {
        if self.status != ApprovalStatus::Executing {
            return Err(ProtocolError::InvalidTransition(self.invocation_id.clone()));
        }
        self.result = Some(result);
        self.advance(ApprovalStatus::Complete);
        Ok(self.status)
    }

    fn advance(&mut self, to: ApprovalStatus) {
        debug_assert_eq!(self.status.next(), Some(to));
        self.status = to;
        self.history.push(to);
    }
}

/// Response callback handed to approval-gated renderers. It does not mutate
/// anything itself; it produces the action the host feeds back into the
/// session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Responder {
    invocation_id: InvocationId,
}

impl Responder {
    pub fn new(invocation_id: InvocationId) -> Self {
        Self { invocation_id }
    }

    pub fn invocation_id(&self) -> &InvocationId {
        &self.invocation_id
    }

    pub fn respond(&self, decision: impl Into<Value>) -> SessionAction {
        SessionAction::User(UserAction::Respond {
            invocation_id: self.invocation_id.clone(),
            decision: decision.into(),
        })
    }
}
