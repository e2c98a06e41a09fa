use std::fs::File;
use std::fs::OpenOptions;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::actions::AgentEvent;
use crate::actions::SessionAction;
use crate::actions::UserAction;
use crate::reducer::ActionResult;
use crate::reducer::SessionEffect;
use crate::session::Session;
use crate::state::ApprovalStatus;

/// Protocol milestones worth keeping across runs. Message text is never
/// recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PersistedSessionEvent {
    SessionStarted {
        agent: String,
        capabilities: Vec<String>,
    },
    CapabilitiesAdvertised {
        capabilities: Vec<String>,
    },
    StateReceived {
        seq: Option<u64>,
    },
    StateSynced {
        state: Value,
    },
    InvocationReceived {
        invocation_id: String,
        action: String,
    },
    ApprovalResolved {
        invocation_id: String,
        decision: Value,
    },
    ResultRelayed {
        invocation_id: String,
        status: String,
        code: Option<String>,
    },
    InvocationDiscarded {
        invocation_id: String,
    },
    NoticeRaised {
        notice: String,
        message: String,
    },
    SessionEnded,
}

impl PersistedSessionEvent {
    /// Milestone for an action about to be reduced, or `None` when the
    /// session will ignore it: anything after the end, a response the
    /// approval machine would reject, or an invocation id already seen.
    pub fn from_action(action: &SessionAction, session: &Session) -> Option<Self> {
        if !session.is_active() {
            return None;
        }
        match action {
            SessionAction::Agent(AgentEvent::StateSnapshot { seq, .. }) => {
                Some(Self::StateReceived { seq: *seq })
            }
            SessionAction::Agent(AgentEvent::ActionInvoked(invocation)) => {
                let seen = session.invocation(&invocation.id).is_some()
                    || session.is_archived(&invocation.id);
                (!seen).then(|| Self::InvocationReceived {
                    invocation_id: invocation.id.to_string(),
                    action: invocation.name.clone(),
                })
            }
            SessionAction::User(UserAction::Respond {
                invocation_id,
                decision,
            }) => (session.approval_status(invocation_id) == Some(ApprovalStatus::InProgress))
                .then(|| Self::ApprovalResolved {
                    invocation_id: invocation_id.to_string(),
                    decision: decision.clone(),
                }),
            SessionAction::User(UserAction::EndSession) => Some(Self::SessionEnded),
            _ => None,
        }
    }

    pub fn from_effect(effect: &SessionEffect) -> Option<Self> {
        match effect {
            SessionEffect::AdvertiseCapabilities(capabilities) => {
                Some(Self::CapabilitiesAdvertised {
                    capabilities: capabilities.iter().map(|c| c.name.clone()).collect(),
                })
            }
            SessionEffect::SyncState(state) => Some(Self::StateSynced {
                state: state.to_value(),
            }),
            SessionEffect::SendActionResult {
                invocation_id,
                result,
            } => {
                let (status, code) = match result {
                    ActionResult::Ok { .. } => ("ok", None),
                    ActionResult::Error { code, .. } => ("error", Some(code.clone())),
                };
                Some(Self::ResultRelayed {
                    invocation_id: invocation_id.to_string(),
                    status: status.to_string(),
                    code,
                })
            }
            SessionEffect::Discard { invocation_id } => Some(Self::InvocationDiscarded {
                invocation_id: invocation_id.to_string(),
            }),
            SessionEffect::Notice(notice) => Some(Self::NoticeRaised {
                notice: notice.kind.label().to_string(),
                message: notice.message.to_string(),
            }),
            SessionEffect::SendUserMessage { .. }
            | SessionEffect::Render { .. }
            | SessionEffect::RequestFrame
            | SessionEffect::AssistantText(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSessionEventRecord {
    pub seq: u64,
    pub ts_ms: i64,
    #[serde(flatten)]
    pub event: PersistedSessionEvent,
}

#[derive(Debug)]
pub struct SessionEventStore {
    path: PathBuf,
    next_seq: u64,
}

impl SessionEventStore {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let existing = load_records(path.as_path())?;
        let next_seq = existing
            .iter()
            .map(|record| record.seq)
            .max()
            .map_or(1, |seq| seq.saturating_add(1));
        Ok(Self { path, next_seq })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, event: PersistedSessionEvent) -> std::io::Result<u64> {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        let record = PersistedSessionEventRecord {
            seq,
            ts_ms: chrono::Utc::now().timestamp_millis(),
            event,
        };
        let line = serde_json::to_string(&record)
            .map_err(|err| std::io::Error::other(format!("serialize: {err}")))?;
        append_line(self.path.as_path(), line.as_str())?;
        Ok(seq)
    }

    pub fn load(&self) -> std::io::Result<Vec<PersistedSessionEventRecord>> {
        load_records(self.path.as_path())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JournalSummary {
    pub sessions: usize,
    pub invocations: usize,
    pub approvals: usize,
    pub results_ok: usize,
    pub results_error: usize,
    pub discarded: usize,
    pub notices: usize,
    pub last_seq: Option<u64>,
    pub last_session_ended: bool,
}

pub fn summarize(records: &[PersistedSessionEventRecord]) -> JournalSummary {
    let mut summary = JournalSummary::default();
    for record in records {
        summary.last_seq = Some(record.seq);
        match &record.event {
            PersistedSessionEvent::SessionStarted { .. } => {
                summary.sessions += 1;
                summary.last_session_ended = false;
            }
            PersistedSessionEvent::InvocationReceived { .. } => summary.invocations += 1,
            PersistedSessionEvent::ApprovalResolved { .. } => summary.approvals += 1,
            PersistedSessionEvent::ResultRelayed { status, .. } => {
                if status == "ok" {
                    summary.results_ok += 1;
                } else {
                    summary.results_error += 1;
                }
            }
            PersistedSessionEvent::InvocationDiscarded { .. } => summary.discarded += 1,
            PersistedSessionEvent::NoticeRaised { .. } => summary.notices += 1,
            PersistedSessionEvent::SessionEnded => summary.last_session_ended = true,
            PersistedSessionEvent::CapabilitiesAdvertised { .. }
            | PersistedSessionEvent::StateReceived { .. }
            | PersistedSessionEvent::StateSynced { .. } => {}
        }
    }
    summary
}

fn load_records(path: &Path) -> std::io::Result<Vec<PersistedSessionEventRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<PersistedSessionEventRecord>(&line) {
            Ok(record) => records.push(record),
            Err(err) => tracing::warn!(%err, "skipping unreadable journal line"),
        }
    }
    Ok(records)
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut opts = OpenOptions::new();
    opts.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    let mut file = opts.open(path)?;
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    file.flush()?;
    Ok(())
}
