//! Per-call session record
//!
//! One [`PeerSession`] exists per call attempt. It tracks the negotiated
//! descriptions, the accumulated candidates, and the status state machine:
//! forward-only `Idle → Connecting → (Connected | Failed)`, with a reset to
//! `Idle` on stop or graceful completion. Nothing here is persisted.

use crate::signaling::protocol::CandidatePayload;
use std::collections::HashMap;
use uuid::Uuid;

/// Connection status of a call session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No call in progress
    #[default]
    Idle,
    /// Negotiation or ICE checks in progress
    Connecting,
    /// Media flowing
    Connected,
    /// Attempt failed; a new start is required
    Failed,
}

/// Template variables supplied at call start, immutable once negotiation
/// begins
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallContext(HashMap<String, String>);

impl CallContext {
    /// Empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the underlying map
    pub fn vars(&self) -> &HashMap<String, String> {
        &self.0
    }
}

impl From<HashMap<String, String>> for CallContext {
    fn from(vars: HashMap<String, String>) -> Self {
        Self(vars)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for CallContext {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

/// State for one attempt at a real-time audio session
#[derive(Debug, Clone)]
pub struct PeerSession {
    pc_id: String,
    workflow_id: String,
    workflow_run_id: String,
    call_context: CallContext,
    status: ConnectionStatus,
    completed: bool,
    local_description: Option<String>,
    remote_description: Option<String>,
    local_candidates: Vec<CandidatePayload>,
    remote_candidates: Vec<CandidatePayload>,
}

impl PeerSession {
    /// Create a session for a workflow run with a fresh peer-connection id
    pub fn new(workflow_id: &str, workflow_run_id: &str, call_context: CallContext) -> Self {
        Self {
            pc_id: Uuid::new_v4().to_string(),
            workflow_id: workflow_id.to_string(),
            workflow_run_id: workflow_run_id.to_string(),
            call_context,
            status: ConnectionStatus::Idle,
            completed: false,
            local_description: None,
            remote_description: None,
            local_candidates: Vec::new(),
            remote_candidates: Vec::new(),
        }
    }

    /// Locally generated peer-connection id
    pub fn pc_id(&self) -> &str {
        &self.pc_id
    }

    /// Target workflow id
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    /// Target workflow run id
    pub fn workflow_run_id(&self) -> &str {
        &self.workflow_run_id
    }

    /// Call template variables
    pub fn call_context(&self) -> &CallContext {
        &self.call_context
    }

    /// Current status
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Whether the session ended gracefully (stop or server hangup)
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Whether the session is mid-attempt or connected
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            ConnectionStatus::Connecting | ConnectionStatus::Connected
        )
    }

    /// Enter `Connecting`. Only valid from `Idle`.
    pub fn begin(&mut self) {
        if self.status == ConnectionStatus::Idle && !self.completed {
            self.status = ConnectionStatus::Connecting;
        }
    }

    /// Mark media established
    pub fn mark_connected(&mut self) {
        if !self.completed && self.status != ConnectionStatus::Failed {
            self.status = ConnectionStatus::Connected;
        }
    }

    /// Mark the attempt failed. Completed sessions stay completed.
    pub fn fail(&mut self) {
        if !self.completed {
            self.status = ConnectionStatus::Failed;
        }
    }

    /// Graceful end: explicit stop or server-initiated disconnect.
    /// Status resets to `Idle`; this is not a failure.
    pub fn complete(&mut self) {
        self.completed = true;
        self.status = ConnectionStatus::Idle;
    }

    /// Record the local offer SDP
    pub fn set_local_description(&mut self, sdp: String) {
        self.local_description = Some(sdp);
    }

    /// Record the remote answer SDP
    pub fn set_remote_description(&mut self, sdp: String) {
        self.remote_description = Some(sdp);
    }

    /// Local offer SDP, once created
    pub fn local_description(&self) -> Option<&str> {
        self.local_description.as_deref()
    }

    /// Remote answer SDP, once applied
    pub fn remote_description(&self) -> Option<&str> {
        self.remote_description.as_deref()
    }

    /// Record a locally gathered candidate
    pub fn add_local_candidate(&mut self, candidate: CandidatePayload) {
        self.local_candidates.push(candidate);
    }

    /// Record a candidate received from the server
    pub fn add_remote_candidate(&mut self, candidate: CandidatePayload) {
        self.remote_candidates.push(candidate);
    }

    /// Locally gathered candidates so far
    pub fn local_candidates(&self) -> &[CandidatePayload] {
        &self.local_candidates
    }

    /// Remote candidates received so far
    pub fn remote_candidates(&self) -> &[CandidatePayload] {
        &self.remote_candidates
    }
}
