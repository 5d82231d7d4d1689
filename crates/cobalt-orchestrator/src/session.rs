//! Sessions: the pipeline context that holds agent state across tasks.

use crate::AgentRole;
use crate::task::Task;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

/// The policy governing whether stages run unattended, require approval,
/// or a mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressMode {
    /// All stages run unconditionally.
    Auto,
    /// Every stage requires approval.
    Interactive,
    /// Coordination and analysis run unattended; execution and review are
    /// gated.
    Hybrid,
}

impl FromStr for ProgressMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "interactive" => Ok(Self::Interactive),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for ProgressMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Interactive => write!(f, "interactive"),
            Self::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Per-agent-per-session scratch state.
///
/// Owned by the session; agents receive it for the duration of one call and
/// must not persist it beyond that.
#[derive(Debug, Clone, Serialize)]
pub struct AgentContext {
    /// Agent instance id, unique within the session.
    pub agent_id: String,
    /// The role this context belongs to.
    pub role: AgentRole,
    /// The owning session.
    pub session_id: String,
    /// Scratch memory for the agent.
    pub memory: Map<String, Value>,
    /// The last action the agent performed.
    pub last_action: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl AgentContext {
    /// Creates a fresh context for one role in one session.
    #[must_use]
    pub fn new(role: AgentRole, session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        let short = session_id.get(..8).unwrap_or(&session_id);
        Self {
            agent_id: format!("{role}-{short}"),
            role,
            session_id,
            memory: Map::new(),
            last_action: None,
            created_at: Utc::now(),
        }
    }
}

/// A logical pipeline context holding agent state across multiple tasks.
///
/// Sessions are destroyed explicitly via stop_session, never implicitly.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    /// Unique session id.
    pub id: String,
    /// The execution policy for tasks in this session.
    pub mode: ProgressMode,
    /// Tasks currently executing.
    pub active_tasks: Vec<Task>,
    /// Tasks that reached a terminal status.
    pub completed_tasks: Vec<Task>,
    /// One agent context per role, bound 1:1 to the session.
    pub agent_contexts: HashMap<AgentRole, AgentContext>,
    /// Context shared by every task in the session.
    pub global_context: Map<String, Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Creates a new session, materializing one agent context per role.
    #[must_use]
    pub fn new(mode: ProgressMode) -> Self {
        let id = Uuid::new_v4().to_string();
        let agent_contexts = AgentRole::ALL
            .iter()
            .map(|role| (*role, AgentContext::new(*role, id.clone())))
            .collect();

        Self {
            id,
            mode,
            active_tasks: Vec::new(),
            completed_tasks: Vec::new(),
            agent_contexts,
            global_context: Map::new(),
            created_at: Utc::now(),
        }
    }

    /// Read-only projection of the session's state.
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            mode: self.mode,
            created_at: self.created_at,
            active_tasks: self.active_tasks.len(),
            completed_tasks: self.completed_tasks.len(),
            agents: self.agent_contexts.len(),
        }
    }
}

/// Read-only summary of one session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    /// The session id.
    pub session_id: String,
    /// The session's progress mode.
    pub mode: ProgressMode,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Number of tasks currently executing.
    pub active_tasks: usize,
    /// Number of tasks that reached a terminal status.
    pub completed_tasks: usize,
    /// Number of agent contexts bound to the session.
    pub agents: usize,
}

/// Status answer for one session or for the orchestrator as a whole.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionStatus {
    /// Status of the requested session.
    Session(SessionSummary),
    /// The requested session does not exist.
    NotFound {
        /// The id that was asked for.
        session_id: String,
    },
    /// No session id given: an overview of all sessions.
    Overview {
        /// Number of live sessions.
        active_sessions: usize,
        /// Ids of all live sessions.
        session_ids: Vec<String>,
    },
}
