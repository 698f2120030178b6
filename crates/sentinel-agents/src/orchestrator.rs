//! Agent session orchestrator — start, track, cancel.
//!
//! Sessions run as independent tokio tasks that race freely; the
//! orchestrator only tracks their metadata. Cancellation is a request:
//! the agent's cooperative flag is set and the session is marked
//! CANCELLED immediately, but the agent keeps running until it polls
//! the flag and breaks out.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use sentinel_core::{AgentResult, AgentStatus, AgentType, TenantId};
use sentinel_engram::EngramStore;

use crate::agent::{Agent, CancelFlag};

/// Errors from orchestrator session lookups.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Unknown session: {0}")]
    UnknownSession(Uuid),
}

/// In-memory record of a running or completed agent session.
#[derive(Clone)]
pub struct AgentSession {
    pub session_id: Uuid,
    pub agent_id: String,
    pub agent_type: AgentType,
    pub tenant_id: TenantId,
    pub status: AgentStatus,
    pub created_at: DateTime<Utc>,
    pub result: Option<AgentResult>,
    cancel: CancelFlag,
}

/// Manages agent sessions: start, track, cancel.
#[derive(Default)]
pub struct AgentOrchestrator {
    sessions: Arc<RwLock<HashMap<Uuid, AgentSession>>>,
    store: Option<Arc<dyn EngramStore>>,
}

impl AgentOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// An orchestrator that persists each run's finalized engram.
    pub fn with_store(store: Arc<dyn EngramStore>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            store: Some(store),
        }
    }

    /// Start an agent session in the background. Returns the session id.
    pub async fn start(
        &self,
        mut agent: Box<dyn Agent>,
        intent: &str,
        context: serde_json::Value,
    ) -> Uuid {
        let session_id = Uuid::new_v4();
        let core = agent.core();
        let session = AgentSession {
            session_id,
            agent_id: core.config.agent_id.clone(),
            agent_type: core.config.agent_type,
            tenant_id: core.config.tenant_id,
            status: AgentStatus::Running,
            created_at: Utc::now(),
            result: None,
            cancel: core.cancel_flag(),
        };
        self.sessions.write().await.insert(session_id, session);

        let sessions = self.sessions.clone();
        let store = self.store.clone();
        let intent = intent.to_string();

        tokio::spawn(async move {
            let result = agent.run(&intent, context).await;

            // Persist the reasoning trail; a store failure fails the session.
            let mut store_error = None;
            if let Some(store) = store.as_ref() {
                if let Some(engram) = agent.core_mut().take_finalized_engram() {
                    if let Err(e) = store.save(&engram) {
                        tracing::error!(
                            session_id = %session_id,
                            engram_id = %engram.id,
                            error = %e,
                            "Failed to store engram"
                        );
                        store_error = Some(e.to_string());
                    }
                }
            }

            let mut sessions = sessions.write().await;
            let Some(session) = sessions.get_mut(&session_id) else {
                return;
            };

            if let Some(error) = store_error {
                let mut failed = result;
                failed.status = AgentStatus::Failed;
                failed.error = Some(error);
                session.status = AgentStatus::Failed;
                session.result = Some(failed);
            } else if session.status == AgentStatus::Cancelled {
                // The cancel override wins over a cooperative completion.
                session.result = Some(result);
            } else {
                session.status = result.status;
                session.result = Some(result);
            }
        });

        session_id
    }

    /// Request cancellation of an agent session.
    ///
    /// This does not guarantee immediate termination — agents must poll
    /// their cancellation flag between units of work.
    pub async fn cancel(&self, session_id: Uuid) -> Result<(), OrchestratorError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or(OrchestratorError::UnknownSession(session_id))?;
        session.cancel.cancel();
        session.status = AgentStatus::Cancelled;
        Ok(())
    }

    /// Get the current session state.
    pub async fn get_status(&self, session_id: Uuid) -> Result<AgentSession, OrchestratorError> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or(OrchestratorError::UnknownSession(session_id))
    }

    /// List all sessions, optionally filtered by tenant.
    pub async fn list_sessions(&self, tenant_id: Option<TenantId>) -> Vec<AgentSession> {
        let sessions = self.sessions.read().await;
        let mut listed: Vec<AgentSession> = sessions
            .values()
            .filter(|s| tenant_id.map_or(true, |t| s.tenant_id == t))
            .cloned()
            .collect();
        listed.sort_by_key(|s| s.created_at);
        listed
    }
}
