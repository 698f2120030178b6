//! Base agent lifecycle with engram integration.
//!
//! The lifecycle is `init → plan → execute → report`. Concrete agents
//! supply the `plan`/`execute` template methods and share everything else
//! through [`AgentCore`]: dependencies, status, the active engram session,
//! and the cancellation flag. Every run that enters the plan phase leaves a
//! finalized engram, whether it completes, fails, or is cancelled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use sentinel_core::{AgentConfig, AgentPlan, AgentResult, AgentStatus, SentinelError};
use sentinel_engram::{Engram, EngramSession};
use sentinel_policy::PolicyEngine;

use crate::error::AgentError;
use crate::llm::LlmProvider;
use crate::tools::{ToolCallContext, ToolError, ToolRegistry, ToolResult};

/// Shared cancellation signal.
///
/// Cancellation is cooperative: setting the flag does not interrupt the
/// agent; playbooks poll it between long-running units of work.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Shared state and dependencies for every agent.
pub struct AgentCore {
    pub config: AgentConfig,
    pub llm: Arc<dyn LlmProvider>,
    pub tools: Arc<ToolRegistry>,
    pub policy: Option<Arc<dyn PolicyEngine>>,
    pub status: AgentStatus,
    cancel: CancelFlag,
    session: Option<EngramSession>,
    finalized: Option<Engram>,
}

impl AgentCore {
    /// Build the shared core, validating the configuration.
    pub fn new(
        config: AgentConfig,
        llm: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        policy: Option<Arc<dyn PolicyEngine>>,
    ) -> Result<Self, SentinelError> {
        config.validate()?;
        Ok(Self {
            config,
            llm,
            tools,
            policy,
            status: AgentStatus::Pending,
            cancel: CancelFlag::new(),
            session: None,
            finalized: None,
        })
    }

    /// Signal cancellation. Playbooks check [`Self::is_cancelled`].
    pub fn request_cancel(&self) {
        self.cancel.cancel();
    }

    /// True if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A handle that keeps working after the agent moves into a task.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// The active engram session, present while a run is in flight.
    pub fn session_mut(&mut self) -> Option<&mut EngramSession> {
        self.session.as_mut()
    }

    /// Record an action into the active session, if any.
    pub fn record_action(
        &mut self,
        action_type: &str,
        description: &str,
        details: serde_json::Value,
        success: bool,
    ) {
        if let Some(session) = self.session.as_mut() {
            session.add_action(action_type, description, details, success);
        }
    }

    /// Take the engram finalized by the last run, if any.
    pub fn take_finalized_engram(&mut self) -> Option<Engram> {
        self.finalized.take()
    }

    /// Execute a registered tool with policy check and engram recording.
    pub async fn execute_tool(
        &mut self,
        name: &str,
        params: serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        let tools = self.tools.clone();
        let policy = self.policy.clone();
        tools
            .execute(
                name,
                self.config.agent_type,
                params,
                ToolCallContext {
                    policy: policy.as_deref(),
                    agent_id: &self.config.agent_id,
                    tenant_id: self.config.tenant_id.to_string(),
                    session: self.session.as_mut(),
                },
            )
            .await
    }
}

/// JSON schema handed to the LLM for structured plan generation.
pub fn plan_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "description": {"type": "string"},
            "rationale": {"type": "string"},
            "confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0},
            "steps": {"type": "array", "items": {"type": "string"}},
            "alternatives": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "option": {"type": "string"},
                        "reason": {"type": "string"}
                    },
                    "required": ["option", "reason"]
                }
            }
        },
        "required": ["description", "rationale", "confidence", "steps"]
    })
}

/// An agent: a concrete planner/executor pair over the shared lifecycle.
#[async_trait]
pub trait Agent: Send {
    fn core(&self) -> &AgentCore;
    fn core_mut(&mut self) -> &mut AgentCore;

    /// Produce an execution plan given the intent and context.
    async fn plan(
        &mut self,
        intent: &str,
        context: &serde_json::Value,
    ) -> Result<AgentPlan, AgentError>;

    /// Execute the plan and return structured results.
    async fn execute(&mut self, plan: &AgentPlan) -> Result<AgentResult, AgentError>;

    /// Full lifecycle: init → plan → execute → report.
    ///
    /// Creates an engram session, runs the plan and execute phases,
    /// records decisions and actions, and finalizes the session
    /// unconditionally. Phase failures are converted into a failed
    /// result — they never propagate out of `run`.
    async fn run(&mut self, intent: &str, context: serde_json::Value) -> AgentResult {
        let started_at;
        {
            let core = self.core_mut();
            core.status = AgentStatus::Running;
            let mut session =
                EngramSession::new(core.config.tenant_id.0, &core.config.agent_id, intent);
            session.set_context(context.clone());
            started_at = session.started_at();
            core.session = Some(session);
        }

        let outcome = match self.plan(intent, &context).await {
            Ok(plan) => {
                if let Some(session) = self.core_mut().session.as_mut() {
                    session.add_decision(&plan.description, &plan.rationale, plan.confidence);
                    for alt in &plan.alternatives {
                        session.add_alternative(&alt.option, &alt.reason);
                    }
                }
                self.execute(&plan).await
            }
            Err(e) => Err(e),
        };

        let mut result = match outcome {
            Ok(mut result) => {
                let core = self.core_mut();
                core.record_action(
                    "execution_complete",
                    &format!("Completed with {} findings", result.findings.len()),
                    serde_json::json!({
                        "findings": result.findings.len(),
                        "actions": result.actions_taken,
                    }),
                    true,
                );
                core.status = AgentStatus::Completed;
                result.status = AgentStatus::Completed;
                result
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(
                    agent_id = %self.core().config.agent_id,
                    error = %message,
                    "Agent run failed"
                );
                let core = self.core_mut();
                core.record_action("execution_failed", &message, serde_json::Value::Null, false);
                core.status = AgentStatus::Failed;
                AgentResult::failure(&core.config, started_at, message)
            }
        };

        let core = self.core_mut();
        if let Some(session) = core.session.take() {
            let engram = session.finalize();
            result.engram_id = Some(engram.id.0);
            result.completed_at = engram.completed_at;
            core.finalized = Some(engram);
        }

        result
    }
}
