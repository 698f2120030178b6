//! Tool registry with policy enforcement and engram recording.
//!
//! Every tool invocation runs the same ordered gauntlet: lookup, agent-type
//! allowlist, policy engine, handler — short-circuiting on the first
//! failure. Denials and handler failures are recorded into the caller's
//! engram session before the error propagates.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use sentinel_core::AgentType;
use sentinel_engram::EngramSession;
use sentinel_policy::{PolicyEngine, PolicyInput};

/// Errors from tool registry operations.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Policy denied tool '{tool}': {}", .reasons.join(", "))]
    PolicyViolation { tool: String, reasons: Vec<String> },

    #[error("Tool '{tool}' failed: {message}")]
    Execution { tool: String, message: String },
}

/// Parameter value kinds accepted by tools.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Boolean,
    Object,
}

/// Schema for a single tool parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParam {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// Result returned from a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default)]
    pub data: serde_json::Value,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: serde_json::Value::Null,
            error: Some(error.into()),
        }
    }
}

/// A tool that agents can invoke.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// Which agent types may use this tool. Checked before policy.
    pub agent_types: Vec<AgentType>,
    #[serde(default)]
    pub params: Vec<ToolParam>,
}

/// Async tool handler taking the call parameters as a JSON object.
pub type ToolHandler =
    Arc<dyn Fn(serde_json::Value) -> BoxFuture<'static, anyhow::Result<ToolResult>> + Send + Sync>;

/// Caller identity and recording hooks for one tool invocation.
pub struct ToolCallContext<'a> {
    pub policy: Option<&'a dyn PolicyEngine>,
    pub agent_id: &'a str,
    pub tenant_id: String,
    pub session: Option<&'a mut EngramSession>,
}

/// Registry of available tools with policy-checked execution.
#[derive(Default)]
pub struct ToolRegistry {
    entries: HashMap<String, (Tool, ToolHandler)>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool and its handler.
    pub fn register<F, Fut>(&mut self, tool: Tool, handler: F)
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ToolResult>> + Send + 'static,
    {
        let handler: ToolHandler = Arc::new(move |params| Box::pin(handler(params)));
        self.entries.insert(tool.name.clone(), (tool, handler));
    }

    /// Look up a tool and its handler by name.
    pub fn get(&self, name: &str) -> Result<&(Tool, ToolHandler), ToolError> {
        self.entries
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// Return tools available to the given agent type.
    pub fn list_for_agent_type(&self, agent_type: AgentType) -> Vec<&Tool> {
        let mut tools: Vec<&Tool> = self
            .entries
            .values()
            .filter(|(tool, _)| tool.agent_types.contains(&agent_type))
            .map(|(tool, _)| tool)
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Execute a tool with policy validation and engram recording.
    ///
    /// 1. Look up the tool
    /// 2. Validate the agent type is allowed (no session recording on failure)
    /// 3. Check the policy engine, if present
    /// 4. Invoke the handler
    /// 5. Record the action in the engram session, if present
    pub async fn execute(
        &self,
        name: &str,
        agent_type: AgentType,
        params: serde_json::Value,
        ctx: ToolCallContext<'_>,
    ) -> Result<ToolResult, ToolError> {
        let (tool, handler) = self.get(name)?;

        if !tool.agent_types.contains(&agent_type) {
            return Err(ToolError::PolicyViolation {
                tool: name.to_string(),
                reasons: vec![format!(
                    "Agent type '{agent_type}' is not allowed to use tool '{name}'"
                )],
            });
        }

        let mut session = ctx.session;

        if let Some(policy) = ctx.policy {
            let input = PolicyInput {
                agent_id: ctx.agent_id.to_string(),
                agent_type: agent_type.as_str().to_string(),
                action: name.to_string(),
                target: params
                    .get("target")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                tenant_id: ctx.tenant_id.clone(),
                context: params.clone(),
            };
            let decision = policy.evaluate_agent_action(&input).await;

            if !decision.allowed {
                if let Some(session) = session.as_deref_mut() {
                    session.add_action(
                        "policy_violation",
                        &format!("Tool '{name}' denied by policy"),
                        serde_json::json!({
                            "reasons": decision.reasons,
                            "violations": decision.violations,
                        }),
                        false,
                    );
                }
                return Err(ToolError::PolicyViolation {
                    tool: name.to_string(),
                    reasons: decision.reasons,
                });
            }
        }

        let result = match handler(params.clone()).await {
            Ok(result) => result,
            Err(e) => {
                if let Some(session) = session.as_deref_mut() {
                    session.add_action(
                        &format!("tool_{name}"),
                        &format!("Tool '{name}' failed: {e}"),
                        params,
                        false,
                    );
                }
                return Err(ToolError::Execution {
                    tool: name.to_string(),
                    message: e.to_string(),
                });
            }
        };

        if let Some(session) = session.as_deref_mut() {
            session.add_action(
                &format!("tool_{name}"),
                &format!("Executed tool '{name}'"),
                serde_json::json!({
                    "params": params,
                    "success": result.success,
                }),
                result.success,
            );
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_policy::LocalPolicyEngine;
    use uuid::Uuid;

    fn search_graph_tool() -> Tool {
        Tool {
            name: "search_graph".to_string(),
            description: "Full-text search over the knowledge graph".to_string(),
            agent_types: vec![AgentType::Hunt, AgentType::Discover],
            params: vec![ToolParam {
                name: "query".to_string(),
                kind: ParamKind::String,
                description: "search term".to_string(),
                required: true,
            }],
        }
    }

    fn registry_with_search() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(search_graph_tool(), |params| async move {
            Ok(ToolResult::ok(serde_json::json!({"echo": params})))
        });
        registry
    }

    fn ctx<'a>(session: Option<&'a mut EngramSession>, policy: Option<&'a dyn PolicyEngine>) -> ToolCallContext<'a> {
        ToolCallContext {
            policy,
            agent_id: "agent-1",
            tenant_id: Uuid::new_v4().to_string(),
            session,
        }
    }

    #[tokio::test]
    async fn unknown_tool_errors() {
        let registry = ToolRegistry::new();
        let result = registry
            .execute(
                "nope",
                AgentType::Hunt,
                serde_json::json!({}),
                ctx(None, None),
            )
            .await;
        assert!(matches!(result, Err(ToolError::UnknownTool(_))));
    }

    #[tokio::test]
    async fn agent_type_mismatch_short_circuits_without_recording() {
        let invoked = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let mut registry = ToolRegistry::new();
        let flag = invoked.clone();
        registry.register(search_graph_tool(), move |_params| {
            let flag = flag.clone();
            async move {
                flag.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok(ToolResult::ok(serde_json::Value::Null))
            }
        });

        let mut session = EngramSession::new(Uuid::new_v4(), "sim-1", "intent");

        // A simulate agent may not call search_graph; the mismatch is
        // caught before the policy engine and before any session write.
        let result = registry
            .execute(
                "search_graph",
                AgentType::Simulate,
                serde_json::json!({"query": "x"}),
                ctx(Some(&mut session), Some(&LocalPolicyEngine::new())),
            )
            .await;

        assert!(matches!(result, Err(ToolError::PolicyViolation { .. })));
        assert!(!invoked.load(std::sync::atomic::Ordering::SeqCst));
        let engram = session.finalize();
        assert!(engram.actions.is_empty());
    }

    #[tokio::test]
    async fn policy_denial_records_exactly_one_violation_action() {
        let mut registry = ToolRegistry::new();
        // Registered for hunt, but "scan_network" is not in hunt's policy
        // allowlist, so the policy engine denies it.
        registry.register(
            Tool {
                name: "scan_network".to_string(),
                description: "Active scan".to_string(),
                agent_types: vec![AgentType::Hunt],
                params: vec![],
            },
            |_params| async move { Ok(ToolResult::ok(serde_json::Value::Null)) },
        );

        let policy = LocalPolicyEngine::new();
        let mut session = EngramSession::new(Uuid::new_v4(), "hunt-1", "intent");

        let result = registry
            .execute(
                "scan_network",
                AgentType::Hunt,
                serde_json::json!({}),
                ctx(Some(&mut session), Some(&policy)),
            )
            .await;

        assert!(matches!(result, Err(ToolError::PolicyViolation { .. })));
        let engram = session.finalize();
        assert_eq!(engram.actions.len(), 1);
        assert_eq!(engram.actions[0].action_type, "policy_violation");
        assert!(!engram.actions[0].success);
    }

    #[tokio::test]
    async fn allowed_call_records_success() {
        let registry = registry_with_search();
        let policy = LocalPolicyEngine::new();
        let mut session = EngramSession::new(Uuid::new_v4(), "hunt-1", "intent");

        let result = registry
            .execute(
                "search_graph",
                AgentType::Hunt,
                serde_json::json!({"query": "web-01"}),
                ctx(Some(&mut session), Some(&policy)),
            )
            .await
            .unwrap();

        assert!(result.success);
        let engram = session.finalize();
        assert_eq!(engram.actions.len(), 1);
        assert_eq!(engram.actions[0].action_type, "tool_search_graph");
        assert!(engram.actions[0].success);
    }

    #[tokio::test]
    async fn handler_failure_records_and_propagates() {
        let mut registry = ToolRegistry::new();
        registry.register(search_graph_tool(), |_params| async move {
            anyhow::bail!("backend exploded")
        });

        let mut session = EngramSession::new(Uuid::new_v4(), "hunt-1", "intent");
        let result = registry
            .execute(
                "search_graph",
                AgentType::Hunt,
                serde_json::json!({"query": "x"}),
                ctx(Some(&mut session), None),
            )
            .await;

        assert!(matches!(result, Err(ToolError::Execution { .. })));
        let engram = session.finalize();
        assert_eq!(engram.actions.len(), 1);
        assert_eq!(engram.actions[0].action_type, "tool_search_graph");
        assert!(!engram.actions[0].success);
    }

    #[tokio::test]
    async fn list_for_agent_type_filters() {
        let registry = registry_with_search();
        assert_eq!(registry.list_for_agent_type(AgentType::Hunt).len(), 1);
        assert_eq!(registry.list_for_agent_type(AgentType::Discover).len(), 1);
        assert!(registry.list_for_agent_type(AgentType::Govern).is_empty());
    }

    #[tokio::test]
    async fn executes_without_policy_or_session() {
        let registry = registry_with_search();
        let result = registry
            .execute(
                "search_graph",
                AgentType::Hunt,
                serde_json::json!({"query": "x"}),
                ctx(None, None),
            )
            .await
            .unwrap();
        assert!(result.success);
    }
}
