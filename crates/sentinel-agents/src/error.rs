//! Error types for the agent runtime.

use thiserror::Error;

/// Errors surfaced by plan/execute phases and runtime plumbing.
///
/// The lifecycle catches these, records an `execution_failed` action, and
/// converts them into a failed `AgentResult`; they never escape `run`.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(#[from] crate::llm::LlmError),

    #[error("SIEM error: {0}")]
    Siem(#[from] crate::siem::SiemError),

    #[error("Graph error: {0}")]
    Graph(#[from] crate::simulate::graph::GraphError),

    #[error("Tool error: {0}")]
    Tool(#[from] crate::tools::ToolError),

    #[error("Configuration error: {0}")]
    Config(#[from] sentinel_core::SentinelError),

    #[error("Internal error: {0}")]
    Internal(String),
}
