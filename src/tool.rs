//! Tool system
//!
//! Tools implement the `Tool` trait and are registered with `ToolRegistry`.
//! Workers never see the registry directly: each dispatch gets a `ToolBox`
//! scoped to the tools its capability grants, with a per-call timeout.

use crate::agent::WorkerId;
use crate::error::ServiceError;
use crate::events::RunEvent;
use async_trait::async_trait;
use parking_lot::Mutex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Tool definition for LLM (matches OpenAI format)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// JSON schema for a tool's argument struct
pub fn parameters_for<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| json!({"type": "object"}))
}

/// Why a tool call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFailure {
    InvalidArguments,
    Denied,
    Timeout,
    Cancelled,
    Unauthorized,
    Upstream,
    Unavailable,
}

/// Result of a tool execution
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub output: String,
    pub is_error: bool,
    pub failure: Option<ToolFailure>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
            failure: None,
        }
    }

    /// Serialize a structured value as the tool output
    pub fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(output) => Self::success(output),
            Err(e) => Self::error(format!("Failed to encode output: {}", e)),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::failure(ToolFailure::Upstream, message)
    }

    pub fn failure(kind: ToolFailure, message: impl Into<String>) -> Self {
        Self {
            output: message.into(),
            is_error: true,
            failure: Some(kind),
        }
    }

    pub fn invalid_arguments(e: impl std::fmt::Display) -> Self {
        Self::failure(ToolFailure::InvalidArguments, format!("Invalid arguments: {}", e))
    }

    /// Decode a successful structured output
    pub fn parse<T: for<'de> Deserialize<'de>>(&self) -> Option<T> {
        if self.is_error {
            return None;
        }
        serde_json::from_str(&self.output).ok()
    }
}

impl From<ServiceError> for ToolResult {
    fn from(e: ServiceError) -> Self {
        let kind = match e {
            ServiceError::Unauthorized(_) => ToolFailure::Unauthorized,
            ServiceError::Upstream(_) => ToolFailure::Upstream,
            ServiceError::Unavailable(_) => ToolFailure::Unavailable,
        };
        Self::failure(kind, e.to_string())
    }
}

/// Context passed to tools during execution
#[derive(Clone)]
pub struct ToolContext {
    pub cancellation: CancellationToken,
    pub timeout: Duration,
}

impl ToolContext {
    pub fn new(cancellation: CancellationToken, timeout: Duration) -> Self {
        Self {
            cancellation,
            timeout,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (used for dispatch)
    fn name(&self) -> &str;

    /// Get the tool definition for LLM
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with given arguments
    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult;
}

/// A tool call as recorded in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub call_id: String,
    pub tool: String,
    pub arguments: Value,
    pub output: String,
    pub is_error: bool,
    #[serde(default)]
    pub failure: Option<ToolFailure>,
}

/// Registry of available tools
#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Definitions of the named tools, in the given order; unknown names
    /// are skipped
    pub fn definitions<S: AsRef<str>>(&self, names: &[S]) -> Vec<ToolDefinition> {
        names
            .iter()
            .filter_map(|name| self.get(name.as_ref()))
            .map(|tool| tool.definition())
            .collect()
    }

    /// Execute a tool by name
    pub async fn execute(&self, name: &str, args: Value, ctx: &ToolContext) -> ToolResult {
        match self.get(name) {
            Some(tool) => tool.execute(args, ctx).await,
            None => ToolResult::failure(ToolFailure::Denied, format!("Unknown tool: {}", name)),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The tools one worker may call during one dispatch
pub struct ToolBox {
    worker: WorkerId,
    registry: Arc<ToolRegistry>,
    granted: Vec<String>,
    instructions: String,
    ctx: ToolContext,
    calls: Mutex<Vec<ToolCallRecord>>,
    events: Option<mpsc::UnboundedSender<RunEvent>>,
}

impl ToolBox {
    pub fn new(
        worker: WorkerId,
        registry: Arc<ToolRegistry>,
        granted: Vec<String>,
        ctx: ToolContext,
    ) -> Self {
        Self {
            worker,
            registry,
            granted,
            instructions: String::new(),
            ctx,
            calls: Mutex::new(Vec::new()),
            events: None,
        }
    }

    /// Behavioural instructions from the worker's capability
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<RunEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn can_use(&self, name: &str) -> bool {
        self.granted.iter().any(|g| g == name)
    }

    pub fn is_cancelled(&self) -> bool {
        self.ctx.is_cancelled()
    }

    /// Call a granted tool. Never fails: denial, timeout and cancellation
    /// come back as error results.
    pub async fn call(&self, name: &str, args: Value) -> ToolResult {
        let call_id = format!("{}-{}", self.worker.as_str(), self.calls.lock().len() + 1);
        let started = Instant::now();

        let result = if !self.can_use(name) {
            warn!(worker = %self.worker, tool = name, "Tool not granted");
            ToolResult::failure(
                ToolFailure::Denied,
                format!("Tool {} is not granted to {}", name, self.worker),
            )
        } else if self.ctx.is_cancelled() {
            ToolResult::failure(ToolFailure::Cancelled, "Cancelled")
        } else {
            self.emit(RunEvent::ToolCallStart {
                worker: self.worker,
                call_id: call_id.clone(),
                tool: name.to_string(),
                arguments: args.clone(),
            });

            tokio::select! {
                biased;
                _ = self.ctx.cancellation.cancelled() => {
                    ToolResult::failure(ToolFailure::Cancelled, "Cancelled")
                }
                outcome = tokio::time::timeout(
                    self.ctx.timeout,
                    self.registry.execute(name, args.clone(), &self.ctx),
                ) => match outcome {
                    Ok(result) => result,
                    Err(_) => ToolResult::failure(
                        ToolFailure::Timeout,
                        format!("{} timed out after {}ms", name, self.ctx.timeout.as_millis()),
                    ),
                }
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        debug!(
            worker = %self.worker,
            tool = name,
            is_error = result.is_error,
            duration_ms,
            "Tool call finished"
        );
        self.emit(RunEvent::ToolCallEnd {
            worker: self.worker,
            call_id: call_id.clone(),
            tool: name.to_string(),
            is_error: result.is_error,
            duration_ms,
        });

        self.calls.lock().push(ToolCallRecord {
            call_id,
            tool: name.to_string(),
            arguments: args,
            output: result.output.clone(),
            is_error: result.is_error,
            failure: result.failure,
        });

        result
    }

    /// Calls made so far, in order
    pub fn calls(&self) -> Vec<ToolCallRecord> {
        self.calls.lock().clone()
    }

    pub fn take_calls(&self) -> Vec<ToolCallRecord> {
        std::mem::take(&mut *self.calls.lock())
    }

    fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".into(),
                description: "Echo the arguments".into(),
                parameters: json!({"type": "object"}),
            }
        }

        async fn execute(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
            ToolResult::success(args.to_string())
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "slow".into(),
                description: "Never finishes in time".into(),
                parameters: json!({"type": "object"}),
            }
        }

        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> ToolResult {
            tokio::time::sleep(Duration::from_secs(60)).await;
            ToolResult::success("late")
        }
    }

    fn toolbox(granted: &[&str], timeout: Duration) -> ToolBox {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(SlowTool);
        ToolBox::new(
            WorkerId::Search,
            Arc::new(registry),
            granted.iter().map(|s| s.to_string()).collect(),
            ToolContext::new(CancellationToken::new(), timeout),
        )
    }

    #[tokio::test]
    async fn test_granted_call_is_recorded() {
        let tools = toolbox(&["echo"], Duration::from_secs(1));
        let result = tools.call("echo", json!({"q": 1})).await;
        assert!(!result.is_error);

        let calls = tools.take_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].call_id, "search-1");
        assert_eq!(calls[0].tool, "echo");
        assert!(tools.calls().is_empty());
    }

    #[tokio::test]
    async fn test_ungranted_tool_is_denied() {
        let tools = toolbox(&["echo"], Duration::from_secs(1));
        let result = tools.call("slow", json!({})).await;
        assert!(result.is_error);
        assert_eq!(result.failure, Some(ToolFailure::Denied));
        assert_eq!(tools.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_slow_tool_times_out() {
        let tools = toolbox(&["slow"], Duration::from_millis(50));
        let result = tools.call("slow", json!({})).await;
        assert_eq!(result.failure, Some(ToolFailure::Timeout));
    }

    #[tokio::test]
    async fn test_cancelled_toolbox_skips_execution() {
        let tools = toolbox(&["echo"], Duration::from_secs(1));
        tools.ctx.cancellation.cancel();
        let result = tools.call("echo", json!({})).await;
        assert_eq!(result.failure, Some(ToolFailure::Cancelled));
    }

    #[test]
    fn test_service_error_maps_to_failure_kind() {
        let result: ToolResult = ServiceError::Unauthorized("expired".into()).into();
        assert_eq!(result.failure, Some(ToolFailure::Unauthorized));
        assert!(result.is_error);
    }
}
