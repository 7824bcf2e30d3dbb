// crates/expense-chat/src/protocol.rs
// ============================================================================
// Module: Chat Model Protocol
// Description: Message, tool, and completion types for chat-completions APIs.
// Purpose: Define the seam between the assistant loop and a hosted model.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! These types follow the chat-completions wire shape shared by `OpenAI`
//! compatible endpoints and Azure `OpenAI` deployments. [`ChatModel`] is the
//! only dependency the assistant loop has on a model, so tests can script
//! completions without a network.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Messages
// ============================================================================

/// Author of a model message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions for the model.
    System,
    /// End-user text.
    User,
    /// Model output.
    Assistant,
    /// Tool result.
    Tool,
}

/// One message in a model conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMessage {
    /// Message author.
    pub role: Role,
    /// Text content; null on tool-call-only assistant turns.
    #[serde(default)]
    pub content: Option<String>,
    /// Tool calls requested by the assistant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Call answered by a tool message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ModelMessage {
    /// Builds a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    /// Builds a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    /// Builds an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Builds a tool result message for `call_id`.
    #[must_use]
    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }

    /// Builds a plain text message.
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

// ============================================================================
// SECTION: Tools
// ============================================================================

/// Tool call kind; only functions exist today.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// Function tool.
    #[default]
    Function,
}

/// Tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier echoed in the tool result.
    pub id: String,
    /// Tool kind.
    #[serde(rename = "type", default)]
    pub kind: ToolKind,
    /// Function name and raw JSON arguments.
    pub function: FunctionCall,
}

/// Function invocation inside a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function name.
    pub name: String,
    /// JSON-encoded arguments as produced by the model.
    #[serde(default)]
    pub arguments: String,
}

/// Function tool offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    /// Tool kind.
    #[serde(rename = "type")]
    pub kind: ToolKind,
    /// Function signature.
    pub function: FunctionDefinition,
}

/// Function name, description, and JSON schema parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDefinition {
    /// Function name.
    pub name: &'static str,
    /// Description shown to the model.
    pub description: &'static str,
    /// JSON schema for the arguments object.
    pub parameters: Value,
}

// ============================================================================
// SECTION: Completions
// ============================================================================

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the reply.
    Stop,
    /// The model wants tool results before continuing.
    ToolCalls,
    /// Token limit reached.
    Length,
    /// Output was filtered.
    ContentFilter,
    /// Any reason this client does not model.
    #[serde(other)]
    Other,
}

/// One model turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Assistant message, possibly carrying tool calls.
    pub message: ModelMessage,
    /// Stop reason reported by the model.
    pub finish_reason: FinishReason,
}

impl Completion {
    /// Returns true when the model is waiting on tool results.
    #[must_use]
    pub fn wants_tools(&self) -> bool {
        self.finish_reason == FinishReason::ToolCalls && !self.message.tool_calls.is_empty()
    }
}

// ============================================================================
// SECTION: Model Seam
// ============================================================================

/// Hosted chat model.
pub trait ChatModel: Send + Sync {
    /// Requests one completion for `messages`, offering `tools`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError`] when the model cannot be reached or replies with
    /// something other than a completion.
    fn complete(
        &self,
        messages: &[ModelMessage],
        tools: &[ToolDefinition],
    ) -> Result<Completion, ChatError>;
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Chat assistant errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Client settings are unusable.
    #[error("chat client misconfigured: {0}")]
    Config(String),
    /// Request could not be delivered or the reply could not be read.
    #[error("chat request failed: {0}")]
    Transport(String),
    /// Endpoint answered with a non-success status.
    #[error("chat endpoint returned status {0}")]
    Status(u16),
    /// Reply was not a usable completion.
    #[error("chat response invalid: {0}")]
    Protocol(String),
    /// Model kept requesting tools past the configured bound.
    #[error("model requested tools for more than {0} rounds")]
    ToolRoundsExceeded(u32),
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use serde_json::json;

    use super::FinishReason;
    use super::ModelMessage;
    use super::Role;

    #[test]
    fn tool_messages_carry_call_id_and_skip_empty_calls() {
        let value = serde_json::to_value(ModelMessage::tool("call_1", "ok")).unwrap();
        assert_eq!(value, json!({"role": "tool", "content": "ok", "tool_call_id": "call_1"}));
    }

    #[test]
    fn assistant_tool_turns_parse_with_null_content() {
        let message: ModelMessage = serde_json::from_value(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_9",
                "type": "function",
                "function": {"name": "get_dashboard_stats", "arguments": "{}"}
            }]
        }))
        .unwrap();
        assert_eq!(message.role, Role::Assistant);
        assert!(message.content.is_none());
        assert_eq!(message.tool_calls[0].function.name, "get_dashboard_stats");
    }

    #[test]
    fn unknown_finish_reasons_map_to_other() {
        let reason: FinishReason = serde_json::from_value(json!("function_call")).unwrap();
        assert_eq!(reason, FinishReason::Other);
        let reason: FinishReason = serde_json::from_value(json!("tool_calls")).unwrap();
        assert_eq!(reason, FinishReason::ToolCalls);
    }
}
