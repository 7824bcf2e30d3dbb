// crates/expense-chat/src/assistant.rs
// ============================================================================
// Module: Chat Assistant
// Description: Request/response types and the bounded function-calling loop.
// Purpose: Answer chat messages through a model or canned demo replies.
// Dependencies: expense-config, expense-core, serde
// ============================================================================

//! ## Overview
//! [`ChatService`] builds the conversation from a fixed system prompt, the
//! caller's history, and the new message. It then asks the model for a
//! completion, runs any requested tools, and repeats until the model answers
//! in text. The number of tool rounds is capped by `chat.max_tool_rounds`.
//! Model failures become unsuccessful [`ChatResponse`] values rather than
//! errors so the widget can always render something.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use expense_config::ChatConfig;
use expense_config::IdentityConfig;
use expense_core::AuditSink;
use expense_core::ExpenseService;
use serde::Deserialize;
use serde::Serialize;

use crate::demo::demo_response;
use crate::protocol::ChatError;
use crate::protocol::ChatModel;
use crate::protocol::ModelMessage;
use crate::protocol::ToolDefinition;
use crate::tools::ToolDispatcher;
use crate::tools::tool_definitions;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Instructions sent ahead of every conversation.
const SYSTEM_PROMPT: &str = "You are an AI assistant for the Expense Management System. You can \
help users with:

1. **View Expenses**: List expenses with optional filters
2. **Dashboard Stats**: Show summary statistics
3. **Pending Approvals**: View expenses awaiting approval
4. **Create Expenses**: Submit new expense claims
5. **Approve/Reject**: Process pending expense approvals (for managers)

When listing expenses, format them nicely with bullet points or numbered lists.
Always be helpful and provide clear, concise responses.
If you execute actions, confirm what was done.

Available categories: Travel, Meals, Supplies, Accommodation, Other
Available statuses: Draft, Submitted, Approved, Rejected";

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Prior turn supplied by the chat widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `user` or `assistant`; other roles are ignored.
    pub role: String,
    /// Message text.
    pub content: String,
}

/// Chat request from the widget.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// New user message.
    pub message: String,
    /// Earlier turns, oldest first.
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

/// Chat reply to the widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Reply text.
    pub message: String,
    /// False when the model call failed.
    pub success: bool,
    /// Failure detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponse {
    /// Builds a successful reply.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: true,
            error: None,
        }
    }

    /// Builds a failed reply from `error`.
    #[must_use]
    pub fn failure(error: &ChatError) -> Self {
        let detail = error.to_string();
        Self {
            message: format!("Error: {detail}"),
            success: false,
            error: Some(detail),
        }
    }
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Chat assistant over the expense service.
pub struct ChatService {
    /// True when chat is enabled with an endpoint.
    enabled: bool,
    /// Hosted model, when one could be built.
    model: Option<Arc<dyn ChatModel>>,
    /// Tool executor.
    dispatcher: ToolDispatcher,
    /// Tools offered to the model.
    tools: Vec<ToolDefinition>,
    /// Maximum tool rounds per message.
    max_tool_rounds: u32,
}

impl ChatService {
    /// Creates a chat service. `model` is `None` when no client is available.
    #[must_use]
    pub fn new(
        config: &ChatConfig,
        identity: IdentityConfig,
        expenses: Arc<ExpenseService>,
        model: Option<Arc<dyn ChatModel>>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            enabled: config.is_configured(),
            model,
            dispatcher: ToolDispatcher::new(expenses, identity, audit),
            tools: tool_definitions(),
            max_tool_rounds: config.max_tool_rounds,
        }
    }

    /// Returns true when chat is enabled and an endpoint is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Answers one chat message.
    #[must_use]
    pub fn send_message(&self, request: &ChatRequest) -> ChatResponse {
        let model = match (&self.model, self.enabled) {
            (Some(model), true) => model,
            _ => return ChatResponse::ok(demo_response(&request.message)),
        };
        match self.converse(model.as_ref(), request) {
            Ok(message) => ChatResponse::ok(message),
            Err(err) => ChatResponse::failure(&err),
        }
    }

    /// Runs the function-calling loop until the model answers in text.
    fn converse(&self, model: &dyn ChatModel, request: &ChatRequest) -> Result<String, ChatError> {
        let mut messages = build_messages(request);
        let mut rounds = 0_u32;
        loop {
            let completion = model.complete(&messages, &self.tools)?;
            if !completion.wants_tools() {
                return Ok(completion.message.content.unwrap_or_default());
            }
            if rounds >= self.max_tool_rounds {
                return Err(ChatError::ToolRoundsExceeded(self.max_tool_rounds));
            }
            rounds += 1;
            let calls = completion.message.tool_calls.clone();
            messages.push(completion.message);
            for call in calls {
                let result = self.dispatcher.execute(&call.function.name, &call.function.arguments);
                messages.push(ModelMessage::tool(call.id, result));
            }
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the model conversation for a request.
fn build_messages(request: &ChatRequest) -> Vec<ModelMessage> {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    messages.push(ModelMessage::system(SYSTEM_PROMPT));
    for turn in &request.history {
        match turn.role.as_str() {
            "user" => messages.push(ModelMessage::user(turn.content.clone())),
            "assistant" => messages.push(ModelMessage::assistant(turn.content.clone())),
            _ => {}
        }
    }
    messages.push(ModelMessage::user(request.message.clone()));
    messages
}

// ============================================================================
// SECTION: Tests
// ============================================================================
