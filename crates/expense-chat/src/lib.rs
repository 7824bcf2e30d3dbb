// crates/expense-chat/src/lib.rs
// ============================================================================
// Module: Expense Chat Library
// Description: Chat assistant over the expense service.
// Purpose: Expose the model seam, HTTP client, tools, and chat service.
// Dependencies: expense-core, expense-config, reqwest, serde_json
// ============================================================================

//! ## Overview
//! The chat assistant forwards user text to a hosted language model and lets
//! the model call six function tools that wrap expense operations. When no
//! model is configured, keyword-selected demo replies are returned instead.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod assistant;
pub mod demo;
pub mod openai;
pub mod protocol;
pub mod tools;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use assistant::ChatMessage;
pub use assistant::ChatRequest;
pub use assistant::ChatResponse;
pub use assistant::ChatService;
pub use demo::demo_response;
pub use openai::OpenAiChatClient;
pub use protocol::ChatError;
pub use protocol::ChatModel;
pub use protocol::Completion;
pub use protocol::FinishReason;
pub use protocol::FunctionCall;
pub use protocol::FunctionDefinition;
pub use protocol::ModelMessage;
pub use protocol::Role;
pub use protocol::ToolCall;
pub use protocol::ToolDefinition;
pub use protocol::ToolKind;
pub use tools::ToolDispatcher;
pub use tools::tool_definitions;
