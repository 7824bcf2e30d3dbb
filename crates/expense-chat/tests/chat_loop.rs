// crates/expense-chat/tests/chat_loop.rs
// ============================================================================
// Module: Chat Loop Tests
// Description: Function-calling loop and tool dispatch against a scripted model.
// Purpose: Validate tool results, loop bounds, demo replies, and audit events.
// Dependencies: expense-chat, expense-config, expense-core
// ============================================================================
//! ## Overview
//! A scripted [`ChatModel`] replays fixed completions and records every
//! conversation it receives, so tests can inspect the tool messages the
//! dispatcher produced against an in-memory expense store.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use expense_chat::ChatError;
use expense_chat::ChatModel;
use expense_chat::ChatRequest;
use expense_chat::ChatService;
use expense_chat::Completion;
use expense_chat::FinishReason;
use expense_chat::FunctionCall;
use expense_chat::ModelMessage;
use expense_chat::Role;
use expense_chat::ToolCall;
use expense_chat::ToolDefinition;
use expense_chat::ToolKind;
use expense_config::ChatConfig;
use expense_config::IdentityConfig;
use expense_core::AuditDetail;
use expense_core::AuditEvent;
use expense_core::AuditSink;
use expense_core::ExpenseId;
use expense_core::ExpenseService;
use expense_core::ExpenseStatusKind;
use expense_core::FixedClock;
use expense_core::InMemoryExpenseStore;
use expense_core::Money;
use expense_core::SharedExpenseStore;
use expense_core::UserId;
use serde_json::Value;
use time::OffsetDateTime;
use time::macros::datetime;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const NOW: OffsetDateTime = datetime!(2026-03-10 12:00 UTC);

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl AuditSink for RecordingSink {
    fn record(&self, event: &AuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

struct ScriptedModel {
    replies: Mutex<VecDeque<Result<Completion, ChatError>>>,
    conversations: Mutex<Vec<Vec<ModelMessage>>>,
    tool_counts: Mutex<Vec<usize>>,
}

impl ScriptedModel {
    fn new(replies: Vec<Result<Completion, ChatError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            conversations: Mutex::new(Vec::new()),
            tool_counts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.conversations.lock().unwrap().len()
    }

    fn last_conversation(&self) -> Vec<ModelMessage> {
        self.conversations.lock().unwrap().last().cloned().unwrap()
    }
}

impl ChatModel for ScriptedModel {
    fn complete(
        &self,
        messages: &[ModelMessage],
        tools: &[ToolDefinition],
    ) -> Result<Completion, ChatError> {
        self.conversations.lock().unwrap().push(messages.to_vec());
        self.tool_counts.lock().unwrap().push(tools.len());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ChatError::Transport("script exhausted".to_string())))
    }
}

fn text(content: &str) -> Result<Completion, ChatError> {
    Ok(Completion {
        message: ModelMessage::assistant(content),
        finish_reason: FinishReason::Stop,
    })
}

fn tool_turn(calls: &[(&str, &str)]) -> Result<Completion, ChatError> {
    let tool_calls = calls
        .iter()
        .enumerate()
        .map(|(index, (name, arguments))| ToolCall {
            id: format!("call_{index}"),
            kind: ToolKind::Function,
            function: FunctionCall {
                name: (*name).to_string(),
                arguments: (*arguments).to_string(),
            },
        })
        .collect();
    Ok(Completion {
        message: ModelMessage {
            role: Role::Assistant,
            content: None,
            tool_calls,
            tool_call_id: None,
        },
        finish_reason: FinishReason::ToolCalls,
    })
}

struct Harness {
    chat: ChatService,
    expenses: Arc<ExpenseService>,
    sink: Arc<RecordingSink>,
}

fn harness(model: Option<Arc<ScriptedModel>>, config: &ChatConfig) -> Harness {
    let sink = Arc::new(RecordingSink::default());
    let expenses = Arc::new(ExpenseService::new(
        SharedExpenseStore::from_store(InMemoryExpenseStore::seeded(NOW)),
        Arc::new(FixedClock::new(NOW)),
        sink.clone(),
    ));
    let model = model.map(|model| model as Arc<dyn ChatModel>);
    let chat = ChatService::new(
        config,
        IdentityConfig::default(),
        Arc::clone(&expenses),
        model,
        sink.clone(),
    );
    Harness {
        chat,
        expenses,
        sink,
    }
}

fn enabled_config() -> ChatConfig {
    ChatConfig {
        enabled: true,
        endpoint: Some("https://models.example.com/v1".to_string()),
        ..ChatConfig::default()
    }
}

fn ask(message: &str) -> ChatRequest {
    ChatRequest {
        message: message.to_string(),
        history: Vec::new(),
    }
}

fn tool_results(conversation: &[ModelMessage]) -> Vec<String> {
    conversation
        .iter()
        .filter(|message| message.role == Role::Tool)
        .map(|message| message.content.clone().unwrap_or_default())
        .collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn disabled_chat_returns_demo_reply_without_model_call() {
    let model = ScriptedModel::new(vec![text("unused")]);
    let harness = harness(Some(Arc::clone(&model)), &ChatConfig::default());
    assert!(!harness.chat.is_enabled());
    let response = harness.chat.send_message(&ask("show all expenses"));
    assert!(response.success);
    assert!(response.message.starts_with("**Sample Expenses**"));
    assert_eq!(model.calls(), 0);
}

#[test]
fn enabled_chat_without_client_falls_back_to_demo() {
    let harness = harness(None, &enabled_config());
    assert!(harness.chat.is_enabled());
    let response = harness.chat.send_message(&ask("what is pending approval?"));
    assert!(response.success);
    assert!(response.message.starts_with("**Pending Approvals**"));
}

#[test]
fn plain_answer_passes_through_with_system_prompt_first() {
    let model = ScriptedModel::new(vec![text("Hello there")]);
    let harness = harness(Some(Arc::clone(&model)), &enabled_config());
    let response = harness.chat.send_message(&ask("hi"));
    assert_eq!(response.message, "Hello there");
    assert!(response.success);
    assert!(response.error.is_none());
    let conversation = model.last_conversation();
    assert_eq!(conversation[0].role, Role::System);
    assert_eq!(conversation.last().unwrap().content.as_deref(), Some("hi"));
    assert_eq!(model.tool_counts.lock().unwrap()[0], 6);
}

#[test]
fn create_expense_tool_books_claim_for_configured_employee() {
    let model = ScriptedModel::new(vec![
        tool_turn(&[(
            "create_expense",
            r#"{"amount": 12.5, "category": "meals", "date": "2026-03-09", "description": "Team sandwiches"}"#,
        )]),
        text("Done."),
    ]);
    let harness = harness(Some(Arc::clone(&model)), &enabled_config());
    let response = harness.chat.send_message(&ask("log lunch"));
    assert_eq!(response.message, "Done.");

    let conversation = model.last_conversation();
    assert_eq!(tool_results(&conversation), vec!["Created expense with ID 5".to_string()]);
    let tool_message = conversation.last().unwrap();
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_0"));
    assert_eq!(conversation[conversation.len() - 2].tool_calls.len(), 1);

    let created = harness.expenses.expense_by_id(ExpenseId::new(5)).unwrap();
    assert_eq!(created.user_id, UserId::new(1));
    assert_eq!(created.category_name, "Meals");
    assert_eq!(created.amount, Money::from_minor(1_250));
    assert_eq!(created.status(), Some(ExpenseStatusKind::Draft));
}

#[test]
fn tool_errors_are_reported_to_the_model() {
    let model = ScriptedModel::new(vec![
        tool_turn(&[
            ("create_expense", r#"{"amount": 3, "category": "Snacks", "date": "2026-03-09"}"#),
            ("create_expense", r#"{"amount": 3, "category": "Other", "date": "09/03/2026"}"#),
            ("create_expense", r#"{"amount": 0, "category": "Other", "date": "2026-03-09"}"#),
            ("approve_expense", "not json"),
            ("delete_everything", "{}"),
        ]),
        text("Some of that failed."),
    ]);
    let harness = harness(Some(Arc::clone(&model)), &enabled_config());
    let response = harness.chat.send_message(&ask("do things"));
    assert!(response.success);
    assert_eq!(
        tool_results(&model.last_conversation()),
        vec![
            "Error: Category 'Snacks' not found".to_string(),
            "Error: Invalid date '09/03/2026'".to_string(),
            "Error: Amount must be greater than zero.".to_string(),
            "Error: Invalid arguments".to_string(),
            "Unknown function: delete_everything".to_string(),
        ]
    );
}

#[test]
fn review_tools_use_configured_manager() {
    let model = ScriptedModel::new(vec![
        tool_turn(&[
            ("approve_expense", r#"{"expense_id": 1}"#),
            ("reject_expense", r#"{"expense_id": 3}"#),
        ]),
        text("Reviewed."),
    ]);
    let harness = harness(Some(Arc::clone(&model)), &enabled_config());
    let _ = harness.chat.send_message(&ask("approve 1, reject 3"));
    assert_eq!(
        tool_results(&model.last_conversation()),
        vec!["Expense approved successfully".to_string(), "Failed to reject expense".to_string()]
    );
    let approved = harness.expenses.expense_by_id(ExpenseId::new(1)).unwrap();
    assert_eq!(approved.reviewed_by, Some(UserId::new(2)));
    assert_eq!(approved.status(), Some(ExpenseStatusKind::Approved));
}

#[test]
fn listing_tools_format_pounds_and_dates() {
    let model = ScriptedModel::new(vec![
        tool_turn(&[
            ("get_expenses", r#"{"status": "approved"}"#),
            ("get_pending_expenses", ""),
            ("get_dashboard_stats", "{}"),
            ("get_expenses", r#"{"status": "Paid"}"#),
        ]),
        text("Here you go."),
    ]);
    let harness = harness(Some(Arc::clone(&model)), &enabled_config());
    let _ = harness.chat.send_message(&ask("summaries"));
    let results = tool_results(&model.last_conversation());

    let approved: Value = serde_json::from_str(&results[0]).unwrap();
    let approved = approved.as_array().unwrap();
    assert_eq!(approved.len(), 2);
    assert_eq!(approved[0]["expenseId"], 2);
    assert_eq!(approved[0]["amount"], "£14.25");
    assert_eq!(approved[0]["date"], "08 Feb 2026");
    assert_eq!(approved[0]["statusName"], "Approved");

    let pending: Value = serde_json::from_str(&results[1]).unwrap();
    assert_eq!(pending[0]["userName"], "Alice Example");
    assert!(pending[0].get("statusName").is_none());

    let stats: Value = serde_json::from_str(&results[2]).unwrap();
    assert_eq!(stats["approvedAmount"], "£137.25");
    assert_eq!(stats["totalExpenses"], 4);

    assert_eq!(results[3], "Error: Status 'Paid' not found");
}

#[test]
fn tool_rounds_are_bounded() {
    let config = ChatConfig {
        max_tool_rounds: 2,
        ..enabled_config()
    };
    let model = ScriptedModel::new(vec![
        tool_turn(&[("get_dashboard_stats", "{}")]),
        tool_turn(&[("get_dashboard_stats", "{}")]),
        tool_turn(&[("get_dashboard_stats", "{}")]),
        text("never reached"),
    ]);
    let harness = harness(Some(Arc::clone(&model)), &config);
    let response = harness.chat.send_message(&ask("loop"));
    assert!(!response.success);
    assert!(response.message.starts_with("Error: "));
    assert!(response.error.unwrap().contains("2 rounds"));
    assert_eq!(model.calls(), 3);
}

#[test]
fn model_failures_become_error_responses() {
    let model = ScriptedModel::new(vec![Err(ChatError::Status(503))]);
    let harness = harness(Some(model), &enabled_config());
    let response = harness.chat.send_message(&ask("hi"));
    assert!(!response.success);
    assert_eq!(response.message, "Error: chat endpoint returned status 503");
    assert_eq!(response.error.as_deref(), Some("chat endpoint returned status 503"));
}

#[test]
fn tool_calls_emit_audit_events() {
    let model = ScriptedModel::new(vec![
        tool_turn(&[("get_dashboard_stats", "{}"), ("nope", "{}")]),
        text("ok"),
    ]);
    let harness = harness(Some(model), &enabled_config());
    let _ = harness.chat.send_message(&ask("stats"));
    let events = harness.sink.events.lock().unwrap();
    let outcomes: Vec<(String, &str)> = events
        .iter()
        .filter_map(|event| match &event.detail {
            AuditDetail::ChatTool {
                tool,
                outcome,
            } => Some((tool.clone(), *outcome)),
            _ => None,
        })
        .collect();
    assert_eq!(
        outcomes,
        vec![("get_dashboard_stats".to_string(), "ok"), ("nope".to_string(), "unknown")]
    );
}
