// crates/expense-chat/src/tools.rs
// ============================================================================
// Module: Chat Tools
// Description: Function tool catalog and dispatcher for the chat assistant.
// Purpose: Map model tool calls onto expense service operations.
// Dependencies: expense-core, expense-config, serde, serde_json
// ============================================================================

//! ## Overview
//! Six tools are offered to the model. The dispatcher is a match over their
//! names; every call returns text for the model, either a JSON document or a
//! short sentence. Failures never escape as errors: the model is told what
//! went wrong and can explain it to the user. Each call emits a `chat_tool`
//! audit event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::str::FromStr;
use std::sync::Arc;

use expense_config::IdentityConfig;
use expense_core::AuditEvent;
use expense_core::AuditSink;
use expense_core::CreateExpenseRequest;
use expense_core::Expense;
use expense_core::ExpenseDate;
use expense_core::ExpenseFilter;
use expense_core::ExpenseId;
use expense_core::ExpenseService;
use expense_core::ExpenseServiceError;
use expense_core::ExpenseStatusKind;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Number;
use serde_json::Value;
use serde_json::json;

use crate::protocol::FunctionDefinition;
use crate::protocol::ToolDefinition;
use crate::protocol::ToolKind;

// ============================================================================
// SECTION: Tool Names
// ============================================================================

/// Lists expenses with optional search and status filters.
pub const GET_EXPENSES: &str = "get_expenses";
/// Lists expenses awaiting approval.
pub const GET_PENDING_EXPENSES: &str = "get_pending_expenses";
/// Returns dashboard aggregates.
pub const GET_DASHBOARD_STATS: &str = "get_dashboard_stats";
/// Creates a draft expense for the configured employee.
pub const CREATE_EXPENSE: &str = "create_expense";
/// Approves a submitted expense as the configured manager.
pub const APPROVE_EXPENSE: &str = "approve_expense";
/// Rejects a submitted expense as the configured manager.
pub const REJECT_EXPENSE: &str = "reject_expense";

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Returns the tool definitions offered to the model.
#[must_use]
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        function(
            GET_EXPENSES,
            "Get list of expenses with optional filters",
            json!({
                "type": "object",
                "properties": {
                    "search_term": {
                        "type": "string",
                        "description": "Search term to filter expenses"
                    },
                    "status": {
                        "type": "string",
                        "description": "Filter by status: Draft, Submitted, Approved, Rejected"
                    }
                }
            }),
        ),
        function(GET_PENDING_EXPENSES, "Get expenses pending approval", no_parameters()),
        function(
            GET_DASHBOARD_STATS,
            "Get dashboard statistics including total expenses, pending approvals, and approved \
             amounts",
            no_parameters(),
        ),
        function(
            CREATE_EXPENSE,
            "Create a new expense",
            json!({
                "type": "object",
                "properties": {
                    "amount": {"type": "number", "description": "Amount in GBP"},
                    "category": {
                        "type": "string",
                        "description": "Category: Travel, Meals, Supplies, Accommodation, Other"
                    },
                    "date": {"type": "string", "description": "Expense date in YYYY-MM-DD format"},
                    "description": {"type": "string", "description": "Description of the expense"}
                },
                "required": ["amount", "category", "date"]
            }),
        ),
        function(APPROVE_EXPENSE, "Approve a pending expense", expense_id_parameters("approve")),
        function(REJECT_EXPENSE, "Reject a pending expense", expense_id_parameters("reject")),
    ]
}

/// Builds a function tool definition.
fn function(name: &'static str, description: &'static str, parameters: Value) -> ToolDefinition {
    ToolDefinition {
        kind: ToolKind::Function,
        function: FunctionDefinition {
            name,
            description,
            parameters,
        },
    }
}

/// Schema for tools without arguments.
fn no_parameters() -> Value {
    json!({"type": "object", "properties": {}})
}

/// Schema for tools addressing one expense.
fn expense_id_parameters(verb: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "expense_id": {
                "type": "integer",
                "description": format!("ID of the expense to {verb}")
            }
        },
        "required": ["expense_id"]
    })
}

// ============================================================================
// SECTION: Arguments
// ============================================================================

/// Arguments for [`GET_EXPENSES`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GetExpensesArgs {
    /// Free-text search.
    search_term: Option<String>,
    /// Status name filter.
    status: Option<String>,
}

/// Arguments for [`CREATE_EXPENSE`].
#[derive(Debug, Deserialize)]
struct CreateExpenseArgs {
    /// Amount in pounds, as a number or numeric string.
    amount: Value,
    /// Category name.
    category: String,
    /// Day the cost was incurred.
    date: String,
    /// Optional description.
    #[serde(default)]
    description: Option<String>,
}

/// Arguments for [`APPROVE_EXPENSE`] and [`REJECT_EXPENSE`].
#[derive(Debug, Deserialize)]
struct ExpenseIdArgs {
    /// Target expense.
    expense_id: i64,
}

// ============================================================================
// SECTION: Results
// ============================================================================

/// Expense row returned to the model.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExpenseSummary {
    /// Expense identifier.
    expense_id: ExpenseId,
    /// Claimant name.
    user_name: String,
    /// Category name.
    category_name: String,
    /// Amount formatted in pounds.
    amount: String,
    /// Status name; omitted for pending lists.
    #[serde(skip_serializing_if = "Option::is_none")]
    status_name: Option<String>,
    /// Date formatted as `dd Mon yyyy`.
    date: String,
    /// Description.
    description: Option<String>,
}

impl ExpenseSummary {
    /// Summarizes an expense, optionally including its status.
    fn from_expense(expense: Expense, with_status: bool) -> Self {
        Self {
            expense_id: expense.expense_id,
            amount: expense.amount.to_string(),
            date: expense.expense_date.display(),
            status_name: with_status.then_some(expense.status_name),
            user_name: expense.user_name,
            category_name: expense.category_name,
            description: expense.description,
        }
    }
}

/// Dashboard aggregates returned to the model.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsSummary {
    /// Number of claims.
    total_expenses: i64,
    /// Number of claims awaiting review.
    pending_approvals: i64,
    /// Approved total formatted in pounds.
    approved_amount: String,
    /// Number of approved claims.
    approved_count: i64,
}

/// Outcome label recorded in the audit stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// Operation completed.
    Ok,
    /// Service declined the operation.
    Failed,
    /// Arguments or lookups were invalid.
    Error,
    /// Tool name not in the catalog.
    Unknown,
}

impl Outcome {
    /// Returns the audit label.
    const fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Failed => "failed",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Executes model tool calls against the expense service.
#[derive(Clone)]
pub struct ToolDispatcher {
    /// Expense service backing every tool.
    expenses: Arc<ExpenseService>,
    /// Fixed identities for writes.
    identity: IdentityConfig,
    /// Audit sink for tool events.
    audit: Arc<dyn AuditSink>,
}

impl ToolDispatcher {
    /// Creates a dispatcher over `expenses`.
    #[must_use]
    pub fn new(
        expenses: Arc<ExpenseService>,
        identity: IdentityConfig,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            expenses,
            identity,
            audit,
        }
    }

    /// Executes the tool `name` with JSON `arguments`, returning model text.
    #[must_use]
    pub fn execute(&self, name: &str, arguments: &str) -> String {
        let (text, outcome) = self.dispatch(name, arguments);
        self.audit.record(&AuditEvent::chat_tool(name, outcome.label()));
        text
    }

    /// Routes a call to its handler.
    fn dispatch(&self, name: &str, arguments: &str) -> (String, Outcome) {
        match name {
            GET_EXPENSES => match parse_args::<GetExpensesArgs>(arguments) {
                Some(args) => self.get_expenses(args),
                None => invalid_arguments(),
            },
            GET_PENDING_EXPENSES => self.get_pending_expenses(),
            GET_DASHBOARD_STATS => self.get_dashboard_stats(),
            CREATE_EXPENSE => match parse_args::<CreateExpenseArgs>(arguments) {
                Some(args) => self.create_expense(args),
                None => invalid_arguments(),
            },
            APPROVE_EXPENSE => match parse_args::<ExpenseIdArgs>(arguments) {
                Some(args) => self.review(args, true),
                None => invalid_arguments(),
            },
            REJECT_EXPENSE => match parse_args::<ExpenseIdArgs>(arguments) {
                Some(args) => self.review(args, false),
                None => invalid_arguments(),
            },
            other => (format!("Unknown function: {other}"), Outcome::Unknown),
        }
    }

    /// Handles [`GET_EXPENSES`].
    fn get_expenses(&self, args: GetExpensesArgs) -> (String, Outcome) {
        let status_id = match args.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => None,
            Some(name) => match ExpenseStatusKind::parse(name) {
                Some(kind) => Some(kind.id()),
                None => return (format!("Error: Status '{name}' not found"), Outcome::Error),
            },
        };
        let filter = ExpenseFilter {
            status_id,
            search_term: args.search_term,
            ..ExpenseFilter::default()
        };
        let rows: Vec<ExpenseSummary> = self
            .expenses
            .list_expenses(&filter)
            .into_iter()
            .map(|expense| ExpenseSummary::from_expense(expense, true))
            .collect();
        to_json(&rows)
    }

    /// Handles [`GET_PENDING_EXPENSES`].
    fn get_pending_expenses(&self) -> (String, Outcome) {
        let rows: Vec<ExpenseSummary> = self
            .expenses
            .pending_expenses(None)
            .into_iter()
            .map(|expense| ExpenseSummary::from_expense(expense, false))
            .collect();
        to_json(&rows)
    }

    /// Handles [`GET_DASHBOARD_STATS`].
    fn get_dashboard_stats(&self) -> (String, Outcome) {
        let stats = self.expenses.dashboard_stats();
        to_json(&StatsSummary {
            total_expenses: stats.total_expenses,
            pending_approvals: stats.pending_approvals,
            approved_amount: stats.approved_amount.to_string(),
            approved_count: stats.approved_count,
        })
    }

    /// Handles [`CREATE_EXPENSE`].
    fn create_expense(&self, args: CreateExpenseArgs) -> (String, Outcome) {
        let wanted = args.category.trim();
        let Some(category) = self
            .expenses
            .categories()
            .into_iter()
            .find(|category| category.category_name.eq_ignore_ascii_case(wanted))
        else {
            return (format!("Error: Category '{}' not found", args.category), Outcome::Error);
        };
        let Some(amount) = amount_number(&args.amount) else {
            return ("Error: Amount must be a number".to_string(), Outcome::Error);
        };
        let Ok(expense_date) = ExpenseDate::parse(args.date.trim()) else {
            return (format!("Error: Invalid date '{}'", args.date), Outcome::Error);
        };
        let request = CreateExpenseRequest {
            user_id: self.identity.employee_user_id,
            category_id: category.category_id,
            amount,
            expense_date,
            description: args.description,
        };
        match self.expenses.create_expense(&request) {
            Ok(id) => (format!("Created expense with ID {id}"), Outcome::Ok),
            Err(ExpenseServiceError::Invalid(message)) => {
                (format!("Error: {message}"), Outcome::Error)
            }
            Err(ExpenseServiceError::Rejected(_) | ExpenseServiceError::Unavailable(_)) => {
                ("Failed to create expense".to_string(), Outcome::Failed)
            }
        }
    }

    /// Handles [`APPROVE_EXPENSE`] and [`REJECT_EXPENSE`].
    fn review(&self, args: ExpenseIdArgs, approve: bool) -> (String, Outcome) {
        let id = ExpenseId::new(args.expense_id);
        let reviewer = self.identity.manager_user_id;
        let (done, verb) = if approve {
            (self.expenses.approve_expense(id, reviewer), "approve")
        } else {
            (self.expenses.reject_expense(id, reviewer), "reject")
        };
        if done {
            (format!("Expense {verb}d successfully"), Outcome::Ok)
        } else {
            (format!("Failed to {verb} expense"), Outcome::Failed)
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses tool arguments; an empty string is an empty object.
fn parse_args<T: for<'de> Deserialize<'de>>(arguments: &str) -> Option<T> {
    let trimmed = arguments.trim();
    let source = if trimmed.is_empty() { "{}" } else { trimmed };
    serde_json::from_str(source).ok()
}

/// Result for unparseable arguments.
fn invalid_arguments() -> (String, Outcome) {
    ("Error: Invalid arguments".to_string(), Outcome::Error)
}

/// Serializes a tool result.
fn to_json<T: Serialize>(value: &T) -> (String, Outcome) {
    match serde_json::to_string(value) {
        Ok(text) => (text, Outcome::Ok),
        Err(err) => (format!("Error: {err}"), Outcome::Error),
    }
}

/// Accepts a JSON number or a numeric string.
fn amount_number(value: &Value) -> Option<Number> {
    match value {
        Value::Number(number) => Some(number.clone()),
        Value::String(text) => Number::from_str(text.trim()).ok(),
        _ => None,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use serde_json::Value;
    use serde_json::json;

    use super::amount_number;
    use super::tool_definitions;

    #[test]
    fn catalog_offers_six_named_functions() {
        let names: Vec<&str> =
            tool_definitions().iter().map(|tool| tool.function.name).collect();
        assert_eq!(
            names,
            vec![
                "get_expenses",
                "get_pending_expenses",
                "get_dashboard_stats",
                "create_expense",
                "approve_expense",
                "reject_expense"
            ]
        );
        let value = serde_json::to_value(&tool_definitions()[3]).unwrap();
        assert_eq!(value["type"], "function");
        let required = &value["function"]["parameters"]["required"];
        assert_eq!(required, &json!(["amount", "category", "date"]));
    }

    #[test]
    fn amounts_accept_numbers_and_numeric_strings() {
        assert_eq!(amount_number(&json!(12.5)).unwrap().to_string(), "12.5");
        assert_eq!(amount_number(&json!(" 7.99 ")).unwrap().to_string(), "7.99");
        assert!(amount_number(&json!("seven")).is_none());
        assert!(amount_number(&Value::Null).is_none());
    }
}
