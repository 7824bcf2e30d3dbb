// crates/expense-core/src/core/model.rs
// ============================================================================
// Module: Expense Model
// Description: Expense claims, users, reference data, and request payloads.
// Purpose: Define the rows returned by the procedure contract and the inputs
//          accepted by it.
// Dependencies: serde, serde_json, time
// ============================================================================

//! ## Overview
//! Records mirror the result sets of the expense procedures. Every record
//! serializes with camelCase names; amounts additionally expose a pound value
//! under `amountGBP` alongside the authoritative `amountMinor`.
//!
//! Request payloads carry amounts as decimal pounds and are validated into
//! [`NewExpense`] or [`ExpenseUpdate`] before a store sees them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde::Serializer;
use serde::ser::SerializeStruct;
use serde_json::Number;
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::dates::ExpenseDate;
use crate::core::identifiers::CategoryId;
use crate::core::identifiers::ExpenseId;
use crate::core::identifiers::RoleId;
use crate::core::identifiers::StatusId;
use crate::core::identifiers::UserId;
use crate::core::money::CURRENCY_CODE;
use crate::core::money::Money;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum description length in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 500;

// ============================================================================
// SECTION: Status and Role Kinds
// ============================================================================

/// Lifecycle states of an expense claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpenseStatusKind {
    /// Being edited by the employee.
    Draft,
    /// Awaiting a manager decision.
    Submitted,
    /// Approved by a manager.
    Approved,
    /// Rejected by a manager.
    Rejected,
}

impl ExpenseStatusKind {
    /// All statuses in identifier order.
    pub const ALL: [Self; 4] = [Self::Draft, Self::Submitted, Self::Approved, Self::Rejected];

    /// Returns the reference-data identifier.
    #[must_use]
    pub const fn id(self) -> StatusId {
        match self {
            Self::Draft => StatusId::new(1),
            Self::Submitted => StatusId::new(2),
            Self::Approved => StatusId::new(3),
            Self::Rejected => StatusId::new(4),
        }
    }

    /// Returns the stable display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Submitted => "Submitted",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }

    /// Resolves a status from its identifier.
    #[must_use]
    pub fn from_id(id: StatusId) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    /// Resolves a status from its name, ignoring case.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|kind| kind.name().eq_ignore_ascii_case(name))
    }
}

/// User roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleKind {
    /// Submits expense claims.
    Employee,
    /// Reviews submitted claims.
    Manager,
}

impl RoleKind {
    /// All roles in identifier order.
    pub const ALL: [Self; 2] = [Self::Employee, Self::Manager];

    /// Returns the reference-data identifier.
    #[must_use]
    pub const fn id(self) -> RoleId {
        match self {
            Self::Employee => RoleId::new(1),
            Self::Manager => RoleId::new(2),
        }
    }

    /// Returns the stable display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Employee => "Employee",
            Self::Manager => "Manager",
        }
    }

    /// Resolves a role from its identifier.
    #[must_use]
    pub fn from_id(id: RoleId) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// Expense claim joined with its user, category, status, and reviewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expense {
    /// Claim identifier.
    pub expense_id: ExpenseId,
    /// Claimant identifier.
    pub user_id: UserId,
    /// Claimant display name.
    pub user_name: String,
    /// Claimant email.
    pub user_email: String,
    /// Category identifier.
    pub category_id: CategoryId,
    /// Category display name.
    pub category_name: String,
    /// Status identifier.
    pub status_id: StatusId,
    /// Status display name.
    pub status_name: String,
    /// Claimed amount.
    pub amount: Money,
    /// Day the cost was incurred.
    pub expense_date: ExpenseDate,
    /// Free-text description.
    pub description: Option<String>,
    /// Stored receipt file name.
    pub receipt_file: Option<String>,
    /// Submission timestamp.
    pub submitted_at: Option<OffsetDateTime>,
    /// Reviewing manager identifier.
    pub reviewed_by: Option<UserId>,
    /// Reviewing manager name.
    pub reviewer_name: Option<String>,
    /// Review timestamp.
    pub reviewed_at: Option<OffsetDateTime>,
    /// Creation timestamp.
    pub created_at: OffsetDateTime,
}

impl Expense {
    /// Returns the status kind when the status id is known.
    #[must_use]
    pub fn status(&self) -> Option<ExpenseStatusKind> {
        ExpenseStatusKind::from_id(self.status_id)
    }
}

/// Borrowed JSON view of an [`Expense`].
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExpenseWire<'a> {
    /// Claim identifier.
    expense_id: ExpenseId,
    /// Claimant identifier.
    user_id: UserId,
    /// Claimant display name.
    user_name: &'a str,
    /// Claimant email.
    user_email: &'a str,
    /// Category identifier.
    category_id: CategoryId,
    /// Category display name.
    category_name: &'a str,
    /// Status identifier.
    status_id: StatusId,
    /// Status display name.
    status_name: &'a str,
    /// Amount in pence.
    amount_minor: Money,
    /// Amount in pounds.
    #[serde(rename = "amountGBP")]
    amount_gbp: f64,
    /// Currency code.
    currency: &'static str,
    /// Day the cost was incurred.
    expense_date: ExpenseDate,
    /// Free-text description.
    description: Option<&'a str>,
    /// Stored receipt file name.
    receipt_file: Option<&'a str>,
    /// Submission timestamp.
    #[serde(with = "time::serde::rfc3339::option")]
    submitted_at: Option<OffsetDateTime>,
    /// Reviewing manager identifier.
    reviewed_by: Option<UserId>,
    /// Reviewing manager name.
    reviewer_name: Option<&'a str>,
    /// Review timestamp.
    #[serde(with = "time::serde::rfc3339::option")]
    reviewed_at: Option<OffsetDateTime>,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

impl Serialize for Expense {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        ExpenseWire {
            expense_id: self.expense_id,
            user_id: self.user_id,
            user_name: &self.user_name,
            user_email: &self.user_email,
            category_id: self.category_id,
            category_name: &self.category_name,
            status_id: self.status_id,
            status_name: &self.status_name,
            amount_minor: self.amount,
            amount_gbp: self.amount.major(),
            currency: CURRENCY_CODE,
            expense_date: self.expense_date,
            description: self.description.as_deref(),
            receipt_file: self.receipt_file.as_deref(),
            submitted_at: self.submitted_at,
            reviewed_by: self.reviewed_by,
            reviewer_name: self.reviewer_name.as_deref(),
            reviewed_at: self.reviewed_at,
            created_at: self.created_at,
        }
        .serialize(serializer)
    }
}

/// Application user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User identifier.
    pub user_id: UserId,
    /// Display name.
    pub user_name: String,
    /// Email address.
    pub email: String,
    /// Role identifier.
    pub role_id: RoleId,
    /// Role display name.
    pub role_name: String,
    /// Line manager identifier.
    pub manager_id: Option<UserId>,
    /// Line manager name.
    pub manager_name: Option<String>,
    /// Whether the user may act.
    pub is_active: bool,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    /// Returns true when the user is an active manager.
    #[must_use]
    pub fn is_active_manager(&self) -> bool {
        self.is_active && self.role_id == RoleKind::Manager.id()
    }
}

/// Expense category reference row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseCategory {
    /// Category identifier.
    pub category_id: CategoryId,
    /// Display name.
    pub category_name: String,
    /// Whether new claims may use the category.
    pub is_active: bool,
}

/// Expense status reference row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseStatus {
    /// Status identifier.
    pub status_id: StatusId,
    /// Display name.
    pub status_name: String,
}

impl From<ExpenseStatusKind> for ExpenseStatus {
    fn from(kind: ExpenseStatusKind) -> Self {
        Self {
            status_id: kind.id(),
            status_name: kind.name().to_string(),
        }
    }
}

/// Aggregate dashboard figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DashboardStats {
    /// Number of claims in any state.
    pub total_expenses: i64,
    /// Number of submitted claims.
    pub pending_approvals: i64,
    /// Sum of approved claims.
    pub approved_amount: Money,
    /// Number of approved claims.
    pub approved_count: i64,
}

impl Serialize for DashboardStats {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("DashboardStats", 5)?;
        state.serialize_field("totalExpenses", &self.total_expenses)?;
        state.serialize_field("pendingApprovals", &self.pending_approvals)?;
        state.serialize_field("approvedAmountMinor", &self.approved_amount)?;
        state.serialize_field("approvedAmountGBP", &self.approved_amount.major())?;
        state.serialize_field("approvedCount", &self.approved_count)?;
        state.end()
    }
}

// ============================================================================
// SECTION: Queries
// ============================================================================

/// Optional filters for listing expenses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExpenseFilter {
    /// Restrict to one claimant.
    pub user_id: Option<UserId>,
    /// Restrict to one status.
    pub status_id: Option<StatusId>,
    /// Restrict to one category.
    pub category_id: Option<CategoryId>,
    /// Case-insensitive substring over description, category, and user name.
    pub search_term: Option<String>,
}

impl ExpenseFilter {
    /// Returns true when the expense satisfies every set filter.
    #[must_use]
    pub fn matches(&self, expense: &Expense) -> bool {
        self.user_id.is_none_or(|id| id == expense.user_id)
            && self.status_id.is_none_or(|id| id == expense.status_id)
            && self.category_id.is_none_or(|id| id == expense.category_id)
            && matches_search(self.search_term.as_deref(), expense)
    }
}

/// Returns true when `term` is empty or appears in the searchable fields.
#[must_use]
pub fn matches_search(term: Option<&str>, expense: &Expense) -> bool {
    let Some(term) = term.map(str::trim).filter(|term| !term.is_empty()) else {
        return true;
    };
    let needle = term.to_lowercase();
    expense.description.as_deref().is_some_and(|text| text.to_lowercase().contains(&needle))
        || expense.category_name.to_lowercase().contains(&needle)
        || expense.user_name.to_lowercase().contains(&needle)
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Payload for creating an expense claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExpenseRequest {
    /// Claimant identifier.
    pub user_id: UserId,
    /// Category identifier.
    pub category_id: CategoryId,
    /// Amount in pounds.
    pub amount: Number,
    /// Day the cost was incurred.
    pub expense_date: ExpenseDate,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
}

impl CreateExpenseRequest {
    /// Validates the payload into store input.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the amount is not positive or the
    /// description is too long.
    pub fn validate(&self) -> Result<NewExpense, ValidationError> {
        Ok(NewExpense {
            user_id: self.user_id,
            category_id: self.category_id,
            amount: validate_amount(&self.amount)?,
            expense_date: self.expense_date,
            description: validate_description(self.description.as_deref())?,
        })
    }
}

/// Payload for editing a draft expense claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExpenseRequest {
    /// Category identifier.
    pub category_id: CategoryId,
    /// Amount in pounds.
    pub amount: Number,
    /// Day the cost was incurred.
    pub expense_date: ExpenseDate,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
}

impl UpdateExpenseRequest {
    /// Validates the payload into store input.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the amount is not positive or the
    /// description is too long.
    pub fn validate(&self) -> Result<ExpenseUpdate, ValidationError> {
        Ok(ExpenseUpdate {
            category_id: self.category_id,
            amount: validate_amount(&self.amount)?,
            expense_date: self.expense_date,
            description: validate_description(self.description.as_deref())?,
        })
    }
}

/// Validated input for `usp_CreateExpense`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExpense {
    /// Claimant identifier.
    pub user_id: UserId,
    /// Category identifier.
    pub category_id: CategoryId,
    /// Positive amount.
    pub amount: Money,
    /// Day the cost was incurred.
    pub expense_date: ExpenseDate,
    /// Trimmed description, absent when blank.
    pub description: Option<String>,
}

/// Validated input for `usp_UpdateExpense`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseUpdate {
    /// Category identifier.
    pub category_id: CategoryId,
    /// Positive amount.
    pub amount: Money,
    /// Day the cost was incurred.
    pub expense_date: ExpenseDate,
    /// Trimmed description, absent when blank.
    pub description: Option<String>,
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Request validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Amount is zero or negative after conversion to pence.
    #[error("Amount must be greater than zero.")]
    AmountNotPositive,
    /// Amount is not a usable decimal.
    #[error("Amount is invalid: {0}")]
    AmountInvalid(String),
    /// Description exceeds the length limit.
    #[error("Description must be at most {max} characters.")]
    DescriptionTooLong {
        /// Maximum characters allowed.
        max: usize,
    },
}

/// Converts a pound amount to a positive [`Money`].
fn validate_amount(amount: &Number) -> Result<Money, ValidationError> {
    let money =
        Money::from_major(amount).map_err(|err| ValidationError::AmountInvalid(err.to_string()))?;
    if !money.is_positive() {
        return Err(ValidationError::AmountNotPositive);
    }
    Ok(money)
}

/// Trims a description and enforces the length limit.
fn validate_description(description: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(text) = description.map(str::trim).filter(|text| !text.is_empty()) else {
        return Ok(None);
    };
    if text.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(ValidationError::DescriptionTooLong {
            max: MAX_DESCRIPTION_CHARS,
        });
    }
    Ok(Some(text.to_string()))
}
