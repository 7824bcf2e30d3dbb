// crates/expense-core/src/runtime/demo.rs
// ============================================================================
// Module: Expense Demo Data
// Description: Fixed reference and sample data for offline operation.
// Purpose: Serve plausible results while the backing database is unreachable,
//          and seed fresh stores with the same reference rows.
// Dependencies: crate::core, time
// ============================================================================

//! ## Overview
//! Demo data is relative to a supplied "now" so dates stay recent. The same
//! constants seed the in-memory and SQLite stores, which keeps identifiers and
//! names consistent between live and demo responses.

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::Duration;
use time::OffsetDateTime;

use crate::core::CategoryId;
use crate::core::DashboardStats;
use crate::core::Expense;
use crate::core::ExpenseCategory;
use crate::core::ExpenseDate;
use crate::core::ExpenseId;
use crate::core::ExpenseStatus;
use crate::core::ExpenseStatusKind;
use crate::core::Money;
use crate::core::RoleKind;
use crate::core::User;
use crate::core::UserId;

// ============================================================================
// SECTION: Seed Rows
// ============================================================================

/// Category seed row.
#[derive(Debug, Clone, Copy)]
pub struct CategorySeed {
    /// Category identifier.
    pub id: i64,
    /// Display name.
    pub name: &'static str,
}

/// User seed row.
#[derive(Debug, Clone, Copy)]
pub struct UserSeed {
    /// User identifier.
    pub id: i64,
    /// Display name.
    pub name: &'static str,
    /// Email address.
    pub email: &'static str,
    /// Role.
    pub role: RoleKind,
    /// Line manager identifier.
    pub manager_id: Option<i64>,
    /// Account age in days relative to now.
    pub age_days: i64,
}

/// Expense seed row.
#[derive(Debug, Clone, Copy)]
pub struct ExpenseSeed {
    /// Expense identifier.
    pub id: i64,
    /// Claimant identifier.
    pub user_id: i64,
    /// Category identifier.
    pub category_id: i64,
    /// Lifecycle status.
    pub status: ExpenseStatusKind,
    /// Amount in pence.
    pub amount_minor: i64,
    /// Days before now the cost was incurred.
    pub age_days: i64,
    /// Description.
    pub description: &'static str,
}

/// Reference categories.
pub const CATEGORY_SEEDS: [CategorySeed; 5] = [
    CategorySeed {
        id: 1,
        name: "Travel",
    },
    CategorySeed {
        id: 2,
        name: "Meals",
    },
    CategorySeed {
        id: 3,
        name: "Supplies",
    },
    CategorySeed {
        id: 4,
        name: "Accommodation",
    },
    CategorySeed {
        id: 5,
        name: "Other",
    },
];

/// Demo users.
pub const USER_SEEDS: [UserSeed; 2] = [
    UserSeed {
        id: 1,
        name: "Alice Example",
        email: "alice@example.co.uk",
        role: RoleKind::Employee,
        manager_id: Some(2),
        age_days: 182,
    },
    UserSeed {
        id: 2,
        name: "Bob Manager",
        email: "bob.manager@example.co.uk",
        role: RoleKind::Manager,
        manager_id: None,
        age_days: 365,
    },
];

/// Demo expense claims.
pub const EXPENSE_SEEDS: [ExpenseSeed; 4] = [
    ExpenseSeed {
        id: 1,
        user_id: 1,
        category_id: 1,
        status: ExpenseStatusKind::Submitted,
        amount_minor: 2540,
        age_days: 5,
        description: "Taxi from airport to client site",
    },
    ExpenseSeed {
        id: 2,
        user_id: 1,
        category_id: 2,
        status: ExpenseStatusKind::Approved,
        amount_minor: 1425,
        age_days: 30,
        description: "Client lunch meeting",
    },
    ExpenseSeed {
        id: 3,
        user_id: 1,
        category_id: 3,
        status: ExpenseStatusKind::Draft,
        amount_minor: 799,
        age_days: 1,
        description: "Office stationery",
    },
    ExpenseSeed {
        id: 4,
        user_id: 1,
        category_id: 4,
        status: ExpenseStatusKind::Approved,
        amount_minor: 12300,
        age_days: 60,
        description: "Hotel during client visit",
    },
];

// ============================================================================
// SECTION: Demo Records
// ============================================================================

/// Returns the reference categories.
#[must_use]
pub fn demo_categories() -> Vec<ExpenseCategory> {
    CATEGORY_SEEDS
        .iter()
        .map(|seed| ExpenseCategory {
            category_id: CategoryId::new(seed.id),
            category_name: seed.name.to_string(),
            is_active: true,
        })
        .collect()
}

/// Returns the reference statuses.
#[must_use]
pub fn demo_statuses() -> Vec<ExpenseStatus> {
    ExpenseStatusKind::ALL.into_iter().map(ExpenseStatus::from).collect()
}

/// Returns the demo users relative to `now`.
#[must_use]
pub fn demo_users(now: OffsetDateTime) -> Vec<User> {
    USER_SEEDS
        .iter()
        .map(|seed| User {
            user_id: UserId::new(seed.id),
            user_name: seed.name.to_string(),
            email: seed.email.to_string(),
            role_id: seed.role.id(),
            role_name: seed.role.name().to_string(),
            manager_id: seed.manager_id.map(UserId::new),
            manager_name: seed
                .manager_id
                .and_then(user_seed)
                .map(|manager| manager.name.to_string()),
            is_active: true,
            created_at: now - Duration::days(seed.age_days),
        })
        .collect()
}

/// Returns the demo expense claims relative to `now`.
#[must_use]
pub fn demo_expenses(now: OffsetDateTime) -> Vec<Expense> {
    EXPENSE_SEEDS
        .iter()
        .map(|seed| {
            let user = user_seed(seed.user_id);
            let created_at = now - Duration::days(seed.age_days);
            Expense {
                expense_id: ExpenseId::new(seed.id),
                user_id: UserId::new(seed.user_id),
                user_name: user.map(|user| user.name.to_string()).unwrap_or_default(),
                user_email: user.map(|user| user.email.to_string()).unwrap_or_default(),
                category_id: CategoryId::new(seed.category_id),
                category_name: category_seed(seed.category_id)
                    .map(|category| category.name.to_string())
                    .unwrap_or_default(),
                status_id: seed.status.id(),
                status_name: seed.status.name().to_string(),
                amount: Money::from_minor(seed.amount_minor),
                expense_date: ExpenseDate::from_timestamp(created_at),
                description: Some(seed.description.to_string()),
                receipt_file: None,
                submitted_at: None,
                reviewed_by: None,
                reviewer_name: None,
                reviewed_at: None,
                created_at,
            }
        })
        .collect()
}

/// Returns the dashboard figures for the demo claims.
#[must_use]
pub const fn demo_stats() -> DashboardStats {
    DashboardStats {
        total_expenses: 4,
        pending_approvals: 1,
        approved_amount: Money::from_minor(13_725),
        approved_count: 2,
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Finds a user seed by identifier.
fn user_seed(id: i64) -> Option<&'static UserSeed> {
    USER_SEEDS.iter().find(|seed| seed.id == id)
}

/// Finds a category seed by identifier.
fn category_seed(id: i64) -> Option<&'static CategorySeed> {
    CATEGORY_SEEDS.iter().find(|seed| seed.id == id)
}
