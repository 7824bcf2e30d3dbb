// crates/expense-core/src/runtime/store.rs
// ============================================================================
// Module: Expense In-Memory Store
// Description: In-memory expense backend plus shared and unavailable wrappers.
// Purpose: Provide a deterministic procedure implementation without a database.
// Dependencies: crate::core, crate::interfaces, crate::runtime::demo
// ============================================================================

//! ## Overview
//! [`InMemoryExpenseStore`] implements every expense procedure over maps held
//! behind a mutex. It enforces the same lifecycle rules as the SQLite backend
//! and backs the `memory` store type and tests.
//!
//! [`SharedExpenseStore`] wraps any backend in a clonable `Arc`.
//! [`UnavailableExpenseStore`] stands in for a backend that could not be
//! opened and fails every call.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use time::Duration;
use time::OffsetDateTime;

use crate::core::CategoryId;
use crate::core::DashboardStats;
use crate::core::Expense;
use crate::core::ExpenseCategory;
use crate::core::ExpenseDate;
use crate::core::ExpenseFilter;
use crate::core::ExpenseId;
use crate::core::ExpenseStatus;
use crate::core::ExpenseStatusKind;
use crate::core::ExpenseUpdate;
use crate::core::Money;
use crate::core::NewExpense;
use crate::core::RoleKind;
use crate::core::User;
use crate::core::UserId;
use crate::core::matches_search;
use crate::interfaces::ExpenseStore;
use crate::interfaces::StoreError;
use crate::runtime::demo::EXPENSE_SEEDS;
use crate::runtime::demo::demo_categories;
use crate::runtime::demo::demo_users;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Stored expense row before joins.
#[derive(Debug, Clone)]
struct ExpenseRow {
    /// Claimant identifier.
    user_id: UserId,
    /// Category identifier.
    category_id: CategoryId,
    /// Lifecycle status.
    status: ExpenseStatusKind,
    /// Claimed amount.
    amount: Money,
    /// Day the cost was incurred.
    expense_date: ExpenseDate,
    /// Free-text description.
    description: Option<String>,
    /// Submission timestamp.
    submitted_at: Option<OffsetDateTime>,
    /// Reviewing manager.
    reviewed_by: Option<UserId>,
    /// Review timestamp.
    reviewed_at: Option<OffsetDateTime>,
    /// Creation timestamp.
    created_at: OffsetDateTime,
}

/// Tables held by the in-memory store.
#[derive(Debug, Default)]
struct Tables {
    /// Users by identifier.
    users: BTreeMap<UserId, User>,
    /// Categories by identifier.
    categories: BTreeMap<CategoryId, ExpenseCategory>,
    /// Expenses by identifier.
    expenses: BTreeMap<ExpenseId, ExpenseRow>,
    /// Next expense identifier.
    next_expense_id: i64,
}

/// In-memory expense store for tests and the `memory` backend.
#[derive(Debug, Clone)]
pub struct InMemoryExpenseStore {
    /// Tables protected by a mutex.
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryExpenseStore {
    /// Creates a store holding reference categories and demo users, with no
    /// expenses.
    #[must_use]
    pub fn new(now: OffsetDateTime) -> Self {
        let tables = Tables {
            users: demo_users(now).into_iter().map(|user| (user.user_id, user)).collect(),
            categories: demo_categories()
                .into_iter()
                .map(|category| (category.category_id, category))
                .collect(),
            expenses: BTreeMap::new(),
            next_expense_id: 1,
        };
        Self {
            tables: Arc::new(Mutex::new(tables)),
        }
    }

    /// Creates a store holding reference data and the demo expense claims.
    #[must_use]
    pub fn seeded(now: OffsetDateTime) -> Self {
        let store = Self::new(now);
        if let Ok(mut tables) = store.tables.lock() {
            for seed in EXPENSE_SEEDS {
                let created_at = now - Duration::days(seed.age_days);
                let reviewed = matches!(
                    seed.status,
                    ExpenseStatusKind::Approved | ExpenseStatusKind::Rejected
                );
                let submitted = seed.status != ExpenseStatusKind::Draft;
                tables.expenses.insert(
                    ExpenseId::new(seed.id),
                    ExpenseRow {
                        user_id: UserId::new(seed.user_id),
                        category_id: CategoryId::new(seed.category_id),
                        status: seed.status,
                        amount: Money::from_minor(seed.amount_minor),
                        expense_date: ExpenseDate::from_timestamp(created_at),
                        description: Some(seed.description.to_string()),
                        submitted_at: submitted.then_some(created_at),
                        reviewed_by: reviewed.then_some(UserId::new(2)),
                        reviewed_at: reviewed.then_some(created_at),
                        created_at,
                    },
                );
                tables.next_expense_id = tables.next_expense_id.max(seed.id + 1);
            }
        }
        store
    }

    /// Inserts or replaces a user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store lock is poisoned.
    pub fn upsert_user(&self, user: User) -> Result<(), StoreError> {
        self.lock()?.users.insert(user.user_id, user);
        Ok(())
    }

    /// Inserts or replaces a category.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store lock is poisoned.
    pub fn upsert_category(&self, category: ExpenseCategory) -> Result<(), StoreError> {
        self.lock()?.categories.insert(category.category_id, category);
        Ok(())
    }

    /// Locks the tables.
    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Store("expense store mutex poisoned".to_string()))
    }
}

impl Tables {
    /// Joins a stored row with its user, category, and reviewer.
    fn hydrate(&self, id: ExpenseId, row: &ExpenseRow) -> Result<Expense, StoreError> {
        let user = self
            .users
            .get(&row.user_id)
            .ok_or_else(|| StoreError::Invalid(format!("expense {id} references unknown user")))?;
        let category = self.categories.get(&row.category_id).ok_or_else(|| {
            StoreError::Invalid(format!("expense {id} references unknown category"))
        })?;
        let reviewer_name = row
            .reviewed_by
            .and_then(|reviewer| self.users.get(&reviewer))
            .map(|reviewer| reviewer.user_name.clone());
        Ok(Expense {
            expense_id: id,
            user_id: row.user_id,
            user_name: user.user_name.clone(),
            user_email: user.email.clone(),
            category_id: row.category_id,
            category_name: category.category_name.clone(),
            status_id: row.status.id(),
            status_name: row.status.name().to_string(),
            amount: row.amount,
            expense_date: row.expense_date,
            description: row.description.clone(),
            receipt_file: None,
            submitted_at: row.submitted_at,
            reviewed_by: row.reviewed_by,
            reviewer_name,
            reviewed_at: row.reviewed_at,
            created_at: row.created_at,
        })
    }

    /// Joins every row accepted by `keep`.
    fn hydrate_where(
        &self,
        mut keep: impl FnMut(&ExpenseRow) -> bool,
    ) -> Result<Vec<Expense>, StoreError> {
        self.expenses
            .iter()
            .filter(|entry| keep(entry.1))
            .map(|(id, row)| self.hydrate(*id, row))
            .collect()
    }

    /// Returns true when the category exists and is active.
    fn category_active(&self, id: CategoryId) -> bool {
        self.categories.get(&id).is_some_and(|category| category.is_active)
    }

    /// Returns true when the user is an active manager.
    fn reviewer_allowed(&self, id: UserId) -> bool {
        self.users.get(&id).is_some_and(User::is_active_manager)
    }

    /// Records a review decision on a submitted claim.
    fn review(
        &mut self,
        id: ExpenseId,
        reviewer: UserId,
        outcome: ExpenseStatusKind,
        now: OffsetDateTime,
    ) -> bool {
        if !self.reviewer_allowed(reviewer) {
            return false;
        }
        match self.expenses.get_mut(&id) {
            Some(row) if row.status == ExpenseStatusKind::Submitted => {
                row.status = outcome;
                row.reviewed_by = Some(reviewer);
                row.reviewed_at = Some(now);
                true
            }
            _ => false,
        }
    }
}

impl ExpenseStore for InMemoryExpenseStore {
    fn list_expenses(&self, filter: &ExpenseFilter) -> Result<Vec<Expense>, StoreError> {
        let tables = self.lock()?;
        let mut expenses = tables.hydrate_where(|_| true)?;
        expenses.retain(|expense| filter.matches(expense));
        expenses.sort_by(|a, b| {
            b.expense_date.cmp(&a.expense_date).then_with(|| b.expense_id.cmp(&a.expense_id))
        });
        Ok(expenses)
    }

    fn expense_by_id(&self, id: ExpenseId) -> Result<Option<Expense>, StoreError> {
        let tables = self.lock()?;
        tables.expenses.get(&id).map(|row| tables.hydrate(id, row)).transpose()
    }

    fn create_expense(
        &self,
        expense: &NewExpense,
        now: OffsetDateTime,
    ) -> Result<Option<ExpenseId>, StoreError> {
        let mut tables = self.lock()?;
        let user_active = tables.users.get(&expense.user_id).is_some_and(|user| user.is_active);
        if !user_active || !tables.category_active(expense.category_id) {
            return Ok(None);
        }
        let id = ExpenseId::new(tables.next_expense_id);
        tables.next_expense_id += 1;
        tables.expenses.insert(
            id,
            ExpenseRow {
                user_id: expense.user_id,
                category_id: expense.category_id,
                status: ExpenseStatusKind::Draft,
                amount: expense.amount,
                expense_date: expense.expense_date,
                description: expense.description.clone(),
                submitted_at: None,
                reviewed_by: None,
                reviewed_at: None,
                created_at: now,
            },
        );
        Ok(Some(id))
    }

    fn update_expense(&self, id: ExpenseId, update: &ExpenseUpdate) -> Result<bool, StoreError> {
        let mut tables = self.lock()?;
        if !tables.category_active(update.category_id) {
            return Ok(false);
        }
        match tables.expenses.get_mut(&id) {
            Some(row) if row.status == ExpenseStatusKind::Draft => {
                row.category_id = update.category_id;
                row.amount = update.amount;
                row.expense_date = update.expense_date;
                row.description.clone_from(&update.description);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete_expense(&self, id: ExpenseId) -> Result<bool, StoreError> {
        let mut tables = self.lock()?;
        let is_draft =
            tables.expenses.get(&id).is_some_and(|row| row.status == ExpenseStatusKind::Draft);
        if is_draft {
            tables.expenses.remove(&id);
        }
        Ok(is_draft)
    }

    fn submit_expense(&self, id: ExpenseId, now: OffsetDateTime) -> Result<bool, StoreError> {
        let mut tables = self.lock()?;
        match tables.expenses.get_mut(&id) {
            Some(row) if row.status == ExpenseStatusKind::Draft => {
                row.status = ExpenseStatusKind::Submitted;
                row.submitted_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn approve_expense(
        &self,
        id: ExpenseId,
        reviewer: UserId,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        Ok(self.lock()?.review(id, reviewer, ExpenseStatusKind::Approved, now))
    }

    fn reject_expense(
        &self,
        id: ExpenseId,
        reviewer: UserId,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        Ok(self.lock()?.review(id, reviewer, ExpenseStatusKind::Rejected, now))
    }

    fn pending_expenses(&self, search_term: Option<&str>) -> Result<Vec<Expense>, StoreError> {
        let tables = self.lock()?;
        let mut expenses =
            tables.hydrate_where(|row| row.status == ExpenseStatusKind::Submitted)?;
        expenses.retain(|expense| matches_search(search_term, expense));
        expenses.sort_by(|a, b| {
            a.submitted_at.cmp(&b.submitted_at).then_with(|| a.expense_id.cmp(&b.expense_id))
        });
        Ok(expenses)
    }

    fn categories(&self) -> Result<Vec<ExpenseCategory>, StoreError> {
        let tables = self.lock()?;
        Ok(tables.categories.values().filter(|category| category.is_active).cloned().collect())
    }

    fn statuses(&self) -> Result<Vec<ExpenseStatus>, StoreError> {
        Ok(ExpenseStatusKind::ALL.into_iter().map(ExpenseStatus::from).collect())
    }

    fn users(&self) -> Result<Vec<User>, StoreError> {
        let tables = self.lock()?;
        let mut users: Vec<User> = tables.users.values().cloned().collect();
        users.sort_by(|a, b| a.user_name.cmp(&b.user_name));
        Ok(users)
    }

    fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    fn managers(&self) -> Result<Vec<User>, StoreError> {
        let tables = self.lock()?;
        let mut managers: Vec<User> = tables
            .users
            .values()
            .filter(|user| user.is_active && user.role_id == RoleKind::Manager.id())
            .cloned()
            .collect();
        managers.sort_by(|a, b| a.user_name.cmp(&b.user_name));
        Ok(managers)
    }

    fn dashboard_stats(&self) -> Result<DashboardStats, StoreError> {
        let tables = self.lock()?;
        let mut stats = DashboardStats::default();
        for row in tables.expenses.values() {
            stats.total_expenses += 1;
            match row.status {
                ExpenseStatusKind::Submitted => stats.pending_approvals += 1,
                ExpenseStatusKind::Approved => {
                    stats.approved_count += 1;
                    stats.approved_amount =
                        stats.approved_amount.checked_add(row.amount).ok_or_else(|| {
                            StoreError::Invalid("approved total overflows".to_string())
                        })?;
                }
                ExpenseStatusKind::Draft | ExpenseStatusKind::Rejected => {}
            }
        }
        Ok(stats)
    }

    fn recent_expenses(&self, top: usize) -> Result<Vec<Expense>, StoreError> {
        let tables = self.lock()?;
        let mut expenses = tables.hydrate_where(|_| true)?;
        expenses.sort_by(|a, b| {
            b.created_at.cmp(&a.created_at).then_with(|| b.expense_id.cmp(&a.expense_id))
        });
        expenses.truncate(top);
        Ok(expenses)
    }
}

// ============================================================================
// SECTION: Unavailable Store
// ============================================================================

/// Backend placeholder that fails every call as unreachable.
#[derive(Debug, Clone)]
pub struct UnavailableExpenseStore {
    /// Diagnostic reported by every call.
    reason: String,
}

impl UnavailableExpenseStore {
    /// Creates a placeholder reporting `reason`.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Returns the failure for any call.
    fn fail<T>(&self) -> Result<T, StoreError> {
        Err(StoreError::Unavailable(self.reason.clone()))
    }
}

impl ExpenseStore for UnavailableExpenseStore {
    fn list_expenses(&self, _filter: &ExpenseFilter) -> Result<Vec<Expense>, StoreError> {
        self.fail()
    }

    fn expense_by_id(&self, _id: ExpenseId) -> Result<Option<Expense>, StoreError> {
        self.fail()
    }

    fn create_expense(
        &self,
        _expense: &NewExpense,
        _now: OffsetDateTime,
    ) -> Result<Option<ExpenseId>, StoreError> {
        self.fail()
    }

    fn update_expense(&self, _id: ExpenseId, _update: &ExpenseUpdate) -> Result<bool, StoreError> {
        self.fail()
    }

    fn delete_expense(&self, _id: ExpenseId) -> Result<bool, StoreError> {
        self.fail()
    }

    fn submit_expense(&self, _id: ExpenseId, _now: OffsetDateTime) -> Result<bool, StoreError> {
        self.fail()
    }

    fn approve_expense(
        &self,
        _id: ExpenseId,
        _reviewer: UserId,
        _now: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        self.fail()
    }

    fn reject_expense(
        &self,
        _id: ExpenseId,
        _reviewer: UserId,
        _now: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        self.fail()
    }

    fn pending_expenses(&self, _search_term: Option<&str>) -> Result<Vec<Expense>, StoreError> {
        self.fail()
    }

    fn categories(&self) -> Result<Vec<ExpenseCategory>, StoreError> {
        self.fail()
    }

    fn statuses(&self) -> Result<Vec<ExpenseStatus>, StoreError> {
        self.fail()
    }

    fn users(&self) -> Result<Vec<User>, StoreError> {
        self.fail()
    }

    fn user_by_id(&self, _id: UserId) -> Result<Option<User>, StoreError> {
        self.fail()
    }

    fn managers(&self) -> Result<Vec<User>, StoreError> {
        self.fail()
    }

    fn dashboard_stats(&self) -> Result<DashboardStats, StoreError> {
        self.fail()
    }

    fn recent_expenses(&self, _top: usize) -> Result<Vec<Expense>, StoreError> {
        self.fail()
    }

    fn readiness(&self) -> Result<(), StoreError> {
        self.fail()
    }
}

// ============================================================================
// SECTION: Shared Store Wrapper
// ============================================================================

/// Shared expense store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedExpenseStore {
    /// Inner store implementation.
    inner: Arc<dyn ExpenseStore + Send + Sync>,
}

impl SharedExpenseStore {
    /// Wraps an expense store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl ExpenseStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn ExpenseStore + Send + Sync>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl ExpenseStore for SharedExpenseStore {
    fn list_expenses(&self, filter: &ExpenseFilter) -> Result<Vec<Expense>, StoreError> {
        self.inner.list_expenses(filter)
    }

    fn expense_by_id(&self, id: ExpenseId) -> Result<Option<Expense>, StoreError> {
        self.inner.expense_by_id(id)
    }

    fn create_expense(
        &self,
        expense: &NewExpense,
        now: OffsetDateTime,
    ) -> Result<Option<ExpenseId>, StoreError> {
        self.inner.create_expense(expense, now)
    }

    fn update_expense(&self, id: ExpenseId, update: &ExpenseUpdate) -> Result<bool, StoreError> {
        self.inner.update_expense(id, update)
    }

    fn delete_expense(&self, id: ExpenseId) -> Result<bool, StoreError> {
        self.inner.delete_expense(id)
    }

    fn submit_expense(&self, id: ExpenseId, now: OffsetDateTime) -> Result<bool, StoreError> {
        self.inner.submit_expense(id, now)
    }

    fn approve_expense(
        &self,
        id: ExpenseId,
        reviewer: UserId,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        self.inner.approve_expense(id, reviewer, now)
    }

    fn reject_expense(
        &self,
        id: ExpenseId,
        reviewer: UserId,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        self.inner.reject_expense(id, reviewer, now)
    }

    fn pending_expenses(&self, search_term: Option<&str>) -> Result<Vec<Expense>, StoreError> {
        self.inner.pending_expenses(search_term)
    }

    fn categories(&self) -> Result<Vec<ExpenseCategory>, StoreError> {
        self.inner.categories()
    }

    fn statuses(&self) -> Result<Vec<ExpenseStatus>, StoreError> {
        self.inner.statuses()
    }

    fn users(&self) -> Result<Vec<User>, StoreError> {
        self.inner.users()
    }

    fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.inner.user_by_id(id)
    }

    fn managers(&self) -> Result<Vec<User>, StoreError> {
        self.inner.managers()
    }

    fn dashboard_stats(&self) -> Result<DashboardStats, StoreError> {
        self.inner.dashboard_stats()
    }

    fn recent_expenses(&self, top: usize) -> Result<Vec<Expense>, StoreError> {
        self.inner.recent_expenses(top)
    }

    fn readiness(&self) -> Result<(), StoreError> {
        self.inner.readiness()
    }
}
