// crates/expense-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Expense Store
// Description: Durable ExpenseStore backed by SQLite.
// Purpose: Implement the expense procedures over a versioned SQLite schema.
// Dependencies: expense-core, rusqlite, serde, thiserror, time
// ============================================================================

//! ## Overview
//! [`SqliteExpenseStore`] owns one connection behind a mutex. Opening the
//! store validates the path, applies durability pragmas, creates or checks the
//! schema version, and seeds reference data (roles, statuses, categories, and
//! the demo users). Expense rows are only seeded on request.
//!
//! Timestamps are stored as fixed-width UTC text so lexical order matches
//! chronological order. Amounts are stored in pence.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use expense_core::CategoryId;
use expense_core::DashboardStats;
use expense_core::Expense;
use expense_core::ExpenseCategory;
use expense_core::ExpenseDate;
use expense_core::ExpenseFilter;
use expense_core::ExpenseId;
use expense_core::ExpenseStatus;
use expense_core::ExpenseStatusKind;
use expense_core::ExpenseStore;
use expense_core::ExpenseUpdate;
use expense_core::Money;
use expense_core::NewExpense;
use expense_core::RoleId;
use expense_core::RoleKind;
use expense_core::StatusId;
use expense_core::StoreError;
use expense_core::User;
use expense_core::UserId;
use expense_core::runtime::demo::CATEGORY_SEEDS;
use expense_core::runtime::demo::EXPENSE_SEEDS;
use expense_core::runtime::demo::USER_SEEDS;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Params;
use rusqlite::Row;
use rusqlite::functions::FunctionFlags;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;
use time::Duration;
use time::OffsetDateTime;
use time::PrimitiveDateTime;
use time::UtcOffset;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Stored timestamp format (UTC, nanosecond precision, fixed width).
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:9]Z"
);

/// Joined expense projection shared by every expense query.
const EXPENSE_SELECT: &str = "SELECT e.expense_id, e.user_id, u.user_name, u.email, \
     e.category_id, c.category_name, e.status_id, s.status_name, e.amount_minor, \
     e.expense_date, e.description, e.receipt_file, e.submitted_at, e.reviewed_by, \
     r.user_name, e.reviewed_at, e.created_at
     FROM expenses e
     JOIN users u ON u.user_id = e.user_id
     JOIN expense_categories c ON c.category_id = e.category_id
     JOIN expense_statuses s ON s.status_id = e.status_id
     LEFT JOIN users r ON r.user_id = e.reviewed_by";

/// Joined user projection shared by every user query.
const USER_SELECT: &str = "SELECT u.user_id, u.user_name, u.email, u.role_id, ro.role_name, \
     u.manager_id, m.user_name, u.is_active, u.created_at
     FROM users u
     JOIN roles ro ON ro.role_id = u.role_id
     LEFT JOIN users m ON m.user_id = u.manager_id";

/// Search predicate over description, category name, and user name.
const SEARCH_PREDICATE: &str = "(?1 IS NULL
     OR instr(unicode_lower(coalesce(e.description, '')), ?1) > 0
     OR instr(unicode_lower(c.category_name), ?1) > 0
     OR instr(unicode_lower(u.user_name), ?1) > 0)";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` expense store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a config for `path` with default tuning.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Engine messages carry an operator hint when one is known.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// Database cannot be opened or is locked.
    #[error("sqlite store unavailable: {0}")]
    Unavailable(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data or configuration.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) | SqliteStoreError::Unavailable(message) => {
                Self::Unavailable(message)
            }
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::VersionMismatch(message) | SqliteStoreError::Invalid(message) => {
                Self::Invalid(message)
            }
        }
    }
}

/// Returns an operator hint for a known `SQLite` failure message.
#[must_use]
pub fn diagnose(message: &str) -> Option<&'static str> {
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("unable to open database") {
        Some("check that the store path exists and is writable")
    } else if lowered.contains("database is locked") || lowered.contains("database is busy") {
        Some("another connection holds the write lock; retry or raise busy_timeout_ms")
    } else if lowered.contains("readonly") || lowered.contains("read-only") {
        Some("the database file or its directory is read-only")
    } else if lowered.contains("not a database") {
        Some("the store path points at a file that is not a SQLite database")
    } else {
        None
    }
}

/// Converts an engine error, classifying connectivity failures.
fn db_error(err: rusqlite::Error) -> SqliteStoreError {
    let unavailable = matches!(
        err.sqlite_error_code(),
        Some(
            ErrorCode::CannotOpen
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::NotADatabase
                | ErrorCode::ReadOnly
        )
    );
    let raw = err.to_string();
    let message = match diagnose(&raw) {
        Some(hint) => format!("{raw} (hint: {hint})"),
        None => raw,
    };
    if unavailable { SqliteStoreError::Unavailable(message) } else { SqliteStoreError::Db(message) }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed expense store.
#[derive(Clone)]
pub struct SqliteExpenseStore {
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteExpenseStore {
    /// Opens the store, creating the schema and reference data when absent.
    /// `now` anchors the seeded users' creation times.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is invalid, the database
    /// cannot be opened, or the schema version is unsupported.
    pub fn new(config: &SqliteStoreConfig, now: OffsetDateTime) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection, now)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Inserts the demo expense claims when the store holds no expenses.
    /// Returns the number of rows inserted.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the insert fails.
    pub fn seed_demo_expenses(&self, now: OffsetDateTime) -> Result<usize, SqliteStoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        let existing: i64 =
            tx.query_row("SELECT COUNT(*) FROM expenses", params![], |row| row.get(0))
                .map_err(db_error)?;
        if existing > 0 {
            return Ok(0);
        }
        let reviewer =
            USER_SEEDS.iter().find(|seed| seed.role == RoleKind::Manager).map(|seed| seed.id);
        for seed in EXPENSE_SEEDS {
            let created_at = now - Duration::days(seed.age_days);
            let stamp = format_timestamp(created_at)?;
            let submitted = seed.status != ExpenseStatusKind::Draft;
            let reviewed = matches!(
                seed.status,
                ExpenseStatusKind::Approved | ExpenseStatusKind::Rejected
            );
            tx.execute(
                "INSERT INTO expenses (expense_id, user_id, category_id, status_id, amount_minor, \
                 expense_date, description, submitted_at, reviewed_by, reviewed_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    seed.id,
                    seed.user_id,
                    seed.category_id,
                    seed.status.id().get(),
                    seed.amount_minor,
                    ExpenseDate::from_timestamp(created_at).to_iso(),
                    seed.description,
                    submitted.then(|| stamp.clone()),
                    if reviewed { reviewer } else { None },
                    reviewed.then(|| stamp.clone()),
                    stamp,
                ],
            )
            .map_err(db_error)?;
        }
        tx.commit().map_err(db_error)?;
        Ok(EXPENSE_SEEDS.len())
    }

    /// Locks the connection.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("sqlite connection mutex poisoned".to_string()))
    }

    /// Runs `op` with the locked connection, converting errors for callers.
    fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> Result<T, SqliteStoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.lock()?;
        op(&mut guard).map_err(StoreError::from)
    }
}

impl ExpenseStore for SqliteExpenseStore {
    fn list_expenses(&self, filter: &ExpenseFilter) -> Result<Vec<Expense>, StoreError> {
        let search = normalize_search(filter.search_term.as_deref());
        let sql = format!(
            "{EXPENSE_SELECT}
             WHERE {SEARCH_PREDICATE}
               AND (?2 IS NULL OR e.user_id = ?2)
               AND (?3 IS NULL OR e.status_id = ?3)
               AND (?4 IS NULL OR e.category_id = ?4)
             ORDER BY e.expense_date DESC, e.expense_id DESC"
        );
        self.with_connection(|conn| {
            query_expenses(
                conn,
                &sql,
                params![
                    search,
                    filter.user_id.map(UserId::get),
                    filter.status_id.map(StatusId::get),
                    filter.category_id.map(CategoryId::get),
                ],
            )
        })
    }

    fn expense_by_id(&self, id: ExpenseId) -> Result<Option<Expense>, StoreError> {
        let sql = format!("{EXPENSE_SELECT} WHERE e.expense_id = ?1");
        self.with_connection(|conn| {
            Ok(query_expenses(conn, &sql, params![id.get()])?.into_iter().next())
        })
    }

    fn create_expense(
        &self,
        expense: &NewExpense,
        now: OffsetDateTime,
    ) -> Result<Option<ExpenseId>, StoreError> {
        self.with_connection(|conn| {
            let tx = conn.transaction().map_err(db_error)?;
            let user_active: Option<bool> = tx
                .query_row(
                    "SELECT is_active FROM users WHERE user_id = ?1",
                    params![expense.user_id.get()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_error)?;
            let category_active: Option<bool> = tx
                .query_row(
                    "SELECT is_active FROM expense_categories WHERE category_id = ?1",
                    params![expense.category_id.get()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_error)?;
            if user_active != Some(true) || category_active != Some(true) {
                return Ok(None);
            }
            tx.execute(
                "INSERT INTO expenses (user_id, category_id, status_id, amount_minor, \
                 expense_date, description, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    expense.user_id.get(),
                    expense.category_id.get(),
                    ExpenseStatusKind::Draft.id().get(),
                    expense.amount.minor(),
                    expense.expense_date.to_iso(),
                    expense.description,
                    format_timestamp(now)?,
                ],
            )
            .map_err(db_error)?;
            let id = tx.last_insert_rowid();
            tx.commit().map_err(db_error)?;
            Ok(Some(ExpenseId::new(id)))
        })
    }

    fn update_expense(&self, id: ExpenseId, update: &ExpenseUpdate) -> Result<bool, StoreError> {
        self.with_connection(|conn| {
            let changed = conn
                .execute(
                    "UPDATE expenses
                     SET category_id = ?2, amount_minor = ?3, expense_date = ?4, description = ?5
                     WHERE expense_id = ?1 AND status_id = ?6
                       AND EXISTS (SELECT 1 FROM expense_categories
                                   WHERE category_id = ?2 AND is_active = 1)",
                    params![
                        id.get(),
                        update.category_id.get(),
                        update.amount.minor(),
                        update.expense_date.to_iso(),
                        update.description,
                        ExpenseStatusKind::Draft.id().get(),
                    ],
                )
                .map_err(db_error)?;
            Ok(changed > 0)
        })
    }

    fn delete_expense(&self, id: ExpenseId) -> Result<bool, StoreError> {
        self.with_connection(|conn| {
            let changed = conn
                .execute(
                    "DELETE FROM expenses WHERE expense_id = ?1 AND status_id = ?2",
                    params![id.get(), ExpenseStatusKind::Draft.id().get()],
                )
                .map_err(db_error)?;
            Ok(changed > 0)
        })
    }

    fn submit_expense(&self, id: ExpenseId, now: OffsetDateTime) -> Result<bool, StoreError> {
        self.with_connection(|conn| {
            let changed = conn
                .execute(
                    "UPDATE expenses SET status_id = ?3, submitted_at = ?4
                     WHERE expense_id = ?1 AND status_id = ?2",
                    params![
                        id.get(),
                        ExpenseStatusKind::Draft.id().get(),
                        ExpenseStatusKind::Submitted.id().get(),
                        format_timestamp(now)?,
                    ],
                )
                .map_err(db_error)?;
            Ok(changed > 0)
        })
    }

    fn approve_expense(
        &self,
        id: ExpenseId,
        reviewer: UserId,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        self.with_connection(|conn| review(conn, id, reviewer, ExpenseStatusKind::Approved, now))
    }

    fn reject_expense(
        &self,
        id: ExpenseId,
        reviewer: UserId,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        self.with_connection(|conn| review(conn, id, reviewer, ExpenseStatusKind::Rejected, now))
    }

    fn pending_expenses(&self, search_term: Option<&str>) -> Result<Vec<Expense>, StoreError> {
        let search = normalize_search(search_term);
        let sql = format!(
            "{EXPENSE_SELECT}
             WHERE {SEARCH_PREDICATE} AND e.status_id = ?2
             ORDER BY e.submitted_at ASC, e.expense_id ASC"
        );
        self.with_connection(|conn| {
            query_expenses(conn, &sql, params![search, ExpenseStatusKind::Submitted.id().get()])
        })
    }

    fn categories(&self) -> Result<Vec<ExpenseCategory>, StoreError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT category_id, category_name, is_active FROM expense_categories
                     WHERE is_active = 1 ORDER BY category_id",
                )
                .map_err(db_error)?;
            let rows = stmt
                .query_map(params![], |row| {
                    Ok(ExpenseCategory {
                        category_id: CategoryId::new(row.get(0)?),
                        category_name: row.get(1)?,
                        is_active: row.get(2)?,
                    })
                })
                .map_err(db_error)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(db_error)
        })
    }

    fn statuses(&self) -> Result<Vec<ExpenseStatus>, StoreError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT status_id, status_name FROM expense_statuses ORDER BY status_id")
                .map_err(db_error)?;
            let rows = stmt
                .query_map(params![], |row| {
                    Ok(ExpenseStatus {
                        status_id: StatusId::new(row.get(0)?),
                        status_name: row.get(1)?,
                    })
                })
                .map_err(db_error)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(db_error)
        })
    }

    fn users(&self) -> Result<Vec<User>, StoreError> {
        let sql = format!("{USER_SELECT} ORDER BY u.user_name, u.user_id");
        self.with_connection(|conn| query_users(conn, &sql, params![]))
    }

    fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let sql = format!("{USER_SELECT} WHERE u.user_id = ?1");
        self.with_connection(|conn| {
            Ok(query_users(conn, &sql, params![id.get()])?.into_iter().next())
        })
    }

    fn managers(&self) -> Result<Vec<User>, StoreError> {
        let sql = format!(
            "{USER_SELECT} WHERE u.role_id = ?1 AND u.is_active = 1 ORDER BY u.user_name, u.user_id"
        );
        self.with_connection(|conn| query_users(conn, &sql, params![RoleKind::Manager.id().get()]))
    }

    fn dashboard_stats(&self) -> Result<DashboardStats, StoreError> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN status_id = ?1 THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN status_id = ?2 THEN amount_minor ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN status_id = ?2 THEN 1 ELSE 0 END), 0)
                 FROM expenses",
                params![
                    ExpenseStatusKind::Submitted.id().get(),
                    ExpenseStatusKind::Approved.id().get(),
                ],
                |row| {
                    Ok(DashboardStats {
                        total_expenses: row.get(0)?,
                        pending_approvals: row.get(1)?,
                        approved_amount: Money::from_minor(row.get(2)?),
                        approved_count: row.get(3)?,
                    })
                },
            )
            .map_err(db_error)
        })
    }

    fn recent_expenses(&self, top: usize) -> Result<Vec<Expense>, StoreError> {
        let limit = i64::try_from(top).unwrap_or(i64::MAX);
        let sql =
            format!("{EXPENSE_SELECT} ORDER BY e.created_at DESC, e.expense_id DESC LIMIT ?1");
        self.with_connection(|conn| query_expenses(conn, &sql, params![limit]))
    }

    fn readiness(&self) -> Result<(), StoreError> {
        self.with_connection(|conn| {
            conn.query_row("SELECT 1", params![], |row| row.get::<_, i64>(0)).map_err(db_error)?;
            Ok(())
        })
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Raw expense row prior to type conversion.
struct ExpenseRecord {
    /// Claim identifier.
    expense_id: i64,
    /// Claimant identifier.
    user_id: i64,
    /// Claimant name.
    user_name: String,
    /// Claimant email.
    user_email: String,
    /// Category identifier.
    category_id: i64,
    /// Category name.
    category_name: String,
    /// Status identifier.
    status_id: i64,
    /// Status name.
    status_name: String,
    /// Amount in pence.
    amount_minor: i64,
    /// ISO expense date.
    expense_date: String,
    /// Description.
    description: Option<String>,
    /// Receipt file name.
    receipt_file: Option<String>,
    /// Submission timestamp text.
    submitted_at: Option<String>,
    /// Reviewer identifier.
    reviewed_by: Option<i64>,
    /// Reviewer name.
    reviewer_name: Option<String>,
    /// Review timestamp text.
    reviewed_at: Option<String>,
    /// Creation timestamp text.
    created_at: String,
}

impl ExpenseRecord {
    /// Reads the projection produced by [`EXPENSE_SELECT`].
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            expense_id: row.get(0)?,
            user_id: row.get(1)?,
            user_name: row.get(2)?,
            user_email: row.get(3)?,
            category_id: row.get(4)?,
            category_name: row.get(5)?,
            status_id: row.get(6)?,
            status_name: row.get(7)?,
            amount_minor: row.get(8)?,
            expense_date: row.get(9)?,
            description: row.get(10)?,
            receipt_file: row.get(11)?,
            submitted_at: row.get(12)?,
            reviewed_by: row.get(13)?,
            reviewer_name: row.get(14)?,
            reviewed_at: row.get(15)?,
            created_at: row.get(16)?,
        })
    }

    /// Converts the raw row into a typed expense.
    fn into_expense(self) -> Result<Expense, SqliteStoreError> {
        let expense_date = ExpenseDate::parse(&self.expense_date)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        Ok(Expense {
            expense_id: ExpenseId::new(self.expense_id),
            user_id: UserId::new(self.user_id),
            user_name: self.user_name,
            user_email: self.user_email,
            category_id: CategoryId::new(self.category_id),
            category_name: self.category_name,
            status_id: StatusId::new(self.status_id),
            status_name: self.status_name,
            amount: Money::from_minor(self.amount_minor),
            expense_date,
            description: self.description,
            receipt_file: self.receipt_file,
            submitted_at: self.submitted_at.as_deref().map(parse_timestamp).transpose()?,
            reviewed_by: self.reviewed_by.map(UserId::new),
            reviewer_name: self.reviewer_name,
            reviewed_at: self.reviewed_at.as_deref().map(parse_timestamp).transpose()?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

/// Raw user row prior to type conversion.
struct UserRecord {
    /// User identifier.
    user_id: i64,
    /// Display name.
    user_name: String,
    /// Email.
    email: String,
    /// Role identifier.
    role_id: i64,
    /// Role name.
    role_name: String,
    /// Line manager identifier.
    manager_id: Option<i64>,
    /// Line manager name.
    manager_name: Option<String>,
    /// Active flag.
    is_active: bool,
    /// Creation timestamp text.
    created_at: String,
}

impl UserRecord {
    /// Reads the projection produced by [`USER_SELECT`].
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            user_id: row.get(0)?,
            user_name: row.get(1)?,
            email: row.get(2)?,
            role_id: row.get(3)?,
            role_name: row.get(4)?,
            manager_id: row.get(5)?,
            manager_name: row.get(6)?,
            is_active: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    /// Converts the raw row into a typed user.
    fn into_user(self) -> Result<User, SqliteStoreError> {
        Ok(User {
            user_id: UserId::new(self.user_id),
            user_name: self.user_name,
            email: self.email,
            role_id: RoleId::new(self.role_id),
            role_name: self.role_name,
            manager_id: self.manager_id.map(UserId::new),
            manager_name: self.manager_name,
            is_active: self.is_active,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

/// Runs an expense query and converts every row.
fn query_expenses(
    conn: &Connection,
    sql: &str,
    params: impl Params,
) -> Result<Vec<Expense>, SqliteStoreError> {
    let mut stmt = conn.prepare(sql).map_err(db_error)?;
    let rows = stmt.query_map(params, ExpenseRecord::from_row).map_err(db_error)?;
    let mut expenses = Vec::new();
    for row in rows {
        expenses.push(row.map_err(db_error)?.into_expense()?);
    }
    Ok(expenses)
}

/// Runs a user query and converts every row.
fn query_users(
    conn: &Connection,
    sql: &str,
    params: impl Params,
) -> Result<Vec<User>, SqliteStoreError> {
    let mut stmt = conn.prepare(sql).map_err(db_error)?;
    let rows = stmt.query_map(params, UserRecord::from_row).map_err(db_error)?;
    let mut users = Vec::new();
    for row in rows {
        users.push(row.map_err(db_error)?.into_user()?);
    }
    Ok(users)
}

/// Records a manager decision on a submitted claim.
fn review(
    conn: &Connection,
    id: ExpenseId,
    reviewer: UserId,
    outcome: ExpenseStatusKind,
    now: OffsetDateTime,
) -> Result<bool, SqliteStoreError> {
    let changed = conn
        .execute(
            "UPDATE expenses SET status_id = ?3, reviewed_by = ?2, reviewed_at = ?4
             WHERE expense_id = ?1 AND status_id = ?5
               AND EXISTS (SELECT 1 FROM users
                           WHERE user_id = ?2 AND role_id = ?6 AND is_active = 1)",
            params![
                id.get(),
                reviewer.get(),
                outcome.id().get(),
                format_timestamp(now)?,
                ExpenseStatusKind::Submitted.id().get(),
                RoleKind::Manager.id().get(),
            ],
        )
        .map_err(db_error)?;
    Ok(changed > 0)
}

/// Trims and lowercases a search term, dropping empty terms.
fn normalize_search(term: Option<&str>) -> Option<String> {
    term.map(str::trim).filter(|term| !term.is_empty()).map(str::to_lowercase)
}

/// Formats a timestamp for storage.
fn format_timestamp(value: OffsetDateTime) -> Result<String, SqliteStoreError> {
    value
        .to_offset(UtcOffset::UTC)
        .format(TIMESTAMP_FORMAT)
        .map_err(|err| SqliteStoreError::Invalid(format!("timestamp format: {err}")))
}

/// Parses a stored timestamp.
fn parse_timestamp(value: &str) -> Result<OffsetDateTime, SqliteStoreError> {
    PrimitiveDateTime::parse(value, TIMESTAMP_FORMAT)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|err| SqliteStoreError::Invalid(format!("stored timestamp {value}: {err}")))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_error)?;
    apply_pragmas(&connection, config)?;
    register_functions(&connection)?;
    Ok(connection)
}

/// Registers `unicode_lower`; the built-in `lower()` only folds ASCII.
fn register_functions(connection: &Connection) -> Result<(), SqliteStoreError> {
    connection
        .create_scalar_function(
            "unicode_lower",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let value: Option<String> = ctx.get(0)?;
                Ok(value.map(|text| text.to_lowercase()))
            },
        )
        .map_err(db_error)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(db_error)?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates existing version.
fn initialize_schema(
    connection: &mut Connection,
    now: OffsetDateTime,
) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(db_error)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(db_error)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_error)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(db_error)?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS roles (
                    role_id INTEGER PRIMARY KEY,
                    role_name TEXT NOT NULL UNIQUE
                );
                CREATE TABLE IF NOT EXISTS users (
                    user_id INTEGER PRIMARY KEY,
                    user_name TEXT NOT NULL,
                    email TEXT NOT NULL UNIQUE,
                    role_id INTEGER NOT NULL REFERENCES roles(role_id),
                    manager_id INTEGER REFERENCES users(user_id),
                    is_active INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS expense_categories (
                    category_id INTEGER PRIMARY KEY,
                    category_name TEXT NOT NULL UNIQUE,
                    is_active INTEGER NOT NULL DEFAULT 1
                );
                CREATE TABLE IF NOT EXISTS expense_statuses (
                    status_id INTEGER PRIMARY KEY,
                    status_name TEXT NOT NULL UNIQUE
                );
                CREATE TABLE IF NOT EXISTS expenses (
                    expense_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(user_id),
                    category_id INTEGER NOT NULL REFERENCES expense_categories(category_id),
                    status_id INTEGER NOT NULL REFERENCES expense_statuses(status_id),
                    amount_minor INTEGER NOT NULL CHECK (amount_minor > 0),
                    currency TEXT NOT NULL DEFAULT 'GBP',
                    expense_date TEXT NOT NULL,
                    description TEXT,
                    receipt_file TEXT,
                    submitted_at TEXT,
                    reviewed_by INTEGER REFERENCES users(user_id),
                    reviewed_at TEXT,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_expenses_status
                    ON expenses (status_id, submitted_at);
                CREATE INDEX IF NOT EXISTS idx_expenses_user ON expenses (user_id);
                CREATE INDEX IF NOT EXISTS idx_expenses_created ON expenses (created_at);",
            )
            .map_err(db_error)?;
            seed_reference_data(&tx, now)?;
        }
        Some(SCHEMA_VERSION) => {}
        Some(other) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version {other} (expected {SCHEMA_VERSION})"
            )));
        }
    }
    tx.commit().map_err(db_error)?;
    Ok(())
}

/// Seeds roles, statuses, categories, and the demo users.
fn seed_reference_data(tx: &Connection, now: OffsetDateTime) -> Result<(), SqliteStoreError> {
    for role in RoleKind::ALL {
        tx.execute(
            "INSERT OR IGNORE INTO roles (role_id, role_name) VALUES (?1, ?2)",
            params![role.id().get(), role.name()],
        )
        .map_err(db_error)?;
    }
    for status in ExpenseStatusKind::ALL {
        tx.execute(
            "INSERT OR IGNORE INTO expense_statuses (status_id, status_name) VALUES (?1, ?2)",
            params![status.id().get(), status.name()],
        )
        .map_err(db_error)?;
    }
    for category in CATEGORY_SEEDS {
        tx.execute(
            "INSERT OR IGNORE INTO expense_categories (category_id, category_name, is_active)
             VALUES (?1, ?2, 1)",
            params![category.id, category.name],
        )
        .map_err(db_error)?;
    }
    // Managers first so manager_id references resolve.
    let mut users = USER_SEEDS;
    users.sort_by_key(|seed| seed.manager_id.is_some());
    for user in users {
        tx.execute(
            "INSERT OR IGNORE INTO users (user_id, user_name, email, role_id, manager_id, \
             is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
            params![
                user.id,
                user.name,
                user.email,
                user.role.id().get(),
                user.manager_id,
                format_timestamp(now - Duration::days(user.age_days))?,
            ],
        )
        .map_err(db_error)?;
    }
    Ok(())
}
