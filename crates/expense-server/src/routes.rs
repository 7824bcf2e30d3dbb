// crates/expense-server/src/routes.rs
// ============================================================================
// Module: Expense API Routes
// Description: Axum handlers for expenses, reference data, and chat.
// Purpose: Map JSON requests onto expense service and chat calls.
// Dependencies: axum, expense-chat, expense-core, serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! Handlers decode the request, run the service call on the blocking pool,
//! and encode the result as camelCase JSON. Errors are `{"error": "..."}`
//! bodies, including rejected path and query parameters. Missing records are
//! 404, failed lifecycle transitions are 404, and request bodies over
//! `server.max_body_bytes` are rejected with 413 before any service call.
//!
//! A middleware layer times every request and records an `http_request`
//! audit event plus request and latency metrics keyed by route template.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::FromRequestParts;
use axum::extract::MatchedPath;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::Request;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::http::header::LOCATION;
use axum::middleware;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use expense_chat::ChatRequest;
use expense_core::AuditEvent;
use expense_core::CreateExpenseRequest;
use expense_core::ExpenseFilter;
use expense_core::ExpenseId;
use expense_core::ExpenseServiceError;
use expense_core::UpdateExpenseRequest;
use expense_core::UserId;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::server::ServerState;
use crate::telemetry::HttpMetricEvent;
use crate::telemetry::HttpOutcome;
use crate::telemetry::latency_bucket_bound;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Upper bound on `count` for the recent expenses endpoint.
const MAX_RECENT_COUNT: usize = 100;
/// Route label for requests that matched no route.
const UNMATCHED_ROUTE: &str = "unmatched";

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the API router over `state`.
#[must_use]
pub fn router(state: Arc<ServerState>) -> Router {
    let max_body_bytes = state.max_body_bytes;
    Router::new()
        .route("/api/expenses", get(list_expenses).post(create_expense))
        .route("/api/expenses/pending", get(pending_expenses))
        .route("/api/expenses/recent", get(recent_expenses))
        .route("/api/expenses/{id}", get(get_expense).put(update_expense).delete(delete_expense))
        .route("/api/expenses/{id}/submit", post(submit_expense))
        .route("/api/expenses/{id}/approve", post(approve_expense))
        .route("/api/expenses/{id}/reject", post(reject_expense))
        .route("/api/categories", get(list_categories))
        .route("/api/statuses", get(list_statuses))
        .route("/api/users", get(list_users))
        .route("/api/users/managers", get(list_managers))
        .route("/api/users/{id}", get(get_user))
        .route("/api/dashboard/stats", get(dashboard_stats))
        .route("/api/chat", post(send_chat))
        .route("/api/chat/status", get(chat_status))
        .route("/api/status", get(data_source_status))
        .fallback(unknown_route)
        .layer(middleware::from_fn_with_state(Arc::clone(&state), record_request))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// JSON error response.
#[derive(Debug)]
pub struct ApiError {
    /// Response status.
    status: StatusCode,
    /// Error message.
    message: String,
}

impl ApiError {
    /// Builds an error with `status` and `message`.
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// 404 with a fixed message.
    fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("{what} not found"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<ExpenseServiceError> for ApiError {
    fn from(err: ExpenseServiceError) -> Self {
        let status = match err {
            ExpenseServiceError::Invalid(_) | ExpenseServiceError::Rejected(_) => {
                StatusCode::BAD_REQUEST
            }
            ExpenseServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self::new(status, err.to_string())
    }
}

/// Handler result type.
type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// SECTION: Extractors
// ============================================================================

/// [`Path`] extractor whose rejection renders as an [`ApiError`].
struct ApiPath<T>(T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<T>::from_request_parts(parts, state)
            .await
            .map(|Path(value)| Self(value))
            .map_err(|rejection| ApiError::new(rejection.status(), rejection.body_text()))
    }
}

/// [`Query`] extractor whose rejection renders as an [`ApiError`].
struct ApiQuery<T>(T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| Self(value))
            .map_err(|rejection| ApiError::new(rejection.status(), rejection.body_text()))
    }
}

// ============================================================================
// SECTION: Query Types
// ============================================================================

/// Search query for pending expenses.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SearchQuery {
    /// Optional search text.
    search_term: Option<String>,
}

/// Count query for recent expenses.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RecentQuery {
    /// Number of expenses to return.
    count: Option<usize>,
}

/// Reviewer query for approve and reject.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ReviewQuery {
    /// Reviewing manager; defaults to the configured manager.
    reviewer_id: Option<UserId>,
}

/// Chat availability payload.
#[derive(Debug, Serialize)]
struct ChatStatus {
    /// True when a model endpoint is configured.
    enabled: bool,
}

// ============================================================================
// SECTION: Expense Handlers
// ============================================================================

/// `GET /api/expenses`
async fn list_expenses(
    State(state): State<Arc<ServerState>>,
    ApiQuery(filter): ApiQuery<ExpenseFilter>,
) -> ApiResult<Response> {
    let expenses = Arc::clone(&state.expenses);
    let list = run_blocking(move || expenses.list_expenses(&filter)).await?;
    Ok(Json(list).into_response())
}

/// `GET /api/expenses/{id}`
async fn get_expense(
    State(state): State<Arc<ServerState>>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Response> {
    let expenses = Arc::clone(&state.expenses);
    let expense = run_blocking(move || expenses.expense_by_id(ExpenseId::new(id))).await?;
    expense
        .map(|expense| Json(expense).into_response())
        .ok_or_else(|| ApiError::not_found("expense"))
}

/// `POST /api/expenses`
async fn create_expense(
    State(state): State<Arc<ServerState>>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Response> {
    let request: CreateExpenseRequest = parse_body(&state, body)?;
    let expenses = Arc::clone(&state.expenses);
    let id = run_blocking(move || expenses.create_expense(&request)).await??;
    let mut response = (StatusCode::CREATED, Json(id)).into_response();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/expenses/{id}")) {
        response.headers_mut().insert(LOCATION, location);
    }
    Ok(response)
}

/// `PUT /api/expenses/{id}`
async fn update_expense(
    State(state): State<Arc<ServerState>>,
    ApiPath(id): ApiPath<i64>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<StatusCode> {
    let request: UpdateExpenseRequest = parse_body(&state, body)?;
    let expenses = Arc::clone(&state.expenses);
    let updated =
        run_blocking(move || expenses.update_expense(ExpenseId::new(id), &request)).await??;
    transition_status(updated)
}

/// `DELETE /api/expenses/{id}`
async fn delete_expense(
    State(state): State<Arc<ServerState>>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    let expenses = Arc::clone(&state.expenses);
    transition_status(run_blocking(move || expenses.delete_expense(ExpenseId::new(id))).await?)
}

/// `POST /api/expenses/{id}/submit`
async fn submit_expense(
    State(state): State<Arc<ServerState>>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    let expenses = Arc::clone(&state.expenses);
    transition_status(run_blocking(move || expenses.submit_expense(ExpenseId::new(id))).await?)
}

/// `POST /api/expenses/{id}/approve`
async fn approve_expense(
    State(state): State<Arc<ServerState>>,
    ApiPath(id): ApiPath<i64>,
    ApiQuery(review): ApiQuery<ReviewQuery>,
) -> ApiResult<StatusCode> {
    let reviewer = review.reviewer_id.unwrap_or(state.identity.manager_user_id);
    let expenses = Arc::clone(&state.expenses);
    transition_status(
        run_blocking(move || expenses.approve_expense(ExpenseId::new(id), reviewer)).await?,
    )
}

/// `POST /api/expenses/{id}/reject`
async fn reject_expense(
    State(state): State<Arc<ServerState>>,
    ApiPath(id): ApiPath<i64>,
    ApiQuery(review): ApiQuery<ReviewQuery>,
) -> ApiResult<StatusCode> {
    let reviewer = review.reviewer_id.unwrap_or(state.identity.manager_user_id);
    let expenses = Arc::clone(&state.expenses);
    transition_status(
        run_blocking(move || expenses.reject_expense(ExpenseId::new(id), reviewer)).await?,
    )
}

/// `GET /api/expenses/pending`
async fn pending_expenses(
    State(state): State<Arc<ServerState>>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> ApiResult<Response> {
    let expenses = Arc::clone(&state.expenses);
    let list =
        run_blocking(move || expenses.pending_expenses(query.search_term.as_deref())).await?;
    Ok(Json(list).into_response())
}

/// `GET /api/expenses/recent`
async fn recent_expenses(
    State(state): State<Arc<ServerState>>,
    ApiQuery(query): ApiQuery<RecentQuery>,
) -> ApiResult<Response> {
    let count = query.count.unwrap_or(state.recent_count).min(MAX_RECENT_COUNT);
    let expenses = Arc::clone(&state.expenses);
    let list = run_blocking(move || expenses.recent_expenses(count)).await?;
    Ok(Json(list).into_response())
}

// ============================================================================
// SECTION: Reference Data Handlers
// ============================================================================

/// `GET /api/categories`
async fn list_categories(State(state): State<Arc<ServerState>>) -> ApiResult<Response> {
    let expenses = Arc::clone(&state.expenses);
    Ok(Json(run_blocking(move || expenses.categories()).await?).into_response())
}

/// `GET /api/statuses`
async fn list_statuses(State(state): State<Arc<ServerState>>) -> ApiResult<Response> {
    let expenses = Arc::clone(&state.expenses);
    Ok(Json(run_blocking(move || expenses.statuses()).await?).into_response())
}

/// `GET /api/users`
async fn list_users(State(state): State<Arc<ServerState>>) -> ApiResult<Response> {
    let expenses = Arc::clone(&state.expenses);
    Ok(Json(run_blocking(move || expenses.users()).await?).into_response())
}

/// `GET /api/users/managers`
async fn list_managers(State(state): State<Arc<ServerState>>) -> ApiResult<Response> {
    let expenses = Arc::clone(&state.expenses);
    Ok(Json(run_blocking(move || expenses.managers()).await?).into_response())
}

/// `GET /api/users/{id}`
async fn get_user(
    State(state): State<Arc<ServerState>>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Response> {
    let expenses = Arc::clone(&state.expenses);
    let user = run_blocking(move || expenses.user_by_id(UserId::new(id))).await?;
    user.map(|user| Json(user).into_response()).ok_or_else(|| ApiError::not_found("user"))
}

/// `GET /api/dashboard/stats`
async fn dashboard_stats(State(state): State<Arc<ServerState>>) -> ApiResult<Response> {
    let expenses = Arc::clone(&state.expenses);
    Ok(Json(run_blocking(move || expenses.dashboard_stats()).await?).into_response())
}

/// `GET /api/status`
async fn data_source_status(State(state): State<Arc<ServerState>>) -> Response {
    Json(state.expenses.status()).into_response()
}

/// Fallback for paths outside the API.
async fn unknown_route() -> ApiError {
    ApiError::not_found("route")
}

// ============================================================================
// SECTION: Chat Handlers
// ============================================================================

/// `POST /api/chat`
async fn send_chat(
    State(state): State<Arc<ServerState>>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Response> {
    let request: ChatRequest = parse_body(&state, body)?;
    if request.message.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "message is required"));
    }
    let chat = Arc::clone(&state.chat);
    let reply = run_blocking(move || chat.send_message(&request)).await?;
    Ok(Json(reply).into_response())
}

/// `GET /api/chat/status`
async fn chat_status(State(state): State<Arc<ServerState>>) -> Response {
    Json(ChatStatus {
        enabled: state.chat.is_enabled(),
    })
    .into_response()
}

// ============================================================================
// SECTION: Middleware
// ============================================================================

/// Records audit and metrics data for each request.
async fn record_request(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| UNMATCHED_ROUTE.to_string(), |path| path.as_str().to_string());
    let response = next.run(request).await;
    let latency = started.elapsed();
    let status = response.status().as_u16();
    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
    let outcome = HttpOutcome::from_status(status);
    state.audit.record(&AuditEvent::http_request(
        &method,
        &route,
        status,
        outcome.as_str(),
        latency_ms,
        latency_bucket_bound(latency),
    ));
    let event = HttpMetricEvent {
        method,
        route,
        status,
        outcome,
    };
    state.metrics.record_request(event.clone());
    state.metrics.record_latency(event, latency);
    response
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Runs blocking service work on the blocking pool.
async fn run_blocking<T, F>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|_| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "request handler failed"))
}

/// Decodes a JSON body, enforcing the configured size limit.
fn parse_body<T: DeserializeOwned>(
    state: &ServerState,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<T> {
    let bytes = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            payload_too_large(state.max_body_bytes)
        } else {
            ApiError::new(rejection.status(), rejection.body_text())
        }
    })?;
    if bytes.len() > state.max_body_bytes {
        return Err(payload_too_large(state.max_body_bytes));
    }
    serde_json::from_slice(&bytes)
        .map_err(|err| ApiError::new(StatusCode::BAD_REQUEST, format!("invalid json body: {err}")))
}

/// 413 error for oversized bodies.
fn payload_too_large(limit: usize) -> ApiError {
    ApiError::new(
        StatusCode::PAYLOAD_TOO_LARGE,
        format!("request body exceeds {limit} bytes"),
    )
}

/// Maps a lifecycle result to 204 or 404.
fn transition_status(changed: bool) -> ApiResult<StatusCode> {
    if changed { Ok(StatusCode::NO_CONTENT) } else { Err(ApiError::not_found("expense")) }
}
