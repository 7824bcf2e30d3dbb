// crates/expense-server/src/server.rs
// ============================================================================
// Module: Expense Server
// Description: Server assembly, startup checks, and the HTTP listener.
// Purpose: Build the expense service, chat assistant, and sinks from config.
// Dependencies: axum, expense-chat, expense-config, expense-core,
//               expense-store-sqlite, tokio
// ============================================================================

//! ## Overview
//! [`ExpenseServer::from_config`] validates configuration and wires the
//! backend, audit sink, and chat client. A durable store that cannot be
//! opened does not stop startup: the server runs over an unavailable store
//! so reads fall back to demo data, and the reason is logged as a
//! `startup_warning`. Tests and embedders use [`ExpenseServer::from_parts`]
//! to inject their own store, clock, sinks, and model.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use expense_chat::ChatModel;
use expense_chat::ChatService;
use expense_chat::OpenAiChatClient;
use expense_config::AuditConfig;
use expense_config::ChatConfig;
use expense_config::ExpenseTrackerConfig;
use expense_config::IdentityConfig;
use expense_config::StoreConfig;
use expense_config::StoreType;
use expense_core::AuditEvent;
use expense_core::AuditSink;
use expense_core::Clock;
use expense_core::ExpenseService;
use expense_core::FileAuditSink;
use expense_core::InMemoryExpenseStore;
use expense_core::NoopAuditSink;
use expense_core::SharedExpenseStore;
use expense_core::StderrAuditSink;
use expense_core::SystemClock;
use expense_core::UnavailableExpenseStore;
use expense_store_sqlite::SqliteExpenseStore;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::net::TcpListener;

use crate::routes;
use crate::telemetry::HttpMetrics;
use crate::telemetry::NoopMetrics;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Expense server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization failure.
    #[error("init error: {0}")]
    Init(String),
    /// Transport failure.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared state handed to every request handler.
pub struct ServerState {
    /// Fallback-aware expense service.
    pub expenses: Arc<ExpenseService>,
    /// Chat assistant.
    pub chat: Arc<ChatService>,
    /// Audit sink for request events.
    pub audit: Arc<dyn AuditSink>,
    /// Metrics sink for request counters and latencies.
    pub metrics: Arc<dyn HttpMetrics>,
    /// Fixed demo identities.
    pub identity: IdentityConfig,
    /// Default number of recent expenses.
    pub recent_count: usize,
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

/// Injectable server dependencies.
pub struct ServerParts {
    /// Expense backend.
    pub store: SharedExpenseStore,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Audit sink.
    pub audit: Arc<dyn AuditSink>,
    /// Metrics sink.
    pub metrics: Arc<dyn HttpMetrics>,
    /// Hosted chat model, if any.
    pub chat_model: Option<Arc<dyn ChatModel>>,
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Expense tracker HTTP server.
pub struct ExpenseServer {
    /// Validated configuration.
    config: ExpenseTrackerConfig,
    /// Shared handler state.
    state: Arc<ServerState>,
}

impl ExpenseServer {
    /// Builds a server from configuration.
    ///
    /// Construction is blocking: it may open a `SQLite` file and build a
    /// blocking HTTP client, so async callers should run it on the blocking
    /// pool.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when configuration is invalid or the audit log
    /// cannot be opened.
    pub fn from_config(config: ExpenseTrackerConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let audit = build_audit_sink(&config.audit)?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let mut warnings = Vec::new();
        let store = build_store(&config.store, clock.now(), &mut warnings);
        let chat_model = build_chat_model(&config.chat, &mut warnings);
        let bind = config.server.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        if !bind.ip().is_loopback() {
            warnings.push(format!(
                "server bound to non-loopback address {bind}; the API has no authentication"
            ));
        }
        for warning in &warnings {
            audit.record(&AuditEvent::startup_warning(warning));
        }
        Ok(Self::from_parts(
            config,
            ServerParts {
                store,
                clock,
                audit,
                metrics: Arc::new(NoopMetrics),
                chat_model,
            },
        ))
    }

    /// Builds a server from configuration and injected dependencies.
    #[must_use]
    pub fn from_parts(config: ExpenseTrackerConfig, parts: ServerParts) -> Self {
        let expenses =
            Arc::new(ExpenseService::new(parts.store, parts.clock, Arc::clone(&parts.audit)));
        let chat = Arc::new(ChatService::new(
            &config.chat,
            config.identity,
            Arc::clone(&expenses),
            parts.chat_model,
            Arc::clone(&parts.audit),
        ));
        let state = Arc::new(ServerState {
            expenses,
            chat,
            audit: parts.audit,
            metrics: parts.metrics,
            identity: config.identity,
            recent_count: config.dashboard.recent_count,
            max_body_bytes: config.server.max_body_bytes,
        });
        Self {
            config,
            state,
        }
    }

    /// Returns the shared handler state.
    #[must_use]
    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Builds the API router.
    #[must_use]
    pub fn router(&self) -> Router {
        routes::router(self.state())
    }

    /// Binds the configured address and serves until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the address is invalid or binding fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let addr =
            self.config.server.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|_| ServerError::Transport("http bind failed".to_string()))?;
        self.serve_listener(listener).await
    }

    /// Serves requests on an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] when the server stops with an error.
    pub async fn serve_listener(self, listener: TcpListener) -> Result<(), ServerError> {
        let app = self.router();
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|_| ServerError::Transport("http server failed".to_string()))
    }
}

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Builds the audit sink selected by configuration.
fn build_audit_sink(config: &AuditConfig) -> Result<Arc<dyn AuditSink>, ServerError> {
    if !config.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match &config.path {
        Some(path) => {
            let sink = FileAuditSink::new(path)
                .map_err(|err| ServerError::Init(format!("audit log open failed: {err}")))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

/// Builds the expense backend selected by configuration.
fn build_store(
    config: &StoreConfig,
    now: OffsetDateTime,
    warnings: &mut Vec<String>,
) -> SharedExpenseStore {
    match (config.store_type, config.sqlite_config()) {
        (StoreType::Sqlite, Some(sqlite)) => match SqliteExpenseStore::new(&sqlite, now) {
            Ok(store) => SharedExpenseStore::from_store(store),
            Err(err) => {
                warnings.push(format!("expense store unavailable, serving demo data: {err}"));
                SharedExpenseStore::from_store(UnavailableExpenseStore::new(err.to_string()))
            }
        },
        _ => SharedExpenseStore::from_store(InMemoryExpenseStore::seeded(now)),
    }
}

/// Builds the hosted chat model when chat is configured.
fn build_chat_model(
    config: &ChatConfig,
    warnings: &mut Vec<String>,
) -> Option<Arc<dyn ChatModel>> {
    if !config.enabled {
        return None;
    }
    if !config.is_configured() {
        warnings.push("chat.enabled is set without chat.endpoint; using demo replies".to_string());
        return None;
    }
    let api_key = std::env::var(&config.api_key_env).ok();
    if api_key.is_none() {
        warnings.push(format!(
            "chat api key variable {} is not set; requests are sent without a key",
            config.api_key_env
        ));
    }
    match OpenAiChatClient::new(config, api_key) {
        Ok(client) => Some(Arc::new(client)),
        Err(err) => {
            warnings.push(format!("chat client unavailable, using demo replies: {err}"));
            None
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use expense_config::ChatConfig;
    use expense_config::StoreConfig;
    use expense_config::StoreType;
    use time::macros::datetime;

    use super::build_chat_model;
    use super::build_store;

    #[test]
    fn unopenable_sqlite_store_degrades_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            store_type: StoreType::Sqlite,
            path: Some(dir.path().to_path_buf()),
            ..StoreConfig::default()
        };
        let mut warnings = Vec::new();
        let store = build_store(&config, datetime!(2026-03-10 12:00 UTC), &mut warnings);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("expense store unavailable"));
        assert!(expense_core::ExpenseStore::categories(&store).is_err());
    }

    #[test]
    fn chat_enabled_without_endpoint_warns_and_uses_demo() {
        let config = ChatConfig {
            enabled: true,
            ..ChatConfig::default()
        };
        let mut warnings = Vec::new();
        assert!(build_chat_model(&config, &mut warnings).is_none());
        assert!(warnings[0].contains("chat.endpoint"));
    }

    #[test]
    fn disabled_chat_builds_nothing_silently() {
        let mut warnings = Vec::new();
        assert!(build_chat_model(&ChatConfig::default(), &mut warnings).is_none());
        assert!(warnings.is_empty());
    }
}
