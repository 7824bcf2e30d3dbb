// crates/expense-config/src/config.rs
// ============================================================================
// Module: Expense Tracker Configuration
// Description: Configuration loading and validation for the expense tracker.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: expense-core, expense-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section is optional and falls back to loopback-only, in-memory
//! defaults. Invalid values fail closed instead of being clamped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use expense_core::UserId;
use expense_store_sqlite::SqliteStoreConfig;
use expense_store_sqlite::SqliteStoreMode;
use expense_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "expense-tracker.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "EXPENSE_TRACKER_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default HTTP bind address.
const DEFAULT_BIND: &str = "127.0.0.1:8080";
/// Default maximum request body size in bytes.
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Maximum allowed request body size in bytes.
const MAX_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
/// Default `SQLite` busy timeout in milliseconds.
const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum `SQLite` busy timeout in milliseconds.
const MAX_STORE_BUSY_TIMEOUT_MS: u64 = 60_000;
/// Default model deployment name.
const DEFAULT_CHAT_DEPLOYMENT: &str = "gpt-4o";
/// Default Azure `OpenAI` API version.
const DEFAULT_CHAT_API_VERSION: &str = "2024-10-21";
/// Default environment variable holding the model API key.
const DEFAULT_CHAT_API_KEY_ENV: &str = "EXPENSE_TRACKER_CHAT_API_KEY";
/// Default model request timeout in milliseconds.
const DEFAULT_CHAT_TIMEOUT_MS: u64 = 30_000;
/// Minimum model request timeout in milliseconds.
const MIN_CHAT_TIMEOUT_MS: u64 = 100;
/// Maximum model request timeout in milliseconds.
const MAX_CHAT_TIMEOUT_MS: u64 = 120_000;
/// Default maximum model response size in bytes.
const DEFAULT_CHAT_MAX_RESPONSE_BYTES: usize = 1024 * 1024;
/// Maximum allowed model response size in bytes.
const MAX_CHAT_MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;
/// Default bound on function-calling rounds per chat message.
const DEFAULT_CHAT_MAX_TOOL_ROUNDS: u32 = 8;
/// Maximum bound on function-calling rounds per chat message.
const MAX_CHAT_MAX_TOOL_ROUNDS: u32 = 32;
/// Maximum length of a chat endpoint URL.
const MAX_CHAT_ENDPOINT_LENGTH: usize = 2048;
/// Maximum length of short chat identifiers (deployment, version, env name).
const MAX_CHAT_IDENTIFIER_LENGTH: usize = 128;
/// Default number of recent expenses on the dashboard.
const DEFAULT_RECENT_COUNT: usize = 10;
/// Maximum number of recent expenses on the dashboard.
const MAX_RECENT_COUNT: usize = 100;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Expense tracker configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpenseTrackerConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Expense store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Chat assistant configuration.
    #[serde(default)]
    pub chat: ChatConfig,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Fixed demo identities.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Dashboard configuration.
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

impl ExpenseTrackerConfig {
    /// Loads configuration using the CLI path or `EXPENSE_TRACKER_CONFIG`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, parsed, or
    /// validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        if content.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every configuration section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.store.validate()?;
        self.chat.validate()?;
        self.audit.validate()?;
        self.identity.validate()?;
        self.dashboard.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Explicit opt-in for binding beyond loopback.
    #[serde(default)]
    pub allow_non_loopback: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            allow_non_loopback: false,
        }
    }
}

impl ServerConfig {
    /// Parses the bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind.trim().parse().map_err(|_| {
            ConfigError::Invalid(format!("server.bind is not a socket address: {}", self.bind))
        })
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let addr = self.bind_addr()?;
        if !addr.ip().is_loopback() && !self.allow_non_loopback {
            return Err(ConfigError::Invalid(
                "non-loopback server.bind requires server.allow_non_loopback = true".to_string(),
            ));
        }
        if self.max_body_bytes == 0 || self.max_body_bytes > MAX_MAX_BODY_BYTES {
            return Err(ConfigError::Invalid(format!(
                "server.max_body_bytes must be between 1 and {MAX_MAX_BODY_BYTES}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Expense store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// In-memory store seeded with the demo claims.
    #[default]
    Memory,
    /// Durable `SQLite` store.
    Sqlite,
}

/// Expense store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Returns the `SQLite` settings when the sqlite backend is selected.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        match (self.store_type, &self.path) {
            (StoreType::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
            }),
            _ => None,
        }
    }

    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("memory store must not set path".to_string()));
                }
            }
            StoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires path".to_string())
                })?;
                validate_path_string("store.path", &path.to_string_lossy())?;
            }
        }
        if self.busy_timeout_ms > MAX_STORE_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "store.busy_timeout_ms must be at most {MAX_STORE_BUSY_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Chat
// ============================================================================

/// Hosted model API flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatProvider {
    /// `{endpoint}/chat/completions` with a bearer key.
    #[default]
    OpenaiCompatible,
    /// Azure deployment route with an `api-key` header.
    AzureOpenai,
}

impl ChatProvider {
    /// Returns the configuration label for the provider.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenaiCompatible => "openai_compatible",
            Self::AzureOpenai => "azure_openai",
        }
    }
}

/// Chat assistant configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    /// Enables the model-backed assistant.
    #[serde(default)]
    pub enabled: bool,
    /// Model API flavour.
    #[serde(default)]
    pub provider: ChatProvider,
    /// Base endpoint URL.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Deployment or model name.
    #[serde(default = "default_chat_deployment")]
    pub deployment: String,
    /// Azure API version query parameter.
    #[serde(default = "default_chat_api_version")]
    pub api_version: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_chat_api_key_env")]
    pub api_key_env: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_chat_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum response size in bytes.
    #[serde(default = "default_chat_max_response_bytes")]
    pub max_response_bytes: usize,
    /// Maximum function-calling rounds per message.
    #[serde(default = "default_chat_max_tool_rounds")]
    pub max_tool_rounds: u32,
    /// Allows cleartext `http://` endpoints.
    #[serde(default)]
    pub allow_http: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: ChatProvider::default(),
            endpoint: None,
            deployment: default_chat_deployment(),
            api_version: default_chat_api_version(),
            api_key_env: default_chat_api_key_env(),
            timeout_ms: default_chat_timeout_ms(),
            max_response_bytes: default_chat_max_response_bytes(),
            max_tool_rounds: default_chat_max_tool_rounds(),
            allow_http: false,
        }
    }
}

impl ChatConfig {
    /// Returns true when the assistant is enabled and has an endpoint.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.enabled
            && self.endpoint.as_deref().is_some_and(|endpoint| !endpoint.trim().is_empty())
    }

    /// Validates chat configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(endpoint) = self.endpoint.as_deref() {
            validate_endpoint(endpoint, self.allow_http)?;
        }
        validate_identifier("chat.deployment", &self.deployment)?;
        validate_identifier("chat.api_version", &self.api_version)?;
        validate_identifier("chat.api_key_env", &self.api_key_env)?;
        if !(MIN_CHAT_TIMEOUT_MS..=MAX_CHAT_TIMEOUT_MS).contains(&self.timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "chat.timeout_ms must be between {MIN_CHAT_TIMEOUT_MS} and {MAX_CHAT_TIMEOUT_MS}"
            )));
        }
        if self.max_response_bytes == 0 || self.max_response_bytes > MAX_CHAT_MAX_RESPONSE_BYTES {
            return Err(ConfigError::Invalid(format!(
                "chat.max_response_bytes must be between 1 and {MAX_CHAT_MAX_RESPONSE_BYTES}"
            )));
        }
        if self.max_tool_rounds == 0 || self.max_tool_rounds > MAX_CHAT_MAX_TOOL_ROUNDS {
            return Err(ConfigError::Invalid(format!(
                "chat.max_tool_rounds must be between 1 and {MAX_CHAT_MAX_TOOL_ROUNDS}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Enables audit events.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Optional JSON-lines file; stderr when absent.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", &path.to_string_lossy())?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Identity
// ============================================================================

/// Fixed identities used in place of caller sign-in.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Claimant for expenses created through the chat assistant.
    #[serde(default = "default_employee_user_id")]
    pub employee_user_id: UserId,
    /// Reviewer for approvals without an explicit reviewer.
    #[serde(default = "default_manager_user_id")]
    pub manager_user_id: UserId,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            employee_user_id: default_employee_user_id(),
            manager_user_id: default_manager_user_id(),
        }
    }
}

impl IdentityConfig {
    /// Validates identity configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.employee_user_id.get() <= 0 {
            return Err(ConfigError::Invalid(
                "identity.employee_user_id must be positive".to_string(),
            ));
        }
        if self.manager_user_id.get() <= 0 {
            return Err(ConfigError::Invalid(
                "identity.manager_user_id must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Dashboard
// ============================================================================

/// Dashboard configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DashboardConfig {
    /// Default number of recent expenses.
    #[serde(default = "default_recent_count")]
    pub recent_count: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            recent_count: default_recent_count(),
        }
    }
}

impl DashboardConfig {
    /// Validates dashboard configuration.
    fn validate(self) -> Result<(), ConfigError> {
        if self.recent_count == 0 || self.recent_count > MAX_RECENT_COUNT {
            return Err(ConfigError::Invalid(format!(
                "dashboard.recent_count must be between 1 and {MAX_RECENT_COUNT}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let path = Path::new(trimmed);
    for component in path.components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates the chat endpoint scheme and shape.
fn validate_endpoint(endpoint: &str, allow_http: bool) -> Result<(), ConfigError> {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    if trimmed.len() > MAX_CHAT_ENDPOINT_LENGTH {
        return Err(ConfigError::Invalid("chat.endpoint exceeds max length".to_string()));
    }
    let rest = if let Some(rest) = trimmed.strip_prefix("https://") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        if !allow_http {
            return Err(ConfigError::Invalid(
                "chat.endpoint uses http:// without chat.allow_http = true".to_string(),
            ));
        }
        rest
    } else {
        return Err(ConfigError::Invalid(
            "chat.endpoint must start with https:// or http://".to_string(),
        ));
    };
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || host.contains('@') || host.chars().any(char::is_whitespace) {
        return Err(ConfigError::Invalid("chat.endpoint must name a host".to_string()));
    }
    if trimmed.contains(['?', '#']) {
        return Err(ConfigError::Invalid(
            "chat.endpoint must not carry a query or fragment".to_string(),
        ));
    }
    Ok(())
}

/// Validates a short identifier such as a deployment name.
fn validate_identifier(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_CHAT_IDENTIFIER_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    if !trimmed.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.')) {
        return Err(ConfigError::Invalid(format!("{field} contains unsupported characters")));
    }
    Ok(())
}

/// Default HTTP bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default maximum request body size.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Default `SQLite` busy timeout.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

/// Default model deployment name.
fn default_chat_deployment() -> String {
    DEFAULT_CHAT_DEPLOYMENT.to_string()
}

/// Default Azure API version.
fn default_chat_api_version() -> String {
    DEFAULT_CHAT_API_VERSION.to_string()
}

/// Default API key environment variable.
fn default_chat_api_key_env() -> String {
    DEFAULT_CHAT_API_KEY_ENV.to_string()
}

/// Default model request timeout.
const fn default_chat_timeout_ms() -> u64 {
    DEFAULT_CHAT_TIMEOUT_MS
}

/// Default maximum model response size.
const fn default_chat_max_response_bytes() -> usize {
    DEFAULT_CHAT_MAX_RESPONSE_BYTES
}

/// Default function-calling round bound.
const fn default_chat_max_tool_rounds() -> u32 {
    DEFAULT_CHAT_MAX_TOOL_ROUNDS
}

/// Audit is on unless disabled.
const fn default_audit_enabled() -> bool {
    true
}

/// Default chat claimant.
const fn default_employee_user_id() -> UserId {
    UserId::new(1)
}

/// Default reviewer.
const fn default_manager_user_id() -> UserId {
    UserId::new(2)
}

/// Default recent expense count.
const fn default_recent_count() -> usize {
    DEFAULT_RECENT_COUNT
}

// ============================================================================
// SECTION: Tests
// ============================================================================
