// crates/expense-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic example for docs and the CLI.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example for `expense-tracker.toml`. The output is deterministic
//! and must always pass validation.

/// Returns a canonical example `expense-tracker.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[server]
bind = "127.0.0.1:8080"
max_body_bytes = 1048576
allow_non_loopback = false

[store]
type = "sqlite"
path = "expense-tracker.db"
journal_mode = "wal"
sync_mode = "full"
busy_timeout_ms = 5000

[chat]
enabled = false
provider = "azure_openai"
# endpoint = "https://example-resource.openai.azure.com"
deployment = "gpt-4o"
api_version = "2024-10-21"
api_key_env = "EXPENSE_TRACKER_CHAT_API_KEY"
timeout_ms = 30000
max_response_bytes = 1048576
max_tool_rounds = 8
allow_http = false

[audit]
enabled = true
# path = "expense-tracker-audit.jsonl"

[identity]
employee_user_id = 1
manager_user_id = 2

[dashboard]
recent_count = 10
"#,
    )
}

// ============================================================================
// SECTION: Tests
// ============================================================================
