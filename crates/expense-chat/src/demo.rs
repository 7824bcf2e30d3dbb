// crates/expense-chat/src/demo.rs
// ============================================================================
// Module: Chat Demo Replies
// Description: Canned assistant replies used when no model is configured.
// Purpose: Keep the chat widget useful without a hosted model.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Replies are selected by keyword, in priority order: an expense listing,
//! pending approvals, dashboard statistics, then a help message. Figures
//! match the demo data set.

/// Footer appended to every demo reply.
const ENABLE_HINT: &str = "*To enable the AI assistant, set `chat.enabled = true` and \
                           `chat.endpoint` in expense-tracker.toml.*";

/// Returns the demo reply for `message`.
#[must_use]
pub fn demo_response(message: &str) -> String {
    let lower = message.to_lowercase();
    let wants_listing = lower.contains("expense")
        && (lower.contains("list") || lower.contains("show") || lower.contains("all"));
    if wants_listing {
        format!(
            "**Sample Expenses** (Demo Mode)\n\n\
             1. **Travel** - £25.40 - Submitted - Taxi from airport to client site\n\
             2. **Meals** - £14.25 - Approved - Client lunch meeting\n\
             3. **Supplies** - £7.99 - Draft - Office stationery\n\
             4. **Accommodation** - £123.00 - Approved - Hotel during client visit\n\n\
             {ENABLE_HINT}"
        )
    } else if lower.contains("pending") || lower.contains("approval") {
        format!(
            "**Pending Approvals** (Demo Mode)\n\n\
             1. **ID #1** - Alice Example - Travel - £25.40 - Taxi from airport\n\n\
             {ENABLE_HINT}"
        )
    } else if lower.contains("dashboard") || lower.contains("stats") || lower.contains("summary") {
        format!(
            "**Dashboard Statistics** (Demo Mode)\n\n\
             - **Total Expenses**: 4\n\
             - **Pending Approvals**: 1\n\
             - **Approved Amount**: £137.25\n\
             - **Approved Count**: 2\n\n\
             {ENABLE_HINT}"
        )
    } else {
        format!(
            "Hello! I'm the Expense Management Assistant (Demo Mode).\n\n\
             I can help you with:\n\
             - View expenses\n\
             - Dashboard statistics\n\
             - Pending approvals\n\
             - Create new expenses\n\
             - Approve or reject expenses\n\n\
             {ENABLE_HINT}\n\n\
             Try asking: \"Show me all expenses\" or \"What's pending approval?\""
        )
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
