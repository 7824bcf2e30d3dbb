// crates/expense-server/src/telemetry.rs
// ============================================================================
// Module: HTTP Telemetry
// Description: Observability hooks for the expense HTTP API.
// Purpose: Provide request counters and latency buckets without hard deps.
// Dependencies: std
// ============================================================================

//! ## Overview
//! A thin metrics interface for request counters and latency histograms.
//! Deployments can plug in an exporter by implementing [`HttpMetrics`]; the
//! default sink discards everything.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default latency buckets in milliseconds for request histograms.
pub const HTTP_LATENCY_BUCKETS_MS: &[u64] =
    &[1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Request outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpOutcome {
    /// 1xx to 3xx responses.
    Ok,
    /// 4xx responses.
    ClientError,
    /// 5xx responses.
    ServerError,
}

impl HttpOutcome {
    /// Classifies a status code.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            500.. => Self::ServerError,
            400..=499 => Self::ClientError,
            _ => Self::Ok,
        }
    }

    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::ClientError => "client_error",
            Self::ServerError => "server_error",
        }
    }
}

/// Request metric event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpMetricEvent {
    /// HTTP method.
    pub method: String,
    /// Route template, or `unmatched`.
    pub route: String,
    /// Response status code.
    pub status: u16,
    /// Outcome classification.
    pub outcome: HttpOutcome,
}

/// Returns the index of the bucket that holds `latency`.
#[must_use]
pub fn latency_bucket(latency: Duration) -> usize {
    let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
    HTTP_LATENCY_BUCKETS_MS
        .iter()
        .position(|bound| millis <= *bound)
        .unwrap_or(HTTP_LATENCY_BUCKETS_MS.len())
}

/// Returns the upper bound of the bucket holding `latency`, or `None` past
/// the last bucket.
#[must_use]
pub fn latency_bucket_bound(latency: Duration) -> Option<u64> {
    HTTP_LATENCY_BUCKETS_MS.get(latency_bucket(latency)).copied()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for HTTP requests and latencies.
pub trait HttpMetrics: Send + Sync {
    /// Records a request counter event.
    fn record_request(&self, event: HttpMetricEvent);
    /// Records a latency observation for the request.
    fn record_latency(&self, event: HttpMetricEvent, latency: Duration);
}

/// No-op metrics sink.
///
/// # Invariants
/// - Metrics are discarded.
pub struct NoopMetrics;

impl HttpMetrics for NoopMetrics {
    fn record_request(&self, _event: HttpMetricEvent) {}

    fn record_latency(&self, _event: HttpMetricEvent, _latency: Duration) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================
