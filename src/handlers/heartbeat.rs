//! Heartbeat endpoint handler.
//!
//! Returns server status: uptime, render counters and the configured sources.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::SystemTime;
use uuid::Uuid;

use crate::dashboard::RenderCounts;
use crate::state::AppState;

/// Random per-process identifier
static SERVER_ID: once_cell::sync::Lazy<String> = once_cell::sync::Lazy::new(|| Uuid::new_v4().to_string());

/// Heartbeat response structure
#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    pub server_id: String,
    /// Current timestamp (RFC 3339)
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub version: &'static str,
    /// Whether a render currently holds the lock
    pub rendering: bool,
    pub renders: RenderCounts,
    pub sources: Vec<String>,
    /// Resident set size, where the platform reports it
    pub memory_usage_bytes: Option<u64>,
    pub status: &'static str,
}

/// Handle GET /heartbeat requests
pub async fn heartbeat_handler(State(state): State<Arc<AppState>>) -> Json<HeartbeatResponse> {
    let timestamp = chrono::DateTime::<chrono::Utc>::from(SystemTime::now())
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

    Json(HeartbeatResponse {
        server_id: SERVER_ID.clone(),
        timestamp,
        uptime_seconds: state.started.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION"),
        rendering: state.reanalysis.is_rendering(),
        renders: state.stats.snapshot(),
        sources: state.sources(),
        memory_usage_bytes: memory_usage(),
        status: "healthy",
    })
}

/// Resident set size from /proc on Linux
fn memory_usage() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
        Some(pages * 4096)
    }

    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}
