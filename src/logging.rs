//! Logging utilities for the synoptic server.
//!
//! Structured `tracing` events with stable field names, so a render can be
//! followed from the HTTP span through loading, drawing and the response.

use std::time::Instant;
use tracing::{debug, error, info, warn, Level};

use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use uuid::Uuid;

use crate::error::SynopticError;

/// Creates the tracing layer for HTTP request/response logging
pub fn create_http_trace_layer() -> TraceLayer<
    tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>,
    DefaultMakeSpan,
    DefaultOnRequest,
    DefaultOnResponse,
> {
    let response_formatter = DefaultOnResponse::new()
        .level(Level::DEBUG)
        .latency_unit(LatencyUnit::Millis);

    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(response_formatter)
}

/// Initialize the tracing subscriber; `RUST_LOG` wins over `log_level`
pub fn init_tracing(log_level: &str) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(val) => val,
        Err(_) => format!("synoptic={level},tower_http={level}", level = log_level),
    };

    // a second call (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .try_init();
}

/// Log a start message for a significant operation
pub fn log_operation_start(operation: &str, details: Option<&str>) {
    if let Some(details) = details {
        info!(operation = operation, details = details, "Starting operation");
    } else {
        info!(operation = operation, "Starting operation");
    }
}

/// Log the completion of a significant operation
pub fn log_operation_end(operation: &str, start_time: Instant, success: bool) {
    let duration_ms = start_time.elapsed().as_secs_f64() * 1000.0;

    if success {
        info!(operation = operation, duration_ms = duration_ms, "Operation completed successfully");
    } else {
        warn!(operation = operation, duration_ms = duration_ms, "Operation failed");
    }
}

/// Run `f`, logging its duration under a fresh operation id
pub fn log_timed_operation<F, R>(operation: &str, f: F) -> R
where
    F: FnOnce() -> R,
{
    let start = Instant::now();
    let operation_id = Uuid::new_v4();

    debug!(operation = operation, operation_id = %operation_id, "Starting operation");

    let result = f();

    debug!(
        operation = operation,
        operation_id = %operation_id,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Operation completed"
    );

    result
}

/// Short, stable name of an error variant for log fields
pub fn error_kind(error: &SynopticError) -> &'static str {
    match error {
        SynopticError::InvalidRegion { .. } => "invalid_region",
        SynopticError::InvalidTime { .. } => "invalid_time",
        SynopticError::InvalidParameter { .. } => "invalid_parameter",
        SynopticError::DataUnavailable { .. } => "data_unavailable",
        SynopticError::Render { .. } => "render",
        SynopticError::NetCdf(_) => "netcdf",
        SynopticError::Io(_) => "io",
        SynopticError::Http(_) => "http",
        SynopticError::Config { .. } => "config",
        SynopticError::Image(_) => "image",
        SynopticError::Json(_) => "json",
        SynopticError::Server { .. } => "server",
    }
}

/// Log an error with context
pub fn log_error(error: &SynopticError, context: &str) {
    error!(
        error = %error,
        context = context,
        error_kind = error_kind(error),
        "Error occurred"
    );
}

/// Log an error that occurred during request processing. Rejected user input
/// is a warning, everything else an error.
pub fn log_request_error(error: &SynopticError, endpoint: &str, request_id: &str, params: Option<&str>) {
    if error.is_validation() {
        warn!(
            error = %error,
            endpoint = endpoint,
            request_id = request_id,
            params = params.unwrap_or("none"),
            error_kind = error_kind(error),
            "Request rejected"
        );
    } else {
        error!(
            error = %error,
            endpoint = endpoint,
            request_id = request_id,
            params = params.unwrap_or("none"),
            error_kind = error_kind(error),
            "Request processing error"
        );
    }
}

/// Generate a unique request ID
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_generate_request_id() {
        let id1 = generate_request_id();
        let id2 = generate_request_id();

        assert_eq!(id1.len(), 36);
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_log_timed_operation_returns_result() {
        let result = log_timed_operation("test_operation", || {
            std::thread::sleep(Duration::from_millis(1));
            42
        });

        assert_eq!(result, 42);
    }

    #[test]
    fn test_error_kind() {
        let err = SynopticError::unavailable("t", "850hPa", "timeout");
        assert_eq!(error_kind(&err), "data_unavailable");
        let err = SynopticError::InvalidTime {
            message: "hour 07".to_string(),
        };
        assert_eq!(error_kind(&err), "invalid_time");
    }

    #[test]
    fn test_init_tracing_twice_does_not_panic() {
        init_tracing("debug");
        init_tracing("info");
    }
}
