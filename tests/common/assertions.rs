//! Assertion helpers for HTTP responses and fields.

use axum::body::Body;
use axum::http::{Response, StatusCode};
use serde_json::Value;

/// Default epsilon for floating-point comparisons
pub const DEFAULT_EPSILON: f32 = 1e-4;

/// Assert that two floating-point values are approximately equal.
pub fn assert_approx_eq(actual: f32, expected: f32, epsilon: Option<f32>) {
    let epsilon = epsilon.unwrap_or(DEFAULT_EPSILON);
    let diff = (actual - expected).abs();

    assert!(
        diff <= epsilon,
        "Values not approximately equal: actual = {}, expected = {}, diff = {}, epsilon = {}",
        actual,
        expected,
        diff,
        epsilon
    );
}

/// Assert that a value lies within `[min, max]`.
pub fn assert_in_range(actual: f32, min: f32, max: f32) {
    assert!(
        actual >= min && actual <= max,
        "Value not in range: actual = {}, min = {}, max = {}",
        actual,
        min,
        max
    );
}

/// Read a whole response body
pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body did not read")
        .to_vec()
}

/// Read a JSON response body
pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("body is not JSON")
}

/// Check an error response: status, a message mentioning `needle`, and a request id
pub async fn assert_api_error(response: Response<Body>, status: StatusCode, needle: &str) {
    assert_eq!(response.status(), status);
    let body = body_json(response).await;
    let error = body["error"].as_str().expect("error is not a string");
    assert!(error.contains(needle), "error '{}' does not mention '{}'", error, needle);
    assert_eq!(body["request_id"].as_str().map(str::len), Some(36));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_approx_eq() {
        assert_approx_eq(1.0, 1.0, None);
        assert_approx_eq(1.0, 1.00001, None);
        assert_approx_eq(1.0, 1.001, Some(0.01));
    }

    #[test]
    fn test_assert_in_range() {
        assert_in_range(5.0, 0.0, 10.0);
        assert_in_range(0.0, 0.0, 10.0);
        assert_in_range(10.0, 0.0, 10.0);
    }
}
