use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// request-level failures surfaced by the bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// POST body was not JSON or did not match the raw telemetry shape
    #[error("invalid telemetry payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl BridgeError {
    pub fn status(&self) -> StatusCode {
        match self {
            BridgeError::Decode(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        // plain text body, the producer only needs something to log
        (self.status(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_is_bad_request() {
        let err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err = BridgeError::from(err);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().starts_with("invalid telemetry payload"));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[axum::http::header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }
}
