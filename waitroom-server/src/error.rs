use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;
use waitroom_core::AdmissionError;

use crate::types::ErrorResponse;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServerError {
    /// HTTP status and stable error code for this failure
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::Admission(AdmissionError::AlreadyRegistered { .. }) => {
                (StatusCode::CONFLICT, "AlreadyRegistered")
            }
            ServerError::Admission(AdmissionError::TokenMismatch { .. }) => {
                (StatusCode::UNAUTHORIZED, "TokenMismatch")
            }
            ServerError::Admission(e) if e.is_store_unavailable() => {
                (StatusCode::SERVICE_UNAVAILABLE, "StoreUnavailable")
            }
            ServerError::Admission(AdmissionError::Store(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "StoreError")
            }
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!(code, error = %self, "Request failed");
        }

        let body = ErrorResponse { code: code.to_string(), reason: self.to_string() };
        (status, Json(body)).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use waitroom_core::QueueStoreError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ServerError::from(AdmissionError::AlreadyRegistered { queue: "q".into(), user_id: 1 }),
                StatusCode::CONFLICT,
            ),
            (
                ServerError::from(AdmissionError::TokenMismatch { queue: "q".into(), user_id: 1 }),
                StatusCode::UNAUTHORIZED,
            ),
            (
                ServerError::from(AdmissionError::from(QueueStoreError::Timeout(Duration::from_secs(2)))),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ServerError::from(AdmissionError::from(QueueStoreError::Storage("disk I/O error".into()))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ServerError::from(anyhow::anyhow!("boom")), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status_and_code().0, expected, "{}", err);
        }
    }
}
