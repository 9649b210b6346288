//! Parts search server
//!
//! HTTP surface over the pipeline: `POST /search`, `GET /metrics`,
//! `GET /health`, the engagement feedback endpoint, and the online
//! weight-update admin endpoint.

pub mod http;
pub mod state;

pub use http::create_router;
pub use state::AppState;

use axum::response::IntoResponse;
use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServerError> for axum::http::StatusCode {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::InvalidRequest(_) => axum::http::StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let message = self.to_string();
        let status = axum::http::StatusCode::from(self);
        (status, axum::Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            axum::http::StatusCode::from(ServerError::InvalidRequest("bad".into())),
            axum::http::StatusCode::BAD_REQUEST
        );
        assert_eq!(
            axum::http::StatusCode::from(ServerError::Internal("boom".into())),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
