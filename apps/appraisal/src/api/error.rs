//! HTTP error mapping.

use appraisal_core::AppraisalError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors returned by handlers. Rendered as `{"error": message}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] AppraisalError),

    #[error("{0}")]
    Unauthorized(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Core(err) => match err {
                AppraisalError::NotFound { .. } => StatusCode::NOT_FOUND,
                AppraisalError::Validation(_) | AppraisalError::InvalidTransition { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                AppraisalError::Forbidden(_) => StatusCode::FORBIDDEN,
                AppraisalError::Conflict(_) => StatusCode::CONFLICT,
                AppraisalError::Storage(_) | AppraisalError::Encoding(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appraisal_core::ScoreCardStatus;

    #[test]
    fn core_errors_map_to_statuses() {
        let cases = [
            (AppraisalError::not_found("score card", 4), StatusCode::NOT_FOUND),
            (AppraisalError::validation("bad"), StatusCode::UNPROCESSABLE_ENTITY),
            (
                AppraisalError::InvalidTransition {
                    action: "accept the plan",
                    from: ScoreCardStatus::PlanStarted,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (AppraisalError::forbidden("no"), StatusCode::FORBIDDEN),
            (AppraisalError::conflict("stale"), StatusCode::CONFLICT),
            (AppraisalError::Encoding("x".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
        assert_eq!(ApiError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            ApiError::Unauthorized("x".to_string()).status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
