use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use rfqhub_common::error::WorkflowError;

use crate::files::FileError;

/// Body of every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// A refused operation on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub WorkflowError);

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        ApiError(err)
    }
}

impl From<FileError> for ApiError {
    fn from(err: FileError) -> Self {
        ApiError(err.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            WorkflowError::Unauthenticated => StatusCode::UNAUTHORIZED,
            WorkflowError::Forbidden { .. } => StatusCode::FORBIDDEN,
            WorkflowError::NotFound { .. } => StatusCode::NOT_FOUND,
            WorkflowError::InvalidTransition { .. } | WorkflowError::Conflict { .. } => {
                StatusCode::CONFLICT
            }
            WorkflowError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            WorkflowError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match &self.0 {
            WorkflowError::Store(detail) => {
                tracing::error!(error = %detail, "storage failure while handling request");
                "internal storage error".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            error,
            field: self.0.field().map(str::to_string),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        let cases = [
            (WorkflowError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (WorkflowError::forbidden("admin only"), StatusCode::FORBIDDEN),
            (WorkflowError::not_found("rfq", "x"), StatusCode::NOT_FOUND),
            (
                WorkflowError::invalid_transition("rfq", "closed", "approved"),
                StatusCode::CONFLICT,
            ),
            (
                WorkflowError::validation("quantity", "must be greater than zero"),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                WorkflowError::Store("disk full".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }

    #[test]
    fn storage_details_stay_server_side() {
        let response = ApiError(WorkflowError::Store("/var/lib/rfqhub: EACCES".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
