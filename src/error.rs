use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures surfaced to HTTP callers. Language model failures are not here:
/// they are folded into the reply text so the conversation can continue.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("emotion model failed to load: {0}")]
    Load(String),
    #[error("emotion model is still loading, retry shortly")]
    NotReady,
    #[error("{0}")]
    InvalidInput(String),
    #[error("malformed request body: {0}")]
    MalformedBody(String),
    #[error("classification failed: {0}")]
    Classification(String),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Load(_) | ServiceError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::MalformedBody(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Classification(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(ServiceError::NotReady.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ServiceError::Load("missing labels".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ServiceError::InvalidInput("text_required".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::MalformedBody("missing field `text`".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::Classification("nan".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
