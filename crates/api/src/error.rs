use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use domain::errors::DomainError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Domain(DomainError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "INVALID_PAYLOAD", msg),
            ApiError::Domain(err) => {
                let status = match &err {
                    DomainError::RoomNotFound(_) | DomainError::LobbyNotFound(_) => {
                        StatusCode::NOT_FOUND
                    }
                    DomainError::DuplicateSession(_) => StatusCode::CONFLICT,
                    DomainError::Unauthorized => StatusCode::FORBIDDEN,
                    DomainError::InvalidPayload(_) | DomainError::InvalidSlot(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    DomainError::Internal(msg) => {
                        tracing::error!("internal error: {msg}");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                    _ => StatusCode::CONFLICT,
                };
                let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
                    "internal server error".to_string()
                } else {
                    err.to_string()
                };
                (status, err.code(), message)
            }
        };

        let body = Json(json!({
            "error": message,
            "code": code,
            "status": status.as_u16(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_mapping() {
        let response =
            ApiError::from(DomainError::RoomNotFound("abc".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_duplicate_mapping() {
        let response =
            ApiError::from(DomainError::DuplicateSession("abc".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_internal_hides_detail() {
        let response = ApiError::from(DomainError::Internal("db down".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_bad_request() {
        let response = ApiError::BadRequest("nope".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
