use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use pvz_infra::{AccountError, ReceptionError};

pub fn reception_error_to_response(err: ReceptionError) -> axum::response::Response {
    match err {
        ReceptionError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        ReceptionError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        err @ ReceptionError::AlreadyActiveReception => {
            json_error(StatusCode::BAD_REQUEST, "already_active_reception", err.to_string())
        }
        err @ ReceptionError::NoActiveReception => {
            json_error(StatusCode::BAD_REQUEST, "no_active_reception", err.to_string())
        }
        err @ ReceptionError::EmptyReception => {
            json_error(StatusCode::BAD_REQUEST, "empty_reception", err.to_string())
        }
        ReceptionError::StorageConflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        ReceptionError::StorageUnavailable(msg) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable", msg)
        }
        ReceptionError::Storage(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg)
        }
    }
}

pub fn account_error_to_response(err: AccountError) -> axum::response::Response {
    match err {
        AccountError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        err @ AccountError::EmailTaken => json_error(StatusCode::BAD_REQUEST, "email_taken", err.to_string()),
        err @ AccountError::InvalidCredentials => {
            json_error(StatusCode::UNAUTHORIZED, "invalid_credentials", err.to_string())
        }
        AccountError::StorageConflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        AccountError::StorageUnavailable(msg) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable", msg)
        }
        AccountError::Storage(msg) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg),
        AccountError::Hashing(msg) => {
            tracing::error!(error = %msg, "password hashing failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
