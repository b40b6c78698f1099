use std::sync::Arc;

use axum::{Extension, Json, http::StatusCode, response::IntoResponse};
use chrono::Utc;

use pvz_auth::{JwtIssuer, Role};
use pvz_core::UserId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Issue a token for the requested role without any credential check.
pub async fn dummy_login(
    Extension(issuer): Extension<Arc<dyn JwtIssuer>>,
    Json(body): Json<dto::DummyLoginRequest>,
) -> axum::response::Response {
    let role = match dto::parse_role(&body.role) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    issue_token(issuer.as_ref(), UserId::new(), role)
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterRequest>,
) -> axum::response::Response {
    let role = match dto::parse_role(&body.role) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match services.register(&body.email, &body.password, role).await {
        Ok(user) => (StatusCode::CREATED, Json(dto::UserResponse::from(user))).into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}

/// Exchange email and password for a token carrying the account's id and role.
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(issuer): Extension<Arc<dyn JwtIssuer>>,
    Json(body): Json<dto::LoginRequest>,
) -> axum::response::Response {
    match services.login(&body.email, &body.password).await {
        Ok(user) => issue_token(issuer.as_ref(), user.id, user.role),
        Err(e) => errors::account_error_to_response(e),
    }
}

fn issue_token(issuer: &dyn JwtIssuer, sub: UserId, role: Role) -> axum::response::Response {
    match issuer.issue(sub, role, Utc::now()) {
        Ok(token) => (StatusCode::OK, Json(dto::TokenResponse { token })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to issue token");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "token_error", "failed to issue token")
        }
    }
}
