use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub async fn create_reception(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::PickupPointRef>,
) -> axum::response::Response {
    let pvz_id = match dto::parse_pickup_point_id(&body.pvz_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.create_reception(principal.role(), pvz_id).await {
        Ok(reception) => {
            (StatusCode::CREATED, Json(dto::ReceptionResponse::from(reception))).into_response()
        }
        Err(e) => errors::reception_error_to_response(e),
    }
}

pub async fn close_reception(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::PickupPointRef>,
) -> axum::response::Response {
    let pvz_id = match dto::parse_pickup_point_id(&body.pvz_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.close_reception(principal.role(), pvz_id).await {
        Ok(reception) => Json(dto::ReceptionResponse::from(reception)).into_response(),
        Err(e) => errors::reception_error_to_response(e),
    }
}

pub async fn remove_last_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::PickupPointRef>,
) -> axum::response::Response {
    let pvz_id = match dto::parse_pickup_point_id(&body.pvz_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.remove_last_product(principal.role(), pvz_id).await {
        Ok(reception) => Json(dto::ReceptionResponse::from(reception)).into_response(),
        Err(e) => errors::reception_error_to_response(e),
    }
}
