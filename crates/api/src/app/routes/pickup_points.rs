use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub async fn create_pickup_point(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreatePickupPointRequest>,
) -> axum::response::Response {
    let city = match dto::parse_city(&body.city) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match services.create_pickup_point(principal.role(), city).await {
        Ok(point) => (StatusCode::CREATED, Json(dto::PickupPointResponse::from(point))).into_response(),
        Err(e) => errors::reception_error_to_response(e),
    }
}

pub async fn list_pickup_points(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::ListPickupPointsQuery>,
) -> axum::response::Response {
    let page = match query.into_page() {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    match services.list_pickup_points(principal.role(), page).await {
        Ok(points) => Json(
            points
                .into_iter()
                .map(dto::PickupPointResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::reception_error_to_response(e),
    }
}

pub async fn list_receptions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(pvz_id): Path<String>,
) -> axum::response::Response {
    let pvz_id = match dto::parse_pickup_point_id(&pvz_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.list_receptions(principal.role(), pvz_id).await {
        Ok(receptions) => Json(
            receptions
                .into_iter()
                .map(dto::ReceptionResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::reception_error_to_response(e),
    }
}
