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

pub async fn add_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::AddProductRequest>,
) -> axum::response::Response {
    let pvz_id = match dto::parse_pickup_point_id(&body.pvz_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let product_type = match dto::parse_product_type(&body.product_type) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    match services.add_product(principal.role(), pvz_id, product_type).await {
        Ok(product) => (StatusCode::CREATED, Json(dto::ProductResponse::from(product))).into_response(),
        Err(e) => errors::reception_error_to_response(e),
    }
}
