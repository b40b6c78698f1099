use axum::{
    Router,
    routing::{delete, get, post, put},
};

pub mod auth;
pub mod pickup_points;
pub mod products;
pub mod receptions;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route(
            "/pvz",
            post(pickup_points::create_pickup_point).get(pickup_points::list_pickup_points),
        )
        .route("/pvz/:pvz_id/receptions", get(pickup_points::list_receptions))
        .route("/receptions", post(receptions::create_reception))
        .route("/receptions/close", put(receptions::close_reception))
        .route("/receptions/last-product", delete(receptions::remove_last_product))
        .route("/products", post(products::add_product))
}
