use axum::{
    Extension, Json,
    http::{StatusCode, header},
    response::IntoResponse,
};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::app::errors;

/// Render handle of the process-wide Prometheus recorder, if one is installed.
#[derive(Clone, Default)]
pub struct MetricsHandle(pub Option<PrometheusHandle>);

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn metrics(Extension(handle): Extension<MetricsHandle>) -> axum::response::Response {
    match handle.0 {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => errors::json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics_disabled",
            "no metrics recorder installed",
        ),
    }
}
