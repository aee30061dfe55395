use std::sync::Arc;

use axum::{
    extract::{Path, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use fleettrack_shared::Frame;
use hyper::StatusCode;
use serde::Serialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::{errors::StoreError, store::LocationStore, ws::accept_and_log, Pipeline};

pub fn router(pipeline: Pipeline) -> Router {
    let live = pipeline.clone();
    let all = pipeline.store.clone();
    let one = pipeline.store.clone();
    let health = pipeline;

    let api = Router::new()
        .route(
            "/api/vehicle-locations",
            get(move || list_locations(all.clone())),
        )
        .route(
            "/api/vehicle-locations/:vehicle_id",
            get(move |Path(vehicle_id): Path<i64>| get_location(one.clone(), vehicle_id)),
        )
        .layer(CorsLayer::very_permissive());

    Router::new()
        .route(
            "/ws",
            get(move |req: WebSocketUpgrade| {
                let pipeline = live.clone();
                async move { req.on_upgrade(move |ws| accept_and_log(ws, pipeline)) }
            }),
        )
        .route(
            "/healthz",
            get(move || async move {
                Json(json!({
                    "connections": health.registry.len(),
                    "pending": health.buffer.len(),
                    "flush_state": format!("{:?}", health.scheduler.state()),
                }))
            }),
        )
        .merge(api)
}

async fn list_locations(store: Arc<dyn LocationStore>) -> (StatusCode, Json<Frame>) {
    match store.list().await {
        Ok(records) => respond(StatusCode::OK, "Vehicle locations retrieved.", &records),
        Err(e) => store_failure(e),
    }
}

async fn get_location(store: Arc<dyn LocationStore>, vehicle_id: i64) -> impl IntoResponse {
    match store.find_by_vehicle(vehicle_id).await {
        Ok(Some(record)) => respond(StatusCode::OK, "Vehicle location retrieved.", &record),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(Frame::failure("vehicle location not found", None)),
        ),
        Err(e) => store_failure(e),
    }
}

fn respond<T: Serialize>(status: StatusCode, message: &str, data: &T) -> (StatusCode, Json<Frame>) {
    match serde_json::to_value(data) {
        Ok(data) => (status, Json(Frame::ok_with(message, data))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(Frame::failure("cannot encode response", Some(e.to_string()))),
        ),
    }
}

fn store_failure(e: StoreError) -> (StatusCode, Json<Frame>) {
    error!(error = %e, "location store request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(Frame::failure("Error reading vehicle locations.", Some(e.to_string()))),
    )
}
