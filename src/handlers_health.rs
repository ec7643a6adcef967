use serde_json::json;
use std::convert::Infallible;
use warp::{reject, Filter, Rejection, Reply};

use crate::photo_store::PhotoStore;
use crate::warp_helpers::{with_store, RenderError};

pub async fn health_check() -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

pub async fn ready_check(store: PhotoStore) -> Result<impl Reply, Rejection> {
    // Storage directories must exist before uploads or renders can work
    if store.directories_available() {
        Ok(warp::reply::json(&json!({
            "status": "ready",
            "storage": "available",
            "photos": store.photo_count(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        })))
    } else {
        log::error!("Storage directories are missing");
        Err(reject::custom(RenderError {
            message: "Storage unavailable".to_string(),
        }))
    }
}

pub fn build_health_routes(
    store: PhotoStore,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let health = warp::path("health").and(warp::get()).and_then(health_check);

    let ready = warp::path("ready")
        .and(warp::get())
        .and(with_store(store))
        .and_then(ready_check);

    health.or(ready)
}
