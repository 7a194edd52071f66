//! Non-model routes: metadata listing plus health/version.

use crate::response::Envelope;
use crate::state::AppState;
use axum::extract::Query;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Published metadata for registered models, optionally filtered with
/// `?name=A,B`. Includes which operations are mounted for each model.
async fn meta(state: AppState, Query(params): Query<HashMap<String, String>>) -> Json<Envelope> {
    let names: Option<Vec<&str>> = params
        .get("name")
        .filter(|s| !s.is_empty())
        .map(|s| s.split(',').collect());
    let rest = state.rest.read().ok();
    let list: Vec<Value> = state
        .registry
        .list()
        .iter()
        .filter(|m| match &names {
            Some(names) => names.contains(&m.name.as_str()),
            None => true,
        })
        .map(|m| {
            let mut published = m.published();
            if let (Some(obj), Some(rest)) = (published.as_object_mut(), rest.as_ref()) {
                if let Some(desc) = rest.get(&m.name) {
                    obj.insert(
                        "restDesc".into(),
                        serde_json::to_value(desc).unwrap_or(Value::Null),
                    );
                }
            }
            published
        })
        .collect();
    if list.is_empty() {
        let wanted = params.get("name").cloned().unwrap_or_default();
        return Json(Envelope::fail(format!("metadata does not exist: {}", wanted)));
    }
    Json(Envelope::ok(Value::Array(list)))
}

/// Metadata route at `{prefix}/meta`.
pub fn meta_routes(state: AppState) -> Router {
    let path = format!("{}/meta", state.config.route_prefix);
    Router::new().route(
        &path,
        get(move |query: Query<HashMap<String, String>>| {
            let state = state.clone();
            async move { meta(state, query).await }
        }),
    )
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn version() -> Json<Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Common routes (no state): GET /health, GET /version.
pub fn common_routes() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
}
