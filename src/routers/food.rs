//! Food analysis endpoints. Each POST starts a flow and streams its events.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::debug;

use super::{error, sse};
use crate::{
    agents::{Flow, FlowInput},
    server::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/where-to-eat", post(where_to_eat))
        .route("/api/check-premade", post(check_premade))
        .route("/api/calories", post(calories))
}

async fn root() -> Response {
    Json(json!({
        "message": "Foodie food analysis gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "flows": Flow::ALL.iter().map(Flow::as_str).collect::<Vec<_>>(),
    }))
    .into_response()
}

async fn health() -> Response {
    Json(json!({"status": "ok"})).into_response()
}

async fn where_to_eat(State(state): State<AppState>, Json(input): Json<FlowInput>) -> Response {
    start(
        &state,
        Flow::WhereToEat,
        FlowInput {
            meal_time: None,
            ..input
        },
    )
}

async fn check_premade(State(state): State<AppState>, Json(input): Json<FlowInput>) -> Response {
    start(
        &state,
        Flow::CheckPremade,
        FlowInput {
            query: None,
            meal_time: None,
            ..input
        },
    )
}

async fn calories(State(state): State<AppState>, Json(input): Json<FlowInput>) -> Response {
    start(
        &state,
        Flow::Calories,
        FlowInput {
            query: None,
            ..input
        },
    )
}

fn start(state: &AppState, flow: Flow, input: FlowInput) -> Response {
    if input.file_path.trim().is_empty() {
        debug!(flow = %flow, "rejecting request without file_path");
        return error::bad_request("missing_file_path", "file_path is required");
    }
    sse::sse_response(state.orchestrator.run(flow, input))
}
