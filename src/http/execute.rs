//! `POST /execute` — the Execute façade (spec §4.5, §6).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::outcome::Outcome;

/// Request body for `POST /execute`.
#[derive(Deserialize)]
pub struct ExecuteRequest {
    pub code: String,
    pub id: Option<String>,
}

/// `POST /execute` — run `code` against a session's persistent namespace.
///
/// Returns 200 for every core-level outcome (success and resource-limit
/// errors alike — they are domain outcomes, not transport errors). Returns
/// 422 only for request-validation failures, before the core is ever
/// called.
pub async fn execute(
    State(state): State<AppState>,
    Json(payload): Json<ExecuteRequest>,
) -> Result<Json<Outcome>, (StatusCode, Json<Value>)> {
    if payload.code.is_empty() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": "code must not be empty"})),
        ));
    }

    let outcome = state
        .session_manager
        .execute(payload.id, payload.code)
        .await;

    Ok(Json(outcome))
}
