use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, put},
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    use_cases::plans::UpdatePlanLimitsInput,
};

use super::require_admin;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_plans))
        .route("/resources", get(list_resources))
        .route("/{plan_id}/limits", put(update_limits))
}

async fn list_plans(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let plans = app_state.plan_use_cases.list_plans().await?;
    Ok(Json(plans))
}

async fn list_resources(State(app_state): State<AppState>) -> impl IntoResponse {
    Json(app_state.plan_use_cases.resources())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateLimitsPayload {
    resource_limits: HashMap<String, serde_json::Value>,
}

/// Accepts any JSON value per key so a non-integer limit is reported as
/// invalid input instead of a body rejection.
fn integer_limits(raw: HashMap<String, serde_json::Value>) -> AppResult<HashMap<String, i64>> {
    raw.into_iter()
        .map(|(key, value)| match value.as_i64() {
            Some(limit) => Ok((key, limit)),
            None => Err(AppError::InvalidInput(format!(
                "Limit for {key} must be an integer"
            ))),
        })
        .collect()
}

async fn update_limits(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(plan_id): Path<String>,
    Json(payload): Json<UpdateLimitsPayload>,
) -> AppResult<impl IntoResponse> {
    let actor = require_admin(&app_state, &headers, &jar).await?;

    let record = app_state
        .plan_use_cases
        .update_plan_limits(
            UpdatePlanLimitsInput {
                plan_id,
                resource_limits: integer_limits(payload.resource_limits)?,
            },
            &actor,
        )
        .await?;

    Ok(Json(record))
}
