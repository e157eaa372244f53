use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
};
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    domain::entities::plan::PlanId,
    use_cases::subscription::{CreateSubscriptionInput, SubscriptionUpdate},
};

use super::require_admin;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_subscription))
        .route("/cache", delete(invalidate_cache))
        .route(
            "/organization/{organization_id}",
            get(get_organization_subscription),
        )
        .route(
            "/{id}",
            get(get_subscription).patch(update_subscription),
        )
        .route("/{id}/cancel", post(cancel_subscription))
        .route("/{id}/change-plan", post(change_plan))
        .route("/{id}/reactivate", post(reactivate_subscription))
        .route("/{id}/history", get(subscription_history))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePayload {
    #[serde(flatten)]
    updates: SubscriptionUpdate,
    reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelPayload {
    cancel_at: Option<DateTime<Utc>>,
    reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePlanPayload {
    plan_id: String,
    reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct ReasonPayload {
    #[serde(default)]
    reason: Option<String>,
}

async fn create_subscription(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(input): Json<CreateSubscriptionInput>,
) -> AppResult<impl IntoResponse> {
    let actor = require_admin(&app_state, &headers, &jar).await?;
    let subscription = app_state
        .subscription_use_cases
        .create(input, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

async fn get_subscription(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    require_admin(&app_state, &headers, &jar).await?;
    let subscription = app_state.subscription_use_cases.get(id).await?;
    Ok(Json(subscription))
}

async fn get_organization_subscription(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(organization_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    require_admin(&app_state, &headers, &jar).await?;
    let snapshot = app_state
        .subscription_use_cases
        .get_for_organization(organization_id)
        .await?;
    Ok(Json(snapshot))
}

async fn update_subscription(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePayload>,
) -> AppResult<impl IntoResponse> {
    let actor = require_admin(&app_state, &headers, &jar).await?;
    let subscription = app_state
        .subscription_use_cases
        .update(id, payload.updates, &actor, payload.reason)
        .await?;
    Ok(Json(subscription))
}

async fn cancel_subscription(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelPayload>,
) -> AppResult<impl IntoResponse> {
    let actor = require_admin(&app_state, &headers, &jar).await?;
    let subscription = app_state
        .subscription_use_cases
        .cancel(id, payload.cancel_at, payload.reason, &actor)
        .await?;
    Ok(Json(subscription))
}

async fn change_plan(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangePlanPayload>,
) -> AppResult<impl IntoResponse> {
    let actor = require_admin(&app_state, &headers, &jar).await?;
    let plan_id: PlanId = payload
        .plan_id
        .parse()
        .map_err(|_| AppError::InvalidInput(format!("Unknown plan: {}", payload.plan_id)))?;

    let subscription = app_state
        .subscription_use_cases
        .change_plan(id, plan_id, &actor, payload.reason)
        .await?;
    Ok(Json(subscription))
}

async fn reactivate_subscription(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReasonPayload>,
) -> AppResult<impl IntoResponse> {
    let actor = require_admin(&app_state, &headers, &jar).await?;
    let subscription = app_state
        .subscription_use_cases
        .reactivate(id, &actor, payload.reason)
        .await?;
    Ok(Json(subscription))
}

async fn subscription_history(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    require_admin(&app_state, &headers, &jar).await?;
    let history = app_state.subscription_use_cases.history(id).await?;
    Ok(Json(history))
}

async fn invalidate_cache(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<StatusCode> {
    require_admin(&app_state, &headers, &jar).await?;
    app_state.subscription_cache.invalidate_all().await?;
    Ok(StatusCode::NO_CONTENT)
}
