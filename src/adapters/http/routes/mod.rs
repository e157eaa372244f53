pub mod plans;
pub mod subscriptions;
pub mod usage;

use axum::{Router, http::HeaderMap};
use axum_extra::extract::CookieJar;

use crate::{
    adapters::http::{app_state::AppState, middleware::caller_credentials},
    app_error::{AppError, AppResult},
    use_cases::subscription::Actor,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/plans", plans::router())
        .nest("/subscriptions", subscriptions::router())
        .nest("/usage", usage::router())
}

/// Authenticates the caller and requires the configured admin role.
async fn require_admin(
    app_state: &AppState,
    headers: &HeaderMap,
    jar: &CookieJar,
) -> AppResult<Actor> {
    let caller = app_state
        .enforcement
        .authenticate(caller_credentials(headers, jar))
        .await?;

    if !caller.has_role(&app_state.config.admin_role) {
        return Err(AppError::Forbidden);
    }

    Ok(Actor::new(
        caller.user_id,
        Some(app_state.config.admin_role.clone()),
    ))
}
