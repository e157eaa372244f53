use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::identity::CallerCredentials,
    domain::entities::resource::ResourceKey,
    use_cases::enforcement::{EnforcementUseCases, GuardRequirement},
};

/// Cookie carrying the session access token.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Lifts the bearer token and session cookie off a request.
pub fn caller_credentials(headers: &HeaderMap, jar: &CookieJar) -> CallerCredentials {
    let bearer_token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    let session_cookie = jar
        .get(ACCESS_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty());

    CallerCredentials {
        bearer_token,
        session_cookie,
    }
}

/// State for [`enforce_guards`]: which entitlement a route requires.
#[derive(Clone)]
pub struct GuardState {
    pub enforcement: Arc<EnforcementUseCases>,
    pub requirement: GuardRequirement,
}

impl GuardState {
    pub fn feature(enforcement: Arc<EnforcementUseCases>, feature: &str) -> Self {
        Self {
            enforcement,
            requirement: GuardRequirement::Feature(feature.to_string()),
        }
    }

    /// Fails with `InvalidInput` when `amount` is below one.
    pub fn resource(
        enforcement: Arc<EnforcementUseCases>,
        resource: ResourceKey,
        amount: i64,
    ) -> AppResult<Self> {
        let requirement = GuardRequirement::Resource { resource, amount };
        requirement.validate()?;
        Ok(Self {
            enforcement,
            requirement,
        })
    }
}

/// Runs the configured guard chain and hands the resolved
/// [`GuardContext`](crate::use_cases::enforcement::GuardContext) to the
/// handler as a request extension.
///
/// ```ignore
/// Router::new()
///     .route("/reports/export", post(export))
///     .route_layer(middleware::from_fn_with_state(
///         GuardState::feature(enforcement, features::ADVANCED_REPORTS),
///         enforce_guards,
///     ))
/// ```
pub async fn enforce_guards(
    State(guard): State<GuardState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let credentials = caller_credentials(request.headers(), &jar);
    let ctx = guard
        .enforcement
        .check(credentials, &guard.requirement)
        .await?;

    request.extensions_mut().insert(ctx);

    Ok(next.run(request).await)
}
