use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
};
use axum_extra::extract::CookieJar;

use crate::{
    adapters::http::{app_state::AppState, middleware::caller_credentials},
    app_error::{AppError, AppResult},
};

use super::require_admin;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_usage))
        .route("/overshoot", get(get_overshoot))
}

/// Usage, limits and headroom for the caller's organization.
async fn get_usage(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let ctx = app_state
        .enforcement
        .resolve_organization(caller_credentials(&headers, &jar))
        .await?;
    let organization_id = ctx
        .organization_id
        .ok_or_else(|| AppError::Internal("organization missing after resolution".into()))?;

    let summary = app_state.enforcement.usage_summary(organization_id).await?;
    Ok(Json(summary))
}

async fn get_overshoot(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    require_admin(&app_state, &headers, &jar).await?;
    let found = app_state.reconciliation_use_cases.scan_overshoot().await?;
    Ok(Json(found))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;

    use crate::{
        application::use_cases::usage::CountedEntity,
        domain::entities::plan::PlanId,
        test_utils::{
            TestAppStateBuilder, create_test_caller, create_test_organization,
            create_test_subscription,
        },
    };

    #[tokio::test]
    async fn returns_summary_for_caller_organization() {
        let org = create_test_organization(|o| o.external_id = "org_acme".into());
        let sub = create_test_subscription(org.id, |s| s.plan_id = PlanId::Professional);
        let builder = TestAppStateBuilder::new()
            .with_organization(org.clone())
            .with_subscription(sub)
            .with_caller(
                "token",
                create_test_caller(|c| c.organization_external_id = Some("org_acme".into())),
            );
        builder
            .usage()
            .set_entities(org.id, CountedEntity::Curriculums, 2);
        let server = TestServer::new(router().with_state(builder.build())).unwrap();

        let response = server.get("/").authorization_bearer("token").await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["planId"], "professional");

        let curriculums = body["resources"]
            .as_array()
            .unwrap()
            .iter()
            .find(|l| l["resource"] == "curriculums")
            .unwrap();
        assert_eq!(curriculums["current"], 2);
        assert_eq!(curriculums["limit"], -1);
        assert_eq!(curriculums["available"], -1);
    }

    #[tokio::test]
    async fn caller_without_organization_is_403() {
        let server = TestServer::new(
            router().with_state(
                TestAppStateBuilder::new()
                    .with_caller("token", create_test_caller(|c| c.organization_external_id = None))
                    .build(),
            ),
        )
        .unwrap();

        let response = server.get("/").authorization_bearer("token").await;
        response.assert_status(StatusCode::FORBIDDEN);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "No organization");
    }

    #[tokio::test]
    async fn unknown_organization_is_404() {
        let server = TestServer::new(
            router().with_state(
                TestAppStateBuilder::new()
                    .with_caller(
                        "token",
                        create_test_caller(|c| c.organization_external_id = Some("org_gone".into())),
                    )
                    .build(),
            ),
        )
        .unwrap();

        let response = server.get("/").authorization_bearer("token").await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Organization not found");
    }

    #[tokio::test]
    async fn overshoot_scan_is_admin_only() {
        let org = create_test_organization(|o| o.external_id = "org_acme".into());
        let sub = create_test_subscription(org.id, |_| {});
        let builder = TestAppStateBuilder::new()
            .with_organization(org.clone())
            .with_subscription(sub)
            .with_caller("member", create_test_caller(|_| {}))
            .with_caller("admin", create_test_caller(|c| c.roles = vec!["admin".into()]));
        builder.usage().set_entities(org.id, CountedEntity::Projects, 9);
        let server = TestServer::new(router().with_state(builder.build())).unwrap();

        server
            .get("/overshoot")
            .authorization_bearer("member")
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let response = server.get("/overshoot").authorization_bearer("admin").await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body[0]["resource"], "projects");
        assert_eq!(body[0]["current"], 9);
        assert_eq!(body[0]["limit"], 5);
    }
}
