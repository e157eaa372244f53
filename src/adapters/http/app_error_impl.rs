use crate::app_error::{AppError, ErrorCode};
use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_expected() {
            tracing::debug!(error = ?self, code = self.code().as_str(), "Request denied");
        } else {
            tracing::error!(error = ?self, "Request failed");
        }

        let code = self.code();
        match self {
            AppError::AuthenticationRequired => error_resp(
                StatusCode::UNAUTHORIZED,
                code,
                "Unauthorized",
                "Authentication required".into(),
                None,
            ),
            AppError::NoOrganization => error_resp(
                StatusCode::FORBIDDEN,
                code,
                "No organization",
                "Caller is not associated with an organization".into(),
                None,
            ),
            AppError::OrganizationNotFound => error_resp(
                StatusCode::NOT_FOUND,
                code,
                "Organization not found",
                "Organization not found".into(),
                None,
            ),
            AppError::SubscriptionNotFound => error_resp(
                StatusCode::NOT_FOUND,
                code,
                "Subscription not found",
                "Subscription not found".into(),
                None,
            ),
            AppError::NoActiveSubscription { upgrade_url } => error_resp(
                StatusCode::FORBIDDEN,
                code,
                "No subscription",
                "An active subscription is required".into(),
                Some(json!({ "upgradeUrl": upgrade_url })),
            ),
            AppError::FeatureDenied(denial) => error_resp(
                StatusCode::FORBIDDEN,
                code,
                "Feature not available",
                denial.message.clone(),
                Some(json!({
                    "feature": denial.feature,
                    "reason": denial.reason.as_str(),
                    "requiredPlan": denial.required_plan,
                    "currentPlan": denial.current_plan,
                    "upgradeUrl": denial.upgrade_url,
                })),
            ),
            AppError::ResourceLimitExceeded(denial) => error_resp(
                StatusCode::FORBIDDEN,
                code,
                "Resource limit exceeded",
                format!(
                    "Limit of {} reached for {}",
                    denial.limit,
                    denial.resource.metadata().label
                ),
                Some(json!({
                    "resource": denial.resource,
                    "current": denial.current,
                    "limit": denial.limit,
                    "available": denial.available,
                    "upgradeUrl": denial.upgrade_url,
                })),
            ),
            AppError::Forbidden => error_resp(
                StatusCode::FORBIDDEN,
                code,
                "Forbidden",
                "Insufficient permissions".into(),
                None,
            ),
            AppError::InvalidInput(msg) => {
                error_resp(StatusCode::BAD_REQUEST, code, "Invalid input", msg, None)
            }
            AppError::StoreFailure(_) | AppError::Internal(_) => error_resp(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::InternalError,
                "Internal server error",
                "Something went wrong".into(),
                None,
            ),
        }
    }
}

fn error_resp(
    status: StatusCode,
    code: ErrorCode,
    error: &str,
    message: String,
    extra: Option<Value>,
) -> Response {
    let mut body = Map::new();
    body.insert("error".into(), Value::String(error.to_string()));
    body.insert("message".into(), Value::String(message));
    body.insert("code".into(), Value::String(code.as_str().to_string()));
    if let Some(Value::Object(extra)) = extra {
        body.extend(extra);
    }
    (status, Json(Value::Object(body))).into_response()
}
