use thiserror::Error;

use crate::{
    application::entitlements::AccessReason,
    domain::entities::{plan::PlanId, resource::ResourceKey},
};

/// Details carried by a feature denial.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureDenial {
    pub feature: String,
    pub reason: AccessReason,
    pub message: String,
    pub required_plan: Option<PlanId>,
    pub current_plan: Option<PlanId>,
    pub upgrade_url: String,
}

/// Details carried by a resource-capacity denial.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDenial {
    pub resource: ResourceKey,
    pub current: i64,
    pub limit: i64,
    pub available: i64,
    pub upgrade_url: String,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Caller has no organization")]
    NoOrganization,

    #[error("Organization not found")]
    OrganizationNotFound,

    #[error("Subscription not found")]
    SubscriptionNotFound,

    #[error("No active subscription")]
    NoActiveSubscription { upgrade_url: String },

    #[error("Feature not available: {}", .0.feature)]
    FeatureDenied(Box<FeatureDenial>),

    #[error("Resource limit exceeded: {}", .0.resource)]
    ResourceLimitExceeded(Box<ResourceDenial>),

    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store failure: {0}")]
    StoreFailure(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::AuthenticationRequired => ErrorCode::AuthenticationRequired,
            AppError::NoOrganization => ErrorCode::NoOrganization,
            AppError::OrganizationNotFound => ErrorCode::OrganizationNotFound,
            AppError::SubscriptionNotFound => ErrorCode::SubscriptionNotFound,
            AppError::NoActiveSubscription { .. } => ErrorCode::NoSubscription,
            AppError::FeatureDenied(_) => ErrorCode::FeatureNotAvailable,
            AppError::ResourceLimitExceeded(_) => ErrorCode::ResourceLimitExceeded,
            AppError::Forbidden => ErrorCode::Forbidden,
            AppError::InvalidInput(_) => ErrorCode::InvalidInput,
            AppError::StoreFailure(_) => ErrorCode::StoreFailure,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Expected outcomes rendered as 4xx. Everything else is a failure.
    pub fn is_expected(&self) -> bool {
        !matches!(self, AppError::StoreFailure(_) | AppError::Internal(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    AuthenticationRequired,
    NoOrganization,
    OrganizationNotFound,
    SubscriptionNotFound,
    NoSubscription,
    FeatureNotAvailable,
    ResourceLimitExceeded,
    Forbidden,
    InvalidInput,
    StoreFailure,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            ErrorCode::NoOrganization => "NO_ORGANIZATION",
            ErrorCode::OrganizationNotFound => "ORGANIZATION_NOT_FOUND",
            ErrorCode::SubscriptionNotFound => "SUBSCRIPTION_NOT_FOUND",
            ErrorCode::NoSubscription => "NO_SUBSCRIPTION",
            ErrorCode::FeatureNotAvailable => "FEATURE_NOT_AVAILABLE",
            ErrorCode::ResourceLimitExceeded => "RESOURCE_LIMIT_EXCEEDED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::StoreFailure => "STORE_FAILURE",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
