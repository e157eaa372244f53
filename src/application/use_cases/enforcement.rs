//! Request-boundary guards.
//!
//! A guard inspects and enriches a [`GuardContext`]; a [`GuardChain`] runs
//! guards in order and stops at the first denial. Guards are plain values, the
//! collaborators they need live in [`GuardServices`] and are handed in by the
//! runner.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, instrument};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult, FeatureDenial, ResourceDenial},
    application::{
        entitlements::{
            AccessReason, can_access_feature, current_snapshot, effective_limit,
            has_resource_capacity,
        },
        ports::identity::{Caller, CallerCredentials, IdentityProvider},
        use_cases::{
            organization::OrganizationUseCases,
            subscription_cache::SubscriptionCache,
            usage::{ResourceUsage, UsageUseCases},
        },
    },
    domain::entities::{
        organization::OrganizationSummary,
        plan::PlanId,
        resource::{ResourceKey, UNLIMITED},
        subscription::{SubscriptionStatus, SubscriptionWithPlan},
    },
};

// ============================================================================
// Context
// ============================================================================

/// State accumulated while guards run. After a successful chain it is handed
/// to the protected handler so it does not repeat the lookups.
#[derive(Debug, Clone, Default)]
pub struct GuardContext {
    pub credentials: CallerCredentials,
    pub caller: Option<Caller>,
    pub organization_id: Option<Uuid>,
    pub organization: Option<OrganizationSummary>,
    pub subscription: Option<SubscriptionWithPlan>,
    pub usage: Option<ResourceUsage>,
}

impl GuardContext {
    pub fn from_credentials(credentials: CallerCredentials) -> Self {
        Self {
            credentials,
            ..Default::default()
        }
    }

    pub fn for_organization(organization_id: Uuid) -> Self {
        Self {
            organization_id: Some(organization_id),
            ..Default::default()
        }
    }

    /// The resolved subscription, only if it keeps its plan in force.
    pub fn current_subscription(&self) -> Option<&SubscriptionWithPlan> {
        current_snapshot(self.subscription.as_ref())
    }

    pub fn current_plan(&self) -> Option<PlanId> {
        self.current_subscription().map(|s| s.subscription.plan_id)
    }
}

// ============================================================================
// Guards
// ============================================================================

pub struct GuardServices {
    pub identity: Arc<dyn IdentityProvider>,
    pub organizations: OrganizationUseCases,
    pub cache: Arc<SubscriptionCache>,
    pub usage: Arc<UsageUseCases>,
    pub upgrade_url: String,
}

#[async_trait]
pub trait Guard: Send + Sync {
    fn name(&self) -> &'static str;

    async fn evaluate(&self, services: &GuardServices, ctx: &mut GuardContext) -> AppResult<()>;
}

/// Credentials -> caller.
pub struct ResolveCallerGuard;

#[async_trait]
impl Guard for ResolveCallerGuard {
    fn name(&self) -> &'static str {
        "resolve_caller"
    }

    async fn evaluate(&self, services: &GuardServices, ctx: &mut GuardContext) -> AppResult<()> {
        if ctx.credentials.is_empty() {
            return Err(AppError::AuthenticationRequired);
        }
        let caller = services
            .identity
            .resolve_caller(&ctx.credentials)
            .await?
            .ok_or(AppError::AuthenticationRequired)?;
        ctx.caller = Some(caller);
        Ok(())
    }
}

/// Caller -> organization.
pub struct ResolveOrganizationGuard;

#[async_trait]
impl Guard for ResolveOrganizationGuard {
    fn name(&self) -> &'static str {
        "resolve_organization"
    }

    async fn evaluate(&self, services: &GuardServices, ctx: &mut GuardContext) -> AppResult<()> {
        let caller = ctx
            .caller
            .as_ref()
            .ok_or_else(|| AppError::Internal("organization resolved before caller".into()))?;

        let organization = services.organizations.resolve_for_caller(caller).await?;
        ctx.organization_id = Some(organization.id);
        ctx.organization = Some(organization);
        Ok(())
    }
}

/// Organization -> cached subscription snapshot. Never denies by itself.
pub struct ResolveSubscriptionGuard;

#[async_trait]
impl Guard for ResolveSubscriptionGuard {
    fn name(&self) -> &'static str {
        "resolve_subscription"
    }

    async fn evaluate(&self, services: &GuardServices, ctx: &mut GuardContext) -> AppResult<()> {
        let organization_id = ctx
            .organization_id
            .ok_or_else(|| AppError::Internal("subscription resolved before organization".into()))?;

        let snapshot = services.cache.get(organization_id, false).await?;
        if ctx.organization.is_none() {
            ctx.organization = snapshot.as_ref().map(|s| s.organization.clone());
        }
        ctx.subscription = snapshot;
        Ok(())
    }
}

pub struct FeatureGuard {
    pub feature: String,
}

#[async_trait]
impl Guard for FeatureGuard {
    fn name(&self) -> &'static str {
        "feature"
    }

    async fn evaluate(&self, services: &GuardServices, ctx: &mut GuardContext) -> AppResult<()> {
        let access = can_access_feature(ctx.subscription.as_ref(), &self.feature);
        if access.can_access {
            return Ok(());
        }

        if access.reason == AccessReason::NoSubscription {
            return Err(AppError::NoActiveSubscription {
                upgrade_url: services.upgrade_url.clone(),
            });
        }

        Err(AppError::FeatureDenied(Box::new(FeatureDenial {
            feature: self.feature.clone(),
            reason: access.reason,
            message: access.message,
            required_plan: access.required_plan,
            current_plan: ctx.current_plan(),
            upgrade_url: services.upgrade_url.clone(),
        })))
    }
}

pub struct ResourceGuard {
    pub resource: ResourceKey,
    pub amount: i64,
}

#[async_trait]
impl Guard for ResourceGuard {
    fn name(&self) -> &'static str {
        "resource_capacity"
    }

    async fn evaluate(&self, services: &GuardServices, ctx: &mut GuardContext) -> AppResult<()> {
        // Resources are ungated while no subscription is in force.
        let Some(snapshot) = ctx.current_subscription().cloned() else {
            debug!(
                organization_id = ?ctx.organization_id,
                resource = %self.resource,
                "No current subscription, resource not gated"
            );
            return Ok(());
        };

        // Usage is always read after the snapshot and never reused across evaluations.
        let usage = services
            .usage
            .usage(snapshot.subscription.organization_id)
            .await?;
        let current = usage.get(&self.resource).copied().unwrap_or_default();
        ctx.usage = Some(usage);

        let capacity = has_resource_capacity(&snapshot, self.resource, current, self.amount);
        if capacity.has_capacity {
            return Ok(());
        }

        Err(AppError::ResourceLimitExceeded(Box::new(ResourceDenial {
            resource: self.resource,
            current: capacity.current,
            limit: capacity.limit,
            available: capacity.available,
            upgrade_url: services.upgrade_url.clone(),
        })))
    }
}

// ============================================================================
// Chain runner
// ============================================================================

pub struct GuardChain {
    guards: Vec<Box<dyn Guard>>,
}

impl GuardChain {
    pub fn new(guards: Vec<Box<dyn Guard>>) -> Self {
        Self { guards }
    }

    /// Runs guards in order. Expected denials are returned as-is; anything
    /// else is logged and replaced by a bare internal error.
    pub async fn run(&self, services: &GuardServices, ctx: &mut GuardContext) -> AppResult<()> {
        for guard in &self.guards {
            if let Err(err) = guard.evaluate(services, ctx).await {
                if err.is_expected() {
                    debug!(
                        guard = guard.name(),
                        organization_id = ?ctx.organization_id,
                        code = err.code().as_str(),
                        "Guard denied request"
                    );
                    return Err(err);
                }

                error!(
                    guard = guard.name(),
                    organization_id = ?ctx.organization_id,
                    error = ?err,
                    "Guard failed unexpectedly"
                );
                return Err(AppError::Internal(format!("guard {} failed", guard.name())));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Requirements
// ============================================================================

/// What a protected route demands of its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardRequirement {
    Feature(String),
    Resource { resource: ResourceKey, amount: i64 },
    FeatureAndResource {
        feature: String,
        resource: Option<ResourceKey>,
        amount: Option<i64>,
    },
}

/// Rejects requested amounts below one.
fn validate_amount(amount: i64) -> AppResult<()> {
    if amount < 1 {
        return Err(AppError::InvalidInput(format!(
            "Requested amount must be at least 1, got {amount}"
        )));
    }
    Ok(())
}

impl GuardRequirement {
    pub fn validate(&self) -> AppResult<()> {
        match self {
            GuardRequirement::Feature(_) => Ok(()),
            GuardRequirement::Resource { amount, .. } => validate_amount(*amount),
            GuardRequirement::FeatureAndResource { amount, .. } => {
                amount.map_or(Ok(()), validate_amount)
            }
        }
    }

    fn chain(&self) -> GuardChain {
        let mut guards: Vec<Box<dyn Guard>> = vec![
            Box::new(ResolveCallerGuard),
            Box::new(ResolveOrganizationGuard),
            Box::new(ResolveSubscriptionGuard),
        ];
        match self {
            GuardRequirement::Feature(feature) => guards.push(Box::new(FeatureGuard {
                feature: feature.clone(),
            })),
            GuardRequirement::Resource { resource, amount } => {
                guards.push(Box::new(ResourceGuard {
                    resource: *resource,
                    amount: *amount,
                }))
            }
            GuardRequirement::FeatureAndResource {
                feature,
                resource,
                amount,
            } => {
                guards.push(Box::new(FeatureGuard {
                    feature: feature.clone(),
                }));
                if let Some(resource) = resource {
                    guards.push(Box::new(ResourceGuard {
                        resource: *resource,
                        amount: amount.unwrap_or(1),
                    }));
                }
            }
        }
        GuardChain::new(guards)
    }
}

/// Outcome of [`EnforcementUseCases::enforce_resource_limit`].
#[derive(Debug)]
pub enum ResourceEnforcement {
    /// No subscription in force; the resource is not gated.
    Ungated,
    Allowed {
        subscription: Box<SubscriptionWithPlan>,
        usage: ResourceUsage,
    },
    Denied(AppError),
}

impl ResourceEnforcement {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, ResourceEnforcement::Denied(_))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageLine {
    pub resource: ResourceKey,
    pub label: &'static str,
    pub unit: &'static str,
    pub monthly: bool,
    pub current: i64,
    /// `None` when no subscription is in force.
    pub limit: Option<i64>,
    pub available: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub organization_id: Uuid,
    pub plan_id: Option<PlanId>,
    pub status: Option<SubscriptionStatus>,
    pub resources: Vec<UsageLine>,
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct EnforcementUseCases {
    services: Arc<GuardServices>,
}

impl EnforcementUseCases {
    pub fn new(services: GuardServices) -> Self {
        Self {
            services: Arc::new(services),
        }
    }

    pub fn upgrade_url(&self) -> &str {
        &self.services.upgrade_url
    }

    #[instrument(skip(self, credentials))]
    pub async fn check(
        &self,
        credentials: CallerCredentials,
        requirement: &GuardRequirement,
    ) -> AppResult<GuardContext> {
        requirement.validate()?;
        let mut ctx = GuardContext::from_credentials(credentials);
        requirement.chain().run(&self.services, &mut ctx).await?;
        Ok(ctx)
    }

    pub async fn require_feature(
        &self,
        credentials: CallerCredentials,
        feature: &str,
    ) -> AppResult<GuardContext> {
        self.check(credentials, &GuardRequirement::Feature(feature.to_string()))
            .await
    }

    pub async fn require_resource_capacity(
        &self,
        credentials: CallerCredentials,
        resource: ResourceKey,
        amount: i64,
    ) -> AppResult<GuardContext> {
        self.check(credentials, &GuardRequirement::Resource { resource, amount })
            .await
    }

    /// Feature first; the capacity check (and its usage queries) only runs
    /// when the feature is granted.
    pub async fn require_feature_and_resource(
        &self,
        credentials: CallerCredentials,
        feature: &str,
        resource: Option<ResourceKey>,
        amount: Option<i64>,
    ) -> AppResult<GuardContext> {
        self.check(
            credentials,
            &GuardRequirement::FeatureAndResource {
                feature: feature.to_string(),
                resource,
                amount,
            },
        )
        .await
    }

    /// Capacity check for call sites that already know the organization.
    #[instrument(skip(self))]
    pub async fn enforce_resource_limit(
        &self,
        organization_id: Uuid,
        resource: ResourceKey,
        amount: i64,
    ) -> ResourceEnforcement {
        if let Err(e) = validate_amount(amount) {
            return ResourceEnforcement::Denied(e);
        }
        let mut ctx = GuardContext::for_organization(organization_id);

        let resolve = GuardChain::new(vec![Box::new(ResolveSubscriptionGuard)]);
        if let Err(e) = resolve.run(&self.services, &mut ctx).await {
            return ResourceEnforcement::Denied(e);
        }
        if ctx.current_subscription().is_none() {
            return ResourceEnforcement::Ungated;
        }

        let capacity = GuardChain::new(vec![Box::new(ResourceGuard { resource, amount })]);
        if let Err(e) = capacity.run(&self.services, &mut ctx).await {
            return ResourceEnforcement::Denied(e);
        }

        match (ctx.subscription, ctx.usage) {
            (Some(subscription), Some(usage)) => ResourceEnforcement::Allowed {
                subscription: Box::new(subscription),
                usage,
            },
            _ => ResourceEnforcement::Denied(AppError::Internal(
                "capacity check finished without usage".into(),
            )),
        }
    }

    /// Resolves the caller alone; no organization is required. Used by
    /// routes that gate on role.
    pub async fn authenticate(&self, credentials: CallerCredentials) -> AppResult<Caller> {
        let mut ctx = GuardContext::from_credentials(credentials);
        GuardChain::new(vec![Box::new(ResolveCallerGuard)])
            .run(&self.services, &mut ctx)
            .await?;
        ctx.caller
            .ok_or_else(|| AppError::Internal("caller missing after resolution".into()))
    }

    /// Caller and organization, without any entitlement check.
    pub async fn resolve_organization(
        &self,
        credentials: CallerCredentials,
    ) -> AppResult<GuardContext> {
        let mut ctx = GuardContext::from_credentials(credentials);
        GuardChain::new(vec![
            Box::new(ResolveCallerGuard),
            Box::new(ResolveOrganizationGuard),
        ])
        .run(&self.services, &mut ctx)
        .await?;
        Ok(ctx)
    }

    /// Usage, effective limit and headroom for every resource.
    #[instrument(skip(self))]
    pub async fn usage_summary(&self, organization_id: Uuid) -> AppResult<UsageSummary> {
        let snapshot = self.services.cache.get(organization_id, false).await?;
        let usage = self.services.usage.usage(organization_id).await?;
        let current = current_snapshot(snapshot.as_ref());

        let resources = ResourceKey::all_metadata()
            .into_iter()
            .map(|meta| {
                let used = usage.get(&meta.key).copied().unwrap_or_default();
                let limit = current.map(|s| effective_limit(s, meta.key).unwrap_or(UNLIMITED));
                let available = limit.map(|l| {
                    if l == UNLIMITED {
                        UNLIMITED
                    } else {
                        (l - used).max(0)
                    }
                });
                UsageLine {
                    resource: meta.key,
                    label: meta.label,
                    unit: meta.unit,
                    monthly: meta.monthly,
                    current: used,
                    limit,
                    available,
                }
            })
            .collect();

        Ok(UsageSummary {
            organization_id,
            plan_id: current.map(|s| s.subscription.plan_id),
            status: snapshot.as_ref().map(|s| s.subscription.status),
            resources,
        })
    }
}
