//! Wiring helpers that assemble use cases and `AppState` from the in-memory
//! doubles.

use std::sync::Arc;

use axum::http::HeaderValue;
use chrono::Duration;
use secrecy::SecretString;
use uuid::Uuid;

use super::{
    InMemoryOrganizationRepo, InMemoryPlanRepo, InMemorySubscriptionRepo, InMemoryUsageRepo,
    ManualClock, StaticIdentityProvider,
};
use crate::{
    adapters::http::app_state::AppState,
    application::ports::identity::Caller,
    domain::entities::{organization::OrganizationSummary, subscription::Subscription},
    infra::{
        config::{AppConfig, CacheBackendKind},
        memory_cache::InMemorySubscriptionCache,
    },
    use_cases::{
        enforcement::{EnforcementUseCases, GuardServices},
        organization::OrganizationUseCases,
        plans::PlanUseCases,
        reconciliation::ReconciliationUseCases,
        subscription::SubscriptionUseCases,
        subscription_cache::SubscriptionCache,
        usage::UsageUseCases,
    },
};

const TEST_UPGRADE_URL: &str = "/billing/upgrade";

// ============================================================================
// EnforcementHarness
// ============================================================================

/// Enforcement and lifecycle use cases over shared in-memory stores.
///
/// Every use case handed out shares one subscription cache, so a lifecycle
/// change made through `subscriptions()` is visible to `enforcement()` at once.
pub struct EnforcementHarness {
    pub usage: Arc<InMemoryUsageRepo>,
    pub subscription_repo: Arc<InMemorySubscriptionRepo>,
    organization_repo: Arc<InMemoryOrganizationRepo>,
    identity: Arc<StaticIdentityProvider>,
    clock: Arc<ManualClock>,
    cache: Arc<SubscriptionCache>,
    organization_ids: Vec<Uuid>,
    subscription_ids: Vec<Uuid>,
}

impl Default for EnforcementHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl EnforcementHarness {
    pub fn new() -> Self {
        let subscription_repo = Arc::new(InMemorySubscriptionRepo::new());
        let clock = Arc::new(ManualClock::default());
        let cache = Arc::new(SubscriptionCache::new(
            Arc::new(InMemorySubscriptionCache::new()),
            subscription_repo.clone(),
            clock.clone(),
            Duration::minutes(15),
        ));
        Self {
            usage: Arc::new(InMemoryUsageRepo::new()),
            subscription_repo,
            organization_repo: Arc::new(InMemoryOrganizationRepo::new()),
            identity: Arc::new(StaticIdentityProvider::new()),
            clock,
            cache,
            organization_ids: vec![],
            subscription_ids: vec![],
        }
    }

    pub fn with_organization(mut self, organization: OrganizationSummary) -> Self {
        self.organization_ids.push(organization.id);
        self.organization_repo.insert(organization.clone());
        self.subscription_repo.insert_organization(organization);
        self
    }

    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.subscription_ids.push(subscription.id);
        self.subscription_repo.insert_subscription(subscription);
        self
    }

    pub fn with_caller(self, token: &str, caller: Caller) -> Self {
        self.identity.insert(token, caller);
        self
    }

    pub fn enforcement(&self) -> EnforcementUseCases {
        EnforcementUseCases::new(GuardServices {
            identity: self.identity.clone(),
            organizations: OrganizationUseCases::new(self.organization_repo.clone()),
            cache: self.cache.clone(),
            usage: Arc::new(UsageUseCases::new(self.usage.clone(), self.clock.clone())),
            upgrade_url: TEST_UPGRADE_URL.to_string(),
        })
    }

    pub fn subscriptions(&self) -> SubscriptionUseCases {
        SubscriptionUseCases::new(
            self.subscription_repo.clone(),
            self.organization_repo.clone(),
            self.cache.clone(),
            self.clock.clone(),
        )
    }

    pub fn cache(&self) -> Arc<SubscriptionCache> {
        self.cache.clone()
    }

    pub fn clock(&self) -> Arc<ManualClock> {
        self.clock.clone()
    }

    /// First organization added.
    pub fn organization_id(&self) -> Uuid {
        self.organization_ids[0]
    }

    /// First subscription added.
    pub fn subscription_id(&self) -> Uuid {
        self.subscription_ids[0]
    }

    pub fn upgrade_url(&self) -> &'static str {
        TEST_UPGRADE_URL
    }
}

// ============================================================================
// TestAppStateBuilder
// ============================================================================

/// Builder for `AppState` backed entirely by in-memory doubles.
///
/// # Example
/// ```ignore
/// let app_state = TestAppStateBuilder::new()
///     .with_organization(org)
///     .with_subscription(sub)
///     .with_caller("token", create_test_caller(|_| {}))
///     .build();
/// ```
pub struct TestAppStateBuilder {
    harness: EnforcementHarness,
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            harness: EnforcementHarness::new(),
        }
    }

    pub fn with_organization(mut self, organization: OrganizationSummary) -> Self {
        self.harness = self.harness.with_organization(organization);
        self
    }

    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.harness = self.harness.with_subscription(subscription);
        self
    }

    pub fn with_caller(mut self, token: &str, caller: Caller) -> Self {
        self.harness = self.harness.with_caller(token, caller);
        self
    }

    pub fn usage(&self) -> &Arc<InMemoryUsageRepo> {
        &self.harness.usage
    }

    pub fn build(self) -> AppState {
        let harness = self.harness;
        let clock = harness.clock();
        let plans = Arc::new(InMemoryPlanRepo::sharing(&harness.subscription_repo));

        let usage = Arc::new(UsageUseCases::new(harness.usage.clone(), clock.clone()));
        let reconciliation =
            ReconciliationUseCases::new(harness.subscription_repo.clone(), usage);

        AppState {
            config: Arc::new(test_config()),
            enforcement: Arc::new(harness.enforcement()),
            subscription_use_cases: Arc::new(harness.subscriptions()),
            plan_use_cases: Arc::new(PlanUseCases::new(plans, clock)),
            reconciliation_use_cases: Arc::new(reconciliation),
            subscription_cache: harness.cache(),
        }
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://localhost/plangate_test".to_string(),
        jwt_secret: SecretString::new("test-secret".into()),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        cors_origin: HeaderValue::from_static("http://localhost:3000"),
        redis_url: "redis://127.0.0.1:6379".to_string(),
        cache_backend: CacheBackendKind::Memory,
        subscription_cache_ttl_secs: 900,
        upgrade_url: TEST_UPGRADE_URL.to_string(),
        admin_role: "admin".to_string(),
        cancellation_poll_secs: 60,
        reconciliation_interval_secs: 0,
        log_file: None,
    }
}
