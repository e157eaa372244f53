use std::sync::Arc;

use crate::{
    infra::config::AppConfig,
    use_cases::{
        enforcement::EnforcementUseCases, plans::PlanUseCases,
        reconciliation::ReconciliationUseCases, subscription::SubscriptionUseCases,
        subscription_cache::SubscriptionCache,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub enforcement: Arc<EnforcementUseCases>,
    pub subscription_use_cases: Arc<SubscriptionUseCases>,
    pub plan_use_cases: Arc<PlanUseCases>,
    pub reconciliation_use_cases: Arc<ReconciliationUseCases>,
    pub subscription_cache: Arc<SubscriptionCache>,
}
