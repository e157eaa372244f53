use std::sync::Arc;

use serde::Serialize;
use strum::IntoEnumIterator;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    application::{
        entitlements::{current_snapshot, effective_limit},
        use_cases::{subscription::SubscriptionRepo, usage::UsageUseCases},
    },
    domain::entities::{
        plan::PlanId,
        resource::{ResourceKey, UNLIMITED},
    },
};

/// An organization found using more of a resource than its plan allows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overshoot {
    pub organization_id: Uuid,
    pub subscription_id: Uuid,
    pub plan_id: PlanId,
    pub resource: ResourceKey,
    pub current: i64,
    pub limit: i64,
}

/// Detects organizations that slipped past their limits, typically through
/// concurrent requests that each passed the capacity check. Reports only.
#[derive(Clone)]
pub struct ReconciliationUseCases {
    subscriptions: Arc<dyn SubscriptionRepo>,
    usage: Arc<UsageUseCases>,
}

impl ReconciliationUseCases {
    pub fn new(subscriptions: Arc<dyn SubscriptionRepo>, usage: Arc<UsageUseCases>) -> Self {
        Self {
            subscriptions,
            usage,
        }
    }

    #[instrument(skip(self))]
    pub async fn scan_overshoot(&self) -> AppResult<Vec<Overshoot>> {
        let current = self.subscriptions.list_current().await?;
        let mut found = Vec::new();

        for subscription in &current {
            let organization_id = subscription.organization_id;
            let snapshot = match self.subscriptions.get_snapshot(organization_id).await {
                Ok(s) => s,
                Err(e) => {
                    error!(organization_id = %organization_id, error = ?e, "Failed to load subscription for reconciliation");
                    continue;
                }
            };
            let Some(snapshot) = current_snapshot(snapshot.as_ref()) else {
                continue;
            };

            let usage = match self.usage.usage(organization_id).await {
                Ok(u) => u,
                Err(e) => {
                    error!(organization_id = %organization_id, error = ?e, "Failed to compute usage for reconciliation");
                    continue;
                }
            };

            for resource in ResourceKey::iter() {
                let Some(limit) = effective_limit(snapshot, resource) else {
                    continue;
                };
                let used = usage.get(&resource).copied().unwrap_or_default();
                if limit == UNLIMITED || used <= limit {
                    continue;
                }

                warn!(
                    organization_id = %organization_id,
                    subscription_id = %snapshot.subscription.id,
                    plan_id = %snapshot.subscription.plan_id,
                    resource = %resource,
                    current = used,
                    limit,
                    "Organization is over its resource limit"
                );
                found.push(Overshoot {
                    organization_id,
                    subscription_id: snapshot.subscription.id,
                    plan_id: snapshot.subscription.plan_id,
                    resource,
                    current: used,
                    limit,
                });
            }
        }

        info!(
            scanned = current.len(),
            overshoots = found.len(),
            "Reconciliation scan finished"
        );
        Ok(found)
    }
}
