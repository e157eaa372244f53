//! Pure entitlement decisions over a subscription snapshot.
//!
//! Nothing here touches the store or the cache. Callers hand in a snapshot
//! (and, for capacity checks, a usage count they fetched themselves).

use serde::Serialize;

use crate::domain::{
    catalog,
    entities::{
        plan::PlanId,
        resource::{ResourceKey, UNLIMITED},
        subscription::SubscriptionWithPlan,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessReason {
    CustomFeature,
    PlanFeature,
    NoSubscription,
    FeatureNotInPlan,
}

impl AccessReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessReason::CustomFeature => "custom_feature",
            AccessReason::PlanFeature => "plan_feature",
            AccessReason::NoSubscription => "no_subscription",
            AccessReason::FeatureNotInPlan => "feature_not_in_plan",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureAccess {
    pub can_access: bool,
    pub reason: AccessReason,
    pub message: String,
    pub required_plan: Option<PlanId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCapacity {
    pub has_capacity: bool,
    pub current: i64,
    pub limit: i64,
    pub available: i64,
}

/// Returns the snapshot only if its status keeps the plan in force.
pub fn current_snapshot(snapshot: Option<&SubscriptionWithPlan>) -> Option<&SubscriptionWithPlan> {
    snapshot.filter(|s| s.subscription.is_current())
}

/// Feature keys granted by the plan: the active store record replaces the
/// catalog list outright.
pub fn plan_features(snapshot: &SubscriptionWithPlan) -> Vec<String> {
    match snapshot.active_plan_record() {
        Some(record) => record.features.clone(),
        None => catalog::plan(snapshot.subscription.plan_id)
            .features
            .iter()
            .map(|f| f.to_string())
            .collect(),
    }
}

pub fn can_access_feature(snapshot: Option<&SubscriptionWithPlan>, feature: &str) -> FeatureAccess {
    let Some(snapshot) = current_snapshot(snapshot) else {
        return FeatureAccess {
            can_access: false,
            reason: AccessReason::NoSubscription,
            message: "No active subscription".to_string(),
            required_plan: catalog::cheapest_plan_with_feature(feature),
        };
    };

    let subscription = &snapshot.subscription;
    if subscription.custom_features.iter().any(|f| f == feature) {
        return FeatureAccess {
            can_access: true,
            reason: AccessReason::CustomFeature,
            message: format!("{feature} is enabled for this organization"),
            required_plan: None,
        };
    }

    if plan_features(snapshot).iter().any(|f| f == feature) {
        return FeatureAccess {
            can_access: true,
            reason: AccessReason::PlanFeature,
            message: format!(
                "{feature} is included in the {} plan",
                subscription.plan_id.display_name()
            ),
            required_plan: None,
        };
    }

    let required_plan = catalog::cheapest_plan_with_feature(feature);
    let message = match required_plan {
        Some(plan) => format!(
            "{feature} is not included in the {} plan. Upgrade to {} to use it.",
            subscription.plan_id.display_name(),
            plan.display_name()
        ),
        None => format!("{feature} is not available on any plan"),
    };
    FeatureAccess {
        can_access: false,
        reason: AccessReason::FeatureNotInPlan,
        message,
        required_plan,
    }
}

/// Effective limit for `resource`: subscription override, then the active
/// store plan record, then the catalog. `None` when no source defines it.
pub fn effective_limit(snapshot: &SubscriptionWithPlan, resource: ResourceKey) -> Option<i64> {
    let key = resource.as_ref();
    snapshot
        .subscription
        .custom_limits
        .get(key)
        .copied()
        .or_else(|| {
            snapshot
                .active_plan_record()
                .and_then(|record| record.resource_limits.get(key).copied())
        })
        .or_else(|| catalog::default_limit(snapshot.subscription.plan_id, resource))
}

pub fn has_resource_capacity(
    snapshot: &SubscriptionWithPlan,
    resource: ResourceKey,
    current: i64,
    requested: i64,
) -> ResourceCapacity {
    let limit = match effective_limit(snapshot, resource) {
        Some(limit) => limit,
        None => {
            tracing::debug!(
                organization_id = %snapshot.subscription.organization_id,
                resource = %resource,
                "No limit defined for resource, treating as unlimited"
            );
            UNLIMITED
        }
    };

    if limit == UNLIMITED {
        return ResourceCapacity {
            has_capacity: true,
            current,
            limit: UNLIMITED,
            available: UNLIMITED,
        };
    }

    ResourceCapacity {
        // Overflow means the request cannot fit.
        has_capacity: current
            .checked_add(requested)
            .is_some_and(|total| total <= limit),
        current,
        limit,
        available: (limit - current).max(0),
    }
}
