//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::{
    application::ports::identity::Caller,
    domain::{
        catalog,
        entities::{
            organization::OrganizationSummary,
            plan::{PlanId, PlanRecord},
            subscription::{
                BillingReference, Subscription, SubscriptionStatus, SubscriptionWithPlan,
            },
        },
    },
};

/// Fixed timestamp used for created/updated fields.
pub fn test_datetime() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
}

/// Create a test organization with sensible defaults.
pub fn create_test_organization(
    overrides: impl FnOnce(&mut OrganizationSummary),
) -> OrganizationSummary {
    let mut organization = OrganizationSummary {
        id: Uuid::new_v4(),
        external_id: "org_test".to_string(),
        name: "Test Organization".to_string(),
    };
    overrides(&mut organization);
    organization
}

/// Create an active essential subscription with sensible defaults.
pub fn create_test_subscription(
    organization_id: Uuid,
    overrides: impl FnOnce(&mut Subscription),
) -> Subscription {
    let mut subscription = Subscription {
        id: Uuid::new_v4(),
        organization_id,
        plan_id: PlanId::Essential,
        status: SubscriptionStatus::Active,
        current_period_start: test_datetime(),
        current_period_end: test_datetime() + Duration::days(30),
        cancel_at: None,
        canceled_at: None,
        billing: BillingReference::default(),
        custom_features: vec![],
        custom_limits: HashMap::new(),
        created_by: Some("seed".to_string()),
        updated_by: None,
        created_at: test_datetime(),
        updated_at: test_datetime(),
    };
    overrides(&mut subscription);
    subscription
}

/// Create a snapshot on `plan_id` with no store plan record.
pub fn create_test_snapshot(
    plan_id: PlanId,
    overrides: impl FnOnce(&mut SubscriptionWithPlan),
) -> SubscriptionWithPlan {
    let organization = create_test_organization(|_| {});
    let mut snapshot = SubscriptionWithPlan {
        subscription: create_test_subscription(organization.id, |s| s.plan_id = plan_id),
        plan: None,
        organization,
    };
    overrides(&mut snapshot);
    snapshot
}

/// Create an active store plan record carrying the catalog feature list and
/// no limit overrides.
pub fn create_test_plan_record(
    plan_id: PlanId,
    overrides: impl FnOnce(&mut PlanRecord),
) -> PlanRecord {
    let mut record = PlanRecord {
        plan_id,
        features: catalog::plan(plan_id)
            .features
            .iter()
            .map(|f| f.to_string())
            .collect(),
        resource_limits: HashMap::new(),
        is_active: true,
        updated_by: None,
        created_at: Some(test_datetime()),
        updated_at: None,
    };
    overrides(&mut record);
    record
}

/// Create a caller in `org_acme` with no roles.
pub fn create_test_caller(overrides: impl FnOnce(&mut Caller)) -> Caller {
    let mut caller = Caller {
        user_id: "user-1".to_string(),
        organization_external_id: Some("org_acme".to_string()),
        roles: vec![],
    };
    overrides(&mut caller);
    caller
}
