//! Static plan catalog.
//!
//! The catalog is the fallback for every plan lookup: a plan row in the store
//! overrides it only while that row is active, and per-subscription overrides
//! sit on top of both.
//!
//! Storage is not metered yet, so no plan carries a default cap for it.

use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::domain::entities::{
    plan::{BillingInterval, Plan, PlanId},
    resource::{ResourceKey, UNLIMITED},
};

/// Gateable feature keys.
pub mod features {
    pub const BASIC_REPORTS: &str = "basic_reports";
    pub const EMAIL_NOTIFICATIONS: &str = "email_notifications";
    pub const BULK_IMPORT: &str = "bulk_import";
    pub const CUSTOM_BRANDING: &str = "custom_branding";
    pub const ADVANCED_REPORTS: &str = "advanced_reports";
    pub const AI_SUMMARIES: &str = "ai_summaries";
    pub const API_ACCESS: &str = "api_access";
    pub const SSO: &str = "sso";
    pub const AUDIT_LOG_EXPORT: &str = "audit_log_export";
    pub const CUSTOM_INTEGRATIONS: &str = "custom_integrations";
    pub const DEDICATED_SUPPORT: &str = "dedicated_support";
}

/// Features and limits a plan carries before any override.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanDefaults {
    pub features: BTreeSet<String>,
    pub limits: HashMap<String, i64>,
}

fn limits(entries: &[(ResourceKey, i64)]) -> HashMap<String, i64> {
    entries
        .iter()
        .map(|(key, limit)| (key.as_ref().to_string(), *limit))
        .collect()
}

static CATALOG: Lazy<Vec<Plan>> = Lazy::new(|| {
    use features::*;

    let essential_features = vec![BASIC_REPORTS, EMAIL_NOTIFICATIONS];
    let professional_features = [
        essential_features.as_slice(),
        &[
            BULK_IMPORT,
            CUSTOM_BRANDING,
            ADVANCED_REPORTS,
            AI_SUMMARIES,
            API_ACCESS,
        ],
    ]
    .concat();
    let enterprise_features = [
        professional_features.as_slice(),
        &[
            SSO,
            AUDIT_LOG_EXPORT,
            CUSTOM_INTEGRATIONS,
            DEDICATED_SUPPORT,
        ],
    ]
    .concat();

    vec![
        Plan {
            id: PlanId::Essential,
            name: "Essential",
            description: "Everything a small team needs to run its first programs",
            price_cents: 0,
            currency: "usd",
            interval: BillingInterval::Monthly,
            trial_days: 0,
            features: essential_features,
            limits: limits(&[
                (ResourceKey::Projects, 5),
                (ResourceKey::Participants, 100),
                (ResourceKey::SubOrganizations, 1),
                (ResourceKey::Instructors, 5),
                (ResourceKey::Courses, 10),
                (ResourceKey::Curriculums, 3),
                (ResourceKey::CustomRoles, 0),
                (ResourceKey::ProjectsPerMonth, 5),
                (ResourceKey::EmailsPerMonth, 500),
                (ResourceKey::AiSummarizationsPerMonth, 0),
            ]),
            display_order: 0,
            highlight: None,
        },
        Plan {
            id: PlanId::Professional,
            name: "Professional",
            description: "Unlimited projects and automation for growing organizations",
            price_cents: 4_900,
            currency: "usd",
            interval: BillingInterval::Monthly,
            trial_days: 14,
            features: professional_features,
            limits: limits(&[
                (ResourceKey::Projects, UNLIMITED),
                (ResourceKey::Participants, 1_000),
                (ResourceKey::SubOrganizations, 5),
                (ResourceKey::Instructors, 50),
                (ResourceKey::Courses, UNLIMITED),
                (ResourceKey::Curriculums, UNLIMITED),
                (ResourceKey::CustomRoles, 10),
                (ResourceKey::ProjectsPerMonth, UNLIMITED),
                (ResourceKey::EmailsPerMonth, 5_000),
                (ResourceKey::AiSummarizationsPerMonth, 500),
            ]),
            display_order: 1,
            highlight: Some("Most popular"),
        },
        Plan {
            id: PlanId::Enterprise,
            name: "Enterprise",
            description: "Single sign-on, audit exports and dedicated support",
            price_cents: 19_900,
            currency: "usd",
            interval: BillingInterval::Monthly,
            trial_days: 30,
            features: enterprise_features,
            limits: limits(&[
                (ResourceKey::Projects, UNLIMITED),
                (ResourceKey::Participants, UNLIMITED),
                (ResourceKey::SubOrganizations, UNLIMITED),
                (ResourceKey::Instructors, UNLIMITED),
                (ResourceKey::Courses, UNLIMITED),
                (ResourceKey::Curriculums, UNLIMITED),
                (ResourceKey::CustomRoles, UNLIMITED),
                (ResourceKey::ProjectsPerMonth, UNLIMITED),
                (ResourceKey::EmailsPerMonth, UNLIMITED),
                (ResourceKey::AiSummarizationsPerMonth, UNLIMITED),
            ]),
            display_order: 2,
            highlight: Some("For institutions"),
        },
    ]
});

/// All catalog plans in display order.
pub fn plans() -> &'static [Plan] {
    &CATALOG
}

pub fn plan(id: PlanId) -> &'static Plan {
    // Every PlanId variant has a catalog row (see test_every_plan_id_has_a_row).
    CATALOG
        .iter()
        .find(|p| p.id == id)
        .unwrap_or(&CATALOG[0])
}

/// Look up catalog defaults by plan identifier string. `None` for unknown plans.
pub fn plan_defaults(plan_id: &str) -> Option<PlanDefaults> {
    let id: PlanId = plan_id.parse().ok()?;
    let plan = plan(id);
    Some(PlanDefaults {
        features: plan.features.iter().map(|f| f.to_string()).collect(),
        limits: plan.limits.clone(),
    })
}

pub fn default_limit(id: PlanId, resource: ResourceKey) -> Option<i64> {
    plan(id).limits.get(resource.as_ref()).copied()
}

/// Cheapest catalog plan that includes `feature`; ties go to display order.
pub fn cheapest_plan_with_feature(feature: &str) -> Option<PlanId> {
    CATALOG
        .iter()
        .filter(|p| p.has_feature(feature))
        .min_by_key(|p| (p.price_cents, p.display_order))
        .map(|p| p.id)
}
