use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::{
    app_error::{AppError, AppResult},
    application::{
        ports::clock::Clock, use_cases::subscription::Actor,
        validators::validate_resource_limits,
    },
    domain::{
        catalog,
        entities::{
            plan::{BillingInterval, Plan, PlanId, PlanRecord},
            resource::{ResourceKey, ResourceMetadata},
        },
    },
};

#[async_trait]
pub trait PlanRepo: Send + Sync {
    async fn get(&self, plan_id: PlanId) -> AppResult<Option<PlanRecord>>;
    async fn list(&self) -> AppResult<Vec<PlanRecord>>;
    async fn upsert(&self, record: &PlanRecord) -> AppResult<PlanRecord>;
}

#[derive(Debug, Clone)]
pub struct UpdatePlanLimitsInput {
    /// Raw identifier as supplied by the caller; validated here.
    pub plan_id: String,
    pub resource_limits: HashMap<String, i64>,
}

/// A catalog plan with any active store record applied on top.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectivePlan {
    pub id: PlanId,
    pub name: &'static str,
    pub description: &'static str,
    pub price_cents: i32,
    pub currency: &'static str,
    pub interval: BillingInterval,
    pub trial_days: i32,
    pub features: Vec<String>,
    pub limits: HashMap<String, i64>,
    pub display_order: i32,
    pub highlight: Option<&'static str>,
    pub overridden: bool,
    pub updated_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl EffectivePlan {
    fn from_catalog(plan: &Plan, record: Option<&PlanRecord>) -> Self {
        let active = record.filter(|r| r.is_active);

        let features = match active {
            Some(r) => r.features.clone(),
            None => plan.features.iter().map(|f| f.to_string()).collect(),
        };
        let mut limits = plan.limits.clone();
        if let Some(r) = active {
            limits.extend(r.resource_limits.iter().map(|(k, v)| (k.clone(), *v)));
        }

        Self {
            id: plan.id,
            name: plan.name,
            description: plan.description,
            price_cents: plan.price_cents,
            currency: plan.currency,
            interval: plan.interval,
            trial_days: plan.trial_days,
            features,
            limits,
            display_order: plan.display_order,
            highlight: plan.highlight,
            overridden: active.is_some(),
            updated_by: active.and_then(|r| r.updated_by.clone()),
            updated_at: active.and_then(|r| r.updated_at),
        }
    }
}

#[derive(Clone)]
pub struct PlanUseCases {
    repo: Arc<dyn PlanRepo>,
    clock: Arc<dyn Clock>,
}

impl PlanUseCases {
    pub fn new(repo: Arc<dyn PlanRepo>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Merges `resource_limits` into the plan's store record, creating the
    /// record from catalog defaults when none exists. Cached subscriptions
    /// pick the change up on their next refresh.
    #[instrument(skip(self))]
    pub async fn update_plan_limits(
        &self,
        input: UpdatePlanLimitsInput,
        actor: &Actor,
    ) -> AppResult<PlanRecord> {
        let plan_id: PlanId = input
            .plan_id
            .parse()
            .map_err(|_| AppError::InvalidInput(format!("Unknown plan: {}", input.plan_id)))?;
        validate_resource_limits(&input.resource_limits)?;

        let now = self.clock.now();
        let mut record = match self.repo.get(plan_id).await? {
            Some(record) => record,
            None => {
                let defaults = catalog::plan_defaults(plan_id.as_ref()).ok_or_else(|| {
                    AppError::Internal(format!("No catalog entry for {plan_id}"))
                })?;
                PlanRecord {
                    plan_id,
                    features: defaults.features.into_iter().collect(),
                    resource_limits: defaults.limits,
                    is_active: true,
                    updated_by: None,
                    created_at: Some(now),
                    updated_at: None,
                }
            }
        };

        record.resource_limits.extend(input.resource_limits);
        record.updated_by = Some(actor.id.clone());
        record.updated_at = Some(now);

        let saved = self.repo.upsert(&record).await?;
        info!(
            plan_id = %plan_id,
            updated_by = %actor.id,
            "Plan limits updated"
        );
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn list_plans(&self) -> AppResult<Vec<EffectivePlan>> {
        let records: HashMap<PlanId, PlanRecord> = self
            .repo
            .list()
            .await?
            .into_iter()
            .map(|r| (r.plan_id, r))
            .collect();

        Ok(catalog::plans()
            .iter()
            .map(|plan| EffectivePlan::from_catalog(plan, records.get(&plan.id)))
            .collect())
    }

    pub fn resources(&self) -> Vec<ResourceMetadata> {
        ResourceKey::all_metadata()
    }
}
