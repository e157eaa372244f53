use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        ports::clock::Clock,
        use_cases::{organization::OrganizationRepo, subscription_cache::SubscriptionCache},
        validators::{validate_feature_keys, validate_resource_limits},
    },
    domain::entities::{
        plan::PlanId,
        subscription::{BillingReference, Subscription, SubscriptionStatus, SubscriptionWithPlan},
        subscription_history::{HistoryEventType, SubscriptionHistoryEntry},
    },
};

/// Default length of a new billing period.
const DEFAULT_PERIOD_DAYS: i64 = 30;

// ============================================================================
// Repository
// ============================================================================

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>>;

    /// The organization's subscription that is not canceled, if any.
    async fn get_open_by_organization(&self, organization_id: Uuid)
    -> AppResult<Option<Subscription>>;

    /// The organization's most relevant subscription (open first, then most
    /// recent) joined with its plan record and organization summary.
    async fn get_snapshot(&self, organization_id: Uuid) -> AppResult<Option<SubscriptionWithPlan>>;

    /// Inserts the subscription and its history row atomically.
    async fn insert_with_history(
        &self,
        subscription: &Subscription,
        entry: &SubscriptionHistoryEntry,
    ) -> AppResult<()>;

    /// Updates the subscription and appends its history row atomically.
    async fn update_with_history(
        &self,
        subscription: &Subscription,
        entry: &SubscriptionHistoryEntry,
    ) -> AppResult<()>;

    /// History rows for a subscription, newest first.
    async fn list_history(&self, subscription_id: Uuid) -> AppResult<Vec<SubscriptionHistoryEntry>>;

    /// Open subscriptions whose scheduled `cancel_at` is at or before `now`.
    async fn list_due_cancellations(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>>;

    /// Every subscription whose status keeps its plan in force.
    async fn list_current(&self) -> AppResult<Vec<Subscription>>;
}

// ============================================================================
// Inputs
// ============================================================================

/// Who performed a lifecycle mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Option<String>) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn system() -> Self {
        Self {
            id: "system".to_string(),
            role: Some("system".to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionInput {
    pub organization_id: Uuid,
    pub plan_id: PlanId,
    pub status: Option<SubscriptionStatus>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub billing: Option<BillingReference>,
}

/// Partial update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionUpdate {
    pub plan_id: Option<PlanId>,
    pub status: Option<SubscriptionStatus>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub billing: Option<BillingReference>,
    pub custom_features: Option<Vec<String>>,
    pub custom_limits: Option<HashMap<String, i64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanChangeDirection {
    Upgrade,
    Downgrade,
}

impl PlanChangeDirection {
    pub fn between(from: PlanId, to: PlanId) -> Option<Self> {
        match from.tier().cmp(&to.tier()) {
            std::cmp::Ordering::Less => Some(PlanChangeDirection::Upgrade),
            std::cmp::Ordering::Greater => Some(PlanChangeDirection::Downgrade),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanChangeDirection::Upgrade => "upgrade",
            PlanChangeDirection::Downgrade => "downgrade",
        }
    }
}

/// Classifies an update of `before` into `after` for the audit log.
pub fn classify_change(before: &Subscription, after: &Subscription) -> HistoryEventType {
    if before.plan_id != after.plan_id {
        HistoryEventType::PlanChanged
    } else if after.status == SubscriptionStatus::Canceled
        && before.status != SubscriptionStatus::Canceled
    {
        HistoryEventType::Canceled
    } else if before.status == SubscriptionStatus::Canceled
        && after.status == SubscriptionStatus::Active
    {
        HistoryEventType::Reactivated
    } else {
        HistoryEventType::Updated
    }
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct SubscriptionUseCases {
    repo: Arc<dyn SubscriptionRepo>,
    organization_repo: Arc<dyn OrganizationRepo>,
    cache: Arc<SubscriptionCache>,
    clock: Arc<dyn Clock>,
}

impl SubscriptionUseCases {
    pub fn new(
        repo: Arc<dyn SubscriptionRepo>,
        organization_repo: Arc<dyn OrganizationRepo>,
        cache: Arc<SubscriptionCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            organization_repo,
            cache,
            clock,
        }
    }

    async fn load(&self, id: Uuid) -> AppResult<Subscription> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(AppError::SubscriptionNotFound)
    }

    /// Rejects a transition out of `canceled` when the organization already
    /// has another open subscription.
    async fn ensure_no_other_open(&self, subscription: &Subscription) -> AppResult<()> {
        if let Some(open) = self
            .repo
            .get_open_by_organization(subscription.organization_id)
            .await?
            && open.id != subscription.id
        {
            return Err(AppError::InvalidInput(
                "Organization already has an open subscription".into(),
            ));
        }
        Ok(())
    }

    async fn invalidate(&self, organization_id: Uuid) {
        if let Err(e) = self.cache.invalidate(organization_id).await {
            error!(
                organization_id = %organization_id,
                error = ?e,
                "Failed to invalidate subscription cache after write"
            );
        }
    }

    fn history_entry(
        &self,
        event_type: HistoryEventType,
        before: Option<&Subscription>,
        after: &Subscription,
        reason: Option<String>,
        actor: &Actor,
        extra: serde_json::Map<String, serde_json::Value>,
    ) -> AppResult<SubscriptionHistoryEntry> {
        let mut metadata = serde_json::Map::new();
        if let Some(before) = before {
            metadata.insert("before".into(), to_json(before)?);
        }
        metadata.insert("after".into(), to_json(after)?);
        metadata.extend(extra);

        Ok(SubscriptionHistoryEntry {
            id: Uuid::new_v4(),
            subscription_id: after.id,
            organization_id: after.organization_id,
            event_type,
            from_plan_id: before.map(|b| b.plan_id),
            to_plan_id: Some(after.plan_id),
            from_status: before.map(|b| b.status),
            to_status: Some(after.status),
            reason,
            changed_by: actor.id.clone(),
            changed_by_role: actor.role.clone(),
            metadata: serde_json::Value::Object(metadata),
            created_at: self.clock.now(),
        })
    }

    /// Writes `after` with its history row and invalidates the cache entry.
    async fn commit(
        &self,
        before: &Subscription,
        mut after: Subscription,
        reason: Option<String>,
        actor: &Actor,
        extra: serde_json::Map<String, serde_json::Value>,
    ) -> AppResult<Subscription> {
        after.updated_by = Some(actor.id.clone());
        after.updated_at = self.clock.now();

        let event_type = classify_change(before, &after);
        let entry = self.history_entry(event_type, Some(before), &after, reason, actor, extra)?;
        self.repo.update_with_history(&after, &entry).await?;
        self.invalidate(after.organization_id).await;

        info!(
            subscription_id = %after.id,
            organization_id = %after.organization_id,
            event_type = %event_type,
            plan_id = %after.plan_id,
            status = %after.status,
            changed_by = %actor.id,
            "Subscription updated"
        );
        Ok(after)
    }

    #[instrument(skip(self))]
    pub async fn create(
        &self,
        input: CreateSubscriptionInput,
        actor: &Actor,
    ) -> AppResult<Subscription> {
        if self
            .organization_repo
            .get_by_id(input.organization_id)
            .await?
            .is_none()
        {
            return Err(AppError::OrganizationNotFound);
        }

        if self
            .repo
            .get_open_by_organization(input.organization_id)
            .await?
            .is_some()
        {
            return Err(AppError::InvalidInput(
                "Organization already has an open subscription".into(),
            ));
        }

        let now = self.clock.now();
        let current_period_end = input
            .current_period_end
            .unwrap_or(now + Duration::days(DEFAULT_PERIOD_DAYS));
        if current_period_end <= now {
            return Err(AppError::InvalidInput(
                "Current period end must be in the future".into(),
            ));
        }

        let status = input.status.unwrap_or(SubscriptionStatus::Active);
        let subscription = Subscription {
            id: Uuid::new_v4(),
            organization_id: input.organization_id,
            plan_id: input.plan_id,
            status,
            current_period_start: now,
            current_period_end,
            cancel_at: None,
            canceled_at: (status == SubscriptionStatus::Canceled).then_some(now),
            billing: input.billing.unwrap_or_default(),
            custom_features: vec![],
            custom_limits: HashMap::new(),
            created_by: Some(actor.id.clone()),
            updated_by: Some(actor.id.clone()),
            created_at: now,
            updated_at: now,
        };

        let entry = self.history_entry(
            HistoryEventType::Created,
            None,
            &subscription,
            None,
            actor,
            serde_json::Map::new(),
        )?;
        self.repo.insert_with_history(&subscription, &entry).await?;
        self.invalidate(subscription.organization_id).await;

        info!(
            subscription_id = %subscription.id,
            organization_id = %subscription.organization_id,
            event_type = %HistoryEventType::Created,
            plan_id = %subscription.plan_id,
            created_by = %actor.id,
            "Subscription created"
        );
        Ok(subscription)
    }

    #[instrument(skip(self, updates))]
    pub async fn update(
        &self,
        subscription_id: Uuid,
        updates: SubscriptionUpdate,
        actor: &Actor,
        reason: Option<String>,
    ) -> AppResult<Subscription> {
        let before = self.load(subscription_id).await?;

        if let Some(limits) = &updates.custom_limits {
            validate_resource_limits(limits)?;
        }
        if let Some(features) = &updates.custom_features {
            validate_feature_keys(features)?;
        }

        let now = self.clock.now();
        let mut after = before.clone();
        if let Some(plan_id) = updates.plan_id {
            after.plan_id = plan_id;
        }
        if let Some(status) = updates.status {
            after.status = status;
        }
        if let Some(start) = updates.current_period_start {
            after.current_period_start = start;
        }
        if let Some(end) = updates.current_period_end {
            after.current_period_end = end;
        }
        if let Some(billing) = updates.billing {
            after.billing = billing;
        }
        if let Some(features) = updates.custom_features {
            after.custom_features = features;
        }
        if let Some(limits) = updates.custom_limits {
            after.custom_limits = limits;
        }

        if after.current_period_end <= after.current_period_start {
            return Err(AppError::InvalidInput(
                "Current period end must be after its start".into(),
            ));
        }

        match (before.status, after.status) {
            (SubscriptionStatus::Canceled, SubscriptionStatus::Canceled) => {}
            (SubscriptionStatus::Canceled, _) => {
                self.ensure_no_other_open(&after).await?;
                after.canceled_at = None;
                after.cancel_at = None;
            }
            (_, SubscriptionStatus::Canceled) => {
                after.canceled_at = Some(now);
                after.cancel_at = None;
            }
            _ => {}
        }

        self.commit(&before, after, reason, actor, serde_json::Map::new())
            .await
    }

    /// Cancels now, or schedules cancellation when `cancel_at` is in the future.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        subscription_id: Uuid,
        cancel_at: Option<DateTime<Utc>>,
        reason: Option<String>,
        actor: &Actor,
    ) -> AppResult<Subscription> {
        let before = self.load(subscription_id).await?;
        if before.status == SubscriptionStatus::Canceled {
            return Err(AppError::InvalidInput(
                "Subscription is already canceled".into(),
            ));
        }

        let now = self.clock.now();
        let mut after = before.clone();
        let mut extra = serde_json::Map::new();
        match cancel_at {
            Some(at) if at > now => {
                after.cancel_at = Some(at);
                extra.insert("scheduled".into(), serde_json::Value::Bool(true));
            }
            _ => {
                after.status = SubscriptionStatus::Canceled;
                after.canceled_at = Some(now);
                after.cancel_at = None;
                extra.insert("scheduled".into(), serde_json::Value::Bool(false));
            }
        }

        self.commit(&before, after, reason, actor, extra).await
    }

    #[instrument(skip(self))]
    pub async fn change_plan(
        &self,
        subscription_id: Uuid,
        new_plan_id: PlanId,
        actor: &Actor,
        reason: Option<String>,
    ) -> AppResult<Subscription> {
        let before = self.load(subscription_id).await?;
        if before.status == SubscriptionStatus::Canceled {
            return Err(AppError::InvalidInput(
                "Cannot change the plan of a canceled subscription".into(),
            ));
        }

        let direction = PlanChangeDirection::between(before.plan_id, new_plan_id).ok_or_else(
            || AppError::InvalidInput(format!("Subscription is already on the {new_plan_id} plan")),
        )?;

        let reason = reason.unwrap_or_else(|| {
            let verb = match direction {
                PlanChangeDirection::Upgrade => "Upgraded",
                PlanChangeDirection::Downgrade => "Downgraded",
            };
            format!(
                "{verb} from {} to {}",
                before.plan_id.display_name(),
                new_plan_id.display_name()
            )
        });

        let mut after = before.clone();
        after.plan_id = new_plan_id;

        let mut extra = serde_json::Map::new();
        extra.insert(
            "direction".into(),
            serde_json::Value::String(direction.as_str().to_string()),
        );
        self.commit(&before, after, Some(reason), actor, extra)
            .await
    }

    /// Brings a canceled subscription back to `active`, or drops a pending
    /// scheduled cancellation.
    #[instrument(skip(self))]
    pub async fn reactivate(
        &self,
        subscription_id: Uuid,
        actor: &Actor,
        reason: Option<String>,
    ) -> AppResult<Subscription> {
        let before = self.load(subscription_id).await?;

        let mut after = before.clone();
        match before.status {
            SubscriptionStatus::Canceled => {
                self.ensure_no_other_open(&before).await?;
                after.status = SubscriptionStatus::Active;
            }
            _ if before.cancel_at.is_some() => {}
            _ => {
                return Err(AppError::InvalidInput(
                    "Only canceled subscriptions or pending cancellations can be reactivated"
                        .into(),
                ));
            }
        }
        after.cancel_at = None;
        after.canceled_at = None;

        self.commit(&before, after, reason, actor, serde_json::Map::new())
            .await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, subscription_id: Uuid) -> AppResult<Subscription> {
        self.load(subscription_id).await
    }

    #[instrument(skip(self))]
    pub async fn get_for_organization(
        &self,
        organization_id: Uuid,
    ) -> AppResult<SubscriptionWithPlan> {
        self.cache
            .get(organization_id, false)
            .await?
            .ok_or(AppError::SubscriptionNotFound)
    }

    #[instrument(skip(self))]
    pub async fn history(&self, subscription_id: Uuid) -> AppResult<Vec<SubscriptionHistoryEntry>> {
        self.load(subscription_id).await?;
        self.repo.list_history(subscription_id).await
    }

    /// Cancels every subscription whose scheduled cancellation has come due.
    /// Returns the ids that were canceled; individual failures are logged.
    #[instrument(skip(self))]
    pub async fn apply_due_cancellations(&self) -> AppResult<Vec<Uuid>> {
        let now = self.clock.now();
        let due = self.repo.list_due_cancellations(now).await?;
        let actor = Actor::system();
        let mut canceled = Vec::with_capacity(due.len());

        for subscription in due {
            match self
                .cancel(
                    subscription.id,
                    None,
                    Some("Scheduled cancellation".to_string()),
                    &actor,
                )
                .await
            {
                Ok(s) => canceled.push(s.id),
                Err(e) => warn!(
                    subscription_id = %subscription.id,
                    organization_id = %subscription.organization_id,
                    error = ?e,
                    "Failed to apply scheduled cancellation"
                ),
            }
        }

        Ok(canceled)
    }
}

fn to_json(subscription: &Subscription) -> AppResult<serde_json::Value> {
    serde_json::to_value(subscription).map_err(|e| AppError::Internal(e.to_string()))
}
