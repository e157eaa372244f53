//! In-memory subscription, plan and organization repositories.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::{
        organization::OrganizationRepo, plans::PlanRepo, subscription::SubscriptionRepo,
    },
    domain::entities::{
        organization::OrganizationSummary,
        plan::{PlanId, PlanRecord},
        subscription::{Subscription, SubscriptionStatus, SubscriptionWithPlan},
        subscription_history::SubscriptionHistoryEntry,
    },
};

type PlanRecords = Arc<Mutex<HashMap<PlanId, PlanRecord>>>;

fn store_failure() -> AppError {
    AppError::StoreFailure("in-memory store failure".into())
}

// ============================================================================
// InMemorySubscriptionRepo
// ============================================================================

/// Subscription store with the same ordering and atomicity rules as the
/// Postgres adapter: at most one open subscription per organization, and a
/// subscription write lands together with its history entry or not at all.
#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    subscriptions: Mutex<Vec<Subscription>>,
    history: Mutex<Vec<SubscriptionHistoryEntry>>,
    organizations: Mutex<HashMap<Uuid, OrganizationSummary>>,
    plans: PlanRecords,
    snapshot_reads: AtomicUsize,
    failing: AtomicBool,
    failing_writes: AtomicBool,
}

impl InMemorySubscriptionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscriptions(
        subscriptions: Vec<Subscription>,
        organizations: Vec<OrganizationSummary>,
    ) -> Self {
        let repo = Self::new();
        for org in organizations {
            repo.insert_organization(org);
        }
        for sub in subscriptions {
            repo.insert_subscription(sub);
        }
        repo
    }

    /// Seeds subscription, organization and plan record from each snapshot.
    pub fn with_snapshots(snapshots: Vec<SubscriptionWithPlan>) -> Self {
        let repo = Self::new();
        for snapshot in snapshots {
            repo.insert_organization(snapshot.organization);
            if let Some(plan) = snapshot.plan {
                repo.plans.lock().unwrap().insert(plan.plan_id, plan);
            }
            repo.insert_subscription(snapshot.subscription);
        }
        repo
    }

    pub fn insert_organization(&self, organization: OrganizationSummary) {
        self.organizations
            .lock()
            .unwrap()
            .insert(organization.id, organization);
    }

    /// Seeds a subscription without touching history or the open check.
    pub fn insert_subscription(&self, subscription: Subscription) {
        self.subscriptions.lock().unwrap().push(subscription);
    }

    /// Number of `get_snapshot` calls that reached the store.
    pub fn snapshot_reads(&self) -> usize {
        self.snapshot_reads.load(Ordering::SeqCst)
    }

    /// While set, every call returns a store failure and writes nothing.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// While set, only subscription writes fail. Reads keep working.
    pub fn set_failing_writes(&self, failing: bool) {
        self.failing_writes.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> AppResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(store_failure());
        }
        Ok(())
    }

    fn check_write(&self) -> AppResult<()> {
        self.check()?;
        if self.failing_writes.load(Ordering::SeqCst) {
            return Err(store_failure());
        }
        Ok(())
    }

    fn has_other_open(subs: &[Subscription], subscription: &Subscription) -> bool {
        subscription.status != SubscriptionStatus::Canceled
            && subs.iter().any(|s| {
                s.organization_id == subscription.organization_id
                    && s.id != subscription.id
                    && s.status != SubscriptionStatus::Canceled
            })
    }
}

#[async_trait]
impl SubscriptionRepo for InMemorySubscriptionRepo {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>> {
        self.check()?;
        let subs = self.subscriptions.lock().unwrap();
        Ok(subs.iter().find(|s| s.id == id).cloned())
    }

    async fn get_open_by_organization(
        &self,
        organization_id: Uuid,
    ) -> AppResult<Option<Subscription>> {
        self.check()?;
        let subs = self.subscriptions.lock().unwrap();
        Ok(subs
            .iter()
            .find(|s| s.organization_id == organization_id && s.status != SubscriptionStatus::Canceled)
            .cloned())
    }

    async fn get_snapshot(&self, organization_id: Uuid) -> AppResult<Option<SubscriptionWithPlan>> {
        self.snapshot_reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;

        let Some(organization) = self
            .organizations
            .lock()
            .unwrap()
            .get(&organization_id)
            .cloned()
        else {
            return Ok(None);
        };

        let subscription = {
            let subs = self.subscriptions.lock().unwrap();
            subs.iter()
                .filter(|s| s.organization_id == organization_id)
                .max_by_key(|s| (s.status != SubscriptionStatus::Canceled, s.created_at))
                .cloned()
        };
        let Some(subscription) = subscription else {
            return Ok(None);
        };

        let plan = self.plans.lock().unwrap().get(&subscription.plan_id).cloned();
        Ok(Some(SubscriptionWithPlan {
            subscription,
            plan,
            organization,
        }))
    }

    async fn insert_with_history(
        &self,
        subscription: &Subscription,
        entry: &SubscriptionHistoryEntry,
    ) -> AppResult<()> {
        self.check_write()?;
        let mut subs = self.subscriptions.lock().unwrap();
        if subs.iter().any(|s| s.id == subscription.id) {
            return Err(AppError::InvalidInput(
                "A record with this value already exists".into(),
            ));
        }
        if Self::has_other_open(&subs, subscription) {
            return Err(AppError::InvalidInput(
                "Organization already has an open subscription".into(),
            ));
        }
        subs.push(subscription.clone());
        self.history.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn update_with_history(
        &self,
        subscription: &Subscription,
        entry: &SubscriptionHistoryEntry,
    ) -> AppResult<()> {
        self.check_write()?;
        let mut subs = self.subscriptions.lock().unwrap();
        if Self::has_other_open(&subs, subscription) {
            return Err(AppError::InvalidInput(
                "Organization already has an open subscription".into(),
            ));
        }
        let existing = subs
            .iter_mut()
            .find(|s| s.id == subscription.id)
            .ok_or(AppError::SubscriptionNotFound)?;
        *existing = subscription.clone();
        self.history.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn list_history(&self, subscription_id: Uuid) -> AppResult<Vec<SubscriptionHistoryEntry>> {
        self.check()?;
        let history = self.history.lock().unwrap();
        let mut entries: Vec<SubscriptionHistoryEntry> = history
            .iter()
            .rev()
            .filter(|e| e.subscription_id == subscription_id)
            .cloned()
            .collect();
        // Stable sort keeps later writes first within the same instant.
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    async fn list_due_cancellations(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
        self.check()?;
        let subs = self.subscriptions.lock().unwrap();
        let mut due: Vec<Subscription> = subs
            .iter()
            .filter(|s| {
                s.status != SubscriptionStatus::Canceled && s.cancel_at.is_some_and(|at| at <= now)
            })
            .cloned()
            .collect();
        due.sort_by_key(|s| s.cancel_at);
        Ok(due)
    }

    async fn list_current(&self) -> AppResult<Vec<Subscription>> {
        self.check()?;
        let subs = self.subscriptions.lock().unwrap();
        let mut current: Vec<Subscription> =
            subs.iter().filter(|s| s.is_current()).cloned().collect();
        current.sort_by_key(|s| s.created_at);
        Ok(current)
    }
}

// ============================================================================
// InMemoryPlanRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryPlanRepo {
    records: PlanRecords,
}

impl InMemoryPlanRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<PlanRecord>) -> Self {
        let repo = Self::new();
        {
            let mut map = repo.records.lock().unwrap();
            for record in records {
                map.insert(record.plan_id, record);
            }
        }
        repo
    }

    /// Plan repo backed by the same records the subscription repo joins
    /// into snapshots.
    pub fn sharing(subscriptions: &InMemorySubscriptionRepo) -> Self {
        Self {
            records: subscriptions.plans.clone(),
        }
    }
}

#[async_trait]
impl PlanRepo for InMemoryPlanRepo {
    async fn get(&self, plan_id: PlanId) -> AppResult<Option<PlanRecord>> {
        Ok(self.records.lock().unwrap().get(&plan_id).cloned())
    }

    async fn list(&self) -> AppResult<Vec<PlanRecord>> {
        let mut records: Vec<PlanRecord> = self.records.lock().unwrap().values().cloned().collect();
        records.sort_by_key(|r| r.plan_id);
        Ok(records)
    }

    async fn upsert(&self, record: &PlanRecord) -> AppResult<PlanRecord> {
        let mut records = self.records.lock().unwrap();
        let stored = match records.get(&record.plan_id) {
            Some(existing) => PlanRecord {
                created_at: existing.created_at,
                ..record.clone()
            },
            None => PlanRecord {
                created_at: record.created_at.or_else(|| Some(Utc::now())),
                ..record.clone()
            },
        };
        records.insert(stored.plan_id, stored.clone());
        Ok(stored)
    }
}

// ============================================================================
// InMemoryOrganizationRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryOrganizationRepo {
    organizations: Mutex<HashMap<Uuid, OrganizationSummary>>,
}

impl InMemoryOrganizationRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_organizations(organizations: Vec<OrganizationSummary>) -> Self {
        let repo = Self::new();
        for org in organizations {
            repo.insert(org);
        }
        repo
    }

    pub fn insert(&self, organization: OrganizationSummary) {
        self.organizations
            .lock()
            .unwrap()
            .insert(organization.id, organization);
    }
}

#[async_trait]
impl OrganizationRepo for InMemoryOrganizationRepo {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<OrganizationSummary>> {
        Ok(self.organizations.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_external_id(&self, external_id: &str) -> AppResult<Option<OrganizationSummary>> {
        Ok(self
            .organizations
            .lock()
            .unwrap()
            .values()
            .find(|o| o.external_id == external_id)
            .cloned())
    }
}
