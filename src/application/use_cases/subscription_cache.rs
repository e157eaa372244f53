use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    application::{
        ports::{
            cache::{CachedSubscription, SubscriptionCacheBackend},
            clock::Clock,
        },
        use_cases::subscription::SubscriptionRepo,
    },
    domain::entities::subscription::SubscriptionWithPlan,
};

pub const DEFAULT_TTL_SECS: i64 = 15 * 60;

/// Organization-keyed, time-boxed view over subscription snapshots.
///
/// Entries are last-writer-wins with no versioning. A backend failure on read
/// or write degrades to a store read; it never fails the lookup.
pub struct SubscriptionCache {
    backend: Arc<dyn SubscriptionCacheBackend>,
    repo: Arc<dyn SubscriptionRepo>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl SubscriptionCache {
    pub fn new(
        backend: Arc<dyn SubscriptionCacheBackend>,
        repo: Arc<dyn SubscriptionRepo>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            backend,
            repo,
            clock,
            ttl,
        }
    }

    fn is_fresh(&self, entry: &CachedSubscription) -> bool {
        self.clock.now() - entry.cached_at < self.ttl
    }

    pub async fn get(
        &self,
        organization_id: Uuid,
        force_refresh: bool,
    ) -> AppResult<Option<SubscriptionWithPlan>> {
        if !force_refresh {
            match self.backend.get(organization_id).await {
                Ok(Some(entry)) if self.is_fresh(&entry) => {
                    debug!(organization_id = %organization_id, "Subscription cache hit");
                    return Ok(Some(entry.snapshot));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(organization_id = %organization_id, error = %e, "Subscription cache read failed");
                }
            }
        }

        let snapshot = self.repo.get_snapshot(organization_id).await?;

        if let Some(snapshot) = &snapshot {
            let entry = CachedSubscription {
                snapshot: snapshot.clone(),
                cached_at: self.clock.now(),
            };
            if let Err(e) = self.backend.set(organization_id, entry).await {
                warn!(organization_id = %organization_id, error = %e, "Subscription cache write failed");
            }
        }

        Ok(snapshot)
    }

    pub async fn invalidate(&self, organization_id: Uuid) -> AppResult<()> {
        debug!(organization_id = %organization_id, "Invalidating subscription cache entry");
        self.backend.invalidate(organization_id).await
    }

    pub async fn invalidate_all(&self) -> AppResult<()> {
        self.backend.invalidate_all().await
    }
}
