use std::{collections::HashMap, sync::RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::cache::{CachedSubscription, SubscriptionCacheBackend},
};

/// Process-local cache backend. Entries are lost on restart and are not
/// shared between replicas.
#[derive(Default)]
pub struct InMemorySubscriptionCache {
    entries: RwLock<HashMap<Uuid, CachedSubscription>>,
}

impl InMemorySubscriptionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> AppError {
    AppError::Internal("subscription cache lock poisoned".into())
}

#[async_trait]
impl SubscriptionCacheBackend for InMemorySubscriptionCache {
    async fn get(&self, organization_id: Uuid) -> AppResult<Option<CachedSubscription>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(&organization_id).cloned())
    }

    async fn set(&self, organization_id: Uuid, entry: CachedSubscription) -> AppResult<()> {
        self.entries
            .write()
            .map_err(poisoned)?
            .insert(organization_id, entry);
        Ok(())
    }

    async fn invalidate(&self, organization_id: Uuid) -> AppResult<()> {
        self.entries
            .write()
            .map_err(poisoned)?
            .remove(&organization_id);
        Ok(())
    }

    async fn invalidate_all(&self) -> AppResult<()> {
        self.entries.write().map_err(poisoned)?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::entities::plan::PlanId, test_utils::create_test_snapshot};

    #[tokio::test]
    async fn set_get_and_invalidate() {
        let cache = InMemorySubscriptionCache::new();
        let snapshot = create_test_snapshot(PlanId::Professional, |_| {});
        let org = snapshot.organization.id;
        let entry = CachedSubscription {
            cached_at: snapshot.subscription.created_at,
            snapshot,
        };

        cache.set(org, entry.clone()).await.unwrap();
        assert_eq!(cache.get(org).await.unwrap(), Some(entry));

        cache.invalidate(org).await.unwrap();
        assert!(cache.get(org).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalidate_all_clears_every_entry() {
        let cache = InMemorySubscriptionCache::new();
        for plan in [PlanId::Essential, PlanId::Enterprise] {
            let snapshot = create_test_snapshot(plan, |_| {});
            let org = snapshot.organization.id;
            let entry = CachedSubscription {
                cached_at: snapshot.subscription.created_at,
                snapshot,
            };
            cache.set(org, entry).await.unwrap();
        }

        cache.invalidate_all().await.unwrap();
        assert!(cache.entries.read().unwrap().is_empty());
    }
}
