use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{app_error::AppResult, domain::entities::subscription::SubscriptionWithPlan};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedSubscription {
    pub snapshot: SubscriptionWithPlan,
    pub cached_at: DateTime<Utc>,
}

/// Storage behind the subscription cache. Backends only hold entries; expiry
/// is decided by the caller from `cached_at`.
#[async_trait]
pub trait SubscriptionCacheBackend: Send + Sync {
    async fn get(&self, organization_id: Uuid) -> AppResult<Option<CachedSubscription>>;
    async fn set(&self, organization_id: Uuid, entry: CachedSubscription) -> AppResult<()>;
    async fn invalidate(&self, organization_id: Uuid) -> AppResult<()>;
    async fn invalidate_all(&self) -> AppResult<()>;
}
