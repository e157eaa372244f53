use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use uuid::Uuid;

use super::InfraError;
use crate::{
    app_error::{AppError, AppResult},
    application::ports::cache::{CachedSubscription, SubscriptionCacheBackend},
};

const KEY_PREFIX: &str = "subscription:";

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::StoreFailure(format!("cache: {err}"))
    }
}

/// Shared cache backend for multi-replica deployments. Values are JSON and
/// expire in Redis after the configured TTL as well.
#[derive(Clone)]
pub struct RedisSubscriptionCache {
    manager: ConnectionManager,
    ttl_secs: u64,
}

impl RedisSubscriptionCache {
    pub async fn new(redis_url: &str, ttl_secs: u64) -> Result<Self, InfraError> {
        let client = redis::Client::open(redis_url).map_err(InfraError::RedisConnection)?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(InfraError::RedisConnection)?;
        Ok(Self {
            manager,
            ttl_secs: ttl_secs.max(1),
        })
    }

    fn key(organization_id: Uuid) -> String {
        format!("{KEY_PREFIX}{organization_id}")
    }
}

#[async_trait]
impl SubscriptionCacheBackend for RedisSubscriptionCache {
    async fn get(&self, organization_id: Uuid) -> AppResult<Option<CachedSubscription>> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn.get(Self::key(organization_id)).await?;

        match raw {
            Some(value) => match serde_json::from_str(&value) {
                Ok(entry) => Ok(Some(entry)),
                Err(e) => {
                    tracing::warn!(
                        organization_id = %organization_id,
                        error = %e,
                        "Discarding unreadable subscription cache entry"
                    );
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn set(&self, organization_id: Uuid, entry: CachedSubscription) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let value =
            serde_json::to_string(&entry).map_err(|e| AppError::Internal(e.to_string()))?;
        let _: () = conn
            .set_ex(Self::key(organization_id), value, self.ttl_secs)
            .await?;
        Ok(())
    }

    async fn invalidate(&self, organization_id: Uuid) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.del(Self::key(organization_id)).await?;
        Ok(())
    }

    async fn invalidate_all(&self) -> AppResult<()> {
        let mut scan_conn = self.manager.clone();
        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter = scan_conn
                .scan_match::<_, String>(format!("{KEY_PREFIX}*"))
                .await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.manager.clone();
        let _: () = conn.del(keys).await?;
        Ok(())
    }
}
