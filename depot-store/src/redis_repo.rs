use async_trait::async_trait;
use depot_core::directory::{
    DirectoryResult, MerchantProfile, PickupPoint, SenderIdentity, StoreDirectory, StoreProfile,
};
use depot_core::ProviderId;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, Box<dyn std::error::Error + Send + Sync>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw = serde_json::to_string(value)?;
        conn.set_ex::<_, _, ()>(key, raw, ttl_seconds).await?;
        Ok(())
    }
}

/// Read-through cache over the merchant directory.
///
/// Redis is an optimisation only: any cache error is logged and the inner
/// directory is asked instead. Absent records are not cached.
pub struct CachedStoreDirectory {
    inner: Arc<dyn StoreDirectory>,
    redis: RedisClient,
    ttl_seconds: u64,
}

impl CachedStoreDirectory {
    pub fn new(inner: Arc<dyn StoreDirectory>, redis: RedisClient, ttl_seconds: u64) -> Self {
        Self { inner, redis, ttl_seconds }
    }

    async fn cached<T, F>(&self, key: String, load: F) -> DirectoryResult<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: std::future::Future<Output = DirectoryResult<Option<T>>> + Send,
    {
        match self.redis.get_json::<T>(&key).await {
            Ok(Some(hit)) => {
                debug!(key = %key, "directory cache hit");
                return Ok(Some(hit));
            }
            Ok(None) => {}
            Err(e) => warn!(key = %key, "directory cache read failed: {}", e),
        }

        let loaded = load.await?;
        if let Some(value) = &loaded {
            if let Err(e) = self.redis.set_json(&key, value, self.ttl_seconds).await {
                warn!(key = %key, "directory cache write failed: {}", e);
            }
        }
        Ok(loaded)
    }
}

#[async_trait]
impl StoreDirectory for CachedStoreDirectory {
    async fn store(&self, store_id: Uuid) -> DirectoryResult<Option<StoreProfile>> {
        self.cached(format!("directory:store:{}", store_id), self.inner.store(store_id))
            .await
    }

    async fn merchant(&self, merchant_id: Uuid) -> DirectoryResult<Option<MerchantProfile>> {
        self.cached(format!("directory:merchant:{}", merchant_id), self.inner.merchant(merchant_id))
            .await
    }

    async fn pickup_point(
        &self,
        provider: ProviderId,
        point_id: &str,
    ) -> DirectoryResult<Option<PickupPoint>> {
        self.cached(
            format!("directory:point:{}:{}", provider.as_str(), point_id),
            self.inner.pickup_point(provider, point_id),
        )
        .await
    }

    async fn marketplace_identity(&self) -> DirectoryResult<SenderIdentity> {
        let inner = &self.inner;
        let identity = self
            .cached("directory:marketplace".to_string(), async move {
                inner.marketplace_identity().await.map(Some)
            })
            .await?;
        identity.ok_or_else(|| "marketplace identity is not configured".into())
    }
}
