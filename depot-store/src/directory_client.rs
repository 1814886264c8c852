use async_trait::async_trait;
use depot_core::directory::{
    DirectoryResult, MerchantProfile, PickupPoint, SenderIdentity, StoreDirectory, StoreProfile,
};
use depot_core::ProviderId;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use uuid::Uuid;

/// Merchant service directory over HTTP. `404` means the record does not exist.
#[derive(Clone)]
pub struct HttpStoreDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStoreDirectory {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent("depot-logistics/0.1")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> DirectoryResult<Option<T>> {
        let response = self.client.get(self.endpoint(path)).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("directory GET {} failed ({}): {}", path, status, body).into());
        }

        Ok(Some(response.json::<T>().await?))
    }
}

#[async_trait]
impl StoreDirectory for HttpStoreDirectory {
    async fn store(&self, store_id: Uuid) -> DirectoryResult<Option<StoreProfile>> {
        self.get_optional(&format!("stores/{}", store_id)).await
    }

    async fn merchant(&self, merchant_id: Uuid) -> DirectoryResult<Option<MerchantProfile>> {
        self.get_optional(&format!("merchants/{}", merchant_id)).await
    }

    async fn pickup_point(
        &self,
        provider: ProviderId,
        point_id: &str,
    ) -> DirectoryResult<Option<PickupPoint>> {
        self.get_optional(&format!("providers/{}/points/{}", provider.as_str(), point_id))
            .await
    }

    async fn marketplace_identity(&self) -> DirectoryResult<SenderIdentity> {
        self.get_optional("marketplace/identity")
            .await?
            .ok_or_else(|| "marketplace identity is not configured".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let directory =
            HttpStoreDirectory::new("http://merchants.local/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(directory.endpoint("stores/1"), "http://merchants.local/api/stores/1");
    }
}
