use async_trait::async_trait;
use depot_core::gateway::{
    CourierCallCheck, CourierCallReply, CourierCallRequest, DeliveryOrder, GatewayResult,
    LogisticsGateway, OrderReply, StatusRecord,
};
use depot_core::ProviderId;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP client of the logistics gateway, the facade that speaks every provider's native API.
///
/// Replies come back in the provider's own schema, tagged with `provider`.
/// The request timeout is the only deadline on provider calls.
#[derive(Clone)]
pub struct HttpLogisticsGateway {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct StatusQuery<'a> {
    keys: &'a [String],
}

impl HttpLogisticsGateway {
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key)?;
        key.set_sensitive(true);
        headers.insert("X-Api-Key", key);

        let client = reqwest::Client::builder()
            .user_agent("depot-logistics/0.1")
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request(&self, method: Method, provider: ProviderId, path: &str) -> RequestBuilder {
        let url = format!("{}/providers/{}/{}", self.base_url, provider.as_str(), path);
        debug!(%url, %method, "gateway request");
        self.client.request(method, url)
    }

    async fn send(request: RequestBuilder) -> GatewayResult<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "gateway call failed");
            return Err(format!("gateway responded {}: {}", status, body).into());
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> GatewayResult<T> {
        Ok(Self::send(request).await?.json::<T>().await?)
    }
}

#[async_trait]
impl LogisticsGateway for HttpLogisticsGateway {
    async fn create_courier_call(
        &self,
        provider: ProviderId,
        request: &CourierCallRequest,
    ) -> GatewayResult<CourierCallReply> {
        Self::send_json(self.request(Method::POST, provider, "courier-calls").json(request)).await
    }

    async fn cancel_courier_call(
        &self,
        provider: ProviderId,
        external_id: &str,
    ) -> GatewayResult<()> {
        let path = format!("courier-calls/{}", external_id);
        Self::send(self.request(Method::DELETE, provider, &path)).await?;
        Ok(())
    }

    async fn check_courier_call(
        &self,
        provider: ProviderId,
        external_id: &str,
    ) -> GatewayResult<CourierCallCheck> {
        let path = format!("courier-calls/{}", external_id);
        Self::send_json(self.request(Method::GET, provider, &path)).await
    }

    async fn create_order(
        &self,
        provider: ProviderId,
        order: &DeliveryOrder,
    ) -> GatewayResult<OrderReply> {
        Self::send_json(self.request(Method::POST, provider, "orders").json(order)).await
    }

    async fn update_order(
        &self,
        provider: ProviderId,
        order: &DeliveryOrder,
    ) -> GatewayResult<OrderReply> {
        let external_id = order
            .external_id
            .as_deref()
            .ok_or("order update requires an external id")?;
        let path = format!("orders/{}", external_id);
        Self::send_json(self.request(Method::PUT, provider, &path).json(order)).await
    }

    async fn cancel_order(&self, provider: ProviderId, external_id: &str) -> GatewayResult<()> {
        let path = format!("orders/{}", external_id);
        Self::send(self.request(Method::DELETE, provider, &path)).await?;
        Ok(())
    }

    async fn status_orders(
        &self,
        provider: ProviderId,
        keys: &[String],
    ) -> GatewayResult<Vec<StatusRecord>> {
        let query = StatusQuery { keys };
        Self::send_json(self.request(Method::POST, provider, "orders/statuses").json(&query)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_api_key_header() {
        let gateway = HttpLogisticsGateway::new("http://gw", "bad\nkey", Duration::from_secs(1));
        assert!(gateway.is_err());
    }

    #[test]
    fn test_builds_provider_scoped_url() {
        let gateway = HttpLogisticsGateway::new("http://gw/", "k", Duration::from_secs(1)).unwrap();
        let request = gateway
            .request(Method::GET, ProviderId::PickPoint, "courier-calls/42")
            .build()
            .unwrap();
        assert_eq!(request.url().as_str(), "http://gw/providers/PICK_POINT/courier-calls/42");
    }
}
