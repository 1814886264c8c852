use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use depot_api::metrics::{Metrics, MetricsReporter};
use depot_api::middleware::OperatorClaims;
use depot_api::{app, AppState, AuthConfig, Services};
use depot_core::directory::{
    DirectoryResult, MerchantProfile, PickupPoint, SenderIdentity, StoreDirectory, StoreProfile,
};
use depot_core::gateway::{
    CourierCallCheck, CourierCallReply, CourierCallRequest, DeliveryOrder, GatewayResult,
    LogisticsGateway, OrderReply, StatusRecord,
};
use depot_core::memory::InMemoryRepository;
use depot_core::notify::{Notification, NotificationSink};
use depot_core::repository::{CargoRepository, ShipmentRepository};
use depot_core::{BasketItem, Delivery, ProviderId, Recipient, Shipment, ShipmentStatus};
use depot_logistics::Collaborators;
use depot_shared::Masked;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "test-secret";

/// Every provider call fails; these tests never get that far.
struct OfflineGateway;

#[async_trait]
impl LogisticsGateway for OfflineGateway {
    async fn create_courier_call(
        &self,
        _: ProviderId,
        _: &CourierCallRequest,
    ) -> GatewayResult<CourierCallReply> {
        Err("gateway offline".into())
    }

    async fn cancel_courier_call(&self, _: ProviderId, _: &str) -> GatewayResult<()> {
        Err("gateway offline".into())
    }

    async fn check_courier_call(&self, _: ProviderId, _: &str) -> GatewayResult<CourierCallCheck> {
        Err("gateway offline".into())
    }

    async fn create_order(&self, _: ProviderId, _: &DeliveryOrder) -> GatewayResult<OrderReply> {
        Err("gateway offline".into())
    }

    async fn update_order(&self, _: ProviderId, _: &DeliveryOrder) -> GatewayResult<OrderReply> {
        Err("gateway offline".into())
    }

    async fn cancel_order(&self, _: ProviderId, _: &str) -> GatewayResult<()> {
        Err("gateway offline".into())
    }

    async fn status_orders(&self, _: ProviderId, _: &[String]) -> GatewayResult<Vec<StatusRecord>> {
        Err("gateway offline".into())
    }
}

struct EmptyDirectory;

#[async_trait]
impl StoreDirectory for EmptyDirectory {
    async fn store(&self, _: Uuid) -> DirectoryResult<Option<StoreProfile>> {
        Ok(None)
    }

    async fn merchant(&self, _: Uuid) -> DirectoryResult<Option<MerchantProfile>> {
        Ok(None)
    }

    async fn pickup_point(&self, _: ProviderId, _: &str) -> DirectoryResult<Option<PickupPoint>> {
        Ok(None)
    }

    async fn marketplace_identity(&self) -> DirectoryResult<SenderIdentity> {
        Err("no marketplace identity".into())
    }
}

struct DiscardingNotifier;

#[async_trait]
impl NotificationSink for DiscardingNotifier {
    async fn notify(
        &self,
        _: Notification,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}

struct TestApp {
    router: Router,
    repo: Arc<InMemoryRepository>,
}

impl TestApp {
    fn new() -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let collaborators = Collaborators {
            cargo: repo.clone(),
            shipments: repo.clone(),
            deliveries: repo.clone(),
            directory: Arc::new(EmptyDirectory),
            gateway: Arc::new(OfflineGateway),
            notifier: Arc::new(DiscardingNotifier),
            reporter: Arc::new(MetricsReporter::new(metrics.clone())),
        };
        let state = AppState {
            services: Services::new(collaborators),
            auth: AuthConfig { secret: SECRET.to_string() },
            metrics,
            batch_limit: 50,
        };
        Self { router: app(state), repo }
    }

    fn delivery(&self, provider: ProviderId) -> Delivery {
        let delivery = Delivery::new(
            Uuid::new_v4(),
            "100234-1",
            provider,
            Recipient {
                name: Masked::from("Anna Petrova"),
                phone: Masked::from("+79990001122"),
                email: None,
            },
        );
        self.repo.insert_delivery(delivery.clone()).unwrap();
        delivery
    }

    fn shipment(&self, delivery: &Delivery, status: ShipmentStatus) -> Shipment {
        let mut shipment = Shipment::new("S-100234-1", delivery.id, Uuid::new_v4(), Uuid::new_v4());
        shipment.status = status;
        shipment.items = vec![BasketItem {
            id: Uuid::new_v4(),
            sku: "TEAPOT-1".to_string(),
            name: "Teapot".to_string(),
            quantity: 2,
            price: 150_000,
            cost: 90_000,
            weight: 1.5,
            width: 20.0,
            height: 15.0,
            length: 20.0,
        }];
        self.repo.insert_shipment(shipment.clone()).unwrap();
        shipment
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<String>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

fn token(role: &str) -> Option<String> {
    let claims = OperatorClaims {
        sub: "operator-1".to_string(),
        role: role.to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    Some(encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap())
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_operator_routes_require_token() {
    let app = TestApp::new();
    let uri = format!("/v1/cargo/{}/cancel", Uuid::new_v4());

    let (status, _) = app.call(Method::POST, &uri, None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_operator_routes_reject_other_roles() {
    let app = TestApp::new();
    let uri = format!("/v1/cargo/{}/cancel", Uuid::new_v4());

    let (status, _) = app.call(Method::POST, &uri, token("CUSTOMER"), None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_cargo_is_not_found() {
    let app = TestApp::new();
    let uri = format!("/v1/cargo/{}/cancel", Uuid::new_v4());

    let (status, body) = app.call(Method::POST, &uri, token("LOGISTICS"), None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().starts_with("cargo "));
}

#[tokio::test]
async fn test_attach_then_cancel_cargo_detaches_shipment() {
    let app = TestApp::new();
    let delivery = app.delivery(ProviderId::Cdek);
    let shipment = app.shipment(&delivery, ShipmentStatus::Assembling);

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/v1/shipments/{}/cargo", shipment.id),
            token("ADMIN"),
            Some(json!({ "provider_id": "CDEK" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let cargo_id: Uuid = serde_json::from_value(body["cargo_id"].clone()).unwrap();

    let cargo = app.repo.get_cargo(cargo_id).await.unwrap().unwrap();
    assert_eq!(cargo.provider_id, ProviderId::Cdek);
    assert!(cargo.dimensions.weight > 0.0);

    let (status, body) = app
        .call(Method::POST, &format!("/v1/cargo/{}/cancel", cargo_id), token("LOGISTICS"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_canceled"], json!(true));

    let stored = app.repo.get_shipment(shipment.id).await.unwrap().unwrap();
    assert_eq!(stored.cargo_id, None);
}

#[tokio::test]
async fn test_detach_with_explicit_null() {
    let app = TestApp::new();
    let delivery = app.delivery(ProviderId::Dpd);
    let shipment = app.shipment(&delivery, ShipmentStatus::Assembling);
    let uri = format!("/v1/shipments/{}/cargo", shipment.id);
    app.call(Method::PUT, &uri, token("LOGISTICS"), Some(json!({ "provider_id": "DPD" }))).await;

    let (status, body) = app
        .call(Method::PUT, &uri, token("LOGISTICS"), Some(json!({ "cargo_id": null })))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cargo_id"], Value::Null);
    assert_eq!(app.repo.get_shipment(shipment.id).await.unwrap().unwrap().cargo_id, None);
}

#[tokio::test]
async fn test_assignment_needs_exactly_one_target() {
    let app = TestApp::new();
    let delivery = app.delivery(ProviderId::Dpd);
    let shipment = app.shipment(&delivery, ShipmentStatus::Assembling);

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/v1/shipments/{}/cargo", shipment.id),
            token("LOGISTICS"),
            Some(json!({})),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dispatch_of_unassembled_delivery_conflicts() {
    let app = TestApp::new();
    let delivery = app.delivery(ProviderId::Cdek);
    app.shipment(&delivery, ShipmentStatus::Assembling);

    let uri = format!("/v1/deliveries/{}/dispatch", delivery.id);
    let (status, body) = app.call(Method::POST, &uri, token("LOGISTICS"), None).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("S-100234-1"));
}

#[tokio::test]
async fn test_delete_shipment_returns_no_content() {
    let app = TestApp::new();
    let delivery = app.delivery(ProviderId::Cdek);
    let shipment = app.shipment(&delivery, ShipmentStatus::New);

    let (status, _) = app
        .call(Method::DELETE, &format!("/v1/shipments/{}", shipment.id), token("LOGISTICS"), None)
        .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.repo.get_shipment(shipment.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_status_sync_validates_limit() {
    let app = TestApp::new();

    let (status, _) = app
        .call(Method::POST, "/v1/deliveries/status-sync?limit=0", token("LOGISTICS"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(Method::POST, "/v1/deliveries/status-sync", token("LOGISTICS"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["candidates"], json!(0));
}

#[tokio::test]
async fn test_metrics_are_public() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_packing_flow_through_api() {
    let app = TestApp::new();
    let delivery = app.delivery(ProviderId::Cdek);
    let shipment = app.shipment(&delivery, ShipmentStatus::Assembling);
    let item_id = shipment.items[0].id;

    let (status, package) = app
        .call(
            Method::POST,
            &format!("/v1/shipments/{}/packages", shipment.id),
            token("LOGISTICS"),
            Some(json!({ "width": 30.0, "height": 20.0, "length": 20.0, "wrapper_weight": 0.2 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let package_id = package["id"].as_str().unwrap();
    let items_uri = format!("/v1/shipments/{}/packages/{}/items", shipment.id, package_id);

    let (status, body) = app
        .call(
            Method::POST,
            &items_uri,
            token("LOGISTICS"),
            Some(json!({ "basket_item_id": item_id, "quantity": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][0]["quantity"], json!(2));

    let (status, _) = app
        .call(
            Method::POST,
            &items_uri,
            token("LOGISTICS"),
            Some(json!({ "basket_item_id": item_id, "quantity": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let remove_uri = format!("{}/{}?quantity=2", items_uri, item_id);
    let (status, body) = app.call(Method::DELETE, &remove_uri, token("LOGISTICS"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"], json!([]));
    assert_eq!(app.repo.list_packages(shipment.id).await.unwrap().len(), 1);
}
