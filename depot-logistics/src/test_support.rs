//! Fakes for the external collaborators plus a seeded fixture.

use async_trait::async_trait;
use chrono::Weekday;
use depot_core::directory::{
    DirectoryResult, MerchantProfile, PickupPoint, PickupWindow, SenderIdentity, StoreDirectory,
    StoreProfile,
};
use depot_core::gateway::{
    CourierCallCheck, CourierCallReply, CourierCallRequest, DeliveryOrder, GatewayResult,
    GenericCourierReply, GenericOrderReply, LogisticsGateway, OrderReply, StatusRecord,
};
use depot_core::memory::InMemoryRepository;
use depot_core::notify::{Notification, NotificationSink};
use depot_core::observability::ErrorReporter;
use depot_core::{
    Address, BasketItem, Delivery, ProviderId, Recipient, Shipment, ShipmentStatus, TimeWindow,
};
use depot_shared::Masked;
use std::collections::{HashMap, VecDeque};
use std::fmt::Display;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::Collaborators;

#[derive(Debug, Clone)]
pub enum GatewayCall {
    CreateCourierCall(CourierCallRequest),
    CancelCourierCall(String),
    CheckCourierCall(String),
    CreateOrder(DeliveryOrder),
    UpdateOrder(DeliveryOrder),
    CancelOrder(String),
    StatusOrders(ProviderId, Vec<String>),
}

/// Scripted gateway: replies are queued per operation, every call is recorded.
#[derive(Default)]
pub struct FakeGateway {
    courier_replies: Mutex<VecDeque<Result<CourierCallReply, String>>>,
    order_replies: Mutex<VecDeque<Result<OrderReply, String>>>,
    status_replies: Mutex<HashMap<ProviderId, Result<Vec<StatusRecord>, String>>>,
    check_reply: Mutex<Option<CourierCallCheck>>,
    fail_cancellations: Mutex<bool>,
    calls: Mutex<Vec<GatewayCall>>,
}

impl FakeGateway {
    pub fn push_courier_reply(&self, reply: Result<CourierCallReply, String>) {
        self.courier_replies.lock().unwrap().push_back(reply);
    }

    pub fn courier_ok(&self, external_id: &str) {
        self.push_courier_reply(Ok(CourierCallReply::Generic(GenericCourierReply {
            success: true,
            external_id: Some(external_id.to_string()),
            diagnostic: None,
            message: None,
        })));
    }

    pub fn courier_rejected(&self, message: &str) {
        self.push_courier_reply(Ok(CourierCallReply::Generic(GenericCourierReply {
            success: false,
            external_id: None,
            diagnostic: None,
            message: Some(message.to_string()),
        })));
    }

    pub fn push_order_reply(&self, reply: Result<OrderReply, String>) {
        self.order_replies.lock().unwrap().push_back(reply);
    }

    pub fn order_ok(&self, external_id: &str, places: Vec<depot_core::gateway::PlaceCode>) {
        self.push_order_reply(Ok(OrderReply::Generic(GenericOrderReply {
            success: true,
            external_id: Some(external_id.to_string()),
            tracknumber: Some(format!("TN-{}", external_id)),
            barcode: Some(format!("BC-{}", external_id)),
            message: None,
            places,
        })));
    }

    pub fn order_rejected(&self, message: &str) {
        self.push_order_reply(Ok(OrderReply::Generic(GenericOrderReply {
            success: false,
            external_id: None,
            tracknumber: None,
            barcode: None,
            message: Some(message.to_string()),
            places: vec![],
        })));
    }

    pub fn set_status_reply(&self, provider: ProviderId, reply: Result<Vec<StatusRecord>, String>) {
        self.status_replies.lock().unwrap().insert(provider, reply);
    }

    pub fn set_check_reply(&self, reply: CourierCallCheck) {
        *self.check_reply.lock().unwrap() = Some(reply);
    }

    pub fn fail_cancellations(&self) {
        *self.fail_cancellations.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl LogisticsGateway for FakeGateway {
    async fn create_courier_call(
        &self,
        _provider: ProviderId,
        request: &CourierCallRequest,
    ) -> GatewayResult<CourierCallReply> {
        self.record(GatewayCall::CreateCourierCall(request.clone()));
        match self.courier_replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(e.into()),
            None => Err("no scripted courier reply".into()),
        }
    }

    async fn cancel_courier_call(
        &self,
        _provider: ProviderId,
        external_id: &str,
    ) -> GatewayResult<()> {
        self.record(GatewayCall::CancelCourierCall(external_id.to_string()));
        if *self.fail_cancellations.lock().unwrap() {
            return Err("provider unavailable".into());
        }
        Ok(())
    }

    async fn check_courier_call(
        &self,
        _provider: ProviderId,
        external_id: &str,
    ) -> GatewayResult<CourierCallCheck> {
        self.record(GatewayCall::CheckCourierCall(external_id.to_string()));
        self.check_reply
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| "no scripted check reply".into())
    }

    async fn create_order(
        &self,
        _provider: ProviderId,
        order: &DeliveryOrder,
    ) -> GatewayResult<OrderReply> {
        self.record(GatewayCall::CreateOrder(order.clone()));
        match self.order_replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(e.into()),
            None => Err("no scripted order reply".into()),
        }
    }

    async fn update_order(
        &self,
        _provider: ProviderId,
        order: &DeliveryOrder,
    ) -> GatewayResult<OrderReply> {
        self.record(GatewayCall::UpdateOrder(order.clone()));
        match self.order_replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(e.into()),
            None => Err("no scripted order reply".into()),
        }
    }

    async fn cancel_order(&self, _provider: ProviderId, external_id: &str) -> GatewayResult<()> {
        self.record(GatewayCall::CancelOrder(external_id.to_string()));
        if *self.fail_cancellations.lock().unwrap() {
            return Err("provider unavailable".into());
        }
        Ok(())
    }

    async fn status_orders(
        &self,
        provider: ProviderId,
        keys: &[String],
    ) -> GatewayResult<Vec<StatusRecord>> {
        self.record(GatewayCall::StatusOrders(provider, keys.to_vec()));
        match self.status_replies.lock().unwrap().get(&provider) {
            Some(Ok(records)) => Ok(records.clone()),
            Some(Err(e)) => Err(e.clone().into()),
            None => Ok(Vec::new()),
        }
    }
}

#[derive(Default)]
pub struct FakeDirectory {
    pub stores: Mutex<HashMap<Uuid, StoreProfile>>,
    pub merchants: Mutex<HashMap<Uuid, MerchantProfile>>,
    pub points: Mutex<HashMap<String, PickupPoint>>,
}

pub fn address(city: &str) -> Address {
    Address {
        country_code: "RU".to_string(),
        region: None,
        city: city.to_string(),
        line: "Lenina 1".to_string(),
        postal_code: Some("101000".to_string()),
        comment: None,
    }
}

pub fn marketplace_identity() -> SenderIdentity {
    SenderIdentity {
        legal_name: "Marketplace LLC".to_string(),
        tax_id: Some("7700000000".to_string()),
        contact_name: "Dispatch desk".to_string(),
        phone: Masked::from("+74950000000"),
        email: Some("dispatch@marketplace.test".to_string()),
        address: address("Moscow"),
    }
}

#[async_trait]
impl StoreDirectory for FakeDirectory {
    async fn store(&self, store_id: Uuid) -> DirectoryResult<Option<StoreProfile>> {
        Ok(self.stores.lock().unwrap().get(&store_id).cloned())
    }

    async fn merchant(&self, merchant_id: Uuid) -> DirectoryResult<Option<MerchantProfile>> {
        Ok(self.merchants.lock().unwrap().get(&merchant_id).cloned())
    }

    async fn pickup_point(
        &self,
        _provider: ProviderId,
        point_id: &str,
    ) -> DirectoryResult<Option<PickupPoint>> {
        Ok(self.points.lock().unwrap().get(point_id).cloned())
    }

    async fn marketplace_identity(&self) -> DirectoryResult<SenderIdentity> {
        Ok(marketplace_identity())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(
        &self,
        notification: Notification,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    pub reports: Mutex<Vec<(String, String)>>,
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, context: &str, error: &dyn Display) {
        self.reports.lock().unwrap().push((context.to_string(), error.to_string()));
    }
}

pub struct Fixture {
    pub repo: Arc<InMemoryRepository>,
    pub gateway: Arc<FakeGateway>,
    pub directory: Arc<FakeDirectory>,
    pub notifier: Arc<RecordingNotifier>,
    pub reporter: Arc<RecordingReporter>,
    pub merchant_id: Uuid,
    pub merchant_user_id: Uuid,
    pub store_id: Uuid,
}

impl Fixture {
    /// One merchant with one store open for pickup 10:00-18:00 every weekday.
    pub fn new() -> Self {
        let merchant_id = Uuid::new_v4();
        let merchant_user_id = Uuid::new_v4();
        let store_id = Uuid::new_v4();

        let directory = FakeDirectory::default();
        directory.merchants.lock().unwrap().insert(
            merchant_id,
            MerchantProfile {
                id: merchant_id,
                legal_name: "Teapots Ltd".to_string(),
                tax_id: Some("1650000000".to_string()),
                email: Some("ops@teapots.test".to_string()),
                contact_user_id: Some(merchant_user_id),
            },
        );
        let weekdays = [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri];
        directory.stores.lock().unwrap().insert(
            store_id,
            StoreProfile {
                id: store_id,
                merchant_id,
                name: "Kazan warehouse".to_string(),
                address: address("Kazan"),
                contact_name: "Rustam".to_string(),
                phone: Masked::from("+78430000000"),
                pickup_windows: weekdays
                    .into_iter()
                    .filter_map(|weekday| {
                        Some(PickupWindow {
                            provider_id: None,
                            weekday,
                            window: TimeWindow::hours(10, 18)?,
                        })
                    })
                    .collect(),
            },
        );

        Self {
            repo: Arc::new(InMemoryRepository::new()),
            gateway: Arc::new(FakeGateway::default()),
            directory: Arc::new(directory),
            notifier: Arc::new(RecordingNotifier::default()),
            reporter: Arc::new(RecordingReporter::default()),
            merchant_id,
            merchant_user_id,
            store_id,
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            cargo: self.repo.clone(),
            shipments: self.repo.clone(),
            deliveries: self.repo.clone(),
            directory: self.directory.clone(),
            gateway: self.gateway.clone(),
            notifier: self.notifier.clone(),
            reporter: self.reporter.clone(),
        }
    }

    pub fn delivery(&self, number: &str, provider: ProviderId) -> Delivery {
        let mut delivery = Delivery::new(
            Uuid::new_v4(),
            number,
            provider,
            Recipient {
                name: Masked::from("Anna Petrova"),
                phone: Masked::from("+79990001122"),
                email: None,
            },
        );
        delivery.address = Some(address("Moscow"));
        self.repo.insert_delivery(delivery.clone()).unwrap();
        delivery
    }

    /// A shipment with one basket line of `quantity` units weighing `unit_weight` each.
    pub fn shipment(
        &self,
        number: &str,
        delivery: &Delivery,
        status: ShipmentStatus,
        unit_weight: f64,
        quantity: u32,
    ) -> Shipment {
        let mut shipment = Shipment::new(number, delivery.id, self.merchant_id, self.store_id);
        shipment.status = status;
        shipment.items = vec![BasketItem {
            id: Uuid::new_v4(),
            sku: format!("SKU-{}", number),
            name: "Teapot".to_string(),
            quantity,
            price: 150_000,
            cost: 90_000,
            weight: unit_weight,
            width: 10.0,
            height: 10.0,
            length: 10.0,
        }];
        self.repo.insert_shipment(shipment.clone()).unwrap();
        shipment
    }
}
