use async_trait::async_trait;
use chrono::Weekday;
use depot_shared::Masked;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Address, TimeWindow};
use crate::provider::ProviderId;

pub type DirectoryResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Weekly pickup slot configured for a store. `provider_id: None` applies to any provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PickupWindow {
    pub provider_id: Option<ProviderId>,
    pub weekday: Weekday,
    pub window: TimeWindow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreProfile {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub name: String,
    pub address: Address,
    pub contact_name: String,
    pub phone: Masked<String>,
    #[serde(default)]
    pub pickup_windows: Vec<PickupWindow>,
}

impl StoreProfile {
    /// Pickup window for a weekday, preferring the provider-specific one.
    pub fn pickup_window(&self, weekday: Weekday, provider: ProviderId) -> Option<TimeWindow> {
        let for_day = || self.pickup_windows.iter().filter(move |w| w.weekday == weekday);

        for_day()
            .find(|w| w.provider_id == Some(provider))
            .or_else(|| for_day().find(|w| w.provider_id.is_none()))
            .map(|w| w.window)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantProfile {
    pub id: Uuid,
    pub legal_name: String,
    pub tax_id: Option<String>,
    pub email: Option<String>,
    /// Account that receives merchant-facing reminders.
    pub contact_user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupPoint {
    pub id: String,
    pub provider_id: ProviderId,
    pub address: Address,
}

/// Who hands the goods over, as shown to the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SenderIdentity {
    pub legal_name: String,
    pub tax_id: Option<String>,
    pub contact_name: String,
    pub phone: Masked<String>,
    pub email: Option<String>,
    pub address: Address,
}

impl SenderIdentity {
    pub fn from_store(store: &StoreProfile, merchant: &MerchantProfile) -> Self {
        Self {
            legal_name: merchant.legal_name.clone(),
            tax_id: merchant.tax_id.clone(),
            contact_name: store.contact_name.clone(),
            phone: store.phone.clone(),
            email: merchant.email.clone(),
            address: store.address.clone(),
        }
    }
}

/// Store/merchant directory owned by the merchant service.
#[async_trait]
pub trait StoreDirectory: Send + Sync {
    async fn store(&self, store_id: Uuid) -> DirectoryResult<Option<StoreProfile>>;

    async fn merchant(&self, merchant_id: Uuid) -> DirectoryResult<Option<MerchantProfile>>;

    async fn pickup_point(
        &self,
        provider: ProviderId,
        point_id: &str,
    ) -> DirectoryResult<Option<PickupPoint>>;

    /// The marketplace's own identity, used when several merchants share a delivery.
    async fn marketplace_identity(&self) -> DirectoryResult<SenderIdentity>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(windows: Vec<PickupWindow>) -> StoreProfile {
        StoreProfile {
            id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            name: "Main warehouse".to_string(),
            address: Address::default(),
            contact_name: "Ivan".to_string(),
            phone: Masked::from("+70000000000"),
            pickup_windows: windows,
        }
    }

    #[test]
    fn test_provider_specific_window_wins() {
        let store = store_with(vec![
            PickupWindow {
                provider_id: None,
                weekday: Weekday::Mon,
                window: TimeWindow::hours(9, 18).unwrap(),
            },
            PickupWindow {
                provider_id: Some(ProviderId::Cdek),
                weekday: Weekday::Mon,
                window: TimeWindow::hours(12, 15).unwrap(),
            },
        ]);

        assert_eq!(store.pickup_window(Weekday::Mon, ProviderId::Cdek), TimeWindow::hours(12, 15));
        assert_eq!(store.pickup_window(Weekday::Mon, ProviderId::Dpd), TimeWindow::hours(9, 18));
        assert_eq!(store.pickup_window(Weekday::Tue, ProviderId::Dpd), None);
    }
}
