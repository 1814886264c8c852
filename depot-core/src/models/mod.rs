mod common;
mod cargo;
mod shipment;
mod delivery;

pub use common::{Address, Dimensions, ParseEnumError, TimeWindow};
pub use cargo::{Cargo, CargoStatus};
pub use shipment::{BasketItem, PackageItem, Shipment, ShipmentPackage, ShipmentStatus};
pub use delivery::{Delivery, DeliveryStatus, PaymentStatus, Recipient};

/// Generates `as_str` / `FromStr` for enums persisted as SCREAMING_SNAKE text.
#[macro_export]
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::models::ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::models::ParseEnumError {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}
