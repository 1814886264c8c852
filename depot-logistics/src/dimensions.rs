use depot_core::{Dimensions, Shipment, ShipmentPackage};

/// Bottom-up weight/volume/box estimation: item -> package -> shipment -> cargo.
pub struct DimensionAggregator;

impl DimensionAggregator {
    /// Aggregate child boxes into one box of the same total volume.
    ///
    /// If no child side is longer than the cube root of the total volume the
    /// result is a cube. Otherwise the longest side becomes `length` and the other
    /// two sides are `sqrt(volume / length)`.
    pub fn recalc<I>(children: I) -> Dimensions
    where
        I: IntoIterator<Item = Dimensions>,
    {
        Self::recalc_counted(children.into_iter().map(|d| (d, 1)))
    }

    /// Same as [`recalc`](Self::recalc) with each child repeated `count` times.
    pub fn recalc_counted<I>(children: I) -> Dimensions
    where
        I: IntoIterator<Item = (Dimensions, u32)>,
    {
        let mut weight = 0.0;
        let mut volume = 0.0;
        let mut max_side: f64 = 0.0;

        for (child, count) in children {
            if count == 0 {
                continue;
            }
            let count = f64::from(count);
            weight += child.weight * count;
            volume += child.volume() * count;
            max_side = max_side.max(child.max_side());
        }

        if volume <= 0.0 {
            return Dimensions { weight, ..Dimensions::ZERO };
        }

        let avg_side = volume.cbrt();
        if max_side <= avg_side {
            return Dimensions::new(avg_side, avg_side, avg_side, weight);
        }

        let other = (volume / max_side).sqrt();
        Dimensions::new(other, other, max_side, weight)
    }

    /// Wrapper weight plus the weight of everything packed.
    pub fn package_weight(package: &ShipmentPackage, shipment: &Shipment) -> f64 {
        package.wrapper_weight
            + package
                .items
                .iter()
                .filter_map(|packed| {
                    shipment
                        .item(packed.basket_item_id)
                        .map(|item| item.weight * f64::from(packed.quantity))
                })
                .sum::<f64>()
    }

    /// Estimated box of a shipment nobody has packed yet, built from its items.
    pub fn unpacked_box(shipment: &Shipment) -> Dimensions {
        Self::recalc_counted(shipment.items.iter().map(|i| (i.unit_box(), i.quantity)))
    }

    /// The boxes a shipment contributes: its packages, or one estimated box when unpackaged.
    pub fn shipment_boxes(shipment: &Shipment, packages: &[ShipmentPackage]) -> Vec<Dimensions> {
        if !packages.is_empty() {
            return packages.iter().map(|p| p.dimensions).collect();
        }
        if shipment.items.is_empty() {
            return Vec::new();
        }
        vec![Self::unpacked_box(shipment)]
    }

    pub fn shipment(shipment: &Shipment, packages: &[ShipmentPackage]) -> Dimensions {
        Self::recalc(Self::shipment_boxes(shipment, packages))
    }

    /// Cargo dimensions straight from the packages of all its shipments.
    pub fn cargo(contents: &[(Shipment, Vec<ShipmentPackage>)]) -> Dimensions {
        Self::recalc(
            contents
                .iter()
                .flat_map(|(shipment, packages)| Self::shipment_boxes(shipment, packages)),
        )
    }
}
