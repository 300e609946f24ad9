use serde::Serialize;

use super::value_objects::{ProductItem, UnitType};

// ============================================================================
// Price Reconstruction
// ============================================================================
//
// Only the discounted unit price and the discount percentage are stored.
// The pre-discount price, the discount amount and the totals are derived
// from those two fields, the same way for every status.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinePricing {
    pub quantity: u32,
    pub unit_price: f64,
    pub discount: f64,
    pub original_unit_price: f64,
    pub discount_amount: f64,
    pub subtotal: f64,
    pub total: f64,
}

impl LinePricing {
    pub fn for_item(item: &ProductItem) -> Self {
        let quantity = f64::from(item.quantity());
        let unit_price = item.unit_price();
        let original_unit_price = unit_price / (1.0 - item.discount() / 100.0);

        Self {
            quantity: item.quantity(),
            unit_price,
            discount: item.discount(),
            original_unit_price,
            discount_amount: (original_unit_price - unit_price) * quantity,
            subtotal: original_unit_price * quantity,
            total: unit_price * quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingBreakdown {
    pub per_item: Vec<LinePricing>,
    pub subtotal: f64,
    pub total_discount: f64,
    pub total: f64,
    /// Summed quantity of items sold by the kilo.
    pub total_kilos: u64,
}

/// Derive per-line and aggregate amounts for a delivery's items.
pub fn reconstruct_pricing(items: &[ProductItem]) -> PricingBreakdown {
    let per_item: Vec<LinePricing> = items.iter().map(LinePricing::for_item).collect();

    let subtotal: f64 = per_item.iter().map(|line| line.subtotal).sum();
    let total_discount: f64 = per_item.iter().map(|line| line.discount_amount).sum();
    let total_kilos = items
        .iter()
        .filter(|item| item.unit_type() == UnitType::Kilo)
        .map(|item| u64::from(item.quantity()))
        .sum();

    PricingBreakdown {
        per_item,
        subtotal,
        total_discount,
        total: subtotal - total_discount,
        total_kilos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::delivery::value_objects::ProductRef;
    use proptest::prelude::*;
    use uuid::Uuid;

    const TOLERANCE: f64 = 1e-6;

    fn item(quantity: u32, unit_price: f64, discount: f64, unit_type: UnitType) -> ProductItem {
        ProductItem::new(
            quantity,
            unit_price,
            discount,
            ProductRef {
                id: Uuid::new_v4(),
                name: "Manteca".to_string(),
                unit_type,
            },
        )
        .unwrap()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < TOLERANCE,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_ten_percent_discount_example() {
        let breakdown = reconstruct_pricing(&[item(2, 90.0, 10.0, UnitType::Unit)]);
        let line = &breakdown.per_item[0];

        assert_close(line.original_unit_price, 100.0);
        assert_close(line.discount_amount, 20.0);
        assert_close(line.subtotal, 200.0);
        assert_close(line.total, 180.0);
        assert_close(breakdown.subtotal, 200.0);
        assert_close(breakdown.total_discount, 20.0);
        assert_close(breakdown.total, 180.0);
    }

    #[test]
    fn test_zero_discount_is_exact() {
        let breakdown = reconstruct_pricing(&[item(3, 0.1, 0.0, UnitType::Unit)]);
        let line = &breakdown.per_item[0];

        assert_eq!(line.original_unit_price, 0.1);
        assert_eq!(line.discount_amount, 0.0);
    }

    #[test]
    fn test_empty_delivery() {
        let breakdown = reconstruct_pricing(&[]);
        assert!(breakdown.per_item.is_empty());
        assert_eq!(breakdown.subtotal, 0.0);
        assert_eq!(breakdown.total, 0.0);
        assert_eq!(breakdown.total_kilos, 0);
    }

    #[test]
    fn test_mixed_items_and_kilos() {
        let items = vec![
            item(2, 90.0, 10.0, UnitType::Kilo),
            item(5, 40.0, 0.0, UnitType::Unit),
            item(4, 75.0, 25.0, UnitType::Kilo),
        ];
        let breakdown = reconstruct_pricing(&items);

        assert_close(breakdown.subtotal, 200.0 + 200.0 + 400.0);
        assert_close(breakdown.total_discount, 20.0 + 0.0 + 100.0);
        assert_close(breakdown.total, 180.0 + 200.0 + 300.0);
        assert_eq!(breakdown.total_kilos, 6);
    }

    #[test]
    fn test_breakdown_keeps_item_order() {
        let items = vec![item(1, 10.0, 0.0, UnitType::Unit), item(7, 3.0, 50.0, UnitType::Unit)];
        let breakdown = reconstruct_pricing(&items);
        assert_eq!(breakdown.per_item[0].quantity, 1);
        assert_eq!(breakdown.per_item[1].quantity, 7);
        assert_close(breakdown.per_item[1].original_unit_price, 6.0);
    }

    proptest! {
        #[test]
        fn prop_line_identity_holds(
            quantity in 1u32..1_000,
            unit_price in 0.01f64..10_000.0,
            discount in 0.0f64..99.0,
        ) {
            let line = LinePricing::for_item(&item(quantity, unit_price, discount, UnitType::Unit));
            let scale = line.subtotal.abs().max(1.0);
            prop_assert!((line.total + line.discount_amount - line.subtotal).abs() <= TOLERANCE * scale);
        }

        #[test]
        fn prop_total_matches_sum_of_lines(
            lines in proptest::collection::vec((1u32..100, 0.01f64..1_000.0, 0.0f64..95.0), 0..20)
        ) {
            let items: Vec<_> = lines
                .iter()
                .map(|(q, p, d)| item(*q, *p, *d, UnitType::Unit))
                .collect();
            let breakdown = reconstruct_pricing(&items);
            let line_totals: f64 = breakdown.per_item.iter().map(|l| l.total).sum();
            let scale = breakdown.subtotal.abs().max(1.0);
            prop_assert!((breakdown.total - line_totals).abs() <= TOLERANCE * scale);
        }

        #[test]
        fn prop_zero_discount_reproduces_price(
            quantity in 1u32..1_000,
            unit_price in 0.01f64..10_000.0,
        ) {
            let line = LinePricing::for_item(&item(quantity, unit_price, 0.0, UnitType::Unit));
            prop_assert_eq!(line.original_unit_price, unit_price);
            prop_assert_eq!(line.discount_amount, 0.0);
        }
    }
}
