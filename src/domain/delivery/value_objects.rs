use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::errors::{DeliveryError, FieldError};

// ============================================================================
// Delivery Value Objects
// ============================================================================

/// Lifecycle status of a delivery. `Confirmed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl DeliveryStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeliveryStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "Pending",
            DeliveryStatus::Confirmed => "Confirmed",
            DeliveryStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a confirmed delivery was paid.
///
/// Serialized with the wire value the store expects (`Cash` / `Check`);
/// `label()` gives the text shown to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    Check,
}

impl PaymentMethod {
    pub fn wire_value(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Check => "Check",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "efectivo",
            PaymentMethod::Check => "cheque",
        }
    }

    /// Parse an operator-facing label. Case and surrounding whitespace are ignored.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "efectivo" => Some(PaymentMethod::Cash),
            "cheque" => Some(PaymentMethod::Check),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_value())
    }
}

/// Unit a product is sold in. Only used for weight display, never for pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitType {
    Kilo,
    #[serde(other)]
    Unit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRef {
    pub id: Uuid,
    pub name: String,
    pub unit_type: UnitType,
}

/// Crates allocated when the order behind this delivery was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRef {
    pub crates: u32,
}

// ============================================================================
// Line Items
// ============================================================================

/// One product entry of a delivery.
///
/// `unit_price` is the price actually charged, after `discount` (a percentage)
/// was applied. Construction guarantees `quantity > 0`, a finite
/// `unit_price > 0` and `0 <= discount < 100`, so price reconstruction never
/// divides by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ProductItemRecord")]
pub struct ProductItem {
    quantity: u32,
    unit_price: f64,
    discount: f64,
    product: ProductRef,
}

impl ProductItem {
    pub fn new(
        quantity: u32,
        unit_price: f64,
        discount: f64,
        product: ProductRef,
    ) -> Result<Self, DeliveryError> {
        let mut errors = Vec::new();

        if quantity == 0 {
            errors.push(FieldError::new("quantity", "must be greater than 0"));
        }
        if !unit_price.is_finite() || unit_price <= 0.0 {
            errors.push(FieldError::new("unitPrice", "must be a positive amount"));
        }
        if !discount.is_finite() || !(0.0..100.0).contains(&discount) {
            errors.push(FieldError::new("discount", "must be at least 0 and below 100"));
        }

        if !errors.is_empty() {
            return Err(DeliveryError::Validation(errors));
        }

        Ok(Self {
            quantity,
            unit_price,
            discount,
            product,
        })
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_price(&self) -> f64 {
        self.unit_price
    }

    pub fn discount(&self) -> f64 {
        self.discount
    }

    pub fn product(&self) -> &ProductRef {
        &self.product
    }

    pub fn unit_type(&self) -> UnitType {
        self.product.unit_type
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductItemRecord {
    quantity: u32,
    unit_price: f64,
    #[serde(default)]
    discount: f64,
    product: ProductRef,
}

impl TryFrom<ProductItemRecord> for ProductItem {
    type Error = DeliveryError;

    fn try_from(record: ProductItemRecord) -> Result<Self, Self::Error> {
        ProductItem::new(record.quantity, record.unit_price, record.discount, record.product)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cheese() -> ProductRef {
        ProductRef {
            id: Uuid::new_v4(),
            name: "Queso fresco".to_string(),
            unit_type: UnitType::Kilo,
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!DeliveryStatus::Pending.is_terminal());
        assert!(DeliveryStatus::Confirmed.is_terminal());
        assert!(DeliveryStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_payment_method_representations() {
        assert_eq!(PaymentMethod::Cash.wire_value(), "Cash");
        assert_eq!(PaymentMethod::Check.label(), "cheque");
        assert_eq!(PaymentMethod::from_label(" Efectivo "), Some(PaymentMethod::Cash));
        assert_eq!(PaymentMethod::from_label("cheque"), Some(PaymentMethod::Check));
        assert_eq!(PaymentMethod::from_label("transfer"), None);

        let json = serde_json::to_string(&PaymentMethod::Check).unwrap();
        assert_eq!(json, "\"Check\"");
    }

    #[test]
    fn test_unknown_unit_type_falls_back_to_unit() {
        let unit: UnitType = serde_json::from_str("\"Box\"").unwrap();
        assert_eq!(unit, UnitType::Unit);
        let kilo: UnitType = serde_json::from_str("\"Kilo\"").unwrap();
        assert_eq!(kilo, UnitType::Kilo);
    }

    #[test]
    fn test_product_item_accepts_valid_values() {
        let item = ProductItem::new(2, 90.0, 10.0, cheese()).unwrap();
        assert_eq!(item.quantity(), 2);
        assert_eq!(item.unit_price(), 90.0);
        assert_eq!(item.discount(), 10.0);
        assert_eq!(item.unit_type(), UnitType::Kilo);
    }

    #[test]
    fn test_product_item_rejects_full_discount() {
        let err = ProductItem::new(1, 50.0, 100.0, cheese()).unwrap_err();
        let fields: Vec<String> = err.field_errors().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["discount".to_string()]);
    }

    #[test]
    fn test_product_item_collects_every_invalid_field() {
        let err = ProductItem::new(0, -1.0, -5.0, cheese()).unwrap_err();
        assert_eq!(err.field_errors().len(), 3);
    }

    #[test]
    fn test_product_item_deserialization_is_validated() {
        let product_id = Uuid::new_v4();
        let valid = format!(
            r#"{{"quantity":3,"unitPrice":12.5,"discount":0,"product":{{"id":"{product_id}","name":"Yogur","unitType":"Unit"}}}}"#
        );
        let item: ProductItem = serde_json::from_str(&valid).unwrap();
        assert_eq!(item.quantity(), 3);
        assert_eq!(item.product().id, product_id);

        let invalid = valid.replace("\"discount\":0", "\"discount\":100");
        assert!(serde_json::from_str::<ProductItem>(&invalid).is_err());
    }
}
