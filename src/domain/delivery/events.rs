use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use super::value_objects::{DeliveryStatus, PaymentMethod};

// ============================================================================
// Transition Messages - exchanged with the delivery store
// ============================================================================

/// What a delivery asks the store to do. Produced by `Delivery::handle_command`,
/// never applied locally until the store acknowledges it.
///
/// A confirm always carries `paymentMethod`, as `null` when nothing was paid.
/// A cancel carries only `status`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub status: DeliveryStatus,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub crates: Option<u32>,
}

impl Serialize for TransitionRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("status", &self.status)?;
        if let Some(amount) = self.amount {
            map.serialize_entry("amount", &amount)?;
        }
        if self.status == DeliveryStatus::Confirmed {
            map.serialize_entry("paymentMethod", &self.payment_method)?;
        }
        if let Some(crates) = self.crates {
            map.serialize_entry("crates", &crates)?;
        }
        map.end()
    }
}

impl TransitionRequest {
    pub fn confirm(amount: f64, payment_method: Option<PaymentMethod>, crates: u32) -> Self {
        Self {
            status: DeliveryStatus::Confirmed,
            amount: Some(amount),
            payment_method,
            crates: Some(crates),
        }
    }

    pub fn cancel() -> Self {
        Self {
            status: DeliveryStatus::Cancelled,
            amount: None,
            payment_method: None,
            crates: None,
        }
    }
}

/// The store's answer to an accepted transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionAck {
    pub status: DeliveryStatus,
    #[serde(default)]
    pub confirmed_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub crates: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirm_request_wire_shape() {
        let request = TransitionRequest::confirm(120.5, Some(PaymentMethod::Cash), 3);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "Confirmed",
                "amount": 120.5,
                "paymentMethod": "Cash",
                "crates": 3
            })
        );
    }

    #[test]
    fn test_confirm_request_without_payment_sends_null_method() {
        let request = TransitionRequest::confirm(0.0, None, 3);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "Confirmed",
                "amount": 0.0,
                "paymentMethod": null,
                "crates": 3
            })
        );
    }

    #[test]
    fn test_cancel_request_carries_only_status() {
        let json = serde_json::to_value(TransitionRequest::cancel()).unwrap();
        assert_eq!(json, serde_json::json!({"status": "Cancelled"}));
    }

    #[test]
    fn test_ack_with_missing_fields() {
        let ack: TransitionAck = serde_json::from_str(r#"{"status":"Cancelled"}"#).unwrap();
        assert_eq!(ack.status, DeliveryStatus::Cancelled);
        assert_eq!(ack.confirmed_date, None);
        assert_eq!(ack.crates, None);
    }
}
