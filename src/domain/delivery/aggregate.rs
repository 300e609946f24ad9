use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::commands::DeliveryCommand;
use super::errors::DeliveryError;
use super::events::{TransitionAck, TransitionRequest};
use super::pricing::{reconstruct_pricing, PricingBreakdown};
use super::value_objects::{DeliveryStatus, OrderRef, PaymentMethod, ProductItem};

// ============================================================================
// Delivery Aggregate - Domain Logic
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    // Identity
    pub id: Uuid,

    // Lifecycle
    pub status: DeliveryStatus,
    pub date: DateTime<Utc>,
    pub confirmed_date: Option<DateTime<Utc>>,

    // Filled in on confirmation
    pub crates: u32,
    pub amount_received: Option<f64>,
    pub payment_method: Option<PaymentMethod>,

    pub observations: Option<String>,
    pub product_items: Vec<ProductItem>,
    pub order: Option<OrderRef>,
}

impl Delivery {
    /// A freshly scheduled delivery, as the store creates it.
    pub fn pending(id: Uuid, date: DateTime<Utc>, product_items: Vec<ProductItem>) -> Self {
        Self {
            id,
            status: DeliveryStatus::Pending,
            date,
            confirmed_date: None,
            crates: 0,
            amount_received: None,
            payment_method: None,
            observations: None,
            product_items,
            order: None,
        }
    }

    pub fn with_order(mut self, order: OrderRef) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_observations(mut self, observations: impl Into<String>) -> Self {
        self.observations = Some(observations.into());
        self
    }

    pub fn pricing(&self) -> PricingBreakdown {
        reconstruct_pricing(&self.product_items)
    }

    /// Crates still owed back by the client, once the delivery is confirmed.
    pub fn crates_outstanding(&self) -> Option<u32> {
        match (self.status, self.order) {
            (DeliveryStatus::Confirmed, Some(order)) => Some(order.crates.saturating_sub(self.crates)),
            _ => None,
        }
    }

    fn ensure_pending(&self) -> Result<(), DeliveryError> {
        match self.status {
            DeliveryStatus::Pending => Ok(()),
            DeliveryStatus::Confirmed => Err(DeliveryError::AlreadyConfirmed),
            DeliveryStatus::Cancelled => Err(DeliveryError::AlreadyCancelled),
        }
    }

    /// Check preconditions and input, then describe the transition to send.
    /// The delivery itself is left untouched.
    pub fn handle_command(&self, command: &DeliveryCommand) -> Result<TransitionRequest, DeliveryError> {
        self.ensure_pending()?;

        match command {
            DeliveryCommand::Confirm(input) => {
                let errors = input.validate();
                if !errors.is_empty() {
                    return Err(DeliveryError::Validation(errors));
                }

                // validate() guarantees 0 <= returned_crates <= u32::MAX
                let crates = u32::try_from(input.returned_crates).unwrap_or_default();

                Ok(TransitionRequest::confirm(
                    input.amount_received,
                    input.payment_method,
                    crates,
                ))
            }
            DeliveryCommand::Cancel => Ok(TransitionRequest::cancel()),
        }
    }

    /// Build the delivery the store now holds after accepting `request`.
    pub fn apply_acknowledgement(
        &self,
        request: &TransitionRequest,
        ack: &TransitionAck,
    ) -> Result<Delivery, DeliveryError> {
        if ack.status != request.status {
            return Err(DeliveryError::UnexpectedAcknowledgement {
                expected: request.status,
                actual: ack.status,
            });
        }

        let mut next = self.clone();
        next.status = ack.status;

        match ack.status {
            DeliveryStatus::Confirmed => {
                let confirmed_date = ack.confirmed_date.ok_or_else(|| {
                    DeliveryError::InvalidResponse("confirmation without confirmedDate".to_string())
                })?;
                next.confirmed_date = Some(confirmed_date);
                next.amount_received = ack.amount.or(request.amount);
                next.payment_method = match ack.amount.or(request.amount) {
                    Some(amount) if amount > 0.0 => ack.payment_method.or(request.payment_method),
                    _ => None,
                };
                next.crates = ack.crates.or(request.crates).unwrap_or(0);
            }
            DeliveryStatus::Cancelled => {
                next.confirmed_date = None;
                next.amount_received = None;
                next.payment_method = None;
                next.crates = 0;
            }
            DeliveryStatus::Pending => {
                return Err(DeliveryError::InvalidResponse(
                    "store acknowledged a transition back to Pending".to_string(),
                ))
            }
        }

        Ok(next)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::delivery::commands::ConfirmInput;
    use crate::domain::delivery::value_objects::{ProductRef, UnitType};

    fn create_test_delivery() -> Delivery {
        let item = ProductItem::new(
            2,
            90.0,
            10.0,
            ProductRef {
                id: Uuid::new_v4(),
                name: "Leche entera".to_string(),
                unit_type: UnitType::Unit,
            },
        )
        .unwrap();

        Delivery::pending(Uuid::new_v4(), Utc::now(), vec![item]).with_order(OrderRef { crates: 5 })
    }

    fn confirmed_ack(amount: f64, method: Option<PaymentMethod>, crates: u32) -> TransitionAck {
        TransitionAck {
            status: DeliveryStatus::Confirmed,
            confirmed_date: Some(Utc::now()),
            amount: Some(amount),
            payment_method: method,
            crates: Some(crates),
        }
    }

    #[test]
    fn test_confirm_without_payment() {
        let delivery = create_test_delivery();
        let command = DeliveryCommand::Confirm(ConfirmInput::new(0.0, None, 3));

        let request = delivery.handle_command(&command).unwrap();
        assert_eq!(request, TransitionRequest::confirm(0.0, None, 3));

        let confirmed = delivery
            .apply_acknowledgement(&request, &confirmed_ack(0.0, None, 3))
            .unwrap();
        assert_eq!(confirmed.status, DeliveryStatus::Confirmed);
        assert_eq!(confirmed.payment_method, None);
        assert_eq!(confirmed.crates, 3);
        assert!(confirmed.confirmed_date.is_some());

        // original untouched
        assert_eq!(delivery.status, DeliveryStatus::Pending);
    }

    #[test]
    fn test_confirm_with_payment_requires_method() {
        let delivery = create_test_delivery();
        let command = DeliveryCommand::Confirm(ConfirmInput::new(50.0, None, 0));

        let err = delivery.handle_command(&command).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.field_errors()[0].field, "paymentMethod");
    }

    #[test]
    fn test_cancel_leaves_payment_fields_unset() {
        let delivery = create_test_delivery();
        let request = delivery.handle_command(&DeliveryCommand::Cancel).unwrap();
        let ack = TransitionAck {
            status: DeliveryStatus::Cancelled,
            confirmed_date: None,
            amount: None,
            payment_method: None,
            crates: None,
        };

        let cancelled = delivery.apply_acknowledgement(&request, &ack).unwrap();
        assert_eq!(cancelled.status, DeliveryStatus::Cancelled);
        assert_eq!(cancelled.confirmed_date, None);
        assert_eq!(cancelled.amount_received, None);
        assert_eq!(cancelled.payment_method, None);
        assert_eq!(cancelled.crates, 0);
    }

    #[test]
    fn test_terminal_deliveries_reject_every_transition() {
        let mut confirmed = create_test_delivery();
        confirmed.status = DeliveryStatus::Confirmed;
        let mut cancelled = create_test_delivery();
        cancelled.status = DeliveryStatus::Cancelled;

        let confirm = DeliveryCommand::Confirm(ConfirmInput::default());

        assert!(matches!(confirmed.handle_command(&confirm), Err(DeliveryError::AlreadyConfirmed)));
        assert!(matches!(
            confirmed.handle_command(&DeliveryCommand::Cancel),
            Err(DeliveryError::AlreadyConfirmed)
        ));
        assert!(matches!(cancelled.handle_command(&confirm), Err(DeliveryError::AlreadyCancelled)));
        assert!(matches!(
            cancelled.handle_command(&DeliveryCommand::Cancel),
            Err(DeliveryError::AlreadyCancelled)
        ));
    }

    #[test]
    fn test_precondition_checked_before_validation() {
        let mut delivery = create_test_delivery();
        delivery.status = DeliveryStatus::Confirmed;

        let command = DeliveryCommand::Confirm(ConfirmInput::new(-5.0, None, -1));
        let err = delivery.handle_command(&command).unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn test_mismatched_acknowledgement_is_rejected() {
        let delivery = create_test_delivery();
        let request = delivery.handle_command(&DeliveryCommand::Cancel).unwrap();

        let err = delivery
            .apply_acknowledgement(&request, &confirmed_ack(0.0, None, 0))
            .unwrap_err();
        assert!(matches!(err, DeliveryError::UnexpectedAcknowledgement { .. }));
    }

    #[test]
    fn test_confirmation_ack_needs_a_date() {
        let delivery = create_test_delivery();
        let request = TransitionRequest::confirm(0.0, None, 1);
        let mut ack = confirmed_ack(0.0, None, 1);
        ack.confirmed_date = None;

        assert!(matches!(
            delivery.apply_acknowledgement(&request, &ack),
            Err(DeliveryError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_crates_outstanding() {
        let delivery = create_test_delivery();
        assert_eq!(delivery.crates_outstanding(), None);

        let request = TransitionRequest::confirm(0.0, None, 2);
        let confirmed = delivery
            .apply_acknowledgement(&request, &confirmed_ack(0.0, None, 2))
            .unwrap();
        assert_eq!(confirmed.crates_outstanding(), Some(3));

        let mut over_returned = confirmed.clone();
        over_returned.crates = 9;
        assert_eq!(over_returned.crates_outstanding(), Some(0));
    }

    #[test]
    fn test_delivery_serialization_uses_explicit_optional_date() {
        let delivery = create_test_delivery();
        let json = serde_json::to_value(&delivery).unwrap();
        assert!(json["confirmedDate"].is_null());
        assert_eq!(json["status"], "Pending");

        let back: Delivery = serde_json::from_value(json).unwrap();
        assert_eq!(back, delivery);
    }
}
