use serde::{Deserialize, Serialize};

use super::errors::FieldError;
use super::value_objects::PaymentMethod;

// ============================================================================
// Delivery Commands - Represent user intent
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryCommand {
    Confirm(ConfirmInput),
    Cancel,
}

impl DeliveryCommand {
    pub fn name(&self) -> &'static str {
        match self {
            DeliveryCommand::Confirm(_) => "confirm",
            DeliveryCommand::Cancel => "cancel",
        }
    }
}

/// Payment and crate data collected when a delivery is confirmed.
///
/// Signed types on purpose: the input comes from a form and negative values
/// must be reported back as field errors, not rejected by the type system.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfirmInput {
    pub amount_received: f64,
    pub payment_method: Option<PaymentMethod>,
    pub returned_crates: i64,
}

impl ConfirmInput {
    pub fn new(amount_received: f64, payment_method: Option<PaymentMethod>, returned_crates: i64) -> Self {
        Self {
            amount_received,
            payment_method,
            returned_crates,
        }
    }

    /// Every field problem at once, so the form can flag all of them.
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = payment_errors(self.amount_received, self.payment_method);

        if self.returned_crates < 0 {
            errors.push(FieldError::new("returnedCrates", "must not be negative"));
        } else if u32::try_from(self.returned_crates).is_err() {
            errors.push(FieldError::new("returnedCrates", "is too large"));
        }

        errors
    }
}

/// Amount/method coupling: a zero payment has no method, any positive
/// payment needs exactly one.
pub fn payment_errors(amount: f64, method: Option<PaymentMethod>) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if !amount.is_finite() {
        errors.push(FieldError::new("amountReceived", "must be a number"));
        return errors;
    }
    if amount < 0.0 {
        errors.push(FieldError::new("amountReceived", "must not be negative"));
        return errors;
    }

    match (amount > 0.0, method) {
        (true, None) => errors.push(FieldError::new(
            "paymentMethod",
            "is required when an amount was received",
        )),
        (false, Some(_)) => errors.push(FieldError::new(
            "paymentMethod",
            "must be empty when no amount was received",
        )),
        _ => {}
    }

    errors
}
