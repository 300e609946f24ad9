use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::store::StoreError;

// ============================================================================
// Delivery Errors
// ============================================================================

/// A problem tied to a single input field, rendered next to that field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    #[serde(rename = "error")]
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    // Local validation, nothing was sent to the store
    #[error("Validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    // Local preconditions
    #[error("Delivery is already confirmed")]
    AlreadyConfirmed,

    #[error("Delivery is already cancelled")]
    AlreadyCancelled,

    #[error("A transition is already in flight for delivery {0}")]
    TransitionInFlight(Uuid),

    // Remote
    #[error("Store rejected the request: {message}")]
    Rejected {
        field: Option<String>,
        message: String,
    },

    #[error("Delivery not found: {0}")]
    NotFound(Uuid),

    #[error("Store acknowledged {actual} but {expected} was requested")]
    UnexpectedAcknowledgement {
        expected: super::DeliveryStatus,
        actual: super::DeliveryStatus,
    },

    // Transport
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid store response: {0}")]
    InvalidResponse(String),

    #[error("Transition aborted by caller")]
    Aborted,

    #[error("Transition timed out after {0:?}")]
    TimedOut(Duration),
}

impl DeliveryError {
    /// True when the delivery was not in a state that allows the request.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            DeliveryError::AlreadyConfirmed
                | DeliveryError::AlreadyCancelled
                | DeliveryError::TransitionInFlight(_)
        )
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, DeliveryError::Validation(_))
    }

    /// Errors the caller can attach to individual fields. Empty when the
    /// error can only be shown as a generic message.
    pub fn field_errors(&self) -> Vec<FieldError> {
        match self {
            DeliveryError::Validation(errors) => errors.clone(),
            DeliveryError::Rejected {
                field: Some(field),
                message,
            } => vec![FieldError::new(field.clone(), message.clone())],
            _ => Vec::new(),
        }
    }
}

impl From<StoreError> for DeliveryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rejected { field, message } => DeliveryError::Rejected { field, message },
            StoreError::NotFound(id) => DeliveryError::NotFound(id),
            StoreError::Transport(msg) => DeliveryError::Transport(msg),
            StoreError::Unavailable => {
                DeliveryError::Transport("delivery store is temporarily unavailable".to_string())
            }
            StoreError::InvalidResponse(msg) => DeliveryError::InvalidResponse(msg),
        }
    }
}
