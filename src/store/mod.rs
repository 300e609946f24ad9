// ============================================================================
// Delivery Store - the remote side of every transition
// ============================================================================
//
// The store owns the authoritative copy of each delivery. The command
// handler only ever talks to it through `DeliveryStore`; the adapters here
// are an in-memory store (demo and tests) and a REST client.
//
// ============================================================================

mod circuit_breaker;
mod http;
mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::delivery::{Delivery, TransitionAck, TransitionRequest};

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use http::HttpDeliveryStore;
pub use memory::InMemoryDeliveryStore;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The store refused the request, optionally pointing at one field.
    #[error("rejected: {message}")]
    Rejected {
        field: Option<String>,
        message: String,
    },

    #[error("delivery not found: {0}")]
    NotFound(Uuid),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("store unavailable")]
    Unavailable,

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl StoreError {
    pub fn rejected_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Rejected {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Failures of the link itself, as opposed to an answer from the store.
    pub fn is_transport(&self) -> bool {
        matches!(self, StoreError::Transport(_) | StoreError::InvalidResponse(_))
    }
}

#[async_trait]
pub trait DeliveryStore: Send + Sync {
    async fn fetch(&self, id: Uuid) -> Result<Delivery, StoreError>;

    /// Ask the store to move a delivery to `request.status`.
    async fn transition(&self, id: Uuid, request: &TransitionRequest) -> Result<TransitionAck, StoreError>;

    async fn update_observations(&self, id: Uuid, observations: Option<&str>) -> Result<(), StoreError>;
}
