use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DeliveryStore, StoreError};
use crate::domain::delivery::{payment_errors, Delivery, DeliveryStatus, TransitionAck, TransitionRequest};

/// Process-local store. Re-validates every transition the way the remote
/// API does, so a stale caller is rejected instead of overwriting state.
#[derive(Default)]
pub struct InMemoryDeliveryStore {
    deliveries: RwLock<HashMap<Uuid, Delivery>>,
}

impl InMemoryDeliveryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, delivery: Delivery) {
        self.deliveries.write().await.insert(delivery.id, delivery);
    }

    fn check_request(request: &TransitionRequest) -> Result<(), StoreError> {
        if request.status == DeliveryStatus::Confirmed {
            let amount = request.amount.unwrap_or(0.0);
            if let Some(error) = payment_errors(amount, request.payment_method).into_iter().next() {
                return Err(StoreError::rejected_field(error.field, error.message));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DeliveryStore for InMemoryDeliveryStore {
    async fn fetch(&self, id: Uuid) -> Result<Delivery, StoreError> {
        self.deliveries
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn transition(&self, id: Uuid, request: &TransitionRequest) -> Result<TransitionAck, StoreError> {
        let mut deliveries = self.deliveries.write().await;
        let delivery = deliveries.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if delivery.status.is_terminal() {
            return Err(StoreError::rejected_field(
                "status",
                format!("delivery is already {}", delivery.status),
            ));
        }
        if request.status == DeliveryStatus::Pending {
            return Err(StoreError::rejected_field("status", "cannot transition to Pending"));
        }
        Self::check_request(request)?;

        let ack = match request.status {
            DeliveryStatus::Confirmed => {
                let amount = request.amount.unwrap_or(0.0);
                TransitionAck {
                    status: DeliveryStatus::Confirmed,
                    confirmed_date: Some(Utc::now()),
                    amount: Some(amount),
                    payment_method: if amount > 0.0 { request.payment_method } else { None },
                    crates: Some(request.crates.unwrap_or(0)),
                }
            }
            _ => TransitionAck {
                status: DeliveryStatus::Cancelled,
                confirmed_date: None,
                amount: None,
                payment_method: None,
                crates: None,
            },
        };

        delivery.status = ack.status;
        delivery.confirmed_date = ack.confirmed_date;
        delivery.amount_received = ack.amount;
        delivery.payment_method = ack.payment_method;
        delivery.crates = ack.crates.unwrap_or(0);

        tracing::debug!(delivery_id = %id, status = %ack.status, "Stored delivery transition");

        Ok(ack)
    }

    async fn update_observations(&self, id: Uuid, observations: Option<&str>) -> Result<(), StoreError> {
        let mut deliveries = self.deliveries.write().await;
        let delivery = deliveries.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        delivery.observations = observations.map(str::to_string);
        Ok(())
    }
}
