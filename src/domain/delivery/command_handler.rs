use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::metrics::Metrics;
use crate::store::DeliveryStore;

use super::aggregate::Delivery;
use super::commands::{ConfirmInput, DeliveryCommand};
use super::errors::DeliveryError;
use super::events::{TransitionAck, TransitionRequest};

// ============================================================================
// Delivery Command Handler
// ============================================================================
//
// Orchestrates: Command → Delivery (validate) → TransitionRequest → Store
//               → TransitionAck → new Delivery
//
// The caller's delivery is never mutated. A new value is returned only after
// the store has accepted the transition.
//
// ============================================================================

type InFlight = Arc<Mutex<HashSet<Uuid>>>;

/// Marks a delivery as having a transition outstanding; cleared on drop, so
/// failures, timeouts and dropped futures all release it.
struct InFlightGuard {
    in_flight: InFlight,
    delivery_id: Uuid,
}

impl InFlightGuard {
    fn acquire(in_flight: &InFlight, delivery_id: Uuid) -> Result<Self, DeliveryError> {
        let mut ids = in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !ids.insert(delivery_id) {
            return Err(DeliveryError::TransitionInFlight(delivery_id));
        }
        Ok(Self {
            in_flight: Arc::clone(in_flight),
            delivery_id,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut ids = self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        ids.remove(&self.delivery_id);
    }
}

fn rejection_reason(err: &DeliveryError) -> &'static str {
    match err {
        DeliveryError::Validation(_) => "validation",
        DeliveryError::AlreadyConfirmed | DeliveryError::AlreadyCancelled => "precondition",
        DeliveryError::TransitionInFlight(_) => "in_flight",
        DeliveryError::Rejected { .. } | DeliveryError::NotFound(_) => "store",
        DeliveryError::Aborted => "aborted",
        DeliveryError::TimedOut(_) => "timeout",
        DeliveryError::Transport(_)
        | DeliveryError::InvalidResponse(_)
        | DeliveryError::UnexpectedAcknowledgement { .. } => "transport",
    }
}

/// One handler per caller (session). The in-flight set is local to it.
pub struct DeliveryCommandHandler<S: DeliveryStore + ?Sized> {
    store: Arc<S>,
    in_flight: InFlight,
    metrics: Option<Arc<Metrics>>,
    request_timeout: Option<Duration>,
}

impl<S: DeliveryStore + ?Sized> DeliveryCommandHandler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            metrics: None,
            request_timeout: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Abort store requests that take longer than `timeout`.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn is_in_flight(&self, delivery_id: Uuid) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&delivery_id)
    }

    pub async fn load(&self, delivery_id: Uuid) -> Result<Delivery, DeliveryError> {
        Ok(self.store.fetch(delivery_id).await?)
    }

    pub async fn confirm(&self, delivery: &Delivery, input: ConfirmInput) -> Result<Delivery, DeliveryError> {
        self.execute(delivery, DeliveryCommand::Confirm(input), &CancellationToken::new())
            .await
    }

    pub async fn cancel(&self, delivery: &Delivery) -> Result<Delivery, DeliveryError> {
        self.execute(delivery, DeliveryCommand::Cancel, &CancellationToken::new())
            .await
    }

    /// Run a transition. Cancelling `cancel` abandons the store request and
    /// leaves the delivery as it was.
    pub async fn execute(
        &self,
        delivery: &Delivery,
        command: DeliveryCommand,
        cancel: &CancellationToken,
    ) -> Result<Delivery, DeliveryError> {
        let transition = command.name();
        let result = self.run(delivery, &command, cancel).await;

        match &result {
            Ok(updated) => {
                tracing::info!(
                    delivery_id = %delivery.id,
                    transition,
                    status = %updated.status,
                    "Delivery transition accepted"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_transition(transition, true);
                }
            }
            Err(err) => {
                tracing::warn!(
                    delivery_id = %delivery.id,
                    transition,
                    error = %err,
                    "Delivery transition refused"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_transition(transition, false);
                    metrics.record_rejection(rejection_reason(err));
                }
            }
        }

        result
    }

    async fn run(
        &self,
        delivery: &Delivery,
        command: &DeliveryCommand,
        cancel: &CancellationToken,
    ) -> Result<Delivery, DeliveryError> {
        let _guard = InFlightGuard::acquire(&self.in_flight, delivery.id)?;

        let request = delivery.handle_command(command)?;

        tracing::debug!(delivery_id = %delivery.id, request = ?request, "Submitting delivery transition");

        let ack = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DeliveryError::Aborted),
            ack = self.submit(delivery.id, &request) => ack?,
        };

        delivery.apply_acknowledgement(&request, &ack)
    }

    async fn submit(&self, delivery_id: Uuid, request: &TransitionRequest) -> Result<TransitionAck, DeliveryError> {
        let started = Instant::now();
        let call = self.store.transition(delivery_id, request);

        let result = match self.request_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, call).await {
                Ok(result) => result.map_err(DeliveryError::from),
                Err(_) => Err(DeliveryError::TimedOut(timeout)),
            },
            None => call.await.map_err(DeliveryError::from),
        };

        if let Some(metrics) = &self.metrics {
            metrics.observe_store_request("transition", started.elapsed().as_secs_f64());
        }

        result
    }

    /// Replace the free-text observations. Allowed in every status; blank
    /// text clears the field.
    pub async fn update_observations(
        &self,
        delivery: &Delivery,
        observations: Option<String>,
    ) -> Result<Delivery, DeliveryError> {
        let observations = observations
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        self.store
            .update_observations(delivery.id, observations.as_deref())
            .await?;

        tracing::info!(delivery_id = %delivery.id, "Delivery observations updated");

        let mut updated = delivery.clone();
        updated.observations = observations;
        Ok(updated)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
