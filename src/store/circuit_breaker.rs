use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::StoreError;

// ============================================================================
// Circuit Breaker for the remote delivery store
// ============================================================================
//
// States:
// - Closed: requests go out
// - Open: too many transport failures, answer `Unavailable` at once
// - HalfOpen: cool-off elapsed, one probe decides whether to close again.
//   Other callers get `Unavailable` until it settles. A probe that never
//   settles (its future was dropped) is replaced after another cool-off.
//
// Only transport failures count. A store that answers with a rejection is
// healthy.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive transport failures before opening
    pub failure_threshold: u32,
    /// How long to stay open before probing
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    /// When the circuit opened, or when the current probe started
    opened_at: Option<Instant>,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    state: Arc<Mutex<BreakerState>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            })),
            config,
        }
    }

    pub async fn call<F, T>(&self, operation: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        {
            let mut state = self.state.lock().await;
            if state.state != CircuitState::Closed {
                let cooled_off = state
                    .opened_at
                    .map_or(true, |since| since.elapsed() >= self.config.cooldown);
                if !cooled_off {
                    return Err(StoreError::Unavailable);
                }
                match state.state {
                    CircuitState::HalfOpen => tracing::warn!("Delivery store probe never settled, probing again"),
                    _ => tracing::info!("Delivery store circuit half-open, probing"),
                }
                state.state = CircuitState::HalfOpen;
                state.opened_at = Some(Instant::now());
            }
        }

        let result = operation.await;

        match &result {
            Err(err) if err.is_transport() => self.record_failure().await,
            _ => self.record_success().await,
        }

        result
    }

    async fn record_success(&self) {
        let mut state = self.state.lock().await;
        if state.state != CircuitState::Closed {
            tracing::info!("Delivery store circuit closed");
        }
        state.state = CircuitState::Closed;
        state.consecutive_failures = 0;
        state.opened_at = None;
    }

    async fn record_failure(&self) {
        let mut state = self.state.lock().await;
        state.consecutive_failures += 1;

        let should_open = match state.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => state.consecutive_failures >= self.config.failure_threshold,
            CircuitState::Open => false,
        };

        if should_open {
            tracing::warn!(
                failures = state.consecutive_failures,
                "Delivery store circuit opened"
            );
            state.state = CircuitState::Open;
            state.opened_at = Some(Instant::now());
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.state.lock().await.state
    }
}
