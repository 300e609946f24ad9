use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

// ============================================================================
// Metrics Module - Prometheus metrics for delivery transitions
// ============================================================================
//
// Tracks:
// - Transition outcomes (confirm / cancel, accepted or not)
// - Why transitions were turned down (validation, precondition, store, ...)
// - Latency of delivery store requests
//
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub transitions_total: IntCounterVec,
    pub transition_rejections: IntCounterVec,
    pub store_request_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let transitions_total = IntCounterVec::new(
            Opts::new("delivery_transitions_total", "Delivery transitions attempted, by outcome"),
            &["transition", "outcome"],
        )?;
        registry.register(Box::new(transitions_total.clone()))?;

        let transition_rejections = IntCounterVec::new(
            Opts::new(
                "delivery_transition_rejections_total",
                "Delivery transitions that did not go through, by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(transition_rejections.clone()))?;

        let store_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "delivery_store_request_duration_seconds",
                "Time spent waiting for the delivery store",
            )
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["operation"],
        )?;
        registry.register(Box::new(store_request_duration.clone()))?;

        Ok(Self {
            registry,
            transitions_total,
            transition_rejections,
            store_request_duration,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_transition(&self, transition: &str, accepted: bool) {
        let outcome = if accepted { "accepted" } else { "failed" };
        self.transitions_total.with_label_values(&[transition, outcome]).inc();
    }

    pub fn record_rejection(&self, reason: &str) {
        self.transition_rejections.with_label_values(&[reason]).inc();
    }

    pub fn observe_store_request(&self, operation: &str, duration_secs: f64) {
        self.store_request_duration
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    /// Text exposition format, ready to serve on a scrape endpoint.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
