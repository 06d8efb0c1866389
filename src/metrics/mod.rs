mod server;

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec,
    IntGauge, Opts, Registry,
};

pub use server::configure;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// - Webhook ingestion (throughput, latency, signature failures)
// - Order transitions and rejected commands
// - Earnings ledger postings
// - Publish saga step outcomes
// - Retry attempts, dead letters, provider circuit breaker
//
// Scraped via GET /metrics on the main HTTP server.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Webhook Metrics
    pub webhook_events_received: IntCounterVec,
    pub webhook_events_failed: IntCounterVec,
    pub webhook_processing_duration: HistogramVec,
    pub webhook_signature_failures: IntCounter,

    // Order Metrics
    pub order_transitions: IntCounterVec,
    pub order_commands_rejected: IntCounterVec,
    pub ledger_postings: IntCounterVec,

    // Publish Metrics
    pub publish_steps: IntCounterVec,

    // Retry Metrics
    pub retry_attempts_total: IntCounterVec,
    pub retry_failure: IntCounterVec,

    // Dead Letter Metrics
    pub dead_letters_total: IntCounter,
    pub dead_letters_by_event_type: IntCounterVec,

    // Circuit Breaker Metrics
    pub circuit_breaker_state: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Webhook Metrics
        let webhook_events_received = IntCounterVec::new(
            Opts::new("webhook_events_received_total", "Total provider webhook events received"),
            &["event_type"],
        )?;
        registry.register(Box::new(webhook_events_received.clone()))?;

        let webhook_events_failed = IntCounterVec::new(
            Opts::new("webhook_events_failed_total", "Total provider webhook events that failed processing"),
            &["event_type", "reason"],
        )?;
        registry.register(Box::new(webhook_events_failed.clone()))?;

        let webhook_processing_duration = HistogramVec::new(
            HistogramOpts::new("webhook_processing_duration_seconds", "Webhook processing duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["event_type"],
        )?;
        registry.register(Box::new(webhook_processing_duration.clone()))?;

        let webhook_signature_failures = IntCounter::new(
            "webhook_signature_failures_total",
            "Webhook deliveries rejected for a bad or missing signature",
        )?;
        registry.register(Box::new(webhook_signature_failures.clone()))?;

        // Order Metrics
        let order_transitions = IntCounterVec::new(
            Opts::new("order_transitions_total", "Order status transitions"),
            &["from_status", "to_status"],
        )?;
        registry.register(Box::new(order_transitions.clone()))?;

        let order_commands_rejected = IntCounterVec::new(
            Opts::new("order_commands_rejected_total", "Order commands rejected by the state machine"),
            &["command"],
        )?;
        registry.register(Box::new(order_commands_rejected.clone()))?;

        let ledger_postings = IntCounterVec::new(
            Opts::new("ledger_postings_total", "Creator earnings postings applied"),
            &["kind"],
        )?;
        registry.register(Box::new(ledger_postings.clone()))?;

        // Publish Metrics
        let publish_steps = IntCounterVec::new(
            Opts::new("publish_steps_total", "Publish saga step outcomes"),
            &["step", "outcome"],
        )?;
        registry.register(Box::new(publish_steps.clone()))?;

        // Retry Metrics
        let retry_attempts_total = IntCounterVec::new(
            Opts::new("retry_attempts_total", "Total retry attempts"),
            &["operation"],
        )?;
        registry.register(Box::new(retry_attempts_total.clone()))?;

        let retry_failure = IntCounterVec::new(
            Opts::new("retry_failure_total", "Total failed retries after all attempts"),
            &["operation"],
        )?;
        registry.register(Box::new(retry_failure.clone()))?;

        // Dead Letter Metrics
        let dead_letters_total = IntCounter::new(
            "dead_letters_total",
            "Total webhook deliveries recorded as dead letters",
        )?;
        registry.register(Box::new(dead_letters_total.clone()))?;

        let dead_letters_by_event_type = IntCounterVec::new(
            Opts::new("dead_letters_by_event_type", "Dead letters by event type"),
            &["event_type"],
        )?;
        registry.register(Box::new(dead_letters_by_event_type.clone()))?;

        // Circuit Breaker Metrics
        let circuit_breaker_state = IntGauge::new(
            "provider_circuit_breaker_state",
            "Provider circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        Ok(Self {
            registry,
            webhook_events_received,
            webhook_events_failed,
            webhook_processing_duration,
            webhook_signature_failures,
            order_transitions,
            order_commands_rejected,
            ledger_postings,
            publish_steps,
            retry_attempts_total,
            retry_failure,
            dead_letters_total,
            dead_letters_by_event_type,
            circuit_breaker_state,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record webhook processing
    pub fn record_webhook(&self, event_type: &str, duration_secs: f64, success: bool) {
        self.webhook_events_received.with_label_values(&[event_type]).inc();
        if !success {
            self.webhook_events_failed.with_label_values(&[event_type, "processing_error"]).inc();
        }
        self.webhook_processing_duration.with_label_values(&[event_type]).observe(duration_secs);
    }

    pub fn record_signature_failure(&self) {
        self.webhook_signature_failures.inc();
    }

    pub fn record_transition(&self, from: &str, to: &str) {
        self.order_transitions.with_label_values(&[from, to]).inc();
    }

    pub fn record_rejected_command(&self, command: &str) {
        self.order_commands_rejected.with_label_values(&[command]).inc();
    }

    pub fn record_posting(&self, kind: &str) {
        self.ledger_postings.with_label_values(&[kind]).inc();
    }

    /// Helper to record a publish saga step outcome ("ok", "failed", "skipped", "degraded")
    pub fn record_publish_step(&self, step: &str, outcome: &str) {
        self.publish_steps.with_label_values(&[step, outcome]).inc();
    }

    /// Helper to record retry attempt
    pub fn record_retry_attempt(&self, operation: &str) {
        self.retry_attempts_total.with_label_values(&[operation]).inc();
    }

    pub fn record_retry_exhausted(&self, operation: &str) {
        self.retry_failure.with_label_values(&[operation]).inc();
    }

    /// Helper to record a dead letter
    pub fn record_dead_letter(&self, event_type: &str) {
        self.dead_letters_total.inc();
        self.dead_letters_by_event_type.with_label_values(&[event_type]).inc();
    }

    pub fn update_circuit_breaker_state(&self, state: i64) {
        self.circuit_breaker_state.set(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_signature_failure();
        assert!(!metrics.registry.gather().is_empty());
    }

    #[test]
    fn test_record_webhook() {
        let metrics = Metrics::new().unwrap();
        metrics.record_webhook("order:created", 0.05, true);
        metrics.record_webhook("order:created", 0.02, false);

        let gathered = metrics.registry.gather();
        let received = gathered.iter().find(|m| m.name() == "webhook_events_received_total").unwrap();
        assert_eq!(received.metric[0].counter.value, Some(2.0));
        let failed = gathered.iter().find(|m| m.name() == "webhook_events_failed_total").unwrap();
        assert_eq!(failed.metric[0].counter.value, Some(1.0));
    }

    #[test]
    fn test_record_publish_steps() {
        let metrics = Metrics::new().unwrap();
        metrics.record_publish_step("upload_asset", "ok");
        metrics.record_publish_step("wait_for_mockups", "degraded");

        let gathered = metrics.registry.gather();
        let steps = gathered.iter().find(|m| m.name() == "publish_steps_total").unwrap();
        assert_eq!(steps.metric.len(), 2);
    }

    #[test]
    fn test_record_dead_letter() {
        let metrics = Metrics::new().unwrap();
        metrics.record_dead_letter("order:created");
        metrics.record_dead_letter("shipment:created");

        let gathered = metrics.registry.gather();
        let total = gathered.iter().find(|m| m.name() == "dead_letters_total").unwrap();
        assert_eq!(total.metric[0].counter.value, Some(2.0));
    }

    #[test]
    fn test_circuit_breaker_gauge() {
        let metrics = Metrics::new().unwrap();
        metrics.update_circuit_breaker_state(1);

        let gathered = metrics.registry.gather();
        let state = gathered.iter().find(|m| m.name() == "provider_circuit_breaker_state").unwrap();
        assert_eq!(state.metric[0].gauge.value, Some(1.0));
    }
}
