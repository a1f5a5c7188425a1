use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub lifecycle_transitions_total: IntCounterVec,
    pub lifecycle_latency_seconds: HistogramVec,
    pub driver_earnings_cents_total: IntCounter,
    pub active_time_logs: IntGauge,
    pub proof_scores_total: IntCounterVec,
    pub receipt_risk_total: IntCounterVec,
    pub disputes_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let lifecycle_transitions_total = IntCounterVec::new(
            Opts::new(
                "lifecycle_transitions_total",
                "Lifecycle operations by operation and outcome",
            ),
            &["operation", "outcome"],
        )
        .expect("valid lifecycle_transitions_total metric");

        let lifecycle_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "lifecycle_latency_seconds",
                "Latency of lifecycle transactions in seconds",
            ),
            &["operation"],
        )
        .expect("valid lifecycle_latency_seconds metric");

        let driver_earnings_cents_total = IntCounter::new(
            "driver_earnings_cents_total",
            "Driver earnings recorded on completion, in cents",
        )
        .expect("valid driver_earnings_cents_total metric");

        let active_time_logs =
            IntGauge::new("active_time_logs", "Currently open driver time logs")
                .expect("valid active_time_logs metric");

        let proof_scores_total = IntCounterVec::new(
            Opts::new("proof_scores_total", "Receipt proof scores by verification status"),
            &["status"],
        )
        .expect("valid proof_scores_total metric");

        let receipt_risk_total = IntCounterVec::new(
            Opts::new("receipt_risk_total", "Receipt risk decisions by status"),
            &["status"],
        )
        .expect("valid receipt_risk_total metric");

        let disputes_total = IntCounterVec::new(
            Opts::new("disputes_total", "Dispute submissions by outcome"),
            &["outcome"],
        )
        .expect("valid disputes_total metric");

        registry
            .register(Box::new(lifecycle_transitions_total.clone()))
            .expect("register lifecycle_transitions_total");
        registry
            .register(Box::new(lifecycle_latency_seconds.clone()))
            .expect("register lifecycle_latency_seconds");
        registry
            .register(Box::new(driver_earnings_cents_total.clone()))
            .expect("register driver_earnings_cents_total");
        registry
            .register(Box::new(active_time_logs.clone()))
            .expect("register active_time_logs");
        registry
            .register(Box::new(proof_scores_total.clone()))
            .expect("register proof_scores_total");
        registry
            .register(Box::new(receipt_risk_total.clone()))
            .expect("register receipt_risk_total");
        registry
            .register(Box::new(disputes_total.clone()))
            .expect("register disputes_total");

        Self {
            registry,
            lifecycle_transitions_total,
            lifecycle_latency_seconds,
            driver_earnings_cents_total,
            active_time_logs,
            proof_scores_total,
            receipt_risk_total,
            disputes_total,
        }
    }

    pub fn record_transition(&self, operation: &str, outcome: &str, elapsed_seconds: f64) {
        self.lifecycle_transitions_total
            .with_label_values(&[operation, outcome])
            .inc();
        self.lifecycle_latency_seconds
            .with_label_values(&[operation])
            .observe(elapsed_seconds);
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
