use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};
use tracing::warn;

use super::registry::MetricsRegistry;

/// Counters and histograms for the investigation pipeline.
#[derive(Clone)]
pub struct ScreeningMetrics {
    pub screenings: IntCounterVec,
    pub sar_terminations: IntCounterVec,
    pub provider_calls: IntCounterVec,
    pub cache_decisions: IntCounterVec,
    pub circuit_transitions: IntCounterVec,
    pub compliance_denials: IntCounterVec,
    pub alerts: IntCounterVec,
    pub errors: IntCounterVec,
    pub screening_duration_seconds: HistogramVec,
    pub provider_latency_seconds: HistogramVec,
}

impl ScreeningMetrics {
    pub fn new(registry: &MetricsRegistry) -> Self {
        let screenings = IntCounterVec::new(
            Opts::new("screenings_total", "Screenings by lifecycle outcome"),
            &["outcome"],
        )
        .expect("screenings_total opts");

        let sar_terminations = IntCounterVec::new(
            Opts::new(
                "sar_terminations_total",
                "SAR loop terminations by info type and reason",
            ),
            &["info_type", "reason"],
        )
        .expect("sar_terminations_total opts");

        let provider_calls = IntCounterVec::new(
            Opts::new("provider_calls_total", "Provider calls by provider and outcome"),
            &["provider", "outcome"],
        )
        .expect("provider_calls_total opts");

        let cache_decisions = IntCounterVec::new(
            Opts::new("cache_decisions_total", "Cache lookups by decision"),
            &["decision"],
        )
        .expect("cache_decisions_total opts");

        let circuit_transitions = IntCounterVec::new(
            Opts::new(
                "circuit_transitions_total",
                "Circuit breaker transitions by provider and new state",
            ),
            &["provider", "state"],
        )
        .expect("circuit_transitions_total opts");

        let compliance_denials = IntCounterVec::new(
            Opts::new(
                "compliance_denials_total",
                "Checks denied by the compliance gate",
            ),
            &["check_type"],
        )
        .expect("compliance_denials_total opts");

        let alerts = IntCounterVec::new(
            Opts::new("alerts_total", "Monitoring alerts by kind and severity"),
            &["kind", "severity"],
        )
        .expect("alerts_total opts");

        let errors = IntCounterVec::new(
            Opts::new("errors_total", "Errors by taxonomy kind"),
            &["kind"],
        )
        .expect("errors_total opts");

        let screening_duration_seconds = HistogramVec::new(
            HistogramOpts::new("screening_duration_seconds", "End-to-end screening duration")
                .buckets(vec![1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 1800.0]),
            &["tier"],
        )
        .expect("screening_duration_seconds opts");

        let provider_latency_seconds = HistogramVec::new(
            HistogramOpts::new("provider_latency_seconds", "Provider call latency")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["provider"],
        )
        .expect("provider_latency_seconds opts");

        let metrics = Self {
            screenings,
            sar_terminations,
            provider_calls,
            cache_decisions,
            circuit_transitions,
            compliance_denials,
            alerts,
            errors,
            screening_duration_seconds,
            provider_latency_seconds,
        };

        metrics.register_all(registry);
        metrics
    }

    fn register_all(&self, registry: &MetricsRegistry) {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(self.screenings.clone()),
            Box::new(self.sar_terminations.clone()),
            Box::new(self.provider_calls.clone()),
            Box::new(self.cache_decisions.clone()),
            Box::new(self.circuit_transitions.clone()),
            Box::new(self.compliance_denials.clone()),
            Box::new(self.alerts.clone()),
            Box::new(self.errors.clone()),
            Box::new(self.screening_duration_seconds.clone()),
            Box::new(self.provider_latency_seconds.clone()),
        ];

        for collector in collectors {
            if let Err(e) = registry.register_boxed(collector) {
                warn!("Failed to register metric: {}", e);
            }
        }
    }
}
