/// Prometheus metrics registry, scaled down from the teacher's
/// multi-dozen-metric registry to the handful the registry's operations
/// actually produce.
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

pub struct MetricsRegistry {
    registry: Registry,
    pub schemas_registered_total: IntCounter,
    pub lookups_total: IntCounter,
    pub compatibility_checks_total: IntCounterVec,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let registry = Registry::new();

        let schemas_registered_total = IntCounter::new(
            "registry_schemas_registered_total",
            "Total number of schema registrations that produced a new version",
        )
        .expect("metric construction");

        let lookups_total = IntCounter::new(
            "registry_lookups_total",
            "Total number of schema-by-id and schema-by-text lookups",
        )
        .expect("metric construction");

        let compatibility_checks_total = IntCounterVec::new(
            Opts::new("registry_compatibility_checks_total", "Compatibility checks by outcome"),
            &["outcome"],
        )
        .expect("metric construction");

        registry
            .register(Box::new(schemas_registered_total.clone()))
            .expect("metric registration");
        registry.register(Box::new(lookups_total.clone())).expect("metric registration");
        registry
            .register(Box::new(compatibility_checks_total.clone()))
            .expect("metric registration");

        Self {
            registry,
            schemas_registered_total,
            lookups_total,
            compatibility_checks_total,
        }
    }

    pub fn record_compatibility_check(&self, compatible: bool) {
        let outcome = if compatible { "compatible" } else { "incompatible" };
        self.compatibility_checks_total.with_label_values(&[outcome]).inc();
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .unwrap_or_else(|e| tracing::warn!(error = %e, "failed to encode metrics"));
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_output_contains_registered_metric_names() {
        let metrics = MetricsRegistry::new();
        metrics.schemas_registered_total.inc();
        metrics.record_compatibility_check(true);
        let text = metrics.encode();
        assert!(text.contains("registry_schemas_registered_total"));
        assert!(text.contains("registry_compatibility_checks_total"));
    }
}
