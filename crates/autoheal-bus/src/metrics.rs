//! ---
//! ah_section: "02-messaging-ipc-data-model"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Event envelope and topic vocabulary for the healing bus."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

/// Prometheus metric handles for bus activity.
#[derive(Clone)]
pub struct BusMetrics {
    published: IntCounterVec,
    delivered: IntCounter,
    faults: IntCounter,
}

impl BusMetrics {
    /// Register bus metrics with the provided registry.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let published = IntCounterVec::new(
            Opts::new("autoheal_bus_published_total", "Messages published per topic"),
            &["topic"],
        )?;
        let delivered = IntCounter::with_opts(Opts::new(
            "autoheal_bus_delivered_total",
            "Successful subscriber deliveries",
        ))?;
        let faults = IntCounter::with_opts(Opts::new(
            "autoheal_bus_subscriber_faults_total",
            "Subscriber errors and panics contained by the bus",
        ))?;

        registry.register(Box::new(published.clone()))?;
        registry.register(Box::new(delivered.clone()))?;
        registry.register(Box::new(faults.clone()))?;

        Ok(Self {
            published,
            delivered,
            faults,
        })
    }

    pub fn observe_published(&self, topic: &str) {
        self.published.with_label_values(&[topic]).inc();
    }

    pub fn observe_delivered(&self) {
        self.delivered.inc();
    }

    pub fn observe_fault(&self) {
        self.faults.inc();
    }
}

impl std::fmt::Debug for BusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exporter_registers_families() {
        let registry = Registry::new();
        let metrics = BusMetrics::register(&registry).expect("register metrics");
        metrics.observe_published("deployments");
        metrics.observe_delivered();
        metrics.observe_fault();

        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "autoheal_bus_published_total"));
        assert!(families
            .iter()
            .any(|f| f.get_name() == "autoheal_bus_subscriber_faults_total"));
    }
}
