//! Handshake observability counters, registered against a caller-supplied `prometheus::Registry`
//! the same way `components::binary_port::metrics::Metrics::new(registry)` does.

use prometheus::{IntCounter, IntGauge, Registry};

/// Handshake metrics: a monotonic attempt counter and a live-pending gauge.
///
/// `num_pending_handshakes` is kept in lock-step with [`crate::pending::PendingTable`]'s size by
/// the [`crate::handshaker::Handshaker`] at every insert/remove; `PendingTable::len()` remains the
/// ground truth, this gauge just exports it.
pub struct Metrics {
    pub(crate) num_handshakes: IntCounter,
    pub(crate) num_pending_handshakes: IntGauge,
}

impl Metrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let num_handshakes = IntCounter::new(
            "handshakes_total",
            "total number of handshake attempts, regardless of outcome",
        )?;
        let num_pending_handshakes = IntGauge::new(
            "handshakes_pending",
            "number of handshakes awaiting a terminal event",
        )?;
        registry.register(Box::new(num_handshakes.clone()))?;
        registry.register(Box::new(num_pending_handshakes.clone()))?;
        Ok(Self {
            num_handshakes,
            num_pending_handshakes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_both_metrics_without_name_collisions() {
        let registry = Registry::new();
        let metrics = Metrics::new(&registry).unwrap();
        metrics.num_handshakes.inc();
        metrics.num_pending_handshakes.inc();
        assert_eq!(metrics.num_handshakes.get(), 1);
        assert_eq!(metrics.num_pending_handshakes.get(), 1);
    }
}
