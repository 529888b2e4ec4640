use crate::SharedManager;
use prometheus_client::{
    collector::Collector,
    encoding::{DescriptorEncoder, EncodeLabelSet, EncodeLabelValue, EncodeMetric},
    metrics::{counter::Counter, family::Family, gauge::ConstGauge, MetricType},
    registry::Registry,
};

/// Counts the service updates issued to the load-balancer.
#[derive(Clone, Debug, Default)]
pub struct ServiceMetrics {
    operations: Family<OperationLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct OperationLabels {
    op: Operation,
    result: OpResult,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub(crate) enum Operation {
    Upsert,
    Delete,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub(crate) enum OpResult {
    Ok,
    NotFound,
    Error,
}

#[derive(Debug)]
struct Instrumented(SharedManager);

/// Registers a collector that reports the sizes of the manager's indices.
pub fn register(reg: &mut Registry, manager: SharedManager) {
    reg.register_collector(Box::new(Instrumented(manager)));
}

// === impl ServiceMetrics ===

impl ServiceMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let operations = Family::default();
        prom.register(
            "service_operations",
            "Count of local redirect service upserts and deletes",
            operations.clone(),
        );
        Self { operations }
    }

    pub(crate) fn record(&self, op: Operation, result: OpResult) {
        self.operations
            .get_or_create(&OperationLabels { op, result })
            .inc();
    }
}

// === impl Instrumented ===

impl Collector for Instrumented {
    fn encode(&self, mut encoder: DescriptorEncoder<'_>) -> Result<(), std::fmt::Error> {
        let sizes = self.0.read().index_sizes();

        for (name, help, size) in [
            (
                "policy_index_size",
                "The number of local redirect policies",
                sizes.policies,
            ),
            (
                "frontend_index_size",
                "The number of frontends claimed by local redirect policies",
                sizes.frontends,
            ),
            (
                "service_index_size",
                "The number of services targeted by local redirect policies",
                sizes.services,
            ),
            (
                "pod_index_size",
                "The number of pods selected by local redirect policies",
                sizes.pods,
            ),
        ] {
            let gauge_encoder = encoder.encode_descriptor(name, help, None, MetricType::Gauge)?;
            ConstGauge::new(size as u32).encode(gauge_encoder)?;
        }

        Ok(())
    }
}
