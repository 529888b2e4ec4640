use crate::{
    config::FrontendMapping,
    metrics::{OpResult, Operation, ServiceMetrics},
    NodeInfo,
};
use lrp_controller_core::{
    lb::LOCAL_REDIRECT_SVC_SUFFIX, L3n4Addr, LbBackend, PolicyId, ServiceManager, Svc, SvcType,
    TrafficPolicy,
};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Writes local redirect services to the load-balancer.
///
/// Failures are logged and counted but not returned. The manager's indices
/// remain the source of truth.
pub(crate) struct ServiceWriter {
    services: Arc<dyn ServiceManager>,
    node: Arc<NodeInfo>,
    metrics: ServiceMetrics,
}

impl ServiceWriter {
    pub(crate) fn new(services: Arc<dyn ServiceManager>, node: Arc<NodeInfo>) -> Self {
        Self {
            services,
            node,
            metrics: ServiceMetrics::default(),
        }
    }

    pub(crate) fn set_metrics(&mut self, metrics: ServiceMetrics) {
        self.metrics = metrics;
    }

    pub(crate) fn node(&self) -> &NodeInfo {
        &self.node
    }

    /// Upserts the frontend's service if it has backends and deletes it
    /// otherwise.
    pub(crate) fn sync(&self, policy: &PolicyId, frontend: &FrontendMapping) {
        if frontend.backends.is_empty() {
            self.delete(policy, &frontend.addr);
        } else {
            self.upsert(policy, frontend);
        }
    }

    pub(crate) fn upsert(&self, policy: &PolicyId, frontend: &FrontendMapping) {
        let svc = Svc {
            name: format!("{}{}", policy.name, LOCAL_REDIRECT_SVC_SUFFIX),
            namespace: policy.namespace.clone(),
            svc_type: SvcType::LocalRedirect,
            frontend: frontend.addr,
            frontend_id: 0,
            backends: frontend
                .backends
                .iter()
                .map(|addr| LbBackend {
                    node_name: self.node.name.clone(),
                    addr: *addr,
                })
                .collect(),
            traffic_policy: TrafficPolicy::Cluster,
        };

        match self.services.upsert_service(&svc) {
            Ok((changed, id)) => {
                debug!(%policy, frontend = %svc.frontend, backends = svc.backends.len(), changed, id, "Upserted local redirect service");
                self.metrics.record(Operation::Upsert, OpResult::Ok);
            }
            Err(error) => {
                error!(%policy, frontend = %svc.frontend, %error, "Failed to upsert local redirect service");
                self.metrics.record(Operation::Upsert, OpResult::Error);
            }
        }
    }

    pub(crate) fn delete(&self, policy: &PolicyId, frontend: &L3n4Addr) {
        match self.services.delete_service(frontend) {
            Ok(true) => {
                debug!(%policy, %frontend, "Deleted local redirect service");
                self.metrics.record(Operation::Delete, OpResult::Ok);
            }
            Ok(false) => {
                debug!(%policy, %frontend, "Local redirect service not found");
                self.metrics.record(Operation::Delete, OpResult::NotFound);
            }
            Err(error) => {
                warn!(%policy, %frontend, %error, "Failed to delete local redirect service");
                self.metrics.record(Operation::Delete, OpResult::Error);
            }
        }
    }
}
