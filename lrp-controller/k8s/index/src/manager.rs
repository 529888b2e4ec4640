//! The redirect policy manager links policies, services, and pods.
//!
//! ```text
//! [ Policy ] -> [ Frontend ] <- [ Service ]
//!     |              |
//!     v              v
//! [ Selector ] -> [ Pod backends ]
//! ```
//!
//! Each event handler updates the relevant indices, recomputes the backends
//! of the affected frontends, and writes the resulting local redirect
//! services to the load-balancer. Every handler runs to completion under the
//! caller's write lock (see `SharedManager`), so handlers never interleave.

use crate::{
    config::{FrontendMapping, FrontendType, LrpType, PolicyConfig},
    lb::ServiceWriter,
    metrics::ServiceMetrics,
    pod::{pod_id, PodMetadata, PodPolicies},
    Error, NodeInfo, PodStore,
};
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use lrp_controller_core::{
    L3n4Addr, PodId, PolicyId, ServiceCache, ServiceId, ServiceManager, SvcType,
};
use lrp_controller_k8s_api::{self as k8s, ResourceExt};
use parking_lot::RwLock;
use std::{fmt, sync::Arc};
use tracing::{debug, instrument, trace, warn};

pub type SharedManager = Arc<RwLock<Manager>>;

/// Manages local redirect policies.
///
/// For every policy, a local redirect service is created for each frontend
/// that has at least one node-local backend pod.
pub struct Manager {
    services: ServiceWriter,
    service_cache: Arc<dyn ServiceCache>,
    pods: Arc<dyn PodStore>,
    span: tracing::Span,

    /// Frontends claimed by policies. Frontends are namespace-agnostic.
    policy_frontends: HashMap<L3n4Addr, PolicyId>,

    /// Services targeted by service-based policies.
    policy_services: HashMap<ServiceId, PolicyId>,

    /// Pods selected by policies, along with the backends they contribute.
    policy_pods: PodPolicies,

    policy_configs: HashMap<PolicyId, PolicyConfig>,
}

/// The number of entries in each of the manager's indices.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct IndexSizes {
    pub(crate) policies: usize,
    pub(crate) frontends: usize,
    pub(crate) services: usize,
    pub(crate) pods: usize,
}

// === impl Manager ===

impl Manager {
    pub fn new(
        node: Arc<NodeInfo>,
        services: Arc<dyn ServiceManager>,
        service_cache: Arc<dyn ServiceCache>,
        pods: Arc<dyn PodStore>,
    ) -> Self {
        Self {
            services: ServiceWriter::new(services, node),
            service_cache,
            pods,
            span: tracing::Span::none(),
            policy_frontends: HashMap::default(),
            policy_services: HashMap::default(),
            policy_pods: PodPolicies::default(),
            policy_configs: HashMap::default(),
        }
    }

    /// Sets the span under which all of the manager's events are recorded.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_metrics(mut self, metrics: ServiceMetrics) -> Self {
        self.services.set_metrics(metrics);
        self
    }

    pub fn shared(self) -> SharedManager {
        Arc::new(RwLock::new(self))
    }

    pub fn policy(&self, id: &PolicyId) -> Option<&PolicyConfig> {
        self.policy_configs.get(id)
    }

    /// Lists the policies that currently select a pod.
    pub fn pod_policies(&self, pod: &PodId) -> Vec<PolicyId> {
        let mut policies = self
            .policy_pods
            .get(pod)
            .into_iter()
            .flatten()
            .map(|info| info.policy.clone())
            .collect::<Vec<_>>();
        policies.sort();
        policies.dedup();
        policies
    }

    pub(crate) fn index_sizes(&self) -> IndexSizes {
        IndexSizes {
            policies: self.policy_configs.len(),
            frontends: self.policy_frontends.len(),
            services: self.policy_services.len(),
            pods: self.policy_pods.len(),
        }
    }

    // === Policy events ===

    /// Adds a local redirect policy, installing backends for any pods it
    /// already selects.
    ///
    /// Policies may not be updated: adding a policy that already exists
    /// succeeds without changing it.
    #[instrument(parent = &self.span, skip_all, fields(policy = %config.id))]
    pub fn add_redirect_policy(&mut self, config: PolicyConfig) -> Result<(), Error> {
        if self.policy_configs.contains_key(&config.id) {
            warn!("Local redirect policy updates are not handled");
            return Ok(());
        }

        self.validate(&config)?;

        debug!(
            lrp_type = ?config.lrp_type,
            frontend_type = ?config.frontend_type,
            frontends = ?config.frontend_mappings,
            selector = ?config.backend_selector,
            backend_ports = ?config.backend_ports,
            "Adding local redirect policy"
        );
        let id = config.id.clone();
        match config.lrp_type {
            LrpType::AddrBased => {
                for addr in config.resolved_frontends() {
                    self.policy_frontends.insert(addr, id.clone());
                }
            }
            LrpType::ServiceBased(ref svc) => {
                self.policy_services.insert(svc.clone(), id.clone());
            }
        }
        let lrp_type = config.lrp_type.clone();
        self.policy_configs.insert(id.clone(), config);

        match lrp_type {
            LrpType::AddrBased => self.upsert_selected_pods(&id),
            LrpType::ServiceBased(_) => self.resolve_service_frontends(&id),
        }

        Ok(())
    }

    /// Deletes a local redirect policy along with its load-balancer services.
    #[instrument(parent = &self.span, skip_all, fields(policy = %id))]
    pub fn delete_redirect_policy(&mut self, id: &PolicyId) -> Result<(), Error> {
        let config = self
            .policy_configs
            .remove(id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;
        debug!("Deleting local redirect policy");

        for addr in config.resolved_frontends() {
            self.services.delete(id, &addr);
            self.policy_frontends.remove(&addr);
        }
        if let Some(svc) = config.service() {
            self.policy_services.remove(svc);
        }

        self.policy_pods.purge_policy(id);
        Ok(())
    }

    // === Service events ===

    /// Resolves the frontends of the policy targeting `svc`, if any.
    #[instrument(parent = &self.span, skip_all, fields(service = %svc))]
    pub fn on_add_service(&mut self, svc: &ServiceId) {
        if self.policy_configs.is_empty() {
            return;
        }

        let id = match self.policy_services.get(svc) {
            Some(id) => id.clone(),
            None => return,
        };
        match self.policy_configs.get(&id) {
            Some(config) if config.check_namespace(&svc.namespace) => {}
            _ => return,
        }

        self.resolve_service_frontends(&id);
    }

    /// Tears down the load-balancer services of the policy targeting `svc`.
    ///
    /// The policy remains and its frontends become unresolved until the
    /// service is added again. Pods stay recorded against the policy, and
    /// their backends are rebuilt when the service is resolved.
    #[instrument(parent = &self.span, skip_all, fields(service = %svc))]
    pub fn on_delete_service(&mut self, svc: &ServiceId) {
        if self.policy_configs.is_empty() {
            return;
        }

        let id = match self.policy_services.get(svc) {
            Some(id) => id.clone(),
            None => return,
        };
        let config = match self.policy_configs.get_mut(&id) {
            Some(config) => config,
            None => return,
        };

        debug!(policy = %id, "Unresolving local redirect frontends");
        for addr in config.resolved_frontends() {
            self.services.delete(&id, &addr);
            self.policy_frontends.remove(&addr);
        }

        if config.frontend_type == FrontendType::AllPorts {
            config.frontend_mappings.clear();
        } else {
            for mapping in config.frontend_mappings.iter_mut() {
                mapping.addr.ip = None;
                mapping.backends.clear();
            }
        }
    }

    // === Pod events ===

    /// Processes a newly-observed pod.
    ///
    /// Pods that are already tracked are ignored: repeated adds are common
    /// when watches resync, and changes are handled by `on_update_pod`.
    #[instrument(
        parent = &self.span,
        skip_all,
        fields(ns = ?pod.metadata.namespace, name = ?pod.metadata.name)
    )]
    pub fn on_add_pod(&mut self, pod: &k8s::Pod) {
        if self.policy_configs.is_empty() {
            return;
        }

        if self.policy_pods.contains(&pod_id(pod)) {
            trace!("Pod already tracked");
            return;
        }

        self.update_pod(pod);
    }

    #[instrument(
        parent = &self.span,
        skip_all,
        fields(ns = ?pod.metadata.namespace, name = ?pod.metadata.name)
    )]
    pub fn on_update_pod(&mut self, pod: &k8s::Pod) {
        self.update_pod(pod);
    }

    #[instrument(parent = &self.span, skip_all, fields(pod = %id))]
    pub fn on_delete_pod(&mut self, id: &PodId) {
        if self.policy_configs.is_empty() {
            return;
        }

        if let Some(policies) = self.policy_pods.take(id) {
            debug!(policies = policies.len(), "Removing pod backends");
            for info in policies {
                if let Some(config) = self.policy_configs.get_mut(&info.policy) {
                    config.remove_backends(&self.services, &info.backends);
                }
            }
        }
    }

    /// Drops the pod's previous contributions and then matches it against
    /// every policy.
    fn update_pod(&mut self, pod: &k8s::Pod) {
        if self.policy_configs.is_empty() {
            return;
        }

        let pod = match PodMetadata::from_pod(pod) {
            Ok(pod) => pod,
            Err(error) => {
                debug!(%error, "Ignoring pod");
                return;
            }
        };

        if let Some(policies) = self.policy_pods.take(&pod.id) {
            for info in policies {
                if let Some(config) = self.policy_configs.get_mut(&info.policy) {
                    config.remove_backends(&self.services, &info.backends);
                }
            }
        }

        for config in self.policy_configs.values_mut() {
            if config.selects_pod(&pod) {
                debug!(policy = %config.id, pod = %pod.id, "Policy selects pod");
                config.upsert_backends(
                    &self.services,
                    &mut self.policy_pods,
                    std::slice::from_ref(&pod),
                );
            }
        }
    }

    // === helpers ===

    /// Checks that the policy does not claim a frontend or service that
    /// another policy already claims.
    fn validate(&self, config: &PolicyConfig) -> Result<(), Error> {
        match config.lrp_type {
            LrpType::AddrBased => {
                for addr in config.resolved_frontends() {
                    if let Some(existing) = self.policy_frontends.get(&addr) {
                        if existing.name != config.id.name {
                            return Err(Error::FrontendConflict {
                                frontend: addr,
                                existing: existing.clone(),
                            });
                        }
                    }
                }
            }

            // Only one policy may target a service within a namespace.
            LrpType::ServiceBased(ref svc) => {
                let conflict = self
                    .policy_services
                    .get(svc)
                    .and_then(|id| self.policy_configs.get(id))
                    .map(|existing| {
                        !config.id.namespace.is_empty()
                            && existing.id.namespace == config.id.namespace
                    })
                    .unwrap_or(false);
                if conflict {
                    return Err(Error::ServiceConflict {
                        service: svc.clone(),
                        namespace: config.id.namespace.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Resolves a service-based policy's frontends from the service cache and
    /// rebuilds its backends.
    fn resolve_service_frontends(&mut self, id: &PolicyId) {
        let config = match self.policy_configs.get_mut(id) {
            Some(config) => config,
            None => return,
        };
        let svc = match config.service() {
            Some(svc) => svc.clone(),
            None => return,
        };

        // Frontends that currently have a load-balancer service.
        let active = config
            .frontend_mappings
            .iter()
            .filter(|m| m.addr.is_resolved() && !m.backends.is_empty())
            .map(|m| m.addr)
            .collect::<HashSet<_>>();
        let previous = config.resolved_frontends().collect::<Vec<_>>();

        match config.frontend_type {
            FrontendType::AllPorts => {
                config.frontend_mappings = self
                    .service_cache
                    .service_addrs(&svc, SvcType::ClusterIp)
                    .into_iter()
                    .map(|(name, addr)| FrontendMapping::new(addr, name))
                    .collect();
            }
            FrontendType::SinglePort | FrontendType::NamedPorts => {
                let ip = self
                    .service_cache
                    .service_frontend_ip(&svc, SvcType::ClusterIp);
                for mapping in config.frontend_mappings.iter_mut() {
                    mapping.addr.ip = ip;
                    mapping.backends.clear();
                }
            }
        }
        debug!(
            policy = %id,
            service = %svc,
            frontends = ?config.frontend_mappings,
            "Resolved service frontends"
        );

        for addr in previous {
            if !config.frontend_mappings.iter().any(|m| m.addr == addr) {
                self.services.delete(id, &addr);
                self.policy_frontends.remove(&addr);
            }
        }
        for addr in config.resolved_frontends() {
            self.policy_frontends.insert(addr, id.clone());
        }

        // Backends are rebuilt from scratch.
        self.policy_pods.purge_policy(id);
        let pods = local_pods_for_policy(config, &*self.pods);
        config.upsert_backends(&self.services, &mut self.policy_pods, &pods);

        for mapping in config.frontend_mappings.iter() {
            if mapping.backends.is_empty() && active.contains(&mapping.addr) {
                self.services.delete(id, &mapping.addr);
            }
        }
    }

    /// Installs backends for every known pod that the policy selects.
    fn upsert_selected_pods(&mut self, id: &PolicyId) {
        let config = match self.policy_configs.get_mut(id) {
            Some(config) => config,
            None => return,
        };

        let pods = local_pods_for_policy(config, &*self.pods);
        if pods.is_empty() {
            debug!(policy = %id, "No pods selected");
            return;
        }
        config.upsert_backends(&self.services, &mut self.policy_pods, &pods);
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("policy_frontends", &self.policy_frontends)
            .field("policy_services", &self.policy_services)
            .field("policy_pods", &self.policy_pods)
            .field("policy_configs", &self.policy_configs)
            .finish_non_exhaustive()
    }
}

impl kubert::index::IndexNamespacedResource<k8s::Pod> for Manager {
    fn apply(&mut self, pod: k8s::Pod) {
        self.on_update_pod(&pod)
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.on_delete_pod(&PodId::new(namespace, name))
    }
}

/// The service cache must be updated before the manager observes a service.
impl kubert::index::IndexNamespacedResource<k8s::Service> for Manager {
    fn apply(&mut self, svc: k8s::Service) {
        let id = ServiceId::new(svc.namespace().unwrap_or_default(), svc.name_any());
        self.on_add_service(&id)
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.on_delete_service(&ServiceId::new(namespace, name))
    }
}

/// Lists the known pods that a policy selects. Pods whose metadata cannot be
/// computed are skipped.
fn local_pods_for_policy(config: &PolicyConfig, pods: &dyn PodStore) -> Vec<PodMetadata> {
    pods.list()
        .iter()
        .filter(|pod| config.check_namespace(pod.namespace().as_deref().unwrap_or_default()))
        .filter_map(|pod| match PodMetadata::from_pod(pod) {
            Ok(pod) => Some(pod),
            Err(error) => {
                trace!(%error, "Skipping pod");
                None
            }
        })
        .filter(|pod| config.selects_pod(pod))
        .collect()
}
