use crate::{
    config::{FrontendMapping, FrontendType, PolicyConfig},
    lb::ServiceWriter,
    pod::{PodMetadata, PodPolicies},
    NodeInfo,
};
use lrp_controller_core::{Backend, L3n4Addr, L4Addr, PolicyId};
use tracing::{debug, trace};

// === impl PolicyConfig ===

impl PolicyConfig {
    /// Installs the backends that `pods` provide for each of the policy's
    /// resolved frontends, recording each pod's contribution in `index`.
    pub(crate) fn upsert_backends(
        &mut self,
        services: &ServiceWriter,
        index: &mut PodPolicies,
        pods: &[PodMetadata],
    ) {
        match self.effective_frontend_type() {
            FrontendType::SinglePort | FrontendType::AllPorts => {
                self.upsert_single_port(services, index, pods)
            }
            FrontendType::NamedPorts => self.upsert_named_ports(services, index, pods),
        }
    }

    fn upsert_single_port(
        &mut self,
        services: &ServiceWriter,
        index: &mut PodPolicies,
        pods: &[PodMetadata],
    ) {
        let port = match self.backend_ports.first() {
            Some(port) => port.l4,
            None => {
                debug!(policy = %self.id, "Policy has no backend ports");
                return;
            }
        };
        let frontend = match self.frontend_mappings.first_mut() {
            Some(frontend) if frontend.addr.is_resolved() => frontend,
            _ => {
                trace!(policy = %self.id, "Frontend is not resolved");
                return;
            }
        };

        for pod in pods {
            let backends = pod_backends(services.node(), &frontend.addr, pod, port);
            install(services, index, &self.id, frontend, pod, backends);
        }
    }

    /// Backends are matched to frontends by port name. A pod only serves a
    /// frontend if it declares a container port with the same name.
    fn upsert_named_ports(
        &mut self,
        services: &ServiceWriter,
        index: &mut PodPolicies,
        pods: &[PodMetadata],
    ) {
        for frontend in self.frontend_mappings.iter_mut() {
            if !frontend.addr.is_resolved() {
                continue;
            }
            let port = match self.backend_ports_by_name.get(&frontend.port_name) {
                Some(port) => *port,
                None => {
                    trace!(policy = %self.id, name = %frontend.port_name, "No backend port for frontend");
                    continue;
                }
            };
            if port.protocol != frontend.addr.l4.protocol {
                debug!(
                    policy = %self.id,
                    frontend = %frontend.addr,
                    backend = %port,
                    "Frontend and backend protocols differ"
                );
                continue;
            }

            for pod in pods {
                if !pod.named_ports.contains_key(&frontend.port_name) {
                    continue;
                }
                let backends = pod_backends(services.node(), &frontend.addr, pod, port);
                install(services, index, &self.id, frontend, pod, backends);
            }
        }
    }

    /// Removes `backends` from every resolved frontend, updating or deleting
    /// the load-balancer service of each frontend that changed.
    pub(crate) fn remove_backends(&mut self, services: &ServiceWriter, backends: &[Backend]) {
        for frontend in self.frontend_mappings.iter_mut() {
            if !frontend.addr.is_resolved() {
                continue;
            }

            let before = frontend.backends.len();
            frontend.backends.retain(|b| !backends.contains(b));
            if frontend.backends.len() == before {
                continue;
            }

            services.sync(&self.id, frontend);
        }
    }
}

/// Builds a backend for each of the pod's IPs in the frontend's address
/// family. Families that are disabled on the node are skipped.
fn pod_backends(
    node: &NodeInfo,
    frontend: &L3n4Addr,
    pod: &PodMetadata,
    port: L4Addr,
) -> Vec<Backend> {
    let frontend_v4 = match frontend.ip {
        Some(ip) => ip.is_ipv4(),
        None => return Vec::new(),
    };

    pod.ips
        .iter()
        .filter(|ip| ip.is_ipv4() == frontend_v4 && node.family_enabled(**ip))
        .map(|ip| Backend::new(*ip, port))
        .collect()
}

/// Merges a pod's backends into the frontend and writes the frontend's
/// service.
fn install(
    services: &ServiceWriter,
    index: &mut PodPolicies,
    policy: &PolicyId,
    frontend: &mut FrontendMapping,
    pod: &PodMetadata,
    backends: Vec<Backend>,
) {
    if backends.is_empty() {
        trace!(%policy, pod = %pod.id, frontend = %frontend.addr, "Pod has no backends for frontend");
        return;
    }

    let mut desired = frontend.backends.clone();
    for backend in backends.iter() {
        if !desired.contains(backend) {
            desired.push(*backend);
        }
    }
    frontend.backends = desired;
    index.record(pod.id.clone(), policy.clone(), backends);

    services.upsert(policy, frontend);
}
