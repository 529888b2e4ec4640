//! Local redirect policy configurations.
//!
//! A `PolicyConfig` is built from an already-sanitized policy resource. Once
//! it has been handed to the `Manager`, only the manager mutates it: frontend
//! IPs are filled in as services are resolved and each frontend's backends are
//! replaced as pods come and go.

use crate::pod::PodMetadata;
use ahash::AHashMap as HashMap;
use lrp_controller_core::{Backend, L3n4Addr, L4Addr, PolicyId, ServiceId};
use lrp_controller_k8s_api::Selector;

/// How a policy's frontends are selected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LrpType {
    /// Frontends are explicit addresses.
    AddrBased,

    /// Frontends are the frontends of a cluster service.
    ServiceBased(ServiceId),
}

/// How a policy's frontends are mapped to backend ports.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrontendType {
    /// One frontend maps to one backend port.
    SinglePort,

    /// Frontends map to backend ports by port name.
    NamedPorts,

    /// Every port of the targeted service is a frontend.
    AllPorts,
}

/// A backend port declared by a policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendPort {
    /// Empty for unnamed ports.
    pub name: String,
    pub l4: L4Addr,
}

/// A frontend port declared by a service-based policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrontendPort {
    /// Empty for unnamed ports.
    pub name: String,
    pub l4: L4Addr,
}

/// Binds a frontend to the backends currently serving it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrontendMapping {
    pub(crate) addr: L3n4Addr,

    /// The logical port name. Empty for unnamed ports.
    pub(crate) port_name: String,

    /// Replaced wholesale whenever backends are installed.
    pub(crate) backends: Vec<Backend>,
}

/// The state of a single local redirect policy.
#[derive(Clone, Debug)]
pub struct PolicyConfig {
    pub(crate) id: PolicyId,
    pub(crate) lrp_type: LrpType,
    pub(crate) frontend_type: FrontendType,
    pub(crate) frontend_mappings: Vec<FrontendMapping>,
    pub(crate) backend_selector: Selector,
    pub(crate) backend_ports: Vec<BackendPort>,

    /// Only populated for named backend ports.
    pub(crate) backend_ports_by_name: HashMap<String, L4Addr>,
}

// === impl FrontendMapping ===

impl FrontendMapping {
    pub fn new(addr: L3n4Addr, port_name: impl Into<String>) -> Self {
        Self {
            addr,
            port_name: port_name.into(),
            backends: Vec::new(),
        }
    }

    pub fn addr(&self) -> &L3n4Addr {
        &self.addr
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }
}

// === impl PolicyConfig ===

impl PolicyConfig {
    /// Builds a policy that redirects explicit frontend addresses.
    ///
    /// A single frontend maps to the single backend port; multiple frontends
    /// are matched to backend ports by name.
    pub fn addr_based(
        id: PolicyId,
        frontends: impl IntoIterator<Item = FrontendMapping>,
        backend_selector: Selector,
        backend_ports: Vec<BackendPort>,
    ) -> Self {
        let frontend_mappings = frontends.into_iter().collect::<Vec<_>>();
        let frontend_type = if frontend_mappings.len() > 1 {
            FrontendType::NamedPorts
        } else {
            FrontendType::SinglePort
        };
        Self::new(
            id,
            LrpType::AddrBased,
            frontend_type,
            frontend_mappings,
            backend_selector,
            backend_ports,
        )
    }

    /// Builds a policy that redirects the frontends of `service`.
    ///
    /// When no frontend ports are declared, every port of the service is
    /// redirected once the service is resolved.
    pub fn service_based(
        id: PolicyId,
        service: ServiceId,
        frontend_ports: impl IntoIterator<Item = FrontendPort>,
        backend_selector: Selector,
        backend_ports: Vec<BackendPort>,
    ) -> Self {
        let frontend_mappings = frontend_ports
            .into_iter()
            .map(|FrontendPort { name, l4 }| FrontendMapping::new(L3n4Addr::unresolved(l4), name))
            .collect::<Vec<_>>();
        let frontend_type = match frontend_mappings.len() {
            0 => FrontendType::AllPorts,
            1 => FrontendType::SinglePort,
            _ => FrontendType::NamedPorts,
        };
        Self::new(
            id,
            LrpType::ServiceBased(service),
            frontend_type,
            frontend_mappings,
            backend_selector,
            backend_ports,
        )
    }

    fn new(
        id: PolicyId,
        lrp_type: LrpType,
        frontend_type: FrontendType,
        frontend_mappings: Vec<FrontendMapping>,
        backend_selector: Selector,
        backend_ports: Vec<BackendPort>,
    ) -> Self {
        let backend_ports_by_name = backend_ports
            .iter()
            .filter(|p| !p.name.is_empty())
            .map(|p| (p.name.clone(), p.l4))
            .collect();
        Self {
            id,
            lrp_type,
            frontend_type,
            frontend_mappings,
            backend_selector,
            backend_ports,
            backend_ports_by_name,
        }
    }

    pub fn id(&self) -> &PolicyId {
        &self.id
    }

    pub fn lrp_type(&self) -> &LrpType {
        &self.lrp_type
    }

    pub fn frontend_type(&self) -> FrontendType {
        self.frontend_type
    }

    pub fn frontend_mappings(&self) -> &[FrontendMapping] {
        &self.frontend_mappings
    }

    pub fn backend_ports(&self) -> &[BackendPort] {
        &self.backend_ports
    }

    pub(crate) fn service(&self) -> Option<&ServiceId> {
        match self.lrp_type {
            LrpType::ServiceBased(ref svc) => Some(svc),
            LrpType::AddrBased => None,
        }
    }

    /// Policies without a namespace apply to all namespaces.
    pub(crate) fn check_namespace(&self, namespace: &str) -> bool {
        self.id.namespace.is_empty() || self.id.namespace == namespace
    }

    pub(crate) fn selects_pod(&self, pod: &PodMetadata) -> bool {
        self.check_namespace(&pod.id.namespace) && self.backend_selector.matches(&pod.labels)
    }

    /// The port-mapping strategy to use with the currently known frontends.
    ///
    /// Kubernetes requires the ports of multi-port services to be named, so
    /// a service with several ports is mapped by name. A service with a
    /// single port may leave it unnamed.
    pub(crate) fn effective_frontend_type(&self) -> FrontendType {
        match self.frontend_type {
            FrontendType::AllPorts if self.frontend_mappings.len() > 1 => FrontendType::NamedPorts,
            FrontendType::AllPorts => FrontendType::SinglePort,
            ty => ty,
        }
    }

    /// Iterates over the addresses of frontends that have been resolved.
    pub(crate) fn resolved_frontends(&self) -> impl Iterator<Item = L3n4Addr> + '_ {
        self.frontend_mappings
            .iter()
            .map(|m| m.addr)
            .filter(L3n4Addr::is_resolved)
    }
}
