
use crate::{
    BackendPort, FrontendMapping, FrontendPort, Manager, NodeInfo, PodStore, PolicyConfig,
    SharedManager,
};
use ahash::AHashMap as HashMap;
use lrp_controller_core::{
    L3n4Addr, L4Addr, LbId, PodId, PolicyId, ServiceCache, ServiceId, ServiceManager, Svc,
    SvcType,
};
use lrp_controller_k8s_api::{self as k8s, Selector};
use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    net::IpAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// Wires a manager to in-memory collaborators.
pub(crate) struct Fixture {
    pub(crate) manager: SharedManager,
    pub(crate) lb: Arc<MockLb>,
    pub(crate) services: Arc<MockServices>,
    pub(crate) pods: Arc<MockPods>,
}

/// Records the services written to the load-balancer, keyed by frontend.
#[derive(Debug, Default)]
pub(crate) struct MockLb {
    state: Mutex<LbState>,
    fail: AtomicBool,
}

#[derive(Debug, Default)]
struct LbState {
    services: HashMap<L3n4Addr, Svc>,
    upserts: usize,
    deletes: usize,
}

#[derive(Debug, Default)]
pub(crate) struct MockServices {
    services: Mutex<HashMap<ServiceId, (IpAddr, BTreeMap<String, L4Addr>)>>,
}

#[derive(Debug, Default)]
pub(crate) struct MockPods {
    pods: Mutex<Vec<Arc<k8s::Pod>>>,
}

// === impl Fixture ===

impl Fixture {
    pub(crate) fn new() -> Self {
        Self::with_node(NodeInfo {
            name: "node-0".to_string(),
            enable_ipv4: true,
            enable_ipv6: false,
        })
    }

    pub(crate) fn with_node(node: NodeInfo) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let lb = Arc::new(MockLb::default());
        let services = Arc::new(MockServices::default());
        let pods = Arc::new(MockPods::default());
        let manager = Manager::new(
            Arc::new(node),
            lb.clone(),
            services.clone(),
            pods.clone(),
        )
        .with_span(tracing::info_span!("lrp"))
        .shared();
        Self {
            manager,
            lb,
            services,
            pods,
        }
    }

    pub(crate) fn add_policy(&self, config: PolicyConfig) -> Result<(), crate::Error> {
        self.manager.write().add_redirect_policy(config)
    }

    /// Adds a pod to the store before notifying the manager.
    pub(crate) fn add_pod(&self, pod: k8s::Pod) {
        self.pods.insert(pod.clone());
        self.manager.write().on_add_pod(&pod);
    }

    pub(crate) fn update_pod(&self, pod: k8s::Pod) {
        self.pods.insert(pod.clone());
        self.manager.write().on_update_pod(&pod);
    }

    pub(crate) fn delete_pod(&self, ns: &str, name: &str) {
        self.pods.remove(ns, name);
        self.manager.write().on_delete_pod(&PodId::new(ns, name));
    }

    /// Adds a service to the cache before notifying the manager.
    pub(crate) fn add_service(
        &self,
        ns: &str,
        name: &str,
        ip: &str,
        ports: impl IntoIterator<Item = (&'static str, L4Addr)>,
    ) {
        let id = ServiceId::new(ns, name);
        self.services.insert(id.clone(), ip.parse().unwrap(), ports);
        self.manager.write().on_add_service(&id);
    }

    pub(crate) fn delete_service(&self, ns: &str, name: &str) {
        let id = ServiceId::new(ns, name);
        self.services.remove(&id);
        self.manager.write().on_delete_service(&id);
    }
}

// === impl MockLb ===

impl MockLb {
    pub(crate) fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn service(&self, frontend: &str) -> Option<Svc> {
        self.state
            .lock()
            .services
            .values()
            .find(|svc| svc.frontend.to_string() == frontend)
            .cloned()
    }

    /// Lists the backends of a frontend's service, sorted.
    pub(crate) fn backends(&self, frontend: &str) -> Option<Vec<String>> {
        self.service(frontend).map(|svc| {
            let mut backends = svc
                .backends
                .iter()
                .map(|b| b.addr.to_string())
                .collect::<Vec<_>>();
            backends.sort();
            backends
        })
    }

    pub(crate) fn frontends(&self) -> Vec<String> {
        let mut frontends = self
            .state
            .lock()
            .services
            .keys()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        frontends.sort();
        frontends
    }

    pub(crate) fn upserts(&self) -> usize {
        self.state.lock().upserts
    }

    pub(crate) fn deletes(&self) -> usize {
        self.state.lock().deletes
    }
}

impl ServiceManager for MockLb {
    fn upsert_service(&self, svc: &Svc) -> anyhow::Result<(bool, LbId)> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("load-balancer unavailable");
        }
        let mut state = self.state.lock();
        state.upserts += 1;
        let changed = state.services.get(&svc.frontend) != Some(svc);
        state.services.insert(svc.frontend, svc.clone());
        Ok((changed, 1))
    }

    fn delete_service(&self, frontend: &L3n4Addr) -> anyhow::Result<bool> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("load-balancer unavailable");
        }
        let mut state = self.state.lock();
        state.deletes += 1;
        Ok(state.services.remove(frontend).is_some())
    }
}

// === impl MockServices ===

impl MockServices {
    fn insert(
        &self,
        id: ServiceId,
        ip: IpAddr,
        ports: impl IntoIterator<Item = (&'static str, L4Addr)>,
    ) {
        let ports = ports
            .into_iter()
            .map(|(name, l4)| (name.to_string(), l4))
            .collect();
        self.services.lock().insert(id, (ip, ports));
    }

    fn remove(&self, id: &ServiceId) {
        self.services.lock().remove(id);
    }
}

impl ServiceCache for MockServices {
    fn service_addrs(&self, id: &ServiceId, svc_type: SvcType) -> BTreeMap<String, L3n4Addr> {
        assert_eq!(svc_type, SvcType::ClusterIp);
        self.services
            .lock()
            .get(id)
            .map(|(ip, ports)| {
                ports
                    .iter()
                    .map(|(name, l4)| (name.clone(), L3n4Addr::new(*ip, *l4)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn service_frontend_ip(&self, id: &ServiceId, svc_type: SvcType) -> Option<IpAddr> {
        assert_eq!(svc_type, SvcType::ClusterIp);
        self.services.lock().get(id).map(|(ip, _)| *ip)
    }
}

// === impl MockPods ===

impl MockPods {
    fn insert(&self, pod: k8s::Pod) {
        let mut pods = self.pods.lock();
        pods.retain(|p| {
            p.metadata.namespace != pod.metadata.namespace || p.metadata.name != pod.metadata.name
        });
        pods.push(Arc::new(pod));
    }

    fn remove(&self, ns: &str, name: &str) {
        self.pods.lock().retain(|p| {
            p.metadata.namespace.as_deref() != Some(ns) || p.metadata.name.as_deref() != Some(name)
        });
    }
}

impl PodStore for MockPods {
    fn list(&self) -> Vec<Arc<k8s::Pod>> {
        self.pods.lock().clone()
    }
}

// === helpers ===

pub(crate) fn mk_pod(
    ns: impl Into<String>,
    name: impl Into<String>,
    labels: BTreeMap<&str, &str>,
    ips: impl IntoIterator<Item = impl ToString>,
    ports: impl IntoIterator<Item = (&'static str, i32, &'static str)>,
) -> k8s::Pod {
    k8s::Pod {
        metadata: k8s::ObjectMeta {
            namespace: Some(ns.into()),
            name: Some(name.into()),
            labels: Some(
                labels
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Default::default()
        },
        spec: Some(k8s::PodSpec {
            containers: vec![k8s::Container {
                name: "main".to_string(),
                ports: Some(
                    ports
                        .into_iter()
                        .map(|(name, port, protocol)| k8s::ContainerPort {
                            name: Some(name.to_string()),
                            container_port: port,
                            protocol: Some(protocol.to_string()),
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            }],
            ..Default::default()
        }),
        status: Some(k8s::PodStatus {
            pod_ips: Some(
                ips.into_iter()
                    .map(|ip| k8s::PodIP { ip: ip.to_string() })
                    .collect(),
            ),
            ..Default::default()
        }),
    }
}

pub(crate) fn frontend(addr: &str, l4: L4Addr) -> FrontendMapping {
    FrontendMapping::new(L3n4Addr::new(addr.parse().unwrap(), l4), "")
}

pub(crate) fn named_frontend(addr: &str, name: &str, l4: L4Addr) -> FrontendMapping {
    FrontendMapping::new(L3n4Addr::new(addr.parse().unwrap(), l4), name)
}

pub(crate) fn backend_port(name: &str, l4: L4Addr) -> BackendPort {
    BackendPort {
        name: name.to_string(),
        l4,
    }
}

pub(crate) fn frontend_port(name: &str, l4: L4Addr) -> FrontendPort {
    FrontendPort {
        name: name.to_string(),
        l4,
    }
}

pub(crate) fn selector(labels: impl IntoIterator<Item = (&'static str, &'static str)>) -> Selector {
    labels.into_iter().collect()
}

/// Builds an address-based policy that redirects a single frontend.
pub(crate) fn mk_addr_policy(
    ns: &str,
    name: &str,
    fe: FrontendMapping,
    labels: impl IntoIterator<Item = (&'static str, &'static str)>,
    port: L4Addr,
) -> PolicyConfig {
    PolicyConfig::addr_based(
        PolicyId::new(ns, name),
        Some(fe),
        selector(labels),
        vec![backend_port("", port)],
    )
}

/// Builds a service-based policy with a single backend port.
pub(crate) fn mk_svc_policy(
    ns: &str,
    name: &str,
    svc: &str,
    frontend_ports: impl IntoIterator<Item = FrontendPort>,
    labels: impl IntoIterator<Item = (&'static str, &'static str)>,
    backend_ports: Vec<BackendPort>,
) -> PolicyConfig {
    PolicyConfig::service_based(
        PolicyId::new(ns, name),
        ServiceId::new(ns, svc),
        frontend_ports,
        selector(labels),
        backend_ports,
    )
}
