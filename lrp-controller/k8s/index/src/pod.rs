use crate::Error;
use ahash::AHashMap as HashMap;
use lrp_controller_core::{Backend, L4Addr, PodId, PolicyId, Protocol};
use lrp_controller_k8s_api::{self as k8s, Labels, ResourceExt};
use std::net::IpAddr;

/// The parts of a pod that matter for backend selection, computed per event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct PodMetadata {
    pub(crate) id: PodId,

    pub(crate) labels: Labels,

    /// The pod's unique IPs, in status order.
    pub(crate) ips: Vec<IpAddr>,

    /// Named container ports.
    pub(crate) named_ports: HashMap<String, L4Addr>,
}

/// Records the backends a pod contributed to a policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct PodPolicyInfo {
    pub(crate) policy: PolicyId,
    pub(crate) backends: Vec<Backend>,
}

/// Indexes, for each pod, the policies that currently select it.
#[derive(Debug, Default)]
pub(crate) struct PodPolicies {
    index: HashMap<PodId, Vec<PodPolicyInfo>>,
}

// === impl PodMetadata ===

impl PodMetadata {
    pub(crate) fn from_pod(pod: &k8s::Pod) -> Result<Self, Error> {
        let id = pod_id(pod);

        let ips = valid_ips(pod.status.as_ref());
        if ips.is_empty() {
            return Err(Error::NoPodIps(id));
        }

        let mut named_ports = HashMap::default();
        let containers = pod.spec.iter().flat_map(|spec| spec.containers.iter());
        for port in containers.flat_map(|c| c.ports.iter().flatten()) {
            let name = match port.name.as_deref() {
                Some(name) if !name.is_empty() => name,
                _ => continue,
            };

            let protocol = port
                .protocol
                .as_deref()
                .unwrap_or("TCP")
                .parse::<Protocol>()
                .map_err(|error| Error::InvalidPodPort {
                    pod: id.clone(),
                    port: name.to_string(),
                    reason: error.to_string(),
                })?;
            let number = u16::try_from(port.container_port)
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| Error::InvalidPodPort {
                    pod: id.clone(),
                    port: name.to_string(),
                    reason: format!("port number {} is out of range", port.container_port),
                })?;

            named_ports.insert(name.to_string(), L4Addr::new(protocol, number));
        }

        Ok(Self {
            labels: pod.labels().clone().into(),
            id,
            ips,
            named_ports,
        })
    }
}

pub(crate) fn pod_id(pod: &k8s::Pod) -> PodId {
    PodId::new(pod.namespace().unwrap_or_default(), pod.name_any())
}

/// Reads the pod's IPs from its status, dropping duplicates and entries that
/// do not parse.
fn valid_ips(status: Option<&k8s::PodStatus>) -> Vec<IpAddr> {
    let status = match status {
        Some(status) => status,
        None => return Vec::new(),
    };

    let candidates = status
        .pod_ip
        .iter()
        .chain(status.pod_ips.iter().flatten().map(|ip| &ip.ip));

    let mut ips = Vec::new();
    for ip in candidates {
        match ip.parse::<IpAddr>() {
            Ok(ip) if !ips.contains(&ip) => ips.push(ip),
            Ok(_) => {}
            Err(error) => tracing::trace!(%ip, %error, "Ignoring invalid pod IP"),
        }
    }
    ips
}

// === impl PodPolicies ===

impl PodPolicies {
    pub(crate) fn contains(&self, pod: &PodId) -> bool {
        self.index.contains_key(pod)
    }

    pub(crate) fn get(&self, pod: &PodId) -> Option<&[PodPolicyInfo]> {
        self.index.get(pod).map(Vec::as_slice)
    }

    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    /// Records that `pod` contributed `backends` to `policy`. A pod may be
    /// selected by several policies, and by the same policy once per frontend.
    pub(crate) fn record(&mut self, pod: PodId, policy: PolicyId, backends: Vec<Backend>) {
        self.index
            .entry(pod)
            .or_default()
            .push(PodPolicyInfo { policy, backends });
    }

    /// Removes a pod's entry, returning its contributions.
    pub(crate) fn take(&mut self, pod: &PodId) -> Option<Vec<PodPolicyInfo>> {
        self.index.remove(pod)
    }

    /// Forgets every contribution made to `policy`, dropping pods that are no
    /// longer selected by any policy.
    pub(crate) fn purge_policy(&mut self, policy: &PolicyId) {
        self.index.retain(|_, infos| {
            infos.retain(|info| info.policy != *policy);
            !infos.is_empty()
        });
    }
}
