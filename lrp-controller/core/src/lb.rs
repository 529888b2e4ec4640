//! The load-balancer service model and the collaborators that own service
//! state outside of the redirect policy manager.

use crate::{Backend, L3n4Addr, ServiceId};
use anyhow::Result;
use std::{collections::BTreeMap, net::IpAddr};

/// Appended to a policy name to form the name of its load-balancer service.
pub const LOCAL_REDIRECT_SVC_SUFFIX: &str = "-local-redirect";

/// Identifies a service in the load-balancer. Zero requests allocation.
pub type LbId = u32;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SvcType {
    ClusterIp,
    LocalRedirect,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TrafficPolicy {
    Cluster,
    Local,
}

/// A backend bound to the node that hosts it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LbBackend {
    pub node_name: String,
    pub addr: Backend,
}

/// A load-balancer service entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Svc {
    pub name: String,
    pub namespace: String,
    pub svc_type: SvcType,
    pub frontend: L3n4Addr,
    pub frontend_id: LbId,
    pub backends: Vec<LbBackend>,
    pub traffic_policy: TrafficPolicy,
}

/// Owns the load-balancer service table.
///
/// Implementations must be idempotent: deleting an unknown frontend returns
/// `Ok(false)`.
pub trait ServiceManager: Send + Sync {
    /// Creates or replaces the service for `svc.frontend`. Returns whether
    /// the table changed, along with the service's ID.
    fn upsert_service(&self, svc: &Svc) -> Result<(bool, LbId)>;

    /// Deletes the service for `frontend`. Returns whether it existed.
    fn delete_service(&self, frontend: &L3n4Addr) -> Result<bool>;
}

/// A read-only view of cluster services.
///
/// Unknown services resolve to empty values.
pub trait ServiceCache: Send + Sync {
    /// Returns each of the service's frontends, keyed by port name. Unnamed
    /// ports are keyed by the empty string.
    fn service_addrs(&self, service: &ServiceId, svc_type: SvcType) -> BTreeMap<String, L3n4Addr>;

    /// Returns the service's frontend IP.
    fn service_frontend_ip(&self, service: &ServiceId, svc_type: SvcType) -> Option<IpAddr>;
}
