use lrp_controller_core::{L3n4Addr, PodId, PolicyId, ServiceId};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The policy's frontend is already claimed by another policy.
    #[error("local redirect policy for frontend {frontend} already exists: {existing}")]
    FrontendConflict {
        frontend: L3n4Addr,
        existing: PolicyId,
    },

    /// The policy's service is already targeted by a policy in the same
    /// namespace.
    #[error("local redirect policy for service {service} already exists in namespace {namespace}")]
    ServiceConflict { service: ServiceId, namespace: String },

    #[error("local redirect policy {0} not found")]
    NotFound(PolicyId),

    /// A named container port could not be used to build backends.
    #[error("pod {pod} has an invalid port {port:?}: {reason}")]
    InvalidPodPort {
        pod: PodId,
        port: String,
        reason: String,
    },

    #[error("pod {0} has no valid IPs")]
    NoPodIps(PodId),
}

impl Error {
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::FrontendConflict { .. } | Self::ServiceConflict { .. }
        )
    }
}
