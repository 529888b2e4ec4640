use lrp_controller_k8s_api as k8s;
use std::sync::Arc;

/// A snapshot source of the pods known to this node.
///
/// The manager lists pods while holding its lock, so implementations should
/// be backed by an in-memory cache.
pub trait PodStore: Send + Sync {
    fn list(&self) -> Vec<Arc<k8s::Pod>>;
}

impl PodStore for kube::runtime::reflector::Store<k8s::Pod> {
    fn list(&self) -> Vec<Arc<k8s::Pod>> {
        self.state()
    }
}
