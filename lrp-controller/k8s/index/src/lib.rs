//! Local Redirect Policy Manager
//!
//! The manager redirects traffic addressed to a frontend (an explicit address or the frontend
//! of a cluster service) to backend pods running on the local node. It watches the following:
//!
//! - Each local redirect policy names its frontends and selects backend pods by label.
//! - A `Service` resolves the frontends of the service-based policy that targets it.
//! - Each `Pod` contributes a backend for each of its IPs to the policies that select it.
//!
//! ```text
//! [ Policy ] -> [ Frontend ] <- [ Service ]
//!     |
//!     v
//!  [ Pod ] -> [ Backend ]
//! ```
//!
//! For each resolved frontend with at least one backend, the manager writes a local redirect
//! service to the load-balancer. When a frontend loses its last backend, its service is deleted.
//!
//! Events may arrive in any order: a policy may target a service that does not exist yet, and pods
//! may be observed before or after the policies that select them. The manager's indices are
//! updated so that every ordering converges to the same set of services.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod args;
mod backends;
mod config;
mod error;
mod lb;
mod manager;
pub mod metrics;
mod node_info;
mod pod;
mod store;

#[cfg(test)]
mod tests;

pub use self::{
    args::ManagerArgs,
    config::{BackendPort, FrontendMapping, FrontendPort, FrontendType, LrpType, PolicyConfig},
    error::Error,
    manager::{Manager, SharedManager},
    metrics::ServiceMetrics,
    node_info::NodeInfo,
    store::PodStore,
};
