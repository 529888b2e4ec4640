#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod addr;
mod id;
pub mod lb;

pub use self::{
    addr::{Backend, InvalidProtocol, L3n4Addr, L4Addr, Protocol},
    id::{PodId, PolicyId, ServiceId},
    lb::{LbBackend, LbId, ServiceCache, ServiceManager, Svc, SvcType, TrafficPolicy},
};
