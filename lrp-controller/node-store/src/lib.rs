//! Registers the local node in the cluster-wide key-value store and relays
//! the other nodes' records to a `NodeManager`.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod node;
mod registrar;
pub mod store;


pub use self::{
    node::{AddressType, Identity, Node, NodeAddress, Source},
    registrar::{
        NodeManager, NodeObserver, NodeRegistrar, NODE_REGISTER_STORE_PREFIX, NODE_STORE_PREFIX,
    },
    store::{Configuration, Key, Observer, SharedStore, StoreBackend},
};
