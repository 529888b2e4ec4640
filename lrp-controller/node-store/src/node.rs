use crate::store::Key;
use serde::{Deserialize, Serialize};
use std::{fmt, net::IpAddr};

/// A node's record in the shared store.
///
/// Field names are part of the stored format and must not change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Node {
    pub name: String,

    pub cluster: String,

    #[serde(rename = "ClusterID", default)]
    pub cluster_id: u32,

    #[serde(rename = "IPAddresses", default)]
    pub ip_addresses: Vec<NodeAddress>,

    /// Where this record was learned from. Not stored.
    #[serde(skip)]
    pub source: Source,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddress {
    #[serde(rename = "Type")]
    pub addr_type: AddressType,

    #[serde(rename = "IP")]
    pub ip: IpAddr,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressType {
    #[serde(rename = "InternalIP")]
    Internal,
    #[serde(rename = "ExternalIP")]
    External,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Source {
    #[default]
    Unspec,
    Local,
    Kubernetes,
    KvStore,
}

/// Uniquely identifies a node across clusters.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Identity {
    pub cluster: String,
    pub name: String,
}

// === impl Node ===

impl Node {
    pub fn identity(&self) -> Identity {
        Identity {
            cluster: self.cluster.clone(),
            name: self.name.clone(),
        }
    }
}

impl Key for Node {
    fn key_name(&self) -> String {
        self.identity().to_string()
    }
}

// === impl Identity ===

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.cluster, self.name)
    }
}
