use std::net::IpAddr;

/// Holds the settings of the node this controller runs on.
#[derive(Clone, Debug)]
pub struct NodeInfo {
    /// The node's name. Every backend installed by this node is bound to it.
    pub name: String,

    pub enable_ipv4: bool,

    pub enable_ipv6: bool,
}

impl NodeInfo {
    pub(crate) fn family_enabled(&self, ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(_) => self.enable_ipv4,
            IpAddr::V6(_) => self.enable_ipv6,
        }
    }
}
