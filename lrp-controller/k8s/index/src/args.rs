use crate::NodeInfo;
use clap::{ArgAction, Args};

/// Node settings for the redirect policy manager.
///
/// Intended to be flattened into a controller's command-line arguments.
#[derive(Clone, Debug, Args)]
pub struct ManagerArgs {
    /// The name of the node on which this controller runs.
    #[clap(long, env = "NODE_NAME")]
    node_name: String,

    /// Installs IPv4 backends.
    #[clap(long, default_value = "true", action = ArgAction::Set)]
    enable_ipv4: bool,

    /// Installs IPv6 backends.
    #[clap(long, default_value = "false", action = ArgAction::Set)]
    enable_ipv6: bool,
}

impl ManagerArgs {
    pub fn into_node_info(self) -> NodeInfo {
        let Self {
            node_name,
            enable_ipv4,
            enable_ipv6,
        } = self;
        NodeInfo {
            name: node_name,
            enable_ipv4,
            enable_ipv6,
        }
    }
}
