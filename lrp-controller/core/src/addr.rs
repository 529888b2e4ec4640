use std::{fmt, net::IpAddr, str::FromStr};

/// An L4 protocol that may be load-balanced.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    Tcp,
    Udp,
    Sctp,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unsupported L4 protocol: {0:?}")]
pub struct InvalidProtocol(String);

/// A port and protocol.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct L4Addr {
    pub protocol: Protocol,
    pub port: u16,
}

/// A frontend address.
///
/// The IP is unset while the frontend of a service-based policy has not been
/// resolved against the service cache.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct L3n4Addr {
    pub ip: Option<IpAddr>,
    pub l4: L4Addr,
}

/// A backend address. Two backends are the same backend iff their
/// `IP:port/protocol` forms are equal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Backend {
    pub ip: IpAddr,
    pub l4: L4Addr,
}

// === impl Protocol ===

impl FromStr for Protocol {
    type Err = InvalidProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TCP" => Ok(Self::Tcp),
            "UDP" => Ok(Self::Udp),
            "SCTP" => Ok(Self::Sctp),
            _ => Err(InvalidProtocol(s.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => "TCP".fmt(f),
            Self::Udp => "UDP".fmt(f),
            Self::Sctp => "SCTP".fmt(f),
        }
    }
}

// === impl L4Addr ===

impl L4Addr {
    pub fn new(protocol: Protocol, port: u16) -> Self {
        Self { protocol, port }
    }

    pub fn tcp(port: u16) -> Self {
        Self::new(Protocol::Tcp, port)
    }

    pub fn udp(port: u16) -> Self {
        Self::new(Protocol::Udp, port)
    }
}

impl fmt::Display for L4Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

// === impl L3n4Addr ===

impl L3n4Addr {
    pub fn new(ip: IpAddr, l4: L4Addr) -> Self {
        Self { ip: Some(ip), l4 }
    }

    pub fn unresolved(l4: L4Addr) -> Self {
        Self { ip: None, l4 }
    }

    pub fn is_resolved(&self) -> bool {
        self.ip.is_some()
    }
}

impl fmt::Display for L3n4Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            Some(IpAddr::V6(ip)) => write!(f, "[{}]:{}", ip, self.l4),
            Some(IpAddr::V4(ip)) => write!(f, "{}:{}", ip, self.l4),
            None => write!(f, "<unresolved>:{}", self.l4),
        }
    }
}

// === impl Backend ===

impl Backend {
    pub fn new(ip: IpAddr, l4: L4Addr) -> Self {
        Self { ip, l4 }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        L3n4Addr::new(self.ip, self.l4).fmt(f)
    }
}
