// ============================================================================
// src/endpoint.rs – Peer addresses in drbdsetup notation (FAMILY:ADDR:PORT)
// ============================================================================

use crate::error::DrbdError;
use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
    Ssocks,
    Sdp,
}

impl AddressFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            AddressFamily::Ipv4 => "ipv4",
            AddressFamily::Ipv6 => "ipv6",
            AddressFamily::Ssocks => "ssocks",
            AddressFamily::Sdp => "sdp",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub family: AddressFamily,
    pub addr: SocketAddr,
}

impl Endpoint {
    pub fn new(family: AddressFamily, addr: SocketAddr) -> Self {
        Self { family, addr }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.family.as_str(), self.addr)
    }
}

impl FromStr for Endpoint {
    type Err = DrbdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = |reason: &str| DrbdError::InvalidEndpoint {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let (family, rest) = s
            .split_once(':')
            .ok_or_else(|| bad("expected FAMILY:ADDRESS:PORT"))?;
        let family = match family {
            "ipv4" => AddressFamily::Ipv4,
            "ipv6" => AddressFamily::Ipv6,
            "ssocks" => AddressFamily::Ssocks,
            "sdp" => AddressFamily::Sdp,
            _ => return Err(bad("unknown address family")),
        };
        let addr: SocketAddr = rest
            .parse()
            .map_err(|_| bad("address must be IP:PORT (IPv6 in brackets)"))?;

        match (family, addr) {
            (AddressFamily::Ipv4, SocketAddr::V6(_)) => Err(bad("ipv4 family with an IPv6 address")),
            (AddressFamily::Ipv6, SocketAddr::V4(_)) => Err(bad("ipv6 family with an IPv4 address")),
            _ => Ok(Self { family, addr }),
        }
    }
}
