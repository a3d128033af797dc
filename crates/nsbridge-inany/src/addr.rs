//! The dual-stack address type

use std::cmp::Ordering;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::str::FromStr;
use thiserror::Error;

use crate::codec;

/// First 96 bits of an IPv4-mapped IPv6 address
const V4MAPPED_PREFIX: [u8; 12] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff];

const fn v4mapped(a: [u8; 4]) -> [u8; 16] {
    [
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff, a[0], a[1], a[2], a[3],
    ]
}

/// Address family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    pub fn name(&self) -> &'static str {
        match self {
            Family::V4 => "IPv4",
            Family::V6 => "IPv6",
        }
    }

    /// Address width in bits
    pub fn bits(&self) -> u8 {
        match self {
            Family::V4 => 32,
            Family::V6 => 128,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Text that is neither a dotted-quad IPv4 nor an IPv6 address
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid IPv4 or IPv6 address")]
pub struct AddrParseError;

/// An IPv4 or IPv6 address in canonical IPv6-shaped storage.
///
/// The family tag is derived from the stored bits when the value is built:
/// anything carrying the IPv4-mapped prefix is IPv4. It is kept alongside
/// the bits so family checks never depend on re-inspecting them.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InAnyAddr {
    family: Family,
    octets: [u8; 16],
}

impl InAnyAddr {
    pub const LOOPBACK4: InAnyAddr = InAnyAddr {
        family: Family::V4,
        octets: v4mapped([127, 0, 0, 1]),
    };
    pub const ANY4: InAnyAddr = InAnyAddr {
        family: Family::V4,
        octets: v4mapped([0, 0, 0, 0]),
    };
    pub const LOOPBACK6: InAnyAddr = InAnyAddr {
        family: Family::V6,
        octets: [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
    };
    pub const ANY6: InAnyAddr = InAnyAddr {
        family: Family::V6,
        octets: [0; 16],
    };

    /// Build from the 128-bit canonical form
    pub fn from_octets(octets: [u8; 16]) -> Self {
        let family = if octets[..12] == V4MAPPED_PREFIX {
            Family::V4
        } else {
            Family::V6
        };
        Self { family, octets }
    }

    pub fn from_v4(addr: Ipv4Addr) -> Self {
        Self {
            family: Family::V4,
            octets: v4mapped(addr.octets()),
        }
    }

    /// An IPv4-mapped input yields an IPv4 address
    pub fn from_v6(addr: Ipv6Addr) -> Self {
        Self::from_octets(addr.octets())
    }

    pub fn from_ip(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(a) => Self::from_v4(a),
            IpAddr::V6(a) => Self::from_v6(a),
        }
    }

    /// Split a socket address into address and port
    pub fn from_socket_addr(sa: SocketAddr) -> (Self, u16) {
        (Self::from_ip(sa.ip()), sa.port())
    }

    /// Socket address of the matching family, with a zero scope/flow label
    pub fn to_socket_addr(&self, port: u16) -> SocketAddr {
        match self.v4() {
            Some(a) => SocketAddr::V4(SocketAddrV4::new(a, port)),
            None => SocketAddr::V6(SocketAddrV6::new(self.v6(), port, 0, 0)),
        }
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn is_v4(&self) -> bool {
        self.family == Family::V4
    }

    pub fn is_v6(&self) -> bool {
        self.family == Family::V6
    }

    /// The IPv4 address, if this is one
    pub fn v4(&self) -> Option<Ipv4Addr> {
        if self.is_v4() {
            let o = &self.octets;
            Some(Ipv4Addr::new(o[12], o[13], o[14], o[15]))
        } else {
            None
        }
    }

    /// The IPv6 view; IPv4 addresses come back in mapped form
    pub fn v6(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.octets)
    }

    pub fn to_ip(&self) -> IpAddr {
        match self.v4() {
            Some(a) => IpAddr::V4(a),
            None => IpAddr::V6(self.v6()),
        }
    }

    pub fn octets(&self) -> [u8; 16] {
        self.octets
    }

    pub fn is_unspecified(&self) -> bool {
        match self.v4() {
            Some(a) => a.is_unspecified(),
            None => self.v6().is_unspecified(),
        }
    }

    pub fn is_loopback(&self) -> bool {
        match self.v4() {
            Some(a) => a.is_loopback(),
            None => self.v6().is_loopback(),
        }
    }

    pub fn is_multicast(&self) -> bool {
        match self.v4() {
            Some(a) => a.is_multicast(),
            None => self.v6().is_multicast(),
        }
    }

    /// Usable as the endpoint of a flow
    pub fn is_unicast(&self) -> bool {
        !self.is_unspecified()
            && !self.is_multicast()
            && !self.v4().is_some_and(|a| a.is_broadcast())
    }

    /// IPv6 link-local (fe80::/10); always false for IPv4
    pub fn is_linklocal6(&self) -> bool {
        self.is_v6() && self.octets[0] == 0xfe && (self.octets[1] & 0xc0) == 0x80
    }

    pub fn equals4(&self, addr: Ipv4Addr) -> bool {
        self.v4() == Some(addr)
    }

    pub fn equals6(&self, addr: Ipv6Addr) -> bool {
        self.is_v6() && self.v6() == addr
    }
}

// The family is a function of the bits, so ordering by bits alone is
// consistent with Eq.
impl Ord for InAnyAddr {
    fn cmp(&self, other: &Self) -> Ordering {
        self.octets.cmp(&other.octets)
    }
}

impl PartialOrd for InAnyAddr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for InAnyAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(a) = self.v4() {
            return fmt::Display::fmt(&a, f);
        }

        // IPv4-compatible (::a.b.c.d, deprecated) keeps the dotted tail,
        // as inet_ntop(3) prints it. :: and ::1 are not affected.
        let o = &self.octets;
        if o[..12] == [0; 12] && (o[12] != 0 || o[13] != 0) {
            return write!(f, "::{}", Ipv4Addr::new(o[12], o[13], o[14], o[15]));
        }

        fmt::Display::fmt(&self.v6(), f)
    }
}

impl fmt::Debug for InAnyAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InAnyAddr({})", self)
    }
}

impl FromStr for InAnyAddr {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        codec::pton(s).ok_or(AddrParseError)
    }
}

impl From<Ipv4Addr> for InAnyAddr {
    fn from(addr: Ipv4Addr) -> Self {
        Self::from_v4(addr)
    }
}

impl From<Ipv6Addr> for InAnyAddr {
    fn from(addr: Ipv6Addr) -> Self {
        Self::from_v6(addr)
    }
}

impl From<IpAddr> for InAnyAddr {
    fn from(addr: IpAddr) -> Self {
        Self::from_ip(addr)
    }
}

impl From<InAnyAddr> for IpAddr {
    fn from(addr: InAnyAddr) -> Self {
        addr.to_ip()
    }
}
