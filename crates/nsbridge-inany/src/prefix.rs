//! Unified prefix lengths and CIDR blocks

use std::fmt;
use std::str::FromStr;

use crate::addr::{AddrParseError, Family, InAnyAddr};
use crate::codec;

/// Prefix length in IPv6 bit width, 0 to 128.
///
/// An IPv4 prefix `p` is stored as `p + 96`, which covers exactly the
/// IPv4-mapped form of the addresses it describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrefixLen(u8);

impl PrefixLen {
    pub const MAX: u8 = 128;
    pub const V4_OFFSET: u8 = 96;

    pub const fn new(unified: u8) -> Option<Self> {
        if unified <= Self::MAX {
            Some(Self(unified))
        } else {
            None
        }
    }

    /// Convert an IPv4 prefix length (0 to 32)
    pub const fn from_v4(len: u8) -> Option<Self> {
        if len <= 32 {
            Some(Self(len + Self::V4_OFFSET))
        } else {
            None
        }
    }

    /// The unified length
    pub const fn get(self) -> u8 {
        self.0
    }

    /// The length as written for an address of `family`
    pub fn for_family(self, family: Family) -> u8 {
        match family {
            Family::V4 => self.0.saturating_sub(Self::V4_OFFSET),
            Family::V6 => self.0,
        }
    }

    /// Mask with the leading `len` bits set
    pub fn netmask(self) -> [u8; 16] {
        let bits = match self.0 {
            0 => 0,
            n => u128::MAX << (128 - u32::from(n)),
        };
        bits.to_be_bytes()
    }
}

impl fmt::Display for PrefixLen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Clear every bit of `addr` past the prefix
pub fn mask(addr: &InAnyAddr, len: PrefixLen) -> InAnyAddr {
    let bits = u128::from_be_bytes(addr.octets()) & u128::from_be_bytes(len.netmask());
    InAnyAddr::from_octets(bits.to_be_bytes())
}

/// An address with a unified prefix length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cidr {
    addr: InAnyAddr,
    len: PrefixLen,
}

impl Cidr {
    /// An IPv4 address needs a unified length of at least 96
    pub fn new(addr: InAnyAddr, len: PrefixLen) -> Option<Self> {
        if addr.is_v4() && len.get() < PrefixLen::V4_OFFSET {
            return None;
        }
        Some(Self { addr, len })
    }

    pub fn addr(&self) -> InAnyAddr {
        self.addr
    }

    pub fn len(&self) -> PrefixLen {
        self.len
    }

    pub fn family(&self) -> Family {
        self.addr.family()
    }

    /// The address with host bits cleared
    pub fn network(&self) -> InAnyAddr {
        mask(&self.addr, self.len)
    }

    /// Whether `addr` falls inside the block.
    ///
    /// Lengths are unified, so an IPv6 block shorter than 96 bits that
    /// spans `::ffff:0:0/96` also covers the corresponding IPv4 addresses.
    pub fn contains(&self, addr: &InAnyAddr) -> bool {
        mask(addr, self.len) == self.network()
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.len.for_family(self.family()))
    }
}

impl FromStr for Cidr {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = codec::prefix_pton(s).ok_or(AddrParseError)?;
        Ok(Self { addr, len })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds() {
        assert_eq!(PrefixLen::new(128).map(PrefixLen::get), Some(128));
        assert_eq!(PrefixLen::new(129), None);
        assert_eq!(PrefixLen::from_v4(0).map(PrefixLen::get), Some(96));
        assert_eq!(PrefixLen::from_v4(32).map(PrefixLen::get), Some(128));
        assert_eq!(PrefixLen::from_v4(33), None);
    }

    #[test]
    fn family_native_length() {
        let len = PrefixLen::from_v4(24).unwrap();
        assert_eq!(len.for_family(Family::V4), 24);
        assert_eq!(len.for_family(Family::V6), 120);
    }

    #[test]
    fn netmask_edges() {
        assert_eq!(PrefixLen::new(0).unwrap().netmask(), [0; 16]);
        assert_eq!(PrefixLen::new(128).unwrap().netmask(), [0xff; 16]);
        let m = PrefixLen::new(12).unwrap().netmask();
        assert_eq!(&m[..3], &[0xff, 0xf0, 0x00]);
    }

    #[test]
    fn masking_v4_keeps_family() {
        let a: InAnyAddr = "10.20.30.40".parse().unwrap();
        let net = mask(&a, PrefixLen::from_v4(16).unwrap());
        assert!(net.is_v4());
        assert_eq!(net.to_string(), "10.20.0.0");
    }

    #[test]
    fn cidr_contains() {
        let net: Cidr = "10.0.0.0/8".parse().unwrap();
        assert!(net.contains(&"10.255.0.1".parse().unwrap()));
        assert!(!net.contains(&"11.0.0.1".parse().unwrap()));
        assert!(!net.contains(&"2001:db8::1".parse().unwrap()));

        let net6: Cidr = "2001:db8::/32".parse().unwrap();
        assert!(net6.contains(&"2001:db8:ffff::1".parse().unwrap()));
        assert!(!net6.contains(&"2001:db9::1".parse().unwrap()));
    }

    #[test]
    fn cidr_display_uses_native_length() {
        let net: Cidr = "192.0.2.0/24".parse().unwrap();
        assert_eq!(net.to_string(), "192.0.2.0/24");
        assert_eq!(net.len().get(), 120);

        let mapped: Cidr = "::ffff:192.0.2.0/120".parse().unwrap();
        assert_eq!(mapped, net);
    }

    #[test]
    fn cidr_network_clears_host_bits() {
        let net: Cidr = "192.0.2.77/24".parse().unwrap();
        assert_eq!(net.network().to_string(), "192.0.2.0");
        assert_eq!(net.addr().to_string(), "192.0.2.77");
    }

    #[test]
    fn cidr_new_rejects_short_v4() {
        let a: InAnyAddr = "10.0.0.0".parse().unwrap();
        assert!(Cidr::new(a, PrefixLen::new(8).unwrap()).is_none());
        assert!(Cidr::new(a, PrefixLen::from_v4(8).unwrap()).is_some());
    }
}
