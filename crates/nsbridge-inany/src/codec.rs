//! Text conversion and wildcard-aware matching

use std::io::{Cursor, Write};
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::addr::InAnyAddr;
use crate::prefix::PrefixLen;

/// Buffer size for a dotted-quad address, terminator included
pub const INET_ADDRSTRLEN: usize = 16;
/// Buffer size for a colon-hex address, terminator included
pub const INET6_ADDRSTRLEN: usize = 46;
/// Buffer size that fits either family
pub const INANY_ADDRSTRLEN: usize = INET6_ADDRSTRLEN;
/// Text form of the absent (wildcard) address
pub const WILDCARD: &str = "*";

/// Do two addresses match?
///
/// `None` is the wildcard and matches anything. An unspecified address
/// (0.0.0.0 or ::) matches every address of its own family. Otherwise the
/// addresses must be identical.
pub fn matches(a: Option<&InAnyAddr>, b: Option<&InAnyAddr>) -> bool {
    let (Some(a), Some(b)) = (a, b) else {
        return true;
    };

    if a.is_unspecified() || b.is_unspecified() {
        return a.family() == b.family();
    }

    a == b
}

/// Minimum buffer size [`ntop`] demands for an address
fn required_len(src: Option<&InAnyAddr>) -> usize {
    match src {
        None => WILDCARD.len() + 1,
        Some(a) if a.is_v4() => INET_ADDRSTRLEN,
        Some(_) => INET6_ADDRSTRLEN,
    }
}

/// Render an address into `dst`.
///
/// The wildcard renders as `*`, IPv4 as a dotted quad, IPv6 in colon-hex
/// form. An IPv4-compatible IPv6 address keeps a dotted tail
/// (`::1.2.3.4`), matching `inet_ntop(3)`. Returns `None`, leaving the
/// contents of `dst` unspecified, if `dst` is smaller than the minimum
/// size for the format.
pub fn ntop<'a>(src: Option<&InAnyAddr>, dst: &'a mut [u8]) -> Option<&'a str> {
    if dst.len() < required_len(src) {
        return None;
    }

    let mut cursor = Cursor::new(&mut *dst);
    match src {
        None => cursor.write_all(WILDCARD.as_bytes()).ok()?,
        Some(a) => write!(cursor, "{}", a).ok()?,
    }
    let len = cursor.position() as usize;

    std::str::from_utf8(&dst[..len]).ok()
}

/// Render an address as an owned string
pub fn to_text(src: Option<&InAnyAddr>) -> String {
    match src {
        None => WILDCARD.to_string(),
        Some(a) => a.to_string(),
    }
}

/// Parse a dotted-quad IPv4 or an IPv6 address, IPv4 first
pub fn pton(text: &str) -> Option<InAnyAddr> {
    if let Ok(a4) = text.parse::<Ipv4Addr>() {
        return Some(InAnyAddr::from_v4(a4));
    }

    text.parse::<Ipv6Addr>().ok().map(InAnyAddr::from_v6)
}

/// Strict base-10 integer: ASCII digits only, at least one
fn parse_decimal(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Parse `<address>/<prefix length>`.
///
/// The returned length is unified: an IPv4 prefix `p` comes back as
/// `p + 96`. An IPv4-mapped address written in IPv6 notation must carry
/// a length of at least 96.
pub fn prefix_pton(text: &str) -> Option<(InAnyAddr, PrefixLen)> {
    let (astr, pstr) = text.split_once('/')?;
    if astr.len() >= INANY_ADDRSTRLEN {
        return None;
    }

    let plen = parse_decimal(pstr)?;
    if plen > u64::from(PrefixLen::MAX) {
        return None;
    }
    let plen = plen as u8;

    if let Ok(a6) = astr.parse::<Ipv6Addr>() {
        let addr = InAnyAddr::from_v6(a6);
        if addr.is_v4() && plen < PrefixLen::V4_OFFSET {
            return None;
        }
        return Some((addr, PrefixLen::new(plen)?));
    }

    if let Ok(a4) = astr.parse::<Ipv4Addr>() {
        return Some((InAnyAddr::from_v4(a4), PrefixLen::from_v4(plen)?));
    }

    None
}
