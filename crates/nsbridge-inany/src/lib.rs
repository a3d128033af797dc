//! nsbridge-inany: addresses that may be IPv4 or IPv6
//!
//! Every address is stored as a 128-bit IPv6-shaped value; IPv4 addresses
//! use the IPv4-mapped form (`::ffff:a.b.c.d`), so a single comparison,
//! hashing and masking routine serves both families. An absent address
//! (`None`) is the family-agnostic wildcard, rendered as `*`.
//!
//! # Example
//!
//! ```
//! use nsbridge_inany::{Cidr, InAnyAddr, matches};
//!
//! let peer: InAnyAddr = "10.1.2.3".parse().unwrap();
//! let net: Cidr = "10.0.0.0/8".parse().unwrap();
//! assert!(net.contains(&peer));
//! assert_eq!(net.len().get(), 104);
//!
//! // 0.0.0.0 accepts any IPv4 peer, but no IPv6 one
//! assert!(matches(Some(&InAnyAddr::ANY4), Some(&peer)));
//! assert!(!matches(Some(&InAnyAddr::ANY4), Some(&InAnyAddr::ANY6)));
//! ```

pub mod addr;
pub mod codec;
pub mod prefix;

pub use addr::{AddrParseError, Family, InAnyAddr};
pub use codec::{
    INANY_ADDRSTRLEN, INET_ADDRSTRLEN, INET6_ADDRSTRLEN, WILDCARD, matches, ntop, prefix_pton,
    pton, to_text,
};
pub use prefix::{Cidr, PrefixLen, mask};
