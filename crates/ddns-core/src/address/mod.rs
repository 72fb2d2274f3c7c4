// # Addresses
//
// Fixed-width network addresses and the bitwise arithmetic used to derive
// a routable address from a locally observed prefix.
//
// An [`Address`] is a thin wrapper around [`IpAddr`] that exposes its bits as
// a `u128` (IPv4 values occupy the low 32 bits). All arithmetic in
// [`math`] works on those bits and re-renders through the canonical text
// form, so `2001:0db8:0000::1` and `2001:db8::1` are the same value.

pub mod math;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

pub use math::{apply_mask, cidr_to_mask, invert_mask, merge, prefix_length_from_number};

/// Address family of a record
///
/// Serialized with the DNS record type it produces (`A` / `AAAA`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressFamily {
    /// IPv4, published as an `A` record
    #[serde(rename = "A")]
    V4,
    /// IPv6, published as an `AAAA` record
    #[serde(rename = "AAAA")]
    V6,
}

impl AddressFamily {
    /// Number of bits in an address of this family
    pub fn bit_width(self) -> u32 {
        match self {
            AddressFamily::V4 => 32,
            AddressFamily::V6 => 128,
        }
    }

    /// All-ones value for this family
    pub(crate) fn full_bits(self) -> u128 {
        match self {
            AddressFamily::V4 => u32::MAX as u128,
            AddressFamily::V6 => u128::MAX,
        }
    }

    /// DNS record type carrying addresses of this family
    pub fn record_type(self) -> &'static str {
        match self {
            AddressFamily::V4 => "A",
            AddressFamily::V6 => "AAAA",
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::V4 => f.write_str("IPv4"),
            AddressFamily::V6 => f.write_str("IPv6"),
        }
    }
}

/// An IPv4 or IPv6 address, also used as a bitmask
///
/// Equality is bitwise. `Display` renders the canonical form (RFC 5952
/// compression for IPv6, dotted quad for IPv4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(IpAddr);

impl Address {
    /// Build an address of `family` from raw bits; bits beyond the family
    /// width are discarded.
    pub fn from_bits(family: AddressFamily, bits: u128) -> Self {
        let bits = bits & family.full_bits();
        match family {
            AddressFamily::V4 => Self(IpAddr::V4(Ipv4Addr::from(bits as u32))),
            AddressFamily::V6 => Self(IpAddr::V6(Ipv6Addr::from(bits))),
        }
    }

    /// Parse a literal and require it to belong to `family`
    pub fn parse_for(family: AddressFamily, input: &str) -> Result<Self> {
        let address: Address = input.parse()?;
        if address.family() != family {
            return Err(Error::FamilyMismatch {
                expected: family,
                actual: address.family(),
            });
        }
        Ok(address)
    }

    pub fn family(&self) -> AddressFamily {
        match self.0 {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }

    /// Raw bits, right-aligned in a `u128`
    pub fn bits(&self) -> u128 {
        match self.0 {
            IpAddr::V4(v4) => u32::from(v4) as u128,
            IpAddr::V6(v6) => u128::from(v6),
        }
    }

    pub fn ip(&self) -> IpAddr {
        self.0
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        trimmed
            .parse::<IpAddr>()
            .map(Self)
            .map_err(|e| Error::address_format(trimmed, e))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            IpAddr::V4(v4) => v4.fmt(f),
            IpAddr::V6(v6) => write_v6(f, &v6.segments()),
        }
    }
}

/// Lowercase hex groups with the longest zero run (two or more groups,
/// first on ties) compressed to `::`. Never uses the dotted IPv4 tail.
fn write_v6(f: &mut fmt::Formatter<'_>, groups: &[u16; 8]) -> fmt::Result {
    let mut best: Option<(usize, usize)> = None;
    let mut i = 0;
    while i < groups.len() {
        if groups[i] != 0 {
            i += 1;
            continue;
        }
        let start = i;
        while i < groups.len() && groups[i] == 0 {
            i += 1;
        }
        let len = i - start;
        if len >= 2 && best.is_none_or(|(_, best_len)| len > best_len) {
            best = Some((start, len));
        }
    }

    let write_groups = |f: &mut fmt::Formatter<'_>, part: &[u16]| -> fmt::Result {
        for (n, group) in part.iter().enumerate() {
            if n > 0 {
                f.write_str(":")?;
            }
            write!(f, "{group:x}")?;
        }
        Ok(())
    };

    match best {
        Some((start, len)) => {
            write_groups(f, &groups[..start])?;
            f.write_str("::")?;
            write_groups(f, &groups[start + len..])
        }
        None => write_groups(f, groups),
    }
}

impl From<IpAddr> for Address {
    fn from(ip: IpAddr) -> Self {
        Self(ip)
    }
}

impl From<Ipv4Addr> for Address {
    fn from(ip: Ipv4Addr) -> Self {
        Self(IpAddr::V4(ip))
    }
}

impl From<Ipv6Addr> for Address {
    fn from(ip: Ipv6Addr) -> Self {
        Self(IpAddr::V6(ip))
    }
}
