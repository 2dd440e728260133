//! CIDR address ranges.
//!
//! A range is stored pre-masked so that membership is a single AND and
//! compare.

use std::fmt;

use serde::Serialize;

use tiergrid_core::{ConfigError, ConfigResult};

/// A blocked IPv4 subnet in network/mask form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressRange {
    network: u32,
    mask: u32,
    label: String,
}

impl AddressRange {
    /// Parse `"A.B.C.D/prefix"`.
    ///
    /// The address part goes through [`ipv4_to_u32`], so a garbled address
    /// becomes network 0 rather than an error. Host bits are cleared.
    pub fn parse(cidr: &str) -> ConfigResult<Self> {
        let (addr, prefix) = cidr
            .split_once('/')
            .ok_or_else(|| ConfigError::MissingSeparator(cidr.to_string()))?;

        let prefix: i64 = prefix.trim().parse().map_err(|_| ConfigError::InvalidPrefix {
            cidr: cidr.to_string(),
            prefix: prefix.to_string(),
        })?;

        if !(0..=32).contains(&prefix) {
            return Err(ConfigError::PrefixOutOfRange {
                cidr: cidr.to_string(),
                prefix,
            });
        }

        let mask = prefix_mask(prefix as u32);
        Ok(Self {
            network: ipv4_to_u32(addr) & mask,
            mask,
            label: cidr.to_string(),
        })
    }

    /// Whether a packed address falls inside this range.
    pub fn contains(&self, addr: u32) -> bool {
        addr & self.mask == self.network
    }

    /// Whether a dotted-quad address falls inside this range.
    pub fn matches(&self, addr: &str) -> bool {
        self.contains(ipv4_to_u32(addr))
    }

    pub fn network(&self) -> u32 {
        self.network
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// The CIDR string this range was built from.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// `prefix` one-bits from the most significant bit.
fn prefix_mask(prefix: u32) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    }
}

/// Pack a dotted-quad string into a `u32`, first octet most significant.
///
/// Parsing fails open to zero: a non-numeric octet or one above 255 makes
/// the whole address 0, the same value as a literal `0.0.0.0`. Missing
/// trailing octets count as zero and octets past the fourth are ignored.
pub fn ipv4_to_u32(addr: &str) -> u32 {
    let mut result = 0u32;
    for (octet, shift) in addr.split('.').zip([24u32, 16, 8, 0]) {
        match octet.trim().parse::<u32>() {
            Ok(value) if value <= 255 => result |= value << shift,
            _ => return 0,
        }
    }
    result
}
