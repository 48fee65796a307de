//! Target Resolver - CIDR and explicit range enumeration
//!
//! Expands a sweep target into an ordered, lazy sequence of IPv4 addresses.
//! Supported forms:
//! - CIDR: "192.168.1.0/24" (network and broadcast addresses included)
//! - range: "192.168.1.1-192.168.1.10" (capped, truncation is reported)

use ipnet::{IpNet, Ipv4Net};
use netprobe_common::{ScanError, ScanResult, ScanTarget};
use std::net::{IpAddr, Ipv4Addr};
use tracing::debug;

/// Increment an address in place: bump the last byte and carry leftwards.
///
/// Works on any address width. An all-ones input wraps to all zeros.
pub fn successor(octets: &mut [u8]) {
    for byte in octets.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            break;
        }
    }
}

/// Successor of an IPv4 address (`255.255.255.255` wraps to `0.0.0.0`).
#[inline]
#[must_use]
pub fn next_ipv4(addr: Ipv4Addr) -> Ipv4Addr {
    let mut octets = addr.octets();
    successor(&mut octets);
    Ipv4Addr::from(octets)
}

/// How many addresses a range will yield.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub count: u64,
    /// The range is longer than its cap; only `count` addresses will be produced.
    pub truncated: bool,
}

/// An enumerable block of IPv4 addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressRange {
    /// Every address inside the mask, from the network address up to the last one.
    Network(Ipv4Net),
    /// `start..=end` in successor order, never more than `cap` addresses.
    Explicit {
        start: Ipv4Addr,
        end: Ipv4Addr,
        cap: usize,
    },
}

impl AddressRange {
    /// Parse `a.b.c.d/len`. Host bits are masked off.
    pub fn parse_cidr(spec: &str) -> ScanResult<Self> {
        let spec = spec.trim();
        match spec.parse::<IpNet>() {
            Ok(IpNet::V4(net)) => Ok(AddressRange::Network(net)),
            Ok(IpNet::V6(_)) => Err(ScanError::InvalidAddressSpec(format!(
                "{}: only IPv4 networks can be swept",
                spec
            ))),
            Err(e) => Err(ScanError::InvalidAddressSpec(format!("{}: {}", spec, e))),
        }
    }

    /// Parse `IP1-IP2`, keeping at most `cap` addresses.
    pub fn parse_range(spec: &str, cap: usize) -> ScanResult<Self> {
        let parts: Vec<&str> = spec.split('-').collect();
        if parts.len() != 2 {
            return Err(ScanError::InvalidAddressSpec(format!(
                "{}: invalid range format, use IP1-IP2 (e.g. 192.168.1.1-192.168.1.50)",
                spec.trim()
            )));
        }

        let start = parse_ipv4(parts[0])?;
        let end = parse_ipv4(parts[1])?;
        if u32::from(start) > u32::from(end) {
            return Err(ScanError::InvalidRange(format!(
                "start {} is after end {}",
                start, end
            )));
        }

        Ok(AddressRange::Explicit { start, end, cap })
    }

    /// Parse a sweep target. Single hosts are not enumerable.
    pub fn from_target(target: &ScanTarget, cap: usize) -> ScanResult<Self> {
        match target {
            ScanTarget::Cidr(spec) => Self::parse_cidr(spec),
            ScanTarget::Range(spec) => Self::parse_range(spec, cap),
            ScanTarget::Host(host) => Err(ScanError::InvalidAddressSpec(format!(
                "{}: a single host is not an address range",
                host
            ))),
        }
    }

    /// First address produced.
    #[inline]
    #[must_use]
    pub fn first(&self) -> Ipv4Addr {
        match self {
            AddressRange::Network(net) => net.network(),
            AddressRange::Explicit { start, .. } => *start,
        }
    }

    /// Inclusive upper bound, before any cap is applied.
    #[inline]
    #[must_use]
    pub fn last(&self) -> Ipv4Addr {
        match self {
            AddressRange::Network(net) => net.broadcast(),
            AddressRange::Explicit { end, .. } => *end,
        }
    }

    /// Number of addresses `iter()` yields, computed without iterating.
    #[must_use]
    pub fn extent(&self) -> Extent {
        let span = u64::from(u32::from(self.last())) - u64::from(u32::from(self.first())) + 1;
        match self {
            AddressRange::Network(_) => Extent {
                count: span,
                truncated: false,
            },
            AddressRange::Explicit { cap, .. } => {
                let cap = *cap as u64;
                Extent {
                    count: span.min(cap),
                    truncated: span > cap,
                }
            }
        }
    }

    /// Lazy iterator over the range. Each call starts from the beginning.
    #[must_use]
    pub fn iter(&self) -> AddressIter {
        let limit = match self {
            AddressRange::Network(_) => None,
            AddressRange::Explicit { cap, .. } => Some(*cap as u64),
        };
        AddressIter {
            next: Some(self.first()),
            end: self.last(),
            limit,
            produced: 0,
            truncated: false,
        }
    }
}

impl IntoIterator for &AddressRange {
    type Item = Ipv4Addr;
    type IntoIter = AddressIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn parse_ipv4(literal: &str) -> ScanResult<Ipv4Addr> {
    let literal = literal.trim();
    match literal.parse::<IpAddr>() {
        Ok(IpAddr::V4(addr)) => Ok(addr),
        Ok(IpAddr::V6(_)) => Err(ScanError::InvalidAddressSpec(format!(
            "{}: only IPv4 ranges can be swept",
            literal
        ))),
        Err(_) => Err(ScanError::InvalidAddressSpec(format!(
            "{}: invalid IP address",
            literal
        ))),
    }
}

/// Iterator returned by [`AddressRange::iter`].
#[derive(Debug, Clone)]
pub struct AddressIter {
    next: Option<Ipv4Addr>,
    end: Ipv4Addr,
    limit: Option<u64>,
    produced: u64,
    truncated: bool,
}

impl AddressIter {
    /// True once iteration stopped at the cap before reaching the end address.
    #[inline]
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl Iterator for AddressIter {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Ipv4Addr> {
        let current = self.next?;
        if self.limit == Some(self.produced) {
            debug!(limit = self.produced, at = %current, "range cap reached");
            self.next = None;
            self.truncated = true;
            return None;
        }

        self.produced += 1;
        self.next = if current == self.end {
            None
        } else {
            Some(next_ipv4(current))
        };
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let Some(next) = self.next else {
            return (0, Some(0));
        };
        let mut left = u64::from(u32::from(self.end)) - u64::from(u32::from(next)) + 1;
        if let Some(limit) = self.limit {
            left = left.min(limit - self.produced);
        }
        let left = usize::try_from(left).unwrap_or(usize::MAX);
        (left, Some(left))
    }
}

impl std::iter::FusedIterator for AddressIter {}

#[cfg(test)]
mod tests {
    use super::*;

    fn v4(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    #[test]
    fn test_cidr_slash_30() {
        let range = AddressRange::parse_cidr("10.0.0.0/30").unwrap();
        let ips: Vec<_> = range.iter().collect();
        assert_eq!(
            ips,
            vec![v4("10.0.0.0"), v4("10.0.0.1"), v4("10.0.0.2"), v4("10.0.0.3")]
        );
    }

    #[test]
    fn test_cidr_counts_match_prefix() {
        for prefix in [32u8, 31, 28, 24, 22, 20] {
            let range = AddressRange::parse_cidr(&format!("172.16.0.0/{}", prefix)).unwrap();
            let expected = 1u64 << (32 - prefix);
            assert_eq!(range.iter().count() as u64, expected, "prefix /{}", prefix);
            assert_eq!(range.extent().count, expected);
            assert!(!range.extent().truncated);
        }
    }

    #[test]
    fn test_cidr_starts_at_masked_network() {
        let range = AddressRange::parse_cidr("192.168.1.77/29").unwrap();
        let ips: Vec<_> = range.iter().collect();
        assert_eq!(ips.first(), Some(&v4("192.168.1.72")));
        assert_eq!(ips.last(), Some(&v4("192.168.1.79")));
        assert!(ips.windows(2).all(|w| next_ipv4(w[0]) == w[1]));
    }

    #[test]
    fn test_cidr_whole_space_extent() {
        let range = AddressRange::parse_cidr("0.0.0.0/0").unwrap();
        assert_eq!(range.extent().count, 1u64 << 32);
        let head: Vec<_> = range.iter().take(3).collect();
        assert_eq!(head, vec![v4("0.0.0.0"), v4("0.0.0.1"), v4("0.0.0.2")]);
    }

    #[test]
    fn test_top_of_space_terminates() {
        let range = AddressRange::parse_cidr("255.255.255.252/30").unwrap();
        let ips: Vec<_> = range.iter().collect();
        assert_eq!(ips.len(), 4);
        assert_eq!(ips.last(), Some(&Ipv4Addr::BROADCAST));
    }

    #[test]
    fn test_successor_carries() {
        assert_eq!(next_ipv4(v4("10.0.0.255")), v4("10.0.1.0"));
        assert_eq!(next_ipv4(v4("10.0.255.255")), v4("10.1.0.0"));
        assert_eq!(next_ipv4(v4("10.0.0.41")), v4("10.0.0.42"));
    }

    #[test]
    fn test_successor_all_ones_wraps_to_zero() {
        assert_eq!(next_ipv4(Ipv4Addr::BROADCAST), Ipv4Addr::UNSPECIFIED);
    }

    #[test]
    fn test_successor_last_octet_is_bijective() {
        let mut seen = std::collections::HashSet::new();
        for last in 0..=255u8 {
            let mut octets = [10, 0, 0, last];
            successor(&mut octets);
            assert!(seen.insert(octets));
        }
        assert_eq!(seen.len(), 256);
    }

    #[test]
    fn test_successor_works_on_v6_width() {
        let mut octets = [0xffu8; 16];
        octets[0] = 0x20;
        successor(&mut octets);
        assert_eq!(octets[0], 0x21);
        assert!(octets[1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_range_inclusive() {
        let range = AddressRange::parse_range("192.168.1.1-192.168.1.3", 1000).unwrap();
        let mut iter = range.iter();
        let ips: Vec<_> = iter.by_ref().collect();
        assert_eq!(ips, vec![v4("192.168.1.1"), v4("192.168.1.2"), v4("192.168.1.3")]);
        assert!(!iter.is_truncated());
    }

    #[test]
    fn test_range_across_octet_boundary() {
        let range = AddressRange::parse_range("10.0.0.250 - 10.0.1.4", 1000).unwrap();
        assert_eq!(range.iter().count(), 11);
        assert_eq!(range.extent().count, 11);
    }

    #[test]
    fn test_range_single_address() {
        let range = AddressRange::parse_range("10.0.0.7-10.0.0.7", 1000).unwrap();
        assert_eq!(range.iter().collect::<Vec<_>>(), vec![v4("10.0.0.7")]);
    }

    #[test]
    fn test_range_exactly_at_cap_is_not_truncated() {
        // 10.0.0.0 .. 10.0.3.231 is 1000 addresses
        let range = AddressRange::parse_range("10.0.0.0-10.0.3.231", 1000).unwrap();
        let mut iter = range.iter();
        assert_eq!(iter.by_ref().count(), 1000);
        assert!(!iter.is_truncated());
        assert!(!range.extent().truncated);
    }

    #[test]
    fn test_range_over_cap_is_truncated() {
        let range = AddressRange::parse_range("10.0.0.0-10.0.255.255", 1000).unwrap();
        let mut iter = range.iter();
        let ips: Vec<_> = iter.by_ref().collect();
        assert_eq!(ips.len(), 1000);
        assert!(iter.is_truncated());
        assert_eq!(ips.last(), Some(&v4("10.0.3.231")));
        assert_eq!(
            range.extent(),
            Extent {
                count: 1000,
                truncated: true
            }
        );
    }

    #[test]
    fn test_iteration_is_restartable() {
        let range = AddressRange::parse_range("10.0.0.1-10.0.0.20", 1000).unwrap();
        let first: Vec<_> = range.iter().collect();
        let second: Vec<_> = (&range).into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(range.iter().size_hint(), (20, Some(20)));
    }

    #[test]
    fn test_reversed_range_rejected() {
        let err = AddressRange::parse_range("10.0.0.9-10.0.0.1", 1000).unwrap_err();
        assert!(matches!(err, ScanError::InvalidRange(_)));
    }

    #[test]
    fn test_malformed_specs_rejected() {
        for bad in ["10.0.0.0", "10.0.0.0/33", "not-a-net/24", "10.0.0/24", ""] {
            let err = AddressRange::parse_cidr(bad).unwrap_err();
            assert!(matches!(err, ScanError::InvalidAddressSpec(_)), "{}", bad);
        }
        for bad in ["10.0.0.1", "10.0.0.1-10.0.0.2-10.0.0.3", "10.0.0.1-host", "a-b"] {
            let err = AddressRange::parse_range(bad, 1000).unwrap_err();
            assert!(matches!(err, ScanError::InvalidAddressSpec(_)), "{}", bad);
        }
    }

    #[test]
    fn test_ipv6_rejected() {
        assert!(AddressRange::parse_cidr("2001:db8::/126").is_err());
        assert!(AddressRange::parse_range("::1-::2", 1000).is_err());
    }

    #[test]
    fn test_from_target() {
        let r = AddressRange::from_target(&ScanTarget::Cidr("10.0.0.0/31".into()), 1000).unwrap();
        assert_eq!(r.extent().count, 2);
        let r = AddressRange::from_target(&ScanTarget::Range("10.0.0.1-10.0.0.5".into()), 3).unwrap();
        assert_eq!(r.extent(), Extent { count: 3, truncated: true });
        assert!(AddressRange::from_target(&ScanTarget::Host("example.com".into()), 1000).is_err());
    }
}
