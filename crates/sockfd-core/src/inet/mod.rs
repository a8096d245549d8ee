//! IPv4 endpoint construction.
//!
//! Turns the caller's `(host, port)` pair into the byte-order-correct pieces
//! of a native `sockaddr_in`. Parsing is done here, in safe Rust, so a bad
//! host is rejected before any socket syscall is attempted.

use std::fmt;

use crate::error::AddressParseError;

// ---------------------------------------------------------------------------
// Byte-order helpers
// ---------------------------------------------------------------------------

/// Converts a 16-bit value from host byte order to network byte order.
///
/// Equivalent to C `htons`.
#[inline]
pub fn htons(v: u16) -> u16 {
    v.to_be()
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// A parsed IPv4 host plus port, ready to be laid into a `sockaddr_in`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Endpoint {
    octets: [u8; 4],
    port: u16,
}

impl Ipv4Endpoint {
    #[must_use]
    pub const fn new(octets: [u8; 4], port: u16) -> Self {
        Self { octets, port }
    }

    #[must_use]
    pub const fn octets(&self) -> [u8; 4] {
        self.octets
    }

    /// Port in host byte order.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Address as stored in `sin_addr.s_addr`: the octets in memory order,
    /// which is network byte order.
    #[must_use]
    pub fn addr_network_order(&self) -> u32 {
        u32::from_ne_bytes(self.octets)
    }

    /// Port as stored in `sin_port`.
    #[must_use]
    pub fn port_network_order(&self) -> u16 {
        htons(self.port)
    }
}

impl fmt::Display for Ipv4Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.octets;
        write!(f, "{a}.{b}.{c}.{d}:{}", self.port)
    }
}

/// Builds an endpoint from a dotted-decimal host and a port.
///
/// Port 0 is passed through untouched; whether it means "any port" is up to
/// the syscall that consumes the address.
pub fn endpoint(host: &str, port: u16) -> Result<Ipv4Endpoint, AddressParseError> {
    match parse_ipv4(host.as_bytes()) {
        Some(octets) => Ok(Ipv4Endpoint::new(octets, port)),
        None => Err(AddressParseError::new(host)),
    }
}

// ---------------------------------------------------------------------------
// IPv4 parsing
// ---------------------------------------------------------------------------

/// Parse a dotted-quad IPv4 text address into exactly 4 bytes.
///
/// Accepts the same strings as `inet_pton(AF_INET, ..)`: four decimal
/// octets, no leading zeros, nothing before or after.
pub fn parse_ipv4(src: &[u8]) -> Option<[u8; 4]> {
    let s = core::str::from_utf8(src).ok()?;
    if s.is_empty() {
        return None;
    }

    let mut parts = s.splitn(5, '.');
    let mut octets = [0u8; 4];
    for octet in &mut octets {
        let part = parts.next()?;
        if part.is_empty() || part.len() > 3 {
            return None;
        }
        // Octal ambiguity.
        if part.len() > 1 && part.starts_with('0') {
            return None;
        }
        if !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let val: u16 = part.parse().ok()?;
        if val > 255 {
            return None;
        }
        *octet = val as u8;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(octets)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_addresses() {
        assert_eq!(parse_ipv4(b"127.0.0.1"), Some([127, 0, 0, 1]));
        assert_eq!(parse_ipv4(b"0.0.0.0"), Some([0, 0, 0, 0]));
        assert_eq!(parse_ipv4(b"255.255.255.255"), Some([255; 4]));
        assert_eq!(parse_ipv4(b"10.20.30.40"), Some([10, 20, 30, 40]));
    }

    #[test]
    fn rejects_malformed_hosts() {
        for bad in [
            "",
            "not-an-ip",
            "localhost",
            "1.2.3",
            "1.2.3.4.5",
            "1.2.3.256",
            "1..2.3",
            "01.2.3.4",
            "1.2.3.4 ",
            " 1.2.3.4",
            "1.2.3.-4",
            "1.2.3.+4",
            "0x7f.0.0.1",
            "1.2.3.4:80",
            "::1",
            "1.2.3.0004",
        ] {
            assert_eq!(parse_ipv4(bad.as_bytes()), None, "{bad:?} must be rejected");
        }
    }

    #[test]
    fn rejects_non_utf8() {
        assert_eq!(parse_ipv4(&[0xff, b'.', b'1']), None);
    }

    #[test]
    fn endpoint_keeps_host_order_port() {
        let ep = endpoint("192.168.1.10", 8080).unwrap();
        assert_eq!(ep.octets(), [192, 168, 1, 10]);
        assert_eq!(ep.port(), 8080);
        assert_eq!(ep.to_string(), "192.168.1.10:8080");
    }

    #[test]
    fn endpoint_accepts_port_zero() {
        let ep = endpoint("127.0.0.1", 0).unwrap();
        assert_eq!(ep.port(), 0);
    }

    #[test]
    fn endpoint_error_names_the_host() {
        let err = endpoint("not-an-ip", 80).unwrap_err();
        assert_eq!(err.host(), "not-an-ip");
    }

    #[test]
    fn network_order_layout() {
        let ep = endpoint("127.0.0.1", 0x1f90).unwrap();
        assert_eq!(ep.addr_network_order().to_ne_bytes(), [127, 0, 0, 1]);
        assert_eq!(ep.port_network_order().to_ne_bytes(), [0x1f, 0x90]);
        assert_eq!(u16::from_be(ep.port_network_order()), 0x1f90);
    }
}
