//! Native `sockaddr_in` construction.

use std::mem;

use sockfd_core::inet::{self, Ipv4Endpoint};
use sockfd_core::SocketError;

use crate::errno;

/// Length passed alongside every `sockaddr_in`.
pub(crate) const SOCKADDR_IN_LEN: libc::socklen_t = mem::size_of::<libc::sockaddr_in>() as _;

/// Builds the IPv4 socket address for `host:port`.
///
/// Fails with [`SocketError::AddressParse`] carrying `EINVAL` if `host` is
/// not dotted-decimal IPv4; callers never see a half-built address.
pub fn socket_address(host: &str, port: u16) -> Result<libc::sockaddr_in, SocketError> {
    let ep = inet::endpoint(host, port)
        .map_err(|err| err.with_os_error(errno::os_error(libc::EINVAL)))?;
    Ok(sockaddr_in_from(&ep))
}

pub(crate) fn sockaddr_in_from(ep: &Ipv4Endpoint) -> libc::sockaddr_in {
    // SAFETY: sockaddr_in is plain old data; all-zero is its bzero'd state.
    let mut addr: libc::sockaddr_in = unsafe { mem::zeroed() };
    #[cfg(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    ))]
    {
        addr.sin_len = SOCKADDR_IN_LEN as u8;
    }
    addr.sin_family = libc::AF_INET as libc::sa_family_t;
    addr.sin_port = ep.port_network_order();
    addr.sin_addr = libc::in_addr {
        s_addr: ep.addr_network_order(),
    };
    addr
}
