//! Errno capture and naming.

use std::ffi::{CStr, c_int};

use sockfd_core::OsError;

/// Captures `errno` right after a failed syscall.
pub(crate) fn last_os_error() -> OsError {
    let code = std::io::Error::last_os_error()
        .raw_os_error()
        .unwrap_or(libc::EINVAL);
    os_error(code)
}

/// Builds an [`OsError`] for an errno this crate raises itself.
pub(crate) fn os_error(code: c_int) -> OsError {
    OsError::new(code, errno_name(code), strerror(code))
}

/// Symbolic name for the errno values socket calls can produce.
pub(crate) fn errno_name(code: c_int) -> &'static str {
    match code {
        libc::EPERM => "EPERM",
        libc::ENOENT => "ENOENT",
        libc::EINTR => "EINTR",
        libc::EIO => "EIO",
        libc::EBADF => "EBADF",
        libc::EAGAIN => "EAGAIN",
        libc::ENOMEM => "ENOMEM",
        libc::EACCES => "EACCES",
        libc::EFAULT => "EFAULT",
        libc::EINVAL => "EINVAL",
        libc::ENFILE => "ENFILE",
        libc::EMFILE => "EMFILE",
        libc::EPIPE => "EPIPE",
        libc::ENOTSOCK => "ENOTSOCK",
        libc::EDESTADDRREQ => "EDESTADDRREQ",
        libc::EMSGSIZE => "EMSGSIZE",
        libc::EPROTOTYPE => "EPROTOTYPE",
        libc::ENOPROTOOPT => "ENOPROTOOPT",
        libc::EPROTONOSUPPORT => "EPROTONOSUPPORT",
        libc::EOPNOTSUPP => "EOPNOTSUPP",
        libc::EAFNOSUPPORT => "EAFNOSUPPORT",
        libc::EADDRINUSE => "EADDRINUSE",
        libc::EADDRNOTAVAIL => "EADDRNOTAVAIL",
        libc::ENETDOWN => "ENETDOWN",
        libc::ENETUNREACH => "ENETUNREACH",
        libc::ECONNABORTED => "ECONNABORTED",
        libc::ECONNRESET => "ECONNRESET",
        libc::ENOBUFS => "ENOBUFS",
        libc::EISCONN => "EISCONN",
        libc::ENOTCONN => "ENOTCONN",
        libc::ETIMEDOUT => "ETIMEDOUT",
        libc::ECONNREFUSED => "ECONNREFUSED",
        libc::EHOSTUNREACH => "EHOSTUNREACH",
        libc::EALREADY => "EALREADY",
        libc::EINPROGRESS => "EINPROGRESS",
        _ => "UNKNOWN",
    }
}

/// `strerror_r` text for `code`, falling back to the std rendering.
pub(crate) fn strerror(code: c_int) -> String {
    let mut buf = [0u8; 256];
    // SAFETY: buf is writable for buf.len() bytes; strerror_r NUL-terminates
    // within that length on success.
    let rc = unsafe { libc::strerror_r(code, buf.as_mut_ptr().cast(), buf.len()) };
    if rc == 0
        && let Ok(msg) = CStr::from_bytes_until_nul(&buf)
    {
        return msg.to_string_lossy().into_owned();
    }
    std::io::Error::from_raw_os_error(code).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_socket_errnos() {
        assert_eq!(errno_name(libc::EADDRINUSE), "EADDRINUSE");
        assert_eq!(errno_name(libc::EBADF), "EBADF");
        assert_eq!(errno_name(libc::ECONNREFUSED), "ECONNREFUSED");
        assert_eq!(errno_name(libc::EAGAIN), "EAGAIN");
        assert_eq!(errno_name(-1), "UNKNOWN");
    }

    #[test]
    fn strerror_matches_libc_wording() {
        assert_eq!(strerror(libc::EBADF), "Bad file descriptor");
        assert!(!strerror(libc::EADDRINUSE).is_empty());
    }

    #[test]
    fn os_error_formats_like_an_errno_exception() {
        let err = os_error(libc::EBADF);
        assert_eq!(err.code(), libc::EBADF);
        assert_eq!(err.to_string(), "EBADF, Bad file descriptor");
    }
}
