//! Phase 1 of `accept`, `recv` and `send`: the bounded readiness wait.
//!
//! The wait watches exactly one handle with `poll(2)`, so any open
//! descriptor can be waited on regardless of its number. A zero or absent
//! timeout skips the wait entirely so the operation fires at once.

use std::time::Duration;

use sockfd_core::poll::{self, Interest, Readiness, WaitPlan};
use sockfd_core::{Handle, Operation, SocketError};

use crate::errno;

/// Waits until `handle` satisfies `interest`, or `timeout` seconds pass.
///
/// Returns `Ok(())` when the caller should go on to Phase 2: the handle is
/// ready, or the timeout was absent or zero. Positive infinity waits with
/// no deadline.
///
/// # Errors
///
/// - [`SocketError::Timeout`] when the wait elapsed with nothing ready.
/// - [`SocketError::ReadinessWait`] when `poll(2)` itself failed, or
///   reported the handle as not open (`EBADF`, also used for negative
///   handles). A negative timeout fails with `EINVAL` without waiting.
pub fn wait_ready(
    handle: Handle,
    interest: Interest,
    timeout: Option<f64>,
) -> Result<(), SocketError> {
    match poll::plan_wait(timeout) {
        WaitPlan::Immediate => Ok(()),
        WaitPlan::Unbounded => poll_one(handle, interest, None),
        WaitPlan::Bounded(wait) => match wait.as_duration() {
            Some(wait) => poll_one(handle, interest, Some(wait)),
            None => Err(SocketError::ReadinessWait(errno::os_error(libc::EINVAL))),
        },
    }
}

/// Phase 1 for `op`. Operations without a readiness condition never wait.
pub(crate) fn wait_before(
    op: Operation,
    handle: Handle,
    timeout: Option<f64>,
) -> Result<(), SocketError> {
    match op.interest() {
        Some(interest) => wait_ready(handle, interest, timeout),
        None => Ok(()),
    }
}

fn poll_one(handle: Handle, interest: Interest, wait: Option<Duration>) -> Result<(), SocketError> {
    let fd = handle.as_raw();
    // poll(2) silently skips negative descriptors.
    if fd < 0 {
        return Err(SocketError::ReadinessWait(errno::os_error(libc::EBADF)));
    }
    let events = match interest {
        Interest::Readable => libc::POLLIN,
        Interest::Writable => libc::POLLOUT,
    };

    let mut remaining = wait;
    loop {
        let millis = remaining.map_or(-1, poll::poll_millis);
        let mut pfd = libc::pollfd {
            fd,
            events,
            revents: 0,
        };
        // SAFETY: pfd is a live pollfd and nfds is 1.
        let rc = unsafe { libc::poll(&raw mut pfd, 1, millis) };
        match Readiness::from_poll_result(rc, pfd.revents & libc::POLLNVAL != 0) {
            Readiness::Ready => return Ok(()),
            Readiness::InvalidHandle => {
                return Err(SocketError::ReadinessWait(errno::os_error(libc::EBADF)));
            }
            Readiness::Failed => return Err(SocketError::ReadinessWait(errno::last_os_error())),
            Readiness::TimedOut => {
                // Only waits longer than one poll(2) call can cover get here
                // with time left.
                let Some(left) = remaining else { continue };
                let waited = Duration::from_millis(u64::try_from(millis).unwrap_or(0));
                match left.checked_sub(waited) {
                    Some(rest) if !rest.is_zero() => remaining = Some(rest),
                    _ => return Err(SocketError::Timeout),
                }
            }
        }
    }
}
