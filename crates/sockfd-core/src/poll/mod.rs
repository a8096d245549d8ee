//! Readiness-wait planning.
//!
//! `accept`, `recv` and `send` run in two phases: an optional bounded wait
//! for the handle to become ready, then exactly one attempt at the real
//! operation. Everything about Phase 1 that does not need the kernel lives
//! here: how a fractional timeout is decomposed, when the wait is skipped,
//! how long each `poll(2)` call may block, and what its result means.

use std::time::Duration;

const MICROS_PER_SEC: f64 = 1_000_000.0;
const MAX_MICROS: i64 = 999_999;

// ---------------------------------------------------------------------------
// Interest
// ---------------------------------------------------------------------------

/// Which readiness condition to wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interest {
    /// Data available, or a connection pending on a listener.
    Readable,
    /// Room in the send buffer.
    Writable,
}

// ---------------------------------------------------------------------------
// Timeout decomposition
// ---------------------------------------------------------------------------

/// A timeout split into whole seconds and a microsecond remainder.
///
/// Both parts are truncated toward zero, so they share the sign of the
/// input. The remainder always stays within one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaitTimeout {
    secs: i64,
    micros: i64,
}

impl WaitTimeout {
    #[must_use]
    pub const fn new(secs: i64, micros: i64) -> Self {
        Self { secs, micros }
    }

    /// Decomposes fractional seconds. `1.5` becomes 1 s + 500 000 µs.
    ///
    /// Float-to-int conversion saturates, and NaN becomes zero. Values past
    /// `i64::MAX` seconds saturate to `i64::MAX` s + 999 999 µs.
    #[must_use]
    pub fn from_secs_f64(timeout: f64) -> Self {
        let secs = timeout as i64;
        let micros = ((timeout - secs as f64) * MICROS_PER_SEC) as i64;
        Self {
            secs,
            micros: micros.clamp(-MAX_MICROS, MAX_MICROS),
        }
    }

    #[must_use]
    pub const fn secs(&self) -> i64 {
        self.secs
    }

    #[must_use]
    pub const fn micros(&self) -> i64 {
        self.micros
    }

    /// True when both parts are exactly zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.secs == 0 && self.micros == 0
    }

    /// The wait as a `Duration`, or `None` if either part is negative or the
    /// remainder is out of range.
    #[must_use]
    pub fn as_duration(&self) -> Option<Duration> {
        if self.secs < 0 || !(0..1_000_000).contains(&self.micros) {
            return None;
        }
        Some(Duration::from_secs(self.secs as u64) + Duration::from_micros(self.micros as u64))
    }
}

// ---------------------------------------------------------------------------
// Wait plan
// ---------------------------------------------------------------------------

/// What Phase 1 does for a given caller timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPlan {
    /// Skip the wait and go straight to the operation, letting it block (or
    /// fail) however the socket is configured to.
    Immediate,
    /// Wait on the handle for at most this long.
    Bounded(WaitTimeout),
    /// Wait on the handle until it is ready, however long that takes.
    Unbounded,
}

/// Decides Phase 1 for an optional timeout in seconds.
///
/// An absent timeout, or one that truncates to 0 s and 0 µs, means "fire
/// immediately" rather than "poll and fail fast". Positive infinity waits
/// without a deadline.
#[must_use]
pub fn plan_wait(timeout: Option<f64>) -> WaitPlan {
    match timeout {
        Some(secs) if secs == f64::INFINITY => WaitPlan::Unbounded,
        Some(secs) => {
            let wait = WaitTimeout::from_secs_f64(secs);
            if wait.is_zero() {
                WaitPlan::Immediate
            } else {
                WaitPlan::Bounded(wait)
            }
        }
        None => WaitPlan::Immediate,
    }
}

/// Milliseconds for one `poll(2)` call covering at most `wait`.
///
/// Rounds up so a non-zero wait never turns into a zero-length poll, and
/// clamps to `i32::MAX`. Callers wait out longer durations in slices.
#[must_use]
pub fn poll_millis(wait: Duration) -> i32 {
    let millis = wait.as_micros().div_ceil(1_000);
    i32::try_from(millis).unwrap_or(i32::MAX)
}

// ---------------------------------------------------------------------------
// Wait results
// ---------------------------------------------------------------------------

/// Meaning of a single-descriptor `poll(2)` result.
///
/// Error and hang-up conditions count as ready, so the operation that
/// follows reports the real failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    TimedOut,
    /// The kernel flagged the descriptor as not open (`POLLNVAL`).
    InvalidHandle,
    Failed,
}

impl Readiness {
    #[must_use]
    pub const fn from_poll_result(rc: i32, invalid_handle: bool) -> Self {
        if rc > 0 {
            if invalid_handle {
                Self::InvalidHandle
            } else {
                Self::Ready
            }
        } else if rc == 0 {
            Self::TimedOut
        } else {
            Self::Failed
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
