#![no_main]
use libfuzzer_sys::fuzz_target;
use sockfd_core::poll::{self, WaitPlan, WaitTimeout};

fuzz_target!(|data: &[u8]| {
    let Ok(bytes) = <[u8; 8]>::try_from(data) else {
        return;
    };
    let secs = f64::from_le_bytes(bytes);
    let wait = WaitTimeout::from_secs_f64(secs);

    if secs.is_finite() && secs.abs() < 1e15 {
        // The split never loses more than a microsecond.
        let rebuilt = wait.secs() as f64 + wait.micros() as f64 / 1e6;
        assert!((rebuilt - secs).abs() <= 1e-6 + secs.abs() * f64::EPSILON * 4.0);
    }
    assert!(wait.micros().abs() < 1_000_000);
    if let Some(duration) = wait.as_duration() {
        let millis = poll::poll_millis(duration);
        assert!(millis >= 0);
        assert_eq!(millis == 0, duration.is_zero());
    }

    match poll::plan_wait(Some(secs)) {
        WaitPlan::Immediate => assert!(wait.is_zero()),
        WaitPlan::Bounded(bounded) => assert_eq!(bounded, wait),
        WaitPlan::Unbounded => assert_eq!(secs, f64::INFINITY),
    }
    assert_eq!(poll::plan_wait(None), WaitPlan::Immediate);
});
