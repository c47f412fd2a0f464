//! Property tests for the retry back-off and deadline rules.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use cmsdev::domain::models::ServiceKey;
use cmsdev::services::{sleep_seconds, RetryScheduler};
use common::manual_clock;
use proptest::prelude::*;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    /// Property: a sleep is never shorter than one second
    #[test]
    fn prop_sleep_at_least_one_second(
        attempt in 1u32..500,
        time_left in -100i64..5000,
        timeout in 0u64..5000,
    ) {
        prop_assert!(sleep_seconds(attempt, time_left, timeout) >= 1);
    }

    /// Property: with two or more seconds left, a sleep always leaves room
    /// for one more attempt before the deadline
    #[test]
    fn prop_sleep_leaves_room_before_deadline(
        attempt in 1u32..500,
        time_left in 2i64..5000,
        timeout in 0u64..5000,
    ) {
        prop_assert!(sleep_seconds(attempt, time_left, timeout) <= time_left - 1);
    }

    /// Property: a sleep never exceeds the back-off for its attempt, which
    /// itself is capped at a sixth of the timeout
    #[test]
    fn prop_sleep_bounded_by_backoff(
        attempt in 1u32..500,
        time_left in 2i64..5000,
        timeout in 6u64..5000,
    ) {
        let backoff = (i64::from(attempt) * 5).min(i64::try_from(timeout / 6).unwrap());
        prop_assert!(sleep_seconds(attempt, time_left, timeout) <= backoff.max(1));
    }

    /// Property: a check that never passes is abandoned with no more total
    /// sleep than the timeout
    #[test]
    fn prop_failing_check_stops_by_deadline(timeout in 1u64..900) {
        let clock = manual_clock();
        let scheduler = RetryScheduler::new(clock.clone(), 30);
        let calls = AtomicU32::new(0);

        let passed = block_on(scheduler.run_with_retry(ServiceKey::Bos, timeout, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { false }
        }));

        prop_assert!(!passed);
        prop_assert!(calls.load(Ordering::SeqCst) >= 1);
        let slept: u64 = clock.sleeps().iter().map(Duration::as_secs).sum();
        prop_assert!(slept <= timeout.max(1), "slept {} with timeout {}", slept, timeout);
    }

    /// Property: the attempt that passes is the last one, with one sleep
    /// before each earlier attempt
    #[test]
    fn prop_pass_ends_retries(fail_first in 0u32..5) {
        let clock = manual_clock();
        let scheduler = RetryScheduler::new(clock.clone(), 30);
        let calls = AtomicU32::new(0);

        let passed = block_on(scheduler.run_with_retry(ServiceKey::Tftp, 300, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { n >= fail_first }
        }));

        prop_assert!(passed);
        prop_assert_eq!(calls.load(Ordering::SeqCst), fail_first + 1);
        prop_assert_eq!(clock.sleeps().len(), fail_first as usize);
    }
}
