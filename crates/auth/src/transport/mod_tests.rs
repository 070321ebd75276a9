// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn policy() -> RetryPolicy {
    RetryPolicy { max_attempts: 5, base: Duration::from_secs(5), max: Duration::from_secs(30) }
}

#[yare::parameterized(
    first = { 1, 5 },
    second = { 2, 10 },
    third = { 3, 20 },
    capped = { 4, 30 },
    far_past_cap = { 40, 30 },
)]
fn delay_doubles_then_caps(attempt: u32, secs: u64) {
    assert_eq!(policy().delay_for(attempt), Duration::from_secs(secs));
}

#[test]
fn delays_never_decrease() {
    let policy = policy();
    let delays: Vec<_> = (1..=64).map(|a| policy.delay_for(a)).collect();
    assert!(delays.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn zero_base_means_no_wait() {
    let policy = RetryPolicy { base: Duration::ZERO, ..policy() };
    assert_eq!(policy.delay_for(3), Duration::ZERO);
}
