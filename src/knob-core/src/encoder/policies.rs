// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Retry policies for hardware setup calls.
//!
//! GPIO edge registration is observed to fail intermittently for reasons
//! unrelated to program logic (a race in the kernel interrupt subsystem), so
//! every setup call site is wrapped in a bounded-deadline retry. Steady-state
//! event handling is never retried.

use std::thread;
use std::time::{Duration, Instant};

use crate::gpio::{GpioError, GpioResult};

/// Policy for retrying failed setup operations.
pub trait RetryPolicy: Send + Sync {
    /// Determine if the operation should be retried after `error`, given
    /// when the first attempt started.
    fn should_retry(&self, started: Instant, error: &GpioError) -> bool;

    /// Delay to insert before the next attempt.
    fn delay(&self) -> Duration;
}

/// Wall-clock deadline retry policy.
///
/// Re-invokes the operation, discarding each failure, until it succeeds or
/// the elapsed time since the first attempt reaches the deadline. No backoff
/// between attempts: re-attempt as fast as the operation itself fails.
#[derive(Debug, Clone)]
pub struct DeadlineRetry {
    deadline: Duration,
}

impl DeadlineRetry {
    /// Create a policy with an explicit deadline.
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    /// Create a policy with the default deadline for hardware setup.
    pub fn default_setup() -> Self {
        Self {
            deadline: Duration::from_secs(10),
        }
    }
}

impl Default for DeadlineRetry {
    fn default() -> Self {
        Self::default_setup()
    }
}

impl RetryPolicy for DeadlineRetry {
    fn should_retry(&self, started: Instant, error: &GpioError) -> bool {
        started.elapsed() < self.deadline && error.is_transient()
    }

    fn delay(&self) -> Duration {
        Duration::ZERO
    }
}

/// No retry policy - operations fail immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn should_retry(&self, _started: Instant, _error: &GpioError) -> bool {
        false
    }

    fn delay(&self) -> Duration {
        Duration::ZERO
    }
}

/// Drive a fallible operation under a retry policy.
///
/// Returns the first success, or the last failure once the policy gives up.
pub fn retry<T>(
    policy: &dyn RetryPolicy,
    mut operation: impl FnMut() -> GpioResult<T>,
) -> GpioResult<T> {
    let started = Instant::now();
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !policy.should_retry(started, &error) {
                    return Err(error);
                }
                let delay = policy.delay();
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
            }
        }
    }
}
