// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Rotary encoder core.
//!
//! A [`RotaryEncoder`] owns three pins (clock, data, switch), decodes
//! quadrature transitions into twist events, times debounced switch presses,
//! and dispatches both to a consumer-supplied [`EncoderHandler`].
//!
//! Direction is decoded by re-sampling both signal pins immediately after a
//! falling clock edge instead of tracking a rolling phase state machine.
//! That is cheap and reliable at hand-rotation speeds, but if the pins change
//! again before the callback runs (very fast rotation), a step can be
//! misclassified or dropped entirely. Known limitation, kept as-is.
//!
//! Measuring a press blocks the switch pin's delivery context until the
//! switch is physically released. A stuck or shorted switch therefore blocks
//! that context indefinitely; there is no cancellation mechanism for it.

pub mod events;
pub mod policies;

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use crate::gpio::{Edge, EdgeCallback, GpioBackend, GpioError, Level, PinDirection, PinId, Pull};

use events::EncoderHandler;
use policies::{retry, DeadlineRetry, RetryPolicy};

/// Hardware debounce window for the clock line.
const CLOCK_DEBOUNCE: Duration = Duration::from_millis(5);
/// Hardware debounce window for the switch line.
const SWITCH_DEBOUNCE: Duration = Duration::from_millis(75);
/// Wait between level reads while the switch is held.
const PRESS_POLL: Duration = Duration::from_millis(1);

/// Error type returned by encoder construction.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// Setup ran a second time on one instance. A programming-contract
    /// violation, surfaced immediately and never retried.
    #[error("encoder \"{name}\" is already set up")]
    AlreadySetup { name: String },

    /// Pin configuration or callback registration kept failing past the
    /// retry deadline. The encoder is not armed; no registrations are left
    /// behind.
    #[error(transparent)]
    Gpio(#[from] GpioError),
}

/// A debounced and pushable rotary encoder.
///
/// Construction configures all three pins and registers the two falling-edge
/// callbacks; the returned instance is armed and stays armed for the rest of
/// the process lifetime. Pin assignments and the name are immutable after
/// construction.
pub struct RotaryEncoder {
    clock_pin: PinId,
    dt_pin: PinId,
    switch_pin: PinId,
    name: String,
    backend: Arc<dyn GpioBackend>,
    handler: Arc<dyn EncoderHandler>,
    is_setup: bool,
}

impl fmt::Display for RotaryEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RotaryEncoder <{}>", self.name)
    }
}

impl RotaryEncoder {
    /// Create an armed encoder using the default 10 s setup retry deadline.
    ///
    /// # Arguments
    /// * `backend` — shared pin backend
    /// * `clock_pin` — CLK pin
    /// * `dt_pin` — DT pin
    /// * `switch_pin` — SW pin
    /// * `name` — label used in log output
    /// * `handler` — consumer callbacks for twist and press events
    pub fn new(
        backend: Arc<dyn GpioBackend>,
        clock_pin: PinId,
        dt_pin: PinId,
        switch_pin: PinId,
        name: impl Into<String>,
        handler: Arc<dyn EncoderHandler>,
    ) -> Result<Self, EncoderError> {
        Self::with_retry_policy(
            backend,
            clock_pin,
            dt_pin,
            switch_pin,
            name,
            handler,
            &DeadlineRetry::default_setup(),
        )
    }

    /// Create an armed encoder with an explicit setup retry policy.
    pub fn with_retry_policy(
        backend: Arc<dyn GpioBackend>,
        clock_pin: PinId,
        dt_pin: PinId,
        switch_pin: PinId,
        name: impl Into<String>,
        handler: Arc<dyn EncoderHandler>,
        policy: &dyn RetryPolicy,
    ) -> Result<Self, EncoderError> {
        let mut encoder = Self {
            clock_pin,
            dt_pin,
            switch_pin,
            name: name.into(),
            backend,
            handler,
            is_setup: false,
        };
        encoder.setup(policy)?;
        Ok(encoder)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configure the pins and register both edge callbacks.
    ///
    /// Runs exactly once, synchronously inside construction. Every hardware
    /// call is wrapped by the retry policy; a failure that survives the
    /// deadline aborts construction outright.
    fn setup(&mut self, policy: &dyn RetryPolicy) -> Result<(), EncoderError> {
        if self.is_setup {
            return Err(EncoderError::AlreadySetup {
                name: self.name.clone(),
            });
        }

        for pin in [self.clock_pin, self.switch_pin, self.dt_pin] {
            retry(policy, || {
                self.backend.configure_pin(pin, PinDirection::Input, Pull::Up)
            })?;
        }

        let twist = twist_callback(
            Arc::clone(&self.backend),
            Arc::clone(&self.handler),
            self.clock_pin,
            self.dt_pin,
            self.name.clone(),
        );
        retry(policy, || {
            self.backend.register_edge_callback(
                self.clock_pin,
                Edge::Falling,
                Arc::clone(&twist),
                Some(CLOCK_DEBOUNCE),
            )
        })?;

        let press = press_callback(
            Arc::clone(&self.backend),
            Arc::clone(&self.handler),
            self.switch_pin,
            self.name.clone(),
        );
        retry(policy, || {
            self.backend.register_edge_callback(
                self.switch_pin,
                Edge::Falling,
                Arc::clone(&press),
                Some(SWITCH_DEBOUNCE),
            )
        })?;

        self.is_setup = true;
        Ok(())
    }
}

/// Build the clock-falling callback: quadrature decode by re-sampling.
fn twist_callback(
    backend: Arc<dyn GpioBackend>,
    handler: Arc<dyn EncoderHandler>,
    clock_pin: PinId,
    dt_pin: PinId,
    name: String,
) -> EdgeCallback {
    Arc::new(move || {
        let clock = match backend.read_pin(clock_pin) {
            Ok(level) => level,
            Err(error) => {
                warn!("RotaryEncoder <{}> clock read failed: {}", name, error);
                return;
            }
        };
        // A clock still reading low means the edge went stale before this
        // callback ran (contact bounce back to the original level); no twist.
        if clock != Level::High {
            return;
        }
        let data = match backend.read_pin(dt_pin) {
            Ok(level) => level,
            Err(error) => {
                warn!("RotaryEncoder <{}> data read failed: {}", name, error);
                return;
            }
        };
        let clockwise = data == clock;
        debug!("RotaryEncoder <{}> twist clockwise={}", name, clockwise);
        handler.twist(clockwise);
    })
}

/// Build the switch-falling callback: debounce and time a full press.
fn press_callback(
    backend: Arc<dyn GpioBackend>,
    handler: Arc<dyn EncoderHandler>,
    switch_pin: PinId,
    name: String,
) -> EdgeCallback {
    Arc::new(move || {
        match backend.read_pin(switch_pin) {
            // Spurious or already-handled edge; the switch is not held.
            Ok(Level::High) => return,
            Ok(Level::Low) => {}
            Err(error) => {
                warn!("RotaryEncoder <{}> switch read failed: {}", name, error);
                return;
            }
        }

        let start = Instant::now();
        // Blocks this delivery context until physical release, so a second
        // falling edge cannot be dispatched while the switch is down. Timed
        // wait rather than a hot spin.
        loop {
            match backend.read_pin(switch_pin) {
                Ok(Level::High) => break,
                Ok(Level::Low) => thread::sleep(PRESS_POLL),
                Err(error) => {
                    warn!(
                        "RotaryEncoder <{}> switch read failed while held: {}",
                        name, error
                    );
                    return;
                }
            }
        }
        let duration = start.elapsed();

        debug!("RotaryEncoder <{}> press duration={:?}", name, duration);
        handler.press(duration);
    })
}
