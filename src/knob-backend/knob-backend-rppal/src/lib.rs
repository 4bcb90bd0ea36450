// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Raspberry Pi GPIO backend over the `rppal` crate.
//!
//! Pin numbers are BCM, rppal's native addressing mode. Each registered
//! interrupt gets its own delivery thread inside rppal, matching the
//! concurrency model the encoder core is written against. Configured pins
//! are kept alive for the lifetime of the backend; dropping an `InputPin`
//! would release the pin and its interrupt.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use rppal::gpio::{Gpio, InputPin, Trigger};
use tracing::debug;

use knob_core::gpio::{
    Edge, EdgeCallback, GpioBackend, GpioError, GpioResult, Level, PinDirection, PinId, Pull,
};

fn hardware(error: rppal::gpio::Error) -> GpioError {
    GpioError::HardwareAccess(error.to_string())
}

/// [`GpioBackend`] backed by the Raspberry Pi's memory-mapped GPIO.
#[derive(Default)]
pub struct RppalBackend {
    gpio: OnceLock<Gpio>,
    pins: Mutex<HashMap<PinId, InputPin>>,
}

impl RppalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared GPIO context, created lazily exactly once.
    ///
    /// `OnceLock::set` is the atomic check-and-set that keeps the one-time
    /// initialisation single-shot when several encoders configure pins
    /// concurrently during startup; a losing racer just drops its handle.
    fn gpio(&self) -> GpioResult<&Gpio> {
        if self.gpio.get().is_none() {
            let gpio = Gpio::new().map_err(hardware)?;
            if self.gpio.set(gpio).is_ok() {
                debug!("GPIO context initialised (BCM numbering)");
            }
        }
        self.gpio
            .get()
            .ok_or_else(|| GpioError::HardwareAccess("GPIO context unavailable".into()))
    }
}

impl GpioBackend for RppalBackend {
    fn configure_pin(&self, pin: PinId, direction: PinDirection, pull: Pull) -> GpioResult<()> {
        if direction != PinDirection::Input {
            return Err(GpioError::HardwareAccess(format!(
                "pin {pin}: only input pins are supported"
            )));
        }

        let mut pins = self.pins.lock().expect("pin table poisoned");
        if pins.contains_key(&pin) {
            return Ok(());
        }

        let io = self.gpio()?.get(pin).map_err(hardware)?;
        let input = match pull {
            Pull::Up => io.into_input_pullup(),
            Pull::Down => io.into_input_pulldown(),
            Pull::None => io.into_input(),
        };
        pins.insert(pin, input);
        Ok(())
    }

    fn read_pin(&self, pin: PinId) -> GpioResult<Level> {
        let pins = self.pins.lock().expect("pin table poisoned");
        let input = pins
            .get(&pin)
            .ok_or_else(|| GpioError::HardwareAccess(format!("pin {pin} is not configured")))?;
        Ok(if input.is_high() {
            Level::High
        } else {
            Level::Low
        })
    }

    fn register_edge_callback(
        &self,
        pin: PinId,
        edge: Edge,
        callback: EdgeCallback,
        debounce: Option<Duration>,
    ) -> GpioResult<()> {
        let trigger = match edge {
            Edge::Rising => Trigger::RisingEdge,
            Edge::Falling => Trigger::FallingEdge,
        };

        let mut pins = self.pins.lock().expect("pin table poisoned");
        let input = pins
            .get_mut(&pin)
            .ok_or_else(|| GpioError::HardwareAccess(format!("pin {pin} is not configured")))?;
        input
            .set_async_interrupt(trigger, debounce, move |_event| callback())
            .map_err(hardware)
    }
}
