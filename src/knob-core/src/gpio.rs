// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Pin backend abstraction.
//!
//! Everything the encoder core knows about hardware goes through
//! [`GpioBackend`], so the same decode and press logic runs against real
//! Raspberry Pi pins or against a synthetic backend that injects edges from
//! tests.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// BCM pin number.
pub type PinId = u8;

/// Logic level of a pin at the moment it was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

/// Transition direction an edge callback is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

/// Pull resistor configuration for an input pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    Up,
    Down,
    None,
}

/// Pin data direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinDirection {
    Input,
    Output,
}

/// Callback invoked from the backend's edge-delivery context.
///
/// Shared (`Arc`) so a registration attempt that fails transiently can be
/// retried with the same callback.
pub type EdgeCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Error type returned by backend operations.
///
/// Hardware failures (permission denied, pin already claimed, device absent,
/// a race in the interrupt subsystem) are not distinguished further; they are
/// uniformly retryable up to the setup deadline, then fatal.
#[derive(Debug, Clone, Error)]
pub enum GpioError {
    #[error("hardware access failed: {0}")]
    HardwareAccess(String),
}

impl GpioError {
    /// Whether retrying the failed operation can be expected to help.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::HardwareAccess(_))
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

/// Common interface for GPIO backends.
///
/// A backend is a shared, effectively-singleton resource: one instance
/// mediates pin access for every encoder in the process and is passed around
/// by reference (`Arc<dyn GpioBackend>`).
pub trait GpioBackend: Send + Sync {
    /// Prepare a pin for reads and callback registration.
    ///
    /// Idempotent per pin. The first configuration in the backend's lifetime
    /// also performs the one-time addressing-mode initialisation, guarded by
    /// an atomic check-and-set so concurrent setup of multiple encoders is
    /// safe.
    fn configure_pin(&self, pin: PinId, direction: PinDirection, pull: Pull) -> GpioResult<()>;

    /// Current logic level of a configured pin.
    ///
    /// No side effects; safe to call from within an edge-callback context.
    fn read_pin(&self, pin: PinId) -> GpioResult<Level>;

    /// Ask the interrupt facility to invoke `callback` asynchronously
    /// whenever `pin` transitions in the `edge` direction.
    ///
    /// Bounces narrower than `debounce` are filtered before delivery. The
    /// callback runs on an execution context owned by the backend, not by
    /// the caller.
    fn register_edge_callback(
        &self,
        pin: PinId,
        edge: Edge,
        callback: EdgeCallback,
        debounce: Option<Duration>,
    ) -> GpioResult<()>;
}
