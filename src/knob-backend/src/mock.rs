// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Mock GPIO backend for development and testing.
//!
//! Holds pin levels in memory and delivers synthetic edges through one
//! delivery thread per registered pin, preserving the ordering and threading
//! model of a real interrupt subsystem: edges on one pin arrive in trigger
//! order on a single context, edges on different pins arrive concurrently.
//! No hardware required.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::debug;

use knob_core::gpio::{
    Edge, EdgeCallback, GpioBackend, GpioError, GpioResult, Level, PinDirection, PinId, Pull,
};

struct Registration {
    debounce: Option<Duration>,
    last_delivery: Option<Instant>,
    queue: mpsc::UnboundedSender<()>,
}

/// In-memory [`GpioBackend`] with synthetic edge injection.
#[derive(Default)]
pub struct MockBackend {
    levels: Mutex<HashMap<PinId, Level>>,
    registrations: Mutex<HashMap<PinId, Registration>>,
    registration_counts: Mutex<HashMap<PinId, u32>>,
    addressing_initialized: AtomicBool,
    addressing_init_count: AtomicU32,
    registration_failures: AtomicU32,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the level a subsequent `read_pin` observes.
    pub fn set_level(&self, pin: PinId, level: Level) {
        self.levels.lock().expect("pin table poisoned").insert(pin, level);
    }

    /// Inject an edge notification for `pin`.
    ///
    /// Returns `true` when the edge was queued for delivery, `false` when it
    /// was swallowed by the debounce window or no callback is registered —
    /// exactly what real hardware would do with it.
    pub fn trigger_edge(&self, pin: PinId) -> bool {
        let mut registrations = self.registrations.lock().expect("registration table poisoned");
        let Some(registration) = registrations.get_mut(&pin) else {
            return false;
        };
        if let (Some(window), Some(last)) = (registration.debounce, registration.last_delivery) {
            if last.elapsed() < window {
                return false;
            }
        }
        registration.last_delivery = Some(Instant::now());
        registration.queue.send(()).is_ok()
    }

    /// Make the next `count` registration attempts fail with a transient
    /// hardware error, mimicking the edge-detection race seen on real
    /// hardware.
    pub fn fail_registrations(&self, count: u32) {
        self.registration_failures.store(count, Ordering::SeqCst);
    }

    /// Number of live callback registrations on `pin`.
    pub fn registration_count(&self, pin: PinId) -> u32 {
        *self
            .registration_counts
            .lock()
            .expect("registration count table poisoned")
            .get(&pin)
            .unwrap_or(&0)
    }

    /// How many times the one-time addressing-mode initialisation ran.
    pub fn addressing_init_count(&self) -> u32 {
        self.addressing_init_count.load(Ordering::SeqCst)
    }
}

impl GpioBackend for MockBackend {
    fn configure_pin(&self, pin: PinId, _direction: PinDirection, pull: Pull) -> GpioResult<()> {
        // Lazy one-time addressing-mode initialisation; atomic check-and-set
        // keeps it single-shot under concurrent configuration.
        if self
            .addressing_initialized
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.addressing_init_count.fetch_add(1, Ordering::SeqCst);
            debug!("Mock addressing mode initialised (BCM)");
        }

        let mut levels = self.levels.lock().expect("pin table poisoned");
        levels.entry(pin).or_insert(match pull {
            Pull::Up => Level::High,
            Pull::Down | Pull::None => Level::Low,
        });
        Ok(())
    }

    fn read_pin(&self, pin: PinId) -> GpioResult<Level> {
        self.levels
            .lock()
            .expect("pin table poisoned")
            .get(&pin)
            .copied()
            .ok_or_else(|| GpioError::HardwareAccess(format!("pin {pin} is not configured")))
    }

    fn register_edge_callback(
        &self,
        pin: PinId,
        _edge: Edge,
        callback: EdgeCallback,
        debounce: Option<Duration>,
    ) -> GpioResult<()> {
        if self
            .registration_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(GpioError::HardwareAccess(
                "failed to add edge detection".into(),
            ));
        }

        let mut registrations = self.registrations.lock().expect("registration table poisoned");
        if registrations.contains_key(&pin) {
            return Err(GpioError::HardwareAccess(format!(
                "pin {pin} already has an edge callback"
            )));
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let delivery = thread::Builder::new()
            .name(format!("mock-gpio-{pin}"))
            .spawn(move || {
                // One delivery context per pin; exits when the backend drops.
                while rx.blocking_recv().is_some() {
                    callback();
                }
            })
            .map_err(|e| GpioError::HardwareAccess(format!("failed to spawn delivery: {e}")))?;
        // Detached on purpose: the delivery context lives as long as the
        // registration, which is never torn down while the backend exists.
        drop(delivery);

        registrations.insert(
            pin,
            Registration {
                debounce,
                last_delivery: None,
                queue: tx,
            },
        );
        *self
            .registration_counts
            .lock()
            .expect("registration count table poisoned")
            .entry(pin)
            .or_insert(0) += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    fn wait_until(condition: impl Fn() -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    fn counting_callback() -> (EdgeCallback, Arc<AtomicU32>) {
        let count = Arc::new(AtomicU32::new(0));
        let callback = {
            let count = Arc::clone(&count);
            Arc::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }) as EdgeCallback
        };
        (callback, count)
    }

    #[test]
    fn test_edges_are_delivered_asynchronously() {
        let backend = MockBackend::new();
        let (callback, count) = counting_callback();
        backend
            .register_edge_callback(4, Edge::Falling, callback, None)
            .unwrap();

        assert!(backend.trigger_edge(4));
        assert!(backend.trigger_edge(4));
        assert!(backend.trigger_edge(4));

        assert!(wait_until(
            || count.load(Ordering::SeqCst) == 3,
            Duration::from_secs(2)
        ));
    }

    #[test]
    fn test_debounce_window_swallows_rapid_edges() {
        let backend = MockBackend::new();
        let (callback, count) = counting_callback();
        backend
            .register_edge_callback(4, Edge::Falling, callback, Some(Duration::from_millis(50)))
            .unwrap();

        assert!(backend.trigger_edge(4));
        assert!(!backend.trigger_edge(4));
        thread::sleep(Duration::from_millis(60));
        assert!(backend.trigger_edge(4));

        assert!(wait_until(
            || count.load(Ordering::SeqCst) == 2,
            Duration::from_secs(2)
        ));
    }

    #[test]
    fn test_trigger_without_registration_is_dropped() {
        let backend = MockBackend::new();
        assert!(!backend.trigger_edge(7));
    }

    #[test]
    fn test_registration_failure_injection() {
        let backend = MockBackend::new();
        backend.fail_registrations(2);
        let (callback, _count) = counting_callback();

        assert!(backend
            .register_edge_callback(4, Edge::Falling, Arc::clone(&callback), None)
            .is_err());
        assert!(backend
            .register_edge_callback(4, Edge::Falling, Arc::clone(&callback), None)
            .is_err());
        assert!(backend
            .register_edge_callback(4, Edge::Falling, callback, None)
            .is_ok());
        assert_eq!(backend.registration_count(4), 1);
    }

    #[test]
    fn test_second_registration_on_claimed_pin_is_rejected() {
        let backend = MockBackend::new();
        let (callback, _count) = counting_callback();
        backend
            .register_edge_callback(4, Edge::Falling, Arc::clone(&callback), None)
            .unwrap();

        let result = backend.register_edge_callback(4, Edge::Falling, callback, None);
        assert!(matches!(result, Err(GpioError::HardwareAccess(_))));
        assert_eq!(backend.registration_count(4), 1);
    }

    #[test]
    fn test_addressing_mode_initialised_exactly_once() {
        let backend = Arc::new(MockBackend::new());

        let workers: Vec<_> = (0u8..8)
            .map(|pin| {
                let backend = Arc::clone(&backend);
                thread::spawn(move || {
                    backend
                        .configure_pin(pin, PinDirection::Input, Pull::Up)
                        .unwrap();
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(backend.addressing_init_count(), 1);
    }

    #[test]
    fn test_pull_up_pin_floats_high() {
        let backend = MockBackend::new();
        backend.configure_pin(23, PinDirection::Input, Pull::Up).unwrap();
        assert_eq!(backend.read_pin(23).unwrap(), Level::High);

        let unconfigured = backend.read_pin(24);
        assert!(matches!(unconfigured, Err(GpioError::HardwareAccess(_))));
    }
}
