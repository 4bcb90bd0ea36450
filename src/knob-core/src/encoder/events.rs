// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Encoder event types and handler contract.
//!
//! Consumers implement [`EncoderHandler`] to receive decoded input. The trait
//! has no default bodies: a handler that does not implement both operations
//! does not compile, so the contract is checked at the construction boundary
//! rather than discovered when an edge first fires.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::warn;

/// The pair of operations a consumer must supply.
///
/// Both are invoked synchronously from the backend's edge-delivery context,
/// never from the main thread, with at most one call in flight per event
/// channel.
pub trait EncoderHandler: Send + Sync {
    /// Called once per decoded rotation step.
    fn twist(&self, clockwise: bool);

    /// Called once per full press-release cycle, after the switch has been
    /// confirmed released. `duration` is the wall-clock time the switch was
    /// held low.
    fn press(&self, duration: Duration);
}

/// A decoded input event, produced once and then discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderEvent {
    Twist { clockwise: bool },
    Press { duration: Duration },
}

/// Handler that forwards events into a channel.
///
/// Decouples the interrupt-delivery context from application logic: the
/// consumer drains typed [`EncoderEvent`]s from the paired receiver on
/// whatever execution context suits it.
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<EncoderEvent>,
}

impl ChannelHandler {
    /// Create a handler and the receiver its events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EncoderEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: EncoderEvent) {
        if self.tx.send(event).is_err() {
            warn!("Encoder event receiver dropped, discarding {:?}", event);
        }
    }
}

impl EncoderHandler for ChannelHandler {
    fn twist(&self, clockwise: bool) {
        self.forward(EncoderEvent::Twist { clockwise });
    }

    fn press(&self, duration: Duration) {
        self.forward(EncoderEvent::Press { duration });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_handler_forwards_events() {
        let (handler, mut rx) = ChannelHandler::new();

        handler.twist(true);
        handler.twist(false);
        handler.press(Duration::from_millis(230));

        assert_eq!(rx.try_recv().unwrap(), EncoderEvent::Twist { clockwise: true });
        assert_eq!(rx.try_recv().unwrap(), EncoderEvent::Twist { clockwise: false });
        assert_eq!(
            rx.try_recv().unwrap(),
            EncoderEvent::Press {
                duration: Duration::from_millis(230)
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receiver_does_not_panic() {
        let (handler, rx) = ChannelHandler::new();
        drop(rx);
        handler.twist(true);
        handler.press(Duration::from_millis(10));
    }
}
