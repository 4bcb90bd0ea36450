// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod encoder;
pub mod gpio;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use encoder::events::{ChannelHandler, EncoderEvent, EncoderHandler};
pub use encoder::policies::{retry, DeadlineRetry, NoRetry, RetryPolicy};
pub use encoder::{EncoderError, RotaryEncoder};
pub use gpio::{Edge, EdgeCallback, GpioBackend, GpioError, GpioResult, Level, PinDirection, Pull};
