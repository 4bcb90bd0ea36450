// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::info;

use knob_backend::{build_backend, BackendKind};
use knob_core::{ChannelHandler, DynResult, EncoderEvent, RotaryEncoder};

mod config;

use crate::config::Config;

const PKG_DESCRIPTION: &str = concat!("knobd - ", env!("CARGO_PKG_DESCRIPTION"));

#[derive(Debug, Parser)]
#[command(version = env!("CARGO_PKG_VERSION"), about = PKG_DESCRIPTION)]
struct Cli {
    /// CLK pin (BCM numbering)
    #[arg(short = 'c', long = "clock")]
    clock_pin: Option<u8>,
    /// DT pin (BCM numbering)
    #[arg(short = 'd', long = "dt")]
    dt_pin: Option<u8>,
    /// SW pin (BCM numbering)
    #[arg(short = 's', long = "switch")]
    switch_pin: Option<u8>,
    /// Label for the encoder in output
    #[arg(short = 'n', long = "name")]
    name: Option<String>,
    /// GPIO backend to use
    #[arg(short = 'b', long = "backend", value_enum)]
    backend: Option<BackendKind>,
    /// Hold the switch this many seconds to exit
    #[arg(long = "hold-secs")]
    hold_secs: Option<u64>,
    /// Log level (error|warn|info|debug|trace)
    #[arg(short = 'l', long = "log-level")]
    log_level: Option<String>,
}

/// Initialize logging/tracing.
///
/// `RUST_LOG` wins when set; otherwise the level from CLI/config applies,
/// falling back to INFO.
fn init_logging(level: Option<&str>) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.unwrap_or("info")));
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let cli = Cli::parse();
    let (config, config_path) = Config::load_from_default_paths()?;

    init_logging(
        cli.log_level
            .as_deref()
            .or(config.general.log_level.as_deref()),
    );
    if let Some(path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let backend_kind = cli
        .backend
        .or_else(|| config.general.backend_kind())
        .unwrap_or(BackendKind::Mock);
    let clock_pin = cli.clock_pin.unwrap_or(config.encoder.clock_pin);
    let dt_pin = cli.dt_pin.unwrap_or(config.encoder.dt_pin);
    let switch_pin = cli.switch_pin.unwrap_or(config.encoder.switch_pin);
    let name = cli.name.unwrap_or(config.encoder.name);
    let hold = Duration::from_secs(cli.hold_secs.unwrap_or(config.encoder.hold_secs));

    info!(
        "Starting knobd (backend: {}, clock={}, dt={}, switch={})",
        backend_kind, clock_pin, dt_pin, switch_pin
    );

    let backend = build_backend(backend_kind)?;
    let (handler, mut events) = ChannelHandler::new();
    let encoder = RotaryEncoder::new(
        backend,
        clock_pin,
        dt_pin,
        switch_pin,
        name,
        Arc::new(handler),
    )?;

    info!(
        "Awaiting input on \"{}\". Press Ctrl-C, or hold the switch for {}s, to end.",
        encoder.name(),
        hold.as_secs()
    );

    loop {
        tokio::select! {
            maybe_event = events.recv() => {
                let Some(event) = maybe_event else { break; };
                match event {
                    EncoderEvent::Twist { clockwise } => {
                        let direction = if clockwise { "clockwise" } else { "counter-clockwise" };
                        info!("{} twisted {}", encoder, direction);
                    }
                    EncoderEvent::Press { duration } => {
                        info!("{} pressed for {:.3} seconds", encoder, duration.as_secs_f64());
                        if duration >= hold {
                            info!("Switch held past the exit threshold, shutting down");
                            break;
                        }
                    }
                }
            }
            _ = signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down");
                break;
            }
        }
    }

    Ok(())
}
