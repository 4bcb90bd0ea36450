// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for knobd.
//!
//! Supports loading configuration from TOML files with the following search order:
//! 1. `./knob-rs.toml` (current directory)
//! 2. `~/.config/knob-rs/config.toml` (XDG config)
//! 3. `/etc/knob-rs/config.toml` (system-wide)
//!
//! CLI arguments override config file values.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use knob_backend::BackendKind;

/// Top-level configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Encoder wiring and behavior
    pub encoder: EncoderConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
    /// GPIO backend ("mock" or "rppal")
    pub backend: Option<String>,
}

impl GeneralConfig {
    /// Parse the configured backend name, if any and valid.
    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.backend
            .as_deref()
            .and_then(|name| BackendKind::from_str(name, true).ok())
    }
}

/// Encoder wiring and behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// CLK pin (BCM numbering)
    pub clock_pin: u8,
    /// DT pin (BCM numbering)
    pub dt_pin: u8,
    /// SW pin (BCM numbering)
    pub switch_pin: u8,
    /// Label used in log output
    pub name: String,
    /// Holding the switch this many seconds requests shutdown
    pub hold_secs: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            clock_pin: 16,
            dt_pin: 22,
            switch_pin: 23,
            name: "year".to_string(),
            hold_secs: 3,
        }
    }
}

impl Config {
    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e.to_string()))?;

        toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))
    }

    /// Load configuration from the default search paths.
    /// Returns default config if no config file is found.
    pub fn load_from_default_paths() -> Result<(Self, Option<PathBuf>), ConfigError> {
        for path in Self::default_search_paths() {
            if path.exists() {
                let config = Self::load_from_file(&path)?;
                return Ok((config, Some(path)));
            }
        }

        Ok((Self::default(), None))
    }

    /// Get the default search paths for config files.
    pub fn default_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("knob-rs.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("knob-rs").join("config.toml"));
        }

        paths.push(PathBuf::from("/etc/knob-rs/config.toml"));
        paths
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {1}", path = .0.display())]
    Read(PathBuf, String),

    #[error("failed to parse config file '{path}': {1}", path = .0.display())]
    Parse(PathBuf, String),
}
