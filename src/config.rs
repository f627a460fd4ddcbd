// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Engine configuration, usually read from a JSON file next to the board description.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use remain::sorted;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error as ThisError;

use crate::error::Error;
use crate::format::HwRevision;

#[sorted]
#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to parse configuration: {0}")]
    Parse(serde_json::Error),
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Error {
        Error::InvalidParameter(e.to_string())
    }
}

/// Smallest input FIFO the engine accepts.
pub const MIN_VIFIFO_SIZE: u64 = 0x1_0000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Silicon generation of the decode engine.
    pub revision: HwRevision,
    /// Directory firmware paths are relative to.
    pub firmware_dir: PathBuf,
    /// Bus address and size of the memory the engine may DMA into.
    pub dma_base: u64,
    pub dma_size: u64,
    /// Size of the compressed-input ring.
    pub vififo_size: u64,
    /// Minimum number of events a session can hold before the client reads them.
    pub event_queue_depth: usize,
    /// Period of the background recycle worker. `None` leaves recycling to `pump_recycle`.
    pub recycle_interval_ms: Option<u64>,
    /// Number of IMEM DMA status polls before a firmware load is declared hung.
    pub firmware_poll_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            revision: HwRevision::Gxl,
            firmware_dir: PathBuf::from("/lib/firmware"),
            dma_base: 0x1000_0000,
            dma_size: 256 << 20,
            vififo_size: 16 << 20,
            event_queue_depth: 64,
            recycle_interval_ms: Some(5),
            firmware_poll_limit: 10000,
        }
    }
}

impl EngineConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: EngineConfig =
            serde_json::from_reader(BufReader::new(file)).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(s: &str) -> Result<EngineConfig, ConfigError> {
        let config: EngineConfig = serde_json::from_str(s).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dma_size == 0 {
            return Err(ConfigError::Invalid("dma_size must not be 0".to_string()));
        }
        if self.vififo_size < MIN_VIFIFO_SIZE || self.vififo_size % 8 != 0 {
            return Err(ConfigError::Invalid(format!(
                "vififo_size must be a multiple of 8 and at least {:#x}",
                MIN_VIFIFO_SIZE
            )));
        }
        if self.event_queue_depth == 0 {
            return Err(ConfigError::Invalid(
                "event_queue_depth must not be 0".to_string(),
            ));
        }
        if self.recycle_interval_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "recycle_interval_ms must not be 0, use null to disable".to_string(),
            ));
        }
        if self.firmware_poll_limit == 0 {
            return Err(ConfigError::Invalid(
                "firmware_poll_limit must not be 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn recycle_interval(&self) -> Option<Duration> {
        self.recycle_interval_ms.map(Duration::from_millis)
    }
}
