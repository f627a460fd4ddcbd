// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Errors that can happen while setting up or running a decode session.

use remain::sorted;
use thiserror::Error as ThisError;

use crate::format::HwRevision;
use crate::format::PixelFormat;

#[sorted]
#[derive(ThisError, Debug)]
pub enum Error {
    /// Another session is already started on this engine.
    #[error("the decode engine is already running another session")]
    EngineBusy,
    /// The firmware blob could not be read or pushed into the engine.
    #[error("failed to load firmware {path}: {reason}")]
    FirmwareLoadFailure { path: String, reason: String },
    /// The engine reported an unrecoverable decode fault.
    #[error("the decode engine reported a fatal error")]
    HardwareFault,
    /// Invalid parameters were passed by the client.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// No descriptor exists for this format on this hardware revision.
    #[error("format {format} is not supported on {revision}")]
    NotSupported {
        revision: HwRevision,
        format: PixelFormat,
    },
    /// An operation was invoked out of state machine order.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    /// DMA memory, canvases or FIFO space ran out.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

impl Error {
    /// Whether the caller may retry, possibly with different parameters, without tearing the
    /// session down first.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::EngineBusy
                | Error::InvalidParameter(_)
                | Error::NotSupported { .. }
                | Error::ResourceExhausted(_)
        )
    }

    /// Whether the session must be stopped before anything else can happen on it.
    pub fn requires_teardown(&self) -> bool {
        matches!(self, Error::HardwareFault | Error::ProtocolViolation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
