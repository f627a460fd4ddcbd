// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Decode sessions on the Amlogic "vdec" video decode engine.
//!
//! A `VdecCore` owns one engine: its DOS and DMC register windows, the DMA memory it may reach
//! and its canvas table. Clients open a `Session` per stream, hand it output buffers and
//! compressed access units, and receive `DecoderEvent`s as frames complete. The per-format
//! firmware protocols live in `codec`.

#[macro_use]
pub mod register_space;

pub mod buffer;
pub mod canvas;
pub mod codec;
pub mod config;
pub mod dma;
pub mod dos;
pub mod emulated;
pub mod engine;
pub mod error;
pub mod event;
pub mod firmware;
pub mod format;
pub mod mmio;
pub mod registry;
pub mod session;

pub use crate::buffer::BufferState;
pub use crate::buffer::FrameBuffer;
pub use crate::config::EngineConfig;
pub use crate::engine::IrqReturn;
pub use crate::engine::VdecCore;
pub use crate::error::Error;
pub use crate::error::Result;
pub use crate::event::DecoderEvent;
pub use crate::format::HwRevision;
pub use crate::format::PixelFormat;
pub use crate::registry::Capability;
pub use crate::session::AccessUnit;
pub use crate::session::Session;
pub use crate::session::SessionParams;
pub use crate::session::SessionState;
